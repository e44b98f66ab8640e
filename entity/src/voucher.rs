use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 离线签名凭证（voucher）的消费记录
///
/// 去重只看 `voucher_id`：第一个通过签名验证的 claim 写入本表并
/// 同时置位 `used_at`（首个验证者胜出），之后同 id 的 claim 一律
/// AlreadyUsed。行在首次成功 claim 时才产生，之前不落库。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vouchers")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub voucher_id: String,
    pub owner_id: String,
    /// claim 请求携带的公钥（base64），仅作审计记录
    pub pubkey: String,
    pub expires_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
