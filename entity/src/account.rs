use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 账户：每个账户至多持有一个当前公钥（base64 编码的 Ed25519）
///
/// 账户注册/登录由外部系统负责，这里只维护 challenge-response
/// 验证所需的公钥槽位。`register_key` 覆盖旧值，旧钥立即失效。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub public_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
