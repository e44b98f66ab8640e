use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 配对关系：两个账户之间的对称信任边
///
/// 不变式：`user_low < user_high`（字典序），无论哪一方发起，
/// 同一对账户只对应一行。`(user_low, user_high)` 上的唯一索引
/// 保证并发 claim 下的 at-most-once 插入。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pairings")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_low: String,
    pub user_high: String,
    /// 经配对码建立时记录来源 code；voucher/challenge 路径为 None
    pub source_code_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
