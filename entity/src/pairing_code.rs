use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 一次性配对码
///
/// 签发后只消费一次：`used_at` 置位即进入终态，之后任何 claim 都
/// 返回 AlreadyUsed。行不删除，作为审计/防重放账本保留。
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pairing_codes")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: String,
    pub expires_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
