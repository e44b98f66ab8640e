//! 配对账本
//!
//! 把两个账户 id 规整为 `(user_low, user_high)` 的 canonical 无序对
//! 后持久化。唯一性靠 `(user_low, user_high)` 上的唯一索引保证：
//! 插入是单条原子的 insert-if-absent，并发 claim 同一对账户时
//! 败者观察到已有行，绝不会出现两行。

use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter,
};
use uuid::Uuid;

use super::PairingOutcome;
use crate::{AppError, AppResult};

/// 两个账户 id 的 canonical 排序（字典序），自配对拒绝
pub fn canonical_pair(a: &str, b: &str) -> AppResult<(String, String)> {
    if a == b {
        return Err(AppError::Validation(
            "cannot pair an account with itself".into(),
        ));
    }
    if a < b {
        Ok((a.to_string(), b.to_string()))
    } else {
        Ok((b.to_string(), a.to_string()))
    }
}

/// 配对账本
pub struct PairingLedger {
    db: DatabaseConnection,
}

impl PairingLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 原子地建立 a–b 的配对边
    ///
    /// `ON CONFLICT DO NOTHING` + 唯一索引实现 insert-if-absent；
    /// 没插进去时回读已有行返回 `AlreadyPaired`。
    pub async fn create(
        &self,
        a: &str,
        b: &str,
        source_code_id: Option<Uuid>,
    ) -> AppResult<PairingOutcome> {
        self.create_on(&self.db, a, b, source_code_id).await
    }

    /// 同 [`create`](Self::create)，但跑在调用方给定的连接上——
    /// claim 路径把凭证消费和账本写入放进同一个事务时用
    pub async fn create_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        a: &str,
        b: &str,
        source_code_id: Option<Uuid>,
    ) -> AppResult<PairingOutcome> {
        let (low, high) = canonical_pair(a, b)?;

        let model = entity::pairing::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_low: Set(low.clone()),
            user_high: Set(high.clone()),
            source_code_id: Set(source_code_id),
            created_at: Set(Utc::now()),
        };

        let inserted = entity::pairing::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    entity::pairing::Column::UserLow,
                    entity::pairing::Column::UserHigh,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_with_returning(conn)
            .await;

        match inserted {
            Ok(pairing) => {
                tracing::info!(pairing_id = %pairing.id, user_low = %low, user_high = %high, "pairing created");
                Ok(PairingOutcome::Created { pairing })
            }
            Err(DbErr::RecordNotInserted) | Err(DbErr::RecordNotFound(_)) => {
                let pairing = entity::pairing::Entity::find()
                    .filter(entity::pairing::Column::UserLow.eq(&low))
                    .filter(entity::pairing::Column::UserHigh.eq(&high))
                    .one(conn)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal("pairing row missing after conflict".into())
                    })?;
                Ok(PairingOutcome::AlreadyPaired { pairing })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 账户参与的全部配对（任一侧）
    pub async fn list(&self, account_id: &str) -> AppResult<Vec<entity::pairing::Model>> {
        let rows = entity::pairing::Entity::find()
            .filter(
                Condition::any()
                    .add(entity::pairing::Column::UserLow.eq(account_id))
                    .add(entity::pairing::Column::UserHigh.eq(account_id)),
            )
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// 撤销配对：任一当事方可撤销，其余调用者 403
    pub async fn revoke(&self, account_id: &str, pairing_id: Uuid) -> AppResult<()> {
        let row = entity::pairing::Entity::find_by_id(pairing_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        if row.user_low != account_id && row.user_high != account_id {
            return Err(AppError::NotParty);
        }

        entity::pairing::Entity::delete_by_id(pairing_id)
            .exec(&self.db)
            .await?;
        tracing::info!(%pairing_id, account_id, "pairing revoked");
        Ok(())
    }
}
