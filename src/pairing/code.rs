//! 一次性配对码（机制 a）
//!
//! 签发方拿到的不是明文 code，而是 [`TokenCodec`] 包装的能力令牌，
//! 声明 `{owner_id, code_id, expires_at}`。令牌本身就是 bearer 凭证，
//! 行里不再冗余存储随机 secret。claim 端验签后以 verified 声明里的
//! 过期时间为准，消费用单条条件更新（`set used_at where used_at is
//! null`）完成，不存在读-改-写的双花窗口。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ledger::canonical_pair, ledger::PairingLedger, PairingOutcome};
use crate::{token::TokenCodec, AppError, AppResult};

/// 配对码令牌的声明
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeClaims {
    pub owner_id: String,
    pub code_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// `request_code` 的返回
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub code_id: Uuid,
    pub token: String,
}

/// ttl 缺省或非正数时回落默认值
fn effective_ttl(ttl_seconds: Option<i64>, default: i64) -> i64 {
    ttl_seconds.filter(|t| *t > 0).unwrap_or(default)
}

/// 配对码服务
pub struct CodeService {
    db: DatabaseConnection,
    codec: Arc<TokenCodec>,
    ledger: Arc<PairingLedger>,
    default_ttl_secs: i64,
}

impl CodeService {
    pub fn new(
        db: DatabaseConnection,
        codec: Arc<TokenCodec>,
        ledger: Arc<PairingLedger>,
        default_ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            codec,
            ledger,
            default_ttl_secs,
        }
    }

    /// 签发一次性配对码
    pub async fn request_code(
        &self,
        owner_id: &str,
        ttl_seconds: Option<i64>,
    ) -> AppResult<IssuedCode> {
        let ttl = effective_ttl(ttl_seconds, self.default_ttl_secs);
        let code_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(ttl);

        entity::pairing_code::Entity::insert(entity::pairing_code::ActiveModel {
            id: Set(code_id),
            owner_id: Set(owner_id.to_string()),
            expires_at: Set(expires_at),
            used_at: Set(None),
        })
        .exec(&self.db)
        .await?;

        let token = self.codec.issue(&CodeClaims {
            owner_id: owner_id.to_string(),
            code_id,
            expires_at,
        })?;

        tracing::info!(owner_id, %code_id, ttl, "pairing code issued");
        Ok(IssuedCode { code_id, token })
    }

    /// 消费配对码，建立 claimant 与签发者的配对
    pub async fn claim_code(&self, claimant_id: &str, token: &str) -> AppResult<PairingOutcome> {
        let claims: CodeClaims = self.codec.verify(token)?;

        if claims.expires_at < Utc::now() {
            return Err(AppError::Expired);
        }

        // 自配对在消费配对码之前就拒绝，避免白白烧掉 code
        canonical_pair(&claims.owner_id, claimant_id)?;

        let row = entity::pairing_code::Entity::find_by_id(claims.code_id)
            .filter(entity::pairing_code::Column::OwnerId.eq(&claims.owner_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::UnknownCode)?;

        if row.used_at.is_some() {
            return Err(AppError::AlreadyUsed);
        }

        // 消费和账本写入在同一事务里：账本写失败时消费回滚，
        // code 不会在没建立配对的情况下被烧掉
        let ledger = self.ledger.clone();
        let code_id = claims.code_id;
        let owner_id = claims.owner_id.clone();
        let claimant = claimant_id.to_string();
        let outcome = self
            .db
            .transaction::<_, PairingOutcome, AppError>(move |txn| {
                Box::pin(async move {
                    // 条件更新即消费：并发 claim 同一 code 时只有一方 rows_affected == 1
                    let spent = entity::pairing_code::Entity::update_many()
                        .col_expr(entity::pairing_code::Column::UsedAt, Expr::value(Utc::now()))
                        .filter(entity::pairing_code::Column::Id.eq(code_id))
                        .filter(entity::pairing_code::Column::UsedAt.is_null())
                        .exec(txn)
                        .await?;
                    if spent.rows_affected == 0 {
                        return Err(AppError::AlreadyUsed);
                    }

                    ledger
                        .create_on(txn, &owner_id, &claimant, Some(code_id))
                        .await
                })
            })
            .await?;
        Ok(outcome)
    }
}
