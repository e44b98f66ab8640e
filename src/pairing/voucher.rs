//! 离线签名凭证（机制 b）
//!
//! voucher 是自包含的签名凭证，经物理/本地信道（如 NFC 标签）转交。
//! 信任根只有两样：凭证内嵌公钥上的 Ed25519 签名 + 对物理载体的
//! 占有。公钥由 claim 请求自己携带，服务端不持有任何验证密钥——
//! 这比 challenge-response（预注册公钥）弱，是离线/无网络签发路径
//! 的刻意取舍。防重放因此完全押在 `voucher_id` 上：id 必须是签发
//! 设备为每个物理载体现铸的 UUIDv4，不可猜测、不可复用。
//!
//! 去重只看 `voucher_id`：首个通过验签的 claim 原子地写入消费记录
//! （insert-if-absent，并发时败者回落到条件更新再失败），第二次
//! 一律 AlreadyUsed。

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier};
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};

use super::{ledger::canonical_pair, ledger::PairingLedger, PairingOutcome};
use crate::{keys::try_parse_public_key, AppError, AppResult};

/// voucher claim 请求体，与标签载荷同构（snake_case、全字符串字段）
///
/// `expires_at` 保持 RFC3339 字符串原样参与签名：签发与验证两侧
/// 对 canonical 消息必须逐字节一致，重新编码日期会毁掉签名。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherClaim {
    pub owner_id: String,
    pub voucher_id: String,
    pub expires_at: String,
    /// base64 编码的 Ed25519 公钥
    pub pubkey: String,
    /// base64 编码的 detached 签名
    pub sig: String,
}

/// 被签名的 canonical 消息：`{"owner_id":…,"voucher_id":…,"expires_at":…}`
///
/// 字段顺序即序列化顺序，两侧共用同一结构体保证字节一致。
#[derive(Debug, Serialize)]
pub(crate) struct VoucherMessage<'a> {
    pub owner_id: &'a str,
    pub voucher_id: &'a str,
    pub expires_at: &'a str,
}

/// 验签，任何失败（坏公钥、坏 base64、签名不符）统一 InvalidSignature
pub(crate) fn verify_voucher_signature(claim: &VoucherClaim) -> AppResult<()> {
    let key = try_parse_public_key(&claim.pubkey).ok_or(AppError::InvalidSignature)?;
    let sig_bytes = STANDARD
        .decode(&claim.sig)
        .map_err(|_| AppError::InvalidSignature)?;
    let sig = Signature::from_slice(&sig_bytes).map_err(|_| AppError::InvalidSignature)?;

    let message = serde_json::to_vec(&VoucherMessage {
        owner_id: &claim.owner_id,
        voucher_id: &claim.voucher_id,
        expires_at: &claim.expires_at,
    })
    .map_err(|e| AppError::Internal(e.to_string()))?;

    key.verify(&message, &sig)
        .map_err(|_| AppError::InvalidSignature)
}

/// voucher 服务
pub struct VoucherService {
    db: DatabaseConnection,
    ledger: Arc<PairingLedger>,
}

impl VoucherService {
    pub fn new(db: DatabaseConnection, ledger: Arc<PairingLedger>) -> Self {
        Self { db, ledger }
    }

    /// 消费 voucher，建立 claimant 与签发者的配对
    pub async fn claim_voucher(
        &self,
        claim: &VoucherClaim,
        claimant_id: &str,
    ) -> AppResult<PairingOutcome> {
        let expires_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&claim.expires_at)
            .map_err(|_| AppError::Validation("expires_at must be an RFC3339 timestamp".into()))?
            .with_timezone(&Utc);
        if expires_at < Utc::now() {
            return Err(AppError::Expired);
        }

        verify_voucher_signature(claim)?;

        // 自配对在消费 voucher 之前就拒绝
        canonical_pair(&claim.owner_id, claimant_id)?;

        // 消费和账本写入在同一事务里：账本写失败时消费回滚
        let ledger = self.ledger.clone();
        let claim = claim.clone();
        let claimant = claimant_id.to_string();
        let outcome = self
            .db
            .transaction::<_, PairingOutcome, AppError>(move |txn| {
                Box::pin(async move {
                    spend(txn, &claim, expires_at).await?;
                    ledger.create_on(txn, &claim.owner_id, &claimant, None).await
                })
            })
            .await?;
        Ok(outcome)
    }
}

/// 首个验证者胜出的原子消费
async fn spend<C: ConnectionTrait>(
    conn: &C,
    claim: &VoucherClaim,
    expires_at: DateTime<Utc>,
) -> AppResult<()> {
    let inserted = entity::voucher::Entity::insert(entity::voucher::ActiveModel {
        voucher_id: Set(claim.voucher_id.clone()),
        owner_id: Set(claim.owner_id.clone()),
        pubkey: Set(claim.pubkey.clone()),
        expires_at: Set(expires_at),
        used_at: Set(Some(Utc::now())),
    })
    .on_conflict(
        OnConflict::column(entity::voucher::Column::VoucherId)
            .do_nothing()
            .to_owned(),
    )
    .exec(conn)
    .await;

    match inserted {
        Ok(_) => Ok(()),
        // 行已存在：只可能赢在未消费的残留行上，消费过的一律拒绝
        Err(DbErr::RecordNotInserted) => {
            let spent = entity::voucher::Entity::update_many()
                .col_expr(entity::voucher::Column::UsedAt, Expr::value(Utc::now()))
                .filter(entity::voucher::Column::VoucherId.eq(&claim.voucher_id))
                .filter(entity::voucher::Column::UsedAt.is_null())
                .exec(conn)
                .await?;
            if spent.rows_affected == 0 {
                return Err(AppError::AlreadyUsed);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_claim(key: &SigningKey) -> VoucherClaim {
        let owner_id = "u1";
        let voucher_id = "3f0c8a52-9d41-4b6f-8a2e-6f1d2c9b7e10";
        let expires_at = "2099-01-01T00:00:00.000Z";
        let message = serde_json::to_vec(&VoucherMessage {
            owner_id,
            voucher_id,
            expires_at,
        })
        .unwrap();
        let sig = key.sign(&message);
        VoucherClaim {
            owner_id: owner_id.into(),
            voucher_id: voucher_id.into(),
            expires_at: expires_at.into(),
            pubkey: STANDARD.encode(key.verifying_key().as_bytes()),
            sig: STANDARD.encode(sig.to_bytes()),
        }
    }

    #[test]
    fn canonical_message_encoding_is_stable() {
        let bytes = serde_json::to_vec(&VoucherMessage {
            owner_id: "u1",
            voucher_id: "v1",
            expires_at: "2099-01-01T00:00:00.000Z",
        })
        .unwrap();
        // 必须与 JS 侧 JSON.stringify({owner_id, voucher_id, expires_at}) 逐字节一致
        assert_eq!(
            bytes,
            br#"{"owner_id":"u1","voucher_id":"v1","expires_at":"2099-01-01T00:00:00.000Z"}"#
        );
    }

    #[test]
    fn valid_signature_accepted() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        assert!(verify_voucher_signature(&signed_claim(&key)).is_ok());
    }

    #[test]
    fn any_field_tamper_invalidates_signature() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let base = signed_claim(&key);

        let mut c = base.clone();
        c.owner_id = "u2".into();
        assert!(matches!(
            verify_voucher_signature(&c),
            Err(AppError::InvalidSignature)
        ));

        let mut c = base.clone();
        c.voucher_id.push('x');
        assert!(verify_voucher_signature(&c).is_err());

        let mut c = base.clone();
        c.expires_at = "2099-01-01T00:00:01.000Z".into();
        assert!(verify_voucher_signature(&c).is_err());
    }

    #[test]
    fn wrong_key_rejected() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let other = SigningKey::from_bytes(&[43u8; 32]);
        let mut claim = signed_claim(&key);
        claim.pubkey = STANDARD.encode(other.verifying_key().as_bytes());
        assert!(matches!(
            verify_voucher_signature(&claim),
            Err(AppError::InvalidSignature)
        ));
    }

    #[test]
    fn malformed_pubkey_rejected() {
        let key = SigningKey::from_bytes(&[42u8; 32]);
        let mut claim = signed_claim(&key);
        claim.pubkey = "???".into();
        assert!(matches!(
            verify_voucher_signature(&claim),
            Err(AppError::InvalidSignature)
        ));
    }
}
