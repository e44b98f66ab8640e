//! voucher 物理载体（标签载荷）
//!
//! 签发设备现铸 voucher 并写入 NFC 标签等离线载体，载体内容是
//! UTF-8 JSON：`{owner_id, voucher_id, expires_at, pubkey, sig}`，
//! 全字符串字段，`pubkey`/`sig` base64。读取方解析后原样 POST 给
//! claim-voucher 接口——载荷与请求体同构，中途不重新编码。

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signer, SigningKey};
use uuid::Uuid;

use super::voucher::{VoucherClaim, VoucherMessage};
use crate::{AppError, AppResult};

/// 签发一张 voucher：现铸 UUIDv4 id，设备私钥对 canonical 消息签名
///
/// `expires_at` 用毫秒精度 + `Z` 后缀的 RFC3339（与 JS
/// `toISOString()` 一致），之后这串字节就是签名的一部分，
/// 不允许任何一侧重新格式化。
pub fn issue_voucher(owner_id: &str, key: &SigningKey, ttl_seconds: i64) -> AppResult<VoucherClaim> {
    let voucher_id = Uuid::new_v4().to_string();
    let expires_at =
        (Utc::now() + Duration::seconds(ttl_seconds)).to_rfc3339_opts(SecondsFormat::Millis, true);

    let message = serde_json::to_vec(&VoucherMessage {
        owner_id,
        voucher_id: &voucher_id,
        expires_at: &expires_at,
    })
    .map_err(|e| AppError::Internal(e.to_string()))?;
    let sig = key.sign(&message);

    Ok(VoucherClaim {
        owner_id: owner_id.to_string(),
        voucher_id,
        expires_at,
        pubkey: STANDARD.encode(key.verifying_key().as_bytes()),
        sig: STANDARD.encode(sig.to_bytes()),
    })
}

/// voucher → 标签载荷（UTF-8 JSON 字符串）
pub fn encode_tag_payload(claim: &VoucherClaim) -> AppResult<String> {
    serde_json::to_string(claim).map_err(|e| AppError::Internal(e.to_string()))
}

/// 标签载荷 → voucher，坏 JSON 按可纠正输入处理
pub fn parse_tag_payload(payload: &str) -> AppResult<VoucherClaim> {
    serde_json::from_str(payload)
        .map_err(|_| AppError::Validation("tag payload is not valid voucher JSON".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::voucher::verify_voucher_signature;

    #[test]
    fn issued_voucher_verifies() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let claim = issue_voucher("u1", &key, 300).unwrap();
        assert!(verify_voucher_signature(&claim).is_ok());
        // 每次签发现铸新 id
        let again = issue_voucher("u1", &key, 300).unwrap();
        assert_ne!(claim.voucher_id, again.voucher_id);
    }

    #[test]
    fn tag_payload_roundtrip() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let claim = issue_voucher("u1", &key, 300).unwrap();

        let payload = encode_tag_payload(&claim).unwrap();
        let parsed = parse_tag_payload(&payload).unwrap();

        assert_eq!(parsed.voucher_id, claim.voucher_id);
        assert_eq!(parsed.expires_at, claim.expires_at);
        // 经过载体往返后签名仍然有效
        assert!(verify_voucher_signature(&parsed).is_ok());
    }

    #[test]
    fn bad_payload_rejected() {
        assert!(matches!(
            parse_tag_payload("not json"),
            Err(AppError::Validation(_))
        ));
        assert!(parse_tag_payload(r#"{"owner_id":"u1"}"#).is_err());
    }

    #[test]
    fn expires_at_uses_millisecond_iso_format() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        let claim = issue_voucher("u1", &key, 300).unwrap();
        // 形如 2026-08-30T12:34:56.789Z
        assert!(claim.expires_at.ends_with('Z'));
        assert_eq!(claim.expires_at.len(), "2026-08-30T12:34:56.789Z".len());
    }
}
