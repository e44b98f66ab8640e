//! 实时挑战应答（机制 c）
//!
//! 三条路径里信任最高的一条：验签用的公钥是账户事先通过
//! `register_key` 带外绑定的，claim 请求里不携带任何密钥材料。
//! 签名对象是 challenge 的原始字节（不重新编码）。服务端没有
//! 防重放账本——challenge 由 claimant 每次会话现生成且从不复用，
//! 复用防护由本地传输会话（[`crate::session`]）承担。

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};

use super::{ledger::canonical_pair, ledger::PairingLedger, PairingOutcome};
use crate::{keys::KeyRegistry, AppError, AppResult};

/// challenge 的最小字节数
pub const MIN_CHALLENGE_LEN: usize = 32;

/// challenge claim 请求体（snake_case，与设备侧协议一致）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeClaim {
    pub owner_id: String,
    /// base64 编码的 challenge 原始字节
    pub challenge: String,
    /// base64 编码的 detached 签名
    pub sig: String,
}

/// 解码并校验 challenge 长度
fn decode_challenge(challenge_b64: &str) -> AppResult<Vec<u8>> {
    let bytes = STANDARD
        .decode(challenge_b64)
        .map_err(|_| AppError::Validation("challenge must be base64".into()))?;
    if bytes.len() < MIN_CHALLENGE_LEN {
        return Err(AppError::Validation(format!(
            "challenge must be at least {MIN_CHALLENGE_LEN} bytes"
        )));
    }
    Ok(bytes)
}

/// challenge-response 服务
pub struct ChallengeService {
    keys: Arc<KeyRegistry>,
    ledger: Arc<PairingLedger>,
}

impl ChallengeService {
    pub fn new(keys: Arc<KeyRegistry>, ledger: Arc<PairingLedger>) -> Self {
        Self { keys, ledger }
    }

    /// 验证 owner 对 challenge 的签名并建立配对
    pub async fn claim_via_challenge(
        &self,
        claim: &ChallengeClaim,
        claimant_id: &str,
    ) -> AppResult<PairingOutcome> {
        let challenge = decode_challenge(&claim.challenge)?;
        canonical_pair(&claim.owner_id, claimant_id)?;

        // 只认当前注册的钥，请求体里的任何密钥材料都不参与
        let key = self.keys.verifying_key(&claim.owner_id).await?;

        let sig_bytes = STANDARD
            .decode(&claim.sig)
            .map_err(|_| AppError::InvalidSignature)?;
        let sig = Signature::from_slice(&sig_bytes).map_err(|_| AppError::InvalidSignature)?;
        key.verify(&challenge, &sig)
            .map_err(|_| AppError::InvalidSignature)?;

        self.ledger.create(&claim.owner_id, claimant_id, None).await
    }
}
