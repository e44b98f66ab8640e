//! 能力令牌编解码器
//!
//! 通用的「签名声明」抽象：`issue(claims) -> 不透明字符串`、
//! `verify(token) -> claims`。服务端以配置注入的 secret 派生
//! Ed25519 签名钥，持有 secret 才能签发，篡改任何一个字节都会
//! 验签失败。配对码令牌和 HTTP 层的身份令牌共用同一个编解码器，
//! 只是声明类型不同。
//!
//! 验签不做过期检查——过期语义属于调用方，且只能读取验签通过的
//! 声明里的 `expires_at`，绝不信任客户端另行提交的过期时间。

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};

use crate::{AppError, AppResult};

/// 令牌编解码器，持有从 secret 派生的服务端签名钥
pub struct TokenCodec {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl TokenCodec {
    /// secret 经 SHA-256 摘要作为 Ed25519 种子
    pub fn new(secret: &str) -> Self {
        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// 签发：`base64url(json(claims)) + "." + base64url(sig)`
    pub fn issue<T: Serialize>(&self, claims: &T) -> AppResult<String> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| AppError::Internal(e.to_string()))?;
        let sig = self.signing_key.sign(&payload);
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(sig.to_bytes())
        ))
    }

    /// 验签并解出声明，fail closed：结构损坏、base64/JSON 解码失败、
    /// 签名不符一律 [`AppError::InvalidToken`]，不泄露具体哪步失败
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> AppResult<T> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(AppError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AppError::InvalidToken)?;
        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| AppError::InvalidToken)?;
        let sig = Signature::from_slice(&sig_bytes).map_err(|_| AppError::InvalidToken)?;

        self.verifying_key
            .verify(&payload, &sig)
            .map_err(|_| AppError::InvalidToken)?;

        serde_json::from_slice(&payload).map_err(|_| AppError::InvalidToken)
    }
}
