//! 注册公钥管理
//!
//! 每个账户至多一个当前公钥，`register_key` 直接覆盖旧值。
//! 读多写少，用 DashMap 做 write-through 缓存：注册成功即更新
//! 缓存，后续 challenge 验证立刻看到新钥，不容忍 stale read。

use base64::{engine::general_purpose::STANDARD, Engine};
use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, DatabaseConnection, EntityTrait,
};

use crate::{AppError, AppResult};

/// base64 → Ed25519 公钥，任何解码/长度/曲线点错误都返回 None
pub(crate) fn try_parse_public_key(b64: &str) -> Option<VerifyingKey> {
    let bytes = STANDARD.decode(b64).ok()?;
    let arr: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&arr).ok()
}

/// 公钥注册表
pub struct KeyRegistry {
    db: DatabaseConnection,
    cache: DashMap<String, VerifyingKey>,
}

impl KeyRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: DashMap::new(),
        }
    }

    /// 注册（或轮换）账户公钥
    ///
    /// 注册时立即校验是否为合法的 32 字节 Ed25519 公钥，
    /// 坏钥在这里拒绝，不等到验证路径才发现。
    pub async fn register_key(&self, account_id: &str, public_key_b64: &str) -> AppResult<()> {
        let key = try_parse_public_key(public_key_b64)
            .ok_or_else(|| AppError::Validation("public_key must be a base64 Ed25519 key".into()))?;

        let model = entity::account::ActiveModel {
            id: Set(account_id.to_string()),
            public_key: Set(Some(public_key_b64.to_string())),
        };
        entity::account::Entity::insert(model)
            .on_conflict(
                OnConflict::column(entity::account::Column::Id)
                    .update_column(entity::account::Column::PublicKey)
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        // 落库成功后再更新缓存，保证读到的一定是持久化过的钥
        self.cache.insert(account_id.to_string(), key);
        tracing::info!(account_id, "public key registered");
        Ok(())
    }

    /// 查询账户当前注册的公钥
    pub async fn verifying_key(&self, account_id: &str) -> AppResult<VerifyingKey> {
        if let Some(key) = self.cache.get(account_id) {
            return Ok(*key);
        }

        let row = entity::account::Entity::find_by_id(account_id.to_string())
            .one(&self.db)
            .await?;
        let b64 = row
            .and_then(|a| a.public_key)
            .ok_or(AppError::NoRegisteredKey)?;
        let key = try_parse_public_key(&b64).ok_or(AppError::NoRegisteredKey)?;

        self.cache.insert(account_id.to_string(), key);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    #[test]
    fn parse_valid_public_key() {
        let key = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        let b64 = STANDARD.encode(key.as_bytes());
        assert_eq!(try_parse_public_key(&b64), Some(key));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(try_parse_public_key("not base64 !!").is_none());
        // 长度不对
        assert!(try_parse_public_key(&STANDARD.encode([1u8; 16])).is_none());
    }
}
