//! 服务配置
//!
//! 签名密钥作为显式配置值注入令牌编解码器，不走全局状态，
//! 测试里每个用例可以用不同的 secret。

use crate::{AppError, AppResult};

/// 配对码/voucher 的默认有效期（秒）
pub const DEFAULT_TTL_SECS: i64 = 300;

/// 服务配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// sea-orm 连接串，如 `sqlite://pairlink.db?mode=rwc`
    pub database_url: String,
    /// 能力令牌与身份令牌的签名 secret
    pub token_secret: String,
    pub bind_addr: String,
    /// ttl 缺省或非正数时使用的配对码有效期
    pub default_ttl_secs: i64,
}

impl AppConfig {
    /// 从环境变量构建配置
    ///
    /// `PAIRLINK_TOKEN_SECRET` 必须设置；生产环境绝不能用默认值兜底。
    pub fn from_env() -> AppResult<Self> {
        let token_secret = std::env::var("PAIRLINK_TOKEN_SECRET")
            .map_err(|_| AppError::Internal("PAIRLINK_TOKEN_SECRET not set".into()))?;

        let database_url = std::env::var("PAIRLINK_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://pairlink.db?mode=rwc".to_string());

        let bind_addr =
            std::env::var("PAIRLINK_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4000".to_string());

        Ok(Self {
            database_url,
            token_secret,
            bind_addr,
            default_ttl_secs: DEFAULT_TTL_SECS,
        })
    }
}
