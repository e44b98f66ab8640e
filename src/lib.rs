//! 账户配对与信任建立服务
//!
//! 三条可互换的握手路径（服务端签发的一次性码、离线签名 voucher、
//! 本地信道上的实时挑战应答）证明双方合意后，把信任边写入
//! canonical 配对账本。HTTP 层和本地传输会话都只是薄壳，
//! 核心在 [`pairing`] 各服务。

pub mod auth;
pub mod config;
pub mod error;
pub mod keys;
pub mod pairing;
pub mod routes;
pub mod session;
pub mod token;

pub use error::{AppError, AppResult};

use std::sync::Arc;

use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::keys::KeyRegistry;
use crate::pairing::{
    challenge::ChallengeService, code::CodeService, ledger::PairingLedger, voucher::VoucherService,
};
use crate::token::TokenCodec;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pairlink=debug")),
        )
        .init();
}

/// 服务依赖的装配结果，axum state
#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub keys: Arc<KeyRegistry>,
    pub ledger: Arc<PairingLedger>,
    pub codes: Arc<CodeService>,
    pub vouchers: Arc<VoucherService>,
    pub challenges: Arc<ChallengeService>,
}

impl AppState {
    /// 从数据库连接和配置装配全部服务
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.token_secret));
        let keys = Arc::new(KeyRegistry::new(db.clone()));
        let ledger = Arc::new(PairingLedger::new(db.clone()));
        let codes = Arc::new(CodeService::new(
            db.clone(),
            codec.clone(),
            ledger.clone(),
            config.default_ttl_secs,
        ));
        let vouchers = Arc::new(VoucherService::new(db.clone(), ledger.clone()));
        let challenges = Arc::new(ChallengeService::new(keys.clone(), ledger.clone()));
        Self {
            codec,
            keys,
            ledger,
            codes,
            vouchers,
            challenges,
        }
    }

    /// 给外部登录系统（和测试）用的窄接口：签发身份令牌
    pub fn issue_identity_token(&self, account_id: &str) -> AppResult<String> {
        self.codec.issue(&auth::IdentityClaims {
            sub: account_id.to_string(),
        })
    }
}

/// 连接数据库、跑迁移、起 HTTP 服务
pub async fn run(config: AppConfig) -> AppResult<()> {
    let db = Database::connect(&config.database_url).await?;
    migration::Migrator::up(&db, None).await?;

    let state = AppState::new(db, &config);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    tracing::info!(addr = %config.bind_addr, "pairlink listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
