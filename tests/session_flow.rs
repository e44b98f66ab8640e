//! 本地传输会话到服务端 claim 的全链路：owner 设备在会话里签名，
//! scanner 把结果提交 ChallengeService，配对落入账本

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::SigningKey;
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database};

use pairlink::config::AppConfig;
use pairlink::session::{DirectSubmitter, InMemoryTransport, SessionManager, SessionState};
use pairlink::AppError;
use pairlink::AppState;

async fn test_state() -> AppState {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1);
    let db = Database::connect(opt).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        token_secret: "test-secret".into(),
        bind_addr: "127.0.0.1:0".into(),
        default_ttl_secs: 300,
    };
    AppState::new(db, &config)
}

#[tokio::test]
async fn full_challenge_response_pairing_over_session() {
    let state = test_state().await;
    let device_key = SigningKey::from_bytes(&[31u8; 32]);

    // owner 事先注册了设备公钥（带外绑定）
    state
        .keys
        .register_key(
            "owner",
            &STANDARD.encode(device_key.verifying_key().as_bytes()),
        )
        .await
        .unwrap();

    let (owner_side, scanner_side) = InMemoryTransport::pair();
    let owner_mgr = SessionManager::new();
    let scanner_mgr = SessionManager::new();

    owner_mgr.start_advertising(owner_side, device_key).await;

    let submitter = Arc::new(DirectSubmitter::new(state.challenges.clone(), "scanner"));
    let rx = scanner_mgr
        .start_browsing(scanner_side, "owner", submitter)
        .await;

    let outcome = rx.await.unwrap().unwrap();
    assert!(outcome.is_created());
    assert_eq!(outcome.pairing().user_low, "owner");
    assert_eq!(outcome.pairing().user_high, "scanner");
    assert_eq!(outcome.pairing().source_code_id, None);

    assert_eq!(state.ledger.list("owner").await.unwrap().len(), 1);
}

#[tokio::test]
async fn session_with_wrong_device_key_fails_at_server() {
    let state = test_state().await;
    let registered = SigningKey::from_bytes(&[32u8; 32]);
    let impostor = SigningKey::from_bytes(&[33u8; 32]);

    state
        .keys
        .register_key(
            "owner",
            &STANDARD.encode(registered.verifying_key().as_bytes()),
        )
        .await
        .unwrap();

    let (owner_side, scanner_side) = InMemoryTransport::pair();
    let owner_mgr = SessionManager::new();
    let scanner_mgr = SessionManager::new();

    // owner 端用了错误的私钥
    owner_mgr.start_advertising(owner_side, impostor).await;

    let submitter = Arc::new(DirectSubmitter::new(state.challenges.clone(), "scanner"));
    let rx = scanner_mgr
        .start_browsing(scanner_side, "owner", submitter)
        .await;

    assert!(matches!(
        rx.await.unwrap(),
        Err(AppError::InvalidSignature)
    ));
    // 失败也不留下配对
    assert!(state.ledger.list("owner").await.unwrap().is_empty());
    // 会话在一次交换后关闭
    assert_eq!(scanner_mgr.session_state().await, SessionState::Closed);
}
