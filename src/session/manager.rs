//! 会话管理器
//!
//! 每设备一个活跃会话。`start_advertising`/`start_browsing` 先拆除
//! 旧会话再建新会话；`stop_session` 从任何状态都合法且幂等，
//! 取消令牌触发后等待任务退出，信道随 transport drop 一并释放。

use std::sync::{Arc, Mutex};

use ed25519_dalek::SigningKey;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::machine::{self, SessionState, SharedState};
use super::{ChallengeSubmitter, SessionTransport};
use crate::pairing::PairingOutcome;
use crate::AppResult;

struct ActiveSession {
    cancel: CancellationToken,
    state: SharedState,
    task: JoinHandle<()>,
}

/// 会话管理器
pub struct SessionManager {
    active: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// owner 角色上线：等待对端接入并应答 challenge
    pub async fn start_advertising<T: SessionTransport>(
        &self,
        transport: T,
        signing_key: SigningKey,
    ) {
        let mut guard = self.active.lock().await;
        teardown(guard.take()).await;

        let state: SharedState = Arc::new(Mutex::new(SessionState::Advertising));
        let cancel = CancellationToken::new();

        let task = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = machine::run_owner(transport, signing_key, state, cancel).await {
                    tracing::warn!(error = %e, "owner session ended with error");
                }
            })
        };

        *guard = Some(ActiveSession {
            cancel,
            state,
            task,
        });
    }

    /// scanner 角色发起配对：发送 challenge 并把签名提交服务端
    ///
    /// 结果经 oneshot 送出；会话无论成败都在一次交换后关闭。
    pub async fn start_browsing<T, S>(
        &self,
        transport: T,
        owner_id: impl Into<String>,
        submitter: Arc<S>,
    ) -> oneshot::Receiver<AppResult<PairingOutcome>>
    where
        T: SessionTransport,
        S: ChallengeSubmitter,
    {
        let mut guard = self.active.lock().await;
        teardown(guard.take()).await;

        let state: SharedState = Arc::new(Mutex::new(SessionState::Browsing));
        let cancel = CancellationToken::new();
        let (result_tx, result_rx) = oneshot::channel();
        let owner_id = owner_id.into();

        let task = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result =
                    machine::run_scanner(transport, owner_id, submitter, state, cancel).await;
                let _ = result_tx.send(result);
            })
        };

        *guard = Some(ActiveSession {
            cancel,
            state,
            task,
        });
        result_rx
    }

    /// 显式拆除当前会话，任何状态下调用都合法，重复调用是 no-op
    pub async fn stop_session(&self) {
        let mut guard = self.active.lock().await;
        teardown(guard.take()).await;
    }

    /// 当前会话状态；无会话时为 Idle
    pub async fn session_state(&self) -> SessionState {
        let guard = self.active.lock().await;
        match guard.as_ref() {
            Some(active) => active
                .state
                .lock()
                .map(|s| *s)
                .unwrap_or(SessionState::Error),
            None => SessionState::Idle,
        }
    }
}

async fn teardown(session: Option<ActiveSession>) {
    if let Some(active) = session {
        active.cancel.cancel();
        let _ = active.task.await;
        machine::set_state(&active.state, SessionState::Closed);
    }
}
