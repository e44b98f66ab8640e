//! 会话状态机
//!
//! `Idle → Advertising|Browsing → PeerConnected →
//! {ChallengeSent | AwaitingChallenge} → ResponseExchanged → Closed`，
//! 任何非终态都可能进入 `Error`。取消令牌触发时直接走 `Closed`，
//! 显式拆除不算错误。

use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{ChallengeSubmitter, PeerMessage, SessionTransport};
use crate::pairing::challenge::{ChallengeClaim, MIN_CHALLENGE_LEN};
use crate::pairing::PairingOutcome;
use crate::{AppError, AppResult};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Advertising,
    Browsing,
    PeerConnected,
    ChallengeSent,
    AwaitingChallenge,
    ResponseExchanged,
    Closed,
    Error,
}

/// 外部可观测的共享状态
pub type SharedState = Arc<Mutex<SessionState>>;

pub(crate) fn set_state(state: &SharedState, next: SessionState) {
    if let Ok(mut guard) = state.lock() {
        *guard = next;
    }
}

fn fail(state: &SharedState, err: AppError) -> AppError {
    set_state(state, SessionState::Error);
    err
}

/// owner 角色：等待入站 challenge，用设备私钥签名原始字节后送回
pub async fn run_owner<T: SessionTransport>(
    mut transport: T,
    signing_key: SigningKey,
    state: SharedState,
    cancel: CancellationToken,
) -> AppResult<()> {
    set_state(&state, SessionState::PeerConnected);
    set_state(&state, SessionState::AwaitingChallenge);

    let msg = tokio::select! {
        _ = cancel.cancelled() => {
            set_state(&state, SessionState::Closed);
            return Ok(());
        }
        msg = transport.recv() => msg.map_err(|e| fail(&state, e))?,
    };

    let challenge_b64 = match msg {
        PeerMessage::Challenge { challenge } => challenge,
        other => {
            return Err(fail(
                &state,
                AppError::Validation(format!("unexpected peer message: {other:?}")),
            ));
        }
    };

    // 对 challenge 的原始字节签名，不做任何重新编码
    let challenge = STANDARD
        .decode(&challenge_b64)
        .map_err(|_| fail(&state, AppError::Validation("challenge must be base64".into())))?;
    let sig = signing_key.sign(&challenge);

    transport
        .send(PeerMessage::Signature {
            sig: STANDARD.encode(sig.to_bytes()),
        })
        .await
        .map_err(|e| fail(&state, e))?;

    set_state(&state, SessionState::ResponseExchanged);
    set_state(&state, SessionState::Closed);
    Ok(())
}

/// scanner 角色：现生成 challenge、送出、等签名、提交服务端
///
/// 服务端应答无论成败都关闭会话，不自动重试；challenge 一次一用，
/// 会话关闭即作废，防重放靠这一条。
pub async fn run_scanner<T, S>(
    mut transport: T,
    owner_id: String,
    submitter: Arc<S>,
    state: SharedState,
    cancel: CancellationToken,
) -> AppResult<PairingOutcome>
where
    T: SessionTransport,
    S: ChallengeSubmitter,
{
    set_state(&state, SessionState::PeerConnected);

    let mut challenge = [0u8; MIN_CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut challenge);
    let challenge_b64 = STANDARD.encode(challenge);

    transport
        .send(PeerMessage::Challenge {
            challenge: challenge_b64.clone(),
        })
        .await
        .map_err(|e| fail(&state, e))?;
    set_state(&state, SessionState::ChallengeSent);

    let msg = tokio::select! {
        _ = cancel.cancelled() => {
            set_state(&state, SessionState::Closed);
            return Err(AppError::Validation("session cancelled".into()));
        }
        msg = transport.recv() => msg.map_err(|e| fail(&state, e))?,
    };

    let sig = match msg {
        PeerMessage::Signature { sig } => sig,
        other => {
            return Err(fail(
                &state,
                AppError::Validation(format!("unexpected peer message: {other:?}")),
            ));
        }
    };
    set_state(&state, SessionState::ResponseExchanged);

    let result = submitter
        .submit(ChallengeClaim {
            owner_id,
            challenge: challenge_b64,
            sig,
        })
        .await;

    set_state(&state, SessionState::Closed);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemoryTransport;
    use ed25519_dalek::Verifier;
    use std::sync::Mutex as StdMutex;

    fn shared() -> SharedState {
        Arc::new(StdMutex::new(SessionState::Idle))
    }

    /// 记录收到的 claim、返回 InvalidSignature 的假提交器
    struct RejectingSubmitter {
        seen: StdMutex<Vec<ChallengeClaim>>,
    }

    impl ChallengeSubmitter for RejectingSubmitter {
        async fn submit(&self, claim: ChallengeClaim) -> AppResult<PairingOutcome> {
            self.seen.lock().unwrap().push(claim);
            Err(AppError::InvalidSignature)
        }
    }

    #[tokio::test]
    async fn owner_signs_inbound_challenge() {
        let (owner_side, mut scanner_side) = InMemoryTransport::pair();
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let verifying = key.verifying_key();
        let state = shared();

        let owner = tokio::spawn(run_owner(
            owner_side,
            key,
            state.clone(),
            CancellationToken::new(),
        ));

        let challenge = [7u8; 32];
        scanner_side
            .send(PeerMessage::Challenge {
                challenge: STANDARD.encode(challenge),
            })
            .await
            .unwrap();

        let PeerMessage::Signature { sig } = scanner_side.recv().await.unwrap() else {
            panic!("expected signature message");
        };
        let sig_bytes = STANDARD.decode(sig).unwrap();
        let sig = ed25519_dalek::Signature::from_slice(&sig_bytes).unwrap();
        verifying.verify(&challenge, &sig).unwrap();

        owner.await.unwrap().unwrap();
        assert_eq!(*state.lock().unwrap(), SessionState::Closed);
    }

    #[tokio::test]
    async fn scanner_submits_and_closes_on_failure_too() {
        let (owner_side, scanner_side) = InMemoryTransport::pair();
        let key = SigningKey::from_bytes(&[2u8; 32]);
        let submitter = Arc::new(RejectingSubmitter {
            seen: StdMutex::new(Vec::new()),
        });
        let scanner_state = shared();

        let owner = tokio::spawn(run_owner(
            owner_side,
            key,
            shared(),
            CancellationToken::new(),
        ));
        let result = run_scanner(
            scanner_side,
            "owner-1".to_string(),
            submitter.clone(),
            scanner_state.clone(),
            CancellationToken::new(),
        )
        .await;

        owner.await.unwrap().unwrap();
        // 提交失败也关闭会话，不重试
        assert!(matches!(result, Err(AppError::InvalidSignature)));
        assert_eq!(*scanner_state.lock().unwrap(), SessionState::Closed);

        let seen = submitter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].owner_id, "owner-1");
        assert!(STANDARD.decode(&seen[0].challenge).unwrap().len() >= MIN_CHALLENGE_LEN);
    }

    #[tokio::test]
    async fn owner_rejects_out_of_order_signature() {
        let (owner_side, mut scanner_side) = InMemoryTransport::pair();
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let state = shared();

        let owner = tokio::spawn(run_owner(
            owner_side,
            key,
            state.clone(),
            CancellationToken::new(),
        ));

        scanner_side
            .send(PeerMessage::Signature { sig: "YQ==".into() })
            .await
            .unwrap();

        assert!(owner.await.unwrap().is_err());
        assert_eq!(*state.lock().unwrap(), SessionState::Error);
    }

    #[tokio::test]
    async fn cancellation_closes_owner_session() {
        let (owner_side, _scanner_side) = InMemoryTransport::pair();
        let key = SigningKey::from_bytes(&[4u8; 32]);
        let state = shared();
        let cancel = CancellationToken::new();

        let owner = tokio::spawn(run_owner(owner_side, key, state.clone(), cancel.clone()));
        cancel.cancel();

        owner.await.unwrap().unwrap();
        assert_eq!(*state.lock().unwrap(), SessionState::Closed);
    }
}
