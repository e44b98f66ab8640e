//! 本地传输会话（owner/scanner 两角色）
//!
//! 驱动 challenge-response 在点对点信道上的一次交换。会话本身
//! 不做任何信任判定，只是消息载体：scanner 现生成 challenge，
//! owner 用设备私钥签名送回，scanner 把 `{owner_id, challenge, sig}`
//! 提交给服务端验证。每个设备同一时刻只有一个活跃会话，
//! 新会话隐式顶替旧会话（先拆除再建立）。
//!
//! 传输层抽象成 send/recv 原语加一个取消令牌（[`transport`]），
//! 状态机（[`machine`]）可以用内存信道独立测试。

pub mod machine;
pub mod manager;
pub mod transport;

pub use machine::SessionState;
pub use manager::SessionManager;
pub use transport::{InMemoryTransport, SessionTransport};

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pairing::challenge::{ChallengeClaim, ChallengeService};
use crate::pairing::PairingOutcome;
use crate::AppResult;

/// 对端信道上的消息：每会话恰好一个 challenge、一个 signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PeerMessage {
    Challenge { challenge: String },
    Signature { sig: String },
}

/// scanner 侧的 claim 提交口
///
/// 会话拿到签名后经由它提交服务端；对进程内测试直接包一个
/// [`ChallengeService`]，真实客户端则是 HTTP 提交器。
pub trait ChallengeSubmitter: Send + Sync + 'static {
    fn submit(
        &self,
        claim: ChallengeClaim,
    ) -> impl Future<Output = AppResult<PairingOutcome>> + Send;
}

/// 进程内提交器：直接调 [`ChallengeService`]，claimant 身份在构造时固定
pub struct DirectSubmitter {
    service: Arc<ChallengeService>,
    claimant_id: String,
}

impl DirectSubmitter {
    pub fn new(service: Arc<ChallengeService>, claimant_id: impl Into<String>) -> Self {
        Self {
            service,
            claimant_id: claimant_id.into(),
        }
    }
}

impl ChallengeSubmitter for DirectSubmitter {
    async fn submit(&self, claim: ChallengeClaim) -> AppResult<PairingOutcome> {
        self.service
            .claim_via_challenge(&claim, &self.claimant_id)
            .await
    }
}
