//! 会话传输抽象
//!
//! 原生的 Multipeer/NFC 桥统一收敛成 send/recv 两个原语，
//! 监听器生命周期问题（监听器挂在 emitter 上忘记摘除）在这个
//! 抽象下不存在：transport -drop 即资源释放。

use std::future::Future;

use tokio::sync::mpsc;

use super::PeerMessage;
use crate::{AppError, AppResult};

/// 点对点消息信道
pub trait SessionTransport: Send + 'static {
    fn send(&mut self, msg: PeerMessage) -> impl Future<Output = AppResult<()>> + Send;
    fn recv(&mut self) -> impl Future<Output = AppResult<PeerMessage>> + Send;
}

/// 内存双工信道，测试和回环演示用
pub struct InMemoryTransport {
    tx: mpsc::Sender<PeerMessage>,
    rx: mpsc::Receiver<PeerMessage>,
}

impl InMemoryTransport {
    /// 一对互联的端点
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(8);
        let (tx_b, rx_b) = mpsc::channel(8);
        (
            Self { tx: tx_a, rx: rx_b },
            Self { tx: tx_b, rx: rx_a },
        )
    }
}

impl SessionTransport for InMemoryTransport {
    async fn send(&mut self, msg: PeerMessage) -> AppResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| AppError::Internal("peer transport closed".into()))
    }

    async fn recv(&mut self) -> AppResult<PeerMessage> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| AppError::Internal("peer transport closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplex_delivery() {
        let (mut a, mut b) = InMemoryTransport::pair();

        a.send(PeerMessage::Challenge {
            challenge: "YQ==".into(),
        })
        .await
        .unwrap();
        b.send(PeerMessage::Signature { sig: "Yg==".into() })
            .await
            .unwrap();

        assert_eq!(
            b.recv().await.unwrap(),
            PeerMessage::Challenge {
                challenge: "YQ==".into()
            }
        );
        assert_eq!(
            a.recv().await.unwrap(),
            PeerMessage::Signature { sig: "Yg==".into() }
        );
    }

    #[tokio::test]
    async fn recv_after_peer_dropped_errors() {
        let (mut a, b) = InMemoryTransport::pair();
        drop(b);
        assert!(a.recv().await.is_err());
    }
}
