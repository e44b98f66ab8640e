//! 配对模块
//!
//! 三条互换的握手路径建立账户间的信任边：
//! 服务端签发的一次性配对码（[`code`]）、离线签名凭证（[`voucher`]）、
//! 本地信道上的实时挑战应答（[`challenge`]）。三条路径殊途同归，
//! 最终都落到 [`ledger`] 的 canonical 无序对插入。

pub mod artifact;
pub mod challenge;
pub mod code;
pub mod ledger;
pub mod voucher;

use serde::Serialize;

/// claim 成功的两种结局
///
/// 同一无序对已存在配对时不是错误——从 claimant 视角配对是幂等的，
/// 并发插入的败者看到 `AlreadyPaired` 而非异常。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum PairingOutcome {
    Created { pairing: entity::pairing::Model },
    AlreadyPaired { pairing: entity::pairing::Model },
}

impl PairingOutcome {
    pub fn pairing(&self) -> &entity::pairing::Model {
        match self {
            PairingOutcome::Created { pairing } | PairingOutcome::AlreadyPaired { pairing } => {
                pairing
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, PairingOutcome::Created { .. })
    }
}
