//! 应用错误处理模块
//!
//! 错误分五类：输入可纠正的校验失败、凭证无效（签名/令牌）、
//! 资源不存在、冲突（已使用/已存在）、内部错误。凭证类失败对外
//! 只暴露统一的 "invalid credential"，不区分具体哪一步失败，
//! 避免成为签名校验的 oracle。

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// 对外序列化为稳定的 `{ kind, message }` 格式；内部细节
/// （数据库错误等）只进服务端日志，不进响应体。
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求格式/参数错误
    #[error("invalid request: {0}")]
    Validation(String),

    /// 凭证已过期（配对码或 voucher）
    #[error("credential expired")]
    Expired,

    /// 对方账户从未注册公钥
    #[error("owner has no registered key")]
    NoRegisteredKey,

    /// 能力令牌无效（结构损坏、签名不符、密钥不匹配）
    #[error("invalid credential")]
    InvalidToken,

    /// 签名验证失败（voucher / challenge）
    #[error("invalid credential")]
    InvalidSignature,

    /// 令牌引用的配对码行不存在（或不属于声明的 owner）；
    /// 按 claim 请求级错误映射 400
    #[error("code not found")]
    UnknownCode,

    /// 引用的配对关系不存在
    #[error("not found")]
    NotFound,

    /// 配对码或 voucher 已被消费
    #[error("already used")]
    AlreadyUsed,

    /// 调用者不是该配对关系的当事方
    #[error("not a party to this pairing")]
    NotParty,

    /// 缺失或无效的调用者身份
    #[error("missing or invalid authorization")]
    Unauthorized,

    /// 数据库错误
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// 其他内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 对外的 `(kind, message)`；InvalidToken 与 InvalidSignature
    /// 刻意合并为同一 kind、同一 message
    fn wire(&self) -> (&'static str, String) {
        match self {
            AppError::Validation(msg) => ("Validation", msg.clone()),
            AppError::Expired => ("Expired", self.to_string()),
            AppError::NoRegisteredKey => ("NoRegisteredKey", self.to_string()),
            AppError::InvalidToken | AppError::InvalidSignature => {
                ("InvalidCredential", "invalid credential".to_string())
            }
            AppError::UnknownCode => ("UnknownCode", self.to_string()),
            AppError::NotFound => ("NotFound", self.to_string()),
            AppError::AlreadyUsed => ("AlreadyUsed", self.to_string()),
            AppError::NotParty => ("NotParty", self.to_string()),
            AppError::Unauthorized => ("Unauthorized", self.to_string()),
            AppError::Db(_) | AppError::Internal(_) => ("Server", "server error".to_string()),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Expired
            | AppError::NoRegisteredKey
            | AppError::InvalidToken
            | AppError::InvalidSignature
            | AppError::UnknownCode
            | AppError::AlreadyUsed => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::NotParty => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Db(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// 事务闭包里返回的就是 AppError，这里拍平回单层
impl From<sea_orm::TransactionError<AppError>> for AppError {
    fn from(e: sea_orm::TransactionError<AppError>) -> Self {
        match e {
            sea_orm::TransactionError::Connection(e) => AppError::Db(e),
            sea_orm::TransactionError::Transaction(e) => e,
        }
    }
}

/// 响应体里的错误格式
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // 完整上下文只进日志
            tracing::error!(error = %self, "internal error");
        }
        let (kind, message) = self.wire();
        (status, Json(ErrorBody { kind, message })).into_response()
    }
}

// ============ 便捷类型别名 ============

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
