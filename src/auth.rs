//! 调用者身份
//!
//! 注册/登录在外部系统完成，这里只消费它的产物：一个由同一
//! [`TokenCodec`](crate::token::TokenCodec) 签名的身份令牌，
//! 声明里带账户 id。提取器验签失败一律 401，不泄露细节。

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};

/// 身份令牌声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
}

/// 已认证的调用者，握有账户 id
#[derive(Debug, Clone)]
pub struct AuthedAccount(pub String);

impl FromRequestParts<AppState> for AuthedAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let claims: IdentityClaims = state
            .codec
            .verify(token)
            .map_err(|_| AppError::Unauthorized)?;
        Ok(AuthedAccount(claims.sub))
    }
}
