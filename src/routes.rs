//! HTTP 接口
//!
//! 薄层 handler，只负责参数解析和身份提取，业务逻辑全部委托给
//! [`pairing`](crate::pairing) 各服务。错误经 [`AppError`] 统一映射
//! 状态码：校验/凭证/冲突 400、不存在 404、非当事方 403、内部 500。

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Path, Request, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pairing::{
    challenge::ChallengeClaim,
    code::IssuedCode,
    voucher::VoucherClaim,
    PairingOutcome,
};
use crate::{auth::AuthedAccount, AppError, AppResult, AppState};

/// [`Json`] 的包装：请求体缺失、格式错误、缺字段一律 400，
/// 而不是 axum 默认的 415/422
struct AppJson<T>(T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(AppJson(value))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pairing/request-code", post(request_code))
        .route("/pairing/claim", post(claim_code))
        .route("/pairing/claim-voucher", post(claim_voucher))
        .route("/pairing/register-key", post(register_key))
        .route("/pairing/challenge", post(claim_challenge))
        .route("/pairings", get(list_pairings))
        .route("/pairings/{id}", delete(revoke_pairing))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RequestCodeBody {
    ttl_seconds: Option<i64>,
}

async fn request_code(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    AppJson(body): AppJson<RequestCodeBody>,
) -> AppResult<Json<IssuedCode>> {
    let issued = state
        .codes
        .request_code(&account_id, body.ttl_seconds)
        .await?;
    Ok(Json(issued))
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    token: String,
}

async fn claim_code(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    AppJson(body): AppJson<ClaimBody>,
) -> AppResult<Json<PairingOutcome>> {
    let outcome = state.codes.claim_code(&account_id, &body.token).await?;
    Ok(Json(outcome))
}

async fn claim_voucher(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    AppJson(claim): AppJson<VoucherClaim>,
) -> AppResult<Json<PairingOutcome>> {
    let outcome = state.vouchers.claim_voucher(&claim, &account_id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterKeyBody {
    public_key: String,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

async fn register_key(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    AppJson(body): AppJson<RegisterKeyBody>,
) -> AppResult<Json<OkResponse>> {
    state.keys.register_key(&account_id, &body.public_key).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn claim_challenge(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    AppJson(claim): AppJson<ChallengeClaim>,
) -> AppResult<Json<PairingOutcome>> {
    let outcome = state
        .challenges
        .claim_via_challenge(&claim, &account_id)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
struct PairingsResponse {
    pairings: Vec<entity::pairing::Model>,
}

async fn list_pairings(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
) -> AppResult<Json<PairingsResponse>> {
    let pairings = state.ledger.list(&account_id).await?;
    Ok(Json(PairingsResponse { pairings }))
}

async fn revoke_pairing(
    State(state): State<AppState>,
    AuthedAccount(account_id): AuthedAccount,
    Path(pairing_id): Path<Uuid>,
) -> AppResult<Json<OkResponse>> {
    state.ledger.revoke(&account_id, pairing_id).await?;
    Ok(Json(OkResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_field_maps_to_validation() {
        let res = AppJson::<RegisterKeyBody>::from_request(json_request("{}"), &()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_validation() {
        let res = AppJson::<ClaimBody>::from_request(json_request("not json"), &()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn missing_content_type_maps_to_validation() {
        let req = Request::builder()
            .body(Body::from(r#"{"token":"x"}"#))
            .unwrap();
        let res = AppJson::<ClaimBody>::from_request(req, &()).await;
        assert!(matches!(res, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn well_formed_body_passes_through() {
        let res = AppJson::<ClaimBody>::from_request(json_request(r#"{"token":"abc"}"#), &()).await;
        let AppJson(body) = res.unwrap();
        assert_eq!(body.token, "abc");
    }
}
