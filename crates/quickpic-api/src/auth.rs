use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;

use quickpic_types::api::{
    AuthResponse, InfoResponse, LoginRequest, LogoutAllResponse, RefreshRequest, RegisterRequest,
};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = blocking(&state, move |s| {
        s.auth.register(
            &req.username,
            &req.password,
            &req.public_key,
            req.signing_key.as_deref(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let resp = blocking(&state, move |s| s.auth.login(&req.username, &req.password)).await?;
    Ok(Json(resp))
}

pub async fn refresh(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let resp = blocking(&state, move |s| s.auth.refresh(&req.refresh_token)).await?;
    Ok(Json(resp))
}

pub async fn logout(
    State(state): State<AppState>,
    WithRejection(Json(req), _): JsonBody<RefreshRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    blocking(&state, move |s| s.auth.logout(&req.refresh_token)).await?;
    Ok(Json(InfoResponse::new("logged out")))
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<LogoutAllResponse>, ApiError> {
    let revoked = blocking(&state, move |s| s.auth.logout_all(user_id)).await?;
    Ok(Json(LogoutAllResponse { revoked }))
}
