use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;

use quickpic_types::api::{FriendRequestActionRequest, InfoResponse, SendFriendRequestRequest};
use quickpic_types::models::{Friend, FriendRequestWithUser};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::AuthUser;
use crate::state::{AppState, blocking};

pub async fn send_request(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    WithRejection(Json(req), _): JsonBody<SendFriendRequestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = blocking(&state, move |s| s.friends.create_request(user_id, &req.username)).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<FriendRequestWithUser>>, ApiError> {
    let requests = blocking(&state, move |s| s.friends.pending_requests(user_id)).await?;
    Ok(Json(requests))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    WithRejection(Json(req), _): JsonBody<FriendRequestActionRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    blocking(&state, move |s| s.friends.accept(req.request_id, user_id)).await?;
    Ok(Json(InfoResponse::new("friend request accepted")))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    WithRejection(Json(req), _): JsonBody<FriendRequestActionRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    blocking(&state, move |s| s.friends.reject(req.request_id, user_id)).await?;
    Ok(Json(InfoResponse::new("friend request rejected")))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Vec<Friend>>, ApiError> {
    let friends = blocking(&state, move |s| s.friends.friends(user_id)).await?;
    Ok(Json(friends))
}
