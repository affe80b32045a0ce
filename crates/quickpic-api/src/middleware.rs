use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use quickpic_core::CoreError;

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// Validate the bearer access token and attach the caller's id.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(ApiError::MissingToken)?;

    // HMAC check only; cheap enough to stay on the async thread.
    let user_id = state
        .auth
        .validate_access_token(bearer.token())
        .map_err(CoreError::from)?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
