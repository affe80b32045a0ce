use axum::{
    Json,
    extract::{Path, State},
};
use axum_extra::extract::WithRejection;

use quickpic_types::models::UserPublic;

use crate::error::ApiError;
use crate::extract::PathParam;
use crate::state::{AppState, blocking};

pub async fn get_by_username(
    State(state): State<AppState>,
    WithRejection(Path(username), _): PathParam<String>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = blocking(&state, move |s| s.users.find_by_username(&username)).await?;
    Ok(Json(user))
}
