use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use quickpic_core::{CoreError, FriendStateError, RelayError};
use quickpic_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("missing authorization header")]
    MissingToken,

    #[error("{0}")]
    BadRequest(String),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(e) => match e {
                CoreError::Credentials | CoreError::Token(_) => StatusCode::UNAUTHORIZED,
                CoreError::UsernameTaken => StatusCode::CONFLICT,
                CoreError::UserNotFound => StatusCode::NOT_FOUND,
                CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CoreError::Friend(f) => match f {
                    FriendStateError::AlreadyFriends | FriendStateError::RequestExists => {
                        StatusCode::CONFLICT
                    }
                    FriendStateError::CannotAddSelf => StatusCode::BAD_REQUEST,
                    FriendStateError::NotFound => StatusCode::NOT_FOUND,
                    FriendStateError::Unauthorized => StatusCode::FORBIDDEN,
                },
                CoreError::Relay(r) => match r {
                    RelayError::NotFriends | RelayError::Unauthorized => StatusCode::FORBIDDEN,
                    RelayError::MessageNotFound => StatusCode::NOT_FOUND,
                },
                CoreError::Storage(_) | CoreError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Never leak backend detail to the client.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:#}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickpic_core::{StoreError, TokenError};

    #[test]
    fn statuses_follow_error_category() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (CoreError::Credentials.into(), StatusCode::UNAUTHORIZED),
            (CoreError::Token(TokenError::Expired).into(), StatusCode::UNAUTHORIZED),
            (CoreError::UsernameTaken.into(), StatusCode::CONFLICT),
            (CoreError::from(FriendStateError::RequestExists).into(), StatusCode::CONFLICT),
            (CoreError::from(FriendStateError::CannotAddSelf).into(), StatusCode::BAD_REQUEST),
            (CoreError::from(FriendStateError::Unauthorized).into(), StatusCode::FORBIDDEN),
            (CoreError::from(RelayError::NotFriends).into(), StatusCode::FORBIDDEN),
            (CoreError::from(RelayError::MessageNotFound).into(), StatusCode::NOT_FOUND),
            (
                CoreError::Storage(StoreError::Conflict("x")).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::MissingToken, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }
}
