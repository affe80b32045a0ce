//! Body and path extractors whose rejections go through `ApiError`, so a
//! malformed request gets the same JSON error shape as any other failure.

use axum::{
    Json,
    extract::{
        Path,
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection},
    },
};
use axum_extra::extract::WithRejection;
use tracing::debug;

use crate::error::ApiError;

pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;
pub type PathParam<T> = WithRejection<Path<T>, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // The rejection text carries serde internals; keep it in the log only.
        debug!("Rejected request body: {}", rejection.body_text());
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "expected an application/json body",
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON",
            JsonRejection::JsonDataError(_) => "request body has missing or invalid fields",
            _ => "invalid request body",
        };
        ApiError::BadRequest(message.into())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {}", rejection.body_text());
        let message = match &rejection {
            PathRejection::FailedToDeserializePathParams(e) => match e.kind() {
                ErrorKind::ParseErrorAtKey { key, .. }
                | ErrorKind::DeserializeError { key, .. }
                | ErrorKind::InvalidUtf8InPathParam { key } => format!("invalid {key}"),
                _ => "invalid path parameter".to_string(),
            },
            _ => "invalid path parameter".to_string(),
        };
        ApiError::BadRequest(message)
    }
}
