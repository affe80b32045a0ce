//! HTTP surface: handlers, bearer auth and the router.

pub mod auth;
pub mod error;
pub mod extract;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod state;
pub mod users;

use axum::{
    Json, Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use quickpic_types::api::HealthResponse;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes, without transport layers (CORS, tracing) which the binary adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/auth/logout/all", post(auth::logout_all))
        .route("/users/{username}", get(users::get_by_username))
        .route("/friends", get(friends::list))
        .route("/friends/request", post(friends::send_request))
        .route("/friends/requests", get(friends::pending_requests))
        .route("/friends/accept", post(friends::accept))
        .route("/friends/reject", post(friends::reject))
        .route("/messages", get(messages::get_messages).post(messages::send_message))
        .route("/messages/{message_id}", delete(messages::acknowledge))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}
