use std::sync::Arc;

use tracing::error;

use quickpic_core::{AuthConfig, AuthService, FriendGraph, MessageRelay, Stores, UserDirectory};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub auth: AuthService,
    pub friends: FriendGraph,
    pub relay: MessageRelay,
    pub users: UserDirectory,
}

impl AppStateInner {
    pub fn new(stores: Stores, auth: AuthConfig) -> Self {
        Self {
            auth: AuthService::new(stores.users.clone(), auth),
            friends: FriendGraph::new(stores.users.clone(), stores.friends.clone()),
            relay: MessageRelay::new(
                stores.users.clone(),
                stores.friends.clone(),
                stores.messages.clone(),
            ),
            users: UserDirectory::new(stores.users),
        }
    }
}

/// Run a core call off the async runtime. Storage and Argon2 both block.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> quickpic_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
