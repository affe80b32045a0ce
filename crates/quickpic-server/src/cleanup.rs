use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use quickpic_api::AppState;

/// Background task that purges expired refresh tokens and, when a
/// retention window is set, undelivered messages older than it.
pub async fn run_cleanup_loop(state: AppState, retention: Option<Duration>, interval_secs: u64) {
    let mut interval = tokio::time::interval(StdDuration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match cleanup_once(&state, retention).await {
            Ok((tokens, messages)) => {
                if tokens > 0 || messages > 0 {
                    info!(
                        "Cleanup: purged {} expired refresh tokens, {} stale messages",
                        tokens, messages
                    );
                }
            }
            Err(e) => {
                warn!("Cleanup error: {:#}", e);
            }
        }
    }
}

pub async fn cleanup_once(state: &AppState, retention: Option<Duration>) -> anyhow::Result<(u64, u64)> {
    let state = state.clone();
    let counts = tokio::task::spawn_blocking(move || -> quickpic_core::Result<(u64, u64)> {
        let tokens = state.auth.purge_expired_tokens()?;
        let messages = match retention {
            Some(window) => state.relay.purge_older_than(Utc::now() - window)?,
            None => 0,
        };
        Ok((tokens, messages))
    })
    .await??;

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use quickpic_api::AppStateInner;
    use quickpic_core::{AuthConfig, MemoryStore, MessageStore, PasswordParams, Stores, UserStore};
    use quickpic_types::models::{ContentType, Message, RefreshToken, User};
    use uuid::Uuid;

    fn state_with(store: Arc<MemoryStore>) -> AppState {
        let mut auth = AuthConfig::new("cleanup-secret");
        auth.password = PasswordParams {
            time_cost: 1,
            memory_kib: 64,
            parallelism: 1,
            output_len: 32,
        };
        Arc::new(AppStateInner::new(Stores::from_backend(store), auth))
    }

    fn user(store: &MemoryStore, name: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            user_number: 0,
            username: name.into(),
            password_hash: "x".into(),
            public_key: "pk".into(),
            signing_key: None,
            created_at: Utc::now(),
        };
        store.create_user(&user).unwrap();
        user.id
    }

    fn message(store: &MemoryStore, from: Uuid, to: Uuid, age: Duration) -> Uuid {
        let message = Message {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            encrypted_content: vec![7; 16],
            content_type: ContentType::Text,
            signature: "sig".into(),
            created_at: Utc::now() - age,
        };
        store.create_message(&message).unwrap();
        message.id
    }

    #[tokio::test]
    async fn purges_expired_tokens_and_stale_messages() {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");

        store
            .store_refresh_token(&RefreshToken {
                token_hash: "stale".into(),
                user_id: alice,
                expires_at: Utc::now() - Duration::hours(1),
            })
            .unwrap();
        let old = message(&store, alice, bob, Duration::hours(72));
        let fresh = message(&store, alice, bob, Duration::minutes(5));

        let state = state_with(store.clone());
        let counts = cleanup_once(&state, Some(Duration::hours(24))).await.unwrap();
        assert_eq!(counts, (1, 1));

        assert!(store.get_message(old).unwrap().is_none());
        assert!(store.get_message(fresh).unwrap().is_some());
    }

    #[tokio::test]
    async fn no_retention_keeps_messages() {
        let store = Arc::new(MemoryStore::new());
        let alice = user(&store, "alice");
        let bob = user(&store, "bob");
        let old = message(&store, alice, bob, Duration::days(30));

        let counts = cleanup_once(&state_with(store.clone()), None).await.unwrap();
        assert_eq!(counts, (0, 0));
        assert!(store.get_message(old).unwrap().is_some());
    }
}
