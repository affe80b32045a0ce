//! Storage contracts the core depends on.
//!
//! Every method is a single atomic write or read against the backend.
//! Methods are synchronous; async callers run them on a blocking thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use quickpic_types::models::{
    Friend, FriendPair, FriendRequest, FriendRequestStatus, FriendRequestWithUser, Friendship,
    Message, MessageWithSender, RefreshToken, User,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule held by the backend was violated.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    /// Opaque backend failure. Passed through untouched.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub trait UserStore: Send + Sync {
    /// `Conflict` if the (already case-folded) username is taken.
    ///
    /// Assigns the next `user_number` (highest so far plus one, starting at 1)
    /// in the same write and returns it. The value on `user` is ignored.
    fn create_user(&self, user: &User) -> StoreResult<i64>;
    fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    /// Exact match on the case-folded username.
    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    fn store_refresh_token(&self, token: &RefreshToken) -> StoreResult<()>;
    /// Remove the token with this hash and hand it back, in one step, so a
    /// token can be redeemed at most once.
    fn take_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>>;
    /// `false` if nothing matched.
    fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool>;
    fn delete_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64>;
    fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

pub trait FriendStore: Send + Sync {
    /// `Conflict` if a pending request already exists for the unordered pair.
    fn create_request(&self, request: &FriendRequest) -> StoreResult<()>;
    fn get_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>>;
    /// Pending request between the pair in either direction.
    fn pending_request_between(&self, pair: FriendPair) -> StoreResult<Option<FriendRequest>>;
    /// Pending requests addressed to `user_id`, newest first.
    fn pending_requests_for(&self, user_id: Uuid) -> StoreResult<Vec<FriendRequestWithUser>>;
    /// Move a pending request to a terminal status. `false` if the request
    /// is missing or no longer pending.
    fn resolve_request(&self, id: Uuid, status: FriendRequestStatus) -> StoreResult<bool>;
    /// Mark the request accepted and record the friendship together.
    /// `false` (and no friendship) if the request is missing or no longer
    /// pending.
    fn accept_request(&self, id: Uuid, friendship: &Friendship) -> StoreResult<bool>;
    fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool>;
    /// Friends of `user_id`, ordered by username.
    fn list_friends(&self, user_id: Uuid) -> StoreResult<Vec<Friend>>;
}

pub trait MessageStore: Send + Sync {
    fn create_message(&self, message: &Message) -> StoreResult<()>;
    /// Messages addressed to `user_id`, oldest first, joined with the
    /// sender's username and keys.
    fn pending_messages_for(&self, user_id: Uuid) -> StoreResult<Vec<MessageWithSender>>;
    fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>>;
    /// `false` if nothing matched.
    fn delete_message(&self, id: Uuid) -> StoreResult<bool>;
    fn delete_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// One handle per repository, all backed by the same storage.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub friends: Arc<dyn FriendStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserStore + FriendStore + MessageStore + 'static,
    {
        Self {
            users: backend.clone(),
            friends: backend.clone(),
            messages: backend,
        }
    }
}
