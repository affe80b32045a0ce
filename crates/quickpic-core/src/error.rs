use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Covers both access and refresh tokens. A refresh token that was already
/// rotated away is indistinguishable from one that never existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FriendStateError {
    #[error("already friends")]
    AlreadyFriends,

    #[error("friend request already exists")]
    RequestExists,

    #[error("cannot add yourself as a friend")]
    CannotAddSelf,

    #[error("friend request not found")]
    NotFound,

    #[error("not authorized to act on this friend request")]
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("not friends with this user")]
    NotFriends,

    #[error("message not found")]
    MessageNotFound,

    #[error("not authorized to acknowledge this message")]
    Unauthorized,
}

#[derive(Debug, Error)]
pub enum CoreError {
    /// One message for unknown user and wrong password alike.
    #[error("invalid credentials")]
    Credentials,

    #[error("username already exists")]
    UsernameTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Friend(#[from] FriendStateError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}
