use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Users --

/// A registered account. `username` is stored case-folded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Sequential account number, 1-based. Assigned by the store on insert.
    pub user_number: i64,
    pub username: String,
    /// base64(salt ‖ argon2id digest)
    pub password_hash: String,
    /// base64 X25519 public key (32 bytes)
    pub public_key: String,
    /// base64 Ed25519 verifying key used to check envelope signatures.
    pub signing_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            user_number: self.user_number,
            username: self.username.clone(),
            public_key: self.public_key.clone(),
            signing_key: self.signing_key.clone(),
        }
    }
}

/// The part of a user that other users are allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: Uuid,
    pub user_number: i64,
    pub username: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
}

/// Server-side record of an issued refresh token. Only the SHA-256 of the
/// token is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// -- Friends --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl FriendRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FriendRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown friend request status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
}

impl FriendRequest {
    /// The unordered pair this request is about.
    pub fn pair(&self) -> FriendPair {
        FriendPair::new(self.from_user_id, self.to_user_id)
    }
}

/// A pending request joined with the identity of whoever sent it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendRequestWithUser {
    #[serde(flatten)]
    pub request: FriendRequest,
    pub from_user: UserPublic,
}

/// Unordered pair of user ids, stored lower id first so that lookups do
/// not depend on which side asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FriendPair {
    low: Uuid,
    high: Uuid,
}

impl FriendPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    /// The member of the pair that is not `user_id`.
    pub fn other(&self, user_id: Uuid) -> Option<Uuid> {
        if self.low == user_id {
            Some(self.high)
        } else if self.high == user_id {
            Some(self.low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friendship {
    pub id: Uuid,
    pub pair: FriendPair,
    pub created_at: DateTime<Utc>,
}

/// A friend as seen from one side of a friendship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friend {
    pub user_id: Uuid,
    pub username: String,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    pub since: DateTime<Utc>,
}

// -- Messages --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown content type '{other}'")),
        }
    }
}

/// Messages stored on the server are always sealed envelopes.
/// The server only sees ciphertext, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub encrypted_content: Vec<u8>,
    pub content_type: ContentType,
    /// base64 Ed25519 signature over `encrypted_content`
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

/// A pending message joined with what the recipient needs to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWithSender {
    pub message: Message,
    pub from_username: String,
    pub from_public_key: String,
    pub from_signing_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_pair_is_direction_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(FriendPair::new(a, b), FriendPair::new(b, a));

        let pair = FriendPair::new(a, b);
        assert!(pair.low() <= pair.high());
        assert_eq!(pair.other(a), Some(b));
        assert_eq!(pair.other(b), Some(a));
        assert_eq!(pair.other(Uuid::new_v4()), None);
    }

    #[test]
    fn status_and_content_type_use_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&FriendRequestStatus::Accepted).unwrap(),
            "\"accepted\""
        );
        assert_eq!("image".parse::<ContentType>().unwrap(), ContentType::Image);
        assert!("video".parse::<ContentType>().is_err());
        assert!("cancelled".parse::<FriendRequestStatus>().is_err());
    }
}
