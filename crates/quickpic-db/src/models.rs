//! Database row types. These map directly to SQLite rows and convert into
//! the shared models, keeping text parsing out of the query code.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use quickpic_types::models::{
    ContentType, Friend, FriendRequest, FriendRequestStatus, FriendRequestWithUser, Message,
    MessageWithSender, RefreshToken, User, UserPublic,
};

/// Fixed-width RFC 3339 so that text order is time order.
pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp '{}'", s))?
        .with_timezone(&Utc))
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).with_context(|| format!("bad id '{}'", s))
}

pub struct UserRow {
    pub id: String,
    pub user_number: i64,
    pub username: String,
    pub password_hash: String,
    pub public_key: String,
    pub signing_key: Option<String>,
    pub created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id)?,
            user_number: row.user_number,
            username: row.username,
            password_hash: row.password_hash,
            public_key: row.public_key,
            signing_key: row.signing_key,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

pub struct RefreshTokenRow {
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: String,
}

impl TryFrom<RefreshTokenRow> for RefreshToken {
    type Error = anyhow::Error;

    fn try_from(row: RefreshTokenRow) -> Result<Self> {
        Ok(RefreshToken {
            token_hash: row.token_hash,
            user_id: parse_id(&row.user_id)?,
            expires_at: parse_time(&row.expires_at)?,
        })
    }
}

pub struct FriendRequestRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<FriendRequestRow> for FriendRequest {
    type Error = anyhow::Error;

    fn try_from(row: FriendRequestRow) -> Result<Self> {
        Ok(FriendRequest {
            id: parse_id(&row.id)?,
            from_user_id: parse_id(&row.from_user_id)?,
            to_user_id: parse_id(&row.to_user_id)?,
            status: row.status.parse::<FriendRequestStatus>().map_err(|e: String| anyhow!(e))?,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

/// Public columns of a joined user.
pub struct SenderRow {
    pub id: String,
    pub user_number: i64,
    pub username: String,
    pub public_key: String,
    pub signing_key: Option<String>,
}

impl TryFrom<SenderRow> for UserPublic {
    type Error = anyhow::Error;

    fn try_from(row: SenderRow) -> Result<Self> {
        Ok(UserPublic {
            id: parse_id(&row.id)?,
            user_number: row.user_number,
            username: row.username,
            public_key: row.public_key,
            signing_key: row.signing_key,
        })
    }
}

pub struct PendingRequestRow {
    pub request: FriendRequestRow,
    pub sender: SenderRow,
}

impl TryFrom<PendingRequestRow> for FriendRequestWithUser {
    type Error = anyhow::Error;

    fn try_from(row: PendingRequestRow) -> Result<Self> {
        Ok(FriendRequestWithUser {
            request: row.request.try_into()?,
            from_user: row.sender.try_into()?,
        })
    }
}

pub struct FriendRow {
    pub user: SenderRow,
    pub since: String,
}

impl TryFrom<FriendRow> for Friend {
    type Error = anyhow::Error;

    fn try_from(row: FriendRow) -> Result<Self> {
        Ok(Friend {
            user_id: parse_id(&row.user.id)?,
            username: row.user.username,
            public_key: row.user.public_key,
            signing_key: row.user.signing_key,
            since: parse_time(&row.since)?,
        })
    }
}

pub struct MessageRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub encrypted_content: Vec<u8>,
    pub content_type: String,
    pub signature: String,
    pub created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Message {
            id: parse_id(&row.id)?,
            from_user_id: parse_id(&row.from_user_id)?,
            to_user_id: parse_id(&row.to_user_id)?,
            encrypted_content: row.encrypted_content,
            content_type: row.content_type.parse::<ContentType>().map_err(|e: String| anyhow!(e))?,
            signature: row.signature,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

pub struct InboxRow {
    pub message: MessageRow,
    pub from_username: String,
    pub from_public_key: String,
    pub from_signing_key: Option<String>,
}

impl TryFrom<InboxRow> for MessageWithSender {
    type Error = anyhow::Error;

    fn try_from(row: InboxRow) -> Result<Self> {
        Ok(MessageWithSender {
            message: row.message.try_into()?,
            from_username: row.from_username,
            from_public_key: row.from_public_key,
            from_signing_key: row.from_signing_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = "2024-05-01T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(format_time(earlier) < format_time(later));
        assert_eq!(parse_time(&format_time(later)).unwrap(), later);
    }

    #[test]
    fn bad_status_is_an_error() {
        let row = FriendRequestRow {
            id: Uuid::new_v4().to_string(),
            from_user_id: Uuid::new_v4().to_string(),
            to_user_id: Uuid::new_v4().to_string(),
            status: "maybe".into(),
            created_at: format_time(Utc::now()),
        };
        assert!(FriendRequest::try_from(row).is_err());
    }
}
