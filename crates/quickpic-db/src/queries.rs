use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row, params};
use uuid::Uuid;

use quickpic_core::{FriendStore, MessageStore, StoreError, StoreResult, UserStore};
use quickpic_types::models::{
    Friend, FriendPair, FriendRequest, FriendRequestStatus, FriendRequestWithUser, Friendship,
    Message, MessageWithSender, RefreshToken, User,
};

use crate::Database;
use crate::models::{
    FriendRequestRow, FriendRow, InboxRow, MessageRow, PendingRequestRow, RefreshTokenRow,
    SenderRow, UserRow, format_time,
};

const USER_COLUMNS: &str =
    "id, user_number, username, password_hash, public_key, signing_key, created_at";
const REQUEST_COLUMNS: &str = "id, from_user_id, to_user_id, status, created_at";
const MESSAGE_COLUMNS: &str =
    "id, from_user_id, to_user_id, encrypted_content, content_type, signature, created_at";

// -- Users --

impl UserStore for Database {
    fn create_user(&self, user: &User) -> StoreResult<i64> {
        // Number assignment and insert are one statement, so two registrations
        // can never read the same MAX.
        self.with_conn(|conn| {
            let user_number = conn.query_row(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS})
                     SELECT ?1, COALESCE(MAX(user_number), 0) + 1, ?2, ?3, ?4, ?5, ?6 FROM users
                     RETURNING user_number"
                ),
                params![
                    user.id.to_string(),
                    user.username,
                    user.password_hash,
                    user.public_key,
                    user.signing_key,
                    format_time(user.created_at),
                ],
                |row| row.get(0),
            )?;
            Ok(user_number)
        })
        .map_err(|e| conflict_or_backend(e, "username"))
    }

    fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.with_conn(|conn| query_user(conn, "id", &id.to_string()))?)
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.with_conn(|conn| query_user(conn, "username", username))?)
    }

    fn store_refresh_token(&self, token: &RefreshToken) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO refresh_tokens (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![
                    token.token_hash,
                    token.user_id.to_string(),
                    format_time(token.expires_at),
                ],
            )?;
            Ok(())
        })
        .map_err(|e| conflict_or_backend(e, "refresh token"))
    }

    fn take_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "DELETE FROM refresh_tokens WHERE token_hash = ?1
                     RETURNING token_hash, user_id, expires_at",
                    [token_hash],
                    |row| {
                        Ok(RefreshTokenRow {
                            token_hash: row.get(0)?,
                            user_id: row.get(1)?,
                            expires_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            row.map(RefreshToken::try_from).transpose()
        })?)
    }

    fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM refresh_tokens WHERE token_hash = ?1", [token_hash])?;
            Ok(n > 0)
        })?)
    }

    fn delete_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM refresh_tokens WHERE user_id = ?1",
                [user_id.to_string()],
            )?;
            Ok(n as u64)
        })?)
    }

    fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
                [format_time(now)],
            )?;
            Ok(n as u64)
        })?)
    }
}

// -- Friends --

impl FriendStore for Database {
    fn create_request(&self, request: &FriendRequest) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO friend_requests ({REQUEST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
                params![
                    request.id.to_string(),
                    request.from_user_id.to_string(),
                    request.to_user_id.to_string(),
                    request.status.as_str(),
                    format_time(request.created_at),
                ],
            )?;
            Ok(())
        })
        .map_err(|e| conflict_or_backend(e, "pending friend request"))
    }

    fn get_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>> {
        Ok(self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE id = ?1"),
                    [id.to_string()],
                    |row| request_row(row, 0),
                )
                .optional()?;
            row.map(FriendRequest::try_from).transpose()
        })?)
    }

    fn pending_request_between(&self, pair: FriendPair) -> StoreResult<Option<FriendRequest>> {
        Ok(self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {REQUEST_COLUMNS} FROM friend_requests
                         WHERE status = 'pending'
                           AND ((from_user_id = ?1 AND to_user_id = ?2)
                             OR (from_user_id = ?2 AND to_user_id = ?1))"
                    ),
                    [pair.low().to_string(), pair.high().to_string()],
                    |row| request_row(row, 0),
                )
                .optional()?;
            row.map(FriendRequest::try_from).transpose()
        })?)
    }

    fn pending_requests_for(&self, user_id: Uuid) -> StoreResult<Vec<FriendRequestWithUser>> {
        Ok(self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.from_user_id, r.to_user_id, r.status, r.created_at,
                        u.id, u.user_number, u.username, u.public_key, u.signing_key
                 FROM friend_requests r
                 JOIN users u ON u.id = r.from_user_id
                 WHERE r.to_user_id = ?1 AND r.status = 'pending'
                 ORDER BY r.created_at DESC, r.rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(PendingRequestRow {
                        request: request_row(row, 0)?,
                        sender: sender_row(row, 5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(FriendRequestWithUser::try_from).collect()
        })?)
    }

    fn resolve_request(&self, id: Uuid, status: FriendRequestStatus) -> StoreResult<bool> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE friend_requests SET status = ?2 WHERE id = ?1 AND status = 'pending'",
                params![id.to_string(), status.as_str()],
            )?;
            Ok(n > 0)
        })?)
    }

    fn accept_request(&self, id: Uuid, friendship: &Friendship) -> StoreResult<bool> {
        Ok(self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE friend_requests SET status = 'accepted' WHERE id = ?1 AND status = 'pending'",
                [id.to_string()],
            )?;
            if updated == 0 {
                return Ok(false);
            }

            tx.execute(
                "INSERT OR IGNORE INTO friendships (id, user_a_id, user_b_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    friendship.id.to_string(),
                    friendship.pair.low().to_string(),
                    friendship.pair.high().to_string(),
                    format_time(friendship.created_at),
                ],
            )?;

            tx.commit()?;
            Ok(true)
        })?)
    }

    fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool> {
        Ok(self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM friendships WHERE user_a_id = ?1 AND user_b_id = ?2)",
                [pair.low().to_string(), pair.high().to_string()],
                |row| row.get(0),
            )?;
            Ok(exists)
        })?)
    }

    fn list_friends(&self, user_id: Uuid) -> StoreResult<Vec<Friend>> {
        Ok(self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.user_number, u.username, u.public_key, u.signing_key, f.created_at
                 FROM friendships f
                 JOIN users u ON u.id = CASE WHEN f.user_a_id = ?1 THEN f.user_b_id ELSE f.user_a_id END
                 WHERE f.user_a_id = ?1 OR f.user_b_id = ?1
                 ORDER BY u.username",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(FriendRow {
                        user: sender_row(row, 0)?,
                        since: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Friend::try_from).collect()
        })?)
    }
}

// -- Messages --

impl MessageStore for Database {
    fn create_message(&self, message: &Message) -> StoreResult<()> {
        Ok(self.with_conn(|conn| {
            conn.execute(
                &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    message.id.to_string(),
                    message.from_user_id.to_string(),
                    message.to_user_id.to_string(),
                    message.encrypted_content,
                    message.content_type.as_str(),
                    message.signature,
                    format_time(message.created_at),
                ],
            )?;
            Ok(())
        })?)
    }

    fn pending_messages_for(&self, user_id: Uuid) -> StoreResult<Vec<MessageWithSender>> {
        // JOIN users so the recipient gets sender keys in a single query
        Ok(self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.from_user_id, m.to_user_id, m.encrypted_content, m.content_type,
                        m.signature, m.created_at, u.username, u.public_key, u.signing_key
                 FROM messages m
                 JOIN users u ON u.id = m.from_user_id
                 WHERE m.to_user_id = ?1
                 ORDER BY m.created_at ASC, m.rowid ASC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(InboxRow {
                        message: message_row(row)?,
                        from_username: row.get(7)?,
                        from_public_key: row.get(8)?,
                        from_signing_key: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(MessageWithSender::try_from).collect()
        })?)
    }

    fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                    [id.to_string()],
                    message_row,
                )
                .optional()?;
            row.map(Message::try_from).transpose()
        })?)
    }

    fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })?)
    }

    fn delete_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM messages WHERE created_at < ?1",
                [format_time(cutoff)],
            )?;
            Ok(n as u64)
        })?)
    }
}

// -- Row mapping --

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                user_number: row.get(1)?,
                username: row.get(2)?,
                password_hash: row.get(3)?,
                public_key: row.get(4)?,
                signing_key: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    row.map(User::try_from).transpose()
}

fn request_row(row: &Row<'_>, start: usize) -> rusqlite::Result<FriendRequestRow> {
    Ok(FriendRequestRow {
        id: row.get(start)?,
        from_user_id: row.get(start + 1)?,
        to_user_id: row.get(start + 2)?,
        status: row.get(start + 3)?,
        created_at: row.get(start + 4)?,
    })
}

fn sender_row(row: &Row<'_>, start: usize) -> rusqlite::Result<SenderRow> {
    Ok(SenderRow {
        id: row.get(start)?,
        user_number: row.get(start + 1)?,
        username: row.get(start + 2)?,
        public_key: row.get(start + 3)?,
        signing_key: row.get(start + 4)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        encrypted_content: row.get(3)?,
        content_type: row.get(4)?,
        signature: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Unique and check constraints become `Conflict`; anything else is opaque.
fn conflict_or_backend(err: anyhow::Error, what: &'static str) -> StoreError {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(what)
        }
        _ => StoreError::Backend(err),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quickpic_types::models::ContentType;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn user(db: &Database, name: &str) -> User {
        let mut user = User {
            id: Uuid::new_v4(),
            user_number: 0,
            username: name.into(),
            password_hash: "hash".into(),
            public_key: format!("{name}-pk"),
            signing_key: (name == "alice").then(|| "alice-sk".to_string()),
            created_at: Utc::now(),
        };
        user.user_number = db.create_user(&user).unwrap();
        user
    }

    fn request(from: &User, to: &User) -> FriendRequest {
        FriendRequest {
            id: Uuid::new_v4(),
            from_user_id: from.id,
            to_user_id: to.id,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn message(from: &User, to: &User, body: &[u8], at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            from_user_id: from.id,
            to_user_id: to.id,
            encrypted_content: body.to_vec(),
            content_type: ContentType::Text,
            signature: "sig".into(),
            created_at: at,
        }
    }

    #[test]
    fn user_roundtrip_and_unique_username() {
        let db = db();
        let alice = user(&db, "alice");

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert_eq!(by_name.signing_key.as_deref(), Some("alice-sk"));
        assert_eq!(db.get_user_by_id(alice.id).unwrap().unwrap().username, "alice");
        assert!(db.get_user_by_username("nobody").unwrap().is_none());

        let mut dup = alice.clone();
        dup.id = Uuid::new_v4();
        assert!(matches!(db.create_user(&dup), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn user_numbers_count_up_from_one() {
        let db = db();
        let numbers: Vec<i64> = ["alice", "bob", "carol"]
            .iter()
            .map(|name| user(&db, name).user_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(db.get_user_by_username("carol").unwrap().unwrap().user_number, 3);
    }

    #[test]
    fn refresh_tokens_are_taken_once_and_purged_when_expired() {
        let db = db();
        let alice = user(&db, "alice");
        let now = Utc::now();

        for (hash, ttl) in [("live", Duration::days(7)), ("stale", Duration::days(-1))] {
            db.store_refresh_token(&RefreshToken {
                token_hash: hash.into(),
                user_id: alice.id,
                expires_at: now + ttl,
            })
            .unwrap();
        }

        assert_eq!(db.purge_expired_refresh_tokens(now).unwrap(), 1);
        let taken = db.take_refresh_token("live").unwrap().unwrap();
        assert_eq!(taken.user_id, alice.id);
        assert!(db.take_refresh_token("live").unwrap().is_none());
        assert!(!db.delete_refresh_token("live").unwrap());
    }

    #[test]
    fn delete_all_refresh_tokens_only_touches_owner() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let expires_at = Utc::now() + Duration::days(1);
        for (hash, owner) in [("a1", &alice), ("a2", &alice), ("b1", &bob)] {
            db.store_refresh_token(&RefreshToken {
                token_hash: hash.into(),
                user_id: owner.id,
                expires_at,
            })
            .unwrap();
        }

        assert_eq!(db.delete_all_refresh_tokens(alice.id).unwrap(), 2);
        assert!(db.take_refresh_token("b1").unwrap().is_some());
    }

    #[test]
    fn partial_index_allows_one_pending_request_per_pair() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let first = request(&alice, &bob);
        db.create_request(&first).unwrap();
        assert!(matches!(
            db.create_request(&request(&bob, &alice)),
            Err(StoreError::Conflict(_))
        ));

        let found = db
            .pending_request_between(FriendPair::new(bob.id, alice.id))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);

        // Once resolved, the pair may try again.
        assert!(db.resolve_request(first.id, FriendRequestStatus::Rejected).unwrap());
        assert!(!db.resolve_request(first.id, FriendRequestStatus::Accepted).unwrap());
        db.create_request(&request(&bob, &alice)).unwrap();
    }

    #[test]
    fn accept_creates_canonical_friendship_atomically() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");

        let req = request(&bob, &alice);
        db.create_request(&req).unwrap();
        assert_eq!(db.pending_requests_for(alice.id).unwrap().len(), 1);
        assert_eq!(db.pending_requests_for(alice.id).unwrap()[0].from_user.username, "bob");

        let friendship = Friendship {
            id: Uuid::new_v4(),
            pair: req.pair(),
            created_at: Utc::now(),
        };
        assert!(db.accept_request(req.id, &friendship).unwrap());
        assert!(!db.accept_request(req.id, &friendship).unwrap());

        assert!(db.friendship_exists(FriendPair::new(alice.id, bob.id)).unwrap());
        assert!(db.friendship_exists(FriendPair::new(bob.id, alice.id)).unwrap());
        assert!(!db.friendship_exists(FriendPair::new(alice.id, carol.id)).unwrap());
        assert!(db.pending_requests_for(alice.id).unwrap().is_empty());
        assert_eq!(
            db.get_request(req.id).unwrap().unwrap().status,
            FriendRequestStatus::Accepted
        );

        let friends = db.list_friends(bob.id).unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "alice");
        assert_eq!(friends[0].signing_key.as_deref(), Some("alice-sk"));
    }

    #[test]
    fn list_friends_is_ordered_by_username() {
        let db = db();
        let me = user(&db, "mike");
        for name in ["zoe", "adam", "lena"] {
            let other = user(&db, name);
            let req = request(&other, &me);
            db.create_request(&req).unwrap();
            let friendship = Friendship {
                id: Uuid::new_v4(),
                pair: req.pair(),
                created_at: Utc::now(),
            };
            db.accept_request(req.id, &friendship).unwrap();
        }

        let names: Vec<String> = db.list_friends(me.id).unwrap().into_iter().map(|f| f.username).collect();
        assert_eq!(names, ["adam", "lena", "zoe"]);
    }

    #[test]
    fn inbox_is_oldest_first_with_sender_keys() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let now = Utc::now();

        let newer = message(&alice, &bob, b"second", now);
        let older = message(&alice, &bob, b"first", now - Duration::seconds(5));
        db.create_message(&newer).unwrap();
        db.create_message(&older).unwrap();

        let inbox = db.pending_messages_for(bob.id).unwrap();
        let bodies: Vec<&[u8]> = inbox.iter().map(|m| m.message.encrypted_content.as_slice()).collect();
        assert_eq!(bodies, [b"first".as_slice(), b"second".as_slice()]);
        assert_eq!(inbox[0].from_username, "alice");
        assert_eq!(inbox[0].from_public_key, "alice-pk");
        assert_eq!(inbox[0].from_signing_key.as_deref(), Some("alice-sk"));
        assert!(db.pending_messages_for(alice.id).unwrap().is_empty());
    }

    #[test]
    fn delete_and_retention_purge() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let now = Utc::now();

        let old = message(&alice, &bob, b"old", now - Duration::hours(48));
        let fresh = message(&alice, &bob, b"fresh", now);
        db.create_message(&old).unwrap();
        db.create_message(&fresh).unwrap();

        assert_eq!(db.delete_messages_before(now - Duration::hours(24)).unwrap(), 1);
        assert!(db.get_message(old.id).unwrap().is_none());

        let stored = db.get_message(fresh.id).unwrap().unwrap();
        assert_eq!(stored.to_user_id, bob.id);
        assert!(db.delete_message(fresh.id).unwrap());
        assert!(!db.delete_message(fresh.id).unwrap());
    }
}
