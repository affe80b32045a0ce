use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use quickpic_types::models::{
    Friend, FriendPair, FriendRequest, FriendRequestStatus, FriendRequestWithUser, Friendship,
    Message, MessageWithSender, RefreshToken, User,
};

use crate::store::{FriendStore, MessageStore, StoreError, StoreResult, UserStore};

/// Process-local backend. Everything lives behind one lock, so every
/// trait method is atomic. Refresh tokens are a keyed map like any other
/// table; nothing here is global.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, RefreshToken>,
    requests: HashMap<Uuid, FriendRequest>,
    friendships: HashMap<FriendPair, Friendship>,
    /// Insertion order doubles as the FIFO tie-breaker.
    messages: Vec<Message>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Backend(anyhow!("memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Backend(anyhow!("memory store lock poisoned: {}", e)))
    }
}

impl Inner {
    fn pending_between(&self, pair: FriendPair) -> Option<&FriendRequest> {
        self.requests
            .values()
            .find(|r| r.status == FriendRequestStatus::Pending && r.pair() == pair)
    }
}

impl UserStore for MemoryStore {
    fn create_user(&self, user: &User) -> StoreResult<i64> {
        let mut inner = self.write()?;
        if inner.usernames.contains_key(&user.username) {
            return Err(StoreError::Conflict("username"));
        }
        let user_number = inner.users.values().map(|u| u.user_number).max().unwrap_or(0) + 1;
        inner.usernames.insert(user.username.clone(), user.id);
        inner.users.insert(
            user.id,
            User {
                user_number,
                ..user.clone()
            },
        );
        Ok(user_number)
    }

    fn get_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    fn store_refresh_token(&self, token: &RefreshToken) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Conflict("refresh token"));
        }
        inner
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    fn take_refresh_token(&self, token_hash: &str) -> StoreResult<Option<RefreshToken>> {
        Ok(self.write()?.refresh_tokens.remove(token_hash))
    }

    fn delete_refresh_token(&self, token_hash: &str) -> StoreResult<bool> {
        Ok(self.write()?.refresh_tokens.remove(token_hash).is_some())
    }

    fn delete_all_refresh_tokens(&self, user_id: Uuid) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - inner.refresh_tokens.len()) as u64)
    }

    fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, t| !t.is_expired(now));
        Ok((before - inner.refresh_tokens.len()) as u64)
    }
}

impl FriendStore for MemoryStore {
    fn create_request(&self, request: &FriendRequest) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.pending_between(request.pair()).is_some() {
            return Err(StoreError::Conflict("pending friend request"));
        }
        inner.requests.insert(request.id, request.clone());
        Ok(())
    }

    fn get_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>> {
        Ok(self.read()?.requests.get(&id).cloned())
    }

    fn pending_request_between(&self, pair: FriendPair) -> StoreResult<Option<FriendRequest>> {
        Ok(self.read()?.pending_between(pair).cloned())
    }

    fn pending_requests_for(&self, user_id: Uuid) -> StoreResult<Vec<FriendRequestWithUser>> {
        let inner = self.read()?;
        let mut pending: Vec<FriendRequestWithUser> = inner
            .requests
            .values()
            .filter(|r| r.to_user_id == user_id && r.status == FriendRequestStatus::Pending)
            .filter_map(|r| {
                inner.users.get(&r.from_user_id).map(|sender| FriendRequestWithUser {
                    request: r.clone(),
                    from_user: sender.to_public(),
                })
            })
            .collect();
        pending.sort_by(|a, b| b.request.created_at.cmp(&a.request.created_at));
        Ok(pending)
    }

    fn resolve_request(&self, id: Uuid, status: FriendRequestStatus) -> StoreResult<bool> {
        let mut inner = self.write()?;
        match inner.requests.get_mut(&id) {
            Some(r) if r.status == FriendRequestStatus::Pending => {
                r.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn accept_request(&self, id: Uuid, friendship: &Friendship) -> StoreResult<bool> {
        let mut inner = self.write()?;
        match inner.requests.get_mut(&id) {
            Some(r) if r.status == FriendRequestStatus::Pending => {
                r.status = FriendRequestStatus::Accepted;
            }
            _ => return Ok(false),
        }
        inner
            .friendships
            .entry(friendship.pair)
            .or_insert_with(|| friendship.clone());
        Ok(true)
    }

    fn friendship_exists(&self, pair: FriendPair) -> StoreResult<bool> {
        Ok(self.read()?.friendships.contains_key(&pair))
    }

    fn list_friends(&self, user_id: Uuid) -> StoreResult<Vec<Friend>> {
        let inner = self.read()?;
        let mut friends: Vec<Friend> = inner
            .friendships
            .values()
            .filter_map(|f| {
                let other = f.pair.other(user_id)?;
                let user = inner.users.get(&other)?;
                Some(Friend {
                    user_id: user.id,
                    username: user.username.clone(),
                    public_key: user.public_key.clone(),
                    signing_key: user.signing_key.clone(),
                    since: f.created_at,
                })
            })
            .collect();
        friends.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(friends)
    }
}

impl MessageStore for MemoryStore {
    fn create_message(&self, message: &Message) -> StoreResult<()> {
        self.write()?.messages.push(message.clone());
        Ok(())
    }

    fn pending_messages_for(&self, user_id: Uuid) -> StoreResult<Vec<MessageWithSender>> {
        let inner = self.read()?;
        let mut pending: Vec<MessageWithSender> = inner
            .messages
            .iter()
            .filter(|m| m.to_user_id == user_id)
            .filter_map(|m| {
                inner.users.get(&m.from_user_id).map(|sender| MessageWithSender {
                    message: m.clone(),
                    from_username: sender.username.clone(),
                    from_public_key: sender.public_key.clone(),
                    from_signing_key: sender.signing_key.clone(),
                })
            })
            .collect();
        // Stable: equal timestamps keep insertion order.
        pending.sort_by_key(|m| m.message.created_at);
        Ok(pending)
    }

    fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        Ok(self.read()?.messages.iter().find(|m| m.id == id).cloned())
    }

    fn delete_message(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.write()?;
        let before = inner.messages.len();
        inner.messages.retain(|m| m.id != id);
        Ok(inner.messages.len() < before)
    }

    fn delete_messages_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let before = inner.messages.len();
        inner.messages.retain(|m| m.created_at >= cutoff);
        Ok((before - inner.messages.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quickpic_types::models::ContentType;

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            user_number: 0,
            username: name.to_string(),
            password_hash: "hash".into(),
            public_key: "pk".into(),
            signing_key: None,
            created_at: Utc::now(),
        }
    }

    fn request(from: Uuid, to: Uuid) -> FriendRequest {
        FriendRequest {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(&user("alice")).unwrap();
        assert!(matches!(
            store.create_user(&user("alice")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn user_numbers_are_sequential() {
        let store = MemoryStore::new();
        let numbers: Vec<i64> = ["alice", "bob", "carol"]
            .iter()
            .map(|name| store.create_user(&user(name)).unwrap())
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let bob = store.get_user_by_username("bob").unwrap().unwrap();
        assert_eq!(bob.user_number, 2);

        // A rejected duplicate does not consume a number.
        assert!(store.create_user(&user("alice")).is_err());
        assert_eq!(store.create_user(&user("dave")).unwrap(), 4);
    }

    #[test]
    fn refresh_token_can_be_taken_once() {
        let store = MemoryStore::new();
        let token = RefreshToken {
            token_hash: "h".into(),
            user_id: Uuid::new_v4(),
            expires_at: Utc::now() + Duration::days(7),
        };
        store.store_refresh_token(&token).unwrap();

        assert_eq!(store.take_refresh_token("h").unwrap(), Some(token));
        assert_eq!(store.take_refresh_token("h").unwrap(), None);
    }

    #[test]
    fn pending_request_is_unique_per_unordered_pair() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        store.create_request(&request(a, b)).unwrap();
        assert!(matches!(
            store.create_request(&request(b, a)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn accept_is_one_shot() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let req = request(a, b);
        store.create_request(&req).unwrap();

        let friendship = Friendship {
            id: Uuid::new_v4(),
            pair: FriendPair::new(a, b),
            created_at: Utc::now(),
        };
        assert!(store.accept_request(req.id, &friendship).unwrap());
        assert!(!store.accept_request(req.id, &friendship).unwrap());
        assert!(!store.resolve_request(req.id, FriendRequestStatus::Rejected).unwrap());
        assert!(store.friendship_exists(FriendPair::new(b, a)).unwrap());
    }

    #[test]
    fn retention_purge_keeps_recent_messages() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for age in [10, 1] {
            store
                .create_message(&Message {
                    id: Uuid::new_v4(),
                    from_user_id: Uuid::new_v4(),
                    to_user_id: Uuid::new_v4(),
                    encrypted_content: vec![1, 2, 3],
                    content_type: ContentType::Text,
                    signature: "sig".into(),
                    created_at: now - Duration::hours(age),
                })
                .unwrap();
        }
        assert_eq!(store.delete_messages_before(now - Duration::hours(5)).unwrap(), 1);
        assert_eq!(store.read().unwrap().messages.len(), 1);
    }
}
