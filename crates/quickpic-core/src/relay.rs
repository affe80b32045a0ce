use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use quickpic_types::models::{ContentType, FriendPair, Message, MessageWithSender};

use crate::auth::fold_username;
use crate::error::{CoreError, RelayError, Result};
use crate::store::{FriendStore, MessageStore, UserStore};

/// What a sender hands the relay. Content and signature are opaque here.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub encrypted_content: Vec<u8>,
    pub content_type: ContentType,
    pub signature: String,
}

/// Friend-gated store-and-forward queue. A message lives until its
/// recipient acknowledges it.
pub struct MessageRelay {
    users: Arc<dyn UserStore>,
    friends: Arc<dyn FriendStore>,
    messages: Arc<dyn MessageStore>,
}

impl MessageRelay {
    pub fn new(
        users: Arc<dyn UserStore>,
        friends: Arc<dyn FriendStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            users,
            friends,
            messages,
        }
    }

    pub fn send(&self, from_user_id: Uuid, to_username: &str, outgoing: OutgoingMessage) -> Result<Message> {
        if outgoing.encrypted_content.is_empty() {
            return Err(CoreError::InvalidInput("encrypted_content is empty".into()));
        }
        if outgoing.signature.is_empty() {
            return Err(CoreError::InvalidInput("signature is empty".into()));
        }

        let recipient = self
            .users
            .get_user_by_username(&fold_username(to_username))?
            .ok_or(CoreError::UserNotFound)?;

        if recipient.id == from_user_id
            || !self
                .friends
                .friendship_exists(FriendPair::new(from_user_id, recipient.id))?
        {
            return Err(RelayError::NotFriends.into());
        }

        let message = Message {
            id: Uuid::new_v4(),
            from_user_id,
            to_user_id: recipient.id,
            encrypted_content: outgoing.encrypted_content,
            content_type: outgoing.content_type,
            signature: outgoing.signature,
            created_at: Utc::now(),
        };
        self.messages.create_message(&message)?;

        debug!(
            "Queued {} message {} ({} bytes) for {}",
            message.content_type,
            message.id,
            message.encrypted_content.len(),
            recipient.id
        );
        Ok(message)
    }

    /// Everything waiting for `user_id`, oldest first. Fetching does not
    /// consume; only [`acknowledge`](Self::acknowledge) does.
    pub fn fetch(&self, user_id: Uuid) -> Result<Vec<MessageWithSender>> {
        Ok(self.messages.pending_messages_for(user_id)?)
    }

    pub fn acknowledge(&self, message_id: Uuid, actor: Uuid) -> Result<()> {
        let message = self
            .messages
            .get_message(message_id)?
            .ok_or(RelayError::MessageNotFound)?;

        if message.to_user_id != actor {
            return Err(RelayError::Unauthorized.into());
        }
        // A concurrent acknowledge may have won.
        if !self.messages.delete_message(message_id)? {
            return Err(RelayError::MessageNotFound.into());
        }
        Ok(())
    }

    /// Drop undelivered messages created before `cutoff`.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let purged = self.messages.delete_messages_before(cutoff)?;
        if purged > 0 {
            info!("Purged {} undelivered messages older than {}", purged, cutoff);
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::Duration;
    use quickpic_types::models::{Friendship, User};

    struct Fixture {
        store: Arc<MemoryStore>,
        relay: MessageRelay,
        alice: Uuid,
        bob: Uuid,
        carol: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let user = User {
                id: Uuid::new_v4(),
                user_number: 0,
                username: name.into(),
                password_hash: "x".into(),
                public_key: format!("{name}-pk"),
                signing_key: None,
                created_at: Utc::now(),
            };
            store.create_user(&user).unwrap();
            ids.push(user.id);
        }
        Fixture {
            relay: MessageRelay::new(store.clone(), store.clone(), store.clone()),
            store,
            alice: ids[0],
            bob: ids[1],
            carol: ids[2],
        }
    }

    fn befriend(store: &MemoryStore, a: Uuid, b: Uuid) {
        let request = quickpic_types::models::FriendRequest {
            id: Uuid::new_v4(),
            from_user_id: a,
            to_user_id: b,
            status: quickpic_types::models::FriendRequestStatus::Pending,
            created_at: Utc::now(),
        };
        store.create_request(&request).unwrap();
        let friendship = Friendship {
            id: Uuid::new_v4(),
            pair: FriendPair::new(a, b),
            created_at: Utc::now(),
        };
        assert!(store.accept_request(request.id, &friendship).unwrap());
    }

    fn text(body: &[u8]) -> OutgoingMessage {
        OutgoingMessage {
            encrypted_content: body.to_vec(),
            content_type: ContentType::Text,
            signature: "sig".into(),
        }
    }

    #[test]
    fn strangers_cannot_send() {
        let f = fixture();
        assert!(matches!(
            f.relay.send(f.alice, "bob", text(b"hi")),
            Err(CoreError::Relay(RelayError::NotFriends))
        ));
        assert!(f.relay.fetch(f.bob).unwrap().is_empty());
    }

    #[test]
    fn self_send_is_not_friends() {
        let f = fixture();
        assert!(matches!(
            f.relay.send(f.alice, "alice", text(b"hi")),
            Err(CoreError::Relay(RelayError::NotFriends))
        ));
    }

    #[test]
    fn unknown_recipient_is_user_not_found() {
        let f = fixture();
        assert!(matches!(
            f.relay.send(f.alice, "zed", text(b"hi")),
            Err(CoreError::UserNotFound)
        ));
    }

    #[test]
    fn empty_payload_is_rejected() {
        let f = fixture();
        befriend(&f.store, f.alice, f.bob);
        assert!(matches!(
            f.relay.send(f.alice, "bob", text(b"")),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn fetch_is_fifo_and_joined_with_sender() {
        let f = fixture();
        befriend(&f.store, f.alice, f.bob);

        let first = f.relay.send(f.alice, "bob", text(b"one")).unwrap();
        let second = f.relay.send(f.alice, "BOB", text(b"two")).unwrap();

        let inbox = f.relay.fetch(f.bob).unwrap();
        let ids: Vec<Uuid> = inbox.iter().map(|m| m.message.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(inbox[0].from_username, "alice");
        assert_eq!(inbox[0].from_public_key, "alice-pk");

        // Fetch does not consume.
        assert_eq!(f.relay.fetch(f.bob).unwrap().len(), 2);
        assert!(f.relay.fetch(f.alice).unwrap().is_empty());
    }

    #[test]
    fn acknowledge_deletes_exactly_once() {
        let f = fixture();
        befriend(&f.store, f.alice, f.bob);
        let sent = f.relay.send(f.alice, "bob", text(b"hi")).unwrap();

        f.relay.acknowledge(sent.id, f.bob).unwrap();
        assert!(f.relay.fetch(f.bob).unwrap().is_empty());
        assert!(matches!(
            f.relay.acknowledge(sent.id, f.bob),
            Err(CoreError::Relay(RelayError::MessageNotFound))
        ));
    }

    #[test]
    fn only_recipient_may_acknowledge() {
        let f = fixture();
        befriend(&f.store, f.alice, f.bob);
        let sent = f.relay.send(f.alice, "bob", text(b"hi")).unwrap();

        for intruder in [f.alice, f.carol] {
            assert!(matches!(
                f.relay.acknowledge(sent.id, intruder),
                Err(CoreError::Relay(RelayError::Unauthorized))
            ));
        }
        assert_eq!(f.relay.fetch(f.bob).unwrap().len(), 1);
    }

    #[test]
    fn purge_respects_cutoff() {
        let f = fixture();
        befriend(&f.store, f.alice, f.bob);
        f.relay.send(f.alice, "bob", text(b"hi")).unwrap();

        assert_eq!(f.relay.purge_older_than(Utc::now() - Duration::hours(1)).unwrap(), 0);
        assert_eq!(f.relay.purge_older_than(Utc::now() + Duration::seconds(1)).unwrap(), 1);
        assert!(f.relay.fetch(f.bob).unwrap().is_empty());
    }
}
