use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use quickpic_types::models::{
    Friend, FriendPair, FriendRequest, FriendRequestStatus, FriendRequestWithUser, Friendship,
};

use crate::auth::fold_username;
use crate::error::{CoreError, FriendStateError, Result};
use crate::store::{FriendStore, StoreError, UserStore};

/// Friend requests and the symmetric friendship relation built from them.
pub struct FriendGraph {
    users: Arc<dyn UserStore>,
    friends: Arc<dyn FriendStore>,
}

impl FriendGraph {
    pub fn new(users: Arc<dyn UserStore>, friends: Arc<dyn FriendStore>) -> Self {
        Self { users, friends }
    }

    pub fn create_request(&self, from_user_id: Uuid, to_username: &str) -> Result<FriendRequest> {
        let target = self
            .users
            .get_user_by_username(&fold_username(to_username))?
            .ok_or(CoreError::UserNotFound)?;

        if target.id == from_user_id {
            return Err(FriendStateError::CannotAddSelf.into());
        }

        let pair = FriendPair::new(from_user_id, target.id);
        if self.friends.pending_request_between(pair)?.is_some() {
            return Err(FriendStateError::RequestExists.into());
        }
        if self.friends.friendship_exists(pair)? {
            return Err(FriendStateError::AlreadyFriends.into());
        }

        let request = FriendRequest {
            id: Uuid::new_v4(),
            from_user_id,
            to_user_id: target.id,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        };

        match self.friends.create_request(&request) {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(FriendStateError::RequestExists.into()),
            Err(e) => return Err(e.into()),
        }

        info!("Friend request {} from {} to {}", request.id, from_user_id, target.id);
        Ok(request)
    }

    /// Only the addressee may accept.
    pub fn accept(&self, request_id: Uuid, actor: Uuid) -> Result<Friendship> {
        let request = self.pending_for(request_id, actor)?;

        let friendship = Friendship {
            id: Uuid::new_v4(),
            pair: request.pair(),
            created_at: Utc::now(),
        };
        // Another accept or reject may have landed since the read above.
        if !self.friends.accept_request(request.id, &friendship)? {
            return Err(FriendStateError::NotFound.into());
        }

        info!("{} and {} are now friends", request.from_user_id, request.to_user_id);
        Ok(friendship)
    }

    pub fn reject(&self, request_id: Uuid, actor: Uuid) -> Result<()> {
        let request = self.pending_for(request_id, actor)?;

        if !self
            .friends
            .resolve_request(request.id, FriendRequestStatus::Rejected)?
        {
            return Err(FriendStateError::NotFound.into());
        }
        Ok(())
    }

    pub fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        if a == b {
            return Ok(false);
        }
        Ok(self.friends.friendship_exists(FriendPair::new(a, b))?)
    }

    pub fn pending_requests(&self, user_id: Uuid) -> Result<Vec<FriendRequestWithUser>> {
        Ok(self.friends.pending_requests_for(user_id)?)
    }

    pub fn friends(&self, user_id: Uuid) -> Result<Vec<Friend>> {
        Ok(self.friends.list_friends(user_id)?)
    }

    fn pending_for(&self, request_id: Uuid, actor: Uuid) -> Result<FriendRequest> {
        let request = self
            .friends
            .get_request(request_id)?
            .ok_or(FriendStateError::NotFound)?;

        if request.to_user_id != actor {
            return Err(FriendStateError::Unauthorized.into());
        }
        if request.status != FriendRequestStatus::Pending {
            return Err(FriendStateError::NotFound.into());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use quickpic_types::models::User;

    struct Fixture {
        graph: FriendGraph,
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
                public_key: "pk".into(),
                signing_key: None,
                created_at: Utc::now(),
            };
            store.create_user(&user).unwrap();
            ids.push(user.id);
        }
        Fixture {
            graph: FriendGraph::new(store.clone(), store),
            alice: ids[0],
            bob: ids[1],
            carol: ids[2],
        }
    }

    fn friend_err(r: Result<impl std::fmt::Debug>) -> FriendStateError {
        match r {
            Err(CoreError::Friend(e)) => e,
            other => panic!("expected friend state error, got {:?}", other),
        }
    }

    #[test]
    fn request_then_accept_makes_friends_both_ways() {
        let f = fixture();
        let req = f.graph.create_request(f.alice, "Bob").unwrap();
        assert_eq!(req.to_user_id, f.bob);

        let pending = f.graph.pending_requests(f.bob).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].from_user.username, "alice");

        f.graph.accept(req.id, f.bob).unwrap();
        assert!(f.graph.are_friends(f.alice, f.bob).unwrap());
        assert!(f.graph.are_friends(f.bob, f.alice).unwrap());
        assert!(f.graph.pending_requests(f.bob).unwrap().is_empty());

        let alice_friends = f.graph.friends(f.alice).unwrap();
        assert_eq!(alice_friends.len(), 1);
        assert_eq!(alice_friends[0].user_id, f.bob);
    }

    #[test]
    fn cannot_add_self() {
        let f = fixture();
        assert_eq!(
            friend_err(f.graph.create_request(f.alice, "alice")),
            FriendStateError::CannotAddSelf
        );
    }

    #[test]
    fn unknown_target_is_user_not_found() {
        let f = fixture();
        assert!(matches!(
            f.graph.create_request(f.alice, "nobody"),
            Err(CoreError::UserNotFound)
        ));
    }

    #[test]
    fn pending_request_blocks_either_direction() {
        let f = fixture();
        f.graph.create_request(f.alice, "bob").unwrap();
        assert_eq!(
            friend_err(f.graph.create_request(f.alice, "bob")),
            FriendStateError::RequestExists
        );
        assert_eq!(
            friend_err(f.graph.create_request(f.bob, "alice")),
            FriendStateError::RequestExists
        );
    }

    #[test]
    fn existing_friendship_blocks_new_request() {
        let f = fixture();
        let req = f.graph.create_request(f.alice, "bob").unwrap();
        f.graph.accept(req.id, f.bob).unwrap();
        assert_eq!(
            friend_err(f.graph.create_request(f.bob, "alice")),
            FriendStateError::AlreadyFriends
        );
    }

    #[test]
    fn only_addressee_may_resolve() {
        let f = fixture();
        let req = f.graph.create_request(f.alice, "bob").unwrap();
        assert_eq!(friend_err(f.graph.accept(req.id, f.alice)), FriendStateError::Unauthorized);
        assert_eq!(friend_err(f.graph.reject(req.id, f.carol)), FriendStateError::Unauthorized);
    }

    #[test]
    fn resolved_request_is_not_found() {
        let f = fixture();
        let req = f.graph.create_request(f.alice, "bob").unwrap();
        f.graph.reject(req.id, f.bob).unwrap();

        assert_eq!(friend_err(f.graph.accept(req.id, f.bob)), FriendStateError::NotFound);
        assert_eq!(friend_err(f.graph.reject(req.id, f.bob)), FriendStateError::NotFound);
        assert!(!f.graph.are_friends(f.alice, f.bob).unwrap());
        assert_eq!(
            friend_err(f.graph.accept(Uuid::new_v4(), f.bob)),
            FriendStateError::NotFound
        );
    }

    #[test]
    fn rejected_pair_can_try_again() {
        let f = fixture();
        let first = f.graph.create_request(f.alice, "bob").unwrap();
        f.graph.reject(first.id, f.bob).unwrap();

        let second = f.graph.create_request(f.bob, "alice").unwrap();
        f.graph.accept(second.id, f.alice).unwrap();
        assert!(f.graph.are_friends(f.alice, f.bob).unwrap());
    }

    #[test]
    fn nobody_is_their_own_friend() {
        let f = fixture();
        assert!(!f.graph.are_friends(f.alice, f.alice).unwrap());
    }
}
