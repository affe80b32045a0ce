//! Protocol core: sessions, the friend graph and the message relay.
//!
//! Services only talk to storage through the traits in [`store`], so the
//! same logic runs over SQLite, the in-memory backend, or anything else
//! that implements them.

pub mod auth;
pub mod error;
pub mod friends;
pub mod memory;
pub mod password;
pub mod relay;
pub mod store;
pub mod users;

pub use auth::{AuthConfig, AuthService};
pub use error::{CoreError, FriendStateError, RelayError, Result, TokenError};
pub use friends::FriendGraph;
pub use memory::MemoryStore;
pub use password::PasswordParams;
pub use relay::{MessageRelay, OutgoingMessage};
pub use store::{FriendStore, MessageStore, StoreError, StoreResult, Stores, UserStore};
pub use users::UserDirectory;
