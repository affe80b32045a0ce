use std::sync::Arc;

use quickpic_types::models::UserPublic;

use crate::auth::fold_username;
use crate::error::{CoreError, Result};
use crate::store::UserStore;

/// Read-only lookups of other users' public identity.
pub struct UserDirectory {
    users: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub fn find_by_username(&self, username: &str) -> Result<UserPublic> {
        self.users
            .get_user_by_username(&fold_username(username))?
            .map(|u| u.to_public())
            .ok_or(CoreError::UserNotFound)
    }
}
