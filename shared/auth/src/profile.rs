use models::User;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::platform::Directory;

/// Single keyed lookup of a profile row, mapped into the application's
/// [`User`] shape. A miss means authentication may have succeeded while
/// the profile linkage is broken; callers distinguish that case.
#[derive(Clone)]
pub struct ProfileLoader {
    directory: Arc<dyn Directory>,
}

impl ProfileLoader {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        ProfileLoader { directory }
    }

    pub async fn load(&self, id: Uuid) -> Result<User, AuthError> {
        let record = self
            .directory
            .find_user(id)
            .await
            .map_err(|err| AuthError::Platform(err.to_string()))?;
        record.map(User::from).ok_or(AuthError::NotFound)
    }
}
