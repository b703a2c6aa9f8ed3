use models::User;
use std::fs;
use std::path::PathBuf;

/// Name of the durable single-slot record, matching the key the web
/// client uses for its local storage entry.
const SESSION_FILE: &str = "qtron-auth-user.json";

/// Client-held view of the authenticated user.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Loading,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

/// Durable record of the last-known profile, read once at startup and
/// cleared on logout or when the stored bytes fail to deserialize.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SessionCache {
            path: dir.into().join(SESSION_FILE),
        }
    }

    pub fn load(&self) -> Option<User> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "discarding unreadable session record");
                self.clear();
                None
            }
        }
    }

    pub fn store(&self, user: &User) {
        let write = serde_json::to_vec(user)
            .map_err(|err| err.to_string())
            .and_then(|bytes| fs::write(&self.path, bytes).map_err(|err| err.to_string()));
        if let Err(err) = write {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to persist session record");
        }
    }

    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to clear session record");
            }
        }
    }
}
