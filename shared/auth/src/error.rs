use thiserror::Error;

/// Transport-level failure reported by a hosted-platform implementation.
/// Carries the underlying message verbatim; the orchestration layers tag
/// it with a kind from [`AuthError`] without rewording it.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        PlatformError(message.into())
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        PlatformError(err.to_string())
    }
}

/// Closed failure taxonomy for the auth core. No stage retries; every
/// message travels unchanged up to the caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential verification rejected the email/password pair.
    #[error("invalid credentials: {0}")]
    Credential(String),
    /// Organization or identity creation failed.
    #[error("creation failed: {0}")]
    Creation(String),
    /// An identity exists but its profile row is missing or could not be
    /// written.
    #[error("profile linkage broken: {0}")]
    Linkage(String),
    /// Keyed profile lookup found no row.
    #[error("profile not found")]
    NotFound,
    /// Failure in the hosted platform outside any specific stage.
    #[error("platform error: {0}")]
    Platform(String),
}

impl From<PlatformError> for AuthError {
    fn from(err: PlatformError) -> Self {
        AuthError::Platform(err.0)
    }
}
