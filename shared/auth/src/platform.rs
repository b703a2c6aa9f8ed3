//! Seams onto the hosted database-and-auth platform. Everything this
//! system knows about identities and rows goes through these two traits,
//! so tests and local development can swap in [`crate::MemoryPlatform`].

use async_trait::async_trait;
use models::{NewOrganization, Organization, UserRecord};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::PlatformError;

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Auth-state change notification. Events are delivered one at a time,
/// in emission order, to each subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Uuid),
    SignedOut,
}

/// Identity operations owned by the hosted auth subsystem.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create a credential-bearing identity. `email_confirm` pre-confirms
    /// the address, bypassing the verification email for demo flows.
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        email_confirm: bool,
    ) -> PlatformResult<Uuid>;

    /// Verify an email/password pair, establishing the current session on
    /// success and returning the identity id.
    async fn verify_credentials(&self, email: &str, password: &str) -> PlatformResult<Uuid>;

    /// Administrative lookup of an identity by email address.
    async fn find_identity_by_email(&self, email: &str) -> PlatformResult<Option<Uuid>>;

    /// Identity attached to the subsystem's current session, if any.
    async fn current_identity(&self) -> PlatformResult<Option<Uuid>>;

    async fn sign_out(&self) -> PlatformResult<()>;

    /// Administrative removal. Used only as compensation for a partially
    /// completed provisioning.
    async fn delete_identity(&self, id: Uuid) -> PlatformResult<()>;

    /// Subscribe to auth-state changes. Dropping the receiver cancels the
    /// subscription.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Row access to the hosted tables this system consumes.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Exact-name lookup. When duplicate names exist the earliest-created
    /// row wins; implementations must honor that ordering.
    async fn find_organization_by_name(&self, name: &str) -> PlatformResult<Option<Organization>>;

    async fn insert_organization(&self, organization: NewOrganization) -> PlatformResult<Uuid>;

    async fn find_user(&self, id: Uuid) -> PlatformResult<Option<UserRecord>>;

    async fn find_user_by_email(&self, email: &str) -> PlatformResult<Option<UserRecord>>;

    async fn insert_user(&self, record: UserRecord) -> PlatformResult<()>;
}
