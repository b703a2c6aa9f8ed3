//! In-memory stand-in for the hosted platform. Mirrors the behavior the
//! deployed system sees from the hosted project closely enough for the
//! api service to run without one, and supports forcing row-insert and
//! sign-out failures so tests can exercise the compensation paths.

use async_trait::async_trait;
use models::{NewOrganization, Organization, UserRecord};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::platform::{AuthEvent, Directory, IdentityProvider, PlatformResult};

#[derive(Debug, Clone)]
struct Identity {
    id: Uuid,
    email: String,
    password: String,
}

#[derive(Default)]
struct State {
    identities: Vec<Identity>,
    // Insertion order doubles as creation order for the name tie-break.
    organizations: Vec<Organization>,
    users: Vec<UserRecord>,
    current: Option<Uuid>,
}

pub struct MemoryPlatform {
    state: Mutex<State>,
    events: broadcast::Sender<AuthEvent>,
    fail_user_inserts: AtomicBool,
    fail_sign_out: AtomicBool,
    user_reads: AtomicUsize,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(32);
        MemoryPlatform {
            state: Mutex::new(State::default()),
            events,
            fail_user_inserts: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            user_reads: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent `users` insert fail until reset.
    pub fn set_fail_user_inserts(&self, fail: bool) {
        self.fail_user_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make remote sign-out fail, leaving session cleanup to the caller.
    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    /// Number of keyed/email lookups served from the `users` table.
    pub fn user_reads(&self) -> usize {
        self.user_reads.load(Ordering::SeqCst)
    }

    pub fn identity_count(&self) -> usize {
        self.state.lock().identities.len()
    }

    pub fn organization_count(&self) -> usize {
        self.state.lock().organizations.len()
    }

    pub fn has_identity(&self, email: &str) -> bool {
        self.state
            .lock()
            .identities
            .iter()
            .any(|identity| identity.email == email)
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for MemoryPlatform {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        _email_confirm: bool,
    ) -> PlatformResult<Uuid> {
        let mut state = self.state.lock();
        if state.identities.iter().any(|i| i.email == email) {
            return Err(PlatformError::new("user already registered"));
        }
        let id = Uuid::new_v4();
        state.identities.push(Identity {
            id,
            email: email.to_owned(),
            password: password.to_owned(),
        });
        Ok(id)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> PlatformResult<Uuid> {
        let id = {
            let mut state = self.state.lock();
            let found = state
                .identities
                .iter()
                .find(|i| i.email == email && i.password == password)
                .map(|i| i.id);
            match found {
                Some(id) => {
                    state.current = Some(id);
                    id
                }
                None => return Err(PlatformError::new("invalid login credentials")),
            }
        };
        self.emit(AuthEvent::SignedIn(id));
        Ok(id)
    }

    async fn find_identity_by_email(&self, email: &str) -> PlatformResult<Option<Uuid>> {
        Ok(self
            .state
            .lock()
            .identities
            .iter()
            .find(|i| i.email == email)
            .map(|i| i.id))
    }

    async fn current_identity(&self) -> PlatformResult<Option<Uuid>> {
        Ok(self.state.lock().current)
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PlatformError::new("sign-out rejected"));
        }
        self.state.lock().current = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> PlatformResult<()> {
        let mut state = self.state.lock();
        let before = state.identities.len();
        state.identities.retain(|i| i.id != id);
        if state.identities.len() == before {
            return Err(PlatformError::new("identity not found"));
        }
        if state.current == Some(id) {
            state.current = None;
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl Directory for MemoryPlatform {
    async fn find_organization_by_name(&self, name: &str) -> PlatformResult<Option<Organization>> {
        // First match in insertion order, i.e. the earliest-created row.
        Ok(self
            .state
            .lock()
            .organizations
            .iter()
            .find(|org| org.name == name)
            .cloned())
    }

    async fn insert_organization(&self, organization: NewOrganization) -> PlatformResult<Uuid> {
        let id = Uuid::new_v4();
        self.state.lock().organizations.push(Organization {
            id,
            name: organization.name,
            contact_email: organization.contact_email,
            phone_number: organization.phone_number,
            address: organization.address,
        });
        Ok(id)
    }

    async fn find_user(&self, id: Uuid) -> PlatformResult<Option<UserRecord>> {
        self.user_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> PlatformResult<Option<UserRecord>> {
        self.user_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn insert_user(&self, record: UserRecord) -> PlatformResult<()> {
        if self.fail_user_inserts.load(Ordering::SeqCst) {
            return Err(PlatformError::new("user insert rejected"));
        }
        let mut state = self.state.lock();
        if state
            .users
            .iter()
            .any(|user| user.id == record.id || user.email == record.email)
        {
            return Err(PlatformError::new(
                "duplicate key value violates unique constraint",
            ));
        }
        state.users.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use models::UserRole;

    fn record(id: Uuid, email: &str) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id,
            email: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone_number: None,
            role: UserRole::Admin,
            organization_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_identity_email() {
        let platform = MemoryPlatform::new();
        platform
            .create_identity("a@qtron.com", "pw", true)
            .await
            .unwrap();
        let err = platform
            .create_identity("a@qtron.com", "pw2", true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[tokio::test]
    async fn duplicate_names_resolve_to_earliest_row() {
        let platform = MemoryPlatform::new();
        let first = platform
            .insert_organization(NewOrganization::named("Acme"))
            .await
            .unwrap();
        platform
            .insert_organization(NewOrganization::named("Acme"))
            .await
            .unwrap();
        let found = platform
            .find_organization_by_name("Acme")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first);
    }

    #[tokio::test]
    async fn forced_insert_failure_is_reported() {
        let platform = MemoryPlatform::new();
        platform.set_fail_user_inserts(true);
        let err = platform
            .insert_user(record(Uuid::new_v4(), "x@qtron.com"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rejected"));
        platform.set_fail_user_inserts(false);
        platform
            .insert_user(record(Uuid::new_v4(), "x@qtron.com"))
            .await
            .unwrap();
    }
}
