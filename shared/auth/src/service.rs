//! Core business logic for authentication: the single entry point the
//! HTTP layer talks to. Composes the organization resolver, account
//! provisioner, and profile loader over one session slot, and keeps that
//! slot in step with the hosted subsystem's auth-state notifications.

use dto::SignupRequest;
use models::{User, UserRole};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::error::AuthError;
use crate::organizations::OrganizationResolver;
use crate::platform::{AuthEvent, Directory, IdentityProvider};
use crate::profile::ProfileLoader;
use crate::provision::{AccountProvisioner, NewAccount};
use crate::session::{SessionCache, SessionState};

pub struct AuthService {
    identities: Arc<dyn IdentityProvider>,
    resolver: OrganizationResolver,
    provisioner: AccountProvisioner,
    loader: ProfileLoader,
    session: Arc<RwLock<SessionState>>,
    cache: Option<SessionCache>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl AuthService {
    /// Build the service, restore any prior session, and subscribe to the
    /// hosted subsystem's auth-state stream. Call [`AuthService::shutdown`]
    /// to tear the subscription down; dropping the service does it too.
    pub async fn connect(
        identities: Arc<dyn IdentityProvider>,
        directory: Arc<dyn Directory>,
        cache: Option<SessionCache>,
    ) -> Self {
        let service = AuthService {
            identities: identities.clone(),
            resolver: OrganizationResolver::new(directory.clone()),
            provisioner: AccountProvisioner::new(identities, directory.clone()),
            loader: ProfileLoader::new(directory),
            session: Arc::new(RwLock::new(SessionState::Unauthenticated)),
            cache,
            watcher: Mutex::new(None),
        };
        service.restore().await;
        service.spawn_watcher();
        service
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    /// Verify credentials, then mirror the profile row into the session.
    /// A valid login whose profile row is missing leaves the session
    /// unauthenticated and reports the linkage break distinctly.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        *self.session.write() = SessionState::Loading;
        let auth_id = match self.identities.verify_credentials(email, password).await {
            Ok(id) => id,
            Err(err) => {
                *self.session.write() = SessionState::Unauthenticated;
                return Err(AuthError::Credential(err.to_string()));
            }
        };
        match self.loader.load(auth_id).await {
            Ok(user) => {
                self.establish(user.clone());
                Ok(user)
            }
            Err(AuthError::NotFound) => {
                *self.session.write() = SessionState::Unauthenticated;
                Err(AuthError::Linkage(
                    "authenticated but profile missing".into(),
                ))
            }
            Err(err) => {
                *self.session.write() = SessionState::Unauthenticated;
                Err(err)
            }
        }
    }

    /// Resolve the organization, provision the account, and load the
    /// resulting profile. Any stage failure short-circuits verbatim. The
    /// first account registered for an organization administers it.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        *self.session.write() = SessionState::Loading;
        match self.signup_stages(request).await {
            Ok(user) => {
                self.establish(user.clone());
                Ok(user)
            }
            Err(err) => {
                *self.session.write() = SessionState::Unauthenticated;
                Err(err)
            }
        }
    }

    async fn signup_stages(&self, request: SignupRequest) -> Result<User, AuthError> {
        let organization_id = self.resolver.resolve(&request.organization_name).await?;
        let auth_id = self
            .provisioner
            .provision(NewAccount {
                email: request.email,
                password: request.password,
                first_name: request.first_name,
                last_name: request.last_name,
                phone_number: request.phone_number,
                role: UserRole::Admin,
                organization_id,
                email_confirm: false,
            })
            .await?;
        self.loader.load(auth_id).await
    }

    /// Sign out remotely, then clear the session regardless of how the
    /// remote call went.
    pub async fn logout(&self) {
        if let Err(err) = self.identities.sign_out().await {
            tracing::warn!(error = %err, "remote sign-out failed, clearing session anyway");
        }
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        *self.session.write() = SessionState::Unauthenticated;
    }

    /// Cancel the auth-state subscription.
    pub fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
        }
    }

    fn establish(&self, user: User) {
        if let Some(cache) = &self.cache {
            cache.store(&user);
        }
        *self.session.write() = SessionState::Authenticated(user);
    }

    async fn restore(&self) {
        if let Some(cache) = &self.cache {
            if let Some(user) = cache.load() {
                tracing::debug!(user = %user.email, "restored session from local record");
                *self.session.write() = SessionState::Authenticated(user);
                return;
            }
        }
        if let Ok(Some(auth_id)) = self.identities.current_identity().await {
            if let Ok(user) = self.loader.load(auth_id).await {
                self.establish(user);
            }
        }
    }

    fn spawn_watcher(&self) {
        let mut events = self.identities.subscribe();
        let loader = self.loader.clone();
        let session = self.session.clone();
        let cache = self.cache.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(auth_id)) => match loader.load(auth_id).await {
                        Ok(user) => {
                            if let Some(cache) = &cache {
                                cache.store(&user);
                            }
                            *session.write() = SessionState::Authenticated(user);
                        }
                        Err(err) => {
                            tracing::warn!(%auth_id, error = %err, "sign-in event without loadable profile");
                        }
                    },
                    Ok(AuthEvent::SignedOut) => {
                        if let Some(cache) = &cache {
                            cache.clear();
                        }
                        *session.write() = SessionState::Unauthenticated;
                    }
                    // Lagging only drops stale notifications; the latest
                    // state still arrives.
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        *self.watcher.lock() = Some(handle);
    }
}

impl Drop for AuthService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPlatform;
    use std::time::Duration;

    fn signup_request(email: &str, organization: &str) -> SignupRequest {
        SignupRequest {
            email: email.into(),
            password: "secret123".into(),
            first_name: "Akosua".into(),
            last_name: "Asante".into(),
            phone_number: None,
            organization_name: organization.into(),
        }
    }

    async fn service(platform: &Arc<MemoryPlatform>) -> AuthService {
        AuthService::connect(platform.clone(), platform.clone(), None).await
    }

    #[tokio::test]
    async fn signup_authenticates_with_the_new_identity_id() {
        let platform = Arc::new(MemoryPlatform::new());
        let service = service(&platform).await;
        let user = service
            .signup(signup_request("akosua@qtron.com", "Asante Clinic"))
            .await
            .unwrap();

        let session = service.session();
        assert_eq!(session.user(), Some(&user));
        assert_eq!(user.role, UserRole::Admin);
        assert_eq!(
            platform
                .find_identity_by_email("akosua@qtron.com")
                .await
                .unwrap(),
            Some(user.id)
        );
    }

    #[tokio::test]
    async fn failed_login_reads_no_profile_and_stays_unauthenticated() {
        let platform = Arc::new(MemoryPlatform::new());
        let service = service(&platform).await;
        let reads_before = platform.user_reads();

        let err = service.login("nobody@qtron.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
        assert_eq!(service.session(), SessionState::Unauthenticated);
        assert_eq!(platform.user_reads(), reads_before);
    }

    #[tokio::test]
    async fn login_without_profile_row_reports_broken_linkage() {
        let platform = Arc::new(MemoryPlatform::new());
        platform
            .create_identity("ghost@qtron.com", "secret123", true)
            .await
            .unwrap();
        let service = service(&platform).await;

        let err = service.login("ghost@qtron.com", "secret123").await.unwrap_err();
        match err {
            AuthError::Linkage(message) => {
                assert_eq!(message, "authenticated but profile missing")
            }
            other => panic!("expected linkage error, got {other:?}"),
        }
        assert_eq!(service.session(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn logout_clears_session_even_when_remote_sign_out_fails() {
        let platform = Arc::new(MemoryPlatform::new());
        let service = service(&platform).await;
        service
            .signup(signup_request("yaw@qtron.com", "Yaw Logistics"))
            .await
            .unwrap();
        assert!(service.session().is_authenticated());

        platform.set_fail_sign_out(true);
        service.logout().await;
        assert_eq!(service.session(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn signup_failure_short_circuits_and_resets_session() {
        let platform = Arc::new(MemoryPlatform::new());
        let service = service(&platform).await;
        platform.set_fail_user_inserts(true);

        let err = service
            .signup(signup_request("afi@qtron.com", "Afi Ventures"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Linkage(_)));
        assert_eq!(service.session(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn sign_in_event_from_the_platform_populates_the_session() {
        let platform = Arc::new(MemoryPlatform::new());
        let service = service(&platform).await;
        let user = service
            .signup(signup_request("ekua@qtron.com", "Ekua Traders"))
            .await
            .unwrap();
        service.logout().await;
        assert_eq!(service.session(), SessionState::Unauthenticated);

        // Another client signs in through the platform; the watcher task
        // should pick the profile up from the event alone.
        platform
            .verify_credentials("ekua@qtron.com", "secret123")
            .await
            .unwrap();
        for _ in 0..50 {
            if service.session().is_authenticated() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(service.session().user(), Some(&user));
    }

    #[tokio::test]
    async fn restores_session_from_cached_record() {
        let dir = tempfile::tempdir().unwrap();
        let platform = Arc::new(MemoryPlatform::new());
        let first = AuthService::connect(
            platform.clone(),
            platform.clone(),
            Some(SessionCache::new(dir.path())),
        )
        .await;
        let user = first
            .signup(signup_request("adjoa@qtron.com", "Adjoa Health"))
            .await
            .unwrap();
        first.shutdown();

        let second = AuthService::connect(
            platform.clone(),
            platform.clone(),
            Some(SessionCache::new(dir.path())),
        )
        .await;
        assert_eq!(second.session().user(), Some(&user));
    }
}
