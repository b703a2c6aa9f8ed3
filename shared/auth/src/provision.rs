use chrono::Utc;
use models::{UserRecord, UserRole};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::platform::{Directory, IdentityProvider};

/// Everything needed to stand up one account: a hosted identity plus its
/// profile row.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub organization_id: Uuid,
    /// Pre-confirm the email address, bypassing verification (demo flows).
    pub email_confirm: bool,
}

/// Creates an identity and its profile row as one logical step. When the
/// row insert fails after the identity exists, the identity is deleted
/// again, best-effort and unverified; a failed delete leaves an orphan
/// identity behind.
#[derive(Clone)]
pub struct AccountProvisioner {
    identities: Arc<dyn IdentityProvider>,
    directory: Arc<dyn Directory>,
}

impl AccountProvisioner {
    pub fn new(identities: Arc<dyn IdentityProvider>, directory: Arc<dyn Directory>) -> Self {
        AccountProvisioner {
            identities,
            directory,
        }
    }

    pub async fn provision(&self, account: NewAccount) -> Result<Uuid, AuthError> {
        let auth_id = self
            .identities
            .create_identity(&account.email, &account.password, account.email_confirm)
            .await
            .map_err(|err| AuthError::Creation(err.to_string()))?;

        match self.insert_profile(auth_id, &account).await {
            Ok(()) => {
                tracing::info!(email = %account.email, %auth_id, "provisioned account");
                Ok(auth_id)
            }
            Err(err) => {
                if let Err(delete_err) = self.identities.delete_identity(auth_id).await {
                    tracing::warn!(
                        %auth_id,
                        error = %delete_err,
                        "compensating identity delete failed, orphan identity remains"
                    );
                }
                Err(AuthError::Linkage(err.to_string()))
            }
        }
    }

    /// Insert the profile row for an identity that already exists. Used
    /// directly by the batch seeder when it reuses a found identity.
    pub(crate) async fn insert_profile(
        &self,
        auth_id: Uuid,
        account: &NewAccount,
    ) -> Result<(), crate::error::PlatformError> {
        let now = Utc::now();
        self.directory
            .insert_user(UserRecord {
                id: auth_id,
                email: account.email.clone(),
                first_name: account.first_name.clone(),
                last_name: account.last_name.clone(),
                phone_number: account.phone_number.clone(),
                role: account.role,
                organization_id: account.organization_id,
                created_at: now,
                updated_at: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPlatform;
    use crate::platform::Directory;

    fn account(email: &str, organization_id: Uuid) -> NewAccount {
        NewAccount {
            email: email.into(),
            password: "secret123".into(),
            first_name: "Kofi".into(),
            last_name: "Boateng".into(),
            phone_number: Some("+233 20 000 0000".into()),
            role: UserRole::Supervisor,
            organization_id,
            email_confirm: true,
        }
    }

    #[tokio::test]
    async fn success_links_identity_and_profile_by_id() {
        let platform = Arc::new(MemoryPlatform::new());
        let provisioner = AccountProvisioner::new(platform.clone(), platform.clone());
        let auth_id = provisioner
            .provision(account("kofi@qtron.com", Uuid::new_v4()))
            .await
            .unwrap();
        let record = platform.find_user(auth_id).await.unwrap().unwrap();
        assert_eq!(record.id, auth_id);
        assert_eq!(record.email, "kofi@qtron.com");
        assert!(platform.has_identity("kofi@qtron.com"));
    }

    #[tokio::test]
    async fn identity_creation_failure_aborts_verbatim() {
        let platform = Arc::new(MemoryPlatform::new());
        let provisioner = AccountProvisioner::new(platform.clone(), platform.clone());
        let org = Uuid::new_v4();
        provisioner
            .provision(account("dup@qtron.com", org))
            .await
            .unwrap();
        let err = provisioner
            .provision(account("dup@qtron.com", org))
            .await
            .unwrap_err();
        match err {
            AuthError::Creation(message) => assert!(message.contains("already registered")),
            other => panic!("expected creation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn profile_insert_failure_compensates_and_frees_the_email() {
        let platform = Arc::new(MemoryPlatform::new());
        let provisioner = AccountProvisioner::new(platform.clone(), platform.clone());
        let org = Uuid::new_v4();

        platform.set_fail_user_inserts(true);
        let err = provisioner
            .provision(account("ama@qtron.com", org))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Linkage(_)));

        // Compensation removed the orphan identity, so the same email can
        // be provisioned again once inserts work.
        assert!(!platform.has_identity("ama@qtron.com"));
        platform.set_fail_user_inserts(false);
        provisioner
            .provision(account("ama@qtron.com", org))
            .await
            .unwrap();
    }
}
