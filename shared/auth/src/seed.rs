//! Batch provisioning of the fixed demo accounts. Each account is fully
//! resolved, compensation included, before the next begins; one account
//! failing never aborts the batch.

use dto::{SeedResult, SeedStatus, SeedSummary};
use models::{NewOrganization, UserRole};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::organizations::OrganizationResolver;
use crate::platform::{Directory, IdentityProvider};
use crate::provision::{AccountProvisioner, NewAccount};

pub const DEMO_ORGANIZATION: &str = "Qtron Demo Organization";

pub struct DemoAccount {
    pub email: &'static str,
    pub password: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub role: UserRole,
}

pub const DEMO_ACCOUNTS: [DemoAccount; 2] = [
    DemoAccount {
        email: "admin1@qtron.com",
        password: "admin1pass",
        first_name: "System",
        last_name: "Administrator",
        role: UserRole::Admin,
    },
    DemoAccount {
        email: "staff1@qtron.com",
        password: "staff1pass",
        first_name: "Dr. Sarah",
        last_name: "Johnson",
        role: UserRole::ServiceAgent,
    },
];

/// Aggregate outcome of one seeding run.
#[derive(Debug, Clone)]
pub struct SeedReport {
    pub organization_id: Uuid,
    pub summary: SeedSummary,
    pub results: Vec<SeedResult>,
}

pub struct DemoSeeder {
    identities: Arc<dyn IdentityProvider>,
    directory: Arc<dyn Directory>,
    resolver: OrganizationResolver,
    provisioner: AccountProvisioner,
}

impl DemoSeeder {
    pub fn new(identities: Arc<dyn IdentityProvider>, directory: Arc<dyn Directory>) -> Self {
        DemoSeeder {
            identities: identities.clone(),
            directory: directory.clone(),
            resolver: OrganizationResolver::new(directory.clone()),
            provisioner: AccountProvisioner::new(identities, directory),
        }
    }

    /// Provision the demo organization and accounts. Safe to re-run:
    /// accounts already present are reported as existing, never errors.
    pub async fn run(&self) -> Result<SeedReport, AuthError> {
        let organization_id = self
            .resolver
            .resolve_or_create(NewOrganization {
                name: DEMO_ORGANIZATION.into(),
                contact_email: Some("contact@qtron.com".into()),
                phone_number: Some("+233 599 656 732".into()),
                address: Some("KNUST Campus, Kumasi, Ghana".into()),
            })
            .await?;

        let mut summary = SeedSummary::default();
        let mut results = Vec::with_capacity(DEMO_ACCOUNTS.len());
        for account in &DEMO_ACCOUNTS {
            let result = self.seed_account(account, organization_id).await;
            match result.status {
                SeedStatus::Created => summary.created += 1,
                SeedStatus::Exists => summary.existing += 1,
                SeedStatus::Error => summary.errors += 1,
            }
            results.push(result);
        }

        tracing::info!(
            created = summary.created,
            existing = summary.existing,
            errors = summary.errors,
            "demo seeding completed"
        );
        Ok(SeedReport {
            organization_id,
            summary,
            results,
        })
    }

    async fn seed_account(&self, account: &DemoAccount, organization_id: Uuid) -> SeedResult {
        match self.try_seed(account, organization_id).await {
            Ok((auth_id, status)) => SeedResult {
                email: account.email.into(),
                status,
                auth_user_id: Some(auth_id),
                error: None,
            },
            Err(err) => {
                tracing::warn!(email = account.email, error = %err, "seeding account failed");
                SeedResult {
                    email: account.email.into(),
                    status: SeedStatus::Error,
                    auth_user_id: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn try_seed(
        &self,
        account: &DemoAccount,
        organization_id: Uuid,
    ) -> Result<(Uuid, SeedStatus), AuthError> {
        if let Some(existing) = self
            .directory
            .find_user_by_email(account.email)
            .await
            .map_err(AuthError::from)?
        {
            return Ok((existing.id, SeedStatus::Exists));
        }

        // An identity may survive an earlier partial failure; reuse it and
        // only insert the missing profile row. Compensation must never
        // delete an identity this run did not create.
        let (auth_id, created_identity) = match self
            .identities
            .find_identity_by_email(account.email)
            .await
            .map_err(AuthError::from)?
        {
            Some(id) => (id, false),
            None => {
                let id = self
                    .identities
                    .create_identity(account.email, account.password, true)
                    .await
                    .map_err(|err| AuthError::Creation(err.to_string()))?;
                (id, true)
            }
        };

        let new_account = NewAccount {
            email: account.email.into(),
            password: account.password.into(),
            first_name: account.first_name.into(),
            last_name: account.last_name.into(),
            phone_number: None,
            role: account.role,
            organization_id,
            email_confirm: true,
        };
        if let Err(err) = self.provisioner.insert_profile(auth_id, &new_account).await {
            if created_identity {
                if let Err(delete_err) = self.identities.delete_identity(auth_id).await {
                    tracing::warn!(
                        %auth_id,
                        error = %delete_err,
                        "compensating identity delete failed, orphan identity remains"
                    );
                }
            }
            return Err(AuthError::Linkage(err.to_string()));
        }
        Ok((auth_id, SeedStatus::Created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPlatform;
    use crate::platform::{Directory, IdentityProvider};

    fn seeder(platform: &Arc<MemoryPlatform>) -> DemoSeeder {
        DemoSeeder::new(platform.clone(), platform.clone())
    }

    #[tokio::test]
    async fn first_run_creates_both_accounts() {
        let platform = Arc::new(MemoryPlatform::new());
        let report = seeder(&platform).run().await.unwrap();

        assert_eq!(report.summary.created, 2);
        assert_eq!(report.summary.existing, 0);
        assert_eq!(report.summary.errors, 0);
        for result in &report.results {
            assert_eq!(result.status, SeedStatus::Created);
            let auth_id = result.auth_user_id.unwrap();
            let record = platform.find_user(auth_id).await.unwrap().unwrap();
            assert_eq!(record.organization_id, report.organization_id);
        }
    }

    #[tokio::test]
    async fn second_run_reports_existing_without_errors() {
        let platform = Arc::new(MemoryPlatform::new());
        let seeder = seeder(&platform);
        let first = seeder.run().await.unwrap();
        let second = seeder.run().await.unwrap();

        assert_eq!(second.summary.created, 0);
        assert_eq!(second.summary.existing, 2);
        assert_eq!(second.summary.errors, 0);
        assert_eq!(second.organization_id, first.organization_id);
        assert_eq!(platform.organization_count(), 1);
        assert_eq!(platform.identity_count(), 2);
    }

    #[tokio::test]
    async fn profile_insert_failure_is_isolated_and_compensated() {
        let platform = Arc::new(MemoryPlatform::new());
        let seeder = seeder(&platform);

        platform.set_fail_user_inserts(true);
        let report = seeder.run().await.unwrap();
        assert_eq!(report.summary.errors, 2);
        assert_eq!(report.summary.created, 0);
        // Compensation removed the just-created identities.
        assert_eq!(platform.identity_count(), 0);

        platform.set_fail_user_inserts(false);
        let retry = seeder.run().await.unwrap();
        assert_eq!(retry.summary.created, 2);
        assert_eq!(retry.summary.errors, 0);
    }

    #[tokio::test]
    async fn orphan_identity_gets_its_profile_on_the_next_run() {
        let platform = Arc::new(MemoryPlatform::new());
        let orphan_id = platform
            .create_identity("admin1@qtron.com", "admin1pass", true)
            .await
            .unwrap();

        let report = seeder(&platform).run().await.unwrap();
        assert_eq!(report.summary.created, 2);
        let admin = &report.results[0];
        assert_eq!(admin.auth_user_id, Some(orphan_id));
        // The surviving identity was reused, not recreated.
        assert_eq!(platform.identity_count(), 2);
    }
}
