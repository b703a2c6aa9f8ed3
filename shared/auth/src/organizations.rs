use models::NewOrganization;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AuthError;
use crate::platform::Directory;

/// Lookup-or-create for organizations. Name uniqueness is only enforced
/// by the lookup-before-insert check; when duplicates already exist the
/// earliest-created row wins.
#[derive(Clone)]
pub struct OrganizationResolver {
    directory: Arc<dyn Directory>,
}

impl OrganizationResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        OrganizationResolver { directory }
    }

    /// Resolve an organization known only by name; a newly created row
    /// carries empty contact fields.
    pub async fn resolve(&self, name: &str) -> Result<Uuid, AuthError> {
        self.resolve_or_create(NewOrganization::named(name)).await
    }

    /// Resolve by name, inserting `organization` as given when no row
    /// matches. No retry; failures surface verbatim.
    pub async fn resolve_or_create(&self, organization: NewOrganization) -> Result<Uuid, AuthError> {
        let existing = self
            .directory
            .find_organization_by_name(&organization.name)
            .await
            .map_err(|err| AuthError::Creation(err.to_string()))?;
        if let Some(found) = existing {
            return Ok(found.id);
        }
        let name = organization.name.clone();
        let id = self
            .directory
            .insert_organization(organization)
            .await
            .map_err(|err| AuthError::Creation(err.to_string()))?;
        tracing::info!(%name, %id, "created organization");
        Ok(id)
    }
}
