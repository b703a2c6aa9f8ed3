//! Hosted-platform client for a Supabase project: GoTrue for identities
//! (admin endpoints plus the password grant) and PostgREST for the
//! `organizations` and `users` tables. The service-role key authorizes
//! every call; interactive sessions only track the latest access token.

use async_trait::async_trait;
use models::{NewOrganization, Organization, UserRecord};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::platform::{AuthEvent, Directory, IdentityProvider, PlatformResult};

pub struct SupabasePlatform {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    access_token: Mutex<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Deserialize)]
struct IdentityBody {
    id: Uuid,
}

#[derive(Deserialize)]
struct TokenBody {
    access_token: String,
    user: IdentityBody,
}

#[derive(Deserialize)]
struct UserPage {
    users: Vec<AdminUser>,
}

#[derive(Deserialize)]
struct AdminUser {
    id: Uuid,
    email: Option<String>,
}

#[derive(Deserialize)]
struct InsertedRow {
    id: Uuid,
}

impl SupabasePlatform {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(32);
        SupabasePlatform {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            service_key: service_key.into(),
            access_token: Mutex::new(None),
            events,
        }
    }

    fn admin_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn check(response: reqwest::Response) -> PlatformResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError(format!("{status}: {body}")))
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for SupabasePlatform {
    async fn create_identity(
        &self,
        email: &str,
        password: &str,
        email_confirm: bool,
    ) -> PlatformResult<Uuid> {
        let response = self
            .admin_request(reqwest::Method::POST, "/auth/v1/admin/users")
            .json(&json!({
                "email": email,
                "password": password,
                "email_confirm": email_confirm,
            }))
            .send()
            .await?;
        let body: IdentityBody = Self::check(response).await?.json().await?;
        Ok(body.id)
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> PlatformResult<Uuid> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.service_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: TokenBody = Self::check(response).await?.json().await?;
        *self.access_token.lock() = Some(body.access_token);
        self.emit(AuthEvent::SignedIn(body.user.id));
        Ok(body.user.id)
    }

    async fn find_identity_by_email(&self, email: &str) -> PlatformResult<Option<Uuid>> {
        let response = self
            .admin_request(reqwest::Method::GET, "/auth/v1/admin/users")
            .query(&[("filter", email), ("per_page", "50")])
            .send()
            .await?;
        let page: UserPage = Self::check(response).await?.json().await?;
        Ok(page
            .users
            .into_iter()
            .find(|user| user.email.as_deref() == Some(email))
            .map(|user| user.id))
    }

    async fn current_identity(&self) -> PlatformResult<Option<Uuid>> {
        let token = match self.access_token.lock().clone() {
            Some(token) => token,
            None => return Ok(None),
        };
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        let body: IdentityBody = Self::check(response).await?.json().await?;
        Ok(Some(body.id))
    }

    async fn sign_out(&self) -> PlatformResult<()> {
        let token = self.access_token.lock().take();
        if let Some(token) = token {
            let response = self
                .http
                .post(format!("{}/auth/v1/logout", self.base_url))
                .header("apikey", &self.service_key)
                .bearer_auth(token)
                .send()
                .await?;
            Self::check(response).await?;
        }
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn delete_identity(&self, id: Uuid) -> PlatformResult<()> {
        let response = self
            .admin_request(
                reqwest::Method::DELETE,
                &format!("/auth/v1/admin/users/{id}"),
            )
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl Directory for SupabasePlatform {
    async fn find_organization_by_name(&self, name: &str) -> PlatformResult<Option<Organization>> {
        let response = self
            .admin_request(reqwest::Method::GET, "/rest/v1/organizations")
            .query(&[
                ("name", format!("eq.{name}").as_str()),
                ("select", "id,name,contact_email,phone_number,address"),
                // Earliest-created row wins when names collide.
                ("order", "created_at.asc"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let mut rows: Vec<Organization> = Self::check(response).await?.json().await?;
        let first = rows.drain(..).next();
        Ok(first)
    }

    async fn insert_organization(&self, organization: NewOrganization) -> PlatformResult<Uuid> {
        let response = self
            .admin_request(reqwest::Method::POST, "/rest/v1/organizations")
            .header("Prefer", "return=representation")
            .json(&organization)
            .send()
            .await?;
        let rows: Vec<InsertedRow> = Self::check(response).await?.json().await?;
        rows.first()
            .map(|row| row.id)
            .ok_or_else(|| PlatformError::new("insert returned no representation"))
    }

    async fn find_user(&self, id: Uuid) -> PlatformResult<Option<UserRecord>> {
        let response = self
            .admin_request(reqwest::Method::GET, "/rest/v1/users")
            .query(&[
                ("id", format!("eq.{id}").as_str()),
                ("select", "*"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let mut rows: Vec<UserRecord> = Self::check(response).await?.json().await?;
        let first = rows.drain(..).next();
        Ok(first)
    }

    async fn find_user_by_email(&self, email: &str) -> PlatformResult<Option<UserRecord>> {
        let response = self
            .admin_request(reqwest::Method::GET, "/rest/v1/users")
            .query(&[
                ("email", format!("eq.{email}").as_str()),
                ("select", "*"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let mut rows: Vec<UserRecord> = Self::check(response).await?.json().await?;
        let first = rows.drain(..).next();
        Ok(first)
    }

    async fn insert_user(&self, record: UserRecord) -> PlatformResult<()> {
        let response = self
            .admin_request(reqwest::Method::POST, "/rest/v1/users")
            .header("Prefer", "return=minimal")
            .json(&record)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
