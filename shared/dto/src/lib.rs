use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub organization_name: String,
}

/// Per-account outcome of a seeding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    Created,
    Exists,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub created: u32,
    pub existing: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResult {
    pub email: String,
    pub status: SeedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of the administrative seeding endpoint's success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    pub success: bool,
    pub message: String,
    pub organization_id: Uuid,
    pub summary: SeedSummary,
    pub results: Vec<SeedResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_response_uses_camel_case_and_omits_empty_fields() {
        let response = SeedResponse {
            success: true,
            message: "user seeding completed".into(),
            organization_id: Uuid::nil(),
            summary: SeedSummary {
                created: 2,
                existing: 0,
                errors: 0,
            },
            results: vec![SeedResult {
                email: "admin1@qtron.com".into(),
                status: SeedStatus::Created,
                auth_user_id: Some(Uuid::nil()),
                error: None,
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["organizationId"], json["results"][0]["authUserId"]);
        assert_eq!(json["summary"]["created"], 2);
        assert_eq!(json["results"][0]["status"], "created");
        assert!(json["results"][0].get("error").is_none());
    }
}
