//! HTTP surface of the Qtron auth layer: interactive login/signup/logout
//! plus the administrative demo-seeding endpoint. Runs against a hosted
//! Supabase project when one is configured and against the in-memory
//! platform otherwise, so the frontend can be exercised without a
//! hosted project.

use auth::{
    AuthError, AuthService, DemoSeeder, Directory, IdentityProvider, MemoryPlatform, SessionCache,
    SupabasePlatform,
};
use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dto::{LoginRequest, SeedResponse, SignupRequest};
use models::User;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    auth: Arc<AuthService>,
    seeder: Arc<DemoSeeder>,
    seed_token: String,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Auth(error) = self;
        let status = match &error {
            AuthError::Credential(_) => StatusCode::UNAUTHORIZED,
            AuthError::Creation(_) => StatusCode::BAD_REQUEST,
            AuthError::Linkage(_) => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Platform(_) => {
                tracing::error!(%error, "unexpected platform error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": error.to_string() }))).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Lightweight health probe used by readiness checks and dashboards.
async fn health() -> Json<serde_json::Value> {
    Json(json!({"status":"ok"}))
}

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(user))
}

async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state.auth.signup(request).await?;
    Ok(Json(user))
}

async fn logout(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.auth.logout().await;
    Json(json!({ "ok": true }))
}

/// Provision the demo organization and accounts. Requires the seeding
/// bearer credential; takes no body and is safe to call repeatedly.
async fn seed_users(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let authorized = bearer_token(&headers).is_some_and(|token| token == state.seed_token);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "missing or invalid bearer credential" })),
        )
            .into_response();
    }

    match state.seeder.run().await {
        Ok(report) => Json(SeedResponse {
            success: true,
            message: "user seeding completed".into(),
            organization_id: report.organization_id,
            summary: report.summary,
            results: report.results,
        })
        .into_response(),
        Err(error) => {
            tracing::error!(%error, "demo seeding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

fn app(state: AppState) -> Router {
    // The seeding endpoint is called straight from the browser during
    // demos, so CORS stays open across the verbs the frontend uses.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/logout", post(logout))
        .route("/admin/seed-users", post(seed_users))
        .layer(cors)
        .with_state(state)
}

fn platform_from_env() -> (Arc<dyn IdentityProvider>, Arc<dyn Directory>) {
    let url = std::env::var("SUPABASE_URL").ok();
    let key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok();
    match (url, key) {
        (Some(url), Some(key)) => {
            tracing::info!(%url, "using hosted supabase platform");
            let platform = Arc::new(SupabasePlatform::new(url, key));
            (platform.clone(), platform)
        }
        _ => {
            tracing::info!("SUPABASE_URL not set, using in-memory platform");
            let platform = Arc::new(MemoryPlatform::new());
            (platform.clone(), platform)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (identities, directory) = platform_from_env();
    let cache = std::env::var("QTRON_SESSION_DIR")
        .ok()
        .map(SessionCache::new);
    let auth = Arc::new(AuthService::connect(identities.clone(), directory.clone(), cache).await);
    let seeder = Arc::new(DemoSeeder::new(identities, directory));

    let seed_token =
        std::env::var("SEED_TOKEN").unwrap_or_else(|_| "dev_seed_token_change_me".to_string());
    let port = std::env::var("API_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8081);

    let state = AppState {
        auth,
        seeder,
        seed_token,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "auth api starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
