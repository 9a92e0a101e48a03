//! Store Doctor API Server

pub mod config;
pub mod db;
pub mod error;
pub mod routes;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use sd_core::{DoctorService, MemoryRepository, MemoryUsageBackend, SystemClock, UsageAccounting};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};

/// Header carrying the caller's user id
pub const USER_HEADER: &str = "x-user-id";

/// Application state shared across handlers
pub struct AppState {
    pub service: DoctorService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(service: DoctorService, config: AppConfig) -> Self {
        Self { service, config }
    }

    /// State over in-memory repository and usage storage
    pub fn in_memory(config: AppConfig) -> Self {
        let usage = UsageAccounting::new(Arc::new(MemoryUsageBackend::new()), Arc::new(SystemClock));
        Self::new(DoctorService::new(Arc::new(MemoryRepository::new()), usage), config)
    }
}

/// Identity of the calling user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| state.config.default_user_id.clone());
        Ok(Caller(id))
    }
}

/// Build the HTTP router
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        // Health check
        .route("/health", get(routes::health_check))

        // Plans and account
        .route("/api/plans", get(routes::account::list_plans))
        .route("/api/me", get(routes::account::me))
        .route("/api/me/plan", put(routes::account::change_plan))
        .route("/api/usage", get(routes::account::usage))

        // Stores
        .route(
            "/api/stores",
            get(routes::stores::list_stores).post(routes::stores::create_store),
        )
        .route(
            "/api/stores/:id",
            get(routes::stores::get_store)
                .patch(routes::stores::update_store)
                .delete(routes::stores::delete_store),
        )

        // Scans
        .route(
            "/api/stores/:id/scans",
            get(routes::scans::list_scans).post(routes::scans::create_scan),
        )
        .route("/api/scans/:scan_id", get(routes::scans::get_scan))
        .route(
            "/api/scans/:scan_id/issues/:issue_id/auto-fix",
            post(routes::scans::auto_fix),
        )
        .route("/api/scans/:scan_id/fix-history", get(routes::scans::fix_history))
        .route("/api/scans/:scan_id/benchmark", get(routes::scans::benchmark))

        // Admin
        .route("/api/admin/stats", get(routes::admin::get_stats))
        .route("/api/admin/config", get(routes::admin::get_config));

    let router = if state.config.cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
