//! Store Doctor API Server

use sd_api::db::{self, PgRepository, PgUsageBackend};
use sd_api::{build_router, AppConfig, AppState};
use sd_core::{DoctorService, SystemClock, UsageAccounting};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sd_api=debug,sd_core=info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Store Doctor API Server");

    let config = AppConfig::from_env();

    let state = match config.database_url.clone() {
        Some(database_url) => {
            let pool = db::connect(&config, &database_url).await?;
            let usage = UsageAccounting::new(
                Arc::new(PgUsageBackend::new(pool.clone())),
                Arc::new(SystemClock),
            );
            let service = DoctorService::new(Arc::new(PgRepository::new(pool)), usage);
            AppState::new(service, config)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory storage");
            AppState::in_memory(config)
        }
    };
    let state = Arc::new(state);

    let addr = state.config.bind_addr.clone();
    let app = build_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
