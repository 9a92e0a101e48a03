//! Admin routes

use crate::{ApiResult, AppState};
use axum::{extract::State, Json};
use sd_core::RepositoryStats;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub storage: &'static str,
    pub default_user_id: String,
    pub current_period: String,
    pub version: String,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<RepositoryStats>> {
    Ok(Json(state.service.stats().await?))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        storage: if state.config.uses_database() { "postgres" } else { "memory" },
        default_user_id: state.config.default_user_id.clone(),
        current_period: state.service.usage().current_period(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
