//! Store management routes

use crate::{ApiResult, AppState, Caller};
use axum::{
    extract::{Path, State},
    Json,
};
use sd_core::{StoreRecord, StoreUpdate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct DeleteStoreResponse {
    pub success: bool,
}

pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<Vec<StoreRecord>>> {
    Ok(Json(state.service.list_stores(&caller.0).await?))
}

pub async fn create_store(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<CreateStoreRequest>,
) -> ApiResult<Json<StoreRecord>> {
    let store = state
        .service
        .connect_store(&caller.0, &payload.name, &payload.url)
        .await?;
    Ok(Json(store))
}

pub async fn get_store(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StoreRecord>> {
    Ok(Json(state.service.store(&caller.0, id).await?))
}

pub async fn update_store(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(update): Json<StoreUpdate>,
) -> ApiResult<Json<StoreRecord>> {
    Ok(Json(state.service.update_store(&caller.0, id, update).await?))
}

pub async fn delete_store(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteStoreResponse>> {
    // An id that is not a UUID names no store.
    let success = match Uuid::parse_str(&id) {
        Ok(id) => state.service.disconnect_store(&caller.0, id).await?,
        Err(_) => false,
    };
    Ok(Json(DeleteStoreResponse { success }))
}
