//! Scan routes

use crate::{ApiResult, AppState, Caller};
use axum::{
    extract::{Path, State},
    Json,
};
use sd_core::benchmark::BenchmarkReport;
use sd_core::{FixAttempt, IssueStatus, ScanDraft, ScanRecord};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Serialize)]
pub struct FixedIssue {
    pub id: String,
    pub title: String,
    pub status: IssueStatus,
}

#[derive(Serialize)]
pub struct AutoFixResponse {
    pub success: bool,
    pub issue: FixedIssue,
    pub scan: ScanRecord,
}

pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(store_id): Path<Uuid>,
) -> ApiResult<Json<Vec<ScanRecord>>> {
    Ok(Json(state.service.list_scans(&caller.0, store_id).await?))
}

pub async fn create_scan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(store_id): Path<Uuid>,
    Json(draft): Json<ScanDraft>,
) -> ApiResult<Json<ScanRecord>> {
    Ok(Json(state.service.submit_scan(&caller.0, store_id, draft).await?))
}

pub async fn get_scan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<ScanRecord>> {
    Ok(Json(state.service.scan(&caller.0, scan_id).await?))
}

pub async fn auto_fix(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((scan_id, issue_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<AutoFixResponse>> {
    let outcome = state.service.auto_fix(&caller.0, scan_id, &issue_id).await?;
    Ok(Json(AutoFixResponse {
        success: true,
        issue: FixedIssue {
            id: outcome.issue.id,
            title: outcome.issue.title,
            status: outcome.issue.status,
        },
        scan: outcome.scan,
    }))
}

pub async fn fix_history(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<Vec<FixAttempt>>> {
    Ok(Json(state.service.fix_history(&caller.0, scan_id).await?))
}

pub async fn benchmark(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(scan_id): Path<Uuid>,
) -> ApiResult<Json<BenchmarkReport>> {
    Ok(Json(state.service.benchmark(&caller.0, scan_id).await?))
}
