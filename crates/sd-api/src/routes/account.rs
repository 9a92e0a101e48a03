//! Plan and account routes

use crate::{ApiResult, AppState, Caller};
use axum::{extract::State, Json};
use sd_core::{plans, Account, CoreError, PlanDefinition, PlanId, UsageSummary};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct ChangePlanRequest {
    pub plan: String,
}

pub async fn list_plans() -> Json<&'static [PlanDefinition]> {
    Json(plans::all())
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.service.account(&caller.0).await?))
}

pub async fn change_plan(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(payload): Json<ChangePlanRequest>,
) -> ApiResult<Json<Account>> {
    let plan: PlanId = payload.plan.parse().map_err(CoreError::Validation)?;
    Ok(Json(state.service.change_plan(&caller.0, plan).await?))
}

pub async fn usage(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<UsageSummary>> {
    let account = state.service.account(&caller.0).await?;
    Ok(Json(account.usage))
}
