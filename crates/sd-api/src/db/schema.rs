//! Database row types

use chrono::{DateTime, Utc};
use sd_core::{
    CategoryScores, CoreError, FixAttempt, Issue, PlanId, ScanRecord, StoreRecord, UserRecord,
};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub plan: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            email: row.email,
            plan: PlanId::parse_or_free(&row.plan),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StoreRow {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub health_score: i16,
    pub status: String,
    pub issues_count: i32,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for StoreRecord {
    type Error = CoreError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        Ok(StoreRecord {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            url: row.url,
            health_score: score(row.health_score),
            status: row.status.parse()?,
            issues_count: row.issues_count.max(0) as u32,
            last_scan_at: row.last_scan_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ScanRow {
    pub id: Uuid,
    pub store_id: Uuid,
    pub owner_id: String,
    pub overall_score: i16,
    pub scores: Json<CategoryScores>,
    pub issues: Json<Vec<Issue>>,
    pub recommendations: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<ScanRow> for ScanRecord {
    fn from(row: ScanRow) -> Self {
        ScanRecord {
            id: row.id,
            store_id: row.store_id,
            owner_id: row.owner_id,
            overall_score: score(row.overall_score),
            scores: row.scores.0,
            issues: row.issues.0,
            recommendations: row.recommendations.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct FixAttemptRow {
    pub issue_id: String,
    pub applied_at: DateTime<Utc>,
    pub success: bool,
}

impl From<FixAttemptRow> for FixAttempt {
    fn from(row: FixAttemptRow) -> Self {
        FixAttempt {
            issue_id: row.issue_id,
            applied_at: row.applied_at,
            success: row.success,
        }
    }
}

fn score(value: i16) -> u8 {
    value.clamp(0, 100) as u8
}
