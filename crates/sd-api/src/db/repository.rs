//! Postgres repository

use super::schema::{FixAttemptRow, ScanRow, StoreRow, UserRow};
use super::storage;
use async_trait::async_trait;
use chrono::Utc;
use sd_core::{
    CoreError, CoreResult, FixAttempt, PlanId, Repository, RepositoryStats, ScanDraft, ScanRecord,
    StoreRecord, StoreStatus, StoreUpdate, UserRecord,
};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

const SELECT_STORE: &str = "SELECT id, owner_id, name, url, health_score, status, issues_count, \
     last_scan_at, created_at FROM stores";

const SELECT_SCAN: &str = "SELECT id, store_id, owner_id, overall_score, scores, issues, \
     recommendations, created_at FROM scans";

pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn get_or_create_user(&self, user_id: &str) -> CoreResult<UserRecord> {
        sqlx::query("INSERT INTO users (id, plan, created_at) VALUES ($1, 'free', NOW()) ON CONFLICT (id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;

        let row: UserRow = sqlx::query_as("SELECT id, email, plan, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.into())
    }

    async fn set_plan(&self, user_id: &str, plan: PlanId) -> CoreResult<UserRecord> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, plan, created_at) VALUES ($1, $2, NOW())
            ON CONFLICT (id) DO UPDATE SET plan = EXCLUDED.plan
            RETURNING id, email, plan, created_at
            "#,
        )
        .bind(user_id)
        .bind(plan.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        info!(user_id, plan = %plan, "plan changed");
        Ok(row.into())
    }

    async fn create_store(&self, owner_id: &str, name: &str, url: &str) -> CoreResult<StoreRecord> {
        let store = StoreRecord::new(owner_id, name, url)?;

        sqlx::query(
            r#"
            INSERT INTO stores (id, owner_id, name, url, health_score, status, issues_count, last_scan_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(store.id)
        .bind(&store.owner_id)
        .bind(&store.name)
        .bind(&store.url)
        .bind(i16::from(store.health_score))
        .bind(store.status.as_str())
        .bind(store.issues_count as i32)
        .bind(store.last_scan_at)
        .bind(store.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(store)
    }

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<StoreRecord>> {
        let sql = format!("{} WHERE id = $1", SELECT_STORE);
        let row: Option<StoreRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(StoreRecord::try_from).transpose()
    }

    async fn list_stores(&self, owner_id: &str) -> CoreResult<Vec<StoreRecord>> {
        let sql = format!("{} WHERE owner_id = $1 ORDER BY seq", SELECT_STORE);
        let rows: Vec<StoreRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows.into_iter().map(StoreRecord::try_from).collect()
    }

    async fn update_store(&self, id: Uuid, update: StoreUpdate) -> CoreResult<StoreRecord> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_STORE);
        let row: StoreRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| CoreError::not_found("Store", id))?;

        let mut store = StoreRecord::try_from(row)?;
        store.apply_update(&update)?;

        sqlx::query("UPDATE stores SET name = $2, url = $3, status = $4 WHERE id = $1")
            .bind(id)
            .bind(&store.name)
            .bind(&store.url)
            .bind(store.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(store)
    }

    async fn delete_store(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM stores WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_scan(&self, store_id: Uuid, owner_id: &str, draft: ScanDraft) -> CoreResult<ScanRecord> {
        let scan = ScanRecord::from_draft(store_id, owner_id, draft)?;
        let status = StoreStatus::from_health_score(scan.overall_score);

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let updated = sqlx::query(
            r#"
            UPDATE stores
            SET health_score = $2, issues_count = $3, last_scan_at = $4, status = $5
            WHERE id = $1
            "#,
        )
        .bind(store_id)
        .bind(i16::from(scan.overall_score))
        .bind(scan.issues.len() as i32)
        .bind(scan.created_at)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if updated.rows_affected() == 0 {
            return Err(CoreError::not_found("Store", store_id));
        }

        sqlx::query(
            r#"
            INSERT INTO scans (id, store_id, owner_id, overall_score, scores, issues, recommendations, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(scan.id)
        .bind(scan.store_id)
        .bind(&scan.owner_id)
        .bind(i16::from(scan.overall_score))
        .bind(Json(&scan.scores))
        .bind(Json(&scan.issues))
        .bind(Json(&scan.recommendations))
        .bind(scan.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(scan)
    }

    async fn get_scan(&self, id: Uuid) -> CoreResult<Option<ScanRecord>> {
        let sql = format!("{} WHERE id = $1", SELECT_SCAN);
        let row: Option<ScanRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.map(Into::into))
    }

    async fn list_scans(&self, store_id: Uuid) -> CoreResult<Vec<ScanRecord>> {
        let sql = format!("{} WHERE store_id = $1 ORDER BY seq DESC", SELECT_SCAN);
        let rows: Vec<ScanRow> = sqlx::query_as(&sql)
            .bind(store_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn apply_auto_fix(&self, scan_id: Uuid, issue_id: &str) -> CoreResult<ScanRecord> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let sql = format!("{} WHERE id = $1 FOR UPDATE", SELECT_SCAN);
        let row: ScanRow = sqlx::query_as(&sql)
            .bind(scan_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage)?
            .ok_or_else(|| CoreError::not_found("Scan", scan_id))?;

        let mut scan = ScanRecord::from(row);
        scan.mark_fixed(issue_id)?;

        sqlx::query("UPDATE scans SET issues = $2 WHERE id = $1")
            .bind(scan_id)
            .bind(Json(&scan.issues))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        sqlx::query("INSERT INTO fix_attempts (scan_id, issue_id, applied_at, success) VALUES ($1, $2, $3, TRUE)")
            .bind(scan_id)
            .bind(issue_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        Ok(scan)
    }

    async fn fix_history(&self, scan_id: Uuid) -> CoreResult<Vec<FixAttempt>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM scans WHERE id = $1)")
            .bind(scan_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        if !exists {
            return Err(CoreError::not_found("Scan", scan_id));
        }

        let rows: Vec<FixAttemptRow> = sqlx::query_as(
            "SELECT issue_id, applied_at, success FROM fix_attempts WHERE scan_id = $1 ORDER BY id",
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn stats(&self) -> CoreResult<RepositoryStats> {
        let (users, stores, scans): (i64, i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM users), (SELECT COUNT(*) FROM stores), (SELECT COUNT(*) FROM scans)",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        let (open, fixed): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE issue->>'status' = 'open'),
                COUNT(*) FILTER (WHERE issue->>'status' = 'fixed')
            FROM scans CROSS JOIN LATERAL jsonb_array_elements(scans.issues) AS issue
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(RepositoryStats {
            total_users: users.max(0) as u64,
            total_stores: stores.max(0) as u64,
            total_scans: scans.max(0) as u64,
            open_issues: open.max(0) as u64,
            fixed_issues: fixed.max(0) as u64,
        })
    }
}
