//! Postgres usage counters

use super::storage;
use async_trait::async_trait;
use sd_core::{CoreResult, UsageBackend, UsageRecord};
use sqlx::PgPool;

pub struct PgUsageBackend {
    pool: PgPool,
}

impl PgUsageBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record(period_key: String, scan_count: i32) -> UsageRecord {
    UsageRecord {
        period_key,
        scan_count: scan_count.max(0) as u32,
    }
}

#[async_trait]
impl UsageBackend for PgUsageBackend {
    async fn load(&self, user_id: &str) -> CoreResult<Option<UsageRecord>> {
        let row: Option<(String, i32)> =
            sqlx::query_as("SELECT period_key, scan_count FROM usage_records WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        Ok(row.map(|(period_key, scan_count)| record(period_key, scan_count)))
    }

    async fn increment(&self, user_id: &str, period_key: &str) -> CoreResult<UsageRecord> {
        // Single statement: the counter restarts at 1 when the stored period is stale.
        let (period_key, scan_count): (String, i32) = sqlx::query_as(
            r#"
            INSERT INTO usage_records (user_id, period_key, scan_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                scan_count = CASE
                    WHEN usage_records.period_key = EXCLUDED.period_key THEN usage_records.scan_count + 1
                    ELSE 1
                END,
                period_key = EXCLUDED.period_key
            RETURNING period_key, scan_count
            "#,
        )
        .bind(user_id)
        .bind(period_key)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        Ok(record(period_key, scan_count))
    }

    async fn try_consume(&self, user_id: &str, period_key: &str, quota: u32) -> CoreResult<Option<UsageRecord>> {
        if quota == 0 {
            return Ok(None);
        }

        // The conflict row is locked; the WHERE clause leaves it alone once the period is full.
        let row: Option<(String, i32)> = sqlx::query_as(
            r#"
            INSERT INTO usage_records (user_id, period_key, scan_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                scan_count = CASE
                    WHEN usage_records.period_key = EXCLUDED.period_key THEN usage_records.scan_count + 1
                    ELSE 1
                END,
                period_key = EXCLUDED.period_key
            WHERE usage_records.period_key <> EXCLUDED.period_key
               OR usage_records.scan_count < $3
            RETURNING period_key, scan_count
            "#,
        )
        .bind(user_id)
        .bind(period_key)
        .bind(i32::try_from(quota).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(|(period_key, scan_count)| record(period_key, scan_count)))
    }

    async fn release(&self, user_id: &str, period_key: &str) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE usage_records
            SET scan_count = GREATEST(scan_count - 1, 0)
            WHERE user_id = $1 AND period_key = $2
            "#,
        )
        .bind(user_id)
        .bind(period_key)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}
