//! Monthly scan usage accounting
//!
//! Usage is counted per user per calendar month. A record whose period key
//! is older than the current month reads as zero; it is only overwritten by
//! the next increment, never proactively.

use crate::plans::{self, PlanId};
use crate::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Source of wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Period key (`YYYY-MM`) for an instant
pub fn period_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Scan counter for one user in one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub period_key: String,
    pub scan_count: u32,
}

impl UsageRecord {
    pub fn empty(period_key: impl Into<String>) -> Self {
        Self {
            period_key: period_key.into(),
            scan_count: 0,
        }
    }
}

/// Usage figures as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub plan: PlanId,
    pub period_key: String,
    pub scan_count: u32,
    pub scan_quota: u32,
    pub remaining: u32,
}

/// Storage for usage records
#[async_trait]
pub trait UsageBackend: Send + Sync {
    /// Stored record for a user, whatever its period
    async fn load(&self, user_id: &str) -> CoreResult<Option<UsageRecord>>;

    /// Atomically bump the counter for `period_key`.
    ///
    /// A stored record from a different period is replaced by a count of one.
    async fn increment(&self, user_id: &str, period_key: &str) -> CoreResult<UsageRecord>;

    /// Atomically bump the counter only while it is below `quota`.
    ///
    /// Returns `None`, leaving the record untouched, when the period's quota
    /// is already used. A stale record counts as zero.
    async fn try_consume(&self, user_id: &str, period_key: &str, quota: u32) -> CoreResult<Option<UsageRecord>>;

    /// Give back one scan charged in `period_key`. No-op for any other period.
    async fn release(&self, user_id: &str, period_key: &str) -> CoreResult<()>;
}

/// In-process usage storage
#[derive(Debug, Default)]
pub struct MemoryUsageBackend {
    records: Mutex<HashMap<String, UsageRecord>>,
}

impl MemoryUsageBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsageBackend for MemoryUsageBackend {
    async fn load(&self, user_id: &str) -> CoreResult<Option<UsageRecord>> {
        let records = self.records.lock().await;
        Ok(records.get(user_id).cloned())
    }

    async fn increment(&self, user_id: &str, period_key: &str) -> CoreResult<UsageRecord> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(user_id.to_string())
            .or_insert_with(|| UsageRecord::empty(period_key));

        if record.period_key != period_key {
            *record = UsageRecord::empty(period_key);
        }
        record.scan_count = record.scan_count.saturating_add(1);

        Ok(record.clone())
    }

    async fn try_consume(&self, user_id: &str, period_key: &str, quota: u32) -> CoreResult<Option<UsageRecord>> {
        let mut records = self.records.lock().await;
        let used = records
            .get(user_id)
            .filter(|r| r.period_key == period_key)
            .map_or(0, |r| r.scan_count);
        if used >= quota {
            return Ok(None);
        }

        let record = UsageRecord {
            period_key: period_key.to_string(),
            scan_count: used + 1,
        };
        records.insert(user_id.to_string(), record.clone());
        Ok(Some(record))
    }

    async fn release(&self, user_id: &str, period_key: &str) -> CoreResult<()> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get_mut(user_id).filter(|r| r.period_key == period_key) {
            record.scan_count = record.scan_count.saturating_sub(1);
        }
        Ok(())
    }
}

/// Plan-gated scan accounting
#[derive(Clone)]
pub struct UsageAccounting {
    backend: Arc<dyn UsageBackend>,
    clock: Arc<dyn Clock>,
}

impl UsageAccounting {
    pub fn new(backend: Arc<dyn UsageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// In-memory accounting on the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryUsageBackend::new()), Arc::new(SystemClock))
    }

    pub fn current_period(&self) -> String {
        period_key(self.clock.now())
    }

    /// Usage for the current period; a stale record reads as zero
    pub async fn get_usage(&self, user_id: &str) -> CoreResult<UsageRecord> {
        let period = self.current_period();
        let record = self.backend.load(user_id).await?;

        Ok(match record {
            Some(record) if record.period_key == period => record,
            _ => UsageRecord::empty(period),
        })
    }

    /// Scans left this period. Reports zero when usage cannot be read.
    pub async fn remaining(&self, user_id: &str, plan: PlanId) -> u32 {
        match self.get_usage(user_id).await {
            Ok(usage) => plans::definition(plan).remaining_scans(usage.scan_count),
            Err(e) => {
                warn!(user_id, error = %e, "usage unavailable, treating quota as exhausted");
                0
            }
        }
    }

    pub async fn can_scan(&self, user_id: &str, plan: PlanId) -> bool {
        self.remaining(user_id, plan).await > 0
    }

    pub async fn record_scan(&self, user_id: &str) -> CoreResult<UsageRecord> {
        let period = self.current_period();
        let record = self.backend.increment(user_id, &period).await?;
        debug!(user_id, period = %record.period_key, count = record.scan_count, "scan recorded");
        Ok(record)
    }

    /// Charge one scan if the plan's quota allows it; `None` when exhausted
    pub async fn try_record_scan(&self, user_id: &str, plan: PlanId) -> CoreResult<Option<UsageRecord>> {
        let quota = plans::definition(plan).scan_quota_per_month;
        let period = self.current_period();
        let record = self.backend.try_consume(user_id, &period, quota).await?;
        match &record {
            Some(r) => debug!(user_id, period = %r.period_key, count = r.scan_count, "scan charged"),
            None => debug!(user_id, %period, quota, "scan quota exhausted"),
        }
        Ok(record)
    }

    /// Refund a scan charged by [`try_record_scan`](Self::try_record_scan)
    pub async fn release_scan(&self, user_id: &str, record: &UsageRecord) -> CoreResult<()> {
        self.backend.release(user_id, &record.period_key).await
    }

    /// Usage summary; an unreadable backend shows as an exhausted quota
    pub async fn summary(&self, user_id: &str, plan: PlanId) -> UsageSummary {
        let definition = plans::definition(plan);
        let quota = definition.scan_quota_per_month;
        let period = self.current_period();

        match self.get_usage(user_id).await {
            Ok(usage) => UsageSummary {
                plan,
                period_key: usage.period_key,
                scan_count: usage.scan_count,
                scan_quota: quota,
                remaining: definition.remaining_scans(usage.scan_count),
            },
            Err(e) => {
                warn!(user_id, error = %e, "usage unavailable, reporting exhausted quota");
                UsageSummary {
                    plan,
                    period_key: period,
                    scan_count: quota,
                    scan_quota: quota,
                    remaining: 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use chrono::TimeZone;

    struct BrokenBackend;

    #[async_trait]
    impl UsageBackend for BrokenBackend {
        async fn load(&self, _user_id: &str) -> CoreResult<Option<UsageRecord>> {
            Err(CoreError::Storage("connection refused".to_string()))
        }

        async fn increment(&self, _user_id: &str, _period_key: &str) -> CoreResult<UsageRecord> {
            Err(CoreError::Storage("connection refused".to_string()))
        }

        async fn try_consume(&self, _user_id: &str, _period_key: &str, _quota: u32) -> CoreResult<Option<UsageRecord>> {
            Err(CoreError::Storage("connection refused".to_string()))
        }

        async fn release(&self, _user_id: &str, _period_key: &str) -> CoreResult<()> {
            Err(CoreError::Storage("connection refused".to_string()))
        }
    }

    fn october() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap()
    }

    fn accounting_at(now: DateTime<Utc>) -> (UsageAccounting, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let accounting = UsageAccounting::new(Arc::new(MemoryUsageBackend::new()), clock.clone());
        (accounting, clock)
    }

    #[test]
    fn test_period_key_is_calendar_month() {
        assert_eq!(period_key(october()), "2026-10");
        let new_year = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(period_key(new_year), "2027-01");
    }

    #[tokio::test]
    async fn test_first_read_is_zero() {
        let (accounting, _) = accounting_at(october());
        let usage = accounting.get_usage("u1").await.unwrap();
        assert_eq!(usage, UsageRecord::empty("2026-10"));
    }

    #[tokio::test]
    async fn test_record_scan_increments_by_one() {
        let (accounting, _) = accounting_at(october());
        for expected in 1..=5 {
            accounting.record_scan("u1").await.unwrap();
            assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, expected);
        }
        assert_eq!(accounting.get_usage("u2").await.unwrap().scan_count, 0);
    }

    #[tokio::test]
    async fn test_month_rollover_resets_lazily() {
        let (accounting, clock) = accounting_at(october());
        accounting.record_scan("u1").await.unwrap();
        accounting.record_scan("u1").await.unwrap();

        clock.set(Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 1).unwrap());
        let usage = accounting.get_usage("u1").await.unwrap();
        assert_eq!(usage.scan_count, 0);
        assert_eq!(usage.period_key, "2026-11");

        let record = accounting.record_scan("u1").await.unwrap();
        assert_eq!(record, UsageRecord { period_key: "2026-11".to_string(), scan_count: 1 });
    }

    #[tokio::test]
    async fn test_free_then_pro_scenario() {
        let (accounting, _) = accounting_at(october());
        assert!(accounting.can_scan("u1", PlanId::Free).await);

        accounting.record_scan("u1").await.unwrap();
        assert!(!accounting.can_scan("u1", PlanId::Free).await);
        assert_eq!(accounting.remaining("u1", PlanId::Free).await, 0);

        assert_eq!(accounting.remaining("u1", PlanId::Pro).await, 9);
        assert!(accounting.can_scan("u1", PlanId::Pro).await);
    }

    #[tokio::test]
    async fn test_remaining_never_negative() {
        let (accounting, _) = accounting_at(october());
        for _ in 0..60 {
            accounting.record_scan("heavy").await.unwrap();
        }
        for plan in [PlanId::Free, PlanId::Pro, PlanId::Advanced] {
            assert_eq!(accounting.remaining("heavy", plan).await, 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (accounting, _) = accounting_at(october());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let accounting = accounting.clone();
            handles.push(tokio::spawn(async move {
                accounting.record_scan("u1").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, 32);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let accounting = UsageAccounting::new(Arc::new(BrokenBackend), Arc::new(SystemClock));
        assert_eq!(accounting.remaining("u1", PlanId::Advanced).await, 0);
        assert!(!accounting.can_scan("u1", PlanId::Advanced).await);
        assert!(accounting.record_scan("u1").await.is_err());
        assert!(accounting.try_record_scan("u1", PlanId::Advanced).await.is_err());

        let summary = accounting.summary("u1", PlanId::Pro).await;
        assert_eq!(summary.remaining, 0);
        assert_eq!(summary.scan_quota, 10);
    }

    #[tokio::test]
    async fn test_try_record_scan_stops_at_quota() {
        let (accounting, _) = accounting_at(october());
        let first = accounting.try_record_scan("u1", PlanId::Free).await.unwrap();
        assert_eq!(first.map(|r| r.scan_count), Some(1));
        assert!(accounting.try_record_scan("u1", PlanId::Free).await.unwrap().is_none());
        assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, 1);

        let second = accounting.try_record_scan("u1", PlanId::Pro).await.unwrap();
        assert_eq!(second.map(|r| r.scan_count), Some(2));
    }

    #[tokio::test]
    async fn test_try_record_scan_restarts_stale_period() {
        let (accounting, clock) = accounting_at(october());
        accounting.try_record_scan("u1", PlanId::Free).await.unwrap();

        clock.set(Utc.with_ymd_and_hms(2026, 11, 2, 8, 0, 0).unwrap());
        let record = accounting.try_record_scan("u1", PlanId::Free).await.unwrap().unwrap();
        assert_eq!(record, UsageRecord { period_key: "2026-11".to_string(), scan_count: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_charges_respect_quota() {
        let (accounting, _) = accounting_at(october());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let accounting = accounting.clone();
            handles.push(tokio::spawn(async move {
                accounting.try_record_scan("u1", PlanId::Pro).await.unwrap().is_some()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 10);
        assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, 10);
    }

    #[tokio::test]
    async fn test_release_refunds_only_its_period() {
        let (accounting, clock) = accounting_at(october());
        let record = accounting.try_record_scan("u1", PlanId::Pro).await.unwrap().unwrap();
        accounting.release_scan("u1", &record).await.unwrap();
        assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, 0);

        let october_charge = accounting.try_record_scan("u1", PlanId::Pro).await.unwrap().unwrap();
        clock.set(Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap());
        accounting.try_record_scan("u1", PlanId::Pro).await.unwrap();
        accounting.release_scan("u1", &october_charge).await.unwrap();
        assert_eq!(accounting.get_usage("u1").await.unwrap().scan_count, 1);
    }
}
