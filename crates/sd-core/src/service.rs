//! Plan-enforcing facade over the repository and usage accounting
//!
//! Every dashboard action goes through [`DoctorService`], which checks that
//! the caller owns the record, applies the caller's plan limits and then
//! delegates to the repository.

use crate::benchmark::{self, BenchmarkReport};
use crate::models::{FixAttempt, Issue, ScanDraft, ScanRecord, StoreRecord, StoreUpdate, UserRecord};
use crate::plans::{self, Feature, PlanDefinition, PlanId};
use crate::repository::{MemoryRepository, Repository, RepositoryStats};
use crate::usage::{UsageAccounting, UsageSummary};
use crate::{CoreError, CoreResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// User record with this period's usage
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user: UserRecord,
    pub plan: &'static PlanDefinition,
    pub usage: UsageSummary,
}

/// Outcome of an auto-fix request
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub issue: Issue,
    pub scan: ScanRecord,
}

#[derive(Clone)]
pub struct DoctorService {
    repo: Arc<dyn Repository>,
    usage: UsageAccounting,
}

impl DoctorService {
    pub fn new(repo: Arc<dyn Repository>, usage: UsageAccounting) -> Self {
        Self { repo, usage }
    }

    /// Service over in-memory storage on the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRepository::new()), UsageAccounting::in_memory())
    }

    pub fn usage(&self) -> &UsageAccounting {
        &self.usage
    }

    pub async fn account(&self, user_id: &str) -> CoreResult<Account> {
        let user = self.repo.get_or_create_user(user_id).await?;
        Ok(self.account_for(user).await)
    }

    /// Switch plan. Usage for the period is kept as it is.
    pub async fn change_plan(&self, user_id: &str, plan: PlanId) -> CoreResult<Account> {
        let user = self.repo.set_plan(user_id, plan).await?;
        Ok(self.account_for(user).await)
    }

    async fn account_for(&self, user: UserRecord) -> Account {
        let usage = self.usage.summary(&user.id, user.plan).await;
        Account {
            plan: plans::definition(user.plan),
            usage,
            user,
        }
    }

    pub async fn list_stores(&self, user_id: &str) -> CoreResult<Vec<StoreRecord>> {
        self.repo.list_stores(user_id).await
    }

    /// Connect a store, bounded by the plan's store quota
    pub async fn connect_store(&self, user_id: &str, name: &str, url: &str) -> CoreResult<StoreRecord> {
        let user = self.repo.get_or_create_user(user_id).await?;
        let plan = plans::definition(user.plan);
        let owned = self.repo.list_stores(user_id).await?.len();
        if owned >= plan.store_quota as usize {
            return Err(CoreError::QuotaExceeded(format!(
                "the {} plan allows {} connected store(s)",
                plan.id, plan.store_quota
            )));
        }

        let store = self.repo.create_store(user_id, name, url).await?;
        info!(user_id, store_id = %store.id, url = %store.url, "store connected");
        Ok(store)
    }

    pub async fn store(&self, user_id: &str, store_id: Uuid) -> CoreResult<StoreRecord> {
        self.repo
            .get_store(store_id)
            .await?
            .filter(|s| s.owner_id == user_id)
            .ok_or_else(|| CoreError::not_found("Store", store_id))
    }

    pub async fn update_store(&self, user_id: &str, store_id: Uuid, update: StoreUpdate) -> CoreResult<StoreRecord> {
        self.store(user_id, store_id).await?;
        self.repo.update_store(store_id, update).await
    }

    /// Disconnect a store; `false` when the caller has no such store
    pub async fn disconnect_store(&self, user_id: &str, store_id: Uuid) -> CoreResult<bool> {
        match self.store(user_id, store_id).await {
            Ok(_) => {}
            Err(CoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        let deleted = self.repo.delete_store(store_id).await?;
        if deleted {
            info!(user_id, %store_id, "store disconnected");
        }
        Ok(deleted)
    }

    pub async fn list_scans(&self, user_id: &str, store_id: Uuid) -> CoreResult<Vec<ScanRecord>> {
        self.store(user_id, store_id).await?;
        self.repo.list_scans(store_id).await
    }

    /// Charge a scan against the monthly quota and store its results.
    ///
    /// The quota check and the charge are one atomic step; the charge is
    /// refunded when the scan cannot be stored.
    pub async fn submit_scan(&self, user_id: &str, store_id: Uuid, draft: ScanDraft) -> CoreResult<ScanRecord> {
        draft.validate()?;
        self.store(user_id, store_id).await?;

        let user = self.repo.get_or_create_user(user_id).await?;
        let charge = match self.usage.try_record_scan(user_id, user.plan).await? {
            Some(charge) => charge,
            None => {
                let plan = plans::definition(user.plan);
                return Err(CoreError::QuotaExceeded(format!(
                    "the {} plan allows {} scan(s) per month",
                    plan.id, plan.scan_quota_per_month
                )));
            }
        };

        let scan = match self.repo.create_scan(store_id, user_id, draft).await {
            Ok(scan) => scan,
            Err(e) => {
                if let Err(refund) = self.usage.release_scan(user_id, &charge).await {
                    warn!(user_id, error = %refund, "failed to refund scan charge");
                }
                return Err(e);
            }
        };
        info!(
            user_id,
            %store_id,
            scan_id = %scan.id,
            score = scan.overall_score,
            issues = scan.issues.len(),
            "scan stored"
        );
        Ok(scan)
    }

    pub async fn scan(&self, user_id: &str, scan_id: Uuid) -> CoreResult<ScanRecord> {
        self.repo
            .get_scan(scan_id)
            .await?
            .filter(|s| s.owner_id == user_id)
            .ok_or_else(|| CoreError::not_found("Scan", scan_id))
    }

    /// Apply an auto-fix; requires a plan with the `auto_fix` feature
    pub async fn auto_fix(&self, user_id: &str, scan_id: Uuid, issue_id: &str) -> CoreResult<FixOutcome> {
        self.scan(user_id, scan_id).await?;
        let user = self.repo.get_or_create_user(user_id).await?;
        if !plans::definition(user.plan).has_feature(Feature::AutoFix) {
            return Err(CoreError::FeatureUnavailable {
                feature: Feature::AutoFix,
                plan: user.plan,
            });
        }

        let scan = self.repo.apply_auto_fix(scan_id, issue_id).await?;
        let issue = scan
            .issue(issue_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Issue", issue_id))?;
        info!(user_id, %scan_id, issue_id, "auto-fix applied");
        Ok(FixOutcome { issue, scan })
    }

    pub async fn fix_history(&self, user_id: &str, scan_id: Uuid) -> CoreResult<Vec<FixAttempt>> {
        self.scan(user_id, scan_id).await?;
        self.repo.fix_history(scan_id).await
    }

    pub async fn benchmark(&self, user_id: &str, scan_id: Uuid) -> CoreResult<BenchmarkReport> {
        let scan = self.scan(user_id, scan_id).await?;
        Ok(benchmark::report_for(&scan))
    }

    pub async fn stats(&self) -> CoreResult<RepositoryStats> {
        self.repo.stats().await
    }
}
