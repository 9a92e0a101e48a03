//! In-memory repository

use super::{Repository, RepositoryStats};
use crate::models::{
    FixAttempt, IssueStatus, ScanDraft, ScanRecord, StoreRecord, StoreUpdate, UserRecord,
};
use crate::plans::PlanId;
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    stores: HashMap<Uuid, StoreRecord>,
    store_order: Vec<Uuid>,
    scans: HashMap<Uuid, ScanRecord>,
    scan_order: Vec<Uuid>,
    fix_history: HashMap<Uuid, Vec<FixAttempt>>,
}

/// Repository kept entirely in process memory.
///
/// All maps live behind one lock so a scan insert and the matching store
/// cache update are never observed separately.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_or_create_user(&self, user_id: &str) -> CoreResult<UserRecord> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id));
        Ok(user.clone())
    }

    async fn set_plan(&self, user_id: &str, plan: PlanId) -> CoreResult<UserRecord> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(user_id));
        user.plan = plan;
        info!(user_id, plan = %plan, "plan changed");
        Ok(user.clone())
    }

    async fn create_store(&self, owner_id: &str, name: &str, url: &str) -> CoreResult<StoreRecord> {
        let store = StoreRecord::new(owner_id, name, url)?;
        let mut inner = self.inner.write().await;
        inner.store_order.push(store.id);
        inner.stores.insert(store.id, store.clone());
        Ok(store)
    }

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<StoreRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.stores.get(&id).cloned())
    }

    async fn list_stores(&self, owner_id: &str) -> CoreResult<Vec<StoreRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .store_order
            .iter()
            .filter_map(|id| inner.stores.get(id))
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_store(&self, id: Uuid, update: StoreUpdate) -> CoreResult<StoreRecord> {
        let mut inner = self.inner.write().await;
        let store = inner
            .stores
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Store", id))?;
        store.apply_update(&update)?;
        Ok(store.clone())
    }

    async fn delete_store(&self, id: Uuid) -> CoreResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.stores.remove(&id).is_none() {
            return Ok(false);
        }
        inner.store_order.retain(|s| *s != id);

        let removed: Vec<Uuid> = inner
            .scans
            .values()
            .filter(|scan| scan.store_id == id)
            .map(|scan| scan.id)
            .collect();
        for scan_id in &removed {
            inner.scans.remove(scan_id);
            inner.fix_history.remove(scan_id);
        }
        inner.scan_order.retain(|s| !removed.contains(s));

        Ok(true)
    }

    async fn create_scan(&self, store_id: Uuid, owner_id: &str, draft: ScanDraft) -> CoreResult<ScanRecord> {
        let scan = ScanRecord::from_draft(store_id, owner_id, draft)?;

        let mut inner = self.inner.write().await;
        let store = inner
            .stores
            .get_mut(&store_id)
            .ok_or_else(|| CoreError::not_found("Store", store_id))?;
        store.sync_from_scan(scan.overall_score, scan.issues.len(), scan.created_at);

        inner.scan_order.push(scan.id);
        inner.scans.insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn get_scan(&self, id: Uuid) -> CoreResult<Option<ScanRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.scans.get(&id).cloned())
    }

    async fn list_scans(&self, store_id: Uuid) -> CoreResult<Vec<ScanRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .scan_order
            .iter()
            .rev()
            .filter_map(|id| inner.scans.get(id))
            .filter(|scan| scan.store_id == store_id)
            .cloned()
            .collect())
    }

    async fn apply_auto_fix(&self, scan_id: Uuid, issue_id: &str) -> CoreResult<ScanRecord> {
        let mut inner = self.inner.write().await;
        let scan = inner
            .scans
            .get_mut(&scan_id)
            .ok_or_else(|| CoreError::not_found("Scan", scan_id))?;
        scan.mark_fixed(issue_id)?;
        let scan = scan.clone();

        inner.fix_history.entry(scan_id).or_default().push(FixAttempt {
            issue_id: issue_id.to_string(),
            applied_at: Utc::now(),
            success: true,
        });
        Ok(scan)
    }

    async fn fix_history(&self, scan_id: Uuid) -> CoreResult<Vec<FixAttempt>> {
        let inner = self.inner.read().await;
        if !inner.scans.contains_key(&scan_id) {
            return Err(CoreError::not_found("Scan", scan_id));
        }
        Ok(inner.fix_history.get(&scan_id).cloned().unwrap_or_default())
    }

    async fn stats(&self) -> CoreResult<RepositoryStats> {
        let inner = self.inner.read().await;
        let (open, fixed) = inner
            .scans
            .values()
            .flat_map(|scan| scan.issues.iter())
            .fold((0u64, 0u64), |(open, fixed), issue| match issue.status {
                IssueStatus::Open => (open + 1, fixed),
                IssueStatus::Fixed => (open, fixed + 1),
            });

        Ok(RepositoryStats {
            total_users: inner.users.len() as u64,
            total_stores: inner.stores.len() as u64,
            total_scans: inner.scans.len() as u64,
            open_issues: open,
            fixed_issues: fixed,
        })
    }
}
