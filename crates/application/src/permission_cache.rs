//! In-memory role → permission cache.
//!
//! The cache holds one immutable [`PermissionSnapshot`] behind an `Arc`.
//! Loads build a complete snapshot off to the side and swap the `Arc` under a
//! short write lock, so readers see either the old or the new snapshot and
//! never a partially populated one. Concurrent load requests share a single
//! in-flight future, driven by a background task so that a load runs to
//! completion even when its callers are cancelled.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use helpdesk_core::{AppError, AppResult, RoleId};
use helpdesk_domain::{PermissionSlug, Role};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::RbacStore;

type SharedLoad = Shared<BoxFuture<'static, AppResult<Arc<PermissionSnapshot>>>>;
type SnapshotSlot = Arc<RwLock<Option<Arc<PermissionSnapshot>>>>;

/// Immutable view of every role and its grants at one point in time.
#[derive(Debug)]
pub struct PermissionSnapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    roles: HashMap<RoleId, Role>,
    grants: HashMap<RoleId, BTreeSet<PermissionSlug>>,
}

impl PermissionSnapshot {
    /// Load counter; the first successful load is generation `1`.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time the snapshot was swapped in.
    #[must_use]
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Returns the role reference row for an id.
    #[must_use]
    pub fn role(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.get(role_id)
    }

    /// Returns every role's grant set.
    #[must_use]
    pub fn grants(&self) -> &HashMap<RoleId, BTreeSet<PermissionSlug>> {
        &self.grants
    }

    /// Unions the grants of the given roles. Unknown roles contribute nothing.
    #[must_use]
    pub fn permissions_for(&self, role_ids: &BTreeSet<RoleId>) -> BTreeSet<PermissionSlug> {
        role_ids
            .iter()
            .filter_map(|role_id| self.grants.get(role_id))
            .flatten()
            .cloned()
            .collect()
    }

    /// Returns whether any of the roles grants the permission.
    #[must_use]
    pub fn grants_permission(&self, role_ids: &BTreeSet<RoleId>, permission: &PermissionSlug) -> bool {
        role_ids.iter().any(|role_id| {
            self.grants
                .get(role_id)
                .is_some_and(|granted| granted.contains(permission))
        })
    }

    /// Names of the given roles. Unknown roles are skipped.
    #[must_use]
    pub fn role_names(&self, role_ids: &BTreeSet<RoleId>) -> BTreeSet<String> {
        role_ids
            .iter()
            .filter_map(|role_id| self.roles.get(role_id))
            .map(|role| role.name().to_owned())
            .collect()
    }

    /// Number of known roles.
    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of role-permission edges.
    #[must_use]
    pub fn grant_count(&self) -> usize {
        self.grants.values().map(BTreeSet::len).sum()
    }

    /// Summary of this snapshot.
    #[must_use]
    pub fn stats(&self) -> PermissionCacheStats {
        PermissionCacheStats {
            generation: self.generation,
            loaded_at: self.loaded_at,
            role_count: self.role_count(),
            grant_count: self.grant_count(),
        }
    }
}

/// Summary of the active snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionCacheStats {
    /// Load counter of the active snapshot.
    pub generation: u64,
    /// Time the active snapshot was swapped in.
    pub loaded_at: DateTime<Utc>,
    /// Number of known roles.
    pub role_count: usize,
    /// Number of role-permission edges.
    pub grant_count: usize,
}

/// Process-wide role → permission cache.
///
/// Cloning is cheap and every clone shares the same snapshot and in-flight
/// load.
#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn RbacStore>,
    current: SnapshotSlot,
    in_flight: Arc<Mutex<Option<SharedLoad>>>,
}

impl PermissionCache {
    /// Creates an empty cache reading from the given store.
    ///
    /// Lookups fail closed until [`PermissionCache::load`] succeeds once.
    #[must_use]
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self {
            store,
            current: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    /// Fetches every role and grant and swaps in a fresh snapshot.
    ///
    /// Callers arriving while a load is running await that load instead of
    /// querying the store again. A failed load leaves the previous snapshot
    /// in place.
    pub async fn load(&self) -> AppResult<Arc<PermissionSnapshot>> {
        let pending = self.join_or_start_load().await;
        let result = pending.clone().await;
        self.clear_in_flight(&pending).await;
        result
    }

    /// Re-reads the store after administrative changes.
    ///
    /// A load already in flight may have read data from before the change,
    /// so it is awaited first and a new load is started afterwards.
    pub async fn reload(&self) -> AppResult<Arc<PermissionSnapshot>> {
        let previous = self.in_flight.lock().await.clone();
        if let Some(previous) = previous {
            debug!("waiting for in-flight permission cache load before reloading");
            let _ = previous.clone().await;
            self.clear_in_flight(&previous).await;
        }

        self.load().await
    }

    /// Returns the active snapshot, loading one first if none exists yet.
    pub async fn ensure_loaded(&self) -> AppResult<Arc<PermissionSnapshot>> {
        if let Some(snapshot) = self.snapshot().await {
            return Ok(snapshot);
        }

        self.load().await
    }

    /// Returns the active snapshot, if any load has completed.
    pub async fn snapshot(&self) -> Option<Arc<PermissionSnapshot>> {
        self.current.read().await.clone()
    }

    /// Returns whether a load has ever completed.
    pub async fn is_loaded(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Summary of the active snapshot.
    pub async fn stats(&self) -> Option<PermissionCacheStats> {
        self.snapshot().await.map(|snapshot| snapshot.stats())
    }

    /// Unions the permissions granted to the given roles.
    ///
    /// Fails with [`AppError::CacheUnavailable`] before the first successful
    /// load.
    pub async fn get_permissions(
        &self,
        role_ids: &BTreeSet<RoleId>,
    ) -> AppResult<BTreeSet<PermissionSlug>> {
        let snapshot = self.loaded_snapshot().await?;
        Ok(snapshot.permissions_for(role_ids))
    }

    /// Returns whether any of the roles grants the permission. Denies while
    /// the cache has never loaded.
    pub async fn has_permission(
        &self,
        role_ids: &BTreeSet<RoleId>,
        permission: &PermissionSlug,
    ) -> bool {
        match self.snapshot().await {
            Some(snapshot) => snapshot.grants_permission(role_ids, permission),
            None => {
                warn!(permission = %permission, "permission cache not loaded, denying");
                false
            }
        }
    }

    /// Names of the given roles.
    pub async fn role_names(&self, role_ids: &BTreeSet<RoleId>) -> AppResult<BTreeSet<String>> {
        let snapshot = self.loaded_snapshot().await?;
        Ok(snapshot.role_names(role_ids))
    }

    async fn loaded_snapshot(&self) -> AppResult<Arc<PermissionSnapshot>> {
        self.snapshot().await.ok_or_else(|| {
            AppError::CacheUnavailable("permission cache has not completed a load".to_owned())
        })
    }

    async fn join_or_start_load(&self) -> SharedLoad {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(pending) = in_flight.as_ref() {
            debug!("joining in-flight permission cache load");
            return pending.clone();
        }

        let pending = fetch_and_swap(Arc::clone(&self.store), Arc::clone(&self.current))
            .boxed()
            .shared();
        *in_flight = Some(pending.clone());

        // Drives the load to completion even when every caller stops waiting.
        let driver = pending.clone();
        let slot = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let _ = driver.clone().await;
            clear_in_flight(&slot, &driver).await;
        });

        pending
    }

    async fn clear_in_flight(&self, finished: &SharedLoad) {
        clear_in_flight(&self.in_flight, finished).await;
    }
}

async fn clear_in_flight(in_flight: &Mutex<Option<SharedLoad>>, finished: &SharedLoad) {
    let mut in_flight = in_flight.lock().await;
    if in_flight
        .as_ref()
        .is_some_and(|current| current.ptr_eq(finished))
    {
        *in_flight = None;
    }
}

async fn fetch_and_swap(
    store: Arc<dyn RbacStore>,
    current: SnapshotSlot,
) -> AppResult<Arc<PermissionSnapshot>> {
    let started = Instant::now();

    let (roles, pairs) =
        match futures::try_join!(store.list_roles(), store.list_role_permission_pairs()) {
            Ok(rows) => rows,
            Err(error) => {
                error!(%error, "failed to load permission cache, keeping previous snapshot");
                return Err(error);
            }
        };

    let roles = roles
        .into_iter()
        .map(|role| (role.role_id(), role))
        .collect::<HashMap<_, _>>();

    let mut grants: HashMap<RoleId, BTreeSet<PermissionSlug>> = HashMap::new();
    for pair in pairs {
        grants.entry(pair.role_id).or_default().insert(pair.permission);
    }

    let snapshot = {
        let mut slot = current.write().await;
        let generation = slot.as_ref().map_or(0, |previous| previous.generation) + 1;
        let snapshot = Arc::new(PermissionSnapshot {
            generation,
            loaded_at: Utc::now(),
            roles,
            grants,
        });
        *slot = Some(Arc::clone(&snapshot));
        snapshot
    };

    info!(
        generation = snapshot.generation,
        roles = snapshot.role_count(),
        grants = snapshot.grant_count(),
        elapsed = ?started.elapsed(),
        "permission cache loaded"
    );

    Ok(snapshot)
}
