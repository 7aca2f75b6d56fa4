// Pre-pass hygiene for both stores.
//
// Local: bindings whose container is gone are dropped, and every identity without
// a binding gets a fresh UUID. Remote: `cookieStoreIDmap` entries without an
// `identities` record are dropped. Callers hold a feedback guard.

use std::collections::BTreeSet;

use containersync_common::keys::LocalContainerId;
use containersync_common::schema::{CookieStoreIdMap, COOKIE_STORE_ID_MAP_KEY};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::SyncContext;
use crate::error::SyncResult;

/// What `cleanup_local` changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalCleanup {
    pub stale_bindings: usize,
    pub new_bindings: usize,
}

pub async fn cleanup_local(ctx: &SyncContext) -> SyncResult<LocalCleanup> {
    let identities = ctx.identities.query_all().await?;
    let live: BTreeSet<&LocalContainerId> =
        identities.iter().map(|identity| &identity.cookie_store_id).collect();
    let bindings = ctx.identities.uuid_map().await?;

    let mut report = LocalCleanup::default();
    for container in bindings.keys().filter(|container| !live.contains(container)) {
        ctx.identities.remove_binding(container).await?;
        debug!(%container, "dropped binding for missing container");
        report.stale_bindings += 1;
    }

    for identity in identities.iter().filter(|i| !bindings.contains_key(&i.cookie_store_id)) {
        let uuid = Uuid::new_v4();
        ctx.identities.bind_uuid(&identity.cookie_store_id, uuid).await?;
        debug!(container = %identity.cookie_store_id, %uuid, "bound unbound identity");
        report.new_bindings += 1;
    }

    if report != LocalCleanup::default() {
        info!(
            stale = report.stale_bindings,
            bound = report.new_bindings,
            "cleaned local identity bindings"
        );
    }
    Ok(report)
}

/// Drop orphaned `cookieStoreIDmap` entries. Returns how many were removed.
pub async fn cleanup_remote(ctx: &SyncContext) -> SyncResult<usize> {
    let snapshot = ctx.remote.load_snapshot().await?;
    let orphaned = snapshot.orphaned_map_keys();
    if orphaned.is_empty() {
        return Ok(0);
    }

    let cleaned: CookieStoreIdMap = snapshot
        .cookie_store_id_map
        .into_iter()
        .filter(|(key, _)| !orphaned.contains(key))
        .collect();
    ctx.remote.set_value(COOKIE_STORE_ID_MAP_KEY, &cleaned).await?;
    info!(removed = orphaned.len(), "pruned orphaned sync map entries");
    Ok(orphaned.len())
}
