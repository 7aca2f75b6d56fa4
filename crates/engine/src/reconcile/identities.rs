// Identity reconciliation.
//
// First sync joins remote records to local identities by display name, because
// the two replicas have never exchanged UUIDs. Every later sync joins through the
// `cookieStoreIDmap` UUIDs. Both start by removing local identities whose UUID is
// tombstoned, and neither ever re-creates a tombstoned UUID.

use std::collections::BTreeSet;

use containersync_common::keys::LocalContainerId;
use containersync_common::schema::SyncSnapshot;
use containersync_common::types::Identity;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::SyncContext;
use crate::error::SyncResult;

/// Per-pass counts, reported by the CLI and asserted in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IdentityReport {
    pub pruned: usize,
    pub created: usize,
    pub updated: usize,
    pub rebound: usize,
    pub skipped: usize,
}

/// Remove every local identity bound to a tombstoned UUID, along with its binding.
pub async fn prune_deleted_identities(
    ctx: &SyncContext,
    snapshot: &SyncSnapshot,
) -> SyncResult<usize> {
    if snapshot.deleted_identity_list.is_empty() {
        return Ok(0);
    }
    let live: BTreeSet<LocalContainerId> = ctx
        .identities
        .query_all()
        .await?
        .into_iter()
        .map(|identity| identity.cookie_store_id)
        .collect();

    let mut pruned = 0;
    for uuid in &snapshot.deleted_identity_list {
        let Some(container) = ctx.identities.lookup_by_uuid(uuid).await? else {
            continue;
        };
        if live.contains(&container) {
            ctx.identities.remove(&container).await?;
            info!(%container, %uuid, "removed tombstoned identity");
            pruned += 1;
        }
        ctx.identities.remove_binding(&container).await?;
    }
    Ok(pruned)
}

/// First-sync merge: match remote records to local identities by name.
pub async fn reconcile_by_name(
    ctx: &SyncContext,
    snapshot: &SyncSnapshot,
) -> SyncResult<IdentityReport> {
    let mut report =
        IdentityReport { pruned: prune_deleted_identities(ctx, snapshot).await?, ..Default::default() };

    // Matches are taken from the list as it stood before this loop.
    let local: Vec<Identity> = ctx.identities.query_all().await?;

    for record in &snapshot.identities {
        let uuid = snapshot.uuid_for(&record.cookie_store_id);
        if uuid.is_some_and(|uuid| snapshot.is_identity_deleted(&uuid)) {
            debug!(name = %record.info.name, "skipping tombstoned identity");
            report.skipped += 1;
            continue;
        }

        let Some(matched) = local.iter().find(|identity| identity.info.name == record.info.name)
        else {
            let created = ctx.identities.create(&record.info).await?;
            info!(identity = %record.info, container = %created.cookie_store_id, "created identity");
            bind(ctx, &created.cookie_store_id, uuid).await?;
            report.created += 1;
            continue;
        };

        if matched.info.style_differs(&record.info) {
            ctx.identities.update(&matched.cookie_store_id, &record.info).await?;
            info!(identity = %record.info, container = %matched.cookie_store_id, "updated identity");
            report.updated += 1;
        } else {
            report.rebound += 1;
        }
        bind(ctx, &matched.cookie_store_id, uuid).await?;
    }

    Ok(report)
}

/// Steady-state merge: walk the remote UUID map and make each entry exist locally.
pub async fn reconcile_by_uuid(
    ctx: &SyncContext,
    snapshot: &SyncSnapshot,
) -> SyncResult<IdentityReport> {
    let mut report =
        IdentityReport { pruned: prune_deleted_identities(ctx, snapshot).await?, ..Default::default() };
    let local: Vec<Identity> = ctx.identities.query_all().await?;

    for (key, uuid) in &snapshot.cookie_store_id_map {
        if snapshot.is_identity_deleted(uuid) {
            debug!(%key, %uuid, "skipping tombstoned identity");
            report.skipped += 1;
            continue;
        }
        let Some(info) = snapshot.identity_info(key) else {
            warn!(%key, %uuid, "sync map entry has no identity record");
            report.skipped += 1;
            continue;
        };

        match ctx.identities.lookup_by_uuid(uuid).await? {
            Some(container) => {
                let current = local.iter().find(|identity| identity.cookie_store_id == container);
                if current.is_some_and(|identity| &identity.info == info) {
                    continue;
                }
                ctx.identities.update(&container, info).await?;
                info!(identity = %info, %container, "updated identity");
                report.updated += 1;
            }
            None => {
                let created = ctx.identities.create(info).await?;
                ctx.identities.bind_uuid(&created.cookie_store_id, *uuid).await?;
                info!(identity = %info, container = %created.cookie_store_id, %uuid, "created identity");
                report.created += 1;
            }
        }
    }

    Ok(report)
}

async fn bind(ctx: &SyncContext, container: &LocalContainerId, uuid: Option<Uuid>) -> SyncResult<()> {
    match uuid {
        Some(uuid) => ctx.identities.bind_uuid(container, uuid).await?,
        None => warn!(%container, "remote identity has no UUID; left unbound"),
    }
    Ok(())
}
