// Site-assignment reconciliation.
//
// Tombstoned sites are removed locally first. Every remaining remote assignment
// is re-pointed from its remote container to the local container with the same
// UUID and written over whatever the local store holds for that site.

use containersync_common::keys::{SyncContainerKey, SyncSiteKey};
use containersync_common::schema::SyncSnapshot;
use containersync_common::types::AssignedSite;
use serde::Serialize;
use tracing::{debug, info};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub removed: usize,
    pub assigned: usize,
    pub skipped: usize,
}

pub async fn reconcile_site_assignments(
    ctx: &SyncContext,
    snapshot: &SyncSnapshot,
) -> SyncResult<SiteReport> {
    let mut report = SiteReport::default();

    let local = ctx.assignments.get_all().await?;
    for deleted in &snapshot.deleted_site_list {
        let key = deleted.to_local();
        if local.contains_key(&key) {
            ctx.assignments.remove(&key).await?;
            info!(site = %key, "removed tombstoned site assignment");
            report.removed += 1;
        }
    }

    for (site, assigned) in &snapshot.assigned_sites {
        if snapshot.is_site_deleted(site) {
            debug!(%site, "skipping tombstoned site");
            report.skipped += 1;
            continue;
        }
        let Some(localized) = localize(ctx, snapshot, site, assigned).await? else {
            report.skipped += 1;
            continue;
        };

        let key = site.to_local();
        if local.get(&key) != Some(&localized) {
            debug!(site = %key, container = %localized.user_context_id, "assigning site");
        }
        ctx.assignments.set(&key, &localized).await?;
        report.assigned += 1;
    }

    Ok(report)
}

/// Re-point `assigned` at the local container sharing its remote container's UUID.
/// `None` when that UUID is tombstoned.
async fn localize(
    ctx: &SyncContext,
    snapshot: &SyncSnapshot,
    site: &SyncSiteKey,
    assigned: &AssignedSite,
) -> SyncResult<Option<AssignedSite>> {
    let container: SyncContainerKey = assigned.container()?;
    let Some(uuid) = snapshot.uuid_for(&container) else {
        return Err(SyncError::MissingJoinEntry { site: site.clone(), container });
    };
    if snapshot.is_identity_deleted(&uuid) {
        debug!(%site, %uuid, "skipping site assigned to tombstoned identity");
        return Ok(None);
    }
    match ctx.identities.lookup_by_uuid(&uuid).await? {
        Some(local) => Ok(Some(assigned.reassigned_to(&local))),
        None => Err(SyncError::UnresolvedUuid { uuid, site: site.clone() }),
    }
}
