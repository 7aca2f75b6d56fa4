// Backup: project local state into sync storage.
//
// Writes `identities`, `cookieStoreIDmap` and `assignedSites` from the local stores,
// then applies at most one identity tombstone and one site tombstone change. The
// whole sequence runs under one feedback guard.

use containersync_common::keys::SyncSiteKey;
use containersync_common::schema::{
    AssignedSites, CookieStoreIdMap, SyncIdentity, ASSIGNED_SITES_KEY, COOKIE_STORE_ID_MAP_KEY,
    IDENTITIES_KEY,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::tombstone::Tombstones;

/// Extra tombstone work recorded in the same backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOptions {
    /// Identity just removed locally.
    pub deleted_identity_uuid: Option<Uuid>,
    /// Site assignment just removed locally.
    pub deleted_site_key: Option<SyncSiteKey>,
    /// Site assigned again after an earlier removal.
    pub undelete_site_key: Option<SyncSiteKey>,
}

impl BackupOptions {
    pub fn identity_deleted(uuid: Uuid) -> Self {
        Self { deleted_identity_uuid: Some(uuid), ..Self::default() }
    }

    pub fn site_deleted(key: SyncSiteKey) -> Self {
        Self { deleted_site_key: Some(key), ..Self::default() }
    }

    pub fn site_undeleted(key: SyncSiteKey) -> Self {
        Self { undelete_site_key: Some(key), ..Self::default() }
    }
}

pub async fn backup(ctx: &SyncContext, options: &BackupOptions) -> SyncResult<()> {
    let _guard = ctx.gate.suspend();
    debug!(?options, "backup");

    let identities: Vec<SyncIdentity> =
        ctx.identities.query_all().await?.into_iter().map(SyncIdentity::from).collect();
    ctx.remote.set_value(IDENTITIES_KEY, &identities).await?;

    let id_map: CookieStoreIdMap = ctx
        .identities
        .uuid_map()
        .await?
        .into_iter()
        .map(|(container, uuid)| (container.into_sync(), uuid))
        .collect();
    ctx.remote.set_value(COOKIE_STORE_ID_MAP_KEY, &id_map).await?;

    let sites: AssignedSites = ctx
        .assignments
        .get_all()
        .await?
        .into_iter()
        .map(|(key, site)| (key.to_sync(), site))
        .collect();
    ctx.remote.set_value(ASSIGNED_SITES_KEY, &sites).await?;

    let tombstones = Tombstones::new(&ctx.remote);
    if let Some(uuid) = options.deleted_identity_uuid {
        tombstones.mark_identity_deleted(uuid).await?;
    }
    if let Some(key) = &options.deleted_site_key {
        tombstones.mark_site_deleted(key).await?;
    }
    if let Some(key) = &options.undelete_site_key {
        tombstones.unmark_site_deleted(key).await?;
    }

    info!(
        identities = identities.len(),
        bindings = id_map.len(),
        sites = sites.len(),
        "backed up local state to sync storage"
    );

    if ctx.debug_dump {
        dump_state(ctx).await?;
    }
    Ok(())
}

async fn dump_state(ctx: &SyncContext) -> SyncResult<()> {
    let remote = Value::Object(ctx.remote.get_all().await?);
    debug!(%remote, "in sync");
    let identities = ctx.identities.query_all().await?;
    let sites = ctx.assignments.get_all().await?;
    debug!(?identities, ?sites, "in local");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelBus, Topic};
    use crate::store::memory::{MemoryAssignmentStore, MemoryIdentityStore, MemoryRemoteBackend};
    use crate::store::{LocalAssignmentStore, LocalIdentityStore};
    use containersync_common::keys::LocalSiteKey;
    use containersync_common::schema::{DELETED_IDENTITY_LIST_KEY, DELETED_SITE_LIST_KEY};
    use containersync_common::types::{AssignedSite, Color, Icon, IdentityInfo};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        ctx: SyncContext,
        bus: Arc<ChannelBus>,
        remote: Arc<MemoryRemoteBackend>,
        identities: Arc<MemoryIdentityStore>,
        assignments: Arc<MemoryAssignmentStore>,
    }

    fn fixture() -> Fixture {
        let (bus, _rx) = ChannelBus::new();
        let remote = Arc::new(MemoryRemoteBackend::default());
        let identities = Arc::new(MemoryIdentityStore::default());
        let assignments = Arc::new(MemoryAssignmentStore::default());
        let ctx =
            SyncContext::new(remote.clone(), identities.clone(), assignments.clone(), bus.clone());
        Fixture { ctx, bus, remote, identities, assignments }
    }

    #[tokio::test]
    async fn backup_projects_local_state() {
        let f = fixture();
        let work = f
            .identities
            .create(&IdentityInfo::new("Work", Color::Orange, Icon::Briefcase))
            .await
            .unwrap();
        let uuid = Uuid::new_v4();
        f.identities.bind_uuid(&work.cookie_store_id, uuid).await.unwrap();
        f.assignments
            .set(&LocalSiteKey::from_origin("corp.test").unwrap(), &AssignedSite::new("1"))
            .await
            .unwrap();

        backup(&f.ctx, &BackupOptions::default()).await.unwrap();

        let entries = f.remote.entries();
        assert_eq!(
            entries[IDENTITIES_KEY],
            json!([{ "cookieStoreId": "firefox-container-1", "name": "Work", "color": "orange", "icon": "briefcase" }])
        );
        assert_eq!(entries[COOKIE_STORE_ID_MAP_KEY], json!({ "firefox-container-1": uuid.to_string() }));
        assert_eq!(
            entries[ASSIGNED_SITES_KEY],
            json!({ "siteContainerMap@@_corp.test": { "userContextId": "1" } })
        );
        assert!(!entries.contains_key(DELETED_IDENTITY_LIST_KEY));
    }

    #[tokio::test]
    async fn backup_records_requested_tombstones() {
        let f = fixture();
        let uuid = Uuid::new_v4();
        let site = SyncSiteKey::from_origin("gone.test").unwrap();

        backup(&f.ctx, &BackupOptions::identity_deleted(uuid)).await.unwrap();
        backup(&f.ctx, &BackupOptions::site_deleted(site.clone())).await.unwrap();

        let entries = f.remote.entries();
        assert_eq!(entries[DELETED_IDENTITY_LIST_KEY], json!([uuid.to_string()]));
        assert_eq!(entries[DELETED_SITE_LIST_KEY], json!(["siteContainerMap@@_gone.test"]));

        backup(&f.ctx, &BackupOptions::site_undeleted(site)).await.unwrap();
        assert_eq!(f.remote.entries()[DELETED_SITE_LIST_KEY], json!([]));
    }

    #[tokio::test]
    async fn backup_resubscribes_notifications_when_done() {
        let f = fixture();
        backup(&f.ctx, &BackupOptions::default()).await.unwrap();
        assert!(Topic::ALL.iter().all(|topic| f.bus.is_subscribed(*topic)));
    }

    #[tokio::test]
    async fn backup_twice_is_byte_identical() {
        let f = fixture();
        let home = f
            .identities
            .create(&IdentityInfo::new("Home", Color::Green, Icon::Tree))
            .await
            .unwrap();
        f.identities.bind_uuid(&home.cookie_store_id, Uuid::new_v4()).await.unwrap();

        backup(&f.ctx, &BackupOptions::default()).await.unwrap();
        let first = f.remote.to_json_string();
        backup(&f.ctx, &BackupOptions::default()).await.unwrap();
        assert_eq!(first, f.remote.to_json_string());
    }
}
