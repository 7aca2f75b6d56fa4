// Deletion lists in sync storage: `deletedIdentityList` and `deletedSiteList`.
//
// Both lists only grow through marking; `unmark_site_deleted` is the single way an
// entry leaves. Callers hold a feedback guard (these run inside a backup).

use containersync_common::keys::SyncSiteKey;
use containersync_common::schema::{DELETED_IDENTITY_LIST_KEY, DELETED_SITE_LIST_KEY};
use tracing::debug;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::remote::RemoteStore;

pub struct Tombstones<'a> {
    remote: &'a RemoteStore,
}

impl<'a> Tombstones<'a> {
    pub fn new(remote: &'a RemoteStore) -> Self {
        Self { remote }
    }

    /// Append `uuid` unless already present. Returns whether the list changed.
    pub async fn mark_identity_deleted(&self, uuid: Uuid) -> SyncResult<bool> {
        let mut deleted: Vec<Uuid> = self.remote.get_array(DELETED_IDENTITY_LIST_KEY).await?;
        if deleted.contains(&uuid) {
            return Ok(false);
        }
        deleted.push(uuid);
        self.remote.set_value(DELETED_IDENTITY_LIST_KEY, &deleted).await?;
        debug!(%uuid, "identity tombstoned");
        Ok(true)
    }

    pub async fn mark_site_deleted(&self, key: &SyncSiteKey) -> SyncResult<bool> {
        let mut deleted: Vec<SyncSiteKey> = self.remote.get_array(DELETED_SITE_LIST_KEY).await?;
        if deleted.contains(key) {
            return Ok(false);
        }
        deleted.push(key.clone());
        self.remote.set_value(DELETED_SITE_LIST_KEY, &deleted).await?;
        debug!(site = %key, "site tombstoned");
        Ok(true)
    }

    /// Remove `key` from the site list. Writes nothing if the list is absent or lacks it.
    pub async fn unmark_site_deleted(&self, key: &SyncSiteKey) -> SyncResult<bool> {
        let deleted: Vec<SyncSiteKey> = self.remote.get_array(DELETED_SITE_LIST_KEY).await?;
        if !deleted.contains(key) {
            return Ok(false);
        }
        let remaining: Vec<SyncSiteKey> = deleted.into_iter().filter(|entry| entry != key).collect();
        self.remote.set_value(DELETED_SITE_LIST_KEY, &remaining).await?;
        debug!(site = %key, "site tombstone removed");
        Ok(true)
    }
}
