// Persisted remote-store schema: one typed value per sync storage key.
//
//   identities           -> Vec<SyncIdentity>
//   cookieStoreIDmap     -> BTreeMap<SyncContainerKey, Uuid>
//   assignedSites        -> BTreeMap<SyncSiteKey, AssignedSite>
//   deletedIdentityList  -> Vec<Uuid>
//   deletedSiteList      -> Vec<SyncSiteKey>
//
// Every key is optional in storage; an absent key reads as an empty container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::keys::{SyncContainerKey, SyncSiteKey};
use crate::types::{AssignedSite, Identity, IdentityInfo};

pub const IDENTITIES_KEY: &str = "identities";
pub const COOKIE_STORE_ID_MAP_KEY: &str = "cookieStoreIDmap";
pub const ASSIGNED_SITES_KEY: &str = "assignedSites";
pub const DELETED_IDENTITY_LIST_KEY: &str = "deletedIdentityList";
pub const DELETED_SITE_LIST_KEY: &str = "deletedSiteList";

/// Join table between remote identity records and their stable UUIDs.
pub type CookieStoreIdMap = BTreeMap<SyncContainerKey, Uuid>;
/// Remote site assignments, keyed and pointed in sync space.
pub type AssignedSites = BTreeMap<SyncSiteKey, AssignedSite>;

/// An identity record as stored under `identities`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncIdentity {
    pub cookie_store_id: SyncContainerKey,
    #[serde(flatten)]
    pub info: IdentityInfo,
}

impl From<Identity> for SyncIdentity {
    fn from(identity: Identity) -> Self {
        Self { cookie_store_id: identity.cookie_store_id.into_sync(), info: identity.info }
    }
}

/// The full remote snapshot, decoded key by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub identities: Vec<SyncIdentity>,
    pub cookie_store_id_map: CookieStoreIdMap,
    pub assigned_sites: AssignedSites,
    pub deleted_identity_list: Vec<Uuid>,
    pub deleted_site_list: Vec<SyncSiteKey>,
}

impl SyncSnapshot {
    /// Name, color and icon of the record stored under `key`.
    pub fn identity_info(&self, key: &SyncContainerKey) -> Option<&IdentityInfo> {
        self.identities.iter().find(|record| &record.cookie_store_id == key).map(|r| &r.info)
    }

    pub fn uuid_for(&self, key: &SyncContainerKey) -> Option<Uuid> {
        self.cookie_store_id_map.get(key).copied()
    }

    pub fn is_identity_deleted(&self, uuid: &Uuid) -> bool {
        self.deleted_identity_list.contains(uuid)
    }

    pub fn is_site_deleted(&self, key: &SyncSiteKey) -> bool {
        self.deleted_site_list.contains(key)
    }

    /// Map entries with no matching record in `identities`.
    pub fn orphaned_map_keys(&self) -> Vec<SyncContainerKey> {
        self.cookie_store_id_map
            .keys()
            .filter(|key| self.identity_info(key).is_none())
            .cloned()
            .collect()
    }
}
