// Typed adapter over the remote sync storage area.
//
// Reads resolve an absent key (or a `null` value) to an empty container and log a
// warning; a present value of the wrong shape is a fatal decode error.

use std::collections::BTreeMap;
use std::sync::Arc;

use containersync_common::schema::{
    SyncSnapshot, ASSIGNED_SITES_KEY, COOKIE_STORE_ID_MAP_KEY, DELETED_IDENTITY_LIST_KEY,
    DELETED_SITE_LIST_KEY, IDENTITIES_KEY,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{SyncError, SyncResult};
use crate::store::RemoteBackend;

#[derive(Clone)]
pub struct RemoteStore {
    backend: Arc<dyn RemoteBackend>,
}

impl RemoteStore {
    pub fn new(backend: Arc<dyn RemoteBackend>) -> Self {
        Self { backend }
    }

    pub async fn get_all(&self) -> SyncResult<Map<String, Value>> {
        Ok(self.backend.get_all().await?)
    }

    pub async fn set(&self, entries: Map<String, Value>) -> SyncResult<()> {
        Ok(self.backend.set(entries).await?)
    }

    /// Encode and write a single key.
    pub async fn set_value<T: Serialize>(&self, key: &str, value: &T) -> SyncResult<()> {
        let encoded = serde_json::to_value(value)
            .map_err(|source| SyncError::Encode { key: key.to_string(), source })?;
        let mut entries = Map::new();
        entries.insert(key.to_string(), encoded);
        self.set(entries).await
    }

    /// True iff the remote store holds at least one key.
    pub async fn has_any_data(&self) -> SyncResult<bool> {
        Ok(!self.get_all().await?.is_empty())
    }

    pub async fn get_array<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Vec<T>> {
        Ok(self.get_decoded(key).await?.unwrap_or_default())
    }

    pub async fn get_object<K, V>(&self, key: &str) -> SyncResult<BTreeMap<K, V>>
    where
        K: DeserializeOwned + Ord,
        V: DeserializeOwned,
    {
        Ok(self.get_decoded(key).await?.unwrap_or_default())
    }

    /// Decode every schema key into one snapshot.
    pub async fn load_snapshot(&self) -> SyncResult<SyncSnapshot> {
        Ok(SyncSnapshot {
            identities: self.get_array(IDENTITIES_KEY).await?,
            cookie_store_id_map: self.get_object(COOKIE_STORE_ID_MAP_KEY).await?,
            assigned_sites: self.get_object(ASSIGNED_SITES_KEY).await?,
            deleted_identity_list: self.get_array(DELETED_IDENTITY_LIST_KEY).await?,
            deleted_site_list: self.get_array(DELETED_SITE_LIST_KEY).await?,
        })
    }

    async fn get_decoded<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        match self.backend.get(key).await? {
            None | Some(Value::Null) => {
                warn!(key, "requested sync key is not available");
                Ok(None)
            }
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| SyncError::Decode { key: key.to_string(), source }),
        }
    }
}
