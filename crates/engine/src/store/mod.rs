// Collaborator contracts: the remote backend, the local identity store and the
// local assignment store. The engine only ever talks to these traits.
//
// `memory` holds reference implementations; `file` persists them as JSON.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use containersync_common::keys::{LocalContainerId, LocalSiteKey};
use containersync_common::types::{AssignedSite, Identity, IdentityInfo};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Raw key-value access to the remote sync storage area.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Every key currently stored.
    async fn get_all(&self) -> Result<Map<String, Value>>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write the given keys, leaving all others untouched.
    async fn set(&self, entries: Map<String, Value>) -> Result<()>;
}

/// The browser's identity manager plus the local UUID binding table.
#[async_trait]
pub trait LocalIdentityStore: Send + Sync {
    async fn query_all(&self) -> Result<Vec<Identity>>;

    /// Create an identity; the store assigns its container id.
    async fn create(&self, info: &IdentityInfo) -> Result<Identity>;

    async fn update(&self, container: &LocalContainerId, info: &IdentityInfo) -> Result<()>;

    async fn remove(&self, container: &LocalContainerId) -> Result<()>;

    async fn lookup_by_uuid(&self, uuid: &Uuid) -> Result<Option<LocalContainerId>>;

    async fn lookup_uuid(&self, container: &LocalContainerId) -> Result<Option<Uuid>>;

    /// Bind (or rebind) a container to a UUID.
    async fn bind_uuid(&self, container: &LocalContainerId, uuid: Uuid) -> Result<()>;

    async fn remove_binding(&self, container: &LocalContainerId) -> Result<()>;

    /// The whole binding table, including bindings whose container is gone.
    async fn uuid_map(&self) -> Result<BTreeMap<LocalContainerId, Uuid>>;
}

/// The site assignment manager's storage.
#[async_trait]
pub trait LocalAssignmentStore: Send + Sync {
    async fn get_all(&self) -> Result<BTreeMap<LocalSiteKey, AssignedSite>>;

    async fn set(&self, key: &LocalSiteKey, site: &AssignedSite) -> Result<()>;

    async fn remove(&self, key: &LocalSiteKey) -> Result<()>;

    /// Whether this profile has completed a first sync.
    async fn get_synced_flag(&self) -> Result<bool>;

    async fn set_synced_flag(&self) -> Result<()>;
}
