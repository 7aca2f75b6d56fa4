// In-memory reference stores.
//
// Each store can be wired to a `ChannelBus` so writes raise the same notifications
// a browser would: remote writes raise `RemoteStoreChanged`, identity writes raise
// created/updated/removed. Events are published after the store lock is released.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use containersync_common::keys::{LocalContainerId, LocalSiteKey};
use containersync_common::types::{AssignedSite, Identity, IdentityInfo};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{LocalAssignmentStore, LocalIdentityStore, RemoteBackend};
use crate::events::{ChangeEvent, ChannelBus};

/// First `userContextId` handed out by a fresh identity store.
const FIRST_USER_CONTEXT_ID: u64 = 1;

// ── Remote ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRemoteBackend {
    entries: Mutex<Map<String, Value>>,
    notifier: Option<Arc<ChannelBus>>,
}

impl MemoryRemoteBackend {
    pub fn from_entries(entries: Map<String, Value>) -> Self {
        Self { entries: Mutex::new(entries), notifier: None }
    }

    pub fn with_notifier(mut self, bus: Arc<ChannelBus>) -> Self {
        self.notifier = Some(bus);
        self
    }

    pub fn entries(&self) -> Map<String, Value> {
        self.entries.lock().clone()
    }

    /// Canonical serialization of the whole store (keys sorted).
    pub fn to_json_string(&self) -> String {
        Value::Object(self.entries()).to_string()
    }
}

#[async_trait]
impl RemoteBackend for MemoryRemoteBackend {
    async fn get_all(&self) -> Result<Map<String, Value>> {
        Ok(self.entries())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<()> {
        {
            let mut stored = self.entries.lock();
            for (key, value) in entries {
                stored.insert(key, value);
            }
        }
        if let Some(bus) = &self.notifier {
            bus.publish(ChangeEvent::RemoteStoreChanged);
        }
        Ok(())
    }
}

// ── Identities ─────────────────────────────────────────────────────

/// Serializable contents of a `MemoryIdentityStore`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityState {
    /// Identities in creation order.
    pub identities: Vec<Identity>,
    /// Container → UUID bindings. May outlive the container until cleanup.
    pub bindings: BTreeMap<LocalContainerId, Uuid>,
    pub next_user_context_id: u64,
}

impl Default for IdentityState {
    fn default() -> Self {
        Self {
            identities: Vec::new(),
            bindings: BTreeMap::new(),
            next_user_context_id: FIRST_USER_CONTEXT_ID,
        }
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<IdentityState>,
    notifier: Option<Arc<ChannelBus>>,
}

impl MemoryIdentityStore {
    pub fn from_state(state: IdentityState) -> Self {
        Self { state: Mutex::new(state), notifier: None }
    }

    pub fn with_notifier(mut self, bus: Arc<ChannelBus>) -> Self {
        self.notifier = Some(bus);
        self
    }

    pub fn state(&self) -> IdentityState {
        self.state.lock().clone()
    }

    fn notify(&self, event: ChangeEvent) {
        if let Some(bus) = &self.notifier {
            bus.publish(event);
        }
    }
}

#[async_trait]
impl LocalIdentityStore for MemoryIdentityStore {
    async fn query_all(&self) -> Result<Vec<Identity>> {
        Ok(self.state.lock().identities.clone())
    }

    async fn create(&self, info: &IdentityInfo) -> Result<Identity> {
        let identity = {
            let mut state = self.state.lock();
            let suffix = state.next_user_context_id.to_string();
            state.next_user_context_id += 1;
            let identity = Identity {
                cookie_store_id: LocalContainerId::from_user_context_id(&suffix)?,
                info: info.clone(),
            };
            state.identities.push(identity.clone());
            identity
        };
        self.notify(ChangeEvent::IdentityCreated(identity.clone()));
        Ok(identity)
    }

    async fn update(&self, container: &LocalContainerId, info: &IdentityInfo) -> Result<()> {
        let updated = {
            let mut state = self.state.lock();
            let identity = state
                .identities
                .iter_mut()
                .find(|identity| &identity.cookie_store_id == container)
                .ok_or_else(|| anyhow!("identity `{container}` does not exist"))?;
            identity.info = info.clone();
            identity.clone()
        };
        self.notify(ChangeEvent::IdentityUpdated(updated));
        Ok(())
    }

    async fn remove(&self, container: &LocalContainerId) -> Result<()> {
        let removed = {
            let mut state = self.state.lock();
            let position = state
                .identities
                .iter()
                .position(|identity| &identity.cookie_store_id == container)
                .ok_or_else(|| anyhow!("identity `{container}` does not exist"))?;
            state.identities.remove(position)
        };
        self.notify(ChangeEvent::IdentityRemoved(removed));
        Ok(())
    }

    async fn lookup_by_uuid(&self, uuid: &Uuid) -> Result<Option<LocalContainerId>> {
        let state = self.state.lock();
        Ok(state
            .bindings
            .iter()
            .find(|(_, bound)| *bound == uuid)
            .map(|(container, _)| container.clone()))
    }

    async fn lookup_uuid(&self, container: &LocalContainerId) -> Result<Option<Uuid>> {
        Ok(self.state.lock().bindings.get(container).copied())
    }

    async fn bind_uuid(&self, container: &LocalContainerId, uuid: Uuid) -> Result<()> {
        let mut state = self.state.lock();
        // A UUID names at most one container.
        state.bindings.retain(|bound_container, bound| *bound != uuid || bound_container == container);
        state.bindings.insert(container.clone(), uuid);
        Ok(())
    }

    async fn remove_binding(&self, container: &LocalContainerId) -> Result<()> {
        self.state.lock().bindings.remove(container);
        Ok(())
    }

    async fn uuid_map(&self) -> Result<BTreeMap<LocalContainerId, Uuid>> {
        Ok(self.state.lock().bindings.clone())
    }
}

// ── Assignments ────────────────────────────────────────────────────

/// Serializable contents of a `MemoryAssignmentStore`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentState {
    pub sites: BTreeMap<LocalSiteKey, AssignedSite>,
    /// When the first sync completed; `None` until then.
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryAssignmentStore {
    state: Mutex<AssignmentState>,
}

impl MemoryAssignmentStore {
    pub fn from_state(state: AssignmentState) -> Self {
        Self { state: Mutex::new(state) }
    }

    pub fn state(&self) -> AssignmentState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl LocalAssignmentStore for MemoryAssignmentStore {
    async fn get_all(&self) -> Result<BTreeMap<LocalSiteKey, AssignedSite>> {
        Ok(self.state.lock().sites.clone())
    }

    async fn set(&self, key: &LocalSiteKey, site: &AssignedSite) -> Result<()> {
        self.state.lock().sites.insert(key.clone(), site.clone());
        Ok(())
    }

    async fn remove(&self, key: &LocalSiteKey) -> Result<()> {
        self.state.lock().sites.remove(key);
        Ok(())
    }

    async fn get_synced_flag(&self) -> Result<bool> {
        Ok(self.state.lock().synced_at.is_some())
    }

    async fn set_synced_flag(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.synced_at.is_none() {
            state.synced_at = Some(Utc::now());
        }
        Ok(())
    }
}
