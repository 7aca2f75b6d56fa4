// Lifecycle controller: decides between first and steady-state sync, sequences
// cleanup → restore → backup, and dispatches change notifications.
//
// Passes are serialized by the phase mutex. Each pass holds one feedback guard for
// its whole duration, so the writes it makes never re-trigger it.

use std::sync::Arc;

use containersync_common::keys::LocalSiteKey;
use containersync_common::types::{AssignedSite, Identity};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::backup::{backup, BackupOptions};
use crate::cleanup::{cleanup_local, cleanup_remote, LocalCleanup};
use crate::config::EngineConfig;
use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::events::{ChangeEvent, NotificationBus};
use crate::reconcile::{
    reconcile_by_name, reconcile_by_uuid, reconcile_site_assignments, IdentityReport, SiteReport,
};
use crate::store::{LocalAssignmentStore, LocalIdentityStore, RemoteBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Uninitialized,
    /// First sync has started but not yet completed.
    FirstSync,
    SteadyState,
}

/// Which identity join a pass used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    ByName,
    ByUuid,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub mode: SyncMode,
    /// False when the remote store was empty and the pass only seeded it.
    pub restored: bool,
    pub local_cleanup: LocalCleanup,
    pub remote_pruned: usize,
    pub identities: IdentityReport,
    pub sites: SiteReport,
}

impl SyncOutcome {
    fn seeded(mode: SyncMode, local_cleanup: LocalCleanup) -> Self {
        Self {
            mode,
            restored: false,
            local_cleanup,
            remote_pruned: 0,
            identities: IdentityReport::default(),
            sites: SiteReport::default(),
        }
    }
}

pub struct SyncEngine {
    ctx: SyncContext,
    phase: Mutex<SyncPhase>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteBackend>,
        identities: Arc<dyn LocalIdentityStore>,
        assignments: Arc<dyn LocalAssignmentStore>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            ctx: SyncContext::new(remote, identities, assignments, bus),
            phase: Mutex::new(SyncPhase::Uninitialized),
        }
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.ctx.debug_dump = config.debug_dump;
        self
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub async fn phase(&self) -> SyncPhase {
        *self.phase.lock().await
    }

    /// Startup entry point: first sync if this profile never completed one,
    /// steady-state sync otherwise.
    pub async fn init_sync(&self) -> SyncResult<SyncOutcome> {
        let mut phase = self.phase.lock().await;
        if self.ctx.assignments.get_synced_flag().await? {
            *phase = SyncPhase::SteadyState;
            self.steady_pass().await
        } else {
            *phase = SyncPhase::FirstSync;
            let outcome = self.first_pass().await?;
            *phase = SyncPhase::SteadyState;
            Ok(outcome)
        }
    }

    /// Force a first-sync pass regardless of the synced flag.
    pub async fn run_first_sync(&self) -> SyncResult<SyncOutcome> {
        let mut phase = self.phase.lock().await;
        *phase = SyncPhase::FirstSync;
        let outcome = self.first_pass().await?;
        *phase = SyncPhase::SteadyState;
        Ok(outcome)
    }

    /// Steady-state pass: UUID-based restore when the remote has data.
    pub async fn run_sync(&self) -> SyncResult<SyncOutcome> {
        let _phase = self.phase.lock().await;
        self.steady_pass().await
    }

    pub async fn backup(&self, options: &BackupOptions) -> SyncResult<()> {
        let _phase = self.phase.lock().await;
        backup(&self.ctx, options).await
    }

    /// The user removed a site assignment: drop it locally and tombstone it remotely.
    pub async fn site_removed(&self, key: &LocalSiteKey) -> SyncResult<()> {
        let _phase = self.phase.lock().await;
        let _guard = self.ctx.gate.suspend();
        self.ctx.assignments.remove(key).await?;
        info!(site = %key, "site assignment removed");
        backup(&self.ctx, &BackupOptions::site_deleted(key.to_sync())).await
    }

    /// The user assigned a site: store it locally and clear any tombstone for it.
    pub async fn site_assigned(&self, key: &LocalSiteKey, site: &AssignedSite) -> SyncResult<()> {
        let _phase = self.phase.lock().await;
        let _guard = self.ctx.gate.suspend();
        self.ctx.assignments.set(key, site).await?;
        info!(site = %key, container = %site.user_context_id, "site assigned");
        backup(&self.ctx, &BackupOptions::site_undeleted(key.to_sync())).await
    }

    /// Dispatch one change notification. Ignored until startup reaches steady state.
    pub async fn handle_event(&self, event: ChangeEvent) -> SyncResult<()> {
        let phase = self.phase.lock().await;
        if *phase != SyncPhase::SteadyState {
            debug!(topic = ?event.topic(), phase = ?*phase, "ignoring event before startup completes");
            return Ok(());
        }

        match event {
            ChangeEvent::RemoteStoreChanged => self.steady_pass().await.map(|_| ()),
            ChangeEvent::IdentityCreated(_) | ChangeEvent::IdentityUpdated(_) => {
                self.identity_changed_locked().await
            }
            ChangeEvent::IdentityRemoved(identity) => self.identity_removed_locked(&identity).await,
        }
    }

    /// A local identity was created or edited: bind it if new, then back up.
    pub async fn identity_changed(&self) -> SyncResult<()> {
        let _phase = self.phase.lock().await;
        self.identity_changed_locked().await
    }

    /// A local identity was removed: drop its binding and tombstone its UUID.
    pub async fn identity_removed(&self, identity: &Identity) -> SyncResult<()> {
        let _phase = self.phase.lock().await;
        self.identity_removed_locked(identity).await
    }

    /// Consume events until the channel closes. Pass failures are logged; the next
    /// event starts a fresh pass.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            let topic = event.topic();
            if let Err(error) = self.handle_event(event).await {
                error!(?topic, code = error.code(), %error, "sync pass failed");
            }
        }
        debug!("event channel closed; sync loop exiting");
    }

    pub fn spawn(self: Arc<Self>, events: mpsc::Receiver<ChangeEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn identity_changed_locked(&self) -> SyncResult<()> {
        let _guard = self.ctx.gate.suspend();
        cleanup_local(&self.ctx).await?;
        backup(&self.ctx, &BackupOptions::default()).await
    }

    async fn identity_removed_locked(&self, identity: &Identity) -> SyncResult<()> {
        let _guard = self.ctx.gate.suspend();
        let container = &identity.cookie_store_id;
        let options = match self.ctx.identities.lookup_uuid(container).await? {
            Some(uuid) => {
                self.ctx.identities.remove_binding(container).await?;
                info!(%container, %uuid, "identity removed; recording tombstone");
                BackupOptions::identity_deleted(uuid)
            }
            None => BackupOptions::default(),
        };
        backup(&self.ctx, &options).await
    }

    async fn first_pass(&self) -> SyncResult<SyncOutcome> {
        info!("running first sync");
        let outcome = self.pass(SyncMode::ByName).await?;
        self.ctx.assignments.set_synced_flag().await?;
        Ok(outcome)
    }

    async fn steady_pass(&self) -> SyncResult<SyncOutcome> {
        info!("running sync");
        self.pass(SyncMode::ByUuid).await
    }

    async fn pass(&self, mode: SyncMode) -> SyncResult<SyncOutcome> {
        let ctx = &self.ctx;
        let _guard = ctx.gate.suspend();

        let local_cleanup = cleanup_local(ctx).await?;
        if !ctx.remote.has_any_data().await? {
            info!("no sync storage; seeding it from local state");
            backup(ctx, &BackupOptions::default()).await?;
            return Ok(SyncOutcome::seeded(mode, local_cleanup));
        }

        let remote_pruned = cleanup_remote(ctx).await?;
        let snapshot = ctx.remote.load_snapshot().await?;
        let identities = match mode {
            SyncMode::ByName => reconcile_by_name(ctx, &snapshot).await?,
            SyncMode::ByUuid => reconcile_by_uuid(ctx, &snapshot).await?,
        };
        let sites = reconcile_site_assignments(ctx, &snapshot).await?;
        backup(ctx, &BackupOptions::default()).await?;

        info!(?mode, ?identities, ?sites, "sync storage restored");
        Ok(SyncOutcome { mode, restored: true, local_cleanup, remote_pruned, identities, sites })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelBus, Topic};
    use crate::store::memory::{MemoryAssignmentStore, MemoryIdentityStore, MemoryRemoteBackend};
    use containersync_common::types::{Color, Icon, IdentityInfo};

    struct Harness {
        engine: SyncEngine,
        bus: Arc<ChannelBus>,
        identities: Arc<MemoryIdentityStore>,
        assignments: Arc<MemoryAssignmentStore>,
    }

    fn harness() -> Harness {
        let (bus, _rx) = ChannelBus::new();
        let identities = Arc::new(MemoryIdentityStore::default());
        let assignments = Arc::new(MemoryAssignmentStore::default());
        let engine = SyncEngine::new(
            Arc::new(MemoryRemoteBackend::default()),
            identities.clone(),
            assignments.clone(),
            bus.clone(),
        );
        Harness { engine, bus, identities, assignments }
    }

    #[tokio::test]
    async fn init_sync_runs_first_sync_once() {
        let h = harness();
        assert_eq!(h.engine.phase().await, SyncPhase::Uninitialized);

        let first = h.engine.init_sync().await.expect("first sync");
        assert_eq!(first.mode, SyncMode::ByName);
        assert!(!first.restored);
        assert_eq!(h.engine.phase().await, SyncPhase::SteadyState);
        assert!(h.assignments.get_synced_flag().await.unwrap());

        let second = h.engine.init_sync().await.expect("steady sync");
        assert_eq!(second.mode, SyncMode::ByUuid);
        assert!(second.restored);
    }

    #[tokio::test]
    async fn events_before_startup_are_ignored() {
        let h = harness();
        h.engine.handle_event(ChangeEvent::RemoteStoreChanged).await.expect("ignored");
        assert_eq!(h.engine.phase().await, SyncPhase::Uninitialized);
        assert!(h.engine.context().remote.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn identity_removed_event_tombstones_its_uuid() {
        let h = harness();
        let temp = h
            .identities
            .create(&IdentityInfo::new("Temp", Color::Yellow, Icon::Chill))
            .await
            .unwrap();
        h.engine.init_sync().await.expect("first sync");
        let uuid = h.identities.lookup_uuid(&temp.cookie_store_id).await.unwrap().expect("bound");

        h.identities.remove(&temp.cookie_store_id).await.unwrap();
        h.engine.handle_event(ChangeEvent::IdentityRemoved(temp.clone())).await.expect("handled");

        let snapshot = h.engine.context().remote.load_snapshot().await.unwrap();
        assert_eq!(snapshot.deleted_identity_list, vec![uuid]);
        assert!(snapshot.identities.is_empty());
        assert!(snapshot.cookie_store_id_map.is_empty());
    }

    #[tokio::test]
    async fn site_removed_then_assigned_round_trips_the_tombstone() {
        let h = harness();
        h.engine.init_sync().await.expect("first sync");
        let key = LocalSiteKey::from_origin("mail.test").unwrap();

        h.engine.site_removed(&key).await.expect("removed");
        let snapshot = h.engine.context().remote.load_snapshot().await.unwrap();
        assert_eq!(snapshot.deleted_site_list, vec![key.to_sync()]);

        h.engine.site_assigned(&key, &AssignedSite::new("1")).await.expect("assigned");
        let snapshot = h.engine.context().remote.load_snapshot().await.unwrap();
        assert!(snapshot.deleted_site_list.is_empty());
        assert!(snapshot.assigned_sites.contains_key(&key.to_sync()));
    }

    #[tokio::test]
    async fn subscriptions_resume_after_each_pass() {
        let h = harness();
        h.engine.init_sync().await.expect("first sync");
        assert!(Topic::ALL.iter().all(|topic| h.bus.is_subscribed(*topic)));
        assert_eq!(h.engine.context().gate.depth(), 0);
    }
}
