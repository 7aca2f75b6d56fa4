// Two profiles sharing one sync store, driven through the public engine API.

use std::sync::Arc;

use containersync_common::keys::{LocalSiteKey, SyncSiteKey};
use containersync_common::types::{AssignedSite, Color, Icon, Identity, IdentityInfo};
use containersync_engine::events::ChannelBus;
use containersync_engine::store::memory::{
    MemoryAssignmentStore, MemoryIdentityStore, MemoryRemoteBackend,
};
use containersync_engine::store::{LocalAssignmentStore, LocalIdentityStore, RemoteBackend};
use containersync_engine::{SyncEngine, SyncError, SyncMode, SyncPhase};
use serde_json::{json, Value};

struct Device {
    engine: SyncEngine,
    identities: Arc<MemoryIdentityStore>,
    assignments: Arc<MemoryAssignmentStore>,
}

impl Device {
    fn new(remote: &Arc<MemoryRemoteBackend>) -> Self {
        let (bus, _rx) = ChannelBus::new();
        let identities = Arc::new(MemoryIdentityStore::default());
        let assignments = Arc::new(MemoryAssignmentStore::default());
        let engine =
            SyncEngine::new(remote.clone(), identities.clone(), assignments.clone(), bus);
        Self { engine, identities, assignments }
    }

    async fn create(&self, name: &str, color: Color, icon: Icon) -> Identity {
        self.identities
            .create(&IdentityInfo::new(name, color, icon))
            .await
            .expect("identity should be created")
    }

    async fn assign(&self, origin: &str, identity: &Identity) {
        self.assignments
            .set(
                &LocalSiteKey::from_origin(origin).expect("valid origin"),
                &AssignedSite::new(identity.cookie_store_id.user_context_id()),
            )
            .await
            .expect("assignment should be stored");
    }

    async fn find(&self, name: &str) -> Option<Identity> {
        self.identities
            .query_all()
            .await
            .expect("query identities")
            .into_iter()
            .find(|identity| identity.name() == name)
    }

    async fn sorted_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .identities
            .query_all()
            .await
            .expect("query identities")
            .iter()
            .map(|identity| identity.name().to_string())
            .collect();
        names.sort();
        names
    }

    async fn site(&self, origin: &str) -> Option<AssignedSite> {
        self.assignments
            .get_all()
            .await
            .expect("read assignments")
            .remove(&LocalSiteKey::from_origin(origin).expect("valid origin"))
    }
}

#[tokio::test]
async fn first_sync_with_empty_remote_seeds_it() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    let work = a.create("Work", Color::Blue, Icon::Briefcase).await;
    a.assign("corp.test", &work).await;

    let outcome = a.engine.init_sync().await.expect("first sync should succeed");

    assert_eq!(outcome.mode, SyncMode::ByName);
    assert!(!outcome.restored);
    assert_eq!(outcome.local_cleanup.new_bindings, 1);
    assert!(a.assignments.get_synced_flag().await.expect("flag"));
    assert_eq!(a.engine.phase().await, SyncPhase::SteadyState);

    let entries = remote.entries();
    let uuid = a.identities.lookup_uuid(&work.cookie_store_id).await.expect("lookup").expect("bound");
    assert_eq!(entries["cookieStoreIDmap"], json!({ "firefox-container-1": uuid.to_string() }));
    assert_eq!(entries["assignedSites"], json!({ "siteContainerMap@@_corp.test": { "userContextId": "1" } }));
    assert_eq!(entries["identities"][0]["name"], json!("Work"));
}

#[tokio::test]
async fn second_profile_first_sync_merges_by_name() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    let work_a = a.create("Work", Color::Blue, Icon::Briefcase).await;
    a.create("Personal", Color::Green, Icon::Fingerprint).await;
    a.assign("corp.test", &work_a).await;
    a.engine.init_sync().await.expect("device A first sync");

    let b = Device::new(&remote);
    b.create("Shopping", Color::Pink, Icon::Cart).await;
    let work_b = b.create("Work", Color::Red, Icon::Briefcase).await;

    let outcome = b.engine.init_sync().await.expect("device B first sync");
    assert!(outcome.restored);
    assert_eq!(outcome.identities.created, 1);
    assert_eq!(outcome.identities.updated, 1);

    // Remote color wins for the identity matched by name.
    let merged = b.find("Work").await.expect("work exists");
    assert_eq!(merged.cookie_store_id, work_b.cookie_store_id);
    assert_eq!(merged.info.color, Color::Blue);
    assert_eq!(
        b.identities.lookup_uuid(&work_b.cookie_store_id).await.expect("lookup"),
        a.identities.lookup_uuid(&work_a.cookie_store_id).await.expect("lookup"),
    );

    // The site follows the identity onto B's container id.
    assert_eq!(b.site("corp.test").await.expect("assigned").user_context_id, "2");

    // A picks up B's local-only identity on its next sync.
    let back = a.engine.run_sync().await.expect("device A steady sync");
    assert_eq!(back.mode, SyncMode::ByUuid);
    assert_eq!(a.sorted_names().await, vec!["Personal", "Shopping", "Work"]);
    assert_eq!(b.sorted_names().await, vec!["Personal", "Shopping", "Work"]);
    assert_eq!(a.site("corp.test").await.expect("assigned").user_context_id, "1");
}

#[tokio::test]
async fn steady_sync_with_remote_ahead() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    a.create("Work", Color::Blue, Icon::Briefcase).await;
    a.engine.init_sync().await.expect("device A first sync");
    let b = Device::new(&remote);
    b.engine.init_sync().await.expect("device B first sync");

    let travel = a.create("Travel", Color::Turquoise, Icon::Vacation).await;
    a.engine.identity_changed().await.expect("backup new identity");
    a.engine
        .site_assigned(
            &LocalSiteKey::from_origin("flights.test").expect("origin"),
            &AssignedSite::new(travel.cookie_store_id.user_context_id()),
        )
        .await
        .expect("assign site");

    let outcome = b.engine.run_sync().await.expect("device B steady sync");

    assert_eq!(outcome.identities.created, 1);
    let travel_b = b.find("Travel").await.expect("travel restored");
    assert_eq!(travel_b.info, travel.info);
    assert_eq!(
        b.site("flights.test").await.expect("site restored").user_context_id,
        travel_b.cookie_store_id.user_context_id()
    );
}

#[tokio::test]
async fn site_deletion_propagates_and_stays_deleted() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    let news = a.create("News", Color::Yellow, Icon::Circle).await;
    a.assign("paper.test", &news).await;
    a.engine.init_sync().await.expect("device A first sync");
    let b = Device::new(&remote);
    b.engine.init_sync().await.expect("device B first sync");
    assert!(b.site("paper.test").await.is_some());

    a.engine
        .site_removed(&LocalSiteKey::from_origin("paper.test").expect("origin"))
        .await
        .expect("forget site");
    let outcome = b.engine.run_sync().await.expect("device B steady sync");

    assert_eq!(outcome.sites.removed, 1);
    assert!(b.site("paper.test").await.is_none());

    let deleted: Vec<SyncSiteKey> =
        serde_json::from_value(remote.entries()["deletedSiteList"].clone()).expect("decode list");
    assert_eq!(deleted, vec![SyncSiteKey::from_origin("paper.test").expect("origin")]);

    b.engine.run_sync().await.expect("repeat sync");
    assert!(b.site("paper.test").await.is_none());
}

#[tokio::test]
async fn identity_deletion_propagates_and_is_not_resurrected() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    let temp = a.create("Temp", Color::Orange, Icon::Fruit).await;
    a.create("Keep", Color::Purple, Icon::Tree).await;
    a.engine.init_sync().await.expect("device A first sync");
    let b = Device::new(&remote);
    b.engine.init_sync().await.expect("device B first sync");
    assert!(b.find("Temp").await.is_some());

    a.identities.remove(&temp.cookie_store_id).await.expect("remove locally");
    a.engine.identity_removed(&temp).await.expect("tombstone identity");

    let outcome = b.engine.run_sync().await.expect("device B steady sync");
    assert_eq!(outcome.identities.pruned, 1);
    assert_eq!(b.sorted_names().await, vec!["Keep"]);

    a.engine.run_sync().await.expect("device A steady sync");
    b.engine.run_sync().await.expect("device B again");
    assert_eq!(a.sorted_names().await, vec!["Keep"]);
    assert_eq!(b.sorted_names().await, vec!["Keep"]);
}

#[tokio::test]
async fn misaligned_remote_fails_first_sync_without_setting_flag() {
    let Value::Object(entries) = json!({
        "identities": [],
        "cookieStoreIDmap": {},
        "assignedSites": { "siteContainerMap@@_orphan.test": { "userContextId": "5" } }
    }) else {
        unreachable!()
    };
    let remote = Arc::new(MemoryRemoteBackend::from_entries(entries));
    let a = Device::new(&remote);

    let error = a.engine.init_sync().await.expect_err("sync should fail");

    assert!(matches!(error, SyncError::MissingJoinEntry { .. }));
    assert_eq!(error.code(), "MISSING_JOIN_ENTRY");
    assert!(!a.assignments.get_synced_flag().await.expect("flag"));
    assert_eq!(a.engine.phase().await, SyncPhase::FirstSync);
    assert!(a.site("orphan.test").await.is_none());
}

#[tokio::test]
async fn orphaned_map_entries_are_pruned_before_restore() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    a.create("Work", Color::Blue, Icon::Briefcase).await;
    a.engine.init_sync().await.expect("first sync");

    let mut map = remote.entries()["cookieStoreIDmap"].as_object().cloned().expect("map object");
    map.insert("firefox-container-99".into(), json!(uuid::Uuid::new_v4().to_string()));
    let mut update = serde_json::Map::new();
    update.insert("cookieStoreIDmap".into(), Value::Object(map));
    remote.set(update).await.expect("write orphan");

    let outcome = a.engine.run_sync().await.expect("steady sync");

    assert_eq!(outcome.remote_pruned, 1);
    assert_eq!(outcome.identities.skipped, 0);
    let map = remote.entries()["cookieStoreIDmap"].as_object().cloned().expect("map object");
    assert!(!map.contains_key("firefox-container-99"));
}

#[tokio::test]
async fn tombstoned_uuid_is_pruned_even_while_its_record_remains() {
    let remote = Arc::new(MemoryRemoteBackend::default());
    let a = Device::new(&remote);
    let old = a.create("Old", Color::Red, Icon::Pet).await;
    a.assign("old.test", &old).await;
    a.engine.init_sync().await.expect("first sync");
    let uuid = a.identities.lookup_uuid(&old.cookie_store_id).await.expect("lookup").expect("bound");

    // Another profile tombstoned the identity but never rewrote the other keys.
    let mut update = serde_json::Map::new();
    update.insert("deletedIdentityList".into(), json!([uuid.to_string()]));
    remote.set(update).await.expect("write tombstone");
    let before = remote.entries();
    assert_eq!(before["identities"][0]["name"], json!("Old"));
    assert_eq!(before["cookieStoreIDmap"]["firefox-container-1"], json!(uuid.to_string()));
    assert!(before["assignedSites"].get("siteContainerMap@@_old.test").is_some());

    let outcome = a.engine.run_sync().await.expect("steady sync");

    assert_eq!(outcome.identities.pruned, 1);
    assert_eq!(outcome.identities.created, 0);
    assert_eq!(outcome.identities.skipped, 1);
    assert_eq!(outcome.sites.skipped, 1);
    assert_eq!(outcome.sites.assigned, 0);
    assert!(a.sorted_names().await.is_empty());
    assert_eq!(a.identities.lookup_by_uuid(&uuid).await.expect("lookup"), None);
    assert!(remote_uuids(&remote).is_empty());
}

fn remote_uuids(remote: &MemoryRemoteBackend) -> Vec<String> {
    remote.entries()["cookieStoreIDmap"]
        .as_object()
        .map(|map| map.values().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}
