// The collaborators a reconciliation pass works against.

use std::sync::Arc;

use crate::events::NotificationBus;
use crate::guard::FeedbackGate;
use crate::remote::RemoteStore;
use crate::store::{LocalAssignmentStore, LocalIdentityStore, RemoteBackend};

pub struct SyncContext {
    pub remote: RemoteStore,
    pub identities: Arc<dyn LocalIdentityStore>,
    pub assignments: Arc<dyn LocalAssignmentStore>,
    pub gate: FeedbackGate,
    /// Log full remote and local contents after each backup.
    pub debug_dump: bool,
}

impl SyncContext {
    pub fn new(
        remote: Arc<dyn RemoteBackend>,
        identities: Arc<dyn LocalIdentityStore>,
        assignments: Arc<dyn LocalAssignmentStore>,
        bus: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            remote: RemoteStore::new(remote),
            identities,
            assignments,
            gate: FeedbackGate::new(bus),
            debug_dump: false,
        }
    }
}
