// containersync-engine library entry point.

pub mod backup;
pub mod cleanup;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod guard;
pub mod lifecycle;
pub mod reconcile;
pub mod remote;
pub mod store;
pub mod tombstone;

pub use error::{SyncError, SyncResult};
pub use lifecycle::{SyncEngine, SyncMode, SyncOutcome, SyncPhase};
