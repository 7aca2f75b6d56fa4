// Errors that abort a reconciliation pass.
//
// Absent remote keys are not errors: the remote adapter resolves them to empty
// defaults. Everything here unwinds the whole pass; the next trigger starts over.

use containersync_common::keys::{KeyError, SyncContainerKey, SyncSiteKey};
use thiserror::Error;
use uuid::Uuid;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote assignment points at a container key the remote join map does not know.
    #[error("sync storage not aligned: site `{site}` references `{container}` which is missing from cookieStoreIDmap")]
    MissingJoinEntry { site: SyncSiteKey, container: SyncContainerKey },

    /// A joined UUID has no local container even though identity reconciliation ran.
    #[error("no local container found for uuid {uuid} (site `{site}`)")]
    UnresolvedUuid { uuid: Uuid, site: SyncSiteKey },

    #[error("sync storage key `{key}` holds an unexpected value")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for sync storage key `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid key in sync data")]
    Key(#[from] KeyError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl SyncError {
    /// Stable code for CLI and log output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingJoinEntry { .. } => "MISSING_JOIN_ENTRY",
            Self::UnresolvedUuid { .. } => "UNRESOLVED_UUID",
            Self::Decode { .. } => "DECODE",
            Self::Encode { .. } => "ENCODE",
            Self::Key(_) => "INVALID_KEY",
            Self::Backend(_) => "BACKEND",
        }
    }
}
