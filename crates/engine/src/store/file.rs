// JSON-file persistence for the in-memory reference stores.
//
// Local state (identities, bindings, assignments, synced flag) lives in one file
// and the remote store in another. Writes go to a temp file, then rename over the
// target. A missing file loads as empty state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::memory::{
    AssignmentState, IdentityState, MemoryAssignmentStore, MemoryIdentityStore,
    MemoryRemoteBackend,
};

const LOCAL_STATE_VERSION: u32 = 1;

/// On-disk shape of the local state file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalState {
    pub version: u32,
    pub identities: IdentityState,
    pub assignments: AssignmentState,
}

impl Default for LocalState {
    fn default() -> Self {
        Self {
            version: LOCAL_STATE_VERSION,
            identities: IdentityState::default(),
            assignments: AssignmentState::default(),
        }
    }
}

impl LocalState {
    pub fn capture(identities: &MemoryIdentityStore, assignments: &MemoryAssignmentStore) -> Self {
        Self {
            version: LOCAL_STATE_VERSION,
            identities: identities.state(),
            assignments: assignments.state(),
        }
    }

    pub fn into_stores(self) -> (MemoryIdentityStore, MemoryAssignmentStore) {
        (
            MemoryIdentityStore::from_state(self.identities),
            MemoryAssignmentStore::from_state(self.assignments),
        )
    }
}

/// Paths of the two state files.
#[derive(Debug, Clone)]
pub struct StateFiles {
    pub local: PathBuf,
    pub remote: PathBuf,
}

impl StateFiles {
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<PathBuf>) -> Self {
        Self { local: local.into(), remote: remote.into() }
    }

    pub fn load_local(&self) -> Result<LocalState> {
        let Some(contents) = read_optional(&self.local)? else {
            return Ok(LocalState::default());
        };
        let state: LocalState = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse local state `{}`", self.local.display()))?;
        if state.version != LOCAL_STATE_VERSION {
            bail!(
                "local state `{}` has unsupported version {}",
                self.local.display(),
                state.version
            );
        }
        Ok(state)
    }

    pub fn save_local(&self, state: &LocalState) -> Result<()> {
        let contents = serde_json::to_vec_pretty(state).context("failed to encode local state")?;
        write_atomic(&self.local, &contents)
    }

    pub fn load_remote(&self) -> Result<MemoryRemoteBackend> {
        let Some(contents) = read_optional(&self.remote)? else {
            return Ok(MemoryRemoteBackend::default());
        };
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse remote state `{}`", self.remote.display()))?;
        let Value::Object(entries) = value else {
            bail!("remote state `{}` is not a JSON object", self.remote.display());
        };
        Ok(MemoryRemoteBackend::from_entries(entries))
    }

    pub fn save_remote(&self, remote: &MemoryRemoteBackend) -> Result<()> {
        let entries: Map<String, Value> = remote.entries();
        let contents = serde_json::to_vec_pretty(&Value::Object(entries))
            .context("failed to encode remote state")?;
        write_atomic(&self.remote, &contents)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        debug!(path = %path.display(), "state file missing; starting empty");
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .with_context(|| format!("failed to read `{}`", path.display()))
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory `{}`", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("failed to write temp file `{}`", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!("failed to atomically move `{}` to `{}`", tmp_path.display(), path.display())
    })
}
