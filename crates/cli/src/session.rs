// One CLI invocation's view of the stores.
//
// Loads the JSON-backed reference stores, builds a `SyncEngine` over them and
// writes both state files back once a mutating command succeeds.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use containersync_engine::config::EngineConfig;
use containersync_engine::events::ChannelBus;
use containersync_engine::store::file::{LocalState, StateFiles};
use containersync_engine::store::memory::{
    MemoryAssignmentStore, MemoryIdentityStore, MemoryRemoteBackend,
};
use containersync_engine::SyncEngine;
use tracing::debug;

use crate::output::OutputFormat;

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: EngineConfig,
    pub local: Option<PathBuf>,
    pub remote: Option<PathBuf>,
    pub format: OutputFormat,
}

impl CommandContext {
    fn state_files(&self) -> Result<StateFiles> {
        let local = self
            .local
            .clone()
            .or_else(|| self.config.local_state_path())
            .context("could not determine local state path; pass --local")?;
        let remote = self
            .remote
            .clone()
            .or_else(|| self.config.remote_state_path())
            .context("could not determine remote state path; pass --remote")?;
        Ok(StateFiles::new(local, remote))
    }
}

pub struct Session {
    pub engine: SyncEngine,
    pub identities: Arc<MemoryIdentityStore>,
    pub assignments: Arc<MemoryAssignmentStore>,
    pub remote: Arc<MemoryRemoteBackend>,
    files: StateFiles,
}

impl Session {
    pub fn open(cx: &CommandContext) -> Result<Self> {
        let files = cx.state_files()?;
        debug!(local = %files.local.display(), remote = %files.remote.display(), "opening state files");
        let (identities, assignments) = files.load_local()?.into_stores();
        let identities = Arc::new(identities);
        let assignments = Arc::new(assignments);
        let remote = Arc::new(files.load_remote()?);

        // Nothing listens across a single invocation; the bus only carries the
        // engine's subscription state.
        let (bus, _events) = ChannelBus::new();
        let engine =
            SyncEngine::new(remote.clone(), identities.clone(), assignments.clone(), bus)
                .with_config(&cx.config);

        Ok(Self { engine, identities, assignments, remote, files })
    }

    pub fn save(&self) -> Result<()> {
        self.files.save_local(&LocalState::capture(&self.identities, &self.assignments))?;
        self.files.save_remote(&self.remote)
    }
}

/// Run `future` to completion on a fresh current-thread runtime.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    Ok(runtime.block_on(future))
}
