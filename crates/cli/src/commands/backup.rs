// `containersync backup`: push local state into sync storage.

use anyhow::Context;
use clap::Args;
use containersync_engine::backup::BackupOptions;
use containersync_engine::store::{LocalAssignmentStore, LocalIdentityStore};
use serde::Serialize;

use crate::output;
use crate::session::{self, CommandContext, Session};

#[derive(Debug, Args)]
pub struct BackupArgs {}

#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub identities: usize,
    pub sites: usize,
}

pub fn run(_args: BackupArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let result = session::block_on(backup(cx))??;
    output::print_output(cx.format, &result, |r| {
        format!("Backed up {} identities and {} site assignments.", r.identities, r.sites)
    })?;
    Ok(())
}

async fn backup(cx: &CommandContext) -> anyhow::Result<BackupResult> {
    let session = Session::open(cx)?;
    session.engine.backup(&BackupOptions::default()).await.context("backup failed")?;
    session.save()?;
    Ok(BackupResult {
        identities: session.identities.query_all().await?.len(),
        sites: session.assignments.get_all().await?.len(),
    })
}
