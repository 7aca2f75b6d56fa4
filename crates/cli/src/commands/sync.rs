// `containersync sync`: run a reconciliation pass.

use anyhow::Context;
use clap::Args;
use containersync_engine::{SyncMode, SyncOutcome};

use crate::output;
use crate::session::{self, CommandContext, Session};

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Join identities by name, as on a profile's first sync, even if it already synced.
    #[arg(long)]
    first: bool,
}

pub fn run(args: SyncArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let outcome = session::block_on(sync(args, cx))??;
    output::print_output(cx.format, &outcome, format_human)?;
    Ok(())
}

async fn sync(args: SyncArgs, cx: &CommandContext) -> anyhow::Result<SyncOutcome> {
    let session = Session::open(cx)?;
    let outcome = if args.first {
        session.engine.run_first_sync().await
    } else {
        session.engine.init_sync().await
    }
    .context("sync failed")?;
    session.save()?;
    Ok(outcome)
}

fn format_human(outcome: &SyncOutcome) -> String {
    let mode = match outcome.mode {
        SyncMode::ByName => "first sync, matched by name",
        SyncMode::ByUuid => "matched by uuid",
    };
    if !outcome.restored {
        return format!("Sync storage was empty; seeded it from local state ({mode}).");
    }

    let ids = &outcome.identities;
    let sites = &outcome.sites;
    let mut lines = vec![format!("Restored from sync storage ({mode}).")];
    lines.push(format!(
        "  identities: {} created, {} updated, {} rebound, {} pruned, {} skipped",
        ids.created, ids.updated, ids.rebound, ids.pruned, ids.skipped
    ));
    lines.push(format!(
        "  sites: {} assigned, {} removed, {} skipped",
        sites.assigned, sites.removed, sites.skipped
    ));
    if outcome.remote_pruned > 0 {
        lines.push(format!("  pruned {} orphaned sync map entries", outcome.remote_pruned));
    }
    let cleanup = &outcome.local_cleanup;
    if cleanup.new_bindings > 0 || cleanup.stale_bindings > 0 {
        lines.push(format!(
            "  local bindings: {} added, {} dropped",
            cleanup.new_bindings, cleanup.stale_bindings
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use containersync_engine::cleanup::LocalCleanup;
    use containersync_engine::reconcile::{IdentityReport, SiteReport};

    fn outcome(restored: bool) -> SyncOutcome {
        SyncOutcome {
            mode: SyncMode::ByUuid,
            restored,
            local_cleanup: LocalCleanup::default(),
            remote_pruned: 0,
            identities: IdentityReport { created: 2, ..Default::default() },
            sites: SiteReport { assigned: 1, ..Default::default() },
        }
    }

    #[test]
    fn human_output_for_seeded_pass() {
        assert!(format_human(&outcome(false)).starts_with("Sync storage was empty"));
    }

    #[test]
    fn human_output_lists_counts() {
        let text = format_human(&outcome(true));
        assert!(text.contains("2 created"));
        assert!(text.contains("1 assigned"));
        assert!(!text.contains("orphaned"));
    }
}
