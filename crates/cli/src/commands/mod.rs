// CLI subcommand dispatch.

use clap::Subcommand;

use crate::session::CommandContext;

pub mod backup;
pub mod identity;
pub mod site;
pub mod status;
pub mod sync;

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile local state with sync storage
    Sync(sync::SyncArgs),
    /// Push local state into sync storage
    Backup(backup::BackupArgs),
    /// Summarize local and sync storage state
    Status(status::StatusArgs),
    /// Remove a site assignment and tombstone it in sync storage
    ForgetSite(site::ForgetSiteArgs),
    /// Assign a site to a container and clear its tombstone
    AssignSite(site::AssignSiteArgs),
    /// Create a local identity and back it up
    AddIdentity(identity::AddIdentityArgs),
    /// Remove a local identity and tombstone its UUID
    RemoveIdentity(identity::RemoveIdentityArgs),
}

pub fn run(cmd: Command, cx: &CommandContext) -> anyhow::Result<()> {
    match cmd {
        Command::Sync(args) => sync::run(args, cx),
        Command::Backup(args) => backup::run(args, cx),
        Command::Status(args) => status::run(args, cx),
        Command::ForgetSite(args) => site::forget(args, cx),
        Command::AssignSite(args) => site::assign(args, cx),
        Command::AddIdentity(args) => identity::add(args, cx),
        Command::RemoveIdentity(args) => identity::remove(args, cx),
    }
}
