// `containersync status`: summarize local and sync storage state.

use clap::Args;
use containersync_engine::store::{LocalAssignmentStore, LocalIdentityStore};
use containersync_common::types::Identity;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::output;
use crate::session::{self, CommandContext, Session};

#[derive(Debug, Args)]
pub struct StatusArgs {}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResult {
    pub synced: bool,
    pub identities: Vec<IdentityRow>,
    pub sites: usize,
    pub remote: RemoteSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityRow {
    pub container: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub uuid: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteSummary {
    pub identities: usize,
    pub map_entries: usize,
    pub orphaned_map_entries: usize,
    pub assigned_sites: usize,
    pub deleted_identities: usize,
    pub deleted_sites: usize,
}

pub fn run(_args: StatusArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let result = session::block_on(status(cx))??;
    output::print_output(cx.format, &result, format_human)?;
    Ok(())
}

async fn status(cx: &CommandContext) -> anyhow::Result<StatusResult> {
    let session = Session::open(cx)?;
    let bindings = session.identities.uuid_map().await?;
    let identities = session
        .identities
        .query_all()
        .await?
        .into_iter()
        .map(|identity| {
            let uuid = bindings.get(&identity.cookie_store_id).copied();
            identity_row(identity, uuid)
        })
        .collect();

    let snapshot = session.engine.context().remote.load_snapshot().await?;
    Ok(StatusResult {
        synced: session.assignments.get_synced_flag().await?,
        identities,
        sites: session.assignments.get_all().await?.len(),
        remote: RemoteSummary {
            identities: snapshot.identities.len(),
            map_entries: snapshot.cookie_store_id_map.len(),
            orphaned_map_entries: snapshot.orphaned_map_keys().len(),
            assigned_sites: snapshot.assigned_sites.len(),
            deleted_identities: snapshot.deleted_identity_list.len(),
            deleted_sites: snapshot.deleted_site_list.len(),
        },
    })
}

fn identity_row(identity: Identity, uuid: Option<Uuid>) -> IdentityRow {
    IdentityRow {
        container: identity.cookie_store_id.to_string(),
        color: wire_name(&identity.info.color),
        icon: wire_name(&identity.info.icon),
        name: identity.info.name,
        uuid,
    }
}

/// The name a palette value is stored under in sync storage.
fn wire_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => String::new(),
    }
}

fn format_human(result: &StatusResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "Local ({}): {} identities, {} site assignments",
        if result.synced { "synced" } else { "never synced" },
        result.identities.len(),
        result.sites
    ));
    for row in &result.identities {
        let uuid = row.uuid.map(|u| u.to_string()).unwrap_or_else(|| "unbound".into());
        lines.push(format!("  {} {} [{}/{}] {}", row.container, row.name, row.color, row.icon, uuid));
    }

    let remote = &result.remote;
    lines.push(format!(
        "Sync storage: {} identities, {} map entries, {} site assignments",
        remote.identities, remote.map_entries, remote.assigned_sites
    ));
    lines.push(format!(
        "  tombstones: {} identities, {} sites",
        remote.deleted_identities, remote.deleted_sites
    ));
    if remote.orphaned_map_entries > 0 {
        lines.push(format!("  {} orphaned map entries (pruned on next sync)", remote.orphaned_map_entries));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_marks_unbound_identities() {
        let result = StatusResult {
            synced: false,
            identities: vec![IdentityRow {
                container: "firefox-container-1".into(),
                name: "Personal".into(),
                color: "blue".into(),
                icon: "fingerprint".into(),
                uuid: None,
            }],
            sites: 0,
            remote: RemoteSummary {
                identities: 0,
                map_entries: 0,
                orphaned_map_entries: 2,
                assigned_sites: 0,
                deleted_identities: 0,
                deleted_sites: 0,
            },
        };
        let text = format_human(&result);
        assert!(text.starts_with("Local (never synced): 1 identities"));
        assert!(text.contains("firefox-container-1 Personal [blue/fingerprint] unbound"));
        assert!(text.contains("2 orphaned map entries"));
    }

    #[test]
    fn rows_use_stored_palette_names() {
        use containersync_common::keys::LocalContainerId;
        use containersync_common::types::{Color, Icon, IdentityInfo};

        let identity = Identity {
            cookie_store_id: LocalContainerId::from_user_context_id("4").unwrap(),
            info: IdentityInfo::new("Travel", Color::Turquoise, Icon::Vacation),
        };
        let stored = serde_json::to_value(&identity.info).unwrap();

        let row = identity_row(identity, None);

        assert_eq!(row.container, "firefox-container-4");
        assert_eq!(row.color, stored["color"]);
        assert_eq!(row.icon, stored["icon"]);
        assert_eq!(row.color, "turquoise");
    }
}
