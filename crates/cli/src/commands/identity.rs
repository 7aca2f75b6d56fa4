// `containersync add-identity` / `containersync remove-identity`.

use anyhow::{anyhow, Context};
use clap::Args;
use containersync_common::types::{Color, Icon, Identity, IdentityInfo};
use containersync_engine::store::LocalIdentityStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::output;
use crate::session::{self, CommandContext, Session};

#[derive(Debug, Args)]
pub struct AddIdentityArgs {
    name: String,

    #[arg(long, default_value = "blue", value_parser = parse_lowercase::<Color>)]
    color: Color,

    #[arg(long, default_value = "fingerprint", value_parser = parse_lowercase::<Icon>)]
    icon: Icon,
}

#[derive(Debug, Args)]
pub struct RemoveIdentityArgs {
    /// Container id (`firefox-container-3`) or identity name.
    identity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityResult {
    pub container: String,
    pub name: String,
}

impl From<&Identity> for IdentityResult {
    fn from(identity: &Identity) -> Self {
        Self { container: identity.cookie_store_id.to_string(), name: identity.name().to_string() }
    }
}

pub fn add(args: AddIdentityArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let info = IdentityInfo::new(args.name, args.color, args.icon);
    let result = session::block_on(add_identity(info, cx))??;
    output::print_output(cx.format, &result, |r| format!("Created {} ({}).", r.name, r.container))?;
    Ok(())
}

pub fn remove(args: RemoveIdentityArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let result = session::block_on(remove_identity(&args.identity, cx))??;
    output::print_output(cx.format, &result, |r| {
        format!("Removed {} ({}); tombstoned in sync storage.", r.name, r.container)
    })?;
    Ok(())
}

async fn add_identity(info: IdentityInfo, cx: &CommandContext) -> anyhow::Result<IdentityResult> {
    let session = Session::open(cx)?;
    let identity = session.identities.create(&info).await?;
    session.engine.identity_changed().await.context("failed to back up new identity")?;
    session.save()?;
    Ok(IdentityResult::from(&identity))
}

async fn remove_identity(query: &str, cx: &CommandContext) -> anyhow::Result<IdentityResult> {
    let session = Session::open(cx)?;
    let identity = session
        .identities
        .query_all()
        .await?
        .into_iter()
        .find(|identity| identity.cookie_store_id.to_string() == query || identity.name() == query)
        .ok_or_else(|| anyhow!("identity `{query}` not found"))?;

    session.identities.remove(&identity.cookie_store_id).await?;
    session.engine.identity_removed(&identity).await.context("failed to tombstone identity")?;
    session.save()?;
    Ok(IdentityResult::from(&identity))
}

/// Parse a lowercase palette name through the type's serde representation.
fn parse_lowercase<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| format!("unknown value `{raw}`"))
}
