// `containersync forget-site` / `containersync assign-site`.

use anyhow::{bail, Context};
use clap::Args;
use containersync_common::keys::{LocalContainerId, LocalSiteKey};
use containersync_common::types::AssignedSite;
use containersync_engine::store::LocalIdentityStore;
use serde::Serialize;
use serde_json::Value;

use crate::output;
use crate::session::{self, CommandContext, Session};

#[derive(Debug, Args)]
pub struct ForgetSiteArgs {
    /// Site URL or bare origin (e.g. `https://mail.example.com` or `mail.example.com`).
    site: String,
}

#[derive(Debug, Args)]
pub struct AssignSiteArgs {
    /// Site URL or bare origin.
    site: String,

    /// Container id (`firefox-container-3`) or its user context id (`3`).
    container: String,

    /// Open the site in the container without asking.
    #[arg(long)]
    never_ask: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResult {
    pub site: String,
    pub container: Option<String>,
}

pub fn forget(args: ForgetSiteArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let key = parse_site(&args.site)?;
    let result = session::block_on(forget_site(key, cx))??;
    output::print_output(cx.format, &result, |r| format!("Forgot {}; tombstoned in sync storage.", r.site))?;
    Ok(())
}

pub fn assign(args: AssignSiteArgs, cx: &CommandContext) -> anyhow::Result<()> {
    let key = parse_site(&args.site)?;
    let container = parse_container(&args.container)?;
    let result = session::block_on(assign_site(key, container, args.never_ask, cx))??;
    output::print_output(cx.format, &result, |r| {
        format!("Assigned {} to {}.", r.site, r.container.as_deref().unwrap_or("?"))
    })?;
    Ok(())
}

async fn forget_site(key: LocalSiteKey, cx: &CommandContext) -> anyhow::Result<SiteResult> {
    let session = Session::open(cx)?;
    session.engine.site_removed(&key).await.context("failed to forget site")?;
    session.save()?;
    Ok(SiteResult { site: key.origin().to_string(), container: None })
}

async fn assign_site(
    key: LocalSiteKey,
    container: LocalContainerId,
    never_ask: bool,
    cx: &CommandContext,
) -> anyhow::Result<SiteResult> {
    let session = Session::open(cx)?;
    let exists = session
        .identities
        .query_all()
        .await?
        .iter()
        .any(|identity| identity.cookie_store_id == container);
    if !exists {
        bail!("container `{container}` does not exist");
    }

    let mut site = AssignedSite::new(container.user_context_id());
    if never_ask {
        site.extra.insert("neverAsk".into(), Value::Bool(true));
    }
    session.engine.site_assigned(&key, &site).await.context("failed to assign site")?;
    session.save()?;
    Ok(SiteResult { site: key.origin().to_string(), container: Some(container.to_string()) })
}

/// Accept either a full URL or a bare `host[:port]` origin.
fn parse_site(raw: &str) -> anyhow::Result<LocalSiteKey> {
    let key = if raw.contains("://") {
        LocalSiteKey::from_url(raw)
    } else {
        LocalSiteKey::from_origin(raw)
    };
    key.with_context(|| format!("invalid site `{raw}`"))
}

fn parse_container(raw: &str) -> anyhow::Result<LocalContainerId> {
    let id = if raw.chars().all(|c| c.is_ascii_digit()) {
        LocalContainerId::from_user_context_id(raw)
    } else {
        LocalContainerId::parse(raw)
    };
    id.with_context(|| format!("invalid container `{raw}`"))
}
