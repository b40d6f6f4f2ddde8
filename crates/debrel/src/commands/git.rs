//! Stand-alone git tasks: fetch, push and tag lookup.

use anyhow::Context as _;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use debrel_core::git::VcsGateway;

use super::Context;

/// Arguments for the `fetch` subcommand.
#[derive(Args, Debug, Default)]
pub struct FetchArgs {
    /// Fetch every remote, not only the release remote
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the `has-tag` subcommand.
#[derive(Args, Debug, Default)]
pub struct HasTagArgs {
    /// Tag to look up (without it, whether any tag exists)
    #[arg(value_name = "NAME")]
    pub name: Option<String>,
}

#[derive(Serialize)]
struct TagStatus<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    exists: bool,
}

/// Execute the fetch command.
#[instrument(name = "cmd_fetch", skip_all)]
pub fn cmd_fetch(args: FetchArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    let all = args.all || ctx.config.git.fetch_all;
    ctx.git().fetch(all).context("fetch failed")?;
    if !ctx.json {
        let from = if all {
            "all remotes".to_string()
        } else {
            ctx.config.git.remote.clone()
        };
        println!("{} Fetched tags from {}", "✓".green(), from.cyan());
    }
    Ok(())
}

/// Execute the push command.
#[instrument(name = "cmd_push", skip_all)]
pub fn cmd_push(ctx: &Context<'_>) -> anyhow::Result<()> {
    ctx.git().push().context("push failed")?;
    if !ctx.json {
        let git = &ctx.config.git;
        println!(
            "{} Pushed {} and tags to {}",
            "✓".green(),
            git.branch.bold(),
            git.remote.cyan()
        );
    }
    Ok(())
}

/// Print `true` or `false`; the exit code is 0 either way.
#[instrument(name = "cmd_has_tag", skip_all)]
pub fn cmd_has_tag(args: HasTagArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    let git = ctx.git();
    let tag = args.name.as_deref();
    let exists = match tag {
        Some(name) => git.has_tag(name)?,
        None => git.has_any_tag()?,
    };
    debug!(tag, exists, "looked up tag");

    if ctx.json {
        super::print_json(&TagStatus { tag, exists })?;
    } else {
        println!("{exists}");
    }
    Ok(())
}
