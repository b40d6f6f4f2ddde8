//! Info command: show package, config, changelog and tool information.

use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use debrel_core::changelog::{ChangelogEntry, ChangelogStore};
use debrel_core::config::{self, Config};
use debrel_core::git::SystemGit;
use debrel_core::shell::{self, ToolStatus};

use super::Context;

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    remote: String,
    branch: String,
    repository_role: String,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &camino::Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            remote: config.git.remote.clone(),
            branch: config.git.branch.clone(),
            repository_role: config.repository.role.clone(),
        }
    }
}

#[derive(Serialize)]
struct GitInfo {
    inside_repo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
}

impl GitInfo {
    fn probe(git: &SystemGit) -> Self {
        let inside_repo = git.is_inside_repo().unwrap_or(false);
        let branch = if inside_repo {
            git.current_branch().ok().flatten()
        } else {
            None
        };
        Self {
            inside_repo,
            branch,
        }
    }
}

/// Top changelog entry, or why it could not be read.
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum ChangelogInfo {
    Entry(ChangelogEntry),
    Unavailable(String),
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    git: GitInfo,
    changelog: ChangelogInfo,
    tools: Vec<ToolStatus>,
}

/// Print package information.
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(_args: InfoArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    debug!(json_output = ctx.json, "executing info command");

    let changelog = match ctx.changelog().top_entry() {
        Ok(entry) => ChangelogInfo::Entry(entry),
        Err(err) => ChangelogInfo::Unavailable(err.to_string()),
    };
    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(ctx.config, ctx.cwd),
        git: GitInfo::probe(&ctx.git()),
        changelog,
        tools: shell::required_tools(),
    };

    if ctx.json {
        return super::print_json(&info);
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!(
            "{}: {}",
            "Repository".dimmed(),
            info.package.repository.cyan()
        );
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    if let Some(ref path) = info.config.config_file {
        println!("{}: {}", "Config file".dimmed(), path.cyan());
    } else {
        println!("{}: {}", "Config file".dimmed(), "none loaded".yellow());
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!(
        "{}: {}/{}",
        "Release branch".dimmed(),
        info.config.remote,
        info.config.branch
    );
    println!(
        "{}: {}",
        "Repository role".dimmed(),
        info.config.repository_role
    );

    println!();
    println!("{}", "Git".bold().underline());
    match (info.git.inside_repo, info.git.branch.as_deref()) {
        (false, _) => println!("  {} {}", "○".yellow(), "not a git work tree".yellow()),
        (true, Some(branch)) => println!("{}: {}", "Current branch".dimmed(), branch.cyan()),
        (true, None) => println!("{}: {}", "Current branch".dimmed(), "detached HEAD".yellow()),
    }

    println!();
    println!("{}", "Changelog".bold().underline());
    match info.changelog {
        ChangelogInfo::Entry(ref entry) => {
            println!("  {} {}", "✓".green(), entry.to_string().cyan());
        }
        ChangelogInfo::Unavailable(ref reason) => {
            println!("  {} {}", "○".yellow(), reason.yellow());
        }
    }

    println!();
    println!("{}", "Tools".bold().underline());
    for tool in &info.tools {
        match tool.path {
            Some(ref path) => println!("  {} {} {}", "✓".green(), tool.name, path.dimmed()),
            None => println!("  {} {} {}", "✗".red(), tool.name, "not on PATH".red()),
        }
    }

    Ok(())
}
