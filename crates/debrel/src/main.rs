//! debrel CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use debrel::{Cli, Commands, commands};
use debrel_core::ReleaseError;
use debrel_core::config::ConfigLoader;
use owo_colors::OwoColorize;
use tracing::debug;

mod observability;

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.apply();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cancelled = err
                .downcast_ref::<ReleaseError>()
                .is_some_and(ReleaseError::is_cancellation);
            if cancelled {
                eprintln!("{}", format!("{err:#}").yellow());
            } else {
                eprintln!("Error: {err:?}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(&config_path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::new(config.log_dir.clone());
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        chdir = ?cli.chdir,
        "CLI initialized"
    );

    let ctx = commands::Context {
        config: &config,
        cwd: &cwd,
        json: cli.json,
    };
    let result = match cli.command {
        Commands::New(args) => commands::release::cmd_new(args, &ctx),
        Commands::Major(args) => commands::release::cmd_major(args, &ctx),
        Commands::Minor(args) => commands::release::cmd_minor(args, &ctx),
        Commands::Patch(args) => commands::release::cmd_patch(args, &ctx),
        Commands::Upload(args) => commands::upload::cmd_upload(args, &ctx),
        Commands::Fetch(args) => commands::git::cmd_fetch(args, &ctx),
        Commands::Push => commands::git::cmd_push(&ctx),
        Commands::HasTag(args) => commands::git::cmd_has_tag(args, &ctx),
        Commands::Hosts => commands::hosts::cmd_hosts(&ctx),
        Commands::Info(args) => commands::info::cmd_info(args, &ctx),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %format!("{err:#}"), "fatal error");
    }
    result
}
