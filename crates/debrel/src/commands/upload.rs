//! Upload command: publish already built packages.

use anyhow::Context as _;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use debrel_core::changelog::ChangelogStore;
use debrel_core::publish::{Distribution, PackagePublisher, UploadReport};

use super::Context;

/// Arguments for the `upload` subcommand.
#[derive(Args, Debug, Default)]
pub struct UploadArgs {
    /// Target distribution (defaults to the changelog's)
    #[arg(value_name = "DISTRIBUTION")]
    pub distribution: Option<String>,
}

#[derive(Serialize)]
struct UploadOutput<'a> {
    distribution: Distribution,
    packages: &'a [String],
    uploads: &'a [UploadReport],
}

/// Execute the upload command.
#[instrument(name = "cmd_upload", skip_all, fields(distribution = ?args.distribution))]
pub fn cmd_upload(args: UploadArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    let name = match args.distribution {
        Some(name) => name,
        None => ctx
            .changelog()
            .distribution()
            .context("no distribution given and the changelog has none")?,
    };
    let distribution: Distribution = name.parse()?;
    debug!(%distribution, "executing upload command");

    let publisher = ctx.publisher();
    let packages = publisher
        .package_names()
        .context("failed to list binary packages")?;
    let uploads = publisher
        .upload(distribution, &packages)
        .with_context(|| format!("upload to {distribution} failed"))?;

    if ctx.json {
        super::print_json(&UploadOutput {
            distribution,
            packages: &packages,
            uploads: &uploads,
        })?;
    } else {
        println!(
            "{} Uploaded {} package{} to {}",
            "✓".green().bold(),
            packages.len(),
            if packages.len() == 1 { "" } else { "s" },
            distribution.to_string().cyan(),
        );
        print_reports(&uploads);
    }
    Ok(())
}

/// Print one line per host, then the removed and added files.
pub(crate) fn print_reports(reports: &[UploadReport]) {
    for report in reports {
        let signed = if report.signed {
            "signed".green().to_string()
        } else {
            "unsigned".yellow().to_string()
        };
        println!(
            "  {} {} ({} uploaded, {} pruned, {})",
            "•".dimmed(),
            report.host.bold(),
            report.uploaded.len(),
            report.pruned.len(),
            signed,
        );
        for file in &report.pruned {
            println!("      {} {}", "-".red(), file.dimmed());
        }
        for file in &report.uploaded {
            println!("      {} {}", "+".green(), file);
        }
    }
}
