//! Release commands: thin CLI layer over `debrel_core::release`.

use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument, warn};

use debrel_core::release::{
    ReleaseCoordinator, ReleaseEvent, ReleaseObserver, ReleaseOutcome, ReleaseRequest,
    ReleaseSummary,
};
use debrel_core::version::BumpLevel;

use super::Context;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Confirmation flag shared by the release subcommands.
#[derive(Args, Debug, Default, Clone, Copy)]
pub struct ConfirmArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Arguments for `debrel new`.
#[derive(Args, Debug, Default)]
pub struct NewArgs {
    /// Version to release (e.g. "1.2.3"); may be omitted on a first release
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

/// Arguments for `debrel major|minor|patch`.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Value for the bumped component instead of the next one
    #[arg(value_name = "LEVEL")]
    pub level: Option<u64>,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

/// Execute `debrel new`.
pub fn cmd_new(args: NewArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    release(ReleaseRequest::Explicit(args.version), args.confirm, ctx)
}

/// Execute `debrel major`.
pub fn cmd_major(args: BumpArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    bump(BumpLevel::Major, args, ctx)
}

/// Execute `debrel minor`.
pub fn cmd_minor(args: BumpArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    bump(BumpLevel::Minor, args, ctx)
}

/// Execute `debrel patch`.
pub fn cmd_patch(args: BumpArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    bump(BumpLevel::Patch, args, ctx)
}

fn bump(level: BumpLevel, args: BumpArgs, ctx: &Context<'_>) -> anyhow::Result<()> {
    let request = ReleaseRequest::Bump {
        level,
        level_override: args.level,
    };
    release(request, args.confirm, ctx)
}

#[instrument(name = "cmd_release", skip_all, fields(request = ?request))]
fn release(
    request: ReleaseRequest,
    confirm: ConfirmArgs,
    ctx: &Context<'_>,
) -> anyhow::Result<()> {
    let prompt = ctx.config.release.confirm && !confirm.yes;
    debug!(json_output = ctx.json, prompt, "executing release command");

    let git = ctx.git();
    let changelog = ctx.changelog();
    let publisher = ctx.publisher();
    let coordinator = ReleaseCoordinator::new(&git, &changelog, &publisher)
        .with_fetch_all(ctx.config.git.fetch_all);

    let mut observer = TerminalObserver::new(ctx.json, prompt);
    let outcome = coordinator.run(request, &mut observer);
    observer.clear_spinner();
    let outcome = outcome?;

    if ctx.json {
        super::print_json(&outcome)?;
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Terminal observer
// ──────────────────────────────────────────────

/// Renders release progress and asks before publishing.
struct TerminalObserver {
    json: bool,
    prompt: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalObserver {
    const fn new(json: bool, prompt: bool) -> Self {
        Self {
            json,
            prompt,
            spinner: None,
        }
    }

    fn start_spinner(&mut self, message: String) {
        self.clear_spinner();
        let style = ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_FRAMES);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for TerminalObserver {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

impl ReleaseObserver for TerminalObserver {
    fn event(&mut self, event: &ReleaseEvent) {
        debug!(?event, "release event");
        if self.json {
            return;
        }
        match event {
            ReleaseEvent::LastReleased(version) => {
                println!("{}: {}", "Last release".dimmed(), version);
            }
            ReleaseEvent::Resolved {
                version,
                distribution,
            } => {
                println!(
                    "\n{}: {} {} {}\n",
                    "Release".bold(),
                    version.to_string().green().bold(),
                    "for".dimmed(),
                    distribution.to_string().cyan(),
                );
            }
            ReleaseEvent::StepStarted(step) => self.start_spinner(format!("{step}...")),
            ReleaseEvent::StepFinished(step) => {
                self.clear_spinner();
                println!("  {} {}", "✓".green(), step.to_string().bold());
            }
            ReleaseEvent::StepSkipped(step) => {
                self.clear_spinner();
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    step.to_string().bold(),
                    "not needed".dimmed(),
                );
            }
            ReleaseEvent::TagDeleted(tag) => {
                println!("  {} removed local tag {}", "–".yellow(), tag.cyan());
            }
        }
    }

    fn confirm(&mut self, summary: &ReleaseSummary) -> bool {
        self.clear_spinner();
        if !self.prompt {
            return true;
        }
        if !self.json {
            print_summary(summary);
        }

        let question = format!(
            "Push and upload {} to {}?",
            summary.version, summary.distribution
        );
        Confirm::new(&question)
            .with_default(false)
            .prompt()
            .unwrap_or_else(|err| {
                warn!(error = %err, "confirmation prompt failed, treating as decline");
                false
            })
    }
}

fn print_summary(summary: &ReleaseSummary) {
    println!();
    for line in summary_lines(summary) {
        println!("{line}");
    }
    println!();
}

/// Version, distribution and package list shown right before the prompt.
fn summary_lines(summary: &ReleaseSummary) -> Vec<String> {
    let mut lines = vec![
        format!("{}", "Release".bold().underline()),
        format!(
            "  {}: {}",
            "Version".dimmed(),
            summary.version.to_string().green().bold()
        ),
        format!(
            "  {}: {}",
            "Distribution".dimmed(),
            summary.distribution.to_string().cyan()
        ),
        format!("  {}:", "Packages".dimmed()),
    ];
    if summary.packages.is_empty() {
        lines.push(format!("    {}", "none listed".yellow()));
    }
    for package in &summary.packages {
        lines.push(format!("    {} {package}", "•".dimmed()));
    }
    lines
}

fn print_outcome(outcome: &ReleaseOutcome) {
    println!();
    println!(
        "{} Released {} to {}",
        "✓".green().bold(),
        outcome.version.to_string().green().bold(),
        outcome.distribution.to_string().cyan(),
    );
    super::upload::print_reports(&outcome.uploads);
}
