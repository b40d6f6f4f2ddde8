//! Command implementations

pub mod git;

pub mod hosts;

pub mod info;

pub mod release;

pub mod upload;

use camino::Utf8Path;
use debrel_core::changelog::DebianChangelog;
use debrel_core::config::Config;
use debrel_core::git::SystemGit;
use debrel_core::inventory::Inventory;
use debrel_core::publish::{AptPublisher, SshRemote};

/// Shared state handed to every command.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Loaded configuration.
    pub config: &'a Config,
    /// Project root (the working directory after `-C`).
    pub cwd: &'a Utf8Path,
    /// Global `--json` flag.
    pub json: bool,
}

impl Context<'_> {
    /// Git gateway for the project.
    pub fn git(&self) -> SystemGit {
        SystemGit::new(self.cwd, &self.config.git)
    }

    /// The project's `debian/changelog`.
    pub fn changelog(&self) -> DebianChangelog {
        DebianChangelog::new(self.cwd, &self.config.changelog)
    }

    /// Configured inventory.
    pub fn inventory(&self) -> Inventory {
        Inventory::from_config(&self.config.inventory)
    }

    /// Publisher reaching the repository hosts over SSH.
    pub fn publisher(&self) -> AptPublisher<SshRemote> {
        let remote = SshRemote::new(self.config.repository.user.clone(), self.cwd);
        AptPublisher::new(
            self.cwd,
            &self.config.commands,
            &self.config.repository,
            self.inventory(),
            remote,
        )
    }
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
