//! Debian changelog reading and release entries.
//!
//! Only the top entry matters: its header names the last released version
//! and the target distribution.
//!
//! ```text
//! hello (1.2.3) trusty; urgency=medium
//!
//!   * Fix the greeting.
//!
//!  -- Jane Doe <jane@example.com>  Tue, 03 Mar 2015 10:00:00 +0100
//! ```

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::ChangelogConfig;
use crate::shell::{self, ShellError, Vars};
use crate::version::{SemanticVersion, VersionParseError};

/// Errors reading or updating the changelog.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// The changelog file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Changelog path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The changelog has no entries.
    #[error("changelog is empty")]
    Empty,

    /// The top entry header does not follow `name (version) distribution; ...`.
    #[error("malformed changelog header '{line}': {reason}")]
    Malformed {
        /// The offending header line.
        line: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The top entry's version is not a semantic version.
    #[error("changelog version is invalid: {0}")]
    InvalidVersion(#[from] VersionParseError),

    /// Writing or committing the new entry failed.
    #[error(transparent)]
    Command(#[from] ShellError),
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// The top entry of a Debian changelog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogEntry {
    /// Source package name.
    pub package: String,
    /// Version string as written.
    pub version: String,
    /// First target distribution as written.
    pub distribution: String,
    /// `urgency=` value, if present.
    pub urgency: Option<String>,
    /// `Name <mail>` from the trailer line.
    pub author: Option<String>,
    /// Date from the trailer line, unparsed.
    pub timestamp: Option<String>,
}

impl ChangelogEntry {
    /// Parse the top entry of changelog `text`.
    pub fn parse_top(text: &str) -> ChangelogResult<Self> {
        let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
        let header = lines.next().ok_or(ChangelogError::Empty)?;
        let mut entry = Self::parse_header(header)?;

        // The trailer closes the entry; the next header would start a new one.
        if let Some(trailer) = lines
            .take_while(|l| l.is_empty() || l.starts_with(' ') || l.starts_with('\t'))
            .find(|l| l.starts_with(" -- "))
        {
            let (author, timestamp) = parse_trailer(trailer);
            entry.author = author;
            entry.timestamp = timestamp;
        }
        Ok(entry)
    }

    fn parse_header(line: &str) -> ChangelogResult<Self> {
        let malformed = |reason| ChangelogError::Malformed {
            line: line.to_string(),
            reason,
        };

        let (head, params) = line.split_once(';').unwrap_or((line, ""));
        let (package, rest) = head
            .split_once(char::is_whitespace)
            .ok_or_else(|| malformed("missing version"))?;
        if package.is_empty()
            || !package
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.'))
        {
            return Err(malformed("invalid package name"));
        }

        let rest = rest
            .trim_start()
            .strip_prefix('(')
            .ok_or_else(|| malformed("missing version"))?;
        let (version, distributions) = rest
            .split_once(')')
            .ok_or_else(|| malformed("unterminated version"))?;
        let version = version.trim();
        if version.is_empty() {
            return Err(malformed("empty version"));
        }
        let distribution = distributions
            .split_whitespace()
            .next()
            .ok_or_else(|| malformed("missing distribution"))?;

        let urgency = params
            .split(',')
            .filter_map(|p| p.trim().strip_prefix("urgency="))
            .map(|u| u.trim().to_string())
            .next();

        Ok(Self {
            package: package.to_string(),
            version: version.to_string(),
            distribution: distribution.to_string(),
            urgency,
            author: None,
            timestamp: None,
        })
    }

    /// The entry's version as a [`SemanticVersion`].
    pub fn semantic_version(&self) -> ChangelogResult<SemanticVersion> {
        Ok(self.version.parse()?)
    }
}

impl fmt::Display for ChangelogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.package, self.version, self.distribution)
    }
}

fn parse_trailer(line: &str) -> (Option<String>, Option<String>) {
    let body = line.trim_start_matches(" -- ").trim_end();
    match body.split_once("  ") {
        Some((author, date)) => (non_empty(author), non_empty(date)),
        None => (non_empty(body), None),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Reads the last release from the changelog and records new ones.
pub trait ChangelogStore {
    /// Parse the top entry.
    fn top_entry(&self) -> ChangelogResult<ChangelogEntry>;

    /// Write and commit a release entry for `version`.
    ///
    /// Callers check ordering against [`ChangelogStore::last_version`] first.
    fn append_release(&self, version: &SemanticVersion) -> ChangelogResult<()>;

    /// Version of the top entry.
    fn last_version(&self) -> ChangelogResult<SemanticVersion> {
        self.top_entry()?.semantic_version()
    }

    /// Distribution of the top entry.
    fn distribution(&self) -> ChangelogResult<String> {
        Ok(self.top_entry()?.distribution)
    }
}

/// [`ChangelogStore`] over `debian/changelog` in a project checkout.
#[derive(Debug, Clone)]
pub struct DebianChangelog {
    root: Utf8PathBuf,
    config: ChangelogConfig,
}

impl DebianChangelog {
    /// Changelog of the project at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>, config: &ChangelogConfig) -> Self {
        Self {
            root: root.into(),
            config: config.clone(),
        }
    }

    /// Absolute path of the changelog file.
    pub fn path(&self) -> Utf8PathBuf {
        self.root.join(&self.config.path)
    }

    fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl ChangelogStore for DebianChangelog {
    #[instrument(skip(self), fields(path = %self.config.path))]
    fn top_entry(&self) -> ChangelogResult<ChangelogEntry> {
        let path = self.path();
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ChangelogError::Io { path, source })?;
        let entry = ChangelogEntry::parse_top(&text)?;
        debug!(version = %entry.version, distribution = %entry.distribution, "read changelog");
        Ok(entry)
    }

    #[instrument(skip(self), fields(%version))]
    fn append_release(&self, version: &SemanticVersion) -> ChangelogResult<()> {
        let vars = Vars::new().with("version", version.to_string());
        shell::run_template(&self.config.new_version_cmd, &vars, self.root())?;

        let message = vars.interpolate(&self.config.commit_message);
        shell::run_program(
            "git",
            &["commit", self.config.path.as_str(), "-m", &message],
            self.root(),
        )?;
        info!("changelog updated and committed");
        Ok(())
    }
}
