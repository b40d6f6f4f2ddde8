//! Package build and APT repository upload.
//!
//! [`AptPublisher`] runs the configured packaging commands locally and
//! publishes the resulting `.deb` files to every host of the repository
//! role. Remote work goes through a [`RemoteShell`], so the upload sequence
//! can be exercised without a network.
//!
//! # Upload sequence
//!
//! Per host, in `<root>/<distribution>/`:
//! 1. for each package, prune the oldest artifacts beyond [`RETENTION`]
//!    and copy the freshly built ones
//! 2. `dpkg-scanpackages -m . > Packages`
//! 3. `apt-ftparchive release . > Release`
//! 4. `gpg -u <key> --yes --output Release.gpg -ba Release`

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{CommandsConfig, RepositoryConfig};
use crate::error::InventoryError;
use crate::inventory::Inventory;
use crate::shell::{self, ShellError, ShellResult, Vars};

/// Artifacts kept per package name after an upload.
pub const RETENTION: usize = 4;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// A distribution name outside the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("distribution '{0}' is not supported (expected one of: precise, trusty)")]
pub struct UnsupportedDistribution(pub String);

/// Errors from building or publishing packages.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A local or remote command failed.
    #[error(transparent)]
    Command(#[from] ShellError),

    /// The repository role could not be resolved to hosts.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// No built `.deb` was found for a package.
    #[error("no artifact for package '{package}' in {dir}")]
    MissingArtifact {
        /// Package name.
        package: String,
        /// Directory that was searched.
        dir: Utf8PathBuf,
    },

    /// The remote artifact listing could not be read.
    #[error("unexpected listing line from {host}: '{line}'")]
    Listing {
        /// Host that produced the listing.
        host: String,
        /// The unparsable line.
        line: String,
    },

    /// The local artifact directory could not be read.
    #[error("failed to read {dir}: {source}")]
    Io {
        /// Artifact directory.
        dir: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

// ──────────────────────────────────────────────
// Distribution
// ──────────────────────────────────────────────

/// Supported target distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    /// Ubuntu 12.04.
    Precise,
    /// Ubuntu 14.04.
    Trusty,
}

impl Distribution {
    /// Every supported distribution.
    pub const ALL: [Self; 2] = [Self::Precise, Self::Trusty];

    /// Codename as used in changelogs and repository paths.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Precise => "precise",
            Self::Trusty => "trusty",
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = UnsupportedDistribution;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| UnsupportedDistribution(s.to_string()))
    }
}

// ──────────────────────────────────────────────
// Remote artifacts
// ──────────────────────────────────────────────

/// A `.deb` file present in the remote repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteArtifact {
    /// File name within the distribution directory.
    pub file_name: String,
    /// Modification time in seconds since the epoch.
    pub modified: f64,
}

impl RemoteArtifact {
    /// Parse one `<mtime> <file name>` listing line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (modified, file_name) = line.trim().split_once(' ')?;
        let file_name = file_name.trim().trim_start_matches("./");
        if file_name.is_empty() {
            return None;
        }
        Some(Self {
            file_name: file_name.to_string(),
            modified: modified.parse().ok()?,
        })
    }
}

/// Artifacts to delete so that at most `retain` remain.
///
/// Oldest first by modification time; equal times fall back to file name.
pub fn select_pruned(artifacts: &[RemoteArtifact], retain: usize) -> Vec<&RemoteArtifact> {
    let excess = artifacts.len().saturating_sub(retain);
    let mut by_age: Vec<&RemoteArtifact> = artifacts.iter().collect();
    by_age.sort_by(|a, b| {
        a.modified
            .total_cmp(&b.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    by_age.truncate(excess);
    by_age
}

/// What an upload did on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    /// Repository host.
    pub host: String,
    /// Remote files deleted by retention.
    pub pruned: Vec<String>,
    /// Local files copied to the repository.
    pub uploaded: Vec<String>,
    /// Whether `Release.gpg` was regenerated.
    pub signed: bool,
}

// ──────────────────────────────────────────────
// Remote shell
// ──────────────────────────────────────────────

/// Command execution on a repository host.
pub trait RemoteShell {
    /// Run `command` through the remote shell inside `dir`, returning stdout.
    fn run(&self, host: &str, dir: &Utf8Path, command: &str) -> ShellResult<String>;

    /// Copy local `files` into the remote directory `dir`.
    fn put(&self, host: &str, files: &[Utf8PathBuf], dir: &Utf8Path) -> ShellResult<()>;
}

impl<T: RemoteShell + ?Sized> RemoteShell for &T {
    fn run(&self, host: &str, dir: &Utf8Path, command: &str) -> ShellResult<String> {
        (**self).run(host, dir, command)
    }

    fn put(&self, host: &str, files: &[Utf8PathBuf], dir: &Utf8Path) -> ShellResult<()> {
        (**self).put(host, files, dir)
    }
}

/// [`RemoteShell`] over the `ssh` and `scp` binaries.
///
/// Authentication is left to the user's SSH agent and `~/.ssh/config`.
#[derive(Debug, Clone)]
pub struct SshRemote {
    user: String,
    local_root: Utf8PathBuf,
}

impl SshRemote {
    /// Log in as `user`; local paths resolve against `local_root`.
    pub fn new(user: impl Into<String>, local_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            user: user.into(),
            local_root: local_root.into(),
        }
    }

    fn destination(&self, host: &str) -> String {
        format!("{}@{host}", self.user)
    }
}

impl RemoteShell for SshRemote {
    #[instrument(skip(self), fields(user = %self.user))]
    fn run(&self, host: &str, dir: &Utf8Path, command: &str) -> ShellResult<String> {
        let remote = format!("cd {} && {command}", quote(dir.as_str()));
        shell::run_program(
            "ssh",
            &["-o", "BatchMode=yes", &self.destination(host), &remote],
            &self.local_root,
        )
    }

    #[instrument(skip(self, files), fields(user = %self.user, count = files.len()))]
    fn put(&self, host: &str, files: &[Utf8PathBuf], dir: &Utf8Path) -> ShellResult<()> {
        let target = format!("{}:{dir}/", self.destination(host));
        shell::run_program("scp", &scp_args(files, &target), &self.local_root)?;
        Ok(())
    }
}

/// Batch-mode `scp` arguments copying `files` to `target`.
fn scp_args<'a>(files: &'a [Utf8PathBuf], target: &'a str) -> Vec<&'a str> {
    let mut args = vec!["-B", "-p"];
    args.extend(files.iter().map(|file| file.as_str()));
    args.push(target);
    args
}

/// Single-quote `value` for a POSIX shell.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ──────────────────────────────────────────────
// Publisher
// ──────────────────────────────────────────────

/// Builds packages and publishes them.
pub trait PackagePublisher {
    /// Remove previous build products.
    fn clean(&self) -> PublishResult<()>;

    /// Build the binary packages.
    fn build(&self) -> PublishResult<()>;

    /// Names of the binary packages the source produces.
    fn package_names(&self) -> PublishResult<Vec<String>>;

    /// Publish `packages` to the repository for `distribution`.
    fn upload(
        &self,
        distribution: Distribution,
        packages: &[String],
    ) -> PublishResult<Vec<UploadReport>>;
}

/// [`PackagePublisher`] for a plain APT repository reached over a [`RemoteShell`].
#[derive(Debug)]
pub struct AptPublisher<R> {
    root: Utf8PathBuf,
    commands: CommandsConfig,
    repository: RepositoryConfig,
    inventory: Inventory,
    remote: R,
}

impl<R: RemoteShell> AptPublisher<R> {
    /// Publisher for the project at `root`.
    pub fn new(
        root: impl Into<Utf8PathBuf>,
        commands: &CommandsConfig,
        repository: &RepositoryConfig,
        inventory: Inventory,
        remote: R,
    ) -> Self {
        Self {
            root: root.into(),
            commands: commands.clone(),
            repository: repository.clone(),
            inventory,
            remote,
        }
    }

    /// Remote directory for `distribution`.
    pub fn repository_dir(&self, distribution: Distribution) -> Utf8PathBuf {
        self.repository.root.join(distribution.as_str())
    }

    /// Built `.deb` files for `package`, sorted by name.
    fn local_artifacts(&self, package: &str) -> PublishResult<Vec<Utf8PathBuf>> {
        let dir = self.root.join(&self.repository.artifact_dir);
        let entries = dir.read_dir_utf8().map_err(|source| PublishError::Io {
            dir: dir.clone(),
            source,
        })?;

        let prefix = format!("{package}_");
        let mut files: Vec<Utf8PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| {
                let name = e.file_name();
                name.starts_with(&prefix) && name.ends_with(".deb")
            })
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PublishError::MissingArtifact {
                package: package.to_string(),
                dir,
            });
        }
        Ok(files)
    }

    fn remote_artifacts(
        &self,
        host: &str,
        dir: &Utf8Path,
        package: &str,
    ) -> PublishResult<Vec<RemoteArtifact>> {
        let pattern = quote(&format!("{package}_*_*.deb"));
        let listing = self.remote.run(
            host,
            dir,
            &format!("find . -maxdepth 1 -name {pattern} -printf '%T@ %f\\n'"),
        )?;
        listing
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                RemoteArtifact::parse_line(line).ok_or_else(|| PublishError::Listing {
                    host: host.to_string(),
                    line: line.to_string(),
                })
            })
            .collect()
    }

    #[instrument(skip(self, artifacts), fields(%distribution))]
    fn publish_to_host(
        &self,
        host: &str,
        distribution: Distribution,
        artifacts: &[(String, Vec<Utf8PathBuf>)],
    ) -> PublishResult<UploadReport> {
        let dir = self.repository_dir(distribution);
        let mut report = UploadReport {
            host: host.to_string(),
            pruned: Vec::new(),
            uploaded: Vec::new(),
            signed: false,
        };

        for (package, files) in artifacts {
            let existing = self.remote_artifacts(host, &dir, package)?;
            let pruned = select_pruned(&existing, RETENTION);
            if !pruned.is_empty() {
                info!(%package, count = pruned.len(), "deleting old releases");
                let names: Vec<String> = pruned.iter().map(|a| quote(&a.file_name)).collect();
                self.remote
                    .run(host, &dir, &format!("rm -v -- {}", names.join(" ")))?;
                report
                    .pruned
                    .extend(pruned.iter().map(|a| a.file_name.clone()));
            }

            info!(%package, "uploading package");
            self.remote.put(host, files, &dir)?;
            report.uploaded.extend(
                files
                    .iter()
                    .filter_map(|f| f.file_name().map(str::to_string)),
            );
        }

        info!("signing release file");
        self.remote.run(host, &dir, "dpkg-scanpackages -m . > Packages")?;
        self.remote.run(host, &dir, "apt-ftparchive release . > Release")?;
        self.remote.run(
            host,
            &dir,
            &format!(
                "gpg -u {} --yes --output Release.gpg -ba Release",
                quote(&self.repository.signing_key)
            ),
        )?;
        report.signed = true;
        Ok(report)
    }
}

impl<R: RemoteShell> PackagePublisher for AptPublisher<R> {
    #[instrument(skip(self))]
    fn clean(&self) -> PublishResult<()> {
        shell::run_template(&self.commands.distclean, &Vars::new(), &self.root)?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn build(&self) -> PublishResult<()> {
        shell::run_template(&self.commands.build, &Vars::new(), &self.root)?;
        info!("package built");
        Ok(())
    }

    #[instrument(skip(self))]
    fn package_names(&self) -> PublishResult<Vec<String>> {
        let output = shell::run_template(&self.commands.package_list, &Vars::new(), &self.root)?;
        let names: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        debug!(?names, "listed packages");
        Ok(names)
    }

    #[instrument(skip(self, packages), fields(%distribution, role = %self.repository.role))]
    fn upload(
        &self,
        distribution: Distribution,
        packages: &[String],
    ) -> PublishResult<Vec<UploadReport>> {
        let hosts = self.inventory.require_hosts(&self.repository.role)?;
        let artifacts = packages
            .iter()
            .map(|p| Ok((p.clone(), self.local_artifacts(p)?)))
            .collect::<PublishResult<Vec<_>>>()?;

        hosts
            .iter()
            .map(|host| self.publish_to_host(host, distribution, &artifacts))
            .collect()
    }
}
