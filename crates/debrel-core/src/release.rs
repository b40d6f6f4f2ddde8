//! Release coordinator: derive, validate, tag, build, confirm, push, upload.
//!
//! # Workflow
//!
//! [`ReleaseCoordinator::release_new`] drives one release:
//!
//! 1. fetch remote refs
//! 2. read the target distribution from the changelog
//! 3. resolve the version (explicit, or the changelog's on a first release)
//! 4. refuse a version whose tag already exists
//! 5. distclean
//! 6. record the version in the changelog (explicit version, tags exist)
//! 7. tag it locally if not tagged yet
//! 8. build
//! 9. confirm through the [`ReleaseObserver`], then push and upload
//!
//! Declining at step 9 deletes the freshly created tag. The bump helpers
//! ([`ReleaseCoordinator::release_bump`]) compute the next version from the
//! changelog and then run the same workflow.
//!
//! All collaborators are traits, so the decision logic runs against fakes
//! in tests.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::changelog::{ChangelogError, ChangelogStore};
use crate::git::{GitError, VcsGateway};
use crate::publish::{
    Distribution, PackagePublisher, PublishError, UnsupportedDistribution, UploadReport,
};
use crate::shell::ShellError;
use crate::version::{BumpLevel, BumpOverflow, SemanticVersion, VersionParseError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// A failing external tool, kept with its original error.
#[derive(Error, Debug)]
pub enum ExternalFailure {
    /// `git` failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// A configured command failed.
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Build or upload failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The explicit version does not follow semantic versioning.
    #[error("the version specified '{}' is not Semantic Versioning", .0.input)]
    InvalidVersionFormat(#[source] VersionParseError),

    /// Tags exist but no version was given.
    #[error("you must specify a new version")]
    MissingVersionArgument,

    /// The requested version is already tagged.
    #[error("version '{version}' already exists")]
    VersionAlreadyReleased {
        /// The requested version.
        version: SemanticVersion,
    },

    /// A bump was requested but nothing has been released yet.
    #[error("no release yet, use `debrel new` for the first release")]
    NoPriorRelease,

    /// The requested version does not exceed the changelog's.
    #[error("new version '{requested}' precedes last released version '{last}'")]
    VersionRegression {
        /// The requested version.
        requested: SemanticVersion,
        /// Last version in the changelog.
        last: SemanticVersion,
    },

    /// The bumped component cannot be incremented.
    #[error(transparent)]
    BumpOverflow(#[from] BumpOverflow),

    /// The changelog names a distribution outside the supported set.
    #[error(transparent)]
    UnsupportedDistribution(#[from] UnsupportedDistribution),

    /// An external tool returned non-zero.
    #[error(transparent)]
    ExternalCommandFailure(ExternalFailure),

    /// The user declined the confirmation prompt.
    #[error("pushing is cancelled, release {version} aborted")]
    ReleaseCancelled {
        /// The version that was not pushed.
        version: SemanticVersion,
    },

    /// The remote has a `pristine-tar` branch; only native packages are released.
    #[error("package has an upstream source (pristine-tar branch), only native packages are released")]
    UpstreamManaged,

    /// The changelog could not be read or parsed.
    #[error(transparent)]
    Changelog(ChangelogError),
}

impl ReleaseError {
    /// Whether the user chose to stop, as opposed to a failure.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::ReleaseCancelled { .. })
    }
}

impl From<GitError> for ReleaseError {
    fn from(err: GitError) -> Self {
        Self::ExternalCommandFailure(err.into())
    }
}

impl From<PublishError> for ReleaseError {
    fn from(err: PublishError) -> Self {
        Self::ExternalCommandFailure(err.into())
    }
}

impl From<ChangelogError> for ReleaseError {
    fn from(err: ChangelogError) -> Self {
        match err {
            ChangelogError::Command(shell) => Self::ExternalCommandFailure(shell.into()),
            other => Self::Changelog(other),
        }
    }
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Requests, events and outcomes
// ──────────────────────────────────────────────

/// What the user asked to release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseRequest {
    /// `new [VERSION]`; `None` is a first release from the changelog.
    Explicit(Option<String>),
    /// `major|minor|patch [LEVEL]`.
    Bump {
        /// Component to bump.
        level: BumpLevel,
        /// Value for the component instead of `+1`.
        level_override: Option<u64>,
    },
}

/// Workflow steps reported through [`ReleaseEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStep {
    /// Refresh remote refs.
    Fetch,
    /// Remove previous build products.
    Clean,
    /// Record the version in the changelog.
    Changelog,
    /// Create the local tag.
    Tag,
    /// Build the packages.
    Build,
    /// Push branch and tags.
    Push,
    /// Upload to the APT repository.
    Upload,
}

impl fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Clean => "clean",
            Self::Changelog => "changelog",
            Self::Tag => "tag",
            Self::Build => "build",
            Self::Push => "push",
            Self::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Progress notifications for the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseEvent {
    /// A bump read the last released version.
    LastReleased(SemanticVersion),
    /// Target version and distribution are known.
    Resolved {
        /// Version being released.
        version: SemanticVersion,
        /// Target distribution.
        distribution: Distribution,
    },
    /// A step began.
    StepStarted(ReleaseStep),
    /// A step finished successfully.
    StepFinished(ReleaseStep),
    /// A step was not needed.
    StepSkipped(ReleaseStep),
    /// The local tag was removed after a cancel.
    TagDeleted(String),
}

/// Shown to the user before anything leaves the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseSummary {
    /// Binary packages about to be published.
    pub packages: Vec<String>,
    /// Version being released.
    pub version: SemanticVersion,
    /// Target distribution.
    pub distribution: Distribution,
}

/// Result of a completed release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseOutcome {
    /// Released version.
    pub version: SemanticVersion,
    /// Target distribution.
    pub distribution: Distribution,
    /// Whether this run created the tag.
    pub tag_created: bool,
    /// Whether this run added a changelog entry.
    pub changelog_updated: bool,
    /// Published packages.
    pub packages: Vec<String>,
    /// Per-host upload results.
    pub uploads: Vec<UploadReport>,
}

/// Receives progress and answers the final confirmation.
pub trait ReleaseObserver {
    /// Called at step boundaries.
    fn event(&mut self, _event: &ReleaseEvent) {}

    /// Return `true` to push and upload.
    fn confirm(&mut self, summary: &ReleaseSummary) -> bool;
}

/// Observer that accepts every release without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl ReleaseObserver for AutoConfirm {
    fn confirm(&mut self, _summary: &ReleaseSummary) -> bool {
        true
    }
}

// ──────────────────────────────────────────────
// Coordinator
// ──────────────────────────────────────────────

/// Fail when the package is managed from an upstream tarball.
#[instrument(skip(vcs))]
pub fn ensure_native_package(vcs: &dyn VcsGateway) -> ReleaseResult<()> {
    if vcs.has_upstream_branch()? {
        return Err(ReleaseError::UpstreamManaged);
    }
    Ok(())
}

/// Runs releases against injected collaborators.
pub struct ReleaseCoordinator<'a> {
    vcs: &'a dyn VcsGateway,
    changelog: &'a dyn ChangelogStore,
    publisher: &'a dyn PackagePublisher,
    fetch_all: bool,
}

impl fmt::Debug for ReleaseCoordinator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseCoordinator")
            .field("fetch_all", &self.fetch_all)
            .finish_non_exhaustive()
    }
}

impl<'a> ReleaseCoordinator<'a> {
    /// Coordinator over the given gateway, changelog and publisher.
    pub fn new(
        vcs: &'a dyn VcsGateway,
        changelog: &'a dyn ChangelogStore,
        publisher: &'a dyn PackagePublisher,
    ) -> Self {
        Self {
            vcs,
            changelog,
            publisher,
            fetch_all: false,
        }
    }

    /// Fetch every remote instead of only the release remote.
    #[must_use]
    pub const fn with_fetch_all(mut self, fetch_all: bool) -> Self {
        self.fetch_all = fetch_all;
        self
    }

    /// Dispatch a [`ReleaseRequest`].
    pub fn run(
        &self,
        request: ReleaseRequest,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        match request {
            ReleaseRequest::Explicit(version) => self.release_new(version.as_deref(), observer),
            ReleaseRequest::Bump {
                level,
                level_override,
            } => self.release_bump(level, level_override, observer),
        }
    }

    /// Release `explicit_version`, or the changelog's version on a first release.
    #[instrument(skip(self, observer))]
    pub fn release_new(
        &self,
        explicit_version: Option<&str>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        ensure_native_package(self.vcs)?;
        self.execute(explicit_version, observer)
    }

    /// Release the next `level` version after the changelog's last one.
    #[instrument(skip(self, observer))]
    pub fn release_bump(
        &self,
        level: BumpLevel,
        level_override: Option<u64>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        ensure_native_package(self.vcs)?;
        if !self.vcs.has_any_tag()? {
            return Err(ReleaseError::NoPriorRelease);
        }

        let last = self.changelog.last_version()?;
        info!(%last, "last released version");
        observer.event(&ReleaseEvent::LastReleased(last.clone()));

        let next = last.bump(level, level_override)?;
        debug!(%next, "computed bump");
        self.execute(Some(&next.to_string()), observer)
    }

    /// Shorthand for a major bump.
    pub fn release_major(
        &self,
        level_override: Option<u64>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        self.release_bump(BumpLevel::Major, level_override, observer)
    }

    /// Shorthand for a minor bump.
    pub fn release_minor(
        &self,
        level_override: Option<u64>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        self.release_bump(BumpLevel::Minor, level_override, observer)
    }

    /// Shorthand for a patch bump.
    pub fn release_patch(
        &self,
        level_override: Option<u64>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        self.release_bump(BumpLevel::Patch, level_override, observer)
    }

    fn execute(
        &self,
        explicit_version: Option<&str>,
        observer: &mut dyn ReleaseObserver,
    ) -> ReleaseResult<ReleaseOutcome> {
        observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Fetch));
        self.vcs.fetch(self.fetch_all)?;
        observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Fetch));

        let distribution: Distribution = self.changelog.distribution()?.parse()?;

        let any_tag = self.vcs.has_any_tag()?;
        let version = match explicit_version {
            Some(raw) => raw
                .parse::<SemanticVersion>()
                .map_err(ReleaseError::InvalidVersionFormat)?,
            None if any_tag => return Err(ReleaseError::MissingVersionArgument),
            None => self.changelog.last_version()?,
        };
        info!(%version, %distribution, "releasing a new package");
        observer.event(&ReleaseEvent::Resolved {
            version: version.clone(),
            distribution,
        });

        let tag = version.to_string();
        if explicit_version.is_some() && self.vcs.has_tag(&tag)? {
            return Err(ReleaseError::VersionAlreadyReleased { version });
        }

        observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Clean));
        self.publisher.clean()?;
        observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Clean));

        let changelog_updated = explicit_version.is_some() && any_tag;
        if changelog_updated {
            observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Changelog));
            let last = self.changelog.last_version()?;
            if version <= last {
                return Err(ReleaseError::VersionRegression {
                    requested: version,
                    last,
                });
            }
            self.changelog.append_release(&version)?;
            observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Changelog));
        } else {
            observer.event(&ReleaseEvent::StepSkipped(ReleaseStep::Changelog));
        }

        let tag_created = !self.vcs.has_tag(&tag)?;
        if tag_created {
            observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Tag));
            self.vcs.create_tag(&tag)?;
            observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Tag));
        } else {
            observer.event(&ReleaseEvent::StepSkipped(ReleaseStep::Tag));
        }

        observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Build));
        self.publisher.build()?;
        observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Build));

        let packages = self.publisher.package_names()?;
        let summary = ReleaseSummary {
            packages,
            version,
            distribution,
        };

        if !observer.confirm(&summary) {
            if tag_created {
                self.discard_tag(&tag, observer);
            }
            return Err(ReleaseError::ReleaseCancelled {
                version: summary.version,
            });
        }

        observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Push));
        self.vcs.push()?;
        observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Push));

        observer.event(&ReleaseEvent::StepStarted(ReleaseStep::Upload));
        let uploads = self.publisher.upload(distribution, &summary.packages)?;
        observer.event(&ReleaseEvent::StepFinished(ReleaseStep::Upload));

        info!(version = %summary.version, hosts = uploads.len(), "release published");
        Ok(ReleaseOutcome {
            version: summary.version,
            distribution,
            tag_created,
            changelog_updated,
            packages: summary.packages,
            uploads,
        })
    }

    /// Best-effort removal of a tag the user chose not to push.
    fn discard_tag(&self, tag: &str, observer: &mut dyn ReleaseObserver) {
        match self.vcs.delete_tag(tag) {
            Ok(()) => {
                info!(%tag, "deleted local tag");
                observer.event(&ReleaseEvent::TagDeleted(tag.to_string()));
            }
            Err(e) => warn!(%tag, error = %e, "failed to delete local tag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::changelog::{ChangelogEntry, ChangelogResult};
    use crate::git::GitResult;
    use crate::publish::PublishResult;

    /// One fake standing in for git, changelog and publisher, sharing a call log.
    struct World {
        tags: RefCell<Vec<String>>,
        changelog_version: RefCell<String>,
        distribution: String,
        upstream: bool,
        fail_delete: bool,
        fail_build: bool,
        log: RefCell<Vec<String>>,
    }

    impl World {
        fn new(tags: &[&str], changelog_version: &str) -> Self {
            Self {
                tags: RefCell::new(tags.iter().map(|t| (*t).to_string()).collect()),
                changelog_version: RefCell::new(changelog_version.to_string()),
                distribution: "trusty".to_string(),
                upstream: false,
                fail_delete: false,
                fail_build: false,
                log: RefCell::new(Vec::new()),
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.log.borrow_mut().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.log.borrow().clone()
        }

        fn called(&self, prefix: &str) -> bool {
            self.log.borrow().iter().any(|c| c.starts_with(prefix))
        }

        fn coordinator(&self) -> ReleaseCoordinator<'_> {
            ReleaseCoordinator::new(self, self, self)
        }
    }

    fn failed(command: &str) -> ShellError {
        ShellError::Failed {
            command: command.to_string(),
            exit_code: Some(1),
            stderr: "boom".to_string(),
        }
    }

    impl VcsGateway for World {
        fn fetch(&self, all_remotes: bool) -> GitResult<()> {
            self.record(format!("fetch all={all_remotes}"));
            Ok(())
        }

        fn has_any_tag(&self) -> GitResult<bool> {
            Ok(!self.tags.borrow().is_empty())
        }

        fn has_tag(&self, name: &str) -> GitResult<bool> {
            Ok(self.tags.borrow().iter().any(|t| t == name))
        }

        fn create_tag(&self, name: &str) -> GitResult<()> {
            self.record(format!("create_tag {name}"));
            self.tags.borrow_mut().push(name.to_string());
            Ok(())
        }

        fn delete_tag(&self, name: &str) -> GitResult<()> {
            self.record(format!("delete_tag {name}"));
            if self.fail_delete {
                return Err(GitError::Command {
                    command: "tag".to_string(),
                    stderr: "locked".to_string(),
                });
            }
            self.tags.borrow_mut().retain(|t| t != name);
            Ok(())
        }

        fn push(&self) -> GitResult<()> {
            self.record("push");
            Ok(())
        }

        fn has_upstream_branch(&self) -> GitResult<bool> {
            Ok(self.upstream)
        }
    }

    impl ChangelogStore for World {
        fn top_entry(&self) -> ChangelogResult<ChangelogEntry> {
            Ok(ChangelogEntry {
                package: "hello".to_string(),
                version: self.changelog_version.borrow().clone(),
                distribution: self.distribution.clone(),
                urgency: Some("low".to_string()),
                author: None,
                timestamp: None,
            })
        }

        fn append_release(&self, version: &SemanticVersion) -> ChangelogResult<()> {
            self.record(format!("changelog {version}"));
            *self.changelog_version.borrow_mut() = version.to_string();
            Ok(())
        }
    }

    impl PackagePublisher for World {
        fn clean(&self) -> PublishResult<()> {
            self.record("clean");
            Ok(())
        }

        fn build(&self) -> PublishResult<()> {
            self.record("build");
            if self.fail_build {
                return Err(failed("gbp buildpackage").into());
            }
            Ok(())
        }

        fn package_names(&self) -> PublishResult<Vec<String>> {
            Ok(vec!["hello".to_string(), "hello-doc".to_string()])
        }

        fn upload(
            &self,
            distribution: Distribution,
            packages: &[String],
        ) -> PublishResult<Vec<UploadReport>> {
            self.record(format!("upload {distribution} {}", packages.join(",")));
            Ok(vec![UploadReport {
                host: "apt.example.com".to_string(),
                pruned: Vec::new(),
                uploaded: packages.to_vec(),
                signed: true,
            }])
        }
    }

    /// Observer answering the prompt with a fixed value and keeping what it saw.
    struct Scripted {
        answer: bool,
        summaries: Vec<ReleaseSummary>,
        events: Vec<ReleaseEvent>,
    }

    impl Scripted {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                summaries: Vec::new(),
                events: Vec::new(),
            }
        }
    }

    impl ReleaseObserver for Scripted {
        fn event(&mut self, event: &ReleaseEvent) {
            self.events.push(event.clone());
        }

        fn confirm(&mut self, summary: &ReleaseSummary) -> bool {
            self.summaries.push(summary.clone());
            self.answer
        }
    }

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    #[test]
    fn explicit_release_runs_full_sequence() {
        let world = World::new(&["1.0.0"], "1.0.0");
        let mut observer = Scripted::answering(true);

        let outcome = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut observer)
            .unwrap();

        assert_eq!(
            world.calls(),
            [
                "fetch all=false",
                "clean",
                "changelog 1.1.0",
                "create_tag 1.1.0",
                "build",
                "push",
                "upload trusty hello,hello-doc",
            ]
        );
        assert_eq!(outcome.version, v("1.1.0"));
        assert_eq!(outcome.distribution, Distribution::Trusty);
        assert!(outcome.tag_created);
        assert!(outcome.changelog_updated);
        assert_eq!(outcome.uploads.len(), 1);

        let summary = &observer.summaries[0];
        assert_eq!(summary.packages, ["hello", "hello-doc"]);
        assert_eq!(summary.version, v("1.1.0"));
        assert_eq!(summary.distribution, Distribution::Trusty);
    }

    #[test]
    fn missing_version_with_existing_tags() {
        let world = World::new(&["1.0.0"], "1.0.0");
        let err = world
            .coordinator()
            .release_new(None, &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::MissingVersionArgument));
        assert!(!world.called("clean"));
    }

    #[test]
    fn first_release_uses_changelog_version() {
        let world = World::new(&[], "0.1.0");
        let outcome = world
            .coordinator()
            .release_new(None, &mut Scripted::answering(true))
            .unwrap();

        assert_eq!(outcome.version, v("0.1.0"));
        assert!(!outcome.changelog_updated);
        assert!(!world.called("changelog"));
        assert!(world.called("create_tag 0.1.0"));
    }

    #[test]
    fn explicit_version_without_tags_skips_changelog() {
        let world = World::new(&[], "0.1.0");
        let outcome = world
            .coordinator()
            .release_new(Some("0.2.0"), &mut Scripted::answering(true))
            .unwrap();

        assert!(!outcome.changelog_updated);
        assert!(!world.called("changelog"));
        assert!(world.called("create_tag 0.2.0"));
    }

    #[test]
    fn invalid_explicit_version() {
        let world = World::new(&[], "0.1.0");
        let err = world
            .coordinator()
            .release_new(Some("1.0"), &mut Scripted::answering(true))
            .unwrap_err();
        match err {
            ReleaseError::InvalidVersionFormat(e) => assert_eq!(e.input, "1.0"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!world.called("clean"));
    }

    #[test]
    fn already_released_before_any_mutation() {
        let world = World::new(&["1.0.0", "1.1.0"], "1.1.0");
        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut Scripted::answering(true))
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::VersionAlreadyReleased { ref version } if *version == v("1.1.0")
        ));
        assert_eq!(world.calls(), ["fetch all=false"]);
    }

    #[test]
    fn regression_against_changelog_is_refused() {
        let world = World::new(&["1.0.0"], "1.5.0");
        let err = world
            .coordinator()
            .release_new(Some("1.2.0"), &mut Scripted::answering(true))
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::VersionRegression { ref requested, ref last }
                if *requested == v("1.2.0") && *last == v("1.5.0")
        ));
        assert!(!world.called("changelog"));
        assert!(!world.called("create_tag"));
    }

    #[test]
    fn equal_to_changelog_is_a_regression() {
        let world = World::new(&["1.0.0"], "1.5.0");
        let err = world
            .coordinator()
            .release_new(Some("1.5.0+rebuild"), &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::VersionRegression { .. }));
    }

    #[test]
    fn unsupported_distribution_fails_before_mutation() {
        let mut world = World::new(&["1.0.0"], "1.0.0");
        world.distribution = "jessie".to_string();
        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut Scripted::answering(true))
            .unwrap_err();

        assert!(matches!(err, ReleaseError::UnsupportedDistribution(_)));
        assert_eq!(world.calls(), ["fetch all=false"]);
    }

    #[test]
    fn cancel_deletes_the_new_tag_and_skips_push_and_upload() {
        let world = World::new(&["1.0.0"], "1.0.0");
        let mut observer = Scripted::answering(false);

        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut observer)
            .unwrap_err();

        assert!(err.is_cancellation());
        assert!(matches!(
            err,
            ReleaseError::ReleaseCancelled { ref version } if *version == v("1.1.0")
        ));
        assert!(world.called("delete_tag 1.1.0"));
        assert!(!world.called("push"));
        assert!(!world.called("upload"));
        assert_eq!(*world.tags.borrow(), ["1.0.0"]);
        assert!(
            observer
                .events
                .contains(&ReleaseEvent::TagDeleted("1.1.0".to_string()))
        );
    }

    #[test]
    fn cancel_survives_tag_deletion_failure() {
        let mut world = World::new(&["1.0.0"], "1.0.0");
        world.fail_delete = true;

        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut Scripted::answering(false))
            .unwrap_err();

        assert!(err.is_cancellation());
        assert!(world.called("delete_tag 1.1.0"));
        assert!(!world.called("push"));
    }

    #[test]
    fn build_failure_keeps_tag_and_stops() {
        let mut world = World::new(&["1.0.0"], "1.0.0");
        world.fail_build = true;

        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut Scripted::answering(true))
            .unwrap_err();

        assert!(matches!(
            err,
            ReleaseError::ExternalCommandFailure(ExternalFailure::Publish(_))
        ));
        assert!(!err.is_cancellation());
        assert!(!world.called("push"));
    }

    #[test]
    fn upstream_managed_package_is_refused() {
        let mut world = World::new(&["1.0.0"], "1.0.0");
        world.upstream = true;

        let err = world
            .coordinator()
            .release_new(Some("1.1.0"), &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::UpstreamManaged));
        assert!(world.calls().is_empty());

        let err = world
            .coordinator()
            .release_patch(None, &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::UpstreamManaged));
    }

    #[test]
    fn major_with_level_override() {
        let world = World::new(&["1.5.3"], "1.5.3");
        let outcome = world
            .coordinator()
            .release_major(Some(2), &mut Scripted::answering(true))
            .unwrap();

        assert_eq!(outcome.version, v("2.0.0"));
        assert!(world.called("create_tag 2.0.0"));
    }

    #[test]
    fn bump_levels_without_override() {
        for (level, expected) in [
            (BumpLevel::Major, "2.0.0"),
            (BumpLevel::Minor, "1.6.0"),
            (BumpLevel::Patch, "1.5.4"),
        ] {
            let world = World::new(&["1.5.3"], "1.5.3");
            let mut observer = Scripted::answering(true);
            let outcome = world
                .coordinator()
                .release_bump(level, None, &mut observer)
                .unwrap();

            assert_eq!(outcome.version, v(expected), "{level} bump");
            assert!(world.called(&format!("changelog {expected}")));
            assert_eq!(observer.events[0], ReleaseEvent::LastReleased(v("1.5.3")));
        }
    }

    #[test]
    fn bump_without_tags_is_no_prior_release() {
        let world = World::new(&[], "0.1.0");
        let err = world
            .coordinator()
            .release_minor(None, &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NoPriorRelease));
        assert!(world.calls().is_empty());
    }

    #[test]
    fn bump_past_component_maximum_fails_before_fetch() {
        let world = World::new(&["1.2.18446744073709551615"], "1.2.18446744073709551615");
        let err = world
            .coordinator()
            .release_patch(None, &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::BumpOverflow(ref overflow) if overflow.level == BumpLevel::Patch
        ));
        assert!(world.calls().is_empty());
    }

    #[test]
    fn bump_to_existing_tag_is_already_released() {
        let world = World::new(&["1.5.3", "1.5.4"], "1.5.3");
        let err = world
            .coordinator()
            .release_patch(None, &mut Scripted::answering(true))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::VersionAlreadyReleased { .. }));
    }

    #[test]
    fn run_dispatches_requests() {
        let world = World::new(&["1.5.3"], "1.5.3");
        let outcome = world
            .coordinator()
            .run(
                ReleaseRequest::Bump {
                    level: BumpLevel::Minor,
                    level_override: Some(9),
                },
                &mut AutoConfirm,
            )
            .unwrap();
        assert_eq!(outcome.version, v("1.9.0"));
    }

    #[test]
    fn fetch_all_is_forwarded() {
        let world = World::new(&[], "0.1.0");
        world
            .coordinator()
            .with_fetch_all(true)
            .release_new(None, &mut AutoConfirm)
            .unwrap();
        assert_eq!(world.calls()[0], "fetch all=true");
    }

    #[test]
    fn events_follow_step_order() {
        let world = World::new(&["1.0.0"], "1.0.0");
        let mut observer = Scripted::answering(true);
        world
            .coordinator()
            .release_new(Some("1.0.1"), &mut observer)
            .unwrap();

        let started: Vec<ReleaseStep> = observer
            .events
            .iter()
            .filter_map(|e| match e {
                ReleaseEvent::StepStarted(step) => Some(*step),
                _ => None,
            })
            .collect();
        assert_eq!(
            started,
            [
                ReleaseStep::Fetch,
                ReleaseStep::Clean,
                ReleaseStep::Changelog,
                ReleaseStep::Tag,
                ReleaseStep::Build,
                ReleaseStep::Push,
                ReleaseStep::Upload,
            ]
        );
    }

    #[test]
    fn changelog_command_failure_is_external() {
        let err: ReleaseError = ChangelogError::Command(failed("gbp dch")).into();
        assert!(matches!(
            err,
            ReleaseError::ExternalCommandFailure(ExternalFailure::Shell(_))
        ));

        let err: ReleaseError = ChangelogError::Empty.into();
        assert!(matches!(err, ReleaseError::Changelog(_)));
    }
}
