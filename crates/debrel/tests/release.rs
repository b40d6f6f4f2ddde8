//! Release workflow tests against a throwaway git repository.
//!
//! Each project gets a bare `origin` next to it. Build and changelog
//! commands are replaced with shell stubs so only git is required.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PROJECT_CONFIG: &str = r#"
[commands]
distclean = "touch cleaned"
build = "true"
package_list = "echo hello"

[changelog]
new_version_cmd = '''printf 'hello (%s) trusty; urgency=low\n\n  * Release.\n\n -- Jane Doe <jane@example.com>  Tue, 03 Mar 2015 10:00:00 +0100\n\n' {version} | cat - debian/changelog > debian/changelog.new && mv debian/changelog.new debian/changelog'''

[repository]
role = "nowhere"

[inventory.roles]
nowhere = []
"#;

#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("DEBREL_LOG_DIR", std::env::temp_dir().join("debrel-cli-tests"))
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("debrel-cli-no-config"))
        .env_remove("RUST_LOG");
    cmd
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

struct Project {
    _tmp: TempDir,
    root: PathBuf,
    remote: PathBuf,
}

impl Project {
    /// Committed package at `version` for trusty, pushed to `origin/master`.
    fn new(version: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("work");
        let remote = tmp.path().join("origin.git");
        fs::create_dir(&root).unwrap();

        git(tmp.path(), &["init", "--quiet", "--bare", remote.to_str().unwrap()]);
        git(&root, &["init", "--quiet", "--initial-branch=master"]);
        git(&root, &["config", "user.email", "release@example.com"]);
        git(&root, &["config", "user.name", "Release Bot"]);
        git(&root, &["config", "tag.gpgSign", "false"]);
        git(&root, &["config", "commit.gpgSign", "false"]);

        fs::create_dir(root.join("debian")).unwrap();
        fs::write(
            root.join("debian/changelog"),
            format!(
                "hello ({version}) trusty; urgency=low\n\n  * Initial release.\n\n -- Jane Doe <jane@example.com>  Mon, 02 Mar 2015 10:00:00 +0100\n"
            ),
        )
        .unwrap();
        fs::write(root.join(".debrel.toml"), PROJECT_CONFIG).unwrap();

        git(&root, &["add", "-A"]);
        git(&root, &["commit", "--quiet", "-m", "initial"]);
        git(&root, &["remote", "add", "origin", remote.to_str().unwrap()]);
        git(&root, &["push", "--quiet", "origin", "HEAD:refs/heads/master"]);

        Self {
            _tmp: tmp,
            root,
            remote,
        }
    }

    fn tag(&self, name: &str) {
        git(&self.root, &["tag", name]);
    }

    fn debrel(&self) -> Command {
        let mut cmd = cmd();
        cmd.arg("-C").arg(&self.root);
        cmd
    }

    fn has_local_tag(&self, name: &str) -> bool {
        !git(&self.root, &["tag", "--list", name]).trim().is_empty()
    }

    fn remote_tags(&self) -> String {
        git(&self.remote, &["tag", "--list"])
    }

    fn cleaned(&self) -> bool {
        self.root.join("cleaned").exists()
    }

    fn changelog(&self) -> String {
        fs::read_to_string(self.root.join("debian/changelog")).unwrap()
    }
}

// =============================================================================
// has-tag
// =============================================================================

#[test]
fn has_tag_prints_true_and_false() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    project
        .debrel()
        .args(["has-tag", "1.0.0"])
        .assert()
        .success()
        .stdout("true\n");
    project
        .debrel()
        .args(["has-tag", "9.9.9"])
        .assert()
        .success()
        .stdout("false\n");
}

#[test]
fn has_tag_without_name_reports_any_tag() {
    let project = Project::new("1.0.0");
    project
        .debrel()
        .arg("has-tag")
        .assert()
        .success()
        .stdout("false\n");

    project.tag("1.0.0");
    fs::write(
        project.root.join("debian/changelog"),
        "hello (1.1.0) trusty; urgency=low\n\n  * Next.\n\n -- Jane Doe <jane@example.com>  Tue, 03 Mar 2015 10:00:00 +0100\n",
    )
    .unwrap();

    project
        .debrel()
        .arg("has-tag")
        .assert()
        .success()
        .stdout("true\n");

    let output = project
        .debrel()
        .args(["--json", "has-tag"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["exists"], true);
    assert!(json.get("tag").is_none());
}

// =============================================================================
// Version resolution
// =============================================================================

#[test]
fn new_rejects_malformed_version() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    project
        .debrel()
        .args(["new", "one.two", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not Semantic Versioning"));
    assert!(!project.cleaned());
}

#[test]
fn new_rejects_released_version_before_cleaning() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    project
        .debrel()
        .args(["new", "1.0.0", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("version '1.0.0' already exists"));
    assert!(!project.cleaned());
}

#[test]
fn new_without_version_requires_one_once_tagged() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    project
        .debrel()
        .args(["new", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("you must specify a new version"));
}

#[test]
fn bump_without_tags_points_to_first_release() {
    let project = Project::new("0.1.0");

    project
        .debrel()
        .args(["patch", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("debrel new"));
    assert!(!project.cleaned());
}

#[test]
fn new_rejects_regression_without_tagging() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    project
        .debrel()
        .args(["new", "0.9.0", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "precedes last released version '1.0.0'",
        ));
    assert!(!project.has_local_tag("0.9.0"));
    assert!(project.changelog().starts_with("hello (1.0.0)"));
}

#[test]
fn upstream_managed_package_is_refused() {
    let project = Project::new("1.0.0");
    git(
        &project.root,
        &["push", "--quiet", "origin", "HEAD:refs/heads/pristine-tar"],
    );

    project
        .debrel()
        .args(["new", "1.0.0", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only native packages"));
}

// =============================================================================
// Confirmation
// =============================================================================

#[test]
fn declined_release_removes_tag_and_pushes_nothing() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    // No terminal on stdin, so the prompt counts as a decline.
    project
        .debrel()
        .arg("minor")
        .assert()
        .failure()
        .stdout(predicate::str::contains("hello"))
        .stderr(predicate::str::contains("cancelled"));

    assert!(project.cleaned());
    assert!(project.changelog().starts_with("hello (1.1.0) trusty"));
    assert!(!project.has_local_tag("1.1.0"));
    assert!(!project.remote_tags().contains("1.1.0"));
}

#[test]
fn confirmed_release_pushes_before_uploading() {
    let project = Project::new("1.0.0");
    project.tag("1.0.0");

    // The repository role has no hosts, so the upload step is where it stops.
    project
        .debrel()
        .args(["patch", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("role 'nowhere' has no hosts"));

    assert!(project.has_local_tag("1.0.1"));
    assert!(project.remote_tags().contains("1.0.1"));
    let log = git(&project.root, &["log", "-1", "--format=%s"]);
    assert_eq!(log.trim(), "Update changelog for 1.0.1 release.");
}

#[test]
fn level_override_sets_component() {
    let project = Project::new("1.4.2");
    project.tag("1.4.2");

    project
        .debrel()
        .args(["major", "7", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no hosts"));

    assert!(project.has_local_tag("7.0.0"));
}
