//! Core library for debrel.
//!
//! This crate provides the release workflow for Debian packages kept in git,
//! used by the `debrel` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`changelog`] - Debian changelog parsing and release entries
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration and inventory error types
//! - [`git`] - Git operations for release workflows
//! - [`inventory`] - Role to host resolution
//! - [`publish`] - Package build and APT repository upload
//! - [`release`] - The release coordinator
//! - [`shell`] - External command execution
//! - [`version`] - Semantic versions and bumps
//!
//! # Quick Start
//!
//! ```no_run
//! use debrel_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Repository role: {}", config.repository.role);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod error;

pub mod git;

pub mod inventory;

pub mod publish;

pub mod release;

pub mod shell;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult, InventoryError, InventoryResult};

pub use release::{ReleaseCoordinator, ReleaseError, ReleaseOutcome, ReleaseRequest};

pub use version::{BumpLevel, SemanticVersion};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
