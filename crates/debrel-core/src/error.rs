//! Error types shared by the configuration layer.

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors resolving hosts from the server inventory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The role is not defined in `[inventory.roles]`.
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    /// Role includes loop back on themselves.
    #[error("role '{0}' includes itself")]
    IncludeCycle(String),

    /// The role resolved to no hosts at all.
    #[error("role '{0}' has no hosts")]
    EmptyRole(String),
}

/// Result type alias using [`InventoryError`].
pub type InventoryResult<T> = Result<T, InventoryError>;
