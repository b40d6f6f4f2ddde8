//! Server inventory: role names resolved to host lists.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};

/// Prefix marking a role include inside a host list.
const INCLUDE_PREFIX: char = '@';

/// Role to host mapping, read-only after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    roles: BTreeMap<String, Vec<String>>,
}

impl Inventory {
    /// Build an inventory from its config section.
    pub fn from_config(config: &InventoryConfig) -> Self {
        Self {
            roles: config.roles.clone(),
        }
    }

    /// Defined role names, sorted.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// Resolve `role` to its hosts.
    ///
    /// `@other` entries expand to the hosts of `other`, recursively. Hosts
    /// keep first-seen order and appear once. An empty result is not an
    /// error here; see [`Inventory::require_hosts`].
    pub fn hosts(&self, role: &str) -> InventoryResult<Vec<String>> {
        let mut hosts = Vec::new();
        let mut stack = Vec::new();
        self.expand(role, &mut stack, &mut hosts)?;
        debug!(role, count = hosts.len(), "resolved role hosts");
        Ok(hosts)
    }

    /// Resolve `role`, failing when it has no hosts.
    pub fn require_hosts(&self, role: &str) -> InventoryResult<Vec<String>> {
        let hosts = self.hosts(role)?;
        if hosts.is_empty() {
            return Err(InventoryError::EmptyRole(role.to_string()));
        }
        Ok(hosts)
    }

    fn expand<'a>(
        &'a self,
        role: &'a str,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<String>,
    ) -> InventoryResult<()> {
        if stack.contains(&role) {
            return Err(InventoryError::IncludeCycle(role.to_string()));
        }
        let entries = self
            .roles
            .get(role)
            .ok_or_else(|| InventoryError::UnknownRole(role.to_string()))?;

        stack.push(role);
        for entry in entries {
            if let Some(included) = entry.strip_prefix(INCLUDE_PREFIX) {
                self.expand(included, stack, out)?;
            } else if !out.contains(entry) {
                out.push(entry.clone());
            }
        }
        stack.pop();
        Ok(())
    }
}
