//! Hosts command: show how inventory roles resolve.

use std::collections::BTreeMap;

use owo_colors::OwoColorize;
use tracing::instrument;

use debrel_core::inventory::Inventory;

use super::Context;

/// List every role with its resolved hosts.
#[instrument(name = "cmd_hosts", skip_all)]
pub fn cmd_hosts(ctx: &Context<'_>) -> anyhow::Result<()> {
    let resolved = resolve_all(&ctx.inventory())?;

    if ctx.json {
        return super::print_json(&resolved);
    }

    let repository_role = ctx.config.repository.role.as_str();
    for (role, hosts) in &resolved {
        let marker = if role == repository_role {
            format!(" {}", "(repository)".dimmed())
        } else {
            String::new()
        };
        println!("{}{marker}", role.bold());
        if hosts.is_empty() {
            println!("  {}", "no hosts".yellow());
        }
        for host in hosts {
            println!("  {} {}", "•".dimmed(), host.cyan());
        }
    }
    Ok(())
}

fn resolve_all(inventory: &Inventory) -> anyhow::Result<BTreeMap<String, Vec<String>>> {
    inventory
        .roles()
        .map(|role| Ok((role.to_string(), inventory.hosts(role)?)))
        .collect()
}
