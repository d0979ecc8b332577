/*
 * This file is part of edeploy-hook.
 *
 * Copyright (C) 2025 edeploy-hook contributors
 *
 * edeploy-hook is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * edeploy-hook is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with edeploy-hook. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface
//!
//! Runs the hook on a request read from a file or stdin, plus a couple of
//! inspection commands for catalog authors.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edeploy_hook::{
    load_config, match_spec, Bindings, DirectoryCatalog, DiscoveryHook, FactStore, FileLock,
    HookConfig, LockGuard, NodeInfo, Pattern, Quota,
};

#[derive(Parser)]
#[command(name = "edeploy-hook")]
#[command(version)]
#[command(about = "eDeploy pre-discovery hook")]
#[command(long_about = "eDeploy pre-discovery hook

Extracts node attributes from inspection ramdisk data and resolves the
hardware profile from an eDeploy catalog.

EXAMPLES:
    edeploy-hook process request.json          Process a request file
    edeploy-hook process < request.json        Process a request from stdin
    edeploy-hook match 'disk,*,size,$gb' request.json
    edeploy-hook catalog list                  Show profiles and quotas

ENVIRONMENT VARIABLES:
    EDEPLOY_LOG=debug              Log filter (default: info)
    EDEPLOY_CONFIG=<file>          Hook configuration file
    EDEPLOY_LOCKNAME=<path>        Catalog lock file
    EDEPLOY_CONFIGDIR=<dir>        Catalog directory

FILES:
    /etc/edeploy/hook.json         Hook configuration
    /etc/edeploy/state             Profile order and quotas
    /etc/edeploy/<profile>.specs   Profile patterns
    /var/lock/discoverd.lock       Catalog lock")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Hook configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pre-discovery hook and print the processed request
    Process {
        /// Request JSON file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Extract one pattern from a request's facts and print the bindings
    Match {
        /// Comma-separated tokens, e.g. network,$iface,serial,$mac
        pattern: String,
        /// Request JSON file (stdin when omitted)
        input: Option<PathBuf>,
    },

    /// Profile catalog inspection
    #[command(subcommand)]
    Catalog(CatalogCommands),
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List profiles in priority order with their remaining quota
    List,
}

// ============================================================================
// CLI Execution
// ============================================================================

pub fn run_cli(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).context("loading hook configuration")?;

    match &cli.command {
        Commands::Process { input } => cmd_process(&config, input.as_deref()),
        Commands::Match { pattern, input } => cmd_match(pattern, input.as_deref()),
        Commands::Catalog(CatalogCommands::List) => cmd_catalog_list(&config),
    }
}

fn read_request(input: Option<&Path>) -> Result<NodeInfo> {
    let raw = match input {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf).context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing discovery request")
}

fn cmd_process(config: &HookConfig, input: Option<&Path>) -> Result<()> {
    let node = read_request(input)?;
    let hook = DiscoveryHook::from_config(config);
    let node = hook.process(node)?;
    println!("{}", serde_json::to_string_pretty(&node)?);
    Ok(())
}

fn cmd_match(pattern: &str, input: Option<&Path>) -> Result<()> {
    let pattern = Pattern::parse_cli(pattern)?;
    let node = read_request(input)?;
    let facts = node.data.ok_or(edeploy_hook::DiscoveryError::MissingData)?;

    let mut working = FactStore::new(facts).working_set();
    let mut bindings = Bindings::new();
    if !match_spec(&pattern, &mut working, &mut bindings) {
        anyhow::bail!("no fact matches {}", pattern);
    }
    println!("{}", serde_json::to_string_pretty(&bindings)?);
    Ok(())
}

fn cmd_catalog_list(config: &HookConfig) -> Result<()> {
    let lock = FileLock::new(&config.lockname);
    let guard = LockGuard::acquire(&lock).context("acquiring catalog lock")?;
    let catalog = DirectoryCatalog::load(&config.configdir);
    guard.release()?;
    let catalog = catalog?;

    println!("Profiles in {} ({}):", catalog.dir().display(), catalog.entries().len());
    for entry in catalog.entries() {
        let quota = match entry.quota() {
            Quota::Unlimited => "unlimited".to_string(),
            Quota::Remaining(n) => format!("{} remaining", n),
        };
        println!("  {:<24} {}", entry.name(), quota);
    }
    Ok(())
}
