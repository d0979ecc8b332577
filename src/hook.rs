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

//! eDeploy pre-discovery hook
//!
//! Runs before any other processing of the ramdisk data:
//!
//! 1. reject requests without a `data` list
//! 2. pull the well-known attributes and the network interfaces out of a
//!    working copy of the facts
//! 3. resolve the hardware profile against the catalog, under the catalog
//!    lock, using the untouched facts
//! 4. drop `data`
//!
//! Profile resolution is best effort: its failures are logged and the
//! request still succeeds without a `profile`.

use std::fmt;
use std::path::PathBuf;

use edeploy_error::{DiscoveryError, Result};
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogLoader, DirectoryCatalogLoader};
use crate::config::HookConfig;
use crate::constants::attributes::{CPUS, CPU_ARCH, IPMI_ADDRESS, LOCAL_GB, MEMORY_MB, NO_IPV4};
use crate::facts::{FactStore, WorkingSet};
use crate::lock::{FileLock, LockGuard, LockProvider};
use crate::matcher::match_spec;
use crate::node::{Interface, NodeInfo};
use crate::pattern::{Bindings, Pattern, Token};

// ============================================================================
// Resolution Errors
// ============================================================================

/// Step of profile resolution that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    Lock,
    Load,
    Match,
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lock => write!(f, "acquiring catalog lock"),
            Self::Load => write!(f, "loading catalog"),
            Self::Match => write!(f, "matching profile"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage}: {source}")]
pub struct ResolutionError {
    pub stage: ResolutionStage,
    pub source: DiscoveryError,
}

impl ResolutionError {
    fn at(stage: ResolutionStage) -> impl FnOnce(DiscoveryError) -> Self {
        move |source| Self { stage, source }
    }
}

// ============================================================================
// Hook
// ============================================================================

pub struct DiscoveryHook {
    lock: Box<dyn LockProvider>,
    loader: Box<dyn CatalogLoader>,
    configdir: PathBuf,
}

impl DiscoveryHook {
    pub fn new(
        lock: Box<dyn LockProvider>,
        loader: Box<dyn CatalogLoader>,
        configdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lock,
            loader,
            configdir: configdir.into(),
        }
    }

    /// File lock and directory catalog at the configured locations
    pub fn from_config(config: &HookConfig) -> Self {
        Self::new(
            Box::new(FileLock::new(&config.lockname)),
            Box::new(DirectoryCatalogLoader),
            &config.configdir,
        )
    }

    /// Process the raw ramdisk data in place.
    ///
    /// Only a missing `data` field is an error, and it is raised before the
    /// request is modified.
    pub fn pre_discover(&self, node: &mut NodeInfo) -> Result<()> {
        let facts = node.data.as_ref().ok_or(DiscoveryError::MissingData)?;
        info!(facts = facts.len(), "pre-discover");
        debug!(data = ?facts, "Raw discovery data");

        let store = FactStore::new(facts.clone());
        let mut working = store.working_set();
        extract_attributes(&mut working, node);
        extract_interfaces(&mut working, node);

        match self.resolve_profile(&store) {
            Ok((profile, vars)) => {
                info!(profile = %profile, vars = vars.len(), "Hardware profile resolved");
                node.apply_profile(profile, vars);
            }
            Err(e) => error!("Unable to find a matching hardware profile: {}", e),
        }

        node.data = None;
        Ok(())
    }

    /// Owned variant of [`DiscoveryHook::pre_discover`]
    pub fn process(&self, mut node: NodeInfo) -> Result<NodeInfo> {
        self.pre_discover(&mut node)?;
        Ok(node)
    }

    /// Match the full fact set against the catalog while holding the lock.
    ///
    /// The lock is released before returning on every path.
    pub fn resolve_profile(
        &self,
        facts: &FactStore,
    ) -> std::result::Result<(String, Bindings), ResolutionError> {
        let guard = LockGuard::acquire(self.lock.as_ref()).map_err(ResolutionError::at(ResolutionStage::Lock))?;

        let outcome = self
            .loader
            .load(&self.configdir)
            .map_err(ResolutionError::at(ResolutionStage::Load))
            .and_then(|mut catalog| {
                catalog
                    .find_match(facts.facts())
                    .map_err(ResolutionError::at(ResolutionStage::Match))
            });

        if let Err(e) = guard.release() {
            warn!(error = %e, "Failed to release catalog lock");
        }
        outcome
    }
}

// ============================================================================
// Extraction
// ============================================================================

fn lit(value: &str) -> Token {
    Token::literal(value)
}

/// Patterns for the single-valued attributes, in extraction order
pub fn fixed_extractions() -> Vec<Pattern> {
    vec![
        Pattern::trusted(vec![lit("memory"), lit("total"), lit("size"), Token::capture(MEMORY_MB)]),
        Pattern::trusted(vec![lit("cpu"), lit("logical"), lit("number"), Token::capture(CPUS)]),
        Pattern::trusted(vec![lit("system"), lit("kernel"), lit("arch"), Token::capture(CPU_ARCH)]),
        Pattern::trusted(vec![lit("disk"), Token::Wildcard, lit("size"), Token::capture(LOCAL_GB)]),
        Pattern::trusted(vec![lit("ipmi"), lit("lan"), lit("ip-address"), Token::capture(IPMI_ADDRESS)]),
    ]
}

/// Run the fixed extractions; a miss leaves the attribute unset
pub fn extract_attributes(working: &mut WorkingSet, node: &mut NodeInfo) {
    for pattern in fixed_extractions() {
        let mut bindings = Bindings::new();
        if !match_spec(&pattern, working, &mut bindings) {
            debug!(pattern = %pattern, "No matching fact");
            continue;
        }
        for (name, value) in bindings {
            node.set_attribute(&name, value);
        }
    }
}

/// Extract `(network, $iface, serial, $mac)` until none is left, pairing each
/// interface with its own `(network, <iface>, ipv4, $ipv4)` fact.
///
/// Each round consumes a serial fact, so the loop ends on any finite set.
/// Interfaces already present on the node are discarded first.
pub fn extract_interfaces(working: &mut WorkingSet, node: &mut NodeInfo) {
    node.interfaces.clear();

    let serial = Pattern::trusted(vec![
        lit("network"),
        Token::capture("iface"),
        lit("serial"),
        Token::capture("mac"),
    ]);

    loop {
        let mut found = Bindings::new();
        if !match_spec(&serial, working, &mut found) {
            break;
        }
        let (Some(iface), Some(mac)) = (found.remove("iface"), found.remove("mac")) else {
            break;
        };

        let ipv4 = Pattern::trusted(vec![
            lit("network"),
            Token::literal(iface.as_str()),
            lit("ipv4"),
            Token::capture("ipv4"),
        ]);
        let mut address = Bindings::new();
        match_spec(&ipv4, working, &mut address);
        let ip = address.remove("ipv4").unwrap_or_else(|| NO_IPV4.to_string());

        debug!(iface = %iface, mac = %mac, ip = %ip, "Interface found");
        node.interfaces.insert(iface, Interface { mac, ip });
    }
}
