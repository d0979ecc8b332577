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

//! eDeploy profile catalog
//!
//! A catalog directory holds a `state` file listing profiles in priority
//! order with their remaining quota, and one `<profile>.specs` file per
//! profile containing the patterns a machine must satisfy:
//!
//! ```text
//! /etc/edeploy/state        [["hw1", "*"], ["storage", 4]]
//! /etc/edeploy/hw1.specs    [["network", "$iface", "serial", "$mac"]]
//! ```
//!
//! The catalog is loaded fresh for every discovery event and must only be
//! touched while the catalog lock is held.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use edeploy_error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::catalog::{MAX_FILE_SIZE, SPECS_EXTENSION, STATE_FILE, UNLIMITED};
use crate::facts::Fact;
use crate::matcher::match_all;
use crate::pattern::{Bindings, Pattern};

// ============================================================================
// Catalog Interfaces
// ============================================================================

/// A loaded set of profile templates
pub trait ProfileCatalog {
    /// Find the first profile whose specs the facts satisfy.
    ///
    /// Returns the profile name and the variables captured by its specs.
    fn find_match(&mut self, facts: &[Fact]) -> Result<(String, Bindings)>;
}

/// Produces a catalog from a configured directory
#[cfg_attr(test, mockall::automock)]
pub trait CatalogLoader {
    fn load(&self, dir: &Path) -> Result<Box<dyn ProfileCatalog>>;
}

// ============================================================================
// State File
// ============================================================================

/// How many more machines may still be given a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuota", into = "RawQuota")]
pub enum Quota {
    Unlimited,
    Remaining(u64),
}

impl Quota {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Remaining(0))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawQuota {
    Count(u64),
    Token(String),
}

impl TryFrom<RawQuota> for Quota {
    type Error = String;

    fn try_from(raw: RawQuota) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawQuota::Count(n) => Ok(Self::Remaining(n)),
            RawQuota::Token(t) if t == UNLIMITED => Ok(Self::Unlimited),
            RawQuota::Token(t) => t
                .parse()
                .map(Self::Remaining)
                .map_err(|_| format!("invalid quota {:?}", t)),
        }
    }
}

impl From<Quota> for RawQuota {
    fn from(quota: Quota) -> Self {
        match quota {
            Quota::Unlimited => Self::Token(UNLIMITED.to_string()),
            Quota::Remaining(n) => Self::Count(n),
        }
    }
}

/// One `[name, quota]` line of the state file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry(pub String, pub Quota);

impl StateEntry {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn quota(&self) -> Quota {
        self.1
    }
}

// ============================================================================
// Directory Catalog
// ============================================================================

/// Catalog backed by a directory on disk
#[derive(Debug)]
pub struct DirectoryCatalog {
    dir: PathBuf,
    entries: Vec<StateEntry>,
}

impl DirectoryCatalog {
    /// Read the state file of `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(DiscoveryError::CatalogNotFound(dir.to_path_buf()));
        }

        let state_path = dir.join(STATE_FILE);
        let content = read_bounded(&state_path)?;
        let entries: Vec<StateEntry> = serde_json::from_str(&content)
            .map_err(|e| DiscoveryError::catalog_format(&state_path, e.to_string()))?;

        for entry in &entries {
            validate_profile_name(&state_path, entry.name())?;
        }

        info!(dir = ?dir, profiles = entries.len(), "Loaded profile catalog");
        Ok(Self {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }

    /// Parse `<name>.specs`
    pub fn load_specs(&self, name: &str) -> Result<Vec<Pattern>> {
        let path = self.dir.join(format!("{}.{}", name, SPECS_EXTENSION));
        if !path.is_file() {
            return Err(DiscoveryError::SpecsNotFound {
                profile: name.to_string(),
                path,
            });
        }

        let content = read_bounded(&path)?;
        let raw: Vec<Vec<String>> = serde_json::from_str(&content)
            .map_err(|e| DiscoveryError::catalog_format(&path, e.to_string()))?;

        raw.iter()
            .map(|tokens| {
                Pattern::parse(tokens.as_slice()).map_err(|e| DiscoveryError::catalog_format(&path, e.to_string()))
            })
            .collect()
    }

    /// Write the state file back (temp file, then rename)
    pub fn save(&self) -> Result<()> {
        let path = self.dir.join(STATE_FILE);
        let json = serde_json::to_string_pretty(&self.entries)?;

        let temp_path = path.with_extension("tmp");
        let write = |p: &Path| -> std::io::Result<()> {
            let mut file = fs::File::create(p)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()
        };
        write(&temp_path).map_err(|source| DiscoveryError::FileWrite {
            path: temp_path.clone(),
            source,
        })?;
        fs::rename(&temp_path, &path).map_err(|source| DiscoveryError::FileWrite {
            path: path.clone(),
            source,
        })?;

        debug!(path = ?path, "Saved catalog state");
        Ok(())
    }
}

impl ProfileCatalog for DirectoryCatalog {
    fn find_match(&mut self, facts: &[Fact]) -> Result<(String, Bindings)> {
        let mut tried = 0;
        let mut matched = None;

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.quota().is_exhausted() {
                debug!(profile = entry.name(), "Profile quota exhausted, skipping");
                continue;
            }
            tried += 1;
            info!(profile = entry.name(), "Testing profile");

            let specs = self.load_specs(entry.name())?;
            if let Some(vars) = match_all(&specs, facts) {
                info!(profile = entry.name(), "Specs match");
                matched = Some((index, vars));
                break;
            }
        }

        let (index, vars) = matched.ok_or(DiscoveryError::NoMatch { tried })?;

        let entry = &mut self.entries[index];
        let name = entry.name().to_string();
        if let Quota::Remaining(n) = entry.1 {
            entry.1 = Quota::Remaining(n - 1);
            info!(profile = %name, remaining = n - 1, "Decrementing profile quota");
            self.save()?;
        }

        Ok((name, vars))
    }
}

/// Loads a [`DirectoryCatalog`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryCatalogLoader;

impl CatalogLoader for DirectoryCatalogLoader {
    fn load(&self, dir: &Path) -> Result<Box<dyn ProfileCatalog>> {
        Ok(Box::new(DirectoryCatalog::load(dir)?))
    }
}

fn read_bounded(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|source| DiscoveryError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(DiscoveryError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: MAX_FILE_SIZE,
        });
    }
    fs::read_to_string(path).map_err(|source| DiscoveryError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

// Profile names become file names
fn validate_profile_name(state_path: &Path, name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(DiscoveryError::catalog_format(
            state_path,
            format!("invalid profile name {:?}", name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_catalog(state: &str, specs: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), state).unwrap();
        for (name, content) in specs {
            fs::write(dir.path().join(format!("{}.specs", name)), content).unwrap();
        }
        dir
    }

    fn network_facts() -> Vec<Fact> {
        vec![
            Fact::new(["network", "eth0", "serial", "99:99:99:99:99:99"]),
            Fact::new(["network", "eth0", "ipv4", "192.168.100.12"]),
        ]
    }

    #[test]
    fn test_quota_parsing() {
        let entries: Vec<StateEntry> =
            serde_json::from_str(r#"[["a", "*"], ["b", 3], ["c", "2"]]"#).unwrap();
        assert_eq!(entries[0].quota(), Quota::Unlimited);
        assert_eq!(entries[1].quota(), Quota::Remaining(3));
        assert_eq!(entries[2].quota(), Quota::Remaining(2));

        assert!(serde_json::from_str::<Vec<StateEntry>>(r#"[["a", "lots"]]"#).is_err());
    }

    #[test]
    fn test_find_match_binds_template_vars() {
        let dir = write_catalog(
            r#"[["hw1", "*"]]"#,
            &[("hw1", r#"[["network", "$iface", "serial", "$mac"], ["network", "$iface", "ipv4", "$ipv4"]]"#)],
        );
        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();

        let (name, vars) = catalog.find_match(&network_facts()).unwrap();
        assert_eq!(name, "hw1");
        assert_eq!(vars["iface"], "eth0");
        assert_eq!(vars["ipv4"], "192.168.100.12");
        assert_eq!(catalog.entries()[0].quota(), Quota::Unlimited);
    }

    #[test]
    fn test_find_match_priority_order() {
        let dir = write_catalog(
            r#"[["big", "*"], ["small", "*"]]"#,
            &[
                ("big", r#"[["memory", "total", "size", "65536"]]"#),
                ("small", r#"[["network", "*", "serial", "*"]]"#),
            ],
        );
        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();
        let (name, _) = catalog.find_match(&network_facts()).unwrap();
        assert_eq!(name, "small");
    }

    #[test]
    fn test_find_match_decrements_and_persists_quota() {
        let dir = write_catalog(
            r#"[["hw1", 2]]"#,
            &[("hw1", r#"[["network", "eth0", "serial", "*"]]"#)],
        );

        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();
        catalog.find_match(&network_facts()).unwrap();
        assert_eq!(catalog.entries()[0].quota(), Quota::Remaining(1));

        let reloaded = DirectoryCatalog::load(dir.path()).unwrap();
        assert_eq!(reloaded.entries()[0].quota(), Quota::Remaining(1));
    }

    #[test]
    fn test_exhausted_profile_is_skipped() {
        let dir = write_catalog(
            r#"[["hw1", 0], ["fallback", "*"]]"#,
            &[("hw1", "[]"), ("fallback", "[]")],
        );
        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();
        let (name, _) = catalog.find_match(&network_facts()).unwrap();
        assert_eq!(name, "fallback");
    }

    #[test]
    fn test_no_match() {
        let dir = write_catalog(r#"[["hw1", "*"]]"#, &[("hw1", r#"[["hw1", "*"]]"#)]);
        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();
        let err = catalog.find_match(&network_facts()).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoMatch { tried: 1 }));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryCatalog::load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, DiscoveryError::CatalogNotFound(_)));
    }

    #[test]
    fn test_missing_state_file() {
        let dir = TempDir::new().unwrap();
        let err = DirectoryCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::FileRead { .. }));
    }

    #[test]
    fn test_malformed_state_file() {
        let dir = write_catalog("{not json", &[]);
        let err = DirectoryCatalog::load(dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::CatalogFormat { .. }));
    }

    #[test]
    fn test_profile_name_cannot_escape_directory() {
        let dir = write_catalog(r#"[["../etc/passwd", "*"]]"#, &[]);
        assert!(DirectoryCatalog::load(dir.path()).is_err());
    }

    #[test]
    fn test_missing_specs_file() {
        let dir = write_catalog(r#"[["hw1", "*"]]"#, &[]);
        let mut catalog = DirectoryCatalog::load(dir.path()).unwrap();
        let err = catalog.find_match(&network_facts()).unwrap_err();
        assert!(matches!(err, DiscoveryError::SpecsNotFound { .. }));
    }

    #[test]
    fn test_invalid_pattern_in_specs() {
        let dir = write_catalog(r#"[["hw1", "*"]]"#, &[("hw1", r#"[["disk", "$", "size"]]"#)]);
        let catalog = DirectoryCatalog::load(dir.path()).unwrap();
        assert!(matches!(
            catalog.load_specs("hw1"),
            Err(DiscoveryError::CatalogFormat { .. })
        ));
    }

    #[test]
    fn test_loader_returns_boxed_catalog() {
        let dir = write_catalog(r#"[["hw1", "*"]]"#, &[("hw1", r#"[["network", "$iface", "serial", "*"]]"#)]);
        let mut catalog = DirectoryCatalogLoader.load(dir.path()).unwrap();
        let (name, vars) = catalog.find_match(&network_facts()).unwrap();
        assert_eq!(name, "hw1");
        assert_eq!(vars["iface"], "eth0");
    }
}
