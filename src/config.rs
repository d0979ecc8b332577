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

//! Hook configuration
//!
//! Two settings, `lockname` and `configdir`. Values are layered: built-in
//! defaults, then an optional JSON file, then environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use edeploy_error::{DiscoveryError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{self, paths};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookConfig {
    /// Lock file guarding the profile catalog
    #[serde(default = "default_lockname")]
    pub lockname: PathBuf,
    /// Profile catalog directory
    #[serde(default = "default_configdir")]
    pub configdir: PathBuf,
}

fn default_lockname() -> PathBuf {
    PathBuf::from(paths::DEFAULT_LOCKNAME)
}

fn default_configdir() -> PathBuf {
    PathBuf::from(paths::DEFAULT_CONFIGDIR)
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            lockname: default_lockname(),
            configdir: default_configdir(),
        }
    }
}

impl HookConfig {
    /// Read a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|source| DiscoveryError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() > constants::MAX_CONFIG_SIZE {
            return Err(DiscoveryError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                max_size: constants::MAX_CONFIG_SIZE,
            });
        }

        let data = fs::read_to_string(path).map_err(|source| DiscoveryError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `EDEPLOY_LOCKNAME` / `EDEPLOY_CONFIGDIR`
    pub fn apply_env_overrides(&mut self) {
        if let Some(lockname) = env::var_os(constants::env::LOCKNAME).filter(|v| !v.is_empty()) {
            self.lockname = PathBuf::from(lockname);
        }
        if let Some(configdir) = env::var_os(constants::env::CONFIGDIR).filter(|v| !v.is_empty()) {
            self.configdir = PathBuf::from(configdir);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.lockname.as_os_str().is_empty() {
            return Err(DiscoveryError::InvalidConfig {
                field: "lockname".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.configdir.as_os_str().is_empty() {
            return Err(DiscoveryError::InvalidConfig {
                field: "configdir".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Configuration file to read, if any.
///
/// An explicit path wins, then `EDEPLOY_CONFIG`, then the system file when it
/// exists.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env::var_os(constants::env::CONFIG_FILE).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let system = PathBuf::from(paths::SYSTEM_CONFIG_FILE);
    system.is_file().then_some(system)
}

/// Resolve the effective configuration
pub fn load_config(explicit: Option<&Path>) -> Result<HookConfig> {
    let mut config = match config_path(explicit) {
        Some(path) => {
            debug!(path = ?path, "Reading hook configuration");
            HookConfig::from_file(&path)?
        }
        None => HookConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
