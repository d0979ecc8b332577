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

//! edeploy-hook - eDeploy pre-discovery hook
//!
//! Turns the hardware facts reported by an inspection ramdisk into node
//! attributes (memory, CPUs, architecture, disk size, IPMI address, network
//! interfaces) and resolves the machine's hardware profile from an eDeploy
//! catalog.
//!
//! # Module Structure
//!
//! - `facts` / `pattern` / `matcher` - fact tuples, typed patterns, extraction
//! - `catalog` / `lock` - profile catalog and its cross-process lock
//! - `node` / `hook` - the request type and the hook itself
//! - `config` / `logger` / `constants` - ambient setup
//!
//! # Example
//!
//! ```no_run
//! use edeploy_hook::{load_config, DiscoveryHook, NodeInfo};
//!
//! let hook = DiscoveryHook::from_config(&load_config(None).unwrap());
//! let node: NodeInfo = serde_json::from_str(r#"{"data": []}"#).unwrap();
//! let node = hook.process(node).unwrap();
//! ```

pub mod catalog;
pub mod config;
pub mod constants;
pub mod facts;
pub mod hook;
pub mod lock;
pub mod logger;
pub mod matcher;
pub mod node;
pub mod pattern;

pub use edeploy_error::{DiscoveryError, Result};

pub use catalog::{
    CatalogLoader, DirectoryCatalog, DirectoryCatalogLoader, ProfileCatalog, Quota, StateEntry,
};
pub use config::{config_path, load_config, HookConfig};
pub use facts::{Fact, FactStore, WorkingSet};
pub use hook::{
    extract_attributes, extract_interfaces, fixed_extractions, DiscoveryHook, ResolutionError,
    ResolutionStage,
};
pub use lock::{FileLock, LockGuard, LockProvider};
pub use matcher::{match_all, match_spec};
pub use node::{Interface, NodeInfo};
pub use pattern::{Bindings, Pattern, Token};
