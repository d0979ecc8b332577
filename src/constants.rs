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

//! Constants and configuration defaults for the discovery hook
//!
//! Centralizes paths, limits, file names and environment variable names.

/// Default filesystem locations
pub mod paths {
    /// Lock file guarding the profile catalog across processes
    pub const DEFAULT_LOCKNAME: &str = "/var/lock/discoverd.lock";

    /// Directory holding the eDeploy profile catalog
    pub const DEFAULT_CONFIGDIR: &str = "/etc/edeploy";

    /// System-wide hook configuration file
    pub const SYSTEM_CONFIG_FILE: &str = "/etc/edeploy/hook.json";
}

/// Profile catalog layout
pub mod catalog {
    /// File listing profiles and their remaining quota, in priority order
    pub const STATE_FILE: &str = "state";

    /// Extension of per-profile spec files
    pub const SPECS_EXTENSION: &str = "specs";

    /// Quota token meaning "unlimited"
    pub const UNLIMITED: &str = "*";

    /// Maximum size of any catalog file (1 MiB)
    pub const MAX_FILE_SIZE: u64 = 1024 * 1024;
}

/// Pattern syntax used by catalog files and the CLI
pub mod pattern {
    /// Token matching any value without binding
    pub const WILDCARD: &str = "*";

    /// Prefix marking a capture token
    pub const CAPTURE_PREFIX: char = '$';

    /// Separator for patterns given on the command line
    pub const CLI_SEPARATOR: char = ',';
}

/// Attribute names written by the hook
pub mod attributes {
    pub const MEMORY_MB: &str = "memory_mb";
    pub const CPUS: &str = "cpus";
    pub const CPU_ARCH: &str = "cpu_arch";
    pub const LOCAL_GB: &str = "local_gb";
    pub const IPMI_ADDRESS: &str = "ipmi_address";
    pub const PROFILE: &str = "profile";
    pub const INTERFACES: &str = "interfaces";
    pub const DATA: &str = "data";

    /// IPv4 recorded for an interface without an ipv4 fact
    pub const NO_IPV4: &str = "none";
}

/// Environment variables
pub mod env {
    /// Path of a JSON configuration file
    pub const CONFIG_FILE: &str = "EDEPLOY_CONFIG";

    /// Overrides `lockname`
    pub const LOCKNAME: &str = "EDEPLOY_LOCKNAME";

    /// Overrides `configdir`
    pub const CONFIGDIR: &str = "EDEPLOY_CONFIGDIR";

    /// tracing filter directive for the binary
    pub const LOG: &str = "EDEPLOY_LOG";

    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Maximum size of a hook configuration file (64 KiB)
pub const MAX_CONFIG_SIZE: u64 = 64 * 1024;
