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

//! Logging setup for the command-line front end
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary. Logs go to stderr so stdout stays valid JSON.

use std::io;

use tracing_subscriber::EnvFilter;

use crate::constants::env::{DEFAULT_LOG_LEVEL, LOG};

/// Filter directive from `EDEPLOY_LOG`, or `info`
pub fn log_filter() -> String {
    std::env::var(LOG)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Install the fmt subscriber. Calling it twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_new(log_filter()).unwrap_or_else(|e| {
        eprintln!("Invalid {} directive ({}), using {}", LOG, e, DEFAULT_LOG_LEVEL);
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    });

    // Err only means a global subscriber is already installed
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_filter_default_and_override() {
        std::env::remove_var(LOG);
        assert_eq!(log_filter(), "info");

        std::env::set_var(LOG, "edeploy_hook=debug");
        assert_eq!(log_filter(), "edeploy_hook=debug");

        std::env::set_var(LOG, "  ");
        assert_eq!(log_filter(), "info");
        std::env::remove_var(LOG);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
