//! Unified error handling for the eDeploy discovery hook
//!
//! This crate provides the single error type shared by the matcher, the
//! profile catalog, the lock provider and the hook itself.

use std::io;
use std::path::PathBuf;

/// Result type alias using DiscoveryError
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Unified error type for all discovery hook operations
#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // Request Shape Errors
    // ============================================================================
    #[error("edeploy plugin: no \"data\" key in the received JSON")]
    MissingData,

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Pattern Errors
    // ============================================================================
    #[error("Empty capture name at position {position}")]
    EmptyCaptureName {
        position: usize,
    },

    #[error("Capture ${name} appears more than once in one pattern")]
    DuplicateCapture {
        name: String,
    },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    // ============================================================================
    // Profile Catalog Errors
    // ============================================================================
    #[error("Catalog directory not found: {0}")]
    CatalogNotFound(PathBuf),

    #[error("Malformed catalog file {path}: {reason}")]
    CatalogFormat {
        path: PathBuf,
        reason: String,
    },

    #[error("No specs file for profile {profile} at {path}")]
    SpecsNotFound {
        profile: String,
        path: PathBuf,
    },

    #[error("Unable to match requirements on the specs ({tried} profiles tried)")]
    NoMatch {
        tried: usize,
    },

    // ============================================================================
    // Locking Errors
    // ============================================================================
    #[error("Failed to lock {path}: {reason}")]
    Lock {
        path: PathBuf,
        reason: String,
    },

    #[error("Lock {0} is not held")]
    LockNotHeld(PathBuf),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl DiscoveryError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a catalog format error
    pub fn catalog_format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CatalogFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a lock error
    pub fn lock(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Lock {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// Allow converting from String to DiscoveryError
impl From<String> for DiscoveryError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to DiscoveryError
impl From<&str> for DiscoveryError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
