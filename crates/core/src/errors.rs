//! Error types for the NalaBranch core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them for callers that want a single
//! error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    BranchId(#[from] BranchIdError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Register(#[from] RegisterError),
}

// ---------------------------------------------------------------------------
// Branch identifier errors
// ---------------------------------------------------------------------------

/// A raw branch token could not be resolved to a canonical identifier.
///
/// Both variants are client input failures: surface them as a bad request,
/// never retry them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BranchIdError {
    /// The input was empty or contained only whitespace.
    #[error("branch identifier is empty")]
    Blank,

    /// The input is neither a UUID nor a 32-bit integer.
    #[error("'{0}' is neither a branch UUID nor a legacy branch id")]
    Unrecognized(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Register errors
// ---------------------------------------------------------------------------

/// Errors from the legacy branch register.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The register file could not be loaded.
    #[error("branch register file error at '{path}': {detail}")]
    RegisterFileError {
        path: String,
        detail: String,
    },

    /// TOML parse or serialization error.
    #[error("branch register parse error: {0}")]
    ParseError(String),

    /// A `[branches]` key is not a 32-bit integer.
    #[error("branch register key '{0}' is not a legacy branch id")]
    InvalidLegacyId(String),

    /// Two `[branches]` keys name the same legacy id (e.g. `1` and `01`).
    #[error("branch register lists legacy branch id {0} more than once")]
    DuplicateLegacyId(i32),

    /// Generic I/O error.
    #[error("branch register I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
