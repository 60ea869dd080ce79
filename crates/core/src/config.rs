//! TOML-based configuration system for NalaBranch.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};

use crate::branch::{BranchResolver, GuidLayout};
use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Branch identifier resolution settings.
    #[serde(default)]
    pub branch: BranchConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:3000`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of tokens accepted by one batch resolve request.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_listen() -> String {
    "127.0.0.1:3000".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_max_batch() -> usize {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            max_batch: default_max_batch(),
        }
    }
}

// ---------------------------------------------------------------------------
// Branch resolution
// ---------------------------------------------------------------------------

/// Branch identifier resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Byte layout for derived ids. Must match the layout of ids already
    /// stored downstream.
    #[serde(default)]
    pub guid_layout: GuidLayout,

    /// Request header carrying the caller's branch claim.
    #[serde(default = "default_claim_header")]
    pub claim_header: String,

    /// Path to the TOML register of legacy branches.
    #[serde(default)]
    pub register_file: Option<PathBuf>,
}

fn default_claim_header() -> String {
    "x-branch-id".into()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            guid_layout: GuidLayout::default(),
            claim_header: default_claim_header(),
            register_file: None,
        }
    }
}

impl BranchConfig {
    /// A resolver bound to the configured layout.
    pub fn resolver(&self) -> BranchResolver {
        BranchResolver::new(self.guid_layout)
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** validate the values -- call
    /// [`validate`](Self::validate) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: format!("'{}' is not a socket address", self.server.listen),
            });
        }
        if !is_log_filter(&self.server.log_level) {
            return Err(ConfigError::InvalidValue {
                field: "server.log_level".into(),
                detail: format!(
                    "'{}' is not a log level (trace, debug, info, warn, error, off) \
                     or a list of target=level directives",
                    self.server.log_level
                ),
            });
        }
        if self.server.max_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_batch".into(),
                detail: "batch limit must be > 0".into(),
            });
        }
        if !is_header_name(&self.branch.claim_header) {
            return Err(ConfigError::InvalidValue {
                field: "branch.claim_header".into(),
                detail: format!("'{}' is not a valid header name", self.branch.claim_header),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// A bare level such as `debug`, or comma-separated `target=level`
/// directives such as `nalabranch_web=debug,info`.
fn is_log_filter(filter: &str) -> bool {
    !filter.trim().is_empty()
        && filter.split(',').all(|directive| {
            let level = directive
                .rsplit_once('=')
                .map_or(directive, |(_, level)| level)
                .trim();
            !level.is_empty() && level.parse::<LevelFilter>().is_ok()
        })
}

/// Header names are non-empty runs of ASCII letters, digits, `-` and `_`.
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
