//! NalaBranch core library.
//!
//! Resolves raw branch tokens to canonical branch UUIDs: native UUIDs pass
//! through, legacy integer ids are mapped deterministically. Also provides
//! configuration, error types and the register of known legacy branches.

pub mod branch;
pub mod config;
pub mod errors;

// Re-exports for convenience.
pub use branch::{BranchResolver, GuidLayout, ResolvedBranch};
pub use config::AppConfig;
pub use errors::{BranchIdError, CoreError};
