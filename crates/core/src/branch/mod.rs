//! Branch identifier resolution.
//!
//! Resolution order for a raw branch token:
//! 1. Native UUID (passed through unchanged)
//! 2. Legacy integer id (canonical id derived from an MD5 digest)
//! 3. Otherwise a parse error

pub mod context;
pub mod mapper;
pub mod register;

pub use context::{optional_branch_filter, resolve_branch_context, BranchResolver};
pub use mapper::{derive, derive_with_layout, resolve, GuidLayout, ResolvedBranch};
pub use register::{backfill_rows, BackfillRow, BranchRegister, RegisteredBranch};
