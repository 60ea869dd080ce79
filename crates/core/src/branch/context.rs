//! Effective-branch resolution for inbound requests.
//!
//! A request may name its branch explicitly in the payload and also carry
//! the caller's branch as a session claim. The payload wins when it
//! resolves; the claim is the fallback.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::mapper::{self, GuidLayout, ResolvedBranch};
use crate::errors::BranchIdError;

/// Branch token resolver bound to a configured [`GuidLayout`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchResolver {
    layout: GuidLayout,
}

impl BranchResolver {
    pub fn new(layout: GuidLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> GuidLayout {
        self.layout
    }

    /// Resolve a raw branch token. See [`mapper::resolve_with_layout`].
    pub fn resolve(&self, raw: &str) -> Result<ResolvedBranch, BranchIdError> {
        mapper::resolve_with_layout(raw, self.layout)
    }

    /// Derive the canonical id of a legacy branch.
    pub fn derive(&self, legacy_id: i32) -> Uuid {
        mapper::derive_with_layout(legacy_id, self.layout)
    }

    /// Resolve the branch a request acts on.
    ///
    /// Lookup order:
    /// 1. Explicit payload value
    /// 2. Session claim
    ///
    /// Returns `None` (and logs a warning) when neither resolves.
    pub fn resolve_context(
        &self,
        payload: Option<&str>,
        claim: Option<&str>,
    ) -> Option<ResolvedBranch> {
        if let Some(resolved) = payload.and_then(|raw| self.resolve(raw).ok()) {
            debug!(canonical_id = %resolved.canonical_id, "branch context from payload");
            return Some(resolved);
        }

        if let Some(resolved) = claim.and_then(|raw| self.resolve(raw).ok()) {
            debug!(canonical_id = %resolved.canonical_id, "branch context from claim");
            return Some(resolved);
        }

        warn!(
            provided = ?payload,
            claim = ?claim,
            "unable to resolve branch context"
        );
        None
    }

    /// Canonical id for an optional list filter. An absent or unresolvable
    /// filter means "all branches".
    pub fn branch_filter(&self, raw: Option<&str>) -> Option<Uuid> {
        raw.and_then(|r| self.resolve(r).ok())
            .map(|resolved| resolved.canonical_id)
    }
}

/// [`BranchResolver::resolve_context`] with the default layout.
pub fn resolve_branch_context(
    payload: Option<&str>,
    claim: Option<&str>,
) -> Option<ResolvedBranch> {
    BranchResolver::default().resolve_context(payload, claim)
}

/// [`BranchResolver::branch_filter`] with the default layout.
pub fn optional_branch_filter(raw: Option<&str>) -> Option<Uuid> {
    BranchResolver::default().branch_filter(raw)
}
