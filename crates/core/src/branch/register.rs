//! TOML register of known legacy branches.
//!
//! The register file format:
//!
//! ```toml
//! [branches.1]
//! name = "Port-au-Prince"
//! code = "PAP"
//! region = "Ouest"
//!
//! [branches.2]
//! name = "Cap-Haïtien"
//! ```
//!
//! Keys are legacy branch ids. The register feeds backfill tables that pair
//! each legacy id with its derived canonical id.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::mapper::{self, GuidLayout};
use crate::errors::RegisterError;

/// A single legacy branch in the register.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredBranch {
    /// Branch display name.
    pub name: String,
    /// Short branch code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Administrative region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// On-disk shape of the register file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegisterFileData {
    /// The `[branches]` table, keyed by legacy id as written in the file.
    #[serde(default)]
    pub branches: HashMap<String, RegisteredBranch>,
}

/// One row of a legacy-to-canonical backfill table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackfillRow {
    pub legacy_id: i32,
    pub name: String,
    pub code: Option<String>,
    pub canonical_id: Uuid,
}

/// Utilities for loading and saving the branch register.
pub struct BranchRegister;

impl BranchRegister {
    /// Load the register from disk, keyed and ordered by legacy id.
    pub fn load<P: AsRef<Path>>(
        path: P,
    ) -> Result<BTreeMap<i32, RegisteredBranch>, RegisterError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading branch register");

        if !path.exists() {
            return Err(RegisterError::RegisterFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let data: RegisterFileData =
            toml::from_str(&contents).map_err(|e| RegisterError::ParseError(e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (key, branch) in data.branches {
            let legacy_id = key
                .trim()
                .parse::<i32>()
                .map_err(|_| RegisterError::InvalidLegacyId(key.clone()))?;
            if entries.insert(legacy_id, branch).is_some() {
                return Err(RegisterError::DuplicateLegacyId(legacy_id));
            }
        }

        debug!(count = entries.len(), "loaded legacy branches");
        Ok(entries)
    }

    /// Save the register back to disk in TOML format.
    pub fn save<P: AsRef<Path>>(
        path: P,
        entries: &BTreeMap<i32, RegisteredBranch>,
    ) -> Result<(), RegisterError> {
        let path = path.as_ref();
        info!(path = %path.display(), "saving branch register");

        let data = RegisterFileData {
            branches: entries
                .iter()
                .map(|(id, branch)| (id.to_string(), branch.clone()))
                .collect(),
        };

        let toml_str =
            toml::to_string_pretty(&data).map_err(|e| RegisterError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_str)?;

        debug!(count = entries.len(), "saved legacy branches");
        Ok(())
    }
}

/// Pair every registered branch with its canonical id, ordered by legacy id.
pub fn backfill_rows(
    entries: &BTreeMap<i32, RegisteredBranch>,
    layout: GuidLayout,
) -> Vec<BackfillRow> {
    entries
        .iter()
        .map(|(&legacy_id, branch)| BackfillRow {
            legacy_id,
            name: branch.name.clone(),
            code: branch.code.clone(),
            canonical_id: mapper::derive_with_layout(legacy_id, layout),
        })
        .collect()
}
