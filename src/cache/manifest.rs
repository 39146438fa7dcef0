use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::config::AffiliationPolicy;

/// Pipeline stage whose output is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Discovery + citation resolution + reconciliation
    Citations,
    /// Raw affiliation lookup
    Affiliations,
    /// Unique-affiliation geocoding
    Geocodes,
}

impl Stage {
    pub fn file_name(&self) -> &'static str {
        match self {
            Stage::Citations => "citing_records.csv",
            Stage::Affiliations => "affiliations.csv",
            Stage::Geocodes => "geocodes.csv",
        }
    }
}

/// Counts recorded alongside the stage markers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub publications: usize,
    pub citing_records: usize,
    pub unmatched_records: usize,
    pub affiliations: usize,
    pub unique_affiliations: usize,
    pub located_affiliations: usize,
}

/// Which stages of a researcher's run have a complete snapshot on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Identifier of the run that last wrote this manifest
    pub run_id: String,
    pub researcher_id: String,
    pub completed: BTreeSet<Stage>,
    /// Policy the cached affiliations were resolved with
    pub affiliation_policy: Option<AffiliationPolicy>,
    pub stats: ManifestStats,
}

impl Manifest {
    pub fn new(run_id: &str, researcher_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            researcher_id: researcher_id.to_string(),
            completed: BTreeSet::new(),
            affiliation_policy: None,
            stats: ManifestStats::default(),
        }
    }

    /// Save manifest to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write manifest to {:?}", path))?;
        Ok(())
    }

    /// Load manifest from file, returning None if file doesn't exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest from {:?}", path))?;
        let manifest: Self =
            serde_json::from_str(&json).context("Failed to deserialize manifest")?;
        Ok(Some(manifest))
    }

    pub fn mark_complete(&mut self, stage: Stage) {
        self.completed.insert(stage);
    }

    pub fn is_complete(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    /// Forget a stage and everything downstream of it
    pub fn invalidate_from(&mut self, stage: Stage) {
        self.completed.retain(|done| *done < stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_new() {
        let manifest = Manifest::new("run1", "abcDEF123");
        assert_eq!(manifest.researcher_id, "abcDEF123");
        assert!(manifest.completed.is_empty());
        assert!(manifest.affiliation_policy.is_none());
    }

    #[test]
    fn test_manifest_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        let mut manifest = Manifest::new("run123", "abcDEF123");
        manifest.mark_complete(Stage::Citations);
        manifest.affiliation_policy = Some(AffiliationPolicy::Aggressive);
        manifest.stats.citing_records = 42;
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap().unwrap();
        assert_eq!(loaded.run_id, "run123");
        assert!(loaded.is_complete(Stage::Citations));
        assert!(!loaded.is_complete(Stage::Affiliations));
        assert_eq!(loaded.affiliation_policy, Some(AffiliationPolicy::Aggressive));
        assert_eq!(loaded.stats.citing_records, 42);
    }

    #[test]
    fn test_manifest_load_nonexistent() {
        let result = Manifest::load(Path::new("/nonexistent/manifest.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalidate_downstream_stages() {
        let mut manifest = Manifest::new("run", "r");
        manifest.mark_complete(Stage::Citations);
        manifest.mark_complete(Stage::Affiliations);
        manifest.mark_complete(Stage::Geocodes);

        manifest.invalidate_from(Stage::Affiliations);
        assert!(manifest.is_complete(Stage::Citations));
        assert!(!manifest.is_complete(Stage::Affiliations));
        assert!(!manifest.is_complete(Stage::Geocodes));
    }
}
