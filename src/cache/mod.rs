//! Per-researcher stage cache.
//!
//! Layout: `<cache_dir>/<researcher_id>/{manifest.json, citing_records.csv,
//! affiliations.csv, geocodes.csv}`. A stage's snapshot is only trusted when
//! the manifest marks that stage complete.

pub mod manifest;
pub mod store;

pub use manifest::*;
pub use store::*;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn for_researcher(root: &Path, researcher_id: &str) -> Self {
        Self {
            dir: root.join(researcher_id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage_path(&self, stage: Stage) -> PathBuf {
        self.dir.join(stage.file_name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))
    }

    /// A stage can be skipped only if the manifest says so and its file exists
    pub fn has_stage(&self, manifest: &Manifest, stage: Stage) -> bool {
        manifest.is_complete(stage) && self.stage_path(stage).exists()
    }

    pub fn load_manifest(&self) -> Result<Option<Manifest>> {
        Manifest::load(&self.manifest_path())
    }

    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        self.ensure_dir()?;
        manifest.save(&self.manifest_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stage_paths_are_per_researcher() {
        let store = CacheStore::for_researcher(Path::new("/tmp/cache"), "abc123");
        assert_eq!(
            store.stage_path(Stage::Citations),
            PathBuf::from("/tmp/cache/abc123/citing_records.csv")
        );
        assert_eq!(store.manifest_path(), PathBuf::from("/tmp/cache/abc123/manifest.json"));
    }

    #[test]
    fn test_has_stage_requires_file() {
        let dir = tempdir().unwrap();
        let store = CacheStore::for_researcher(dir.path(), "abc123");
        let mut manifest = Manifest::new("run", "abc123");
        manifest.mark_complete(Stage::Citations);

        assert!(!store.has_stage(&manifest, Stage::Citations));

        save_citing_records(&[], &store.stage_path(Stage::Citations)).unwrap();
        assert!(store.has_stage(&manifest, Stage::Citations));
        assert!(!store.has_stage(&manifest, Stage::Geocodes));
    }
}
