// Copyright 2025 Askcache Contributors (https://github.com/askcache)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! JSON file persistence for the cache document
//!
//! The whole document is read and written as one pretty-printed JSON
//! file. An unreadable or unparseable file degrades to an empty document
//! with a warning; a legacy document that fails migration is an error,
//! because running on an ambiguous half-converted state is worse than
//! running cache-less.

use crate::document::CacheDocument;
use crate::error::{CacheError, CacheResult};
use crate::migration;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed store for a single [`CacheDocument`]
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, migrating a legacy file in place if one is
    /// found. Missing or unparseable files yield an empty document;
    /// migration failure propagates.
    pub fn load(&self) -> CacheResult<CacheDocument> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no cache file yet, starting empty");
            return Ok(CacheDocument::empty());
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                      "cache file unreadable, starting empty");
                return Ok(CacheDocument::empty());
            }
        };

        let raw: serde_json::Value = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                      "cache file is not valid JSON, starting empty");
                return Ok(CacheDocument::empty());
            }
        };

        if migration::is_legacy(&raw) {
            let migrated = migration::migrate_legacy(raw)?;
            // Replace the legacy file immediately so no 1.0 document
            // survives past first load.
            self.save(&migrated)?;
            return Ok(migrated);
        }

        match serde_json::from_value::<CacheDocument>(raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e,
                      "cache document does not match schema, starting empty");
                Ok(CacheDocument::empty())
            }
        }
    }

    /// Write the document back, replacing the file content entirely
    pub fn save(&self, doc: &CacheDocument) -> CacheResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CacheError::Storage(format!("creating {}: {e}", parent.display())))?;
            }
        }
        let content = serde_json::to_string_pretty(doc)?;
        std::fs::write(&self.path, content)
            .map_err(|e| CacheError::Storage(format!("writing {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), entries = doc.entries.len(), "cache saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("memory_cache.json"));
        let doc = store.load().unwrap();
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("memory_cache.json"));

        let mut doc = CacheDocument::empty();
        doc.global_stats.cache_hit_count = 7;
        store.save(&doc).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.global_stats.cache_hit_count, 7);
    }

    #[test]
    fn test_corrupt_json_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory_cache.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let doc = CacheStore::new(&path).load().unwrap();
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_non_object_json_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory_cache.json");
        // Valid JSON, but not a document: must not be mistaken for a
        // legacy file and fail migration.
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let doc = CacheStore::new(&path).load().unwrap();
        assert!(doc.entries.is_empty());
    }

    #[test]
    fn test_legacy_file_is_migrated_and_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memory_cache.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "queries": {
                    "legacykey": {
                        "query": "show all orders",
                        "response": "42 orders",
                        "use_count": 2,
                        "positive_feedback": 1,
                        "negative_feedback": 0
                    }
                },
                "stats": {"total_queries": 10, "cache_hits": 2,
                          "positive_feedback": 1, "negative_feedback": 0}
            })
            .to_string(),
        )
        .unwrap();

        let store = CacheStore::new(&path);
        let doc = store.load().unwrap();
        assert_eq!(doc.entries.len(), 1);

        // The file on disk must now be a 2.0 document.
        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["schema_version"], "2.0");
    }
}
