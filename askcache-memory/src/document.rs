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

//! The persisted cache document
//!
//! One JSON document holds the entire cache: entries keyed by query hash,
//! a denormalized category index, the append-only feedback log, and the
//! running global counters. The document is rewritten whole on every
//! mutation; there are no partial updates.

use crate::classify::QueryCategory;
use crate::entry::QueryEntry;
use crate::query::{QueryHash, Rating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Persisted schema versions. Documents without a version field predate
/// versioning and are treated as legacy 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "1.0")]
    V1,
    #[serde(rename = "2.0")]
    V2,
}

/// Document-level timestamps, refreshed on every save
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

/// Running counters across the whole cache. Monotonically non-decreasing
/// except through [`GlobalStats::reset`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_queries_seen: u64,
    pub cache_hit_count: u64,
    pub total_positive_feedback: u64,
    pub total_negative_feedback: u64,
}

impl GlobalStats {
    /// Zero all counters. The only sanctioned non-monotone transition.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One audit-log record of user feedback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub hash: QueryHash,
    /// The query text as the caller submitted it, un-normalized
    pub query: String,
    pub rating: Rating,
    pub timestamp: DateTime<Utc>,
}

/// The root persisted object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub schema_version: SchemaVersion,
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub entries: BTreeMap<QueryHash, QueryEntry>,
    /// Secondary index: category name to the hashes assigned to it.
    /// Kept consistent with entry creation; categories are sticky, so an
    /// entry never moves between sets after assignment.
    #[serde(default)]
    pub categories: BTreeMap<String, BTreeSet<QueryHash>>,
    /// Chronological, append-only; never pruned in normal operation
    #[serde(default)]
    pub feedback_log: Vec<FeedbackEvent>,
    #[serde(default)]
    pub global_stats: GlobalStats,
}

impl CacheDocument {
    /// Fresh empty document at the current schema version
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            schema_version: SchemaVersion::V2,
            metadata: DocumentMetadata {
                created_at: now,
                last_updated_at: now,
            },
            entries: BTreeMap::new(),
            categories: BTreeMap::new(),
            feedback_log: Vec::new(),
            global_stats: GlobalStats::default(),
        }
    }

    /// Insert a new entry and register it in the category index
    pub fn insert_entry(&mut self, hash: QueryHash, entry: QueryEntry, category: QueryCategory) {
        self.categories
            .entry(category.as_str().to_string())
            .or_default()
            .insert(hash.clone());
        self.entries.insert(hash, entry);
    }

    /// The category an entry was assigned, from the index
    pub fn category_of(&self, hash: &QueryHash) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, hashes)| hashes.contains(hash))
            .map(|(name, _)| name.as_str())
    }

    /// Refresh the last-updated timestamp; called right before each save
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_updated_at = now;
    }
}
