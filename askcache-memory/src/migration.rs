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

//! Legacy (1.0) document migration
//!
//! The first generation of the cache file was a flat structure with no
//! schema version marker:
//!
//! ```json
//! {
//!   "queries": {
//!     "<hash>": {
//!       "query": "...", "response": "...", "tools_used": [],
//!       "timestamp": "...", "last_used": "...", "use_count": 5,
//!       "positive_feedback": 3, "negative_feedback": 0
//!     }
//!   },
//!   "feedback": [ {"query": "...", "rating": "up", "timestamp": "..."} ],
//!   "stats": { "total_queries": 100, "cache_hits": 45,
//!              "positive_feedback": 67, "negative_feedback": 8 }
//! }
//! ```
//!
//! Migration runs once, synchronously, before the cache becomes usable,
//! and rewrites the file in the 2.0 envelope. Feedback counters, use
//! counts, and timestamps carry over exactly; categories and tags are
//! assigned with the same rules a fresh `record` would use. Entry hashes
//! are recomputed from the normalized query text, since the legacy digest
//! algorithm differs from the current one. Legacy entries that collide
//! under the new hashing are merged rather than dropped.
//!
//! A structurally corrupt legacy document is fatal to cache
//! initialization: the caller decides whether to run cache-less.

use crate::classify::{self, QueryCategory};
use crate::document::{
    CacheDocument, DocumentMetadata, FeedbackEvent, GlobalStats, SchemaVersion,
};
use crate::entry::{EntryTimestamps, FeedbackTally, QueryEntry, TokenCounts, UsageStats};
use crate::error::{CacheError, CacheResult};
use crate::query::{normalize_query, QueryHash, Rating};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::{btree_map, BTreeMap};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    queries: BTreeMap<String, LegacyEntry>,
    #[serde(default)]
    feedback: Vec<LegacyFeedback>,
    #[serde(default)]
    stats: LegacyStats,
}

#[derive(Debug, Deserialize)]
struct LegacyEntry {
    query: String,
    response: String,
    #[serde(default)]
    tools_used: Vec<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    last_used: Option<String>,
    #[serde(default)]
    use_count: u64,
    #[serde(default)]
    positive_feedback: u64,
    #[serde(default)]
    negative_feedback: u64,
}

#[derive(Debug, Deserialize)]
struct LegacyFeedback {
    query: String,
    rating: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyStats {
    #[serde(default)]
    total_queries: u64,
    #[serde(default)]
    cache_hits: u64,
    #[serde(default)]
    positive_feedback: u64,
    #[serde(default)]
    negative_feedback: u64,
}

/// A raw document is legacy when it is an object carrying no schema
/// version, or an explicit "1.0" marker. Non-object roots are not legacy
/// documents; they fail the 2.0 parse and degrade to an empty cache.
pub fn is_legacy(raw: &serde_json::Value) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };
    match obj.get("schema_version") {
        None => true,
        Some(v) => v.as_str() == Some("1.0"),
    }
}

/// Convert a legacy document into the 2.0 envelope
pub fn migrate_legacy(raw: serde_json::Value) -> CacheResult<CacheDocument> {
    let legacy: LegacyDocument = serde_json::from_value(raw)
        .map_err(|e| CacheError::Migration(format!("unrecognized legacy structure: {e}")))?;

    let now = Utc::now();
    let mut doc = CacheDocument {
        schema_version: SchemaVersion::V2,
        metadata: DocumentMetadata {
            created_at: now,
            last_updated_at: now,
        },
        entries: BTreeMap::new(),
        categories: BTreeMap::new(),
        feedback_log: Vec::new(),
        global_stats: GlobalStats {
            total_queries_seen: legacy.stats.total_queries,
            cache_hit_count: legacy.stats.cache_hits,
            total_positive_feedback: legacy.stats.positive_feedback,
            total_negative_feedback: legacy.stats.negative_feedback,
        },
    };

    for (legacy_key, legacy_entry) in legacy.queries {
        if legacy_entry.query.trim().is_empty() {
            return Err(CacheError::Migration(format!(
                "legacy entry {legacy_key} has an empty query"
            )));
        }

        let normalized = normalize_query(&legacy_entry.query);
        let hash = QueryHash::from_normalized(&normalized);
        let category = QueryCategory::classify(&normalized);
        let tags = classify::extract_tags(&normalized);

        let created_at = parse_legacy_timestamp(legacy_entry.timestamp.as_deref()).unwrap_or(now);
        let last_used_at =
            parse_legacy_timestamp(legacy_entry.last_used.as_deref()).unwrap_or(created_at);
        if created_at < doc.metadata.created_at {
            doc.metadata.created_at = created_at;
        }

        let entry = QueryEntry {
            original_query: legacy_entry.query,
            normalized_query: normalized,
            response_text: legacy_entry.response,
            context_info: BTreeMap::new(),
            tools_used: legacy_entry.tools_used,
            token_counts: TokenCounts::default(),
            timestamps: EntryTimestamps {
                created_at,
                last_used_at,
            },
            usage: UsageStats {
                use_count: legacy_entry.use_count,
                session_ids: Default::default(),
            },
            feedback: FeedbackTally {
                positive: legacy_entry.positive_feedback,
                negative: legacy_entry.negative_feedback,
                derived_score: FeedbackTally::score(
                    legacy_entry.positive_feedback,
                    legacy_entry.negative_feedback,
                ),
            },
            tags,
            related_query_hashes: Default::default(),
        };

        // Legacy keys were hashed without whitespace collapse, so two
        // legacy entries can normalize to the same text. Merge them:
        // counters are summed, and the more recently used answer wins.
        match doc.entries.entry(hash) {
            btree_map::Entry::Occupied(mut occupied) => {
                warn!(hash = %occupied.key(),
                      query = %entry.normalized_query,
                      "legacy entries collide after normalization, merging");
                let existing = occupied.get_mut();
                existing.usage.use_count += entry.usage.use_count;
                existing.feedback.positive += entry.feedback.positive;
                existing.feedback.negative += entry.feedback.negative;
                existing.feedback.derived_score =
                    FeedbackTally::score(existing.feedback.positive, existing.feedback.negative);
                if entry.timestamps.created_at < existing.timestamps.created_at {
                    existing.timestamps.created_at = entry.timestamps.created_at;
                }
                if entry.timestamps.last_used_at >= existing.timestamps.last_used_at {
                    existing.timestamps.last_used_at = entry.timestamps.last_used_at;
                    existing.original_query = entry.original_query;
                    existing.response_text = entry.response_text;
                    existing.tools_used = entry.tools_used;
                }
                existing.tags.extend(entry.tags);
            }
            btree_map::Entry::Vacant(vacant) => {
                doc.categories
                    .entry(category.as_str().to_string())
                    .or_default()
                    .insert(vacant.key().clone());
                vacant.insert(entry);
            }
        }
    }

    // Carry the audit log over. Events whose rating string no longer
    // parses are dropped with a warning rather than failing the whole
    // migration; the entry counters are the authoritative tallies.
    for event in legacy.feedback {
        let rating = match event.rating.parse::<Rating>() {
            Ok(r) => r,
            Err(_) => {
                warn!(rating = %event.rating, "dropping legacy feedback event with unknown rating");
                continue;
            }
        };
        let timestamp = parse_legacy_timestamp(event.timestamp.as_deref()).unwrap_or(now);
        doc.feedback_log.push(FeedbackEvent {
            hash: QueryHash::from_raw(&event.query),
            query: event.query,
            rating,
            timestamp,
        });
    }

    info!(
        entries = doc.entries.len(),
        feedback_events = doc.feedback_log.len(),
        "migrated legacy cache document to schema 2.0"
    );
    Ok(doc)
}

/// Legacy timestamps were written in several shapes over time: RFC 3339,
/// or a bare local datetime with optional fractional seconds.
fn parse_legacy_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn legacy_fixture() -> serde_json::Value {
        json!({
            "queries": {
                "a3f2e8c9d1b4f7e6a5c8d9e1f2a3b4c5": {
                    "query": "List all tables",
                    "response": "users, orders",
                    "tools_used": ["postgres"],
                    "timestamp": "2026-01-13 22:30:45.123456",
                    "last_used": "2026-01-14 09:12:01.000001",
                    "use_count": 5,
                    "positive_feedback": 3,
                    "negative_feedback": 1
                },
                "b4c5d6e7f8a9b0c1d2e3f4a5b6c7d8e9": {
                    "query": "DROP TABLE users",
                    "response": "dropped",
                    "use_count": 1,
                    "positive_feedback": 0,
                    "negative_feedback": 2
                }
            },
            "feedback": [
                {"query": "List all tables", "rating": "up",
                 "timestamp": "2026-01-13 22:30:50.500000"},
                {"query": "List all tables", "rating": "sideways"}
            ],
            "stats": {
                "total_queries": 100,
                "cache_hits": 45,
                "positive_feedback": 67,
                "negative_feedback": 8
            }
        })
    }

    #[test]
    fn test_legacy_detection() {
        assert!(is_legacy(&legacy_fixture()));
        assert!(is_legacy(&json!({"schema_version": "1.0"})));
        assert!(!is_legacy(&json!({"schema_version": "2.0"})));
        // Only object roots can be legacy documents.
        assert!(!is_legacy(&json!([])));
        assert!(!is_legacy(&json!("just a string")));
    }

    #[test]
    fn test_migration_preserves_entries_and_counters() {
        let doc = migrate_legacy(legacy_fixture()).unwrap();

        assert_eq!(doc.schema_version, SchemaVersion::V2);
        assert_eq!(doc.entries.len(), 2);

        let hash = QueryHash::from_raw("List all tables");
        let entry = &doc.entries[&hash];
        assert_eq!(entry.normalized_query, "list all tables");
        assert_eq!(entry.usage.use_count, 5);
        assert_eq!(entry.feedback.positive, 3);
        assert_eq!(entry.feedback.negative, 1);
        assert!((entry.feedback.derived_score - 0.5).abs() < f64::EPSILON);
        assert!(entry.tags.contains("tables"));
        // "tables" matches the schema rule, which outranks "list"
        assert_eq!(doc.category_of(&hash), Some("schema_operations"));

        let drop_hash = QueryHash::from_raw("DROP TABLE users");
        assert_eq!(doc.category_of(&drop_hash), Some("data_deletion"));
        assert!(!doc.entries[&drop_hash].feedback.is_trusted());

        assert_eq!(doc.global_stats.total_queries_seen, 100);
        assert_eq!(doc.global_stats.cache_hit_count, 45);
        assert_eq!(doc.global_stats.total_positive_feedback, 67);
        assert_eq!(doc.global_stats.total_negative_feedback, 8);
    }

    #[test]
    fn test_migration_merges_entries_colliding_after_normalization() {
        // Legacy hashing did not collapse whitespace, so these two were
        // distinct keys in a 1.0 file but normalize to the same text.
        let doc = migrate_legacy(json!({
            "queries": {
                "aaa111": {
                    "query": "list  tables",
                    "response": "old answer",
                    "timestamp": "2026-01-10 10:00:00.000000",
                    "last_used": "2026-01-10 10:00:00.000000",
                    "use_count": 2,
                    "positive_feedback": 1,
                    "negative_feedback": 0
                },
                "bbb222": {
                    "query": "List Tables",
                    "response": "new answer",
                    "tools_used": ["postgres"],
                    "timestamp": "2026-01-12 10:00:00.000000",
                    "last_used": "2026-01-12 10:00:00.000000",
                    "use_count": 3,
                    "positive_feedback": 2,
                    "negative_feedback": 1
                }
            }
        }))
        .unwrap();

        assert_eq!(doc.entries.len(), 1);
        let entry = &doc.entries[&QueryHash::from_raw("list tables")];
        // Counters are summed; the more recently used answer wins.
        assert_eq!(entry.usage.use_count, 5);
        assert_eq!(entry.feedback.positive, 3);
        assert_eq!(entry.feedback.negative, 1);
        assert!((entry.feedback.derived_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(entry.response_text, "new answer");
        assert_eq!(entry.tools_used, vec!["postgres"]);
        assert_eq!(
            entry.timestamps.created_at,
            parse_legacy_timestamp(Some("2026-01-10 10:00:00.000000")).unwrap()
        );
    }

    #[test]
    fn test_migration_drops_unparseable_feedback_events_only() {
        let doc = migrate_legacy(legacy_fixture()).unwrap();
        assert_eq!(doc.feedback_log.len(), 1);
        assert_eq!(doc.feedback_log[0].rating, Rating::Positive);
    }

    #[test]
    fn test_migration_rejects_corrupt_structure() {
        let corrupt = json!({"queries": {"h": {"response": "answer with no query"}}});
        assert!(matches!(
            migrate_legacy(corrupt),
            Err(CacheError::Migration(_))
        ));

        let empty_query = json!({"queries": {"h": {"query": "   ", "response": "x"}}});
        assert!(matches!(
            migrate_legacy(empty_query),
            Err(CacheError::Migration(_))
        ));
    }

    #[test]
    fn test_legacy_timestamp_shapes() {
        assert!(parse_legacy_timestamp(Some("2026-01-13 22:30:45.123456")).is_some());
        assert!(parse_legacy_timestamp(Some("2026-01-13T22:30:45")).is_some());
        assert!(parse_legacy_timestamp(Some("2026-01-13T22:30:45Z")).is_some());
        assert!(parse_legacy_timestamp(Some("not a time")).is_none());
        assert!(parse_legacy_timestamp(None).is_none());
    }
}
