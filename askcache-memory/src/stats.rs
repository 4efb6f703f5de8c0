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

//! Learning and usage statistics
//!
//! Read-only aggregation over the cache document, consumed by dashboards
//! and the CLI. Per-entry feedback is summed directly from the entries so
//! the numbers stay truthful even if the global counters were reset.

use crate::document::CacheDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the "most used entries" ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopQuery {
    pub query: String,
    pub use_count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// Snapshot of cache performance and learning progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Unique entries currently stored
    pub cached_entries: usize,
    pub total_queries_seen: u64,
    pub cache_hit_count: u64,
    /// `cache_hit_count / total_queries_seen`, 0 when nothing seen yet
    pub cache_hit_rate: f64,
    /// Positive feedback summed across all entries
    pub positive_feedback: u64,
    /// Negative feedback summed across all entries
    pub negative_feedback: u64,
    pub net_feedback: i64,
    /// `positive / (positive + negative)`, 0 with no feedback
    pub learning_efficiency: f64,
    /// Entry count per category
    pub category_counts: BTreeMap<String, usize>,
    /// Ranked by use count descending, most-recently-used breaking ties
    pub top_queries: Vec<TopQuery>,
}

impl CacheStats {
    pub(crate) fn from_document(doc: &CacheDocument, top_limit: usize) -> Self {
        let positive: u64 = doc.entries.values().map(|e| e.feedback.positive).sum();
        let negative: u64 = doc.entries.values().map(|e| e.feedback.negative).sum();

        let cache_hit_rate = if doc.global_stats.total_queries_seen > 0 {
            doc.global_stats.cache_hit_count as f64 / doc.global_stats.total_queries_seen as f64
        } else {
            0.0
        };
        let learning_efficiency = if positive + negative > 0 {
            positive as f64 / (positive + negative) as f64
        } else {
            0.0
        };

        let category_counts = doc
            .categories
            .iter()
            .map(|(name, hashes)| (name.clone(), hashes.len()))
            .collect();

        let mut ranked: Vec<&crate::entry::QueryEntry> = doc.entries.values().collect();
        ranked.sort_by(|a, b| {
            b.usage
                .use_count
                .cmp(&a.usage.use_count)
                .then(b.timestamps.last_used_at.cmp(&a.timestamps.last_used_at))
        });
        let top_queries = ranked
            .into_iter()
            .take(top_limit)
            .map(|e| TopQuery {
                query: e.original_query.clone(),
                use_count: e.usage.use_count,
                last_used_at: e.timestamps.last_used_at,
            })
            .collect();

        Self {
            cached_entries: doc.entries.len(),
            total_queries_seen: doc.global_stats.total_queries_seen,
            cache_hit_count: doc.global_stats.cache_hit_count,
            cache_hit_rate,
            positive_feedback: positive,
            negative_feedback: negative,
            net_feedback: positive as i64 - negative as i64,
            learning_efficiency,
            category_counts,
            top_queries,
        }
    }
}
