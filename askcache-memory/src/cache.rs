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

//! The query memory cache engine
//!
//! Sits between the agent-invocation layer and the backing JSON document.
//! Decides whether a stored answer is trustworthy enough to serve without
//! re-running the agent pipeline, records fresh answers, and absorbs user
//! feedback.
//!
//! Every operation is a full read-modify-write of the in-memory document,
//! so a single `tokio::sync::Mutex` serializes all callers; without it,
//! two concurrent feedback calls could lose each other's increments.
//! The document persists on every hit, record, and feedback call; there
//! is no write batching. Durability over throughput, which is the right
//! trade for a low-QPS interactive cache.

use crate::classify::QueryCategory;
use crate::config::CacheConfig;
use crate::document::{CacheDocument, FeedbackEvent};
use crate::entry::{AnswerRecord, QueryEntry};
use crate::error::{CacheError, CacheResult};
use crate::query::{QueryHash, Rating};
use crate::stats::CacheStats;
use crate::store::CacheStore;
use chrono::{DateTime, Utc};
use std::collections::{btree_map, BTreeSet};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A cached answer that passed the quality gate
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub hash: QueryHash,
    /// The query text as originally recorded
    pub original_query: String,
    pub response_text: String,
    pub tools_used: Vec<String>,
    pub tags: BTreeSet<String>,
    /// Times this entry has been served, including this hit
    pub use_count: u64,
    pub derived_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Feedback-gated query cache with a single persisted JSON document
///
/// Construct one instance at service startup and share it by reference;
/// the instance owns the backing file exclusively for its lifetime.
#[derive(Debug)]
pub struct QueryCache {
    config: CacheConfig,
    store: CacheStore,
    document: Mutex<CacheDocument>,
}

impl QueryCache {
    /// Open the cache, loading (and if necessary migrating) the backing
    /// document. Migration failure is the one startup error worth
    /// treating as fatal; the caller may still choose to run cache-less.
    pub async fn open(config: CacheConfig) -> CacheResult<Self> {
        let store = CacheStore::new(&config.cache_file);
        let document = store.load()?;
        Ok(Self {
            config,
            store,
            document: Mutex::new(document),
        })
    }

    /// Open with the default configuration
    pub async fn open_default() -> CacheResult<Self> {
        Self::open(CacheConfig::default()).await
    }

    /// Look up a cached answer for `query`.
    ///
    /// Serves the stored response only when the entry's positive feedback
    /// strictly exceeds its negative feedback; a tie or an absent entry is
    /// a miss. Each call counts once toward `total_queries_seen`,
    /// regardless of outcome.
    ///
    /// A hit updates usage bookkeeping and persists. If that persist
    /// fails the hit is still served; losing a counter update must never
    /// cost the user an answer.
    pub async fn lookup(&self, query: &str, session_id: &str) -> Option<CacheHit> {
        let hash = QueryHash::from_raw(query);
        let now = Utc::now();

        let mut doc = self.document.lock().await;
        doc.global_stats.total_queries_seen += 1;

        let hit = match doc.entries.get_mut(&hash) {
            Some(entry) if entry.feedback.is_trusted() => {
                entry.usage.use_count += 1;
                entry.usage.session_ids.insert(session_id.to_string());
                entry.timestamps.last_used_at = now;
                CacheHit {
                    hash: hash.clone(),
                    original_query: entry.original_query.clone(),
                    response_text: entry.response_text.clone(),
                    tools_used: entry.tools_used.clone(),
                    tags: entry.tags.clone(),
                    use_count: entry.usage.use_count,
                    derived_score: entry.feedback.derived_score,
                    created_at: entry.timestamps.created_at,
                }
            }
            // entry absent, or present but not trusted: both are misses
            _ => return None,
        };
        doc.global_stats.cache_hit_count += 1;

        info!(use_count = hit.use_count, hash = %hash, "serving cached response");
        if let Err(e) = self.persist(&mut doc) {
            warn!(error = %e, "could not persist cache hit bookkeeping");
        }
        Some(hit)
    }

    /// Store a fresh agent answer.
    ///
    /// A repeat of an already-cached query overwrites the answer body,
    /// context, tools, and token counts in place; feedback history,
    /// category, and tags stay untouched, so a previously distrusted
    /// entry keeps carrying its record even under new text.
    pub async fn record(&self, answer: AnswerRecord) -> CacheResult<()> {
        let normalized = answer.normalized();
        let hash = QueryHash::from_normalized(&normalized);
        let now = Utc::now();

        let mut guard = self.document.lock().await;
        let doc = &mut *guard;
        match doc.entries.entry(hash) {
            btree_map::Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.response_text = answer.response;
                entry.context_info = answer.context_info;
                entry.tools_used = answer.tools_used;
                entry.token_counts = answer.token_counts;
                entry.timestamps.last_used_at = now;
                // feedback history, category, and tags deliberately kept
            }
            btree_map::Entry::Vacant(vacant) => {
                let category = QueryCategory::classify(&normalized);
                doc.categories
                    .entry(category.as_str().to_string())
                    .or_default()
                    .insert(vacant.key().clone());
                vacant.insert(QueryEntry::from_answer(&answer, normalized, now));
            }
        }
        self.persist(doc)
    }

    /// Record a user rating for a cached answer.
    ///
    /// The entry must exist: feedback refers to a specific cached
    /// response, so rating an un-cached query is a [`CacheError::NotFound`].
    /// The event is appended to the audit log and the entry's trust
    /// tally is updated; enough negative ratings flip the quality gate.
    pub async fn feedback(&self, query: &str, rating: Rating) -> CacheResult<()> {
        let hash = QueryHash::from_raw(query);
        let now = Utc::now();

        let mut doc = self.document.lock().await;
        let entry = doc
            .entries
            .get_mut(&hash)
            .ok_or_else(|| CacheError::NotFound(query.to_string()))?;
        entry.feedback.record(rating);

        match rating {
            Rating::Positive => doc.global_stats.total_positive_feedback += 1,
            Rating::Negative => doc.global_stats.total_negative_feedback += 1,
        }
        doc.feedback_log.push(FeedbackEvent {
            hash,
            query: query.to_string(),
            rating,
            timestamp: now,
        });

        info!(rating = %rating, "feedback recorded");
        self.persist(&mut doc)
    }

    /// Cross-link two cached queries as related, both directions.
    /// Links are informational only; lookup never consults them.
    pub async fn relate(&self, first: &str, second: &str) -> CacheResult<()> {
        let first_hash = QueryHash::from_raw(first);
        let second_hash = QueryHash::from_raw(second);

        let mut doc = self.document.lock().await;
        if !doc.entries.contains_key(&first_hash) {
            return Err(CacheError::NotFound(first.to_string()));
        }
        if !doc.entries.contains_key(&second_hash) {
            return Err(CacheError::NotFound(second.to_string()));
        }

        if let Some(entry) = doc.entries.get_mut(&first_hash) {
            entry.related_query_hashes.insert(second_hash.clone());
        }
        if let Some(entry) = doc.entries.get_mut(&second_hash) {
            entry.related_query_hashes.insert(first_hash);
        }
        self.persist(&mut doc)
    }

    /// Extend an entry's tag set beyond what auto-extraction found
    pub async fn add_tags<I, S>(&self, query: &str, tags: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hash = QueryHash::from_raw(query);

        let mut doc = self.document.lock().await;
        let entry = doc
            .entries
            .get_mut(&hash)
            .ok_or_else(|| CacheError::NotFound(query.to_string()))?;
        entry.tags.extend(tags.into_iter().map(|t| t.into()));
        self.persist(&mut doc)
    }

    /// Snapshot of learning and usage statistics. Read-only.
    pub async fn stats(&self) -> CacheStats {
        let doc = self.document.lock().await;
        CacheStats::from_document(&doc, self.config.top_query_limit)
    }

    /// Explicitly zero the global counters. Entries, feedback tallies,
    /// and the audit log are untouched.
    pub async fn reset_stats(&self) -> CacheResult<()> {
        let mut doc = self.document.lock().await;
        doc.global_stats.reset();
        self.persist(&mut doc)
    }

    /// Fetch an entry by query text without any hit bookkeeping
    pub async fn entry(&self, query: &str) -> Option<QueryEntry> {
        let hash = QueryHash::from_raw(query);
        let doc = self.document.lock().await;
        doc.entries.get(&hash).cloned()
    }

    /// The sticky category an entry was assigned at creation
    pub async fn category_of(&self, query: &str) -> Option<String> {
        let hash = QueryHash::from_raw(query);
        let doc = self.document.lock().await;
        doc.category_of(&hash).map(str::to_string)
    }

    /// The most recent `limit` feedback events, oldest first
    pub async fn feedback_log(&self, limit: usize) -> Vec<FeedbackEvent> {
        let doc = self.document.lock().await;
        let skip = doc.feedback_log.len().saturating_sub(limit);
        doc.feedback_log[skip..].to_vec()
    }

    /// Backing file location
    pub fn cache_file(&self) -> &std::path::Path {
        self.store.path()
    }

    fn persist(&self, doc: &mut CacheDocument) -> CacheResult<()> {
        doc.touch(Utc::now());
        self.store.save(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_temp(dir: &tempfile::TempDir) -> QueryCache {
        QueryCache::open(CacheConfig::with_file(dir.path().join("memory_cache.json")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_feedback_on_unknown_query_is_not_found() {
        let dir = tempdir().unwrap();
        let cache = open_temp(&dir).await;

        let err = cache
            .feedback("never recorded", Rating::Positive)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
        // and nothing was appended to the audit log
        assert!(cache.feedback_log(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_record_then_feedback_then_hit() {
        let dir = tempdir().unwrap();
        let cache = open_temp(&dir).await;

        cache
            .record(AnswerRecord::new("List all users", "Found 10 users").tool("postgres"))
            .await
            .unwrap();

        // no feedback yet: quality gate fails
        assert!(cache.lookup("list all users", "s1").await.is_none());

        cache.feedback("LIST ALL USERS", Rating::Positive).await.unwrap();

        let hit = cache.lookup("  list   all users ", "s1").await.unwrap();
        assert_eq!(hit.response_text, "Found 10 users");
        assert_eq!(hit.use_count, 1);
        assert_eq!(hit.tools_used, vec!["postgres"]);
    }

    #[tokio::test]
    async fn test_relate_links_both_directions() {
        let dir = tempdir().unwrap();
        let cache = open_temp(&dir).await;

        cache
            .record(AnswerRecord::new("list users", "10 users"))
            .await
            .unwrap();
        cache
            .record(AnswerRecord::new("count users", "10"))
            .await
            .unwrap();

        cache.relate("list users", "count users").await.unwrap();

        let first = cache.entry("list users").await.unwrap();
        let second = cache.entry("count users").await.unwrap();
        assert!(first
            .related_query_hashes
            .contains(&QueryHash::from_raw("count users")));
        assert!(second
            .related_query_hashes
            .contains(&QueryHash::from_raw("list users")));

        let err = cache.relate("list users", "unknown").await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_tags_extends_auto_extracted_set() {
        let dir = tempdir().unwrap();
        let cache = open_temp(&dir).await;

        cache
            .record(AnswerRecord::new("list all users", "10 users"))
            .await
            .unwrap();
        cache
            .add_tags("list all users", ["hr", "quarterly"])
            .await
            .unwrap();

        let entry = cache.entry("list all users").await.unwrap();
        assert!(entry.tags.contains("users")); // auto
        assert!(entry.tags.contains("hr")); // explicit
        assert!(entry.tags.contains("quarterly"));
    }

    #[tokio::test]
    async fn test_reset_stats_zeroes_global_counters_only() {
        let dir = tempdir().unwrap();
        let cache = open_temp(&dir).await;

        cache
            .record(AnswerRecord::new("list users", "10 users"))
            .await
            .unwrap();
        cache.feedback("list users", Rating::Positive).await.unwrap();
        cache.lookup("list users", "s1").await.unwrap();

        cache.reset_stats().await.unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.total_queries_seen, 0);
        assert_eq!(stats.cache_hit_count, 0);
        // entry-level tallies survive a reset
        assert_eq!(stats.positive_feedback, 1);
        let entry = cache.entry("list users").await.unwrap();
        assert_eq!(entry.usage.use_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_feedback_loses_no_increments() {
        let dir = tempdir().unwrap();
        let cache = std::sync::Arc::new(open_temp(&dir).await);

        cache
            .record(AnswerRecord::new("list users", "10 users"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.feedback("list users", Rating::Positive).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let entry = cache.entry("list users").await.unwrap();
        assert_eq!(entry.feedback.positive, 16);
        assert_eq!(cache.feedback_log(100).await.len(), 16);
    }
}
