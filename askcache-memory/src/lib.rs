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

//! Askcache Query Memory
//!
//! A self-learning query cache for LLM agent pipelines:
//! - **Exact-match retrieval**: queries are normalized (lowercase, trim,
//!   collapse whitespace) and hashed; same normalized text, same entry.
//!   There is deliberately no fuzzy or embedding similarity.
//! - **Feedback quality gate**: a cached answer is served only while its
//!   accumulated positive feedback strictly exceeds its negative.
//! - **Categories and tags**: entries are bucketed once by keyword rules
//!   and tagged from a fixed vocabulary, for the analytics surface.
//! - **Single-document persistence**: all state lives in one JSON file,
//!   rewritten on every mutation. Legacy (unversioned) files migrate to
//!   the 2.0 schema on first load.
//!
//! # Architecture
//!
//! ```text
//! Caller (agent service)
//!    │  lookup(query, session)  -> cached answer | miss
//!    │  record(answer)
//!    │  feedback(query, rating)
//!    ▼
//! QueryCache  ─ owns all cache state, in-memory + persisted
//!    │  load() / save()  (full-file read/write)
//!    ▼
//! memory_cache.json  (single JSON document)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use askcache_memory::{AnswerRecord, CacheConfig, QueryCache, Rating};
//!
//! #[tokio::main]
//! async fn main() -> askcache_memory::CacheResult<()> {
//!     let cache = QueryCache::open(CacheConfig::default()).await?;
//!
//!     // First time: miss, so run the agent and record the answer.
//!     if cache.lookup("List all users", "session-1").await.is_none() {
//!         let answer = AnswerRecord::new("List all users", "Found 10 users")
//!             .tool("postgres");
//!         cache.record(answer).await?;
//!     }
//!
//!     // The user liked the answer; from now on it serves from cache.
//!     cache.feedback("List all users", Rating::Positive).await?;
//!     assert!(cache.lookup("list all users", "session-2").await.is_some());
//!
//!     println!("hit rate: {:.1}%", cache.stats().await.cache_hit_rate * 100.0);
//!     Ok(())
//! }
//! ```
//!
//! Caching is strictly an optimization layer: no error from this crate
//! should ever stop the caller from answering the user.

pub mod cache;
pub mod classify;
pub mod config;
pub mod document;
pub mod entry;
pub mod error;
pub mod migration;
pub mod query;
pub mod stats;
pub mod store;

// Re-exports
pub use cache::{CacheHit, QueryCache};
pub use classify::QueryCategory;
pub use config::CacheConfig;
pub use document::{CacheDocument, FeedbackEvent, GlobalStats, SchemaVersion};
pub use entry::{AnswerRecord, EntryTimestamps, FeedbackTally, QueryEntry, TokenCounts, UsageStats};
pub use error::{CacheError, CacheResult};
pub use query::{normalize_query, QueryHash, Rating};
pub use stats::{CacheStats, TopQuery};
pub use store::CacheStore;
