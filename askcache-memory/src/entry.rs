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

//! Cached query entries
//!
//! A [`QueryEntry`] is one question/answer pair plus the bookkeeping the
//! quality gate and the analytics surface need: usage counters, feedback
//! tallies, tags, and cross-links to related entries.

use crate::classify;
use crate::query::{normalize_query, QueryHash, Rating};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Informational token usage for the answer; never consulted by any
/// cache decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    pub input: u64,
    pub output: u64,
}

/// Creation and last-use timestamps for an entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryTimestamps {
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// How often and from which sessions an entry has been served
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageStats {
    pub use_count: u64,
    pub session_ids: BTreeSet<String>,
}

/// Accumulated user feedback for one entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackTally {
    pub positive: u64,
    pub negative: u64,
    /// Net feedback ratio in [-1, 1]; 0 when no feedback exists yet
    /// (neutral, not-yet-validated).
    pub derived_score: f64,
}

impl FeedbackTally {
    /// Apply one rating and recompute the derived score
    pub fn record(&mut self, rating: Rating) {
        match rating {
            Rating::Positive => self.positive += 1,
            Rating::Negative => self.negative += 1,
        }
        self.derived_score = Self::score(self.positive, self.negative);
    }

    /// `(p - n) / (p + n)`, or 0 with no feedback
    pub fn score(positive: u64, negative: u64) -> f64 {
        let total = positive + negative;
        if total == 0 {
            0.0
        } else {
            (positive as f64 - negative as f64) / total as f64
        }
    }

    /// The quality gate: an entry is served only when positive feedback
    /// strictly exceeds negative. A tie means not confident.
    pub fn is_trusted(&self) -> bool {
        self.positive > self.negative
    }
}

/// One cached question/answer pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntry {
    /// Query text exactly as the user typed it
    pub original_query: String,
    /// Deterministic normalization of the original (lowercased, trimmed,
    /// whitespace-collapsed); this is what got hashed
    pub normalized_query: String,
    /// The cached answer body
    pub response_text: String,
    /// Opaque caller-supplied context (e.g. which MCP server answered)
    #[serde(default)]
    pub context_info: BTreeMap<String, serde_json::Value>,
    /// Tool identifiers invoked to produce this answer, in call order
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub token_counts: TokenCounts,
    pub timestamps: EntryTimestamps,
    #[serde(default)]
    pub usage: UsageStats,
    #[serde(default)]
    pub feedback: FeedbackTally,
    /// Auto-extracted descriptive keywords; additive, analytics-only
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Informational cross-links; never consulted during lookup
    #[serde(default)]
    pub related_query_hashes: BTreeSet<QueryHash>,
}

impl QueryEntry {
    /// Build a fresh entry from an answer record. Starts with zero
    /// feedback and zero uses; tags come from the normalized text.
    pub fn from_answer(answer: &AnswerRecord, normalized: String, now: DateTime<Utc>) -> Self {
        let tags = classify::extract_tags(&normalized);
        Self {
            original_query: answer.query.clone(),
            normalized_query: normalized,
            response_text: answer.response.clone(),
            context_info: answer.context_info.clone(),
            tools_used: answer.tools_used.clone(),
            token_counts: answer.token_counts,
            timestamps: EntryTimestamps {
                created_at: now,
                last_used_at: now,
            },
            usage: UsageStats::default(),
            feedback: FeedbackTally::default(),
            tags,
            related_query_hashes: BTreeSet::new(),
        }
    }
}

/// A fresh agent answer to store in the cache
///
/// Builder-style input to [`QueryCache::record`](crate::QueryCache::record):
///
/// ```rust,ignore
/// let answer = AnswerRecord::new("List all tables", "users, orders")
///     .tool("postgres")
///     .context("server", "postgres-main")
///     .token_counts(812, 64);
/// cache.record(answer).await?;
/// ```
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    pub query: String,
    pub response: String,
    pub tools_used: Vec<String>,
    pub context_info: BTreeMap<String, serde_json::Value>,
    pub token_counts: TokenCounts,
}

impl AnswerRecord {
    /// Create a record for a query and its answer text
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            tools_used: Vec::new(),
            context_info: BTreeMap::new(),
            token_counts: TokenCounts::default(),
        }
    }

    /// Append one tool identifier
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tools_used.push(tool.into());
        self
    }

    /// Set the full tool list
    pub fn tools(mut self, tools: Vec<impl Into<String>>) -> Self {
        self.tools_used = tools.into_iter().map(|t| t.into()).collect();
        self
    }

    /// Attach an opaque context value
    pub fn context(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context_info.insert(key.into(), value.into());
        self
    }

    /// Set informational token usage
    pub fn token_counts(mut self, input: u64, output: u64) -> Self {
        self.token_counts = TokenCounts { input, output };
        self
    }

    /// Normalized form of the query text
    pub fn normalized(&self) -> String {
        normalize_query(&self.query)
    }
}
