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

//! Query normalization, hashing, and feedback ratings
//!
//! Normalized query text is the sole similarity mechanism in the cache:
//! two queries that normalize to the same string share one entry. There is
//! no fuzzy or embedding-based matching, deliberately.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};

/// Normalize raw query text before hashing.
///
/// Lowercases, trims, and collapses internal whitespace runs to a single
/// space. Idempotent: normalizing already-normalized text is a no-op.
pub fn normalize_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic digest of a normalized query, used as the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryHash(pub String);

impl QueryHash {
    /// Hash normalized query text. The input must already be normalized;
    /// callers go through [`normalize_query`] first.
    pub fn from_normalized(normalized: &str) -> Self {
        let digest = blake3::hash(normalized.as_bytes());
        Self(hex::encode(digest.as_bytes()))
    }

    /// Normalize and hash raw query text in one step
    pub fn from_raw(query: &str) -> Self {
        Self::from_normalized(&normalize_query(query))
    }
}

impl std::fmt::Display for QueryHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User rating attached to a cached response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    /// Thumbs up
    #[serde(rename = "up")]
    Positive,
    /// Thumbs down
    #[serde(rename = "down")]
    Negative,
}

impl Rating {
    /// Short wire form ("up" / "down"), matching the persisted feedback log
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Positive => "up",
            Rating::Negative => "down",
        }
    }
}

impl std::str::FromStr for Rating {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "positive" | "+1" => Ok(Rating::Positive),
            "down" | "negative" | "-1" => Ok(Rating::Negative),
            other => Err(CacheError::InvalidRating(other.to_string())),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_query("  List All Tables  "), "list all tables");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_query("list\t all\n\n tables"), "list all tables");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_query("  Show   ME  the Users ");
        assert_eq!(normalize_query(&once), once);
    }

    #[test]
    fn test_hash_insensitive_to_phrasing_noise() {
        assert_eq!(
            QueryHash::from_raw("List All Tables"),
            QueryHash::from_raw("  list   all tables ")
        );
        assert_ne!(
            QueryHash::from_raw("list all tables"),
            QueryHash::from_raw("list all users")
        );
    }

    #[test]
    fn test_rating_parsing() {
        assert_eq!(Rating::from_str("up").unwrap(), Rating::Positive);
        assert_eq!(Rating::from_str(" DOWN ").unwrap(), Rating::Negative);
        assert_eq!(Rating::from_str("positive").unwrap(), Rating::Positive);
        assert!(matches!(
            Rating::from_str("meh"),
            Err(CacheError::InvalidRating(_))
        ));
    }
}
