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

//! Cache error types
//!
//! Every error here is recoverable by the caller: the agent pipeline must
//! keep answering users even with caching disabled. Only [`CacheError::Migration`]
//! during startup is reasonable to treat as fatal, since an ambiguous
//! half-migrated document is worse than no cache.

use thiserror::Error;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur in the query memory cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing document could not be written
    #[error("storage error: {0}")]
    Storage(String),

    /// A legacy document was found but could not be converted to the
    /// current schema
    #[error("cache migration failed: {0}")]
    Migration(String),

    /// Feedback or cross-linking referenced a query with no cache entry
    #[error("no cache entry for query: {0}")]
    NotFound(String),

    /// A rating string was neither positive nor negative
    #[error("invalid rating {0:?}: expected \"up\" or \"down\"")]
    InvalidRating(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}
