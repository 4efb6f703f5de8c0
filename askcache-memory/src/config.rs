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

//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the query memory cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the single JSON document holding all cache state
    pub cache_file: PathBuf,

    /// How many entries the stats surface lists as "top queries"
    pub top_query_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cache_file = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("askcache")
            .join("memory_cache.json");

        Self {
            cache_file,
            top_query_limit: 10,
        }
    }
}

impl CacheConfig {
    /// Config pointing at a specific cache file
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            cache_file: path.into(),
            ..Default::default()
        }
    }
}
