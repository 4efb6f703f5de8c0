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

//! Query categorization and tag extraction
//!
//! Categories are assigned once, at entry creation or migration, by a
//! first-match-wins keyword scan in fixed precedence order. Destructive
//! intent outranks everything else so that "delete old user records"
//! lands in `data_deletion` even though it also mentions reads.
//!
//! Tags are additive: every vocabulary term found in the normalized text
//! becomes a tag. They feed analytics and cross-linking, never retrieval.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const DELETION_KEYWORDS: &[&str] = &["delete", "drop", "remove"];
const MODIFICATION_KEYWORDS: &[&str] = &["update", "modify", "change"];
const INSERTION_KEYWORDS: &[&str] = &["insert", "add", "create"];
const SCHEMA_KEYWORDS: &[&str] = &["schema", "table", "column"];
const READ_KEYWORDS: &[&str] = &["select", "list", "show", "get", "find"];

/// Fixed vocabulary scanned for tags: SQL verbs, schema-object nouns, and
/// the domain nouns that show up in agent queries against the demo servers.
const TAG_VOCABULARY: &[&str] = &[
    // SQL verbs
    "select", "insert", "update", "delete", "drop", "create", "alter", "join",
    "count", "sum", "average",
    // schema objects
    "table", "tables", "column", "columns", "index", "database", "schema",
    "view", "row", "rows", "key",
    // domain nouns
    "users", "employees", "customers", "orders", "products", "invoices",
    "sales", "inventory", "accounts", "reports", "repositories", "issues",
];

/// Sticky classification bucket for a cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryCategory {
    /// Destructive operations (delete, drop, remove)
    DataDeletion,
    /// Mutating operations (update, modify, change)
    DataModification,
    /// Creating operations (insert, add, create)
    DataInsertion,
    /// Schema-level operations (schema, table, column)
    SchemaOperations,
    /// Read operations (select, list, show, get, find)
    DatabaseQueries,
    /// Everything else
    General,
}

impl QueryCategory {
    /// Classify normalized query text. First matching rule wins; the
    /// precedence order is part of the contract.
    pub fn classify(normalized: &str) -> Self {
        let tokens = tokenize(normalized);
        let rules: &[(&[&str], QueryCategory)] = &[
            (DELETION_KEYWORDS, QueryCategory::DataDeletion),
            (MODIFICATION_KEYWORDS, QueryCategory::DataModification),
            (INSERTION_KEYWORDS, QueryCategory::DataInsertion),
            (SCHEMA_KEYWORDS, QueryCategory::SchemaOperations),
            (READ_KEYWORDS, QueryCategory::DatabaseQueries),
        ];
        for (keywords, category) in rules {
            if keywords.iter().any(|kw| contains_keyword(&tokens, kw)) {
                return *category;
            }
        }
        QueryCategory::General
    }

    /// Stable name used as the key in the category index
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::DataDeletion => "data_deletion",
            QueryCategory::DataModification => "data_modification",
            QueryCategory::DataInsertion => "data_insertion",
            QueryCategory::SchemaOperations => "schema_operations",
            QueryCategory::DatabaseQueries => "database_queries",
            QueryCategory::General => "general",
        }
    }
}

impl std::fmt::Display for QueryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract every vocabulary term present in the normalized query text
pub fn extract_tags(normalized: &str) -> BTreeSet<String> {
    let tokens = tokenize(normalized);
    TAG_VOCABULARY
        .iter()
        .filter(|term| tokens.contains(**term))
        .map(|term| term.to_string())
        .collect()
}

fn tokenize(normalized: &str) -> BTreeSet<&str> {
    normalized
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Token match with naive plural handling so "tables" triggers "table".
/// Substring matching is avoided on purpose: "add" must not fire on
/// "address", nor "drop" on "dropdown".
fn contains_keyword(tokens: &BTreeSet<&str>, keyword: &str) -> bool {
    if tokens.contains(keyword) {
        return true;
    }
    tokens
        .iter()
        .any(|t| t.strip_suffix('s') == Some(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_precedence() {
        // "drop" outranks "table"
        assert_eq!(
            QueryCategory::classify("drop table users"),
            QueryCategory::DataDeletion
        );
        // "update" outranks "select"
        assert_eq!(
            QueryCategory::classify("update the list of users"),
            QueryCategory::DataModification
        );
        assert_eq!(
            QueryCategory::classify("insert a new order"),
            QueryCategory::DataInsertion
        );
        assert_eq!(
            QueryCategory::classify("what columns does this have"),
            QueryCategory::SchemaOperations
        );
        assert_eq!(
            QueryCategory::classify("select * from users"),
            QueryCategory::DatabaseQueries
        );
        assert_eq!(
            QueryCategory::classify("hello there"),
            QueryCategory::General
        );
    }

    #[test]
    fn test_classification_matches_whole_tokens_only() {
        // "address" must not trigger the "add" rule
        assert_eq!(
            QueryCategory::classify("show the address of each customer"),
            QueryCategory::DatabaseQueries
        );
    }

    #[test]
    fn test_plural_keyword_matches() {
        assert_eq!(
            QueryCategory::classify("describe the tables"),
            QueryCategory::SchemaOperations
        );
        // The plural schema noun still outranks the read verb.
        assert_eq!(
            QueryCategory::classify("list all tables"),
            QueryCategory::SchemaOperations
        );
    }

    #[test]
    fn test_tag_extraction() {
        let tags = extract_tags("select all users from the employees table");
        assert!(tags.contains("select"));
        assert!(tags.contains("users"));
        assert!(tags.contains("employees"));
        assert!(tags.contains("table"));
        assert!(!tags.contains("from"));
    }

    #[test]
    fn test_tag_extraction_empty_for_plain_text() {
        assert!(extract_tags("hello there").is_empty());
    }
}
