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

//! Askcache CLI
//!
//! Offline inspection and administration of a query memory file: the
//! stats dashboard data, the per-entry view, the feedback audit log, and
//! an explicit migration trigger. All access goes through the library;
//! the file format stays private to `askcache-memory`.

use anyhow::{Context, Result};
use askcache_memory::{CacheConfig, QueryCache, Rating};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

#[derive(Parser)]
#[command(name = "askcache")]
#[command(about = "Askcache - self-learning query memory for LLM agents", long_about = None)]
struct Cli {
    /// Cache file (defaults to the per-user data directory)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Output as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show cache and learning statistics
    Stats,

    /// List the most-used cached queries
    Top {
        /// How many entries to show
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show entry counts per category
    Categories,

    /// Show the tail of the feedback audit log
    Log {
        /// How many events to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show the full cached entry for a query
    Inspect {
        /// Query text (matched after normalization)
        query: String,
    },

    /// Record feedback for a cached query
    Feedback {
        /// Query text (matched after normalization)
        query: String,

        /// Rating: "up" or "down"
        rating: String,
    },

    /// Load the cache file, migrating a legacy document in place
    Migrate,

    /// Reset the global counters (entries and feedback are kept)
    ResetStats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match cli.file {
        Some(path) => CacheConfig::with_file(path),
        None => CacheConfig::default(),
    };
    let cache = QueryCache::open(config)
        .await
        .context("failed to open cache file")?;

    match cli.command {
        Commands::Stats => {
            let stats = cache.stats().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Cache file: {}", cache.cache_file().display());
                println!("Cached entries:      {}", stats.cached_entries);
                println!("Queries seen:        {}", stats.total_queries_seen);
                println!("Cache hits:          {}", stats.cache_hit_count);
                println!("Hit rate:            {:.1}%", stats.cache_hit_rate * 100.0);
                println!("Positive feedback:   {}", stats.positive_feedback);
                println!("Negative feedback:   {}", stats.negative_feedback);
                println!("Net feedback:        {}", stats.net_feedback);
                println!(
                    "Learning efficiency: {:.1}%",
                    stats.learning_efficiency * 100.0
                );
            }
        }

        Commands::Top { limit } => {
            let stats = cache.stats().await;
            let top: Vec<_> = stats.top_queries.into_iter().take(limit).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else if top.is_empty() {
                println!("✗ No cached entries yet");
            } else {
                for (i, row) in top.iter().enumerate() {
                    println!(
                        "{:>3}. {:<50} {:>5} uses  (last {})",
                        i + 1,
                        row.query,
                        row.use_count,
                        row.last_used_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Commands::Categories => {
            let stats = cache.stats().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats.category_counts)?);
            } else if stats.category_counts.is_empty() {
                println!("✗ No cached entries yet");
            } else {
                for (name, count) in &stats.category_counts {
                    println!("{:<20} {}", name, count);
                }
            }
        }

        Commands::Log { limit } => {
            let events = cache.feedback_log(limit).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("✗ No feedback recorded yet");
            } else {
                for event in &events {
                    println!(
                        "{}  {:<4}  {}",
                        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        event.rating,
                        event.query
                    );
                }
            }
        }

        Commands::Inspect { query } => match cache.entry(&query).await {
            Some(entry) => {
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                } else {
                    println!("Query:      {}", entry.original_query);
                    println!("Normalized: {}", entry.normalized_query);
                    if let Some(category) = cache.category_of(&query).await {
                        println!("Category:   {}", category);
                    }
                    println!(
                        "Tags:       {}",
                        entry.tags.iter().cloned().collect::<Vec<_>>().join(", ")
                    );
                    println!("Tools:      {}", entry.tools_used.join(", "));
                    println!(
                        "Feedback:   {} up / {} down (score {:+.2})",
                        entry.feedback.positive, entry.feedback.negative, entry.feedback.derived_score
                    );
                    println!(
                        "Usage:      {} uses across {} sessions",
                        entry.usage.use_count,
                        entry.usage.session_ids.len()
                    );
                    println!("Created:    {}", entry.timestamps.created_at);
                    println!("Last used:  {}", entry.timestamps.last_used_at);
                    println!("Trusted:    {}", entry.feedback.is_trusted());
                    println!("\n{}", entry.response_text);
                }
            }
            None => println!("✗ No cache entry for that query"),
        },

        Commands::Feedback { query, rating } => {
            let rating = Rating::from_str(&rating)?;
            cache.feedback(&query, rating).await?;
            println!("✓ Feedback recorded: {}", rating);
        }

        Commands::Migrate => {
            // Opening the cache already migrated any legacy document.
            println!(
                "✓ Cache file at {} is on the current schema",
                cache.cache_file().display()
            );
        }

        Commands::ResetStats => {
            cache.reset_stats().await?;
            println!("✓ Global counters reset");
        }
    }

    Ok(())
}
