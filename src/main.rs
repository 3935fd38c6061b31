//! # searchgrep CLI
//!
//! Thin shell over the core engine. Commands map 1:1 onto core operations:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `searchgrep sync [path]` | Index a directory into the store |
//! | `searchgrep watch [path]` | Keep the store in sync with live edits |
//! | `searchgrep search <query>` | Hybrid semantic + keyword search |
//! | `searchgrep ask <query>` | Answer a question over the top results |
//! | `searchgrep info` | Show store statistics |
//! | `searchgrep clear` | Delete the store |
//!
//! Configuration comes from `~/.config/searchgrep/config.yaml`, the local
//! `.searchgreprc.yaml`, and environment variables (highest precedence).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use searchgrep::config;
use searchgrep::progress::{HumanProgress, JsonProgress, NoProgress, SyncProgress};
use searchgrep::runtime::Runtime;
use searchgrep::search::SearchOptions;
use searchgrep::sync::{self, SyncOptions};
use searchgrep::walker::FileWalker;
use searchgrep::watch::FileWatcher;
use searchgrep::{answer, search};

/// searchgrep — semantic code search for local source trees.
#[derive(Parser)]
#[command(
    name = "searchgrep",
    about = "Semantic code search: hybrid dense + BM25 retrieval over local source trees",
    version
)]
struct Cli {
    /// Logical store name under the data directory.
    #[arg(long, global = true, default_value = "default")]
    store: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory: diff against the store and embed what changed.
    Sync {
        /// Directory to index (defaults to the current directory).
        path: Option<PathBuf>,

        /// Diff and report without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Number of concurrent embedding uploads.
        #[arg(long, default_value_t = sync::DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Progress style: human, json, or off.
        #[arg(long, default_value = "human")]
        progress: String,
    },

    /// Watch a directory and keep the store in sync with live edits.
    Watch {
        /// Directory to watch (defaults to the current directory).
        path: Option<PathBuf>,
    },

    /// Search indexed chunks.
    Search {
        /// Natural-language or keyword query.
        query: String,

        /// Maximum results (one per file).
        #[arg(long, default_value_t = 10)]
        top_k: usize,

        /// Disable BM25 fusion; rank by dense similarity alone.
        #[arg(long)]
        no_hybrid: bool,

        /// Restrict to file extensions (repeatable), e.g. `--file-type rs`.
        #[arg(long = "file-type")]
        file_types: Vec<String>,

        /// Emit results as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question using the best-matching chunks as context.
    Ask {
        /// The question to answer.
        query: String,

        /// Number of chunks to hand to the model.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Show store statistics.
    Info,

    /// Delete the store and its persisted file.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let cfg = config::load_config(&cwd)?;
    let runtime = Runtime::new(cfg)?;

    match cli.command {
        Commands::Sync {
            path,
            dry_run,
            concurrency,
            progress,
        } => {
            let root = path.unwrap_or(cwd);
            let store = runtime.open_store(&cli.store)?;
            let walker = FileWalker::new(&root, &runtime.config);
            let reporter: Arc<dyn SyncProgress> = match progress.as_str() {
                "json" => Arc::new(JsonProgress),
                "off" => Arc::new(NoProgress),
                _ => Arc::new(HumanProgress),
            };
            let options = SyncOptions {
                dry_run,
                concurrency,
                progress: reporter,
            };
            let report = sync::sync(store, &walker, runtime.clock.as_ref(), &options).await?;

            if dry_run {
                println!("sync {} (dry-run)", root.display());
            } else {
                println!("sync {}", root.display());
            }
            println!("  uploaded: {}", report.uploaded);
            println!("  deleted:  {}", report.deleted);
            println!("  skipped:  {}", report.skipped);
            if !report.errors.is_empty() {
                println!("  errors:   {}", report.errors.len());
                for e in &report.errors {
                    println!("    {}: {}", e.path, e.message);
                }
            }
            println!("  took {} ms", report.duration_ms);
        }

        Commands::Watch { path } => {
            let root = path.unwrap_or(cwd);
            let store = runtime.open_store(&cli.store)?;
            println!("watching {} — press Ctrl-C to stop", root.display());
            let watcher = FileWatcher::new(&root, store);
            watcher
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }

        Commands::Search {
            query,
            top_k,
            no_hybrid,
            file_types,
            json,
        } => {
            let store = runtime.open_store(&cli.store)?;
            let options = SearchOptions {
                top_k,
                hybrid: !no_hybrid,
                file_types,
                include_content: false,
            };
            let results =
                search::search(&store, runtime.embedder.as_ref(), &query, &options).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {}:{}-{}",
                        i + 1,
                        r.score,
                        r.path,
                        r.line_start,
                        r.line_end
                    );
                    for line in r.chunk.lines().take(3) {
                        println!("     {}", line);
                    }
                    println!();
                }
            }
        }

        Commands::Ask { query, top_k } => {
            let store = runtime.open_store(&cli.store)?;
            let reply = answer::ask(
                &store,
                runtime.embedder.as_ref(),
                runtime.chat.as_deref(),
                &query,
                top_k,
            )
            .await?;
            println!("{}", reply);
        }

        Commands::Info => {
            let store = runtime.open_store(&cli.store)?;
            let info = store.info().await;
            println!("store: {}", info.name);
            println!("  files: {}", info.file_count);
            println!("  total size: {} bytes", info.total_size);
            println!("  last updated: {}", format_millis(info.last_updated));
        }

        Commands::Clear => {
            let store = runtime.open_store(&cli.store)?;
            store.clear().await?;
            println!("store '{}' cleared", cli.store);
        }
    }

    Ok(())
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}
