//! CLI command definitions and handlers

mod cache;
mod health;
mod map;

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use repolens::cache::CACHE_DIR_ENV;
use repolens::extract::EngineChoice;
use std::path::PathBuf;
use std::time::Duration;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// repolens - feature maps, import cycles and health scores for Python repositories
#[derive(Parser, Debug)]
#[command(name = "repolens")]
#[command(
    version,
    about = "Map a repository's routes, CLIs and tools, find import cycles and score its health",
    after_help = "\
Examples:
  repolens map . --save --html          Write artifacts/feature_map.{json,md,html}
  repolens map . --policy policy.yaml   Only report hits whose tags pass the policy
  repolens map . --profile api          Scan the files selected by a named profile
  repolens health . --focus basic       Size, import and debt metrics only
  repolens cache stats                  Show tag cache statistics"
)]
pub struct Cli {
    /// Path to repository (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of parallel scan workers (1-64, default: min(4, cores))
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Base directory for the tag cache (default: user cache directory)
    #[arg(long, global = true, env = CACHE_DIR_ENV)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the feature map: routes, CLIs, tools, UI, tests and docs
    Map {
        /// Write feature_map.json and feature_map.md
        #[arg(long)]
        save: bool,

        /// Also render feature_map.html
        #[arg(long)]
        html: bool,

        /// Open the HTML page after writing it (implies --html)
        #[arg(long)]
        open: bool,

        /// Policy document (YAML) gating files and tags
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Named profile from the profiles document
        #[arg(long)]
        profile: Option<String>,

        /// Scan engine: auto, in-process, external
        #[arg(long, default_value = "auto")]
        engine: EngineChoice,

        /// Artifact directory (default: <repo>/artifacts)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Hits shown in the console preview
        #[arg(long, default_value = "30")]
        preview: usize,
    },

    /// Score repository health with weighted metrics
    Health {
        /// Comma list of metric keys, "basic", or empty for all
        #[arg(long, default_value = "")]
        focus: String,

        /// File GitHub issues for debt markers (needs the gh CLI)
        #[arg(long)]
        auto_issue: bool,

        /// JSON report path (default: <report_dir>/health.json)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Console format: text, json, markdown (or md), html
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json", "markdown", "md", "html"])]
        format: String,

        /// Named profile selecting the files to analyze
        #[arg(long)]
        profile: Option<String>,

        /// Cap on files scanned by each analyzer
        #[arg(long)]
        max_files: Option<usize>,

        /// Wall-clock budget of the import analyzer, in seconds
        #[arg(long)]
        max_seconds: Option<u64>,
    },

    /// Inspect or reset the tag cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Entry count, store size and location
    Stats,
    /// Delete the store (forces a full rebuild)
    Clean,
    /// Drop entries for files that no longer exist
    Prune,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let cache_dir = cli.cache_dir.as_deref();
    match cli.command {
        Commands::Map {
            save,
            html,
            open,
            policy,
            profile,
            engine,
            out_dir,
            preview,
        } => map::run(
            &cli.path,
            cache_dir,
            map::MapArgs {
                save,
                html: html || open,
                open,
                policy,
                profile,
                engine,
                out_dir,
                preview,
                workers: cli.workers,
            },
        ),

        Commands::Health {
            focus,
            auto_issue,
            out,
            format,
            profile,
            max_files,
            max_seconds,
        } => health::run(
            &cli.path,
            cache_dir,
            health::HealthArgs {
                focus,
                auto_issue,
                out,
                format,
                profile,
                max_files,
                max_seconds,
            },
        ),

        Commands::Cache { action } => cache::run(&cli.path, cache_dir, action),

        Commands::Version => {
            println!("repolens {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Spinner on stderr; hidden automatically when stderr is not a terminal
fn spinner(message: &str) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
