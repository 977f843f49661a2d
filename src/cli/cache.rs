//! Cache command - inspect, clean or prune the tag cache

use super::CacheAction;
use anyhow::{Context, Result};
use console::style;
use repolens::pipeline::Workspace;
use std::path::Path;

pub fn run(path: &Path, cache_dir: Option<&Path>, action: CacheAction) -> Result<()> {
    let ws = Workspace::open(path, cache_dir)?;
    let store = ws.cache.store_path().to_path_buf();

    match action {
        CacheAction::Stats => {
            let stats = ws.cache.stats();
            println!("  Repository: {}", style(ws.root.display()).cyan());
            println!("  Store:      {}", style(store.display()).dim());
            println!("  Entries:    {}", style(stats.entries).cyan());
            println!("  Size:       {} KB", stats.store_size_kb);
            if !store.exists() {
                println!(
                    "  {} No store yet; run {} to build it",
                    style("[--]").dim(),
                    style("repolens map").cyan()
                );
            }
        }
        CacheAction::Clean => {
            if store.exists() {
                std::fs::remove_file(&store)
                    .with_context(|| format!("Failed to remove {}", store.display()))?;
                println!("Removed: {}", store.display());
            } else {
                println!("No tag cache at {}", store.display());
            }
        }
        CacheAction::Prune => {
            let removed = ws.cache.cleanup_stale();
            ws.cache.flush()?;
            println!(
                "Pruned {} stale entr{}; {} remain.",
                removed,
                if removed == 1 { "y" } else { "ies" },
                ws.cache.len()
            );
        }
    }
    Ok(())
}
