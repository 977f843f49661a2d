//! Map command - build, preview and save the feature map

use super::spinner;
use anyhow::Result;
use console::style;
use repolens::extract::EngineChoice;
use repolens::pipeline::{build_feature_map, save_feature_map, MapOptions, Workspace, DEFAULT_ARTIFACT_DIR};
use repolens::reporters::feature_map_preview;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::warn;

pub struct MapArgs {
    pub save: bool,
    pub html: bool,
    pub open: bool,
    pub policy: Option<PathBuf>,
    pub profile: Option<String>,
    pub engine: EngineChoice,
    pub out_dir: Option<PathBuf>,
    pub preview: usize,
    pub workers: Option<usize>,
}

pub fn run(path: &Path, cache_dir: Option<&Path>, args: MapArgs) -> Result<()> {
    let ws = Workspace::open(path, cache_dir)?;

    let progress = spinner("Scanning candidate files...");
    let opts = MapOptions {
        policy: args.policy,
        profile: args.profile,
        engine: args.engine,
        workers: args.workers,
    };
    let map = build_feature_map(&ws, &opts)?;
    progress.finish_and_clear();

    println!("\n{} {}\n", style("Feature map").bold(), style(ws.root.display()).cyan());
    print!("{}", feature_map_preview(&map, args.preview));

    let stats = ws.cache.stats();
    println!(
        "{}",
        style(format!(
            "tag cache: {} hits, {} misses ({}), {} entries, {} KB",
            stats.hits, stats.misses, stats.hit_rate, stats.entries, stats.store_size_kb
        ))
        .dim()
    );

    if args.save || args.html {
        let out_dir = args
            .out_dir
            .unwrap_or_else(|| ws.root.join(DEFAULT_ARTIFACT_DIR));
        let written = save_feature_map(&map, &out_dir, args.html)?;
        println!();
        for file in &written {
            println!("{} {}", style("wrote").green(), file.display());
        }
        if args.open {
            if let Some(page) = written.iter().find(|p| p.extension().is_some_and(|e| e == "html")) {
                open_in_browser(page);
            }
        }
    }
    Ok(())
}

/// Best-effort platform opener
fn open_in_browser(path: &Path) {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    let result = cmd
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
    if let Err(e) = result {
        warn!("Could not open {}: {}", path.display(), e);
    }
}
