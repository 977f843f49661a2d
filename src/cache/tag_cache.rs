//! Persistent tag cache keyed by repository-relative path
//!
//! An entry is reused only while the file's mtime and size both match the
//! values recorded when its tags were extracted. The store is a single
//! versioned `bitcode` blob that is rewritten atomically on [`TagCache::flush`]
//! and is always safe to delete.
//!
//! # Example
//!
//! ```ignore
//! let cache = TagCache::open(repo_root, &paths::get_tag_store_path(repo_root));
//! let tags = cache.get_tags(&repo_root.join("api/server.py"));
//! cache.flush()?;
//! ```

use super::tags::{scan_tag_lines, TAG_WINDOW_LINES};
use crate::discovery::{mtime_ns, relative_path};
use crate::models::{Maturity, Tags};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// Store format version - bump when the entry schema changes
const STORE_VERSION: u32 = 2;

/// Cached tags of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCacheEntry {
    pub rel_path: String,
    pub mtime_ns: u128,
    pub size: u64,
    pub tags: Tags,
}

/// On-disk form of [`Tags`]
///
/// bitcode cannot encode skipped fields, so the store keeps every field
/// while the JSON view of `Tags` omits empty ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTags {
    expose: bool,
    owner: Option<String>,
    maturity: Option<Maturity>,
}

impl From<&Tags> for StoredTags {
    fn from(tags: &Tags) -> Self {
        Self {
            expose: tags.expose,
            owner: tags.owner.clone(),
            maturity: tags.maturity,
        }
    }
}

impl From<StoredTags> for Tags {
    fn from(stored: StoredTags) -> Self {
        Tags {
            expose: stored.expose,
            owner: stored.owner,
            maturity: stored.maturity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    mtime_ns: u128,
    size: u64,
    tags: StoredTags,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    version: u32,
    entries: BTreeMap<String, StoredEntry>,
}

/// Hit/miss counters and store size
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: String,
    pub entries: usize,
    pub store_size_kb: u64,
}

/// Explicit, injectable tag cache handle
pub struct TagCache {
    root: PathBuf,
    store_path: PathBuf,
    entries: RwLock<HashMap<String, TagCacheEntry>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    dirty: AtomicBool,
}

impl TagCache {
    /// Open the cache for `root`, loading `store_path` when it is readable
    ///
    /// A missing, corrupt or outdated store yields an empty cache.
    pub fn open(root: &Path, store_path: &Path) -> Self {
        let entries = match load_store(store_path) {
            Ok(Some(entries)) => {
                debug!("Loaded tag cache with {} entries", entries.len());
                entries
            }
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!(
                    "Tag cache at {} is unreadable, rebuilding: {:#}",
                    store_path.display(),
                    e
                );
                HashMap::new()
            }
        };

        Self {
            root: root.to_path_buf(),
            store_path: store_path.to_path_buf(),
            entries: RwLock::new(entries),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    fn key_for(&self, path: &Path) -> String {
        relative_path(&self.root, path).unwrap_or_else(|| path.to_string_lossy().to_string())
    }

    /// Tags of the file at `path`, reading it only on a cache miss
    pub fn get_tags(&self, path: &Path) -> Tags {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("Cannot stat {}: {}", path.display(), e);
                return Tags::default();
            }
        };
        let key = self.key_for(path);
        let mtime = mtime_ns(&meta);
        let size = meta.len();

        if let Some(tags) = self.lookup(&key, mtime, size) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return tags;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let tags = extract_from_file(path);
        let entry = TagCacheEntry {
            rel_path: key.clone(),
            mtime_ns: mtime,
            size,
            tags: tags.clone(),
        };
        match self.entries.write() {
            Ok(mut guard) => {
                guard.insert(key, entry);
                self.dirty.store(true, Ordering::Relaxed);
            }
            Err(_) => warn!("Tag cache lock poisoned; entry for {} not stored", path.display()),
        }
        tags
    }

    fn lookup(&self, key: &str, mtime: u128, size: u64) -> Option<Tags> {
        let guard = self.entries.read().ok()?;
        let entry = guard.get(key)?;
        (entry.mtime_ns == mtime && entry.size == size).then(|| entry.tags.clone())
    }

    /// Refresh tags for many files; there is no cross-file invariant
    pub fn batch_update(&self, paths: &[PathBuf]) {
        for path in paths {
            self.get_tags(path);
        }
    }

    /// Whether a (possibly stale) entry exists for `path`
    pub fn contains(&self, path: &Path) -> bool {
        let key = self.key_for(path);
        self.entries
            .read()
            .map(|guard| guard.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose files no longer exist; returns how many were removed
    pub fn cleanup_stale(&self) -> usize {
        let Ok(mut guard) = self.entries.write() else {
            return 0;
        };
        let before = guard.len();
        let root = self.root.clone();
        guard.retain(|key, _| root.join(key).exists());
        let removed = before - guard.len();
        if removed > 0 {
            self.dirty.store(true, Ordering::Relaxed);
            info!("Removed {} stale tag cache entries", removed);
        }
        removed
    }

    /// Write the whole store to disk atomically (temp file + rename)
    pub fn flush(&self) -> Result<()> {
        if !self.dirty.load(Ordering::Relaxed) && self.store_path.exists() {
            return Ok(());
        }

        let data = {
            let guard = self
                .entries
                .read()
                .map_err(|_| anyhow::anyhow!("tag cache lock poisoned"))?;
            StoreData {
                version: STORE_VERSION,
                entries: guard
                    .iter()
                    .map(|(k, v)| {
                        let stored = StoredEntry {
                            mtime_ns: v.mtime_ns,
                            size: v.size,
                            tags: StoredTags::from(&v.tags),
                        };
                        (k.clone(), stored)
                    })
                    .collect(),
            }
        };

        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let bytes = bitcode::serialize(&data).context("Failed to encode tag cache")?;
        let tmp = self.store_path.with_extension("tmp");
        fs::write(&tmp, bytes).context("Failed to write temp tag cache")?;
        fs::rename(&tmp, &self.store_path).context("Failed to rename temp tag cache")?;

        self.dirty.store(false, Ordering::Relaxed);
        debug!(
            "Flushed tag cache with {} entries to {}",
            data.entries.len(),
            self.store_path.display()
        );
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total > 0 {
            hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate: format!("{:.1}%", rate),
            entries: self.len(),
            store_size_kb: fs::metadata(&self.store_path)
                .map(|m| m.len() / 1024)
                .unwrap_or(0),
        }
    }
}

fn load_store(path: &Path) -> Result<Option<HashMap<String, TagCacheEntry>>> {
    if !path.exists() {
        debug!("No tag cache found at {}", path.display());
        return Ok(None);
    }
    let bytes = fs::read(path).context("Failed to read tag cache")?;
    let data: StoreData = bitcode::deserialize(&bytes).context("Failed to decode tag cache")?;
    if data.version != STORE_VERSION {
        info!(
            "Tag cache version mismatch (got {}, expected {}), rebuilding",
            data.version, STORE_VERSION
        );
        return Ok(None);
    }
    let entries = data
        .entries
        .into_iter()
        .map(|(key, stored)| {
            let entry = TagCacheEntry {
                rel_path: key.clone(),
                mtime_ns: stored.mtime_ns,
                size: stored.size,
                tags: stored.tags.into(),
            };
            (key, entry)
        })
        .collect();
    Ok(Some(entries))
}

/// Read only the tag window of a file; unreadable files have no tags
fn extract_from_file(path: &Path) -> Tags {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Cannot read {}: {}", path.display(), e);
            return Tags::default();
        }
    };
    let mut reader = BufReader::new(file);
    let mut lines = Vec::with_capacity(TAG_WINDOW_LINES);
    let mut buf = Vec::new();
    while lines.len() < TAG_WINDOW_LINES {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                lines.push(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) => {
                debug!("Read error in {}: {}", path.display(), e);
                break;
            }
        }
    }
    scan_tag_lines(lines.iter().map(|s| s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("repo");
        fs::create_dir_all(&root).unwrap();
        let store = dir.path().join("cache").join("tag_index.bin");
        (dir, root, store)
    }

    #[test]
    fn test_second_lookup_is_hit() {
        let (_dir, root, store) = setup();
        let file = root.join("tool.py");
        fs::write(&file, "# @expose\n# @owner: core\n").unwrap();

        let cache = TagCache::open(&root, &store);
        let first = cache.get_tags(&file);
        let second = cache.get_tags(&file);

        assert_eq!(first, second);
        assert!(first.expose);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.hit_rate, "50.0%");
    }

    #[test]
    fn test_size_change_forces_miss() {
        let (_dir, root, store) = setup();
        let file = root.join("tool.py");
        fs::write(&file, "# @maturity: beta\n").unwrap();

        let cache = TagCache::open(&root, &store);
        assert_eq!(cache.get_tags(&file).maturity, Some(Maturity::Beta));

        fs::write(&file, "# @maturity: deprecated\n# @expose\n").unwrap();
        let updated = cache.get_tags(&file);

        assert_eq!(updated.maturity, Some(Maturity::Deprecated));
        assert!(updated.expose);
        assert_eq!(cache.stats().misses, 2);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_mtime_change_with_same_size_forces_miss() {
        let (_dir, root, store) = setup();
        let file = root.join("a.py");
        fs::write(&file, "# @owner: aaa\n").unwrap();

        let cache = TagCache::open(&root, &store);
        assert_eq!(cache.get_tags(&file).owner.as_deref(), Some("aaa"));

        // Same length content, distinct mtime
        fs::write(&file, "# @owner: bbb\n").unwrap();
        let newer = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(newer)
            .unwrap();

        assert_eq!(cache.get_tags(&file).owner.as_deref(), Some("bbb"));
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_flush_and_reload_hits_without_reading() {
        let (_dir, root, store) = setup();
        let file = root.join("svc.py");
        fs::write(&file, "# @owner: svc\n").unwrap();

        let cache = TagCache::open(&root, &store);
        cache.get_tags(&file);
        cache.flush().unwrap();
        assert!(store.exists());

        let reopened = TagCache::open(&root, &store);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get_tags(&file).owner.as_deref(), Some("svc"));
        assert_eq!(reopened.stats().hits, 1);
        assert_eq!(reopened.stats().misses, 0);
    }

    #[test]
    fn test_corrupt_store_is_empty_cache() {
        let (_dir, root, store) = setup();
        fs::create_dir_all(store.parent().unwrap()).unwrap();
        fs::write(&store, b"\x00\xffnot a cache at all").unwrap();

        let cache = TagCache::open(&root, &store);
        assert!(cache.is_empty());

        let file = root.join("x.py");
        fs::write(&file, "# @expose\n").unwrap();
        assert!(cache.get_tags(&file).expose);
        cache.flush().unwrap();
        assert_eq!(TagCache::open(&root, &store).len(), 1);
    }

    #[test]
    fn test_untagged_and_partial_entries_persist() {
        let (_dir, root, store) = setup();
        let plain = root.join("plain.py");
        let owned = root.join("owned.py");
        fs::write(&plain, "x = 1\n").unwrap();
        fs::write(&owned, "# @owner: core\n").unwrap();

        let cache = TagCache::open(&root, &store);
        cache.batch_update(&[plain.clone(), owned.clone()]);
        cache.flush().unwrap();
        assert!(store.exists());

        let reopened = TagCache::open(&root, &store);
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get_tags(&plain).is_empty());
        let tags = reopened.get_tags(&owned);
        assert_eq!(tags.owner.as_deref(), Some("core"));
        assert_eq!(tags.maturity, None);
        let stats = reopened.stats();
        assert_eq!((stats.hits, stats.misses), (2, 0));
    }

    #[test]
    fn test_cleanup_stale_removes_deleted_files() {
        let (_dir, root, store) = setup();
        let keep = root.join("keep.py");
        let gone = root.join("gone.py");
        fs::write(&keep, "").unwrap();
        fs::write(&gone, "").unwrap();

        let cache = TagCache::open(&root, &store);
        cache.batch_update(&[keep.clone(), gone.clone()]);
        fs::remove_file(&gone).unwrap();

        assert_eq!(cache.cleanup_stale(), 1);
        assert!(cache.contains(&keep));
        assert!(!cache.contains(&gone));
    }

    #[test]
    fn test_missing_file_has_empty_tags_and_no_entry() {
        let (_dir, root, store) = setup();
        let cache = TagCache::open(&root, &store);
        assert!(cache.get_tags(&root.join("nope.py")).is_empty());
        assert!(cache.is_empty());
    }
}
