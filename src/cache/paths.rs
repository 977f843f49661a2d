//! Cache path utilities - uses ~/.cache/repolens/<repo-hash>/ instead of polluting the repo

use std::path::{Path, PathBuf};

/// Environment variable overriding the cache base directory
pub const CACHE_DIR_ENV: &str = "REPOLENS_CACHE_DIR";

pub const TAG_STORE_FILE: &str = "tag_index.bin";

/// Get the cache directory for a repository.
/// Uses ~/.cache/repolens/<repo-hash>/ on Unix, %LOCALAPPDATA%/repolens/<repo-hash>/ on Windows.
pub fn get_cache_dir(repo_path: &Path) -> PathBuf {
    if let Some(base) = std::env::var_os(CACHE_DIR_ENV) {
        return cache_dir_under(Path::new(&base), repo_path);
    }
    let repo_hash = hash_path(repo_path);

    let base = if cfg!(windows) {
        std::env::var("LOCALAPPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")))
    } else {
        dirs::cache_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".cache"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    };

    base.join("repolens").join(&repo_hash)
}

/// Per-repository cache directory below an explicit base directory.
pub fn cache_dir_under(base: &Path, repo_path: &Path) -> PathBuf {
    base.join(hash_path(repo_path))
}

/// Get the tag-cache store path for a repository.
pub fn get_tag_store_path(repo_path: &Path) -> PathBuf {
    get_cache_dir(repo_path).join(TAG_STORE_FILE)
}

/// Hash a path to create a unique but deterministic directory name.
fn hash_path(path: &Path) -> String {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let path_str = canonical.to_string_lossy();

    // xxh3 is stable across toolchains, unlike DefaultHasher
    let hash = xxhash_rust::xxh3::xxh3_64(path_str.as_bytes());

    let repo_name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("repo")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(20)
        .collect::<String>();

    format!("{}-{:012x}", repo_name, hash & 0xffff_ffff_ffff)
}
