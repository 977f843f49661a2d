//! Tag caching
//!
//! Header annotations are extracted once per file version and kept in a
//! persisted store. The cache is an explicit handle passed to the
//! extraction engine and analyzers, never ambient global state.

pub mod paths;
mod tag_cache;
mod tags;

pub use paths::{cache_dir_under, get_cache_dir, get_tag_store_path, CACHE_DIR_ENV, TAG_STORE_FILE};
pub use tag_cache::{CacheStats, TagCache, TagCacheEntry};
pub use tags::{scan_tags, TAG_WINDOW_LINES};
