//! Cache Module
//!
//! Content-addressed, file-backed response caches. Each cache is a directory
//! holding one JSON file per key, named by the key's SHA-256 digest.

mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::{canonical_json, explanation_key, extraction_key, is_valid_key};
pub use stats::CacheStats;
pub use store::{CachePolicy, DiskCache};

// == Public Constants ==
/// Subdirectory of the cache root holding extraction results
pub const EXTRACT_DIR: &str = "extract";

/// Subdirectory of the cache root holding explanation results
pub const EXPLAIN_DIR: &str = "explain";

/// File extension of persisted entries
pub const ENTRY_EXTENSION: &str = "json";

/// Length of a hex-encoded SHA-256 cache key
pub const KEY_LENGTH: usize = 64;
