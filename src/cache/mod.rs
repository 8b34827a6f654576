//! Extraction caching for incremental checks
//!
//! Architecture: Infrastructure Layer - the cache speeds up repeat runs without touching domain logic
//! - Entries store parsed import declarations keyed by content hash, so edits
//!   invalidate exactly the files they touch
//! - A configuration fingerprint guards against stale policy assumptions
//! - Lookups are read-only and thread-safe; mutation happens after the merge

use crate::domain::violations::{BoundaryError, BoundaryResult};
use crate::graph::SourceCache;
use crate::parser::ModuleSource;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// SHA-256 hex digest of module source content
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache of extracted import declarations across runs
#[derive(Debug)]
pub struct ImportCache {
    /// Path to the cache file
    cache_path: PathBuf,
    /// In-memory cache data
    data: CacheData,
    /// Whether the cache has been modified
    dirty: bool,
    /// Session hit counter; entries are looked up from worker threads
    session_hits: AtomicU64,
    /// Session miss counter
    session_misses: AtomicU64,
}

/// Serializable cache data structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct CacheData {
    /// Cache format version for migration support
    version: u32,
    /// Configuration fingerprint when cache was created
    config_fingerprint: Option<String>,
    /// Cached entries by workspace-relative file path
    files: HashMap<PathBuf, CacheEntry>,
    /// Cache metadata
    metadata: CacheMetadata,
}

/// Metadata about the cache itself
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMetadata {
    /// When the cache was created
    created_at: u64,
    /// When the cache was last updated
    updated_at: u64,
    /// Accumulated hits across runs
    hits: u64,
    /// Accumulated misses across runs
    misses: u64,
}

/// Cached extraction result for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// SHA-256 hash of the file content the entry was extracted from
    pub content_hash: String,
    /// Parsed declarations and export surface
    pub source: ModuleSource,
    /// When this entry was produced
    pub analyzed_at: u64,
}

const CURRENT_VERSION: u32 = 1;

impl ImportCache {
    /// Create a cache backed by the given file path
    pub fn new<P: AsRef<Path>>(cache_path: P) -> Self {
        Self {
            cache_path: cache_path.as_ref().to_path_buf(),
            data: CacheData::default(),
            dirty: false,
            session_hits: AtomicU64::new(0),
            session_misses: AtomicU64::new(0),
        }
    }

    /// Load cache from disk, creating it if it doesn't exist
    pub fn load(&mut self) -> BoundaryResult<()> {
        if self.cache_path.exists() {
            let content = fs::read_to_string(&self.cache_path)
                .map_err(|e| BoundaryError::cache(format!("Failed to read cache file: {e}")))?;

            self.data = serde_json::from_str(&content)
                .map_err(|e| BoundaryError::cache(format!("Failed to parse cache file: {e}")))?;

            if self.data.version != CURRENT_VERSION {
                tracing::info!(
                    "Discarding cache with unsupported version {}",
                    self.data.version
                );
                self.data = fresh_data();
                self.dirty = true;
            }
        } else {
            self.data = fresh_data();
            self.dirty = true;
        }

        Ok(())
    }

    /// Save cache to disk if it has been modified
    pub fn save(&mut self) -> BoundaryResult<()> {
        self.fold_session_counters();
        if !self.dirty {
            return Ok(());
        }

        self.data.metadata.updated_at = current_timestamp();

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BoundaryError::cache(format!("Failed to create cache directory: {e}"))
            })?;
        }

        let content = serde_json::to_string(&self.data)
            .map_err(|e| BoundaryError::cache(format!("Failed to serialize cache: {e}")))?;

        fs::write(&self.cache_path, content)
            .map_err(|e| BoundaryError::cache(format!("Failed to write cache file: {e}")))?;

        self.dirty = false;
        Ok(())
    }

    /// Bind the cache to a configuration fingerprint; a mismatch drops every
    /// entry because policy changes can alter what extraction feeds into
    pub fn set_config_fingerprint(&mut self, fingerprint: &str) {
        if self.data.config_fingerprint.as_deref() != Some(fingerprint) {
            if !self.data.files.is_empty() {
                tracing::info!("Configuration changed, invalidating cache");
                self.data.files.clear();
            }
            self.data.config_fingerprint = Some(fingerprint.to_string());
            self.dirty = true;
        }
    }

    /// Record freshly parsed sources after a build
    pub fn apply_updates(
        &mut self,
        updates: impl IntoIterator<Item = (PathBuf, String, ModuleSource)>,
    ) {
        let now = current_timestamp();
        for (file, hash, source) in updates {
            self.data
                .files
                .insert(file, CacheEntry { content_hash: hash, source, analyzed_at: now });
            self.dirty = true;
        }
    }

    /// Get cache statistics
    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.data.metadata.hits + self.session_hits.load(Ordering::Relaxed);
        let misses = self.data.metadata.misses + self.session_misses.load(Ordering::Relaxed);
        CacheStatistics {
            total_files: self.data.files.len(),
            cache_hits: hits,
            cache_misses: misses,
            hit_rate: if hits + misses > 0 {
                (hits as f64) / ((hits + misses) as f64)
            } else {
                0.0
            },
            created_at: self.data.metadata.created_at,
            updated_at: self.data.metadata.updated_at,
        }
    }

    /// Clear the entire cache
    pub fn clear(&mut self) -> BoundaryResult<()> {
        self.data = fresh_data();
        self.session_hits.store(0, Ordering::Relaxed);
        self.session_misses.store(0, Ordering::Relaxed);
        self.dirty = true;

        if self.cache_path.exists() {
            fs::remove_file(&self.cache_path)
                .map_err(|e| BoundaryError::cache(format!("Failed to remove cache file: {e}")))?;
        }

        Ok(())
    }

    /// Remove entries for files that no longer exist under the workspace root
    pub fn cleanup(&mut self, workspace_root: &Path) -> BoundaryResult<usize> {
        let to_remove: Vec<PathBuf> = self
            .data
            .files
            .keys()
            .filter(|relative| !workspace_root.join(relative).exists())
            .cloned()
            .collect();

        let removed = to_remove.len();
        for file in to_remove {
            self.data.files.remove(&file);
        }

        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn fold_session_counters(&mut self) {
        let hits = self.session_hits.swap(0, Ordering::Relaxed);
        let misses = self.session_misses.swap(0, Ordering::Relaxed);
        if hits > 0 || misses > 0 {
            self.data.metadata.hits += hits;
            self.data.metadata.misses += misses;
            self.dirty = true;
        }
    }
}

impl SourceCache for ImportCache {
    fn lookup(&self, file: &Path, content_hash: &str) -> Option<ModuleSource> {
        match self.data.files.get(file) {
            Some(entry) if entry.content_hash == content_hash => {
                self.session_hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.source.clone())
            }
            _ => {
                self.session_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }
}

fn fresh_data() -> CacheData {
    let now = current_timestamp();
    CacheData {
        version: CURRENT_VERSION,
        config_fingerprint: None,
        files: HashMap::new(),
        metadata: CacheMetadata { created_at: now, updated_at: now, hits: 0, misses: 0 },
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        let now = current_timestamp();
        Self { created_at: now, updated_at: now, hits: 0, misses: 0 }
    }
}

/// Cache performance statistics
#[derive(Debug, Clone)]
pub struct CacheStatistics {
    pub total_files: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_rate: f64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl CacheStatistics {
    /// Format statistics for display
    pub fn format_display(&self) -> String {
        format!(
            "Cache: {} files, {:.1}% hit rate ({} hits, {} misses)",
            self.total_files,
            self.hit_rate * 100.0,
            self.cache_hits,
            self.cache_misses
        )
    }
}

/// Current timestamp as seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
