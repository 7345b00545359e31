//! Build cache for incremental builds.
//!
//! Writing a page is the step worth skipping: once a document's inputs and
//! the build-global inputs are unchanged, the page written last time is
//! already the page this build would write. This module remembers, per
//! document, what went into the last artifact and what came out.
//!
//! # Design
//!
//! ## Cache keys
//!
//! Entries are keyed by document key (the forward-slash source path). Each
//! entry stores two hashes:
//!
//! - **`input_hash`**: SHA-256 over the document's raw bytes, the
//!   frontmatter-derived fields (title, slug, date, tags, flags), and the
//!   rendered HTML and extension map as the pipeline left them. Plugins may
//!   derive those last two from other documents, so the raw bytes alone
//!   don't decide the page. Content-based rather than mtime-based so it
//!   survives `git checkout`, which resets modification times.
//!
//! - **`fingerprint`**: SHA-256 of the build-global inputs: the active
//!   configuration and the template version. Any config change invalidates
//!   every entry at once.
//!
//! A cache hit requires:
//! 1. An entry for the key with matching `input_hash` and `fingerprint`
//! 2. The previously-written output file still exists on disk
//! 3. Its current contents still hash to the recorded `output_hash`
//!
//! The third check makes a hit mean "the file on disk is byte-identical to
//! what a recompute would write", even if someone edited the output by hand.
//!
//! ## Storage
//!
//! The store is a JSON file at `<cache_dir>/build-cache.json`. Entries are a
//! `BTreeMap`, so the file itself is byte-stable for identical builds.
//!
//! ## Failure handling
//!
//! A missing, unreadable, unparsable or wrong-version store loads as an empty
//! cache. The build degrades to a cold rebuild, never to an error.
//!
//! ## Stale entries
//!
//! After `cleanup` the manager drops entries whose document no longer exists
//! ([`BuildCache::prune`]). Removing the old output files is not the cache's
//! job; that's `Manager::clean`.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache store within the cache directory.
const CACHE_FILENAME: &str = "build-cache.json";

/// Version of the store format. Bump this to invalidate all existing caches
/// when the format or key computation changes.
const CACHE_VERSION: u32 = 1;

/// What a cached build step produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Output path relative to the output directory, forward slashes.
    pub output_path: String,
    /// SHA-256 of the bytes written.
    pub output_hash: String,
}

/// A single cached document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub input_hash: String,
    pub fingerprint: String,
    pub artifact: ArtifactDescriptor,
}

/// On-disk store mapping document keys to cache entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCache {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
    /// Lookups recorded during this process. Never serialized.
    #[serde(skip)]
    pub stats: CacheStats,
    #[serde(skip)]
    dirty: bool,
}

impl Default for BuildCache {
    fn default() -> Self {
        Self::empty()
    }
}

impl BuildCache {
    /// Create an empty cache (used when caching is disabled or on first build).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
            stats: CacheStats::default(),
            dirty: false,
        }
    }

    /// Load from the cache directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path) -> Self {
        let path = store_path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "build cache unreadable, starting cold");
                }
                return Self::empty();
            }
        };
        let cache: Self = match serde_json::from_str(&content) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "build cache corrupt, starting cold");
                return Self::empty();
            }
        };
        if cache.version != CACHE_VERSION {
            tracing::warn!(
                found = cache.version,
                expected = CACHE_VERSION,
                "build cache version mismatch, starting cold"
            );
            return Self::empty();
        }
        tracing::debug!(entries = cache.entries.len(), "build cache loaded");
        cache
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&mut self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(store_path(cache_dir), json)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether entries changed since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Look up a cached artifact without touching the stats.
    ///
    /// Returns the stored descriptor if the entry matches both hashes and the
    /// recorded output still exists under `output_dir` with unchanged bytes.
    pub fn find_cached(
        &self,
        key: &str,
        input_hash: &str,
        fingerprint: &str,
        output_dir: &Path,
    ) -> Option<&ArtifactDescriptor> {
        let entry = self.entries.get(key)?;
        if entry.input_hash != input_hash || entry.fingerprint != fingerprint {
            return None;
        }
        let on_disk = output_dir.join(&entry.artifact.output_path);
        match hash_file(&on_disk) {
            Ok(hash) if hash == entry.artifact.output_hash => Some(&entry.artifact),
            _ => None,
        }
    }

    /// [`find_cached`](Self::find_cached) that also records a hit or miss.
    pub fn lookup(
        &mut self,
        key: &str,
        input_hash: &str,
        fingerprint: &str,
        output_dir: &Path,
    ) -> Option<ArtifactDescriptor> {
        let found = self
            .find_cached(key, input_hash, fingerprint, output_dir)
            .cloned();
        match found {
            Some(_) => {
                tracing::debug!(key, "cache hit");
                self.stats.hit();
            }
            None => {
                tracing::debug!(key, "cache miss");
                self.stats.miss();
            }
        }
        found
    }

    /// Record the artifact produced for a document, replacing any old entry.
    pub fn insert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        let key = key.into();
        if self.entries.get(&key) != Some(&entry) {
            self.entries.insert(key, entry);
            self.dirty = true;
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Drop entries whose document is not in `live`. Keys may carry a
    /// `#suffix` for per-document sub-artifacts; only the part before `#`
    /// is matched. Returns the number of entries removed.
    pub fn prune(&mut self, live: &BTreeSet<String>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| {
            let doc_key = key.split_once('#').map_or(key.as_str(), |(doc, _)| doc);
            live.contains(doc_key)
        });
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }
}

/// Resolve the store path for a cache directory.
pub fn store_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILENAME)
}

/// SHA-256 of a byte slice, as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 over everything a document page is rendered from: the raw bytes,
/// the frontmatter-derived fields, the rendered HTML and the extension map.
///
/// The HTML and extension map are whatever the transform and render plugins
/// left there, which may depend on other documents; hashing them is what
/// makes a hit equal to a fresh render.
///
/// Each field is tagged and length-prefixed so that moving text from one
/// field to its neighbor changes the hash.
pub fn hash_document(doc: &Document) -> String {
    fn field(hasher: &mut Sha256, tag: &[u8], value: &[u8]) {
        hasher.update(tag);
        hasher.update(b"\0");
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }

    let mut hasher = Sha256::new();
    field(&mut hasher, b"raw", doc.raw.as_bytes());
    field(&mut hasher, b"path", doc.key().as_bytes());
    field(
        &mut hasher,
        b"title",
        doc.title.as_deref().unwrap_or_default().as_bytes(),
    );
    field(&mut hasher, b"slug", doc.slug.as_bytes());
    let date = doc
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    field(&mut hasher, b"date", date.as_bytes());
    for tag in &doc.tags {
        field(&mut hasher, b"tag", tag.as_bytes());
    }
    let flags = [doc.published as u8, doc.draft as u8, doc.private as u8];
    field(&mut hasher, b"flags", &flags);
    field(&mut hasher, b"html", doc.html.as_bytes());
    let extra = serde_json::to_vec(&doc.extra).unwrap_or_default();
    field(&mut hasher, b"extra", &extra);
    format!("{:x}", hasher.finalize())
}

/// Combine several fingerprints into one.
pub fn combine_fingerprints(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} written ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} written", self.misses)
        }
    }
}
