//! Context fragment store with TTL memoization.
//!
//! Supplies a single concatenated text blob built from a fixed, ordered list
//! of named fragment files. Fragments are optional: a missing file is not an
//! error, an oversized one is skipped with a warning. The assembled blob is
//! memoized until a freshness window expires.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Default freshness window for the memoized blob
const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Per-fragment size ceiling
const MAX_FRAGMENT_BYTES: u64 = 100 * 1024;

/// Fragment file names, in concatenation order
const DEFAULT_FRAGMENTS: [&str; 5] = [
    "premise.md",
    "characters.md",
    "setting.md",
    "outline.md",
    "style.md",
];

struct CachedContext {
    data: String,
    cached_at: DateTime<Utc>,
}

/// Per-fragment read outcome; skips collapse to plain concatenation at the
/// boundary.
enum FragmentRead {
    Content(String),
    Skipped(&'static str),
}

pub struct ContextStore {
    base_dir: PathBuf,
    fragments: Vec<String>,
    ttl: Duration,
    max_fragment_bytes: u64,
    cached: RwLock<Option<CachedContext>>,
}

impl ContextStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fragments: DEFAULT_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
            ttl: DEFAULT_TTL,
            max_fragment_bytes: MAX_FRAGMENT_BYTES,
            cached: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_fragment_bytes(mut self, max_fragment_bytes: u64) -> Self {
        self.max_fragment_bytes = max_fragment_bytes;
        self
    }

    /// Override the fragment list (still read in the given order).
    pub fn with_fragments(mut self, fragments: Vec<String>) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The concatenated context blob, served from memory within the TTL.
    ///
    /// `force_refresh` bypasses the freshness check; either way a reload
    /// replaces the cached entry wholesale before the blob is returned.
    /// Concurrent callers during a miss may each reload independently; the
    /// last writer's result becomes the cached entry.
    pub async fn get_context(&self, force_refresh: bool) -> String {
        if !force_refresh {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if !self.is_expired(entry) {
                    debug!("Context cache hit");
                    return entry.data.clone();
                }
            }
        }

        let data = self.load_fragments().await;

        let mut cached = self.cached.write().await;
        *cached = Some(CachedContext {
            data: data.clone(),
            cached_at: Utc::now(),
        });
        data
    }

    /// Drop the memoized entry; the next call reloads from disk.
    pub async fn clear_cache(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
        debug!("Context cache cleared");
    }

    /// Whether a fragment file currently exists. An absent storage
    /// directory reads as `false`.
    pub fn fragment_exists(&self, name: &str) -> bool {
        self.base_dir.join(name).is_file()
    }

    /// Names of the fragment files currently present, in list order. An
    /// absent storage directory reads as empty.
    pub fn list_fragments(&self) -> Vec<String> {
        self.fragments
            .iter()
            .filter(|name| self.fragment_exists(name))
            .cloned()
            .collect()
    }

    fn is_expired(&self, entry: &CachedContext) -> bool {
        let age = Utc::now() - entry.cached_at;
        age.to_std().map(|age| age >= self.ttl).unwrap_or(true)
    }

    async fn load_fragments(&self) -> String {
        let mut sections = Vec::new();

        for name in &self.fragments {
            match self.read_fragment(name).await {
                FragmentRead::Content(content) => {
                    sections.push(format!("{}\n\n{}", fragment_header(name), content));
                }
                FragmentRead::Skipped(reason) => {
                    debug!("Skipping fragment {}: {}", name, reason);
                }
            }
        }

        if sections.is_empty() {
            warn!(
                "No context fragments found in {:?}; generating without context",
                self.base_dir
            );
            return String::new();
        }

        sections.join("\n\n")
    }

    async fn read_fragment(&self, name: &str) -> FragmentRead {
        let path = self.base_dir.join(name);

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(_) => return FragmentRead::Skipped("not present"),
        };

        if meta.len() > self.max_fragment_bytes {
            warn!(
                "Context fragment {} is {} bytes (limit {}), skipping",
                name,
                meta.len(),
                self.max_fragment_bytes
            );
            return FragmentRead::Skipped("over size limit");
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    FragmentRead::Skipped("empty")
                } else {
                    FragmentRead::Content(trimmed.to_string())
                }
            }
            Err(_) => FragmentRead::Skipped("unreadable"),
        }
    }
}

/// Upper-cased section header derived from the fragment file name
fn fragment_header(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    format!("## {}", stem.to_uppercase())
}
