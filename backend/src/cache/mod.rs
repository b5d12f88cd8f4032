//! Response cache - store raw IBGE responses on disk.
//!
//! Census 2010 tables never change, so a raw response can be reused across
//! runs. Entries are keyed by request URL and expire after a TTL.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CacheResult;

/// A cached response with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    /// File stem derived from the URL
    pub key: String,
    /// Request URL
    pub url: String,
    /// When the response was fetched (RFC 3339)
    pub fetched_at: String,
    /// Parsed JSON body
    pub body: Value,
}

impl CachedResponse {
    /// Age of the entry, `None` if the timestamp is unreadable.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        DateTime::parse_from_rfc3339(&self.fetched_at)
            .ok()
            .map(|t| now - t.with_timezone(&Utc))
    }
}

/// On-disk cache of raw responses
#[derive(Debug, Clone)]
pub struct ResponseCache {
    /// Directory where responses are stored
    dir: PathBuf,
    /// Entries older than this are ignored
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>, ttl_hours: i64) -> Self {
        Self {
            dir: PathBuf::from(dir.as_ref()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get a fresh cached body for this URL
    pub fn get(&self, url: &str) -> Option<Value> {
        let path = self.path_for(url);
        let content = fs::read_to_string(&path).ok()?;
        let entry: CachedResponse = serde_json::from_str(&content).ok()?;

        if entry.url != url {
            return None;
        }
        match entry.age(Utc::now()) {
            Some(age) if age <= self.ttl => Some(entry.body),
            _ => None,
        }
    }

    /// Store a response body
    pub fn put(&self, url: &str, body: &Value) -> CacheResult<()> {
        fs::create_dir_all(&self.dir)?;

        let entry = CachedResponse {
            key: cache_key(url),
            url: url.to_string(),
            fetched_at: Utc::now().to_rfc3339(),
            body: body.clone(),
        };

        let content = serde_json::to_string(&entry)?;
        fs::write(self.path_for(url), content)?;
        Ok(())
    }

    /// All readable entries, fresh or not
    pub fn list(&self) -> Vec<CachedResponse> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Vec::new(),
        };

        let mut cached: Vec<CachedResponse> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "json"))
            .filter_map(|path| fs::read_to_string(path).ok())
            .filter_map(|content| serde_json::from_str(&content).ok())
            .collect();

        cached.sort_by(|a, b| a.key.cmp(&b.key));
        cached
    }

    /// Whether an entry is still within the TTL
    pub fn is_fresh(&self, entry: &CachedResponse) -> bool {
        entry.age(Utc::now()).is_some_and(|age| age <= self.ttl)
    }

    /// Delete every cached response, returning how many were removed
    pub fn clear(&self) -> CacheResult<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(url)))
    }
}

/// Derive a file-system safe key from a URL
fn cache_key(url: &str) -> String {
    let without_scheme = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");

    without_scheme
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
