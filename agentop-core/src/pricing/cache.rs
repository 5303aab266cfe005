//! On-disk cache for the fetched price table
//!
//! The cache lives in the XDG cache directory and carries a fetch timestamp
//! plus TTL; an expired or corrupted cache simply resolves to `None` and the
//! caller moves on to the next tier.

use super::ModelRates;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How long a fetched price sheet stays valid.
pub const CACHE_TTL_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fetched_at: DateTime<Utc>,
    ttl_hours: i64,
    rates: HashMap<String, ModelRates>,
}

/// Default cache file location (`~/.cache/agentop/pricing.json`).
pub fn default_cache_path() -> PathBuf {
    let base = std::env::var("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("agentop").join("pricing.json")
}

/// Load cached rates if the cache exists, parses, and is within its TTL.
pub fn load(path: &Path) -> Option<HashMap<String, ModelRates>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No price cache");
            return None;
        }
    };

    let cache: CacheFile = match serde_json::from_str(&text) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Price cache corrupted");
            return None;
        }
    };

    let expires_at = cache.fetched_at + Duration::hours(cache.ttl_hours);
    if Utc::now() >= expires_at {
        tracing::info!(
            fetched_at = %cache.fetched_at,
            ttl_hours = cache.ttl_hours,
            "Price cache expired"
        );
        return None;
    }

    if cache.rates.is_empty() {
        return None;
    }

    Some(cache.rates)
}

/// Persist fetched rates atomically (temp file then rename).
pub fn save(path: &Path, rates: &HashMap<String, ModelRates>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let cache = CacheFile {
        version: 1,
        fetched_at: Utc::now(),
        ttl_hours: CACHE_TTL_HOURS,
        rates: rates.clone(),
    };

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&cache)?)?;
    std::fs::rename(&tmp, path)?;

    tracing::info!(path = %path.display(), models = rates.len(), "Saved price cache");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rates() -> HashMap<String, ModelRates> {
        let mut rates = HashMap::new();
        rates.insert(
            "claude-sonnet-4-5".to_string(),
            ModelRates {
                input: 3_000_000,
                output: 15_000_000,
                cache_creation: 3_750_000,
                cache_read: 300_000,
            },
        );
        rates
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");

        save(&path, &sample_rates()).unwrap();
        let loaded = load(&path).expect("cache should be valid");
        assert_eq!(loaded, sample_rates());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.json")).is_none());
    }

    #[test]
    fn test_load_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load(&path).is_none());
    }

    #[test]
    fn test_load_expired_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");

        let cache = CacheFile {
            version: 1,
            fetched_at: Utc::now() - Duration::hours(25),
            ttl_hours: CACHE_TTL_HOURS,
            rates: sample_rates(),
        };
        std::fs::write(&path, serde_json::to_vec(&cache).unwrap()).unwrap();

        assert!(load(&path).is_none());
    }

    #[test]
    fn test_load_empty_rates_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pricing.json");
        save(&path, &HashMap::new()).unwrap();
        assert!(load(&path).is_none());
    }
}
