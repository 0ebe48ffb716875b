use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

const CACHE_EXT: &str = "txt";

/// How a URL becomes a cache file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKey {
    /// Keep only ASCII alphanumerics. Distinct URLs can collide.
    Sanitized,
    Sha256,
}

impl CacheKey {
    pub fn derive(self, url: &str) -> String {
        match self {
            CacheKey::Sanitized => url.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
            CacheKey::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(url.as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }
}

/// Raw page bytes on disk, one file per URL. Entries never expire.
pub struct CacheStore {
    enabled: bool,
    dir: PathBuf,
    key: CacheKey,
}

impl CacheStore {
    pub fn new(enabled: bool, dir: impl Into<PathBuf>, key: CacheKey) -> Self {
        CacheStore {
            enabled,
            dir: dir.into(),
            key,
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        CacheStore::new(false, PathBuf::new(), CacheKey::Sha256)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.key.derive(url), CACHE_EXT))
    }

    #[cfg(test)]
    pub fn has(&self, url: &str) -> bool {
        self.enabled && self.path_for(url).is_file()
    }

    pub fn load(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.path_for(url);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("Failed to read cache file {:?}", path))?;
        debug!("Cache hit for {} ({} bytes)", url, bytes.len());
        Ok(Some(bytes))
    }

    pub fn save(&self, url: &str, content: &[u8]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache dir {:?}", self.dir))?;
        let path = self.path_for(url);
        fs::write(&path, content).with_context(|| format!("Failed to write cache file {:?}", path))?;
        debug!("Cached {} -> {:?}", url, path);
        Ok(())
    }

    /// Delete every cache file. Returns how many were removed.
    pub fn clear(&self) -> Result<usize> {
        if !self.dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == CACHE_EXT) {
                fs::remove_file(&path).with_context(|| format!("Failed to remove {:?}", path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://epetitions.brisbane.qld.gov.au/petition/view/pid/42";

    #[test]
    fn sanitized_key_drops_non_alphanumerics() {
        assert_eq!(
            CacheKey::Sanitized.derive(URL),
            "httpsepetitionsbrisbaneqldgovaupetitionviewpid42"
        );
    }

    #[test]
    fn sanitized_key_can_collide() {
        let a = CacheKey::Sanitized.derive("https://x.au/a-b");
        let b = CacheKey::Sanitized.derive("https://x.au/ab");
        assert_eq!(a, b);
        assert_ne!(CacheKey::Sha256.derive("https://x.au/a-b"), CacheKey::Sha256.derive("https://x.au/ab"));
    }

    #[test]
    fn sha256_key_is_hex() {
        let k = CacheKey::Sha256.derive(URL);
        assert_eq!(k.len(), 64);
        assert!(k.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(true, dir.path().join("cache"), CacheKey::Sha256);
        assert!(!cache.has(URL));
        assert!(cache.load(URL).unwrap().is_none());

        let bytes = b"<html>\xffraw bytes</html>".to_vec();
        cache.save(URL, &bytes).unwrap();
        assert!(cache.has(URL));
        assert_eq!(cache.load(URL).unwrap(), Some(bytes));
    }

    #[test]
    fn disabled_cache_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        let enabled = CacheStore::new(true, dir.path(), CacheKey::Sanitized);
        enabled.save(URL, b"page").unwrap();

        let disabled = CacheStore::new(false, dir.path(), CacheKey::Sanitized);
        assert!(!disabled.has(URL));
        assert!(disabled.load(URL).unwrap().is_none());

        disabled.save("https://other.example/", b"nope").unwrap();
        assert!(!enabled.has("https://other.example/"));
    }

    #[test]
    fn clear_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(true, dir.path(), CacheKey::Sha256);
        cache.save(URL, b"a").unwrap();
        cache.save("https://epetitions.brisbane.qld.gov.au/", b"b").unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(!cache.has(URL));
        assert_eq!(cache.clear().unwrap(), 0);
    }
}
