//! File-based cache implementation.

use async_trait::async_trait;
use lag_core::{LagError, RecordCache, Result, ResultRecord, is_within_ttl};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Durable cache storing one `<key>.json` file per provider.
///
/// Entry age is the file's modification time; no timestamp is stored inside
/// the record, so entries can be inspected or pruned with ordinary file
/// tools. Writes go to a temporary file in the same directory which is then
/// renamed over the entry, so readers see either the old or the new blob.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`.
    ///
    /// # Errors
    /// Returns [`LagError::InvalidCacheDirectory`] if `dir` does not exist, is
    /// not a directory, or cannot be written to.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let invalid = |reason: &str| LagError::InvalidCacheDirectory {
            path: dir.clone(),
            reason: reason.to_string(),
        };

        let metadata = fs::metadata(&dir).map_err(|e| invalid(&e.to_string()))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory"));
        }
        if metadata.permissions().readonly() {
            return Err(invalid("directory is read-only"));
        }
        NamedTempFile::new_in(&dir)
            .map_err(|e| invalid(&format!("directory is not writable: {e}")))?;

        Ok(Self { dir })
    }

    /// The directory entries are stored in.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for `key`.
    ///
    /// # Errors
    /// Returns [`LagError::InvalidParameter`] if `key` is empty or would
    /// escape the cache directory.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(LagError::InvalidParameter(format!(
                "invalid cache key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn cache_err(e: impl ToString) -> LagError {
    LagError::Cache(e.to_string())
}

/// Time since `modified`; a modification time in the future counts as zero.
fn age_since(modified: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO)
}

#[async_trait]
impl RecordCache for FileCache {
    #[instrument(skip(self))]
    async fn is_fresh(&self, key: &str, ttl: Duration) -> Result<bool> {
        let path = self.entry_path(key)?;

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Placeholder establishes the entry; the caller will fill it.
                match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(_) => debug!("Created placeholder cache entry"),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                    Err(e) => return Err(cache_err(e)),
                }
                return Ok(false);
            }
            Err(e) => return Err(cache_err(e)),
        };

        if metadata.len() == 0 {
            debug!("Cache entry not yet populated");
            return Ok(false);
        }

        let modified = metadata.modified().map_err(cache_err)?;
        let fresh = is_within_ttl(age_since(modified), ttl);
        debug!(fresh, "Checked cache entry freshness");
        Ok(fresh)
    }

    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> Result<ResultRecord> {
        let path = self.entry_path(key)?;
        let content = fs::read_to_string(&path).map_err(cache_err)?;

        serde_json::from_str(&content).map_err(|e| LagError::CacheCorrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    #[instrument(skip(self, record))]
    async fn write(&self, key: &str, record: &ResultRecord) -> Result<()> {
        let path = self.entry_path(key)?;
        let json = serde_json::to_vec(record).map_err(cache_err)?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(cache_err)?;
        tmp.write_all(&json).map_err(cache_err)?;
        tmp.as_file().sync_all().map_err(cache_err)?;
        tmp.persist(&path).map_err(|e| cache_err(e.error))?;

        debug!(bytes = json.len(), "Wrote cache entry");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed cache entry");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(cache_err(e)),
        }
    }

    async fn age(&self, key: &str) -> Result<Option<Duration>> {
        let path = self.entry_path(key)?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.len() > 0 => {
                let modified = metadata.modified().map_err(cache_err)?;
                Ok(Some(age_since(modified)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(cache_err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lag_core::{Post, Profile, Statistics};
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(3600);

    fn create_test_cache() -> (FileCache, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = FileCache::new(temp_dir.path()).unwrap();
        (cache, temp_dir)
    }

    fn sample_record() -> ResultRecord {
        ResultRecord::new(
            Profile::new("rustlang"),
            Statistics::new().with("followers", 10),
            vec![Post::new("1", "hello", 1_700_000_000).with_counter("likes", 2)],
        )
    }

    fn set_mtime(path: &Path, age: Duration) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn test_rejects_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileCache::new(temp_dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, LagError::InvalidCacheDirectory { .. }));
    }

    #[test]
    fn test_rejects_file_as_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("file");
        fs::write(&file, "x").unwrap();
        let err = FileCache::new(&file).unwrap_err();
        assert!(matches!(err, LagError::InvalidCacheDirectory { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_unwritable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let locked = temp_dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let result = FileCache::new(&locked);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(LagError::InvalidCacheDirectory { .. })));
    }

    #[test]
    fn test_new_leaves_directory_empty() {
        let (_cache, temp_dir) = create_test_cache();
        assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_entry_path_rejects_escaping_keys() {
        let (cache, temp_dir) = create_test_cache();
        assert_eq!(
            cache.entry_path("lag--youtube").unwrap(),
            temp_dir.path().join("lag--youtube.json")
        );
        assert!(cache.entry_path("../etc").is_err());
        assert!(cache.entry_path("a/b").is_err());
        assert!(cache.entry_path("").is_err());
    }

    #[tokio::test]
    async fn test_missing_entry_creates_placeholder() {
        let (cache, temp_dir) = create_test_cache();

        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());

        let path = temp_dir.path().join("lag--test.json");
        assert!(path.exists(), "placeholder should be created");
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        // Still stale until populated.
        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());
        assert!(cache.age("lag--test").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (cache, _temp_dir) = create_test_cache();
        let record = sample_record();

        cache.write("lag--test", &record).await.unwrap();

        assert!(cache.is_fresh("lag--test", TTL).await.unwrap());
        assert_eq!(cache.read("lag--test").await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_file_layout_uses_latest_key() {
        let (cache, temp_dir) = create_test_cache();
        cache.write("lag--test", &sample_record()).await.unwrap();

        let content = fs::read_to_string(temp_dir.path().join("lag--test.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(json.get("profile").is_some());
        assert!(json.get("statistics").is_some());
        assert!(json.get("latest").is_some());
    }

    #[tokio::test]
    async fn test_freshness_boundary_from_mtime() {
        let (cache, temp_dir) = create_test_cache();
        cache.write("lag--test", &sample_record()).await.unwrap();
        let path = temp_dir.path().join("lag--test.json");

        set_mtime(&path, TTL - Duration::from_secs(1));
        assert!(cache.is_fresh("lag--test", TTL).await.unwrap());

        set_mtime(&path, TTL + Duration::from_secs(1));
        assert!(!cache.is_fresh("lag--test", TTL).await.unwrap());
    }

    #[tokio::test]
    async fn test_future_mtime_counts_as_fresh() {
        let (cache, temp_dir) = create_test_cache();
        cache.write("lag--test", &sample_record()).await.unwrap();
        let file = OpenOptions::new()
            .write(true)
            .open(temp_dir.path().join("lag--test.json"))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(600))
            .unwrap();

        assert!(cache.is_fresh("lag--test", TTL).await.unwrap());
        assert_eq!(cache.age("lag--test").await.unwrap(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_corrupt_entry() {
        let (cache, temp_dir) = create_test_cache();
        fs::write(temp_dir.path().join("lag--test.json"), "{not json").unwrap();

        let err = cache.read("lag--test").await.unwrap_err();
        assert!(matches!(err, LagError::CacheCorrupt { ref key, .. } if key == "lag--test"));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let (cache, _temp_dir) = create_test_cache();
        cache.write("lag--test", &sample_record()).await.unwrap();

        let replacement = ResultRecord::new(Profile::new("other"), Statistics::new(), Vec::new());
        cache.write("lag--test", &replacement).await.unwrap();

        assert_eq!(cache.read("lag--test").await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let (cache, temp_dir) = create_test_cache();
        cache.write("lag--test", &sample_record()).await.unwrap();

        cache.invalidate("lag--test").await.unwrap();
        assert!(!temp_dir.path().join("lag--test.json").exists());
        cache.invalidate("lag--test").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let (cache, temp_dir) = create_test_cache();
        cache.write("lag--a", &sample_record()).await.unwrap();
        cache.write("lag--a", &sample_record()).await.unwrap();

        let names: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("lag--a.json")]);
    }
}
