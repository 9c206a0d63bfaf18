//! Content-addressed artifact store
//!
//! Captured screenshots and diff images produced by comparison runs are kept
//! here, keyed by their SHA-256 digest:
//! - identical captures are stored once
//! - reads are verified against the digest
//! - writes go through a temp file and a rename

use crate::types::sha256_hex;
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Content-addressed store for run artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a new store at the given root directory
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("objects")).await?;
        fs::create_dir_all(root.join("tmp")).await?;

        info!("Initialized artifact store at {:?}", root);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn objects_dir(&self) -> PathBuf {
        self.root.join("objects").join("sha256")
    }

    /// Compute SHA-256 hash of data
    pub fn hash(data: &[u8]) -> String {
        sha256_hex(data)
    }

    /// Get the path for an object by its digest
    pub fn object_path(&self, digest: &str) -> PathBuf {
        // First 2 chars shard the objects directory
        let prefix = digest.get(..2).unwrap_or(digest);
        self.objects_dir().join(prefix).join(digest)
    }

    /// Whether `digest` looks like a SHA-256 hex digest
    pub fn is_digest(digest: &str) -> bool {
        digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())
    }

    pub async fn has(&self, digest: &str) -> bool {
        Self::is_digest(digest)
            && fs::try_exists(self.object_path(digest)).await.unwrap_or(false)
    }

    /// Store data and return its digest
    pub async fn put(&self, data: &[u8]) -> Result<String> {
        let digest = Self::hash(data);

        if self.has(&digest).await {
            debug!("Artifact {} already stored", digest);
            return Ok(digest);
        }

        let path = self.object_path(&digest);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp_path = self.root.join("tmp").join(format!("{}.tmp", digest));
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &path).await?;

        debug!("Stored artifact {} ({} bytes)", digest, data.len());
        Ok(digest)
    }

    /// Get data by digest, verifying its integrity
    pub async fn get(&self, digest: &str) -> Result<Vec<u8>> {
        let path = self.object_path(digest);

        if !self.has(digest).await {
            return Err(Error::not_found("artifact", digest));
        }

        let data = fs::read(&path).await?;

        let actual_digest = Self::hash(&data);
        if actual_digest != digest {
            return Err(Error::IntegrityError(format!(
                "Digest mismatch: expected {}, got {}",
                digest, actual_digest
            )));
        }

        Ok(data)
    }

    /// Re-hash a stored object; `false` when it is missing or corrupted
    pub async fn verify(&self, digest: &str) -> Result<bool> {
        match self.get(digest).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound { .. }) | Err(Error::IntegrityError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, digest: &str) -> Result<()> {
        let path = self.object_path(digest);

        if self.has(digest).await {
            fs::remove_file(&path).await?;
            debug!("Deleted artifact {}", digest);
        }

        Ok(())
    }

    /// Digests of every stored object
    pub fn list(&self) -> Result<Vec<String>> {
        let objects_dir = self.objects_dir();
        if !objects_dir.exists() {
            return Ok(Vec::new());
        }

        let mut digests: Vec<String> = walkdir::WalkDir::new(&objects_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        digests.sort();
        Ok(digests)
    }

    /// Remove objects that no recorded result references
    pub async fn gc(&self, referenced: &HashSet<String>) -> Result<GcStats> {
        let mut stats = GcStats::default();

        for digest in self.list()? {
            let path = self.object_path(&digest);
            let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            stats.total_objects += 1;
            stats.total_bytes += size;

            if referenced.contains(&digest) {
                continue;
            }

            if let Err(e) = fs::remove_file(&path).await {
                warn!("Failed to delete unreferenced artifact {}: {}", digest, e);
            } else {
                stats.deleted_objects += 1;
                stats.deleted_bytes += size;
            }
        }

        info!(
            "GC complete: deleted {}/{} artifacts ({} bytes freed)",
            stats.deleted_objects, stats.total_objects, stats.deleted_bytes
        );

        Ok(stats)
    }
}

/// Garbage collection statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GcStats {
    pub total_objects: usize,
    pub total_bytes: u64,
    pub deleted_objects: usize,
    pub deleted_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path()).await.unwrap();

        let data = b"png bytes";
        let digest = store.put(data).await.unwrap();

        assert!(store.has(&digest).await);
        assert_eq!(store.get(&digest).await.unwrap(), data.to_vec());
        assert_eq!(store.list().unwrap(), vec![digest]);
    }

    #[tokio::test]
    async fn test_deduplication() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path()).await.unwrap();

        let first = store.put(b"same capture").await.unwrap();
        let second = store.put(b"same capture").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_integrity_check() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path()).await.unwrap();

        let digest = store.put(b"diff image").await.unwrap();
        fs::write(store.object_path(&digest), b"corrupted").await.unwrap();

        assert!(matches!(
            store.get(&digest).await,
            Err(Error::IntegrityError(_))
        ));
        assert!(!store.verify(&digest).await.unwrap());
        assert!(!store.verify("ffff").await.unwrap());
    }

    #[tokio::test]
    async fn test_malformed_digest_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path()).await.unwrap();
        store.put(b"capture").await.unwrap();

        let not_hex = "z".repeat(64);
        for digest in ["", "é", "../../objects", not_hex.as_str()] {
            assert!(matches!(
                store.get(digest).await,
                Err(Error::NotFound { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_gc_keeps_referenced() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path()).await.unwrap();

        let keep = store.put(b"keep").await.unwrap();
        let drop = store.put(b"drop").await.unwrap();

        let referenced: HashSet<String> = [keep.clone()].into_iter().collect();
        let stats = store.gc(&referenced).await.unwrap();

        assert_eq!(stats.total_objects, 2);
        assert_eq!(stats.deleted_objects, 1);
        assert!(store.has(&keep).await);
        assert!(!store.has(&drop).await);
    }
}
