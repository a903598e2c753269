//! Filesystem blob store
//!
//! The staging area for every pipeline stage: one root directory with a
//! fixed set of buckets underneath. Uniqueness inside a bucket comes from
//! per-track-id naming, not locking; concurrent acquisitions against the
//! same downloads bucket are not supported (single-writer-per-id model).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use tracklift_common::{Error, Result};

/// Blob namespaces used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Scratch area the downloader writes into under tool-derived
    /// names; cleared before each run, never referenced by records
    Incoming,
    /// Acquired artifacts, one per track under its id
    Downloads,
    /// Transformed artifacts ready for publishing
    Processed,
    /// Artifacts of rejected tracks, kept for inspection
    Rejected,
    /// Files pushed in from elsewhere for publishing as-is
    ServerUpload,
    /// Short-lived trim previews, purged after an hour
    Previews,
}

impl Bucket {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Bucket::Incoming => "incoming",
            Bucket::Downloads => "downloads",
            Bucket::Processed => "processed",
            Bucket::Rejected => "rejected",
            Bucket::ServerUpload => "server-upload",
            Bucket::Previews => "previews",
        }
    }

    const ALL: [Bucket; 6] = [
        Bucket::Incoming,
        Bucket::Downloads,
        Bucket::Processed,
        Bucket::Rejected,
        Bucket::ServerUpload,
        Bucket::Previews,
    ];
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating all buckets
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { root: root.into() };
        for bucket in Bucket::ALL {
            fs::create_dir_all(store.bucket_dir(bucket))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bucket_dir(&self, bucket: Bucket) -> PathBuf {
        self.root.join(bucket.dir_name())
    }

    /// Absolute path of a named blob (the blob need not exist)
    pub fn blob_path(&self, bucket: Bucket, name: &str) -> PathBuf {
        self.bucket_dir(bucket).join(name)
    }

    /// Store-relative reference (`bucket/name`) as persisted on records
    pub fn blob_ref(bucket: Bucket, name: &str) -> String {
        format!("{}/{}", bucket.dir_name(), name)
    }

    /// Resolve a persisted `bucket/name` reference to an absolute path
    pub fn resolve(&self, blob_ref: &str) -> PathBuf {
        self.root.join(blob_ref)
    }

    pub fn put(&self, bucket: Bucket, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.blob_path(bucket, name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn get(&self, bucket: Bucket, name: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(bucket, name);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::ArtifactMissing(format!("{}/{}", bucket.dir_name(), name))
            }
            _ => Error::Io(e),
        })
    }

    pub fn exists(&self, bucket: Bucket, name: &str) -> bool {
        self.blob_path(bucket, name).is_file()
    }

    pub fn delete(&self, bucket: Bucket, name: &str) -> Result<()> {
        let path = self.blob_path(bucket, name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Move an existing file into a bucket under a new name
    pub fn adopt(&self, source: &Path, bucket: Bucket, name: &str) -> Result<PathBuf> {
        let dest = self.blob_path(bucket, name);
        fs::rename(source, &dest)?;
        Ok(dest)
    }

    /// Remove every file with `extension` from a bucket
    ///
    /// Run before each acquisition so a leftover file from a previous run
    /// can never be picked up as "the" result.
    pub fn clear_stale(&self, bucket: Bucket, extension: &str) -> Result<usize> {
        let mut removed = 0;
        for path in self.files_with_extension(bucket, extension)? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Could not remove stale file {}: {}", path.display(), e),
            }
        }
        if removed > 0 {
            debug!(
                "Cleared {} stale .{} file(s) from {}",
                removed,
                extension,
                bucket.dir_name()
            );
        }
        Ok(removed)
    }

    /// Most recently created file with `extension` in a bucket
    ///
    /// Degraded-mode artifact discovery: only safe while acquisitions are
    /// serialized against this staging root.
    pub fn newest_file(&self, bucket: Bucket, extension: &str) -> Result<Option<PathBuf>> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for path in self.files_with_extension(bucket, extension)? {
            let meta = fs::metadata(&path)?;
            let stamp = meta.created().or_else(|_| meta.modified())?;
            if newest.as_ref().map(|(t, _)| stamp > *t).unwrap_or(true) {
                newest = Some((stamp, path));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }

    /// Remove files older than `max_age`; used for preview retention
    pub fn purge_older_than(&self, bucket: Bucket, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(self.bucket_dir(bucket))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let meta = entry.metadata()?;
            let stamp = meta.created().or_else(|_| meta.modified())?;
            let expired = now
                .duration_since(stamp)
                .map(|age| age >= max_age)
                .unwrap_or(false);
            if expired {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(
                        "Could not purge expired file {}: {}",
                        entry.path().display(),
                        e
                    ),
                }
            }
        }
        Ok(removed)
    }

    fn files_with_extension(&self, bucket: Bucket, extension: &str) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.bucket_dir(bucket))? {
            let entry = entry?;
            let path = entry.path();
            let matches = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            if matches && entry.file_type()?.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, BlobStore) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_all_buckets() {
        let (_dir, store) = store();
        for bucket in Bucket::ALL {
            assert!(store.bucket_dir(bucket).is_dir());
        }
    }

    #[test]
    fn put_get_exists_delete() {
        let (_dir, store) = store();
        assert!(!store.exists(Bucket::Processed, "a.mp3"));

        store.put(Bucket::Processed, "a.mp3", b"bytes").unwrap();
        assert!(store.exists(Bucket::Processed, "a.mp3"));
        assert_eq!(store.get(Bucket::Processed, "a.mp3").unwrap(), b"bytes");

        store.delete(Bucket::Processed, "a.mp3").unwrap();
        assert!(!store.exists(Bucket::Processed, "a.mp3"));
        // Deleting a missing blob is not an error.
        store.delete(Bucket::Processed, "a.mp3").unwrap();
    }

    #[test]
    fn get_missing_blob_is_artifact_missing() {
        let (_dir, store) = store();
        assert!(matches!(
            store.get(Bucket::Downloads, "nope.mp3"),
            Err(Error::ArtifactMissing(_))
        ));
    }

    #[test]
    fn clear_stale_only_touches_matching_extension() {
        let (_dir, store) = store();
        store.put(Bucket::Downloads, "old.mp3", b"x").unwrap();
        store.put(Bucket::Downloads, "notes.txt", b"x").unwrap();

        let removed = store.clear_stale(Bucket::Downloads, "mp3").unwrap();
        assert_eq!(removed, 1);
        assert!(!store.exists(Bucket::Downloads, "old.mp3"));
        assert!(store.exists(Bucket::Downloads, "notes.txt"));
    }

    #[test]
    fn newest_file_picks_latest() {
        let (_dir, store) = store();
        assert!(store.newest_file(Bucket::Downloads, "mp3").unwrap().is_none());

        store.put(Bucket::Downloads, "first.mp3", b"x").unwrap();
        std::thread::sleep(Duration::from_millis(20));
        store.put(Bucket::Downloads, "second.mp3", b"x").unwrap();

        let newest = store.newest_file(Bucket::Downloads, "mp3").unwrap().unwrap();
        assert_eq!(newest.file_name().unwrap(), "second.mp3");
    }

    #[test]
    fn purge_respects_age_cutoff() {
        let (_dir, store) = store();
        store.put(Bucket::Previews, "preview.mp3", b"x").unwrap();

        // Fresh files survive a one-hour retention window.
        let removed = store
            .purge_older_than(Bucket::Previews, Duration::from_secs(3600))
            .unwrap();
        assert_eq!(removed, 0);
        assert!(store.exists(Bucket::Previews, "preview.mp3"));

        // A zero window expires everything.
        let removed = store
            .purge_older_than(Bucket::Previews, Duration::ZERO)
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.exists(Bucket::Previews, "preview.mp3"));
    }

    #[test]
    fn adopt_moves_file_into_bucket() {
        let (dir, store) = store();
        let outside = dir.path().join("loose.mp3");
        std::fs::write(&outside, b"x").unwrap();

        let dest = store.adopt(&outside, Bucket::Downloads, "id.mp3").unwrap();
        assert!(!outside.exists());
        assert!(dest.is_file());
        assert!(store.exists(Bucket::Downloads, "id.mp3"));
    }
}
