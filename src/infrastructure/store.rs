use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::fs::{self, File};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

use crate::core::domain::{FileListing, Filename};
use crate::core::error::{TransferError, TransferResult};
use crate::utils;

const STAGING_PREFIX: &str = ".";
const STAGING_SUFFIX: &str = ".upload";

/// Flat directory holding the files a server shares.
///
/// Sessions coordinate through advisory per-name locks: uploads hold the
/// exclusive guard while writing, downloads a shared one while reading.
/// Nothing stops another process from touching the directory.
#[derive(Debug)]
pub struct DirectoryStore {
    /// Directory the files live in
    root: PathBuf,
    /// Lock table keyed by file name
    locks: Mutex<HashMap<Filename, Arc<RwLock<()>>>>,
}

impl DirectoryStore {
    /// Open the store, creating the directory if it is missing
    pub async fn open(root: impl Into<PathBuf>) -> TransferResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| TransferError::filesystem(&root, e))?;
        debug!("Store directory ready at {}", root.display());

        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &Filename) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Every entry in the directory, files and subdirectories alike, in
    /// the order the OS yields them. Uploads still in flight are skipped.
    pub async fn list(&self) -> TransferResult<FileListing> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| TransferError::filesystem(&self.root, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TransferError::filesystem(&self.root, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_staging_name(&name) {
                names.push(name);
            }
        }
        Ok(FileListing::new(names))
    }

    /// Open a fresh staging file for an incoming upload. It stays out of
    /// listings until [`commit`](Self::commit) moves it into place.
    pub async fn stage(&self) -> TransferResult<(PathBuf, File)> {
        let path = self
            .root
            .join(format!("{}{}{}", STAGING_PREFIX, utils::generate_id(), STAGING_SUFFIX));
        let file = File::create(&path)
            .await
            .map_err(|e| TransferError::filesystem(&path, e))?;
        Ok((path, file))
    }

    /// Replace `name` with a finished staging file
    pub async fn commit(&self, staging: &Path, name: &Filename) -> TransferResult<()> {
        let path = self.path_of(name);
        fs::rename(staging, &path)
            .await
            .map_err(|e| TransferError::filesystem(path, e))
    }

    /// Drop a staging file, leaving any earlier version of the name intact
    pub async fn discard(&self, staging: &Path) -> TransferResult<()> {
        fs::remove_file(staging)
            .await
            .map_err(|e| TransferError::filesystem(staging, e))
    }

    pub async fn read(&self, name: &Filename) -> TransferResult<Vec<u8>> {
        let path = self.path_of(name);
        fs::read(&path)
            .await
            .map_err(|e| TransferError::filesystem(path, e))
    }

    pub async fn lock_exclusive(&self, name: &Filename) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(name).write_owned().await
    }

    pub async fn lock_shared(&self, name: &Filename) -> OwnedRwLockReadGuard<()> {
        self.lock_for(name).read_owned().await
    }

    /// Number of names currently in the lock table
    pub fn tracked_locks(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lock_for(&self, name: &Filename) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Entries only referenced by the table are idle
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(name.clone()).or_default().clone()
    }
}

fn is_staging_name(name: &str) -> bool {
    name.strip_prefix(STAGING_PREFIX)
        .and_then(|rest| rest.strip_suffix(STAGING_SUFFIX))
        .is_some_and(|id| uuid::Uuid::parse_str(id).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(s: &str) -> Filename {
        Filename::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("assets");

        let store = DirectoryStore::open(&root).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }

    #[tokio::test]
    async fn test_list_includes_directories() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();
        std::fs::write(temp.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();

        let mut names = store.list().await.unwrap().names;
        names.sort();
        assert_eq!(names, vec!["a.txt", "nested"]);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();

        let err = store.read(&name("missing.txt")).await.unwrap_err();
        assert!(matches!(err, TransferError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn test_exclusive_lock_blocks_readers() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();
        let file = name("busy.txt");

        let writer = store.lock_exclusive(&file).await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), store.lock_shared(&file)).await;
        assert!(blocked.is_err(), "reader should wait for the writer");

        drop(writer);
        let reader = tokio::time::timeout(Duration::from_secs(1), store.lock_shared(&file)).await;
        assert!(reader.is_ok());
    }

    #[tokio::test]
    async fn test_locks_on_different_names_are_independent() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();

        let _a = store.lock_exclusive(&name("a.txt")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), store.lock_exclusive(&name("b.txt"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();

        drop(store.lock_exclusive(&name("a.txt")).await);
        drop(store.lock_exclusive(&name("b.txt")).await);
        let _held = store.lock_shared(&name("c.txt")).await;

        // Taking "c.txt" pruned the two idle entries
        assert_eq!(store.tracked_locks(), 1);
    }

    #[tokio::test]
    async fn test_staged_upload_is_hidden_until_commit() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();

        let (staging, file) = store.stage().await.unwrap();
        drop(file);
        std::fs::write(&staging, b"new").unwrap();
        assert!(store.list().await.unwrap().is_empty());

        store.commit(&staging, &name("notes.txt")).await.unwrap();
        assert_eq!(store.list().await.unwrap().names, vec!["notes.txt"]);
        assert_eq!(store.read(&name("notes.txt")).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_discard_keeps_previous_version() {
        let temp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::open(temp.path()).await.unwrap();
        std::fs::write(temp.path().join("notes.txt"), b"original").unwrap();

        let (staging, file) = store.stage().await.unwrap();
        drop(file);
        store.discard(&staging).await.unwrap();

        assert_eq!(store.read(&name("notes.txt")).await.unwrap(), b"original");
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_staging_names_are_recognised() {
        let id = crate::utils::generate_id();
        assert!(is_staging_name(&format!(".{}.upload", id)));
        assert!(!is_staging_name(".notes.upload"));
        assert!(!is_staging_name("report.txt"));
    }
}
