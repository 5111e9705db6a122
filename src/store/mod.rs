//! Persistence for the client's configuration document.
//!
//! # Responsibilities
//! - Load the opaque text document from its fixed path
//! - Save it, switching once and for all to a `.tmp` path when asked
//! - Tell subscribers when a new document has been saved
//!
//! # Design Decisions
//! - The document is opaque: no parsing, no schema
//! - Writes are plain `write` calls; a crash mid-write can leave a partial file
//! - Callers treat a failed save as fatal (see `lifecycle::fatal`)

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

/// Error raised when the document could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {path}: {source}")]
pub struct StoreError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Payload broadcast after a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChanged {
    pub contents: String,
}

#[derive(Debug)]
struct StorePath {
    path: PathBuf,
    temporary: bool,
}

/// File-backed store for the configuration document.
#[derive(Debug)]
pub struct ConfigStore {
    path: Mutex<StorePath>,
    changes: broadcast::Sender<ConfigChanged>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            path: Mutex::new(StorePath {
                path: path.into(),
                temporary: false,
            }),
            changes,
        }
    }

    /// Path the next save will write to.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Whether saves have been switched to the `.tmp` path.
    pub fn is_temporary(&self) -> bool {
        self.lock().temporary
    }

    /// Read the document. Any read failure counts as absent.
    pub async fn load(&self) -> Option<String> {
        let path = self.path();
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No stored config");
                None
            }
        }
    }

    /// Write the document.
    ///
    /// With `temporary` set, this and every later save go to `<path>.tmp`.
    pub async fn save(&self, contents: &str, temporary: bool) -> Result<(), StoreError> {
        let path = {
            let mut current = self.lock();
            if temporary && !current.temporary {
                let mut tmp = current.path.clone().into_os_string();
                tmp.push(".tmp");
                current.path = PathBuf::from(tmp);
                current.temporary = true;
                tracing::info!(path = %current.path.display(), "Config saves switched to temporary file");
            }
            current.path.clone()
        };

        write_document(&path, contents)
            .await
            .map_err(|source| StoreError { path: path.clone(), source })?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Config saved");
        Ok(())
    }

    /// Notify subscribers that `contents` is the new document.
    pub fn publish(&self, contents: String) {
        // No subscribers is not an error.
        let _ = self.changes.send(ConfigChanged { contents });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChanged> {
        self.changes.subscribe()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StorePath> {
        // The guarded section cannot panic, so a poisoned lock still holds valid data.
        self.path.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn write_document(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, contents).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("apt-data/config.json"));
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn save_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("apt-data/config.json"));

        store.save("{\"league\":\"Standard\"}", false).await.unwrap();

        assert_eq!(store.load().await.unwrap(), "{\"league\":\"Standard\"}");
        assert!(dir.path().join("apt-data/config.json").is_file());
    }

    #[tokio::test]
    async fn temporary_switch_is_one_way() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("config.json");
        let store = ConfigStore::new(&base);

        store.save("a", false).await.unwrap();
        store.save("b", true).await.unwrap();
        assert!(store.is_temporary());
        assert_eq!(store.path(), dir.path().join("config.json.tmp"));

        // A later non-temporary save stays on the .tmp path.
        store.save("c", false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&base).unwrap(), "a");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("config.json.tmp")).unwrap(),
            "c"
        );

        // Only one suffix is ever added.
        store.save("d", true).await.unwrap();
        assert_eq!(store.path(), dir.path().join("config.json.tmp"));
    }

    #[tokio::test]
    async fn load_follows_the_temporary_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        store.save("persisted", false).await.unwrap();
        store.save("scratch", true).await.unwrap();
        assert_eq!(store.load().await.unwrap(), "scratch");
    }

    #[tokio::test]
    async fn save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = ConfigStore::new(blocker.join("config.json"));
        let err = store.save("x", false).await.unwrap_err();
        assert_eq!(err.path, blocker.join("config.json"));
    }

    #[tokio::test]
    async fn subscribers_receive_published_contents() {
        let store = ConfigStore::new("/unused/config.json");
        let mut rx = store.subscribe();
        store.publish("new".to_string());
        assert_eq!(rx.recv().await.unwrap().contents, "new");
    }
}
