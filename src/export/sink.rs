use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Destination for exported files.
///
/// Saving is fire-and-forget: the engine hands over bytes and a relative
/// name and never observes completion.
pub trait DownloadSink: Send + Sync {
    fn save(&self, bytes: Vec<u8>, filename: &str);
}

/// Writes files below a root directory, one spawned task per file.
pub struct FsSink {
    root: PathBuf,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Resolve `filename` below the root, dropping `..` and absolute parts.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in Path::new(filename).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    /// Wait for every write started so far.
    pub async fn flush(&self) {
        let handles: Vec<_> = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Write task join error: {}", e);
            }
        }
    }
}

impl DownloadSink for FsSink {
    fn save(&self, bytes: Vec<u8>, filename: &str) {
        let path = self.resolve(filename);

        let handle = tokio::spawn(async move {
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("Could not create {}: {}", parent.display(), e);
                    return;
                }
            }

            match tokio::fs::write(&path, &bytes).await {
                Ok(()) => debug!("Wrote {} ({} bytes)", path.display(), bytes.len()),
                Err(e) => error!("Could not write {}: {}", path.display(), e),
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }
}

/// Keeps saved files in memory.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemorySink {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn names(&self) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.clone())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).map(|b| String::from_utf8_lossy(&b).into_owned())
    }
}

#[cfg(test)]
impl DownloadSink for MemorySink {
    fn save(&self, bytes: Vec<u8>, filename: &str) {
        self.files
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_stays_under_root() {
        let sink = FsSink::new("/out");
        assert_eq!(sink.resolve("Family/media/a.png"), PathBuf::from("/out/Family/media/a.png"));
        assert_eq!(sink.resolve("../../etc/passwd"), PathBuf::from("/out/etc/passwd"));
        assert_eq!(sink.resolve("/abs/file.txt"), PathBuf::from("/out/abs/file.txt"));
    }

    #[tokio::test]
    async fn test_save_creates_parents_and_flush_waits() {
        let dir = TempDir::new().unwrap();
        let sink = FsSink::new(dir.path());

        sink.save(b"hello".to_vec(), "Family/links.txt");
        sink.save(b"<html></html>".to_vec(), "Family/2024-03.html");
        sink.flush().await;

        let links = std::fs::read_to_string(dir.path().join("Family/links.txt")).unwrap();
        assert_eq!(links, "hello");
        assert!(dir.path().join("Family/2024-03.html").exists());
    }

    #[tokio::test]
    async fn test_flush_without_writes() {
        let dir = TempDir::new().unwrap();
        FsSink::new(dir.path()).flush().await;
    }
}
