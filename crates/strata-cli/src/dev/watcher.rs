//! File system watcher with debouncing for `strata watch`.
//!
//! Watches the project root recursively. Changes under the output and cache
//! directories, and in hidden files or directories, are dropped before they
//! reach the rebuild loop.

use crate::error::{CliError, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// File change event type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    /// Get the path affected by this change.
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// File watcher with debouncing and filtering.
///
/// Repeated events for the same path inside the debounce window are
/// collapsed before they are sent.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Watch `root`, ignoring everything below the `ignored` directories.
    ///
    /// # Errors
    ///
    /// [`CliError::FileNotFound`] when `root` does not exist, or
    /// [`CliError::Watch`] when the platform watcher cannot start.
    pub fn new(
        root: PathBuf,
        ignored: Vec<PathBuf>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root));
        }

        let (tx, rx) = mpsc::channel(100);

        let debounce = Duration::from_millis(debounce_ms);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    return;
                }
            };

            for path in &event.paths {
                if should_ignore(path, &watch_root, &ignored) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // The receiver is gone once the watch loop has stopped.
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            rx,
        ))
    }

    /// Get the root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Whether a change to `path` should not trigger a rebuild.
pub(crate) fn should_ignore(path: &Path, root: &Path, ignored: &[PathBuf]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };

    if ignored.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }

    relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    })
}

/// Wait for the first change, then keep collecting until `quiet` passes
/// without another one. Returns `None` once the watcher has shut down.
pub async fn next_batch(
    rx: &mut mpsc::Receiver<FileChange>,
    quiet: Duration,
) -> Option<Vec<FileChange>> {
    let first = rx.recv().await?;
    let mut batch = vec![first];

    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Ok(Some(change)) => {
                if !batch.contains(&change) {
                    batch.push(change);
                }
            }
            Ok(None) | Err(_) => break,
        }
    }

    Some(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_ignore_output_and_cache() {
        let root = PathBuf::from("/project");
        let ignored = vec![
            PathBuf::from("/project/dist"),
            PathBuf::from("/project/cache"),
        ];

        assert!(should_ignore(Path::new("/project/dist/entry-1.js"), &root, &ignored));
        assert!(should_ignore(Path::new("/project/cache/cache.redb"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/src/index.js"), &root, &ignored));
        assert!(!should_ignore(
            Path::new("/project/node_modules/react/index.js"),
            &root,
            &ignored
        ));
    }

    #[test]
    fn test_should_ignore_hidden_and_outside() {
        let root = PathBuf::from("/project");
        assert!(should_ignore(Path::new("/project/.git/HEAD"), &root, &[]));
        assert!(should_ignore(Path::new("/project/src/.index.js.swp"), &root, &[]));
        assert!(should_ignore(Path::new("/etc/passwd"), &root, &[]));
    }

    #[test]
    fn test_file_change_path() {
        let change = FileChange::Removed(PathBuf::from("/project/src/a.js"));
        assert_eq!(change.path(), Path::new("/project/src/a.js"));
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let result = FileWatcher::new(PathBuf::from("/definitely/not/here"), vec![], 50);
        assert!(matches!(result, Err(CliError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_next_batch_collects_a_burst() {
        let (tx, mut rx) = mpsc::channel(10);
        let a = FileChange::Modified(PathBuf::from("/p/a.js"));
        let b = FileChange::Created(PathBuf::from("/p/b.js"));
        tx.send(a.clone()).await.unwrap();
        tx.send(a.clone()).await.unwrap();
        tx.send(b.clone()).await.unwrap();

        let batch = next_batch(&mut rx, Duration::from_millis(20)).await.unwrap();
        assert_eq!(batch, vec![a, b]);

        drop(tx);
        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_none());
    }
}
