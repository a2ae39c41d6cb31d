//! Atomic publication of a build's artifacts.
//!
//! A build replaces its output directory as a whole:
//!
//! 1. Every artifact is written into a staging directory next to the target
//!    (`.<name>.staging-<pid>-<n>`), after its path has been validated.
//! 2. The current output directory, if any, is renamed aside.
//! 3. The staging directory is renamed into place and the old one removed.
//!
//! If writing fails the staging directory is deleted and the previous
//! output is untouched. If the final rename fails the previous output is
//! renamed back. Readers therefore see either the old set of files or the
//! new one, never a mix. Staging beside the target keeps every rename on
//! one filesystem.
//!
//! Staging and backup names are unique per call, so concurrent publishes
//! never share scratch directories. Within one process the swap step is
//! serialized and the last publish to finish wins. Separate processes
//! publishing to the same directory are not coordinated.

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use super::Artifact;
use crate::{Error, Result};

static PUBLISH_SEQ: AtomicU64 = AtomicU64::new(0);
static SWAP_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Replace `dir` with a directory holding exactly `artifacts`.
///
/// # Errors
///
/// - [`Error::InvalidOutputPath`] for an unusable directory, an existing
///   path that is not a directory, or a file name that escapes it
/// - [`Error::WriteFailure`] when staging or swapping fails
pub fn publish(dir: &Path, artifacts: &[Artifact]) -> Result<()> {
    let dir = validate_and_normalize_dir(dir)?;
    let (parent, name) = split_dir(&dir)?;
    if dir.exists() && !dir.is_dir() {
        return Err(Error::InvalidOutputPath(format!(
            "Output path '{}' exists and is not a directory",
            dir.display()
        )));
    }

    fs::create_dir_all(&parent).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create parent directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let suffix = format!("{}-{}", std::process::id(), PUBLISH_SEQ.fetch_add(1, Ordering::Relaxed));
    let staging = parent.join(format!(".{name}.staging-{suffix}"));
    let backup = parent.join(format!(".{name}.old-{suffix}"));

    remove_dir_if_exists(&staging);
    fs::create_dir(&staging).map_err(|e| {
        Error::WriteFailure(format!(
            "Failed to create staging directory '{}': {}",
            staging.display(),
            e
        ))
    })?;

    if let Err(err) = write_all(&staging, artifacts) {
        remove_dir_if_exists(&staging);
        return Err(err);
    }

    {
        let _swap = SWAP_LOCK.lock();
        swap_into_place(&staging, &dir, &backup)?;
    }

    tracing::debug!(dir = %dir.display(), files = artifacts.len(), "published artifacts");
    Ok(())
}

fn write_all(staging: &Path, artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        let target = validate_output_path(staging, &artifact.file_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::WriteFailure(format!(
                    "Failed to create directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        fs::write(&target, &artifact.bytes).map_err(|e| {
            Error::WriteFailure(format!(
                "Failed to write '{}': {}",
                target.display(),
                e
            ))
        })?;
    }
    Ok(())
}

fn swap_into_place(staging: &Path, dir: &Path, backup: &Path) -> Result<()> {
    let had_previous = dir.exists();
    if had_previous {
        remove_dir_if_exists(backup);
        if let Err(e) = fs::rename(dir, backup) {
            remove_dir_if_exists(staging);
            return Err(Error::WriteFailure(format!(
                "Failed to move previous output '{}' aside: {}",
                dir.display(),
                e
            )));
        }
    }

    if let Err(e) = fs::rename(staging, dir) {
        if had_previous {
            if let Err(restore) = fs::rename(backup, dir) {
                tracing::error!(
                    backup = %backup.display(),
                    error = %restore,
                    "failed to restore previous output"
                );
            }
        }
        remove_dir_if_exists(staging);
        return Err(Error::WriteFailure(format!(
            "Failed to move staged output into '{}': {}",
            dir.display(),
            e
        )));
    }

    if had_previous {
        remove_dir_if_exists(backup);
    }
    Ok(())
}

/// Best-effort removal; failures are logged since the caller is either
/// cleaning up after an error or discarding a stale directory.
fn remove_dir_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove directory");
        }
    }
}

/// Validates and normalizes a directory path.
///
/// Resolves `.` and `..` and makes the path absolute against the current
/// working directory.
pub(crate) fn validate_and_normalize_dir(dir: &Path) -> Result<PathBuf> {
    if dir.as_os_str().is_empty() {
        return Err(Error::InvalidOutputPath(
            "Output directory is empty".to_string(),
        ));
    }

    let cleaned = dir.clean();

    let absolute = if cleaned.is_absolute() {
        cleaned
    } else {
        std::env::current_dir()
            .map_err(|e| {
                Error::InvalidOutputPath(format!("Failed to get current directory: {}", e))
            })?
            .join(&cleaned)
            .clean()
    };

    Ok(absolute)
}

fn split_dir(dir: &Path) -> Result<(PathBuf, String)> {
    let parent = dir.parent().ok_or_else(|| {
        Error::InvalidOutputPath(format!(
            "Output directory '{}' has no parent directory",
            dir.display()
        ))
    })?;
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::InvalidOutputPath(format!(
                "Output directory '{}' has no name",
                dir.display()
            ))
        })?;
    Ok((parent.to_path_buf(), name))
}

/// Validates an output path to prevent directory traversal.
///
/// The file name is cleaned, joined to `base_dir` and cleaned again; the
/// result must still lie under `base_dir`.
pub(crate) fn validate_output_path(base_dir: &Path, filename: &str) -> Result<PathBuf> {
    if filename.is_empty() {
        return Err(Error::InvalidOutputPath("Filename is empty".to_string()));
    }
    if filename.contains('\0') {
        return Err(Error::InvalidOutputPath(
            "Filename contains null byte".to_string(),
        ));
    }

    let filename_path = Path::new(filename).clean();
    let full_path = base_dir.join(&filename_path).clean();

    if !full_path.starts_with(base_dir) || full_path == base_dir {
        return Err(Error::InvalidOutputPath(format!(
            "Path '{}' escapes output directory '{}' (resolved to '{}')",
            filename,
            base_dir.display(),
            full_path.display()
        )));
    }

    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(name: &str, text: &str) -> Artifact {
        Artifact::new(name, text.as_bytes().to_vec())
    }

    #[test]
    fn test_validate_output_path_normal() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "entry-1234abcd.js").unwrap();
        assert_eq!(result, Path::new("/tmp/output/entry-1234abcd.js"));
    }

    #[test]
    fn test_validate_output_path_current_dir() {
        let base = Path::new("/tmp/output");
        let result = validate_output_path(base, "./manifest.json").unwrap();
        assert_eq!(result, Path::new("/tmp/output/manifest.json"));
    }

    #[test]
    fn test_validate_output_path_traversal() {
        let base = Path::new("/tmp/output");
        assert!(matches!(
            validate_output_path(base, "../etc/passwd"),
            Err(Error::InvalidOutputPath(_))
        ));
        assert!(validate_output_path(base, "safe/../../../../etc/passwd").is_err());
        assert!(validate_output_path(base, "file\0name.js").is_err());
        assert!(validate_output_path(base, ".").is_err());
    }

    #[test]
    fn test_publish_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");

        publish(&dist, &[artifact("a.js", "a"), artifact("manifest.json", "{}")]).unwrap();

        assert_eq!(fs::read_to_string(dist.join("a.js")).unwrap(), "a");
        assert!(dist.join("manifest.json").exists());
    }

    #[test]
    fn test_publish_replaces_previous_output_entirely() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");
        publish(&dist, &[artifact("old.js", "old")]).unwrap();

        publish(&dist, &[artifact("new.js", "new")]).unwrap();

        assert!(!dist.join("old.js").exists());
        assert_eq!(fs::read_to_string(dist.join("new.js")).unwrap(), "new");
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("dist")]);
    }

    #[test]
    fn test_failed_publish_keeps_previous_output() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");
        publish(&dist, &[artifact("keep.js", "keep")]).unwrap();

        let err = publish(
            &dist,
            &[artifact("fine.js", "fine"), artifact("../escape.js", "bad")],
        )
        .unwrap_err();

        assert!(matches!(err, Error::InvalidOutputPath(_)));
        assert_eq!(fs::read_to_string(dist.join("keep.js")).unwrap(), "keep");
        assert!(!dist.join("fine.js").exists());
        assert!(!tmp.path().join("escape.js").exists());
        let entries = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1, "staging directory should be removed");
    }

    #[test]
    fn test_publish_refuses_to_replace_a_file() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("notes.txt");
        fs::write(&target, "keep me").unwrap();

        let err = publish(&target, &[artifact("a.js", "a")]).unwrap_err();

        assert!(matches!(err, Error::InvalidOutputPath(_)));
        assert_eq!(fs::read_to_string(&target).unwrap(), "keep me");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_concurrent_publishes_to_one_directory() {
        let tmp = TempDir::new().unwrap();
        let dist = tmp.path().join("dist");

        std::thread::scope(|scope| {
            for round in 0..8 {
                let dist = &dist;
                scope.spawn(move || {
                    let name = format!("round-{round}.js");
                    publish(dist, &[artifact(&name, "x"), artifact("manifest.json", "{}")]).unwrap();
                });
            }
        });

        let files: Vec<_> = fs::read_dir(&dist)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files.len(), 2, "one complete publish expected, got {files:?}");
        assert!(files.contains(&"manifest.json".to_string()));
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("dist")]);
    }
}
