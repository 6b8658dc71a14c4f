// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::WorkspaceError;

const PARTIAL_SUFFIX: &str = ".partial";

/// Temporary directory that holds produced files for one run.
///
/// The value is the only handle to the directory: the orchestrator writes
/// through `&Workspace`, the packager reads through it, and [`Workspace::purge`]
/// consumes it.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
}

/// Result of a purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: usize,
}

impl Workspace {
    /// Create the directory if needed and confirm it is writable.
    ///
    /// Calling this again for the same path is harmless. Leftover `.partial`
    /// files from an interrupted run are removed.
    pub fn ensure(path: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let path = path.into();

        if path.exists() && !path.is_dir() {
            return Err(WorkspaceError::NotADirectory(path));
        }

        std::fs::create_dir_all(&path).map_err(|e| WorkspaceError::CreateDirectoryFailed {
            path: path.clone(),
            source: e,
        })?;

        tempfile::Builder::new()
            .prefix(".write-probe")
            .tempfile_in(&path)
            .map_err(|e| WorkspaceError::NotWritable {
                path: path.clone(),
                source: e,
            })?;

        let workspace = Self { path };
        let cleaned = workspace.remove_partials()?;
        if cleaned > 0 {
            debug!(cleaned, path = %workspace.path.display(), "removed stale partial files");
        }

        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of a finished file
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Location a file is written to before it is complete
    pub fn partial_path(&self, name: &str) -> PathBuf {
        self.path.join(format!("{name}{PARTIAL_SUFFIX}"))
    }

    fn remove_partials(&self) -> Result<usize, WorkspaceError> {
        let entries =
            std::fs::read_dir(&self.path).map_err(|e| WorkspaceError::ReadDirectoryFailed {
                path: self.path.clone(),
                source: e,
            })?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

            if is_partial && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Delete everything inside the directory, keeping the directory.
    ///
    /// Best effort: entries that cannot be removed are logged and counted,
    /// never raised.
    pub fn purge(self) -> PurgeReport {
        let mut report = PurgeReport::default();

        let entries = match std::fs::read_dir(&self.path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot list workspace for purge");
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "cannot read workspace entry");
                    report.failed += 1;
                    continue;
                }
            };

            let path = entry.path();
            let result = match entry.file_type() {
                Ok(kind) if kind.is_dir() => std::fs::remove_dir_all(&path),
                _ => std::fs::remove_file(&path),
            };

            match result {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove workspace entry");
                    report.failed += 1;
                }
            }
        }

        debug!(
            removed = report.removed,
            failed = report.failed,
            path = %self.path.display(),
            "workspace purged"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out_mp3");

        assert!(!path.exists());
        let workspace = Workspace::ensure(&path).unwrap();
        assert!(path.is_dir());
        assert_eq!(workspace.path(), path.as_path());
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out_mp3");

        Workspace::ensure(&path).unwrap();
        std::fs::write(path.join("keep.mp3"), b"audio").unwrap();
        Workspace::ensure(&path).unwrap();

        assert!(path.join("keep.mp3").exists());
    }

    #[test]
    fn ensure_leaves_no_probe_file() {
        let dir = tempdir().unwrap();
        Workspace::ensure(dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn ensure_rejects_a_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-dir");
        std::fs::write(&path, b"x").unwrap();

        let result = Workspace::ensure(&path);
        assert!(matches!(result, Err(WorkspaceError::NotADirectory(_))));
    }

    #[test]
    fn ensure_removes_stale_partials() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp3.partial"), b"half").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"whole").unwrap();

        Workspace::ensure(dir.path()).unwrap();

        assert!(!dir.path().join("a.mp3.partial").exists());
        assert!(dir.path().join("b.mp3").exists());
    }

    #[test]
    fn purge_empties_but_keeps_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out_mp3");
        let workspace = Workspace::ensure(&path).unwrap();

        std::fs::write(workspace.file_path("a.mp3"), b"a").unwrap();
        std::fs::write(workspace.file_path("b.mp3"), b"b").unwrap();
        std::fs::create_dir(path.join("nested")).unwrap();
        std::fs::write(path.join("nested").join("c.jpg"), b"c").unwrap();

        let report = workspace.purge();

        assert_eq!(report, PurgeReport { removed: 3, failed: 0 });
        assert!(path.is_dir());
        assert_eq!(std::fs::read_dir(&path).unwrap().count(), 0);
    }

    #[test]
    fn purge_tolerates_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out_mp3");
        let workspace = Workspace::ensure(&path).unwrap();
        std::fs::remove_dir(&path).unwrap();

        let report = workspace.purge();
        assert_eq!(report, PurgeReport::default());
    }

    #[test]
    fn partial_path_sits_next_to_final_path() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::ensure(dir.path()).unwrap();

        assert_eq!(
            workspace.partial_path("x.mp3"),
            dir.path().join("x.mp3.partial")
        );
        assert_eq!(workspace.file_path("x.mp3"), dir.path().join("x.mp3"));
    }
}
