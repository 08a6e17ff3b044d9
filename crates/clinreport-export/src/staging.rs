// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Atomic staging: artifacts are written to hidden temporary files beside
// their destination and only renamed into place once complete. Dropping a
// `StagedFile` before commit deletes it.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clinreport_core::error::{ReportError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A complete-or-nothing output file.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedFile {
    /// Stage in the destination's directory so the final rename never
    /// crosses filesystems.
    pub fn create(destination: impl Into<PathBuf>) -> Result<Self> {
        let destination = destination.into();
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::Builder::new()
            .prefix(".clinreport-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|e| ReportError::export_io(dir, e))?;
        debug!(staged = %temp.path().display(), destination = %destination.display(), "Staging file");
        Ok(Self { temp, destination })
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let destination = self.destination.clone();
        self.temp
            .as_file_mut()
            .write_all(bytes)
            .map_err(|e| ReportError::export_io(destination, e))
    }

    /// Flush and fsync the staged bytes.
    pub fn sync(&mut self) -> Result<()> {
        let file = self.temp.as_file_mut();
        file.flush()
            .and_then(|()| file.sync_all())
            .map_err(|e| ReportError::export_io(&self.destination, e))
    }

    /// Rename into place without ever replacing an existing file.
    fn commit(self) -> Result<PathBuf> {
        let Self { temp, destination } = self;
        match temp.persist_noclobber(&destination) {
            Ok(_) => Ok(destination),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(ReportError::DestinationExists(destination))
            }
            Err(err) => Err(ReportError::export_io(destination, err.error)),
        }
    }
}

/// Commit every staged file, in order. If any commit fails, the files
/// already committed are removed again and the uncommitted ones discarded.
pub fn commit_all(staged: Vec<StagedFile>) -> Result<Vec<PathBuf>> {
    let mut committed: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for file in staged {
        match file.commit() {
            Ok(path) => committed.push(path),
            Err(err) => {
                rollback(&committed);
                return Err(err);
            }
        }
    }
    Ok(committed)
}

fn rollback(committed: &[PathBuf]) {
    for path in committed {
        if let Err(err) = std::fs::remove_file(path) {
            warn!(path = %path.display(), %err, "Could not roll back committed artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn committed_files_appear_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let mut staged = StagedFile::create(dir.path().join("out.pdf")).unwrap();
        staged.write_all(b"%PDF-1.7").unwrap();
        staged.sync().unwrap();
        assert!(!dir.path().join("out.pdf").exists());

        let paths = commit_all(vec![staged]).unwrap();
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"%PDF-1.7");
        assert_eq!(entries(dir.path()), vec!["out.pdf"]);
    }

    #[test]
    fn dropped_staging_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut staged = StagedFile::create(dir.path().join("out.zip")).unwrap();
            staged.write_all(b"partial").unwrap();
        }
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn existing_destination_is_never_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.pdf");
        std::fs::write(&dest, b"keep me").unwrap();
        let staged = StagedFile::create(&dest).unwrap();
        let err = commit_all(vec![staged]).unwrap_err();
        assert!(matches!(err, ReportError::DestinationExists(_)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"keep me");
    }

    #[test]
    fn failed_second_commit_rolls_back_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("bundle.pdf");
        let zip = dir.path().join("bundle.zip");
        std::fs::write(&zip, b"occupied").unwrap();

        let mut first = StagedFile::create(&pdf).unwrap();
        first.write_all(b"pdf").unwrap();
        let mut second = StagedFile::create(&zip).unwrap();
        second.write_all(b"zip").unwrap();

        assert!(commit_all(vec![first, second]).is_err());
        assert!(!pdf.exists());
        assert_eq!(entries(dir.path()), vec!["bundle.zip"]);
        assert_eq!(std::fs::read(&zip).unwrap(), b"occupied");
    }
}
