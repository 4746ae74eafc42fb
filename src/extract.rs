//! Zip extraction
//!
//! Walks every entry of a zip archive and recreates its relative directory
//! structure under a target directory. An entry whose resolved path would
//! fall outside the target is invalid input and fails the whole extraction;
//! a failed extraction removes whatever it already wrote so no partial
//! asset is ever left installed.
//!
//! All functions here are blocking; callers run them on a blocking task.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Extract `archive_path` into `target_dir`, cleaning up on failure
pub(crate) fn extract_zip(archive_path: &Path, target_dir: &Path) -> Result<()> {
    let result = extract_entries(archive_path, target_dir);
    if result.is_err() {
        // Failure mid-extraction must not leave a half-written asset behind.
        if let Err(e) = std::fs::remove_dir_all(target_dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    target = %target_dir.display(),
                    error = %e,
                    "failed to clean up partial extraction"
                );
            }
        }
    }
    result
}

fn extract_entries(archive_path: &Path, target_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(target_dir).map_err(|e| Error::io(target_dir, e))?;

    let file = std::fs::File::open(archive_path).map_err(|e| Error::io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::Extraction {
        archive: archive_path.to_path_buf(),
        reason: format!("failed to read zip archive: {}", e),
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| Error::Extraction {
            archive: archive_path.to_path_buf(),
            reason: format!("failed to read zip entry: {}", e),
        })?;

        // Containment check before any write: an entry addressing outside
        // the target directory fails the extraction outright.
        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                return Err(Error::Extraction {
                    archive: archive_path.to_path_buf(),
                    reason: format!(
                        "entry '{}' escapes the extraction directory",
                        entry.name()
                    ),
                });
            }
        };
        let out_path = target_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut out_file =
            std::fs::File::create(&out_path).map_err(|e| Error::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| Error::io(&out_path, e))?;
    }

    debug!(
        archive = %archive_path.display(),
        target = %target_dir.display(),
        entries = archive.len(),
        "archive extracted"
    );
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Build a zip archive on disk from (name, content) pairs
    fn create_zip(archive_path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(name.trim_end_matches('/'), options).unwrap();
            } else {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_nested_structure() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.zip");
        create_zip(
            &archive,
            &[
                ("index.html", b"<html>".as_slice()),
                ("css/app.css", b"body{}".as_slice()),
                ("js/app.js", b"void 0".as_slice()),
            ],
        );

        let target = temp.path().join("out");
        extract_zip(&archive, &target).unwrap();

        assert_eq!(std::fs::read(target.join("index.html")).unwrap(), b"<html>");
        assert_eq!(std::fs::read(target.join("css/app.css")).unwrap(), b"body{}");
        assert_eq!(std::fs::read(target.join("js/app.js")).unwrap(), b"void 0");
    }

    #[test]
    fn traversal_entry_fails_extraction() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.zip");
        create_zip(
            &archive,
            &[
                ("good.txt", b"ok".as_slice()),
                ("../escape.txt", b"bad".as_slice()),
            ],
        );

        let target = temp.path().join("out");
        let err = extract_zip(&archive, &target).unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
        // Nothing escaped, and the partial output was cleaned up.
        assert!(!temp.path().join("escape.txt").exists());
        assert!(!target.exists());
    }

    #[test]
    fn failure_removes_partial_output() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("truncated.zip");
        std::fs::write(&archive, b"PK\x03\x04 this is not a zip").unwrap();

        let target = temp.path().join("out");
        assert!(extract_zip(&archive, &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn directory_entries_are_recreated() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dirs.zip");
        create_zip(
            &archive,
            &[
                ("empty/", b"".as_slice()),
                ("www/index.html", b"<html>".as_slice()),
            ],
        );

        let target = temp.path().join("out");
        extract_zip(&archive, &target).unwrap();

        assert!(target.join("empty").is_dir());
        assert!(target.join("www/index.html").is_file());

        let extracted: Vec<PathBuf> = walkdir::WalkDir::new(&target)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .collect();
        assert_eq!(extracted, vec![target.join("www/index.html")]);
    }
}
