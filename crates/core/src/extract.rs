//! Archive extraction into the tool cache.
//!
//! Bundles are unpacked into a private staging directory next to the
//! destination, then renamed into place so the directory contents appear in
//! one step. The completion marker is written only after the rename.
//!
//! Checking, replacing, renaming and marking an entry all happen while
//! holding an exclusive lock on `<destination>.lock`, so a concurrent
//! writer never removes an entry another writer is about to mark.

use flate2::read::GzDecoder;
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

use crate::cache::{PINNED_VERSION_FILE, lock_for, marker_for};
use crate::{Error, Result};

/// Archive formats bundles are published in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.tar.gz` or `.tgz`
    TarGz,
}

impl ArchiveKind {
    /// Detect the format from a file name.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `destination` and register it.
///
/// Writes `pinned-version` inside the entry and `<destination>.complete`
/// beside it. If another process completed the same entry meanwhile, the
/// staged copy is discarded and the existing entry is kept; a destination
/// left without a marker is replaced.
///
/// # Errors
///
/// Every failure, including I/O errors while staging or renaming, is reported
/// as [`Error::ExtractionFailed`] carrying the underlying cause.
pub fn extract_to_cache(archive: &Path, destination: &Path, version: &str) -> Result<PathBuf> {
    let kind = ArchiveKind::from_path(archive).ok_or_else(|| {
        Error::extraction_failed(
            archive,
            format!("unsupported archive format: {}", archive.display()),
        )
    })?;
    let failed = |e: std::io::Error| Error::extraction_failed(archive, e);

    let parent = destination
        .parent()
        .ok_or_else(|| Error::extraction_failed(archive, "destination has no parent directory"))?;
    std::fs::create_dir_all(parent).map_err(failed)?;

    let staging_prefix = format!(
        ".{}.",
        destination
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("extract")
    );
    let staging = tempfile::Builder::new()
        .prefix(&staging_prefix)
        .tempdir_in(parent)
        .map_err(failed)?;

    info!(?archive, ?destination, "Extracting bundle");
    match kind {
        ArchiveKind::Zip => unpack_zip(archive, staging.path())?,
        ArchiveKind::TarGz => unpack_tar_gz(archive, staging.path())?,
    }
    std::fs::write(staging.path().join(PINNED_VERSION_FILE), version).map_err(failed)?;

    let lock_path = lock_for(destination);
    let lock = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(failed)?;
    lock.lock_exclusive().map_err(failed)?;
    debug!(lock = ?lock_path, "Acquired cache entry lock");

    let registered = register(staging.path(), destination).map_err(failed);
    // Unlock happens automatically when the file is dropped
    drop(lock);
    registered
}

/// Move a staged tree onto `destination` and write its marker.
///
/// Callers hold the entry lock.
fn register(staged: &Path, destination: &Path) -> std::io::Result<PathBuf> {
    let marker = marker_for(destination);
    if marker.is_file() && destination.is_dir() {
        debug!(?destination, "Entry completed concurrently, discarding staged copy");
        return Ok(destination.to_path_buf());
    }

    if destination.exists() {
        warn!(?destination, "Replacing incomplete cache entry");
        std::fs::remove_dir_all(destination)?;
    }

    std::fs::rename(staged, destination)?;
    std::fs::write(&marker, b"")?;
    debug!(?destination, ?marker, "Registered cache entry");
    Ok(destination.to_path_buf())
}

/// Unpack a zip archive into `dest`.
fn unpack_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::extraction_failed(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::extraction_failed(archive, e))?;
    zip.extract(dest)
        .map_err(|e| Error::extraction_failed(archive, e))
}

/// Unpack a gzip-compressed tarball into `dest`.
fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|e| Error::extraction_failed(archive, e))?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(dest)
        .map_err(|e| Error::extraction_failed(archive, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_tarball(dir: &Path, files: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("codeql-bundle-linux64.tar.gz");
        let file = File::create(&path).unwrap();
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_path(name).unwrap();
            header.set_size(content.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append(&header, &content[..]).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    fn create_zip(dir: &Path, files: &[(&str, &[u8])]) -> PathBuf {
        let path = dir.join("codeql-bundle-win64.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }

        writer.finish().unwrap();
        path
    }

    #[test]
    fn test_archive_kind() {
        assert_eq!(
            ArchiveKind::from_path(Path::new("codeql-bundle-win64.zip")),
            Some(ArchiveKind::Zip)
        );
        assert_eq!(
            ArchiveKind::from_path(Path::new("/tmp/codeql-bundle-linux64.tar.gz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(
            ArchiveKind::from_path(Path::new("bundle.tgz")),
            Some(ArchiveKind::TarGz)
        );
        assert_eq!(ArchiveKind::from_path(Path::new("bundle.tar.xz")), None);
    }

    #[test]
    fn test_extract_tar_gz_registers_entry() {
        let temp = TempDir::new().unwrap();
        let archive = create_tarball(temp.path(), &[("codeql/codeql", b"#!/bin/sh")]);
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");

        let path = extract_to_cache(&archive, &dest, "2.3.0").unwrap();

        assert_eq!(path, dest);
        assert!(dest.join("codeql").join("codeql").is_file());
        assert_eq!(
            std::fs::read_to_string(dest.join(PINNED_VERSION_FILE)).unwrap(),
            "2.3.0"
        );
        assert!(temp.path().join("tools/CodeQL/2.3.0/x64.complete").is_file());
    }

    #[test]
    fn test_extract_zip_registers_entry() {
        let temp = TempDir::new().unwrap();
        let archive = create_zip(temp.path(), &[("codeql/codeql.exe", b"MZ")]);
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");

        extract_to_cache(&archive, &dest, "2.3.0").unwrap();

        assert_eq!(
            std::fs::read(dest.join("codeql").join("codeql.exe")).unwrap(),
            b"MZ"
        );
        assert!(marker_for(&dest).is_file());
    }

    #[test]
    fn test_corrupt_archive_leaves_no_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("codeql-bundle-linux64.tar.gz");
        std::fs::write(&archive, b"this is not gzip").unwrap();
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");

        let err = extract_to_cache(&archive, &dest, "2.3.0").unwrap_err();

        assert!(matches!(err, Error::ExtractionFailed { .. }));
        assert!(!dest.exists());
        assert!(!marker_for(&dest).exists());
        let leftovers: Vec<_> = std::fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bundle.rar");
        std::fs::write(&archive, b"rar").unwrap();

        let err = extract_to_cache(&archive, &temp.path().join("x64"), "2.3.0").unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed { .. }));
    }

    #[test]
    fn test_incomplete_entry_is_replaced() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("half-written"), b"partial").unwrap();

        let archive = create_tarball(temp.path(), &[("codeql/codeql", b"#!/bin/sh")]);
        extract_to_cache(&archive, &dest, "2.3.0").unwrap();

        assert!(!dest.join("half-written").exists());
        assert!(dest.join("codeql").join("codeql").is_file());
        assert!(marker_for(&dest).is_file());
    }

    #[test]
    fn test_completed_entry_is_kept() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("winner"), b"first").unwrap();
        std::fs::write(marker_for(&dest), b"").unwrap();

        let archive = create_tarball(temp.path(), &[("codeql/codeql", b"#!/bin/sh")]);
        let path = extract_to_cache(&archive, &dest, "2.3.0").unwrap();

        assert_eq!(path, dest);
        assert!(dest.join("winner").exists());
        assert!(!dest.join("codeql").exists());
    }

    #[test]
    fn test_waits_for_entry_lock_and_keeps_winner() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("tools/CodeQL/2.3.0/x64");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        let archive = create_tarball(temp.path(), &[("codeql/codeql", b"#!/bin/sh")]);

        // Another writer holds the entry while it renames and marks.
        let held = File::create(lock_for(&dest)).unwrap();
        held.lock_exclusive().unwrap();

        let worker = {
            let archive = archive.clone();
            let dest = dest.clone();
            std::thread::spawn(move || extract_to_cache(&archive, &dest, "2.3.0"))
        };
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(!dest.join("codeql").exists());

        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("winner"), b"first").unwrap();
        std::fs::write(marker_for(&dest), b"").unwrap();
        drop(held);

        let path = worker.join().unwrap().unwrap();
        assert_eq!(path, dest);
        assert!(dest.join("winner").is_file());
        assert!(!dest.join("codeql").exists());
        assert!(marker_for(&dest).is_file());
    }
}
