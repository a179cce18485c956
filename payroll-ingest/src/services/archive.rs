//! Zip archive validation and unpacking
//!
//! The archive arrives fully in memory. It is validated (central directory
//! readable) before any scratch space is touched, then unpacked entry by
//! entry into a caller-owned directory. Entry names that would escape that
//! directory are skipped.

use crate::error::{IngestError, IngestResult};
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::read::ZipFile;
use zip::ZipArchive;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Counts from one unpack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackStats {
    /// Regular files written to scratch
    pub files: usize,
    /// Directory entries
    pub directories: usize,
    /// Entries dropped for an unsafe name
    pub rejected: usize,
}

/// Open the archive, failing with [`IngestError::ArchiveCorrupt`] if invalid
pub fn open_archive(bytes: &[u8]) -> IngestResult<ZipArchive<Cursor<&[u8]>>> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

/// Unpack every entry under `dest`
///
/// Read failures inside the container are [`IngestError::ArchiveCorrupt`];
/// failures writing to `dest` are [`IngestError::Scratch`].
pub fn unpack_archive(bytes: &[u8], dest: &Path) -> IngestResult<UnpackStats> {
    let mut archive = open_archive(bytes)?;
    let mut stats = UnpackStats::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "Skipping archive entry with unsafe name");
            stats.rejected += 1;
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            stats.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        copy_entry(&mut entry, &mut out)?;
        stats.files += 1;
    }

    debug!(
        files = stats.files,
        directories = stats.directories,
        rejected = stats.rejected,
        "Archive unpacked"
    );
    Ok(stats)
}

/// Stream one entry to disk without trusting its declared size
///
/// Decompression and checksum failures are [`IngestError::ArchiveCorrupt`].
fn copy_entry(entry: &mut ZipFile<'_, impl Read>, out: &mut File) -> IngestResult<()> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(IngestError::ArchiveCorrupt(format!("{}: {}", entry.name(), e))),
        };
        out.write_all(&buf[..n])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = open_archive(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, IngestError::ArchiveCorrupt(_)));
    }

    #[test]
    fn test_truncated_archive_is_corrupt() {
        let bytes = build_zip(&[("a.pdf", b"%PDF-1.4")]);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(open_archive(truncated), Err(IngestError::ArchiveCorrupt(_))));
    }

    #[test]
    fn test_unpack_nested_entries() {
        let bytes = build_zip(&[("a.pdf", b"one"), ("quincena/b.pdf", b"two")]);
        let scratch = TempDir::new().unwrap();

        let stats = unpack_archive(&bytes, scratch.path()).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(std::fs::read(scratch.path().join("a.pdf")).unwrap(), b"one");
        assert_eq!(std::fs::read(scratch.path().join("quincena/b.pdf")).unwrap(), b"two");
    }

    #[test]
    fn test_entry_larger_than_copy_buffer() {
        let payload: Vec<u8> = (0..COPY_BUF_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let bytes = build_zip(&[("big.pdf", &payload)]);
        let scratch = TempDir::new().unwrap();

        unpack_archive(&bytes, scratch.path()).unwrap();
        assert_eq!(std::fs::read(scratch.path().join("big.pdf")).unwrap(), payload);
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let payload = b"%PDF-1.4 stored receipt body";
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file("a.pdf", options).unwrap();
        writer.write_all(payload).unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        let at = bytes
            .windows(payload.len())
            .position(|w| w == payload)
            .unwrap();
        bytes[at] ^= 0xFF;

        let scratch = TempDir::new().unwrap();
        let err = unpack_archive(&bytes, scratch.path()).unwrap_err();
        assert!(matches!(err, IngestError::ArchiveCorrupt(ref msg) if msg.starts_with("a.pdf")));
    }

    #[test]
    fn test_escaping_entries_are_skipped() {
        let bytes = build_zip(&[("../evil.pdf", b"x"), ("ok.pdf", b"y")]);
        let outer = TempDir::new().unwrap();
        let scratch = outer.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();

        let stats = unpack_archive(&bytes, &scratch).unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.rejected, 1);
        assert!(!outer.path().join("evil.pdf").exists());
        assert!(scratch.join("ok.pdf").exists());
    }

    #[test]
    fn test_empty_archive() {
        let bytes = build_zip(&[]);
        let scratch = TempDir::new().unwrap();
        assert_eq!(unpack_archive(&bytes, scratch.path()).unwrap(), UnpackStats::default());
    }
}
