//! Portable package archives (`.swole`, gzip-compressed tar).
//!
//! Archives are read fully into memory as a flat list of entries. Directory
//! entries are dropped; entry names keep their relative path with `/`
//! separators.
//!
//! The container is tar + gzip only. ZIP archives are not read: a `.swole`
//! file produced as a ZIP fails to decode with [`ArchiveError::Io`] and the
//! package is not indexed.
//!
//! Entry sizes come from untrusted headers. Every entry is checked against
//! a ceiling before any of its bytes are buffered.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use thiserror::Error;

/// Largest entry [`read_entries`] accepts, in bytes.
pub const DEFAULT_ENTRY_LIMIT: u64 = 100_000_000;

/// Errors from reading or writing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O error inside the compressed stream.
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry path escapes the archive root.
    #[error("Archive entry '{0}' has an unsafe path")]
    UnsafePath(String),

    /// An entry declares more bytes than the reader accepts.
    #[error("Archive entry '{name}' declares {size} bytes, limit is {limit}")]
    EntryTooLarge { name: String, size: u64, limit: u64 },

    /// The background decompression task failed.
    #[error("Archive worker failed: {0}")]
    Worker(String),
}

/// One file stored in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path relative to the archive root.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Final path component of the entry name.
    pub fn filename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Whether the entry sits at the archive root.
    pub fn is_root_level(&self) -> bool {
        !self.name.contains('/')
    }
}

fn normalize_entry_name(raw: &str) -> Result<String, ArchiveError> {
    let unified = raw.replace('\\', "/");
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect();
    if parts.is_empty() || parts.contains(&"..") {
        return Err(ArchiveError::UnsafePath(raw.to_string()));
    }
    Ok(parts.join("/"))
}

/// Decode every file entry of a `.swole` archive.
pub fn read_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    read_entries_limited(bytes, DEFAULT_ENTRY_LIMIT)
}

/// [`read_entries`] with an explicit per-entry ceiling.
pub fn read_entries_limited(bytes: &[u8], entry_limit: u64) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let decoder = GzDecoder::new(Cursor::new(bytes));
    let mut archive = tar::Archive::new(decoder);
    let mut entries = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let raw_name = entry.path()?.to_string_lossy().into_owned();
        let name = normalize_entry_name(&raw_name)?;

        let size = entry.size();
        if size > entry_limit {
            return Err(ArchiveError::EntryTooLarge {
                name,
                size,
                limit: entry_limit,
            });
        }

        // A header may lie about its size; never reserve more than the input.
        let hint = size.min(bytes.len() as u64) as usize;
        let mut data = Vec::with_capacity(hint);
        (&mut entry).take(entry_limit).read_to_end(&mut data)?;
        entries.push(ArchiveEntry::new(name, data));
    }

    Ok(entries)
}

/// [`read_entries_limited`] on a blocking worker thread.
pub async fn read_entries_async(bytes: Vec<u8>, entry_limit: u64) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    tokio::task::spawn_blocking(move || read_entries_limited(&bytes, entry_limit))
        .await
        .map_err(|e| ArchiveError::Worker(e.to_string()))?
}

/// Encode entries as a `.swole` archive.
pub fn write_entries(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        let name = normalize_entry_name(&entry.name)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        builder.append_data(&mut header, &name, entry.bytes.as_slice())?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_preserves_order_and_paths() {
        let entries = vec![
            ArchiveEntry::new("manifest.json", b"{}".to_vec()),
            ArchiveEntry::new("foo.swlson", b"{\"name\":\"foo\"}".to_vec()),
            ArchiveEntry::new("scripts/main.swlua", b"{}".to_vec()),
        ];

        let bytes = write_entries(&entries).unwrap();
        let read = read_entries(&bytes).unwrap();
        assert_eq!(read, entries);
        assert_eq!(read[2].filename(), "main.swlua");
        assert!(!read[2].is_root_level());
    }

    #[test]
    fn test_read_skips_directories() {
        let mut bytes = Vec::new();
        {
            let encoder = GzEncoder::new(&mut bytes, Compression::default());
            let mut builder = tar::Builder::new(encoder);

            let mut dir = tar::Header::new_gnu();
            dir.set_entry_type(tar::EntryType::Directory);
            dir.set_size(0);
            dir.set_mode(0o755);
            builder.append_data(&mut dir, "assets/", std::io::empty()).unwrap();

            let mut file = tar::Header::new_gnu();
            file.set_size(3);
            file.set_mode(0o644);
            builder.append_data(&mut file, "./assets/a.swlua", &b"abc"[..]).unwrap();

            builder.into_inner().unwrap().finish().unwrap();
        }

        let read = read_entries(&bytes).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].name, "assets/a.swlua");
    }

    #[test]
    fn test_unsafe_names_are_rejected() {
        assert!(matches!(
            normalize_entry_name("../escape.swlua"),
            Err(ArchiveError::UnsafePath(_))
        ));
        assert_eq!(normalize_entry_name("a\\b.swlua").unwrap(), "a/b.swlua");
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(read_entries(b"definitely not gzip").is_err());
    }

    #[tokio::test]
    async fn test_read_entries_async() {
        let bytes = write_entries(&[ArchiveEntry::new("manifest.json", b"{}".to_vec())]).unwrap();
        let read = read_entries_async(bytes, DEFAULT_ENTRY_LIMIT).await.unwrap();
        assert_eq!(read.len(), 1);
    }

    /// Gzip a single tar header that claims `size` bytes but carries none.
    fn forged_header_archive(size: u64) -> Vec<u8> {
        let mut header = tar::Header::new_gnu();
        header.set_path("foo.swlson").unwrap();
        header.set_size(size);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, header.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_forged_entry_size_is_rejected() {
        let bytes = forged_header_archive(1 << 42);
        assert!(bytes.len() < 4096);

        match read_entries(&bytes) {
            Err(ArchiveError::EntryTooLarge { name, size, limit }) => {
                assert_eq!(name, "foo.swlson");
                assert_eq!(size, 1 << 42);
                assert_eq!(limit, DEFAULT_ENTRY_LIMIT);
            }
            other => panic!("expected EntryTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_forged_entry_size_under_limit_does_not_reserve_it() {
        // Under a permissive ceiling the truncated body is an error or a
        // short entry, never a giant allocation.
        let bytes = forged_header_archive(1 << 42);
        match read_entries_limited(&bytes, u64::MAX) {
            Ok(entries) => assert!(entries.iter().all(|e| e.bytes.len() < 4096)),
            Err(e) => assert!(matches!(e, ArchiveError::Io(_))),
        }
    }

    #[test]
    fn test_entry_limit_applies_to_real_entries() {
        let bytes = write_entries(&[
            ArchiveEntry::new("manifest.json", b"{}".to_vec()),
            ArchiveEntry::new("big.swlson", vec![b' '; 64]),
        ])
        .unwrap();

        assert!(matches!(
            read_entries_limited(&bytes, 32),
            Err(ArchiveError::EntryTooLarge { size: 64, .. })
        ));
        assert_eq!(read_entries_limited(&bytes, 64).unwrap().len(), 2);
    }
}
