//! File-handle tracking shared by all allocator strategies.
//!
//! Opens and closes go through the owning allocator's counters so that an
//! unbalanced count can be reported when the allocator is torn down.

use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

use memkit_common::{Error, Result};

use crate::counter::AllocCounters;

/// Access mode of a stream opened with a C `fopen` mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// `r`: read an existing file.
    Read,
    /// `w`: create or truncate, write only.
    Write,
    /// `a`: create if missing, append only.
    Append,
    /// `r+`: read and write an existing file.
    ReadUpdate,
    /// `w+`: create or truncate, read and write.
    WriteUpdate,
    /// `a+`: create if missing, read anywhere, append writes.
    AppendUpdate,
}

impl StreamMode {
    /// Parses `r`, `w`, `a` optionally followed by `+` and/or `b` in any order.
    ///
    /// The binary flag is accepted and ignored; there is no text translation.
    pub fn parse(mode: &str) -> Result<StreamMode> {
        let mut chars = mode.chars();
        let base = chars.next();
        let mut update = false;
        let mut binary = false;
        for c in chars {
            match c {
                '+' if !update => update = true,
                'b' if !binary => binary = true,
                _ => return Err(Error::invalid_arg("mode", format!("unsupported mode '{mode}'"))),
            }
        }
        match (base, update) {
            (Some('r'), false) => Ok(StreamMode::Read),
            (Some('w'), false) => Ok(StreamMode::Write),
            (Some('a'), false) => Ok(StreamMode::Append),
            (Some('r'), true) => Ok(StreamMode::ReadUpdate),
            (Some('w'), true) => Ok(StreamMode::WriteUpdate),
            (Some('a'), true) => Ok(StreamMode::AppendUpdate),
            _ => Err(Error::invalid_arg("mode", format!("unsupported mode '{mode}'"))),
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, StreamMode::Read)
    }

    /// The equivalent `OpenOptions`.
    pub fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            StreamMode::Read => options.read(true),
            StreamMode::Write => options.write(true).create(true).truncate(true),
            StreamMode::Append => options.append(true).create(true),
            StreamMode::ReadUpdate => options.read(true).write(true),
            StreamMode::WriteUpdate => options.read(true).write(true).create(true).truncate(true),
            StreamMode::AppendUpdate => options.read(true).append(true).create(true),
        };
        options
    }
}

pub(crate) fn open_tracked(
    counters: &AllocCounters,
    path: &Path,
    options: &OpenOptions,
) -> Result<File> {
    let file = options
        .open(path)
        .map_err(|e| Error::io(path.display().to_string(), e))?;
    counters.record_open();
    log::trace!("opened {}", path.display());
    Ok(file)
}

pub(crate) fn close_tracked(counters: &AllocCounters, file: File) {
    drop(file);
    counters.record_close();
}

/// Syncs written data to disk, then closes. Read-only handles reject the
/// sync on some platforms; they have nothing to flush.
pub(crate) fn fclose_tracked(counters: &AllocCounters, file: File) -> Result<()> {
    let synced = match file.sync_data() {
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => Ok(()),
        other => other,
    };
    close_tracked(counters, file);
    synced.map_err(|e| Error::io("fclose", e))
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::*;
    use crate::{Allocator, HeapAllocator};

    #[test]
    fn test_parse_modes() {
        assert_eq!(StreamMode::parse("r").unwrap(), StreamMode::Read);
        assert_eq!(StreamMode::parse("rb").unwrap(), StreamMode::Read);
        assert_eq!(StreamMode::parse("w").unwrap(), StreamMode::Write);
        assert_eq!(StreamMode::parse("a").unwrap(), StreamMode::Append);
        assert_eq!(StreamMode::parse("r+").unwrap(), StreamMode::ReadUpdate);
        assert_eq!(StreamMode::parse("r+b").unwrap(), StreamMode::ReadUpdate);
        assert_eq!(StreamMode::parse("rb+").unwrap(), StreamMode::ReadUpdate);
        assert_eq!(StreamMode::parse("w+").unwrap(), StreamMode::WriteUpdate);
        assert_eq!(StreamMode::parse("a+").unwrap(), StreamMode::AppendUpdate);
        assert!(!StreamMode::Read.is_writable());
        assert!(StreamMode::Append.is_writable());
    }

    #[test]
    fn test_parse_rejects_bad_modes() {
        for mode in ["", "x", "rw", "r++", "rbb", "+r", "wx"] {
            assert!(StreamMode::parse(mode).unwrap_err().is_invalid_arg(), "{mode}");
        }
    }

    #[test]
    fn test_open_close_balance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        let heap = HeapAllocator::create().unwrap();

        let mut file = heap.fopen(&path, "w").unwrap();
        file.write_all(b"hello\n").unwrap();
        heap.fclose(file).unwrap();

        let mut file = heap.open(&path, OpenOptions::new().read(true)).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        assert_eq!(text, "hello\n");
        heap.close(file);

        let stats = heap.destroy();
        assert_eq!(stats.opens, 2);
        assert_eq!(stats.closes, 2);
        assert!(stats.is_balanced());
    }

    #[test]
    fn test_fclose_syncs_writes_and_accepts_read_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synced.txt");
        let heap = HeapAllocator::create().unwrap();

        let mut file = heap.fopen(&path, "a").unwrap();
        file.write_all(b"first\n").unwrap();
        heap.fclose(file).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first\n");

        let file = heap.fopen(&path, "rb").unwrap();
        heap.fclose(file).unwrap();

        let stats = heap.destroy();
        assert_eq!(stats.opens, 2);
        assert!(stats.is_balanced());
    }

    #[test]
    fn test_failed_open_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let heap = HeapAllocator::create().unwrap();
        let err = heap.fopen(&dir.path().join("missing.txt"), "r").unwrap_err();
        assert!(matches!(err.kind(), memkit_common::ErrorKind::Io { .. }));
        assert_eq!(heap.stats().opens, 0);
    }

    #[test]
    fn test_unclosed_file_reports_imbalance() {
        let dir = tempfile::tempdir().unwrap();
        let heap = HeapAllocator::create().unwrap();
        let file = heap.fopen(&dir.path().join("leak.txt"), "w").unwrap();
        let stats = heap.destroy();
        assert_eq!(stats.outstanding_handles(), 1);
        assert!(!stats.is_balanced());
        drop(file);
    }
}
