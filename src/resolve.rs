//! Locating and reading an entry's bytes.
//!
//! An entry's data is up to two pieces: an inline preload prefix stored in
//! the tree, and a main part that lives either after the tree in the
//! directory file (`archive_index == 0x7FFF`) or in a numbered companion
//! archive next to it. Every read opens its own handle, dropped on return.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use tracing::{debug, trace};

use crate::entry::DirectoryEntry;
use crate::error::{Error, IntegrityError, Result};
use crate::header::Header;

pub const DIR_SUFFIX: &str = "_dir.vpk";

/// Physical position of an entry's main data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub path:   PathBuf,
    pub offset: u64,
    pub length: u32,
}

/// `foo_dir.vpk` → `foo_NNN.vpk`.
pub fn companion_path(dir_path: &Path, archive_index: u16) -> io::Result<PathBuf> {
    let file_name = dir_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "directory file has no UTF-8 name"))?;
    let stem = file_name.strip_suffix(DIR_SUFFIX).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{file_name}' does not end in {DIR_SUFFIX}, cannot name companion archives"),
        )
    })?;
    Ok(dir_path.with_file_name(format!("{stem}_{archive_index:03}.vpk")))
}

/// Where the main (non-preload) part of `entry` lives. `None` when there is
/// no main part.
pub fn locate(entry: &DirectoryEntry, header: &Header, dir_path: &Path) -> io::Result<Option<DataLocation>> {
    if entry.entry_length == 0 {
        return Ok(None);
    }
    let location = if entry.in_dir_file() {
        DataLocation {
            path:   dir_path.to_owned(),
            offset: header.data_start() + entry.entry_offset as u64,
            length: entry.entry_length,
        }
    } else {
        DataLocation {
            path:   companion_path(dir_path, entry.archive_index)?,
            offset: entry.entry_offset as u64,
            length: entry.entry_length,
        }
    };
    Ok(Some(location))
}

/// Errors keep their kind and name the archive and byte range.
fn read_at(path: &Path, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let len = buf.len();
    let read = |buf: &mut [u8]| -> io::Result<()> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    };
    read(buf).map_err(|e| {
        io::Error::new(e.kind(), format!("{} ({len} bytes at offset {offset}): {e}", path.display()))
    })
}

/// Assemble preload + main data for `entry` and verify its CRC.
///
/// `name` is the logical path, used only in errors.
pub fn read_entry(name: &str, entry: &DirectoryEntry, header: &Header, dir_path: &Path) -> Result<Vec<u8>> {
    let mut data = vec![0u8; entry.total_len()];
    let (preload, main) = data.split_at_mut(entry.preload_bytes as usize);

    if entry.has_preload() {
        let offset = entry.preload_offset.ok_or_else(|| Error::NotFound(name.to_owned()))?;
        trace!(name, offset, len = preload.len(), "reading preload");
        read_at(dir_path, offset, preload)?;
    }

    if let Some(loc) = locate(entry, header, dir_path)? {
        debug!(name, archive = %loc.path.display(), offset = loc.offset, len = loc.length, "reading entry data");
        read_at(&loc.path, loc.offset, main)?;
    }

    let mut hasher = Hasher::new();
    hasher.update(&data);
    let actual = hasher.finalize();
    if actual != entry.crc {
        return Err(IntegrityError::CrcMismatch { path: name.to_owned(), expected: entry.crc, actual }.into());
    }
    Ok(data)
}
