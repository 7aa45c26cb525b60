use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

use crate::error::{FormatError, Result};

/// `archive_index` value meaning the data lives in the directory file itself.
pub const DIR_ARCHIVE_INDEX: u16 = 0x7FFF;
pub const ENTRY_TERMINATOR: u16 = 0xFFFF;
/// On-disk size of an entry record, terminator included.
pub const ENTRY_RECORD_LEN: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub crc:            u32,
    pub preload_bytes:  u16,
    pub archive_index:  u16,
    /// Relative to the end of the tree for directory-file entries,
    /// absolute within the companion archive otherwise.
    pub entry_offset:   u32,
    pub entry_length:   u32,
    /// Absolute position of the inline preload payload in the directory file.
    /// Set only for entries parsed out of a tree.
    pub preload_offset: Option<u64>,
}

impl DirectoryEntry {
    pub fn in_dir_file(&self) -> bool {
        self.archive_index == DIR_ARCHIVE_INDEX
    }

    pub fn has_preload(&self) -> bool {
        self.preload_bytes > 0
    }

    /// Total size of the file once preload and main data are joined.
    pub fn total_len(&self) -> usize {
        self.preload_bytes as usize + self.entry_length as usize
    }

    /// Read one record and check its terminator. `path` only feeds the error.
    pub fn read<R: Read>(mut reader: R, path: &str) -> Result<Self> {
        let entry = Self {
            crc:            reader.read_u32::<LittleEndian>()?,
            preload_bytes:  reader.read_u16::<LittleEndian>()?,
            archive_index:  reader.read_u16::<LittleEndian>()?,
            entry_offset:   reader.read_u32::<LittleEndian>()?,
            entry_length:   reader.read_u32::<LittleEndian>()?,
            preload_offset: None,
        };
        let terminator = reader.read_u16::<LittleEndian>()?;
        if terminator != ENTRY_TERMINATOR {
            return Err(FormatError::InvalidTerminator { path: path.to_owned(), found: terminator }.into());
        }
        Ok(entry)
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_u16::<LittleEndian>(self.preload_bytes)?;
        writer.write_u16::<LittleEndian>(self.archive_index)?;
        writer.write_u32::<LittleEndian>(self.entry_offset)?;
        writer.write_u32::<LittleEndian>(self.entry_length)?;
        writer.write_u16::<LittleEndian>(ENTRY_TERMINATOR)?;
        Ok(())
    }
}
