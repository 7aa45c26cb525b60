use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{self, Read, Write};

use crate::error::{FormatError, Result};

pub const SIGNATURE: u32 = 0x55AA_1234;
pub const HEADER_V1_LEN: u64 = 12;
pub const HEADER_V2_LEN: u64 = 28;

/// Fields only present in version 2 headers. Carried verbatim, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HeaderV2Ext {
    pub reserved_a:    u32,
    pub footer_length: u32,
    pub reserved_b:    u32,
    pub reserved_c:    u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Header {
    pub version:     u32,
    /// Byte length of the tree section that directly follows the header.
    pub tree_length: u32,
    pub v2:          Option<HeaderV2Ext>,
}

impl Header {
    pub fn v1(tree_length: u32) -> Self {
        Self { version: 1, tree_length, v2: None }
    }

    /// Size of the header on disk.
    pub fn size(&self) -> u64 {
        if self.version == 2 { HEADER_V2_LEN } else { HEADER_V1_LEN }
    }

    /// Absolute offset of the first byte after the tree section.
    pub fn data_start(&self) -> u64 {
        self.size() + self.tree_length as u64
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let signature = reader.read_u32::<LittleEndian>()?;
        if signature != SIGNATURE {
            return Err(FormatError::InvalidSignature(signature).into());
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != 1 && version != 2 {
            return Err(FormatError::InvalidVersion(version).into());
        }
        let tree_length = reader.read_u32::<LittleEndian>()?;
        let v2 = if version == 2 {
            Some(HeaderV2Ext {
                reserved_a:    reader.read_u32::<LittleEndian>()?,
                footer_length: reader.read_u32::<LittleEndian>()?,
                reserved_b:    reader.read_u32::<LittleEndian>()?,
                reserved_c:    reader.read_u32::<LittleEndian>()?,
            })
        } else {
            None
        };
        Ok(Self { version, tree_length, v2 })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(SIGNATURE)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.tree_length)?;
        if self.version == 2 {
            let ext = self.v2.unwrap_or_default();
            writer.write_u32::<LittleEndian>(ext.reserved_a)?;
            writer.write_u32::<LittleEndian>(ext.footer_length)?;
            writer.write_u32::<LittleEndian>(ext.reserved_b)?;
            writer.write_u32::<LittleEndian>(ext.reserved_c)?;
        }
        Ok(())
    }
}
