//! Encrypted snapshot container.
//!
//! ```text
//! offset  size        field
//! 0       4           version       (u32 LE, must be 2)
//! 4       4           key_size      (u32 LE)
//! 8       4           content_size  (u32 LE)
//! 12      4           content_type  (u32 LE, carried, not interpreted)
//! 16      key_size    key blob
//! ..      content_size content blob
//! ```
//!
//! Bytes after the content blob are ignored.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::ExportError;

pub const HEADER_SIZE: usize = 16;
pub const VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version:      u32,
    pub key_size:     u32,
    pub content_size: u32,
    pub content_type: u32,
}

impl SnapshotHeader {
    pub fn new(key_size: u32, content_size: u32, content_type: u32) -> Self {
        Self { version: VERSION, key_size, content_size, content_type }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.key_size)?;
        writer.write_u32::<LittleEndian>(self.content_size)?;
        writer.write_u32::<LittleEndian>(self.content_type)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, ExportError> {
        let header = Self {
            version:      reader.read_u32::<LittleEndian>().map_err(short_header)?,
            key_size:     reader.read_u32::<LittleEndian>().map_err(short_header)?,
            content_size: reader.read_u32::<LittleEndian>().map_err(short_header)?,
            content_type: reader.read_u32::<LittleEndian>().map_err(short_header)?,
        };
        if header.version != VERSION {
            return Err(ExportError::format(format!(
                "unsupported snapshot version {} (expected {VERSION})",
                header.version
            )));
        }
        Ok(header)
    }
}

fn short_header(_: io::Error) -> ExportError {
    ExportError::format(format!("snapshot shorter than the {HEADER_SIZE}-byte header"))
}

/// A parsed snapshot file, borrowing its blobs from the input buffer.
#[derive(Debug)]
pub struct EncryptedSnapshot<'a> {
    pub header:       SnapshotHeader,
    pub key_blob:     &'a [u8],
    pub content_blob: &'a [u8],
}

impl<'a> EncryptedSnapshot<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ExportError> {
        let header = SnapshotHeader::read(data)?;
        let rest = &data[HEADER_SIZE..];

        let (key_blob, rest) = take(rest, header.key_size, "key blob")?;
        let (content_blob, _) = take(rest, header.content_size, "content blob")?;

        Ok(Self { header, key_blob, content_blob })
    }
}

fn take<'a>(data: &'a [u8], len: u32, what: &str) -> Result<(&'a [u8], &'a [u8]), ExportError> {
    let len = len as usize;
    if data.len() < len {
        return Err(ExportError::format(format!(
            "{what} declares {len} bytes but only {} remain",
            data.len()
        )));
    }
    Ok(data.split_at(len))
}
