//! Minimal JPEG/EXIF reader: locates the application metadata blob stored
//! in the Exif IFD under tag 37500 (`/app1/ifd/exif/{ushort=37500}`).
//!
//! Only the path to that one tag is walked: JPEG marker segments up to the
//! first `Exif\0\0` APP1, the TIFF header, IFD0, then the Exif sub-IFD.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::ExportError;

/// Exif tag holding the serialized property set.
pub const METADATA_TAG: u16 = 37500;

const EXIF_IFD_POINTER: u16 = 0x8769;
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_APP1: u8 = 0xE1;

const TIFF_BYTE: u16 = 1;
const TIFF_LONG: u16 = 4;
const TIFF_UNDEFINED: u16 = 7;
const IFD_ENTRY_SIZE: usize = 12;

/// Return the raw bytes of the metadata tag, if the image carries one.
///
/// `Ok(None)` means the image has no metadata: no Exif segment, no Exif
/// IFD, no tag, or a tag that is not byte-typed.  Structural damage is a
/// `Format` error.
pub fn find_metadata_blob(image: &[u8]) -> Result<Option<&[u8]>, ExportError> {
    match find_exif_segment(image)? {
        Some(tiff) => Tiff::parse(tiff)?.exif_tag(METADATA_TAG),
        None       => Ok(None),
    }
}

/// Payload of the first `Exif\0\0` APP1 segment, with the header stripped.
fn find_exif_segment(image: &[u8]) -> Result<Option<&[u8]>, ExportError> {
    if image.len() < 2 || image[0] != 0xFF || image[1] != MARKER_SOI {
        return Err(ExportError::format("decrypted content is not a JPEG image"));
    }

    let mut pos = 2;
    loop {
        // Markers may be padded with any number of 0xFF fill bytes.
        if pos >= image.len() || image[pos] != 0xFF {
            return Err(ExportError::format(format!("expected JPEG marker at offset {pos}")));
        }
        while pos < image.len() && image[pos] == 0xFF {
            pos += 1;
        }
        let marker = *image
            .get(pos)
            .ok_or_else(|| ExportError::format("JPEG ends inside a marker"))?;
        pos += 1;

        match marker {
            MARKER_SOS | MARKER_EOI => return Ok(None),
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD7 => continue,
            _ => {}
        }

        let len = image
            .get(pos..pos + 2)
            .map(BigEndian::read_u16)
            .ok_or_else(|| ExportError::format("JPEG segment length is truncated"))? as usize;
        if len < 2 {
            return Err(ExportError::format(format!("JPEG segment length {len} is invalid")));
        }
        let body = image
            .get(pos + 2..pos + len)
            .ok_or_else(|| ExportError::format("JPEG segment is truncated"))?;

        if marker == MARKER_APP1 && body.starts_with(EXIF_HEADER) {
            return Ok(Some(&body[EXIF_HEADER.len()..]));
        }
        pos += len;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

struct Tiff<'a> {
    data:   &'a [u8],
    endian: Endian,
    ifd0:   usize,
}

struct IfdEntry {
    ty:    u16,
    count: u32,
    /// Offset of the 4-byte value field: the value itself when it fits,
    /// otherwise a pointer to it.
    value_at: usize,
}

impl<'a> Tiff<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, ExportError> {
        let endian = match data.get(..2) {
            Some(b"II") => Endian::Little,
            Some(b"MM") => Endian::Big,
            _ => return Err(ExportError::format("Exif block has no TIFF byte-order mark")),
        };
        let mut tiff = Self { data, endian, ifd0: 0 };
        if tiff.u16_at(2)? != 42 {
            return Err(ExportError::format("Exif block has a bad TIFF magic number"));
        }
        tiff.ifd0 = tiff.u32_at(4)? as usize;
        Ok(tiff)
    }

    /// Look up `tag` in the Exif sub-IFD.
    fn exif_tag(&self, tag: u16) -> Result<Option<&'a [u8]>, ExportError> {
        let exif_ifd = match self.find_entry(self.ifd0, EXIF_IFD_POINTER)? {
            Some(entry) if entry.count == 1 && entry.ty == TIFF_LONG => self.u32_at(entry.value_at)?,
            _ => return Ok(None),
        };
        let entry = match self.find_entry(exif_ifd as usize, tag)? {
            Some(entry) if entry.ty == TIFF_BYTE || entry.ty == TIFF_UNDEFINED => entry,
            _ => return Ok(None),
        };

        let len = entry.count as usize;
        let offset = if len <= 4 {
            entry.value_at
        } else {
            self.u32_at(entry.value_at)? as usize
        };
        self.slice(offset, len).map(Some)
    }

    fn find_entry(&self, ifd: usize, tag: u16) -> Result<Option<IfdEntry>, ExportError> {
        let count = self.u16_at(ifd)? as usize;
        for i in 0..count {
            let at = ifd + 2 + i * IFD_ENTRY_SIZE;
            if self.u16_at(at)? == tag {
                return Ok(Some(IfdEntry {
                    ty:       self.u16_at(at + 2)?,
                    count:    self.u32_at(at + 4)?,
                    value_at: at + 8,
                }));
            }
        }
        Ok(None)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ExportError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                ExportError::format(format!("Exif reference {offset}+{len} is out of bounds"))
            })
    }

    fn u16_at(&self, offset: usize) -> Result<u16, ExportError> {
        let b = self.slice(offset, 2)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big    => BigEndian::read_u16(b),
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32, ExportError> {
        let b = self.slice(offset, 4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big    => BigEndian::read_u32(b),
        })
    }
}
