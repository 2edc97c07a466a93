//! Property-set decoder.
//!
//! This is this crate's own length-prefixed encoding of a WinRT-style
//! property set. It is not wire-compatible with the platform serializer.
//!
//! ```text
//! set    := count:u32, entry[count]
//! entry  := key:str16, tag:u32, len:u32, payload[len]
//! str16  := units:u32, utf16le[units]
//! ```
//!
//! All integers are little-endian.  A set must be consumed exactly; so must
//! every payload.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor};
use uuid::Uuid;

use super::{DateTime, PropertyMap, PropertyType, PropertyValue, Rect, TimeSpan};
use crate::error::ExportError;

/// Deepest nesting of sets accepted before the blob is declared malformed.
pub const MAX_DEPTH: usize = 64;

type Reader<'a> = Cursor<&'a [u8]>;

impl PropertyMap {
    /// Decode a serialized property set.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ExportError> {
        read_set(data, 0)
    }
}

fn read_set(data: &[u8], depth: usize) -> Result<PropertyMap, ExportError> {
    if depth > MAX_DEPTH {
        return Err(ExportError::format(format!("property sets nested deeper than {MAX_DEPTH}")));
    }

    let mut cur = Cursor::new(data);
    let count = cur.read_u32::<LittleEndian>().map_err(truncated)?;
    let mut map = PropertyMap::new();

    for _ in 0..count {
        let key = read_str16(&mut cur)?;
        let tag = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        let len = cur.read_u32::<LittleEndian>().map_err(truncated)?;
        let payload = take(&mut cur, len as usize)?;

        let ty = PropertyType::from_tag(tag).ok_or_else(|| {
            ExportError::format(format!("property '{key}' has unknown type tag {tag}"))
        })?;
        let value = read_value(ty, payload, depth).map_err(|e| match e {
            ExportError::Format(msg) => ExportError::format(format!("property '{key}': {msg}")),
            other => other,
        })?;

        if map.get(&key).is_some() {
            return Err(ExportError::format(format!("duplicate property key '{key}'")));
        }
        map.insert(key, value);
    }

    finish(&cur)?;
    Ok(map)
}

fn read_value(ty: PropertyType, payload: &[u8], depth: usize) -> Result<PropertyValue, ExportError> {
    let mut cur = Cursor::new(payload);
    let c = &mut cur;
    let value = match ty {
        PropertyType::Inspectable => return read_set(payload, depth + 1).map(PropertyValue::Map),
        PropertyType::String => return decode_utf16(payload).map(PropertyValue::String),
        PropertyType::UInt8   => PropertyValue::UInt8(c.read_u8().map_err(truncated)?),
        PropertyType::Int16   => PropertyValue::Int16(c.read_i16::<LittleEndian>().map_err(truncated)?),
        PropertyType::UInt16  => PropertyValue::UInt16(c.read_u16::<LittleEndian>().map_err(truncated)?),
        PropertyType::Int32   => PropertyValue::Int32(c.read_i32::<LittleEndian>().map_err(truncated)?),
        PropertyType::UInt32  => PropertyValue::UInt32(c.read_u32::<LittleEndian>().map_err(truncated)?),
        PropertyType::Int64   => PropertyValue::Int64(c.read_i64::<LittleEndian>().map_err(truncated)?),
        PropertyType::UInt64  => PropertyValue::UInt64(c.read_u64::<LittleEndian>().map_err(truncated)?),
        PropertyType::Single  => PropertyValue::Single(c.read_f32::<LittleEndian>().map_err(truncated)?),
        PropertyType::Double  => PropertyValue::Double(c.read_f64::<LittleEndian>().map_err(truncated)?),
        PropertyType::Char16  => PropertyValue::Char16(c.read_u16::<LittleEndian>().map_err(truncated)?),
        PropertyType::Boolean => PropertyValue::Boolean(read_bool(c)?),
        PropertyType::DateTime => {
            PropertyValue::DateTime(DateTime(c.read_i64::<LittleEndian>().map_err(truncated)?))
        }
        PropertyType::TimeSpan => {
            PropertyValue::TimeSpan(TimeSpan(c.read_i64::<LittleEndian>().map_err(truncated)?))
        }
        PropertyType::Guid => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(take(c, 16)?);
            PropertyValue::Guid(Uuid::from_bytes_le(bytes))
        }
        PropertyType::Rect => PropertyValue::Rect(Rect {
            x:      c.read_f32::<LittleEndian>().map_err(truncated)?,
            y:      c.read_f32::<LittleEndian>().map_err(truncated)?,
            width:  c.read_f32::<LittleEndian>().map_err(truncated)?,
            height: c.read_f32::<LittleEndian>().map_err(truncated)?,
        }),
        PropertyType::UInt8Array  => PropertyValue::UInt8Array(read_array(c, |c| c.read_u8().map_err(truncated))?),
        PropertyType::Int16Array  => PropertyValue::Int16Array(read_array(c, |c| c.read_i16::<LittleEndian>().map_err(truncated))?),
        PropertyType::UInt16Array => PropertyValue::UInt16Array(read_array(c, |c| c.read_u16::<LittleEndian>().map_err(truncated))?),
        PropertyType::Int32Array  => PropertyValue::Int32Array(read_array(c, |c| c.read_i32::<LittleEndian>().map_err(truncated))?),
        PropertyType::UInt32Array => PropertyValue::UInt32Array(read_array(c, |c| c.read_u32::<LittleEndian>().map_err(truncated))?),
        PropertyType::Int64Array  => PropertyValue::Int64Array(read_array(c, |c| c.read_i64::<LittleEndian>().map_err(truncated))?),
        PropertyType::UInt64Array => PropertyValue::UInt64Array(read_array(c, |c| c.read_u64::<LittleEndian>().map_err(truncated))?),
        PropertyType::SingleArray => PropertyValue::SingleArray(read_array(c, |c| c.read_f32::<LittleEndian>().map_err(truncated))?),
        PropertyType::DoubleArray => PropertyValue::DoubleArray(read_array(c, |c| c.read_f64::<LittleEndian>().map_err(truncated))?),
        PropertyType::Char16Array => PropertyValue::Char16Array(read_array(c, |c| c.read_u16::<LittleEndian>().map_err(truncated))?),
        PropertyType::BooleanArray => PropertyValue::BooleanArray(read_array(c, read_bool)?),
        PropertyType::StringArray  => PropertyValue::StringArray(read_array(c, read_str16)?),

        // Known tags with no JSON encoding: keep the tag, skip the payload.
        PropertyType::Empty
        | PropertyType::Point
        | PropertyType::Size
        | PropertyType::OtherType
        | PropertyType::InspectableArray
        | PropertyType::DateTimeArray
        | PropertyType::TimeSpanArray
        | PropertyType::GuidArray
        | PropertyType::PointArray
        | PropertyType::SizeArray
        | PropertyType::RectArray
        | PropertyType::OtherTypeArray => return Ok(PropertyValue::Unsupported(ty)),
    };

    finish(&cur)?;
    Ok(value)
}

fn read_array<'a, T>(
    cur:  &mut Reader<'a>,
    mut read: impl FnMut(&mut Reader<'a>) -> Result<T, ExportError>,
) -> Result<Vec<T>, ExportError> {
    let count = cur.read_u32::<LittleEndian>().map_err(truncated)?;
    let mut out = Vec::new();
    for _ in 0..count {
        out.push(read(cur)?);
    }
    Ok(out)
}

fn read_bool(cur: &mut Reader<'_>) -> Result<bool, ExportError> {
    match cur.read_u8().map_err(truncated)? {
        0 => Ok(false),
        1 => Ok(true),
        b => Err(ExportError::format(format!("invalid boolean byte {b:#04x}"))),
    }
}

fn read_str16(cur: &mut Reader<'_>) -> Result<String, ExportError> {
    let units = cur.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let len = units.checked_mul(2).ok_or_else(|| ExportError::format(TRUNCATED))?;
    decode_utf16(take(cur, len)?)
}

fn decode_utf16(bytes: &[u8]) -> Result<String, ExportError> {
    if bytes.len() % 2 != 0 {
        return Err(ExportError::format("UTF-16 string has an odd byte length"));
    }
    let units = bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]]));
    char::decode_utf16(units)
        .collect::<Result<String, _>>()
        .map_err(|e| ExportError::format(format!("invalid UTF-16 string: {e}")))
}

fn take<'a>(cur: &mut Reader<'a>, len: usize) -> Result<&'a [u8], ExportError> {
    let data: &'a [u8] = *cur.get_ref();
    let start = cur.position() as usize;
    let end = start
        .checked_add(len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| ExportError::format(TRUNCATED))?;
    cur.set_position(end as u64);
    Ok(&data[start..end])
}

fn finish(cur: &Reader<'_>) -> Result<(), ExportError> {
    let extra = cur.get_ref().len() as u64 - cur.position();
    if extra != 0 {
        return Err(ExportError::format(format!("{extra} trailing bytes")));
    }
    Ok(())
}

const TRUNCATED: &str = "property set is truncated";

fn truncated(_: io::Error) -> ExportError {
    ExportError::format(TRUNCATED)
}
