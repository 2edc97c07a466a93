//! Property-set encoder, the inverse of [`super::reader`].

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use super::{PropertyMap, PropertyValue};

impl PropertyMap {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(len_u32(self.len())?)?;
        for (key, value) in self.iter() {
            write_str16(&mut writer, key)?;
            writer.write_u32::<LittleEndian>(value.property_type().tag())?;

            let mut payload = Vec::new();
            write_payload(&mut payload, value)?;
            writer.write_u32::<LittleEndian>(len_u32(payload.len())?)?;
            writer.write_all(&payload)?;
        }
        Ok(())
    }

    /// Fails only when a set, string or array exceeds `u32::MAX` elements.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }
}

fn write_payload(w: &mut Vec<u8>, value: &PropertyValue) -> io::Result<()> {
    match value {
        PropertyValue::UInt8(v)    => w.write_u8(*v),
        PropertyValue::Int16(v)    => w.write_i16::<LittleEndian>(*v),
        PropertyValue::UInt16(v)   => w.write_u16::<LittleEndian>(*v),
        PropertyValue::Int32(v)    => w.write_i32::<LittleEndian>(*v),
        PropertyValue::UInt32(v)   => w.write_u32::<LittleEndian>(*v),
        PropertyValue::Int64(v)    => w.write_i64::<LittleEndian>(*v),
        PropertyValue::UInt64(v)   => w.write_u64::<LittleEndian>(*v),
        PropertyValue::Single(v)   => w.write_f32::<LittleEndian>(*v),
        PropertyValue::Double(v)   => w.write_f64::<LittleEndian>(*v),
        PropertyValue::Char16(v)   => w.write_u16::<LittleEndian>(*v),
        PropertyValue::Boolean(v)  => w.write_u8(u8::from(*v)),
        PropertyValue::String(s)   => {
            for unit in s.encode_utf16() {
                w.write_u16::<LittleEndian>(unit)?;
            }
            Ok(())
        }
        PropertyValue::DateTime(d) => w.write_i64::<LittleEndian>(d.0),
        PropertyValue::TimeSpan(t) => w.write_i64::<LittleEndian>(t.0),
        PropertyValue::Guid(g)     => w.write_all(&g.to_bytes_le()),
        PropertyValue::Rect(r)     => {
            w.write_f32::<LittleEndian>(r.x)?;
            w.write_f32::<LittleEndian>(r.y)?;
            w.write_f32::<LittleEndian>(r.width)?;
            w.write_f32::<LittleEndian>(r.height)
        }
        PropertyValue::UInt8Array(a)   => write_array(w, a, |w, v| w.write_u8(*v)),
        PropertyValue::Int16Array(a)   => write_array(w, a, |w, v| w.write_i16::<LittleEndian>(*v)),
        PropertyValue::UInt16Array(a)  => write_array(w, a, |w, v| w.write_u16::<LittleEndian>(*v)),
        PropertyValue::Int32Array(a)   => write_array(w, a, |w, v| w.write_i32::<LittleEndian>(*v)),
        PropertyValue::UInt32Array(a)  => write_array(w, a, |w, v| w.write_u32::<LittleEndian>(*v)),
        PropertyValue::Int64Array(a)   => write_array(w, a, |w, v| w.write_i64::<LittleEndian>(*v)),
        PropertyValue::UInt64Array(a)  => write_array(w, a, |w, v| w.write_u64::<LittleEndian>(*v)),
        PropertyValue::SingleArray(a)  => write_array(w, a, |w, v| w.write_f32::<LittleEndian>(*v)),
        PropertyValue::DoubleArray(a)  => write_array(w, a, |w, v| w.write_f64::<LittleEndian>(*v)),
        PropertyValue::Char16Array(a)  => write_array(w, a, |w, v| w.write_u16::<LittleEndian>(*v)),
        PropertyValue::BooleanArray(a) => write_array(w, a, |w, v| w.write_u8(u8::from(*v))),
        PropertyValue::StringArray(a)  => write_array(w, a, |w, v| write_str16(w, v)),
        PropertyValue::Map(m)          => m.write(w),
        PropertyValue::Unsupported(_)  => Ok(()),
    }
}

fn write_array<T>(
    w: &mut Vec<u8>,
    items: &[T],
    mut write: impl FnMut(&mut Vec<u8>, &T) -> io::Result<()>,
) -> io::Result<()> {
    w.write_u32::<LittleEndian>(len_u32(items.len())?)?;
    for item in items {
        write(w, item)?;
    }
    Ok(())
}

fn write_str16<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let units: Vec<u16> = s.encode_utf16().collect();
    w.write_u32::<LittleEndian>(len_u32(units.len())?)?;
    for unit in units {
        w.write_u16::<LittleEndian>(unit)?;
    }
    Ok(())
}

fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds u32"))
}
