//! Property set → JSON transcoding.
//!
//! Scalars become JSON *strings* holding their decimal text, except String
//! and Boolean which keep their native JSON type.  Arrays follow the same
//! rule per element.  `Rect` is emitted as `[X, Y, Height, Width]`.

use serde_json::{Map, Value};
use std::fmt::Display;

use crate::error::ExportError;
use crate::property::{PropertyMap, PropertyValue, Rect};

/// Length of a braced or parenthesised GUID string.
const DELIMITED_GUID_LEN: usize = 38;

/// Transcode a property set into a JSON object, recursing into nested sets.
///
/// Any value whose type has no JSON encoding fails the whole transcode.
pub fn to_json(map: &PropertyMap) -> Result<Value, ExportError> {
    let mut object = Map::new();
    for (key, value) in map.iter() {
        object.insert(key.clone(), value_to_json(value)?);
    }
    Ok(Value::Object(object))
}

/// Serialize a property set as compact JSON text.
pub fn to_json_string(map: &PropertyMap) -> Result<String, ExportError> {
    Ok(to_json(map)?.to_string())
}

fn value_to_json(value: &PropertyValue) -> Result<Value, ExportError> {
    Ok(match value {
        PropertyValue::String(s)  => Value::String(s.clone()),
        PropertyValue::Boolean(b) => Value::Bool(*b),

        PropertyValue::UInt8(v)  => text(v),
        PropertyValue::Int16(v)  => text(v),
        PropertyValue::UInt16(v) => text(v),
        PropertyValue::Int32(v)  => text(v),
        PropertyValue::UInt32(v) => text(v),
        PropertyValue::Int64(v)  => text(v),
        PropertyValue::UInt64(v) => text(v),
        PropertyValue::Single(v) => text(v),
        PropertyValue::Double(v) => text(v),
        PropertyValue::Char16(v) => text(v),

        PropertyValue::Guid(g)     => Value::String(strip_guid_delimiters(&g.braced().to_string())),
        PropertyValue::Rect(r)     => rect_to_json(r),
        PropertyValue::DateTime(d) => text(d.unix_millis()),
        PropertyValue::TimeSpan(t) => text(t.millis()),

        PropertyValue::UInt8Array(a)  => text_array(a),
        PropertyValue::Int16Array(a)  => text_array(a),
        PropertyValue::UInt16Array(a) => text_array(a),
        PropertyValue::Int32Array(a)  => text_array(a),
        PropertyValue::UInt32Array(a) => text_array(a),
        PropertyValue::Int64Array(a)  => text_array(a),
        PropertyValue::UInt64Array(a) => text_array(a),
        PropertyValue::SingleArray(a) => text_array(a),
        PropertyValue::DoubleArray(a) => text_array(a),
        PropertyValue::Char16Array(a) => text_array(a),
        PropertyValue::StringArray(a) => Value::Array(a.iter().cloned().map(Value::String).collect()),
        PropertyValue::BooleanArray(a) => Value::Array(a.iter().copied().map(Value::Bool).collect()),

        PropertyValue::Map(m) => to_json(m)?,

        PropertyValue::Unsupported(ty) => return Err(ExportError::UnsupportedType(*ty)),
    })
}

fn text(v: impl Display) -> Value {
    Value::String(v.to_string())
}

fn text_array<T: Display>(items: &[T]) -> Value {
    Value::Array(items.iter().map(text).collect())
}

// Order is X, Y, Height, Width.
fn rect_to_json(r: &Rect) -> Value {
    Value::Array(vec![text(r.x), text(r.y), text(r.height), text(r.width)])
}

/// Drop the enclosing `{}` or `()` from a 38-character GUID string; any
/// other form is returned unchanged.
pub fn strip_guid_delimiters(s: &str) -> String {
    let delimited = s.len() == DELIMITED_GUID_LEN
        && ((s.starts_with('{') && s.ends_with('}')) || (s.starts_with('(') && s.ends_with(')')));
    if delimited {
        s[1..DELIMITED_GUID_LEN - 1].to_owned()
    } else {
        s.to_owned()
    }
}
