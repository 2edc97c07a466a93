//! Typed property sets embedded in snapshot images.
//!
//! A property set is a string-keyed map of [`PropertyValue`]s, possibly
//! nested.  Type tags follow the WinRT `PropertyType` numbering.  The
//! binary encoding in [`reader`] and [`writer`] is specific to this crate.

mod reader;
mod writer;

use std::collections::BTreeMap;
use uuid::Uuid;

/// Ticks (100 ns) between 1601-01-01 and 1970-01-01.
pub const UNIX_EPOCH_TICKS: i64 = 116_444_736_000_000_000;
/// Ticks (100 ns) per millisecond.
pub const TICKS_PER_MILLI: i64 = 10_000;

/// Offset added to a scalar tag to form its array tag.
const ARRAY_FLAG: u32 = 1024;

/// On-disk type tag of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PropertyType {
    Empty       = 0,
    UInt8       = 1,
    Int16       = 2,
    UInt16      = 3,
    Int32       = 4,
    UInt32      = 5,
    Int64       = 6,
    UInt64      = 7,
    Single      = 8,
    Double      = 9,
    Char16      = 10,
    Boolean     = 11,
    String      = 12,
    Inspectable = 13,
    DateTime    = 14,
    TimeSpan    = 15,
    Guid        = 16,
    Point       = 17,
    Size        = 18,
    Rect        = 19,
    OtherType   = 20,
    UInt8Array       = ARRAY_FLAG + 1,
    Int16Array       = ARRAY_FLAG + 2,
    UInt16Array      = ARRAY_FLAG + 3,
    Int32Array       = ARRAY_FLAG + 4,
    UInt32Array      = ARRAY_FLAG + 5,
    Int64Array       = ARRAY_FLAG + 6,
    UInt64Array      = ARRAY_FLAG + 7,
    SingleArray      = ARRAY_FLAG + 8,
    DoubleArray      = ARRAY_FLAG + 9,
    Char16Array      = ARRAY_FLAG + 10,
    BooleanArray     = ARRAY_FLAG + 11,
    StringArray      = ARRAY_FLAG + 12,
    InspectableArray = ARRAY_FLAG + 13,
    DateTimeArray    = ARRAY_FLAG + 14,
    TimeSpanArray    = ARRAY_FLAG + 15,
    GuidArray        = ARRAY_FLAG + 16,
    PointArray       = ARRAY_FLAG + 17,
    SizeArray        = ARRAY_FLAG + 18,
    RectArray        = ARRAY_FLAG + 19,
    OtherTypeArray   = ARRAY_FLAG + 20,
}

impl PropertyType {
    const ALL: [PropertyType; 41] = [
        PropertyType::Empty, PropertyType::UInt8, PropertyType::Int16, PropertyType::UInt16,
        PropertyType::Int32, PropertyType::UInt32, PropertyType::Int64, PropertyType::UInt64,
        PropertyType::Single, PropertyType::Double, PropertyType::Char16, PropertyType::Boolean,
        PropertyType::String, PropertyType::Inspectable, PropertyType::DateTime,
        PropertyType::TimeSpan, PropertyType::Guid, PropertyType::Point, PropertyType::Size,
        PropertyType::Rect, PropertyType::OtherType,
        PropertyType::UInt8Array, PropertyType::Int16Array, PropertyType::UInt16Array,
        PropertyType::Int32Array, PropertyType::UInt32Array, PropertyType::Int64Array,
        PropertyType::UInt64Array, PropertyType::SingleArray, PropertyType::DoubleArray,
        PropertyType::Char16Array, PropertyType::BooleanArray, PropertyType::StringArray,
        PropertyType::InspectableArray, PropertyType::DateTimeArray, PropertyType::TimeSpanArray,
        PropertyType::GuidArray, PropertyType::PointArray, PropertyType::SizeArray,
        PropertyType::RectArray, PropertyType::OtherTypeArray,
    ];

    /// Resolve an on-disk tag.  Returns `None` for tags outside the known set.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| *t as u32 == tag)
    }

    #[inline]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Axis-aligned rectangle, stored as `X, Y, Width, Height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x:      f32,
    pub y:      f32,
    pub width:  f32,
    pub height: f32,
}

/// Point in time as 100 ns ticks since 1601-01-01 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime(pub i64);

impl DateTime {
    /// Saturates at the ends of the tick range.
    pub fn from_unix_millis(millis: i64) -> Self {
        DateTime(millis.saturating_mul(TICKS_PER_MILLI).saturating_add(UNIX_EPOCH_TICKS))
    }

    /// Milliseconds since the Unix epoch, truncated toward zero.  Defined
    /// for every tick count.
    pub fn unix_millis(self) -> i64 {
        let millis = (i128::from(self.0) - i128::from(UNIX_EPOCH_TICKS)) / i128::from(TICKS_PER_MILLI);
        // The difference of two i64s divided by 10^4 always fits in i64.
        millis as i64
    }
}

/// Duration as 100 ns ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    /// Saturates at the ends of the tick range.
    pub fn from_millis(millis: i64) -> Self {
        TimeSpan(millis.saturating_mul(TICKS_PER_MILLI))
    }

    /// Whole milliseconds, truncated toward zero.
    pub fn millis(self) -> i64 {
        self.0 / TICKS_PER_MILLI
    }
}

/// A decoded property value.
///
/// Every tag with a JSON encoding has its own variant.  Tags that decode
/// but have no encoding are kept as [`PropertyValue::Unsupported`] so the
/// transcoder can reject them explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    UInt8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    Char16(u16),
    Boolean(bool),
    String(String),
    DateTime(DateTime),
    TimeSpan(TimeSpan),
    Guid(Uuid),
    Rect(Rect),
    UInt8Array(Vec<u8>),
    Int16Array(Vec<i16>),
    UInt16Array(Vec<u16>),
    Int32Array(Vec<i32>),
    UInt32Array(Vec<u32>),
    Int64Array(Vec<i64>),
    UInt64Array(Vec<u64>),
    SingleArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    Char16Array(Vec<u16>),
    BooleanArray(Vec<bool>),
    StringArray(Vec<String>),
    Map(PropertyMap),
    Unsupported(PropertyType),
}

impl PropertyValue {
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::UInt8(_)        => PropertyType::UInt8,
            PropertyValue::Int16(_)        => PropertyType::Int16,
            PropertyValue::UInt16(_)       => PropertyType::UInt16,
            PropertyValue::Int32(_)        => PropertyType::Int32,
            PropertyValue::UInt32(_)       => PropertyType::UInt32,
            PropertyValue::Int64(_)        => PropertyType::Int64,
            PropertyValue::UInt64(_)       => PropertyType::UInt64,
            PropertyValue::Single(_)       => PropertyType::Single,
            PropertyValue::Double(_)       => PropertyType::Double,
            PropertyValue::Char16(_)       => PropertyType::Char16,
            PropertyValue::Boolean(_)      => PropertyType::Boolean,
            PropertyValue::String(_)       => PropertyType::String,
            PropertyValue::DateTime(_)     => PropertyType::DateTime,
            PropertyValue::TimeSpan(_)     => PropertyType::TimeSpan,
            PropertyValue::Guid(_)         => PropertyType::Guid,
            PropertyValue::Rect(_)         => PropertyType::Rect,
            PropertyValue::UInt8Array(_)   => PropertyType::UInt8Array,
            PropertyValue::Int16Array(_)   => PropertyType::Int16Array,
            PropertyValue::UInt16Array(_)  => PropertyType::UInt16Array,
            PropertyValue::Int32Array(_)   => PropertyType::Int32Array,
            PropertyValue::UInt32Array(_)  => PropertyType::UInt32Array,
            PropertyValue::Int64Array(_)   => PropertyType::Int64Array,
            PropertyValue::UInt64Array(_)  => PropertyType::UInt64Array,
            PropertyValue::SingleArray(_)  => PropertyType::SingleArray,
            PropertyValue::DoubleArray(_)  => PropertyType::DoubleArray,
            PropertyValue::Char16Array(_)  => PropertyType::Char16Array,
            PropertyValue::BooleanArray(_) => PropertyType::BooleanArray,
            PropertyValue::StringArray(_)  => PropertyType::StringArray,
            PropertyValue::Map(_)          => PropertyType::Inspectable,
            PropertyValue::Unsupported(t)  => *t,
        }
    }
}

/// String-keyed property set.  Keys are unique; iteration order is by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: BTreeMap<String, PropertyValue>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, PropertyValue)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
