//! Indexed (Array) typed setters, getters and append.
//!
//! Array elements are keyed by their index: the node engine stores the
//! index where objects store a key hash, and probes exactly once. Arrays
//! are dense; `append_*` writes at the current length and `set_*` requires
//! the index to be strictly below it.

use crate::status::{Result, Status};
use crate::tag::ValueKind;
use crate::tree::{self, ProbeKey};
use crate::value::{BytesHandle, NewValue, StrHandle, TypedValue, ValueRef};

fn put(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: ProbeKey<'_>,
    value: NewValue<'_>,
) -> Result<u32> {
    let out = tree::set_value(buf, position, container, key, value)?;
    Ok(out.value_offset)
}

/// Append a null element.
pub fn append_null(buf: &mut [u8], position: &mut usize, container: u32) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::Null).map(|_| ())
}

/// Append a boolean element.
pub fn append_bool(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    value: bool,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::Bool(value)).map(|_| ())
}

/// Append a signed 64-bit integer element.
pub fn append_i64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    value: i64,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::I64(value)).map(|_| ())
}

/// Append a 64-bit float element.
pub fn append_f64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    value: f64,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::F64(value)).map(|_| ())
}

/// Append a binary element.
pub fn append_bytes(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    value: &[u8],
) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::Bytes(value)).map(|_| ())
}

/// Append a string element.
pub fn append_string(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    value: &str,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Append, NewValue::Str(value)).map(|_| ())
}

/// Append a fresh empty Object; returns the child node offset.
pub fn append_object(buf: &mut [u8], position: &mut usize, container: u32) -> Result<u32> {
    put(
        buf,
        position,
        container,
        ProbeKey::Append,
        NewValue::Node(ValueKind::Object),
    )
}

/// Append a fresh empty Array; returns the child node offset.
pub fn append_array(buf: &mut [u8], position: &mut usize, container: u32) -> Result<u32> {
    put(
        buf,
        position,
        container,
        ProbeKey::Append,
        NewValue::Node(ValueKind::Array),
    )
}

/// Overwrite element `index` with null.
pub fn set_null(buf: &mut [u8], position: &mut usize, container: u32, index: u32) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::Null).map(|_| ())
}

/// Overwrite element `index` with a boolean.
pub fn set_bool(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
    value: bool,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::Bool(value)).map(|_| ())
}

/// Overwrite element `index` with a signed 64-bit integer.
pub fn set_i64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
    value: i64,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::I64(value)).map(|_| ())
}

/// Overwrite element `index` with a 64-bit float.
pub fn set_f64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
    value: f64,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::F64(value)).map(|_| ())
}

/// Overwrite element `index` with a binary value.
pub fn set_bytes(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
    value: &[u8],
) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::Bytes(value)).map(|_| ())
}

/// Overwrite element `index` with a string value.
pub fn set_string(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
    value: &str,
) -> Result<()> {
    put(buf, position, container, ProbeKey::Index(index), NewValue::Str(value)).map(|_| ())
}

/// Overwrite element `index` with a fresh empty Object; returns the child
/// node offset.
pub fn set_object(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
) -> Result<u32> {
    put(
        buf,
        position,
        container,
        ProbeKey::Index(index),
        NewValue::Node(ValueKind::Object),
    )
}

/// Overwrite element `index` with a fresh empty Array; returns the child
/// node offset.
pub fn set_array(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    index: u32,
) -> Result<u32> {
    put(
        buf,
        position,
        container,
        ProbeKey::Index(index),
        NewValue::Node(ValueKind::Array),
    )
}

/// Get a read cursor for element `index`.
pub fn get(live: &[u8], container: u32, index: u32) -> Result<ValueRef<'_>> {
    let off = tree::lookup(live, container, ProbeKey::Index(index))?;
    ValueRef::new(live, off)
}

/// Get a boolean element.
pub fn get_bool(live: &[u8], container: u32, index: u32) -> Result<bool> {
    match get(live, container, index)?.typed()? {
        TypedValue::Bool(b) => Ok(b),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a signed 64-bit integer element.
pub fn get_i64(live: &[u8], container: u32, index: u32) -> Result<i64> {
    match get(live, container, index)?.typed()? {
        TypedValue::I64(n) => Ok(n),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a 64-bit float element.
pub fn get_f64(live: &[u8], container: u32, index: u32) -> Result<f64> {
    match get(live, container, index)?.typed()? {
        TypedValue::F64(n) => Ok(n),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a generation-checked handle to a string element.
pub fn get_string(live: &[u8], container: u32, index: u32) -> Result<StrHandle> {
    let value = get(live, container, index)?;
    match value.typed()? {
        TypedValue::Str(s) => Ok(StrHandle {
            generation: crate::buffer::generation(live)?,
            len: s.len() as u32,
            offset: value.offset() + 5,
        }),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a generation-checked handle to a bytes element.
pub fn get_bytes(live: &[u8], container: u32, index: u32) -> Result<BytesHandle> {
    let value = get(live, container, index)?;
    match value.typed()? {
        TypedValue::Bytes(b) => Ok(BytesHandle {
            generation: crate::buffer::generation(live)?,
            len: b.len() as u32,
            offset: value.offset() + 5,
        }),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get the node offset of an Object element.
pub fn get_object(live: &[u8], container: u32, index: u32) -> Result<u32> {
    match get(live, container, index)?.typed()? {
        TypedValue::Object(off) => Ok(off),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get the node offset of an Array element.
pub fn get_array(live: &[u8], container: u32, index: u32) -> Result<u32> {
    match get(live, container, index)?.typed()? {
        TypedValue::Array(off) => Ok(off),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// True when `index` is below the array length.
pub fn exists(live: &[u8], container: u32, index: u32) -> Result<bool> {
    match tree::lookup(live, container, ProbeKey::Index(index)) {
        Ok(_) => Ok(true),
        Err(Status::ArrayIndexOutOfBounds) => Ok(false),
        Err(e) => Err(e),
    }
}

/// The kind of element `index`.
pub fn kind_of(live: &[u8], container: u32, index: u32) -> Result<ValueKind> {
    get(live, container, index)?.kind()
}

/// The payload size of element `index`.
pub fn value_size(live: &[u8], container: u32, index: u32) -> Result<usize> {
    get(live, container, index)?.payload_size()
}

macro_rules! is_kind {
    ($name:ident, $kind:ident) => {
        /// Kind predicate for element `index`.
        pub fn $name(live: &[u8], container: u32, index: u32) -> Result<bool> {
            Ok(kind_of(live, container, index)? == ValueKind::$kind)
        }
    };
}

is_kind!(is_null, Null);
is_kind!(is_bool, Bool);
is_kind!(is_i64, I64);
is_kind!(is_f64, F64);
is_kind!(is_bytes, Bytes);
is_kind!(is_string, Str);
is_kind!(is_object, Object);
is_kind!(is_array, Array);
