//! Keyed (Object) typed setters and getters.
//!
//! All operations are free functions over `(buffer, node offset, key)`,
//! with mutators additionally taking the write frontier. Readers take the
//! live region only (`&buf[..position]`); callers of a received buffer pass
//! the whole message slice.
//!
//! ```
//! use lite3::{buffer, map};
//!
//! let mut buf = vec![0u8; 1024];
//! let mut position = 0;
//! buffer::init_object(&mut buf, &mut position).unwrap();
//! map::set_i64(&mut buf, &mut position, 0, "lap", 55).unwrap();
//! assert_eq!(map::get_i64(&buf[..position], 0, "lap").unwrap(), 55);
//! ```

use crate::status::{Result, Status};
use crate::tag::ValueKind;
use crate::tree::{self, ProbeKey};
use crate::value::{BytesHandle, NewValue, StrHandle, TypedValue, ValueRef};

fn set(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: NewValue<'_>,
) -> Result<u32> {
    let out = tree::set_value(buf, position, container, ProbeKey::Key(key.as_bytes()), value)?;
    Ok(out.value_offset)
}

/// Set `key` to null.
pub fn set_null(buf: &mut [u8], position: &mut usize, container: u32, key: &str) -> Result<()> {
    set(buf, position, container, key, NewValue::Null).map(|_| ())
}

/// Set `key` to a boolean.
pub fn set_bool(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: bool,
) -> Result<()> {
    set(buf, position, container, key, NewValue::Bool(value)).map(|_| ())
}

/// Set `key` to a signed 64-bit integer.
pub fn set_i64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: i64,
) -> Result<()> {
    set(buf, position, container, key, NewValue::I64(value)).map(|_| ())
}

/// Set `key` to a 64-bit float.
pub fn set_f64(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: f64,
) -> Result<()> {
    set(buf, position, container, key, NewValue::F64(value)).map(|_| ())
}

/// Set `key` to a binary value.
pub fn set_bytes(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: &[u8],
) -> Result<()> {
    set(buf, position, container, key, NewValue::Bytes(value)).map(|_| ())
}

/// Set `key` to a string value.
pub fn set_string(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
    value: &str,
) -> Result<()> {
    set(buf, position, container, key, NewValue::Str(value)).map(|_| ())
}

/// Set `key` to a fresh empty Object; returns the child node offset.
pub fn set_object(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: &str,
) -> Result<u32> {
    set(buf, position, container, key, NewValue::Node(ValueKind::Object))
}

/// Set `key` to a fresh empty Array; returns the child node offset.
pub fn set_array(buf: &mut [u8], position: &mut usize, container: u32, key: &str) -> Result<u32> {
    set(buf, position, container, key, NewValue::Node(ValueKind::Array))
}

/// Get a read cursor for the value at `key`.
///
/// The cursor is invalidated by any structural mutation; refresh after
/// writes.
pub fn get<'a>(live: &'a [u8], container: u32, key: &str) -> Result<ValueRef<'a>> {
    let off = tree::lookup(live, container, ProbeKey::Key(key.as_bytes()))?;
    ValueRef::new(live, off)
}

/// Get a boolean value.
pub fn get_bool(live: &[u8], container: u32, key: &str) -> Result<bool> {
    match get(live, container, key)?.typed()? {
        TypedValue::Bool(b) => Ok(b),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a signed 64-bit integer value.
pub fn get_i64(live: &[u8], container: u32, key: &str) -> Result<i64> {
    match get(live, container, key)?.typed()? {
        TypedValue::I64(n) => Ok(n),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a 64-bit float value.
pub fn get_f64(live: &[u8], container: u32, key: &str) -> Result<f64> {
    match get(live, container, key)?.typed()? {
        TypedValue::F64(n) => Ok(n),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a generation-checked handle to a string value.
pub fn get_string(live: &[u8], container: u32, key: &str) -> Result<StrHandle> {
    let value = get(live, container, key)?;
    match value.typed()? {
        TypedValue::Str(s) => Ok(StrHandle {
            generation: crate::buffer::generation(live)?,
            len: s.len() as u32,
            offset: value.offset() + 5,
        }),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get a generation-checked handle to a bytes value.
pub fn get_bytes(live: &[u8], container: u32, key: &str) -> Result<BytesHandle> {
    let value = get(live, container, key)?;
    match value.typed()? {
        TypedValue::Bytes(b) => Ok(BytesHandle {
            generation: crate::buffer::generation(live)?,
            len: b.len() as u32,
            offset: value.offset() + 5,
        }),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get the node offset of an Object value.
pub fn get_object(live: &[u8], container: u32, key: &str) -> Result<u32> {
    match get(live, container, key)?.typed()? {
        TypedValue::Object(off) => Ok(off),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// Get the node offset of an Array value.
pub fn get_array(live: &[u8], container: u32, key: &str) -> Result<u32> {
    match get(live, container, key)?.typed()? {
        TypedValue::Array(off) => Ok(off),
        _ => Err(Status::ValueKindDoesNotMatch),
    }
}

/// True when `key` is present.
pub fn exists(live: &[u8], container: u32, key: &str) -> Result<bool> {
    match tree::lookup(live, container, ProbeKey::Key(key.as_bytes())) {
        Ok(_) => Ok(true),
        Err(Status::KeyNotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

/// The kind of the value at `key`.
pub fn kind_of(live: &[u8], container: u32, key: &str) -> Result<ValueKind> {
    get(live, container, key)?.kind()
}

/// The payload size of the value at `key` (string lengths exclude the NUL).
pub fn value_size(live: &[u8], container: u32, key: &str) -> Result<usize> {
    get(live, container, key)?.payload_size()
}

macro_rules! is_kind {
    ($name:ident, $kind:ident) => {
        /// Kind predicate for the value at `key`.
        pub fn $name(live: &[u8], container: u32, key: &str) -> Result<bool> {
            Ok(kind_of(live, container, key)? == ValueKind::$kind)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::init_object;
    use crate::tree::count;

    fn setup() -> (Vec<u8>, usize) {
        let mut buf = vec![0xEEu8; 4096];
        let mut position = 0;
        init_object(&mut buf, &mut position).unwrap();
        (buf, position)
    }

    #[test]
    fn test_typed_roundtrip() {
        let (mut buf, mut p) = setup();
        set_null(&mut buf, &mut p, 0, "n").unwrap();
        set_bool(&mut buf, &mut p, 0, "b", true).unwrap();
        set_i64(&mut buf, &mut p, 0, "i", -42).unwrap();
        set_f64(&mut buf, &mut p, 0, "f", 88.427).unwrap();
        set_bytes(&mut buf, &mut p, 0, "raw", &[1, 2, 3]).unwrap();
        set_string(&mut buf, &mut p, 0, "s", "hello").unwrap();

        let live = &buf[..p];
        assert!(is_null(live, 0, "n").unwrap());
        assert!(get_bool(live, 0, "b").unwrap());
        assert_eq!(get_i64(live, 0, "i").unwrap(), -42);
        assert!((get_f64(live, 0, "f").unwrap() - 88.427).abs() < 1e-12);
        assert_eq!(get_bytes(live, 0, "raw").unwrap().resolve(live).unwrap(), &[1, 2, 3]);
        assert_eq!(get_string(live, 0, "s").unwrap().resolve(live).unwrap(), "hello");
        assert_eq!(count(live, 0).unwrap(), 6);
    }

    #[test]
    fn test_kind_mismatch() {
        let (mut buf, mut p) = setup();
        set_i64(&mut buf, &mut p, 0, "i", 1).unwrap();
        let live = &buf[..p];
        assert_eq!(get_bool(live, 0, "i").unwrap_err(), Status::ValueKindDoesNotMatch);
        assert_eq!(get_string(live, 0, "i").unwrap_err(), Status::ValueKindDoesNotMatch);
        assert_eq!(kind_of(live, 0, "i").unwrap(), ValueKind::I64);
        assert_eq!(value_size(live, 0, "i").unwrap(), 8);
    }

    #[test]
    fn test_exists() {
        let (mut buf, mut p) = setup();
        set_null(&mut buf, &mut p, 0, "here").unwrap();
        let live = &buf[..p];
        assert!(exists(live, 0, "here").unwrap());
        assert!(!exists(live, 0, "gone").unwrap());
    }

    #[test]
    fn test_nested_object() {
        let (mut buf, mut p) = setup();
        let child = set_object(&mut buf, &mut p, 0, "inner").unwrap();
        set_i64(&mut buf, &mut p, child, "x", 7).unwrap();
        let live = &buf[..p];
        assert_eq!(get_object(live, 0, "inner").unwrap(), child);
        assert_eq!(get_i64(live, child, "x").unwrap(), 7);
        assert_eq!(count(live, 0).unwrap(), 1);
        assert_eq!(count(live, child).unwrap(), 1);
        // The child node landed aligned.
        assert_eq!(child % 4, 0);
    }

    #[test]
    fn test_string_handle_goes_stale() {
        let (mut buf, mut p) = setup();
        set_string(&mut buf, &mut p, 0, "k", "value").unwrap();
        let h = get_string(&buf[..p], 0, "k").unwrap();
        assert_eq!(h.resolve(&buf[..p]).unwrap(), "value");
        set_i64(&mut buf, &mut p, 0, "other", 1).unwrap();
        assert_eq!(h.resolve(&buf[..p]).unwrap_err(), Status::MutatedBuffer);
    }
}
