//! Lite³ → JSON encoding.
//!
//! A recursive walk over the container tree producing RFC 8259 JSON, with
//! one deliberate extension: Bytes values are emitted as Base64 strings.
//!
//! # Lite³ to JSON mapping
//!
//! | Lite³    | JSON                  |
//! |----------|-----------------------|
//! | `Null`   | null                  |
//! | `Bool`   | true/false            |
//! | `I64`    | integer               |
//! | `F64`    | number (finite only)  |
//! | `Str`    | string                |
//! | `Bytes`  | Base64 string         |
//! | `Object` | object                |
//! | `Array`  | array                 |

use base64::Engine;
use serde_json::Value as JsonValue;

use crate::iter::IterCursor;
use crate::msg::Message;
use crate::status::{Result, Status};
use crate::value::TypedValue;

use super::decode::JSON_NESTING_MAX;

/// Encode the live region of a message buffer as a JSON string.
///
/// # Errors
///
/// `NonFiniteFloat` for NaN or Infinity values,
/// `JsonNestingDepthExceededMax` past the shared depth cap, plus any
/// structural failure from walking a corrupted buffer.
pub fn to_json(live: &[u8]) -> Result<String> {
    let value = to_json_value(live)?;
    serde_json::to_string(&value).map_err(|_| Status::ValueKindInvalid)
}

/// Encode the live region as a `serde_json::Value` tree.
pub fn to_json_value(live: &[u8]) -> Result<JsonValue> {
    let kind = crate::buffer::root_kind(live)?;
    container_to_json(live, 0, kind == crate::tag::ValueKind::Object, 0)
}

/// Encode a single container subtree rooted at `container`.
pub fn subtree_to_json(live: &[u8], container: u32) -> Result<String> {
    let node = crate::tree::container_at(live, container)?;
    let is_object = node.kind()? == crate::tag::ValueKind::Object;
    let value = container_to_json(live, container, is_object, 0)?;
    serde_json::to_string(&value).map_err(|_| Status::ValueKindInvalid)
}

impl Message {
    /// Encode this message as a JSON string.
    pub fn to_json(&self) -> Result<String> {
        to_json(self.as_bytes())
    }
}

fn container_to_json(
    live: &[u8],
    container: u32,
    is_object: bool,
    depth: usize,
) -> Result<JsonValue> {
    if depth > JSON_NESTING_MAX {
        return Err(Status::JsonNestingDepthExceededMax);
    }
    let mut cursor = IterCursor::new(live, container)?;
    if is_object {
        let mut obj = serde_json::Map::new();
        while let Some(item) = cursor.next(live)? {
            let key = item.key.ok_or(Status::KeyEntryOutOfBounds)?;
            obj.insert(key.to_owned(), value_to_json(live, item.value.typed()?, depth)?);
        }
        Ok(JsonValue::Object(obj))
    } else {
        let mut items = Vec::new();
        while let Some(item) = cursor.next(live)? {
            items.push(value_to_json(live, item.value.typed()?, depth)?);
        }
        Ok(JsonValue::Array(items))
    }
}

fn value_to_json(live: &[u8], value: TypedValue<'_>, depth: usize) -> Result<JsonValue> {
    match value {
        TypedValue::Null => Ok(JsonValue::Null),
        TypedValue::Bool(b) => Ok(JsonValue::Bool(b)),
        TypedValue::I64(n) => Ok(JsonValue::Number(n.into())),
        TypedValue::F64(f) => {
            let num = serde_json::Number::from_f64(f).ok_or(Status::NonFiniteFloat)?;
            Ok(JsonValue::Number(num))
        }
        TypedValue::Str(s) => Ok(JsonValue::String(s.to_owned())),
        TypedValue::Bytes(b) => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(b),
        )),
        TypedValue::Object(off) => container_to_json(live, off, true, depth + 1),
        TypedValue::Array(off) => container_to_json(live, off, false, depth + 1),
    }
}
