//! Lite³: a JSON-compatible, zero-copy, in-place-mutable binary message
//! format.
//!
//! A Lite³ message is one contiguous byte buffer that is simultaneously the
//! serialized message and the working memory for reads and edits: no
//! parsing step, no separate DOM, no heap graph. Containers embed a
//! hash-ordered B-tree in fixed 96-byte nodes; all internal references are
//! buffer-relative offsets, so copying the live prefix verbatim transports
//! the message, and the receiving side can keep mutating it in place.
//!
//! ```
//! use lite3::{from_json, Message};
//!
//! let mut msg = Message::object().unwrap();
//! msg.set_string(0, "event", "lap_complete").unwrap();
//! msg.set_i64(0, "lap", 56).unwrap();
//! assert_eq!(msg.get_i64(0, "lap").unwrap(), 56);
//!
//! let decoded = from_json(r#"{"time_sec": 88.427}"#).unwrap();
//! assert!((decoded.get_f64(0, "time_sec").unwrap() - 88.427).abs() < 1e-12);
//! ```

pub mod arr;
pub mod buffer;
pub mod hash;
pub mod iter;
pub mod json;
pub mod map;
pub mod msg;
pub mod node;
pub mod status;
pub mod tag;
pub mod tree;
pub mod value;

pub use json::{decode_from_reader, from_json, to_json, JsonDecoder, Progress};
pub use msg::Message;
pub use status::{Result, Status};
pub use tag::ValueKind;
pub use value::{BytesHandle, StrHandle, TypedValue, ValueRef};
