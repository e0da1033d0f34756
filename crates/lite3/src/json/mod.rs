//! JSON ↔ Lite³ streaming transcoders.
//!
//! Decoding is a resumable, token-driven state machine ([`JsonDecoder`])
//! that drives the typed setters directly; a one-shot [`from_json`] and a
//! chunked [`decode_from_reader`] wrap it. Encoding ([`to_json`]) is a
//! recursive walk over the container tree. Both sides share the
//! [`JSON_NESTING_MAX`] depth cap.

mod decode;
mod encode;
mod scanner;

pub use decode::{decode_from_reader, from_json, JsonDecoder, Progress, JSON_NESTING_MAX};
pub use encode::{subtree_to_json, to_json, to_json_value};
