//! Streaming JSON → Lite³ decoder.
//!
//! [`JsonDecoder`] is a push decoder: the driver feeds UTF-8 chunks and the
//! decoder drives the typed setters against a [`Message`]. Recursion is
//! replaced by an explicit container-frame stack so the machine can yield
//! at two points and pick up exactly where it left off:
//!
//! * **Input underflow** — the scanner cannot complete a token and the
//!   block is not final. A property name already consumed from the scanner
//!   buffer is copied into decoder-owned storage before yielding, because
//!   the refill recycles those bytes.
//! * **Output growth** — a setter reports `InsufficientBuffer` on a
//!   growable message. The buffer is reallocated and the *same* token is
//!   dispatched again; the failed setter made no observable change, so the
//!   replay is idempotent.
//!
//! Numbers parse i64-first and fall back to f64. Unescaped strings pass
//! through zero-copy; escaped ones materialize in a scratch buffer reused
//! across tokens.

use log::trace;

use crate::msg::Message;
use crate::status::{Result, Status};

use super::scanner::{unescape, Scanner, Token};

/// Maximum container nesting depth accepted by the decoder and encoder.
pub const JSON_NESTING_MAX: usize = 64;

/// Outcome of one [`JsonDecoder::feed`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The input so far was consumed; feed the next chunk.
    NeedsMoreData,
    /// The root value is complete.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Object,
    Array,
}

/// One open container: its kind, node offset, and enough state to enforce
/// the comma grammar.
#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    offset: u32,
    count: u32,
    needs_separator: bool,
}

/// A property name waiting for its value.
///
/// `Range` borrows the scanner buffer (zero-copy); it is converted to
/// `Owned` before any suspension, since a refill recycles scanner bytes.
#[derive(Debug)]
enum PendingKey {
    Range { start: usize, end: usize },
    Owned(String),
}

/// Resumable push decoder.
pub struct JsonDecoder {
    scanner: Scanner,
    frames: Vec<Frame>,
    pending_key: Option<PendingKey>,
    seen_colon: bool,
    complete: bool,
    key_scratch: Vec<u8>,
    value_scratch: Vec<u8>,
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
            frames: Vec::with_capacity(JSON_NESTING_MAX),
            pending_key: None,
            seen_colon: false,
            complete: false,
            key_scratch: Vec::new(),
            value_scratch: Vec::new(),
        }
    }

    /// Feed one chunk of UTF-8 JSON.
    ///
    /// Returns [`Progress::Complete`] once the root container has closed.
    /// With `final_block` unset, [`Progress::NeedsMoreData`] asks the
    /// driver for the next chunk; with it set, an incomplete document is
    /// the `NeedsMoreData` failure.
    ///
    /// The output message is re-initialized to match the JSON root when the
    /// first token arrives.
    pub fn feed(
        &mut self,
        input: &[u8],
        final_block: bool,
        out: &mut Message,
    ) -> Result<Progress> {
        self.scanner.push_input(input);
        loop {
            if self.complete {
                if self.scanner.at_end() {
                    return Ok(Progress::Complete);
                }
                return Err(Status::TrailingData);
            }
            let token = match self.scanner.next_token(final_block) {
                Ok(Some(t)) => t,
                Ok(None) => {
                    if final_block {
                        return Err(Status::NeedsMoreData);
                    }
                    self.stash_pending_key()?;
                    return Ok(Progress::NeedsMoreData);
                }
                Err(Status::NeedsMoreData) if !final_block => {
                    self.stash_pending_key()?;
                    trace!("decoder suspending on input underflow");
                    return Ok(Progress::NeedsMoreData);
                }
                Err(e) => return Err(e),
            };
            self.dispatch(token, out)?;
        }
    }

    /// Copy a pending property name out of the scanner buffer before the
    /// driver recycles it.
    fn stash_pending_key(&mut self) -> Result<()> {
        if let Some(PendingKey::Range { start, end }) = self.pending_key {
            let bytes = &self.scanner.bytes()[start..end];
            let key = std::str::from_utf8(bytes)
                .map_err(|_| Status::ExpectedJsonProperty)?
                .to_owned();
            self.pending_key = Some(PendingKey::Owned(key));
        }
        Ok(())
    }

    fn dispatch(&mut self, token: Token, out: &mut Message) -> Result<()> {
        match self.frames.last().copied() {
            None => self.dispatch_root(token, out),
            Some(frame) => match frame.kind {
                FrameKind::Object => self.dispatch_object(token, out),
                FrameKind::Array => self.dispatch_array(token, out),
            },
        }
    }

    fn dispatch_root(&mut self, token: Token, out: &mut Message) -> Result<()> {
        match token {
            Token::ObjectStart => {
                out.reset_object()?;
                self.push_frame(FrameKind::Object, 0)
            }
            Token::ArrayStart => {
                out.reset_array()?;
                self.push_frame(FrameKind::Array, 0)
            }
            _ => Err(Status::ExpectedJsonArrayOrObject),
        }
    }

    fn push_frame(&mut self, kind: FrameKind, offset: u32) -> Result<()> {
        if self.frames.len() >= JSON_NESTING_MAX {
            return Err(Status::JsonNestingDepthExceededMax);
        }
        self.frames.push(Frame {
            kind,
            offset,
            count: 0,
            needs_separator: false,
        });
        Ok(())
    }

    fn pop_frame(&mut self) {
        self.frames.pop();
        if let Some(parent) = self.frames.last_mut() {
            parent.count += 1;
            parent.needs_separator = true;
        } else {
            self.complete = true;
        }
    }

    fn dispatch_object(&mut self, token: Token, out: &mut Message) -> Result<()> {
        if self.pending_key.is_none() {
            let frame = self.frames.last_mut().expect("object frame");
            return match token {
                Token::Str { start, end, escaped } => {
                    if frame.needs_separator {
                        return Err(Status::ExpectedJsonProperty);
                    }
                    if escaped {
                        let body = &self.scanner.bytes()[start..end];
                        unescape(body, &mut self.key_scratch)?;
                        let key = std::str::from_utf8(&self.key_scratch)
                            .map_err(|_| Status::ExpectedJsonProperty)?
                            .to_owned();
                        self.pending_key = Some(PendingKey::Owned(key));
                    } else {
                        self.pending_key = Some(PendingKey::Range { start, end });
                    }
                    Ok(())
                }
                Token::ObjectEnd => {
                    if frame.count > 0 && !frame.needs_separator {
                        return Err(Status::ExpectedJsonProperty);
                    }
                    self.pop_frame();
                    Ok(())
                }
                Token::Comma => {
                    if !frame.needs_separator {
                        return Err(Status::ExpectedJsonProperty);
                    }
                    frame.needs_separator = false;
                    Ok(())
                }
                _ => Err(Status::ExpectedJsonProperty),
            };
        }

        if !self.seen_colon {
            return match token {
                Token::Colon => {
                    self.seen_colon = true;
                    Ok(())
                }
                _ => Err(Status::ExpectedJsonValue),
            };
        }

        // Key and colon consumed: this token is the value.
        let container = self.frames.last().expect("object frame").offset;
        let child = self.emit_value(token, out, container, true)?;
        self.pending_key = None;
        self.seen_colon = false;
        if let Some((kind, offset)) = child {
            self.push_frame(kind, offset)?;
        } else {
            let frame = self.frames.last_mut().expect("object frame");
            frame.count += 1;
            frame.needs_separator = true;
        }
        Ok(())
    }

    fn dispatch_array(&mut self, token: Token, out: &mut Message) -> Result<()> {
        let frame = self.frames.last_mut().expect("array frame");
        match token {
            Token::ArrayEnd => {
                if frame.count > 0 && !frame.needs_separator {
                    return Err(Status::ExpectedJsonValue);
                }
                self.pop_frame();
                Ok(())
            }
            Token::Comma => {
                if !frame.needs_separator {
                    return Err(Status::ExpectedJsonValue);
                }
                frame.needs_separator = false;
                Ok(())
            }
            Token::Colon | Token::ObjectEnd => Err(Status::ExpectedJsonValue),
            _ => {
                if frame.needs_separator {
                    return Err(Status::ExpectedJsonValue);
                }
                let container = frame.offset;
                let child = self.emit_value(token, out, container, false)?;
                if let Some((kind, offset)) = child {
                    self.push_frame(kind, offset)?;
                } else {
                    let frame = self.frames.last_mut().expect("array frame");
                    frame.count += 1;
                    frame.needs_separator = true;
                }
                Ok(())
            }
        }
    }

    /// Dispatch one value token to the matching typed setter, retrying
    /// after growth. Returns the new frame for container starts.
    fn emit_value(
        &mut self,
        token: Token,
        out: &mut Message,
        container: u32,
        keyed: bool,
    ) -> Result<Option<(FrameKind, u32)>> {
        // Materialize an escaped string value before taking the key ref.
        let value_range = if let Token::Str { start, end, escaped } = token {
            if escaped {
                let body = &self.scanner.bytes()[start..end];
                unescape(body, &mut self.value_scratch)?;
                None
            } else {
                Some((start, end))
            }
        } else {
            None
        };

        let key: &str = if keyed {
            match &self.pending_key {
                Some(PendingKey::Owned(k)) => k.as_str(),
                Some(PendingKey::Range { start, end }) => {
                    std::str::from_utf8(&self.scanner.bytes()[*start..*end])
                        .map_err(|_| Status::ExpectedJsonProperty)?
                }
                None => return Err(Status::ExpectedJsonProperty),
            }
        } else {
            ""
        };

        match token {
            Token::Null => retry_grown(out, |m| {
                if keyed {
                    m.set_null(container, key)
                } else {
                    m.append_null(container)
                }
            })
            .map(|()| None),
            Token::True | Token::False => {
                let v = token == Token::True;
                retry_grown(out, |m| {
                    if keyed {
                        m.set_bool(container, key, v)
                    } else {
                        m.append_bool(container, v)
                    }
                })
                .map(|()| None)
            }
            Token::Number { start, end } => {
                let text = std::str::from_utf8(&self.scanner.bytes()[start..end])
                    .map_err(|_| Status::ExpectedJsonValue)?;
                if let Ok(n) = text.parse::<i64>() {
                    retry_grown(out, |m| {
                        if keyed {
                            m.set_i64(container, key, n)
                        } else {
                            m.append_i64(container, n)
                        }
                    })
                    .map(|()| None)
                } else {
                    let f: f64 = text.parse().map_err(|_| Status::ExpectedJsonValue)?;
                    if !f.is_finite() {
                        // Overflowed literals like 1e400 would store a value
                        // the encoder can never write back out.
                        return Err(Status::ExpectedJsonValue);
                    }
                    retry_grown(out, |m| {
                        if keyed {
                            m.set_f64(container, key, f)
                        } else {
                            m.append_f64(container, f)
                        }
                    })
                    .map(|()| None)
                }
            }
            Token::Str { .. } => {
                let bytes = match value_range {
                    Some((start, end)) => &self.scanner.bytes()[start..end],
                    None => &self.value_scratch,
                };
                let s = std::str::from_utf8(bytes).map_err(|_| Status::ExpectedJsonValue)?;
                retry_grown(out, |m| {
                    if keyed {
                        m.set_string(container, key, s)
                    } else {
                        m.append_string(container, s)
                    }
                })
                .map(|()| None)
            }
            Token::ObjectStart => {
                if self.frames.len() >= JSON_NESTING_MAX {
                    return Err(Status::JsonNestingDepthExceededMax);
                }
                let offset = retry_grown(out, |m| {
                    if keyed {
                        m.set_object(container, key)
                    } else {
                        m.append_object(container)
                    }
                })?;
                Ok(Some((FrameKind::Object, offset)))
            }
            Token::ArrayStart => {
                if self.frames.len() >= JSON_NESTING_MAX {
                    return Err(Status::JsonNestingDepthExceededMax);
                }
                let offset = retry_grown(out, |m| {
                    if keyed {
                        m.set_array(container, key)
                    } else {
                        m.append_array(container)
                    }
                })?;
                Ok(Some((FrameKind::Array, offset)))
            }
            Token::ObjectEnd | Token::ArrayEnd | Token::Comma | Token::Colon => {
                Err(Status::ExpectedJsonValue)
            }
        }
    }
}

/// Run a setter, growing the output and replaying on `InsufficientBuffer`.
/// The failed setter made no observable change, so the retry re-dispatches
/// the same token against the grown buffer.
fn retry_grown<T>(out: &mut Message, op: impl Fn(&mut Message) -> Result<T>) -> Result<T> {
    loop {
        match op(out) {
            Err(Status::InsufficientBuffer) if out.is_growable() => {
                out.grow()?;
                trace!("decoder grew output, replaying token");
            }
            r => return r,
        }
    }
}

/// Decode a complete JSON document in one call.
///
/// The result is a growable message sized up from the minimum as needed.
///
/// # Errors
///
/// Any decoder failure status; `NeedsMoreData` when the document is
/// truncated, `TrailingData` when bytes follow the root value.
pub fn from_json(json: &str) -> Result<Message> {
    let mut out = Message::object()?;
    let mut decoder = JsonDecoder::new();
    match decoder.feed(json.as_bytes(), true, &mut out)? {
        Progress::Complete => Ok(out),
        Progress::NeedsMoreData => Err(Status::NeedsMoreData),
    }
}

/// Decode a JSON document from a streaming reader.
///
/// Chunks are fed as they arrive; the decoder suspends across partial
/// tokens and the output grows from the minimum buffer size. Decode
/// failures are wrapped in `InvalidData` I/O errors.
pub fn decode_from_reader<R: std::io::Read>(mut reader: R) -> std::io::Result<Message> {
    let mut out =
        Message::object().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let mut decoder = JsonDecoder::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk)?;
        let final_block = n == 0;
        match decoder.feed(&chunk[..n], final_block, &mut out) {
            Ok(Progress::Complete) => return Ok(out),
            Ok(Progress::NeedsMoreData) => {}
            Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        }
        if final_block {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                Status::NeedsMoreData,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::ValueKind;
    use crate::tree::validate_tree;
    use crate::value::TypedValue;

    #[test]
    fn test_decode_flat_object() {
        let msg = from_json(r#"{"name": "alice", "age": 30, "tall": true, "x": null}"#).unwrap();
        assert_eq!(msg.root_kind().unwrap(), ValueKind::Object);
        assert_eq!(msg.count(0).unwrap(), 4);
        let live = msg.as_bytes();
        assert_eq!(
            msg.get_string(0, "name").unwrap().resolve(live).unwrap(),
            "alice"
        );
        assert_eq!(msg.get_i64(0, "age").unwrap(), 30);
        assert!(msg.get_bool(0, "tall").unwrap());
        assert!(crate::map::is_null(live, 0, "x").unwrap());
        validate_tree(live, 0).unwrap();
    }

    #[test]
    fn test_decode_nested() {
        let msg = from_json(r#"{"users": [{"name": "Amy"}, {"name": "Bob"}], "n": 2}"#).unwrap();
        let users = msg.get_array(0, "users").unwrap();
        assert_eq!(msg.count(users).unwrap(), 2);
        let bob = crate::arr::get_object(msg.as_bytes(), users, 1).unwrap();
        assert_eq!(
            crate::map::get_string(msg.as_bytes(), bob, "name")
                .unwrap()
                .resolve(msg.as_bytes())
                .unwrap(),
            "Bob"
        );
    }

    #[test]
    fn test_decode_array_root() {
        let msg = from_json(r#"[1, 2.5, "three", false, null, []]"#).unwrap();
        assert_eq!(msg.root_kind().unwrap(), ValueKind::Array);
        assert_eq!(msg.count(0).unwrap(), 6);
        let live = msg.as_bytes();
        assert_eq!(crate::arr::get_i64(live, 0, 0).unwrap(), 1);
        assert!((crate::arr::get_f64(live, 0, 1).unwrap() - 2.5).abs() < 1e-12);
        let inner = crate::arr::get_array(live, 0, 5).unwrap();
        assert_eq!(crate::tree::count(live, inner).unwrap(), 0);
    }

    #[test]
    fn test_numbers_integer_vs_float() {
        let msg = from_json(r#"{"i": 9007199254740993, "f": 1e3, "neg": -5}"#).unwrap();
        assert_eq!(msg.get_i64(0, "i").unwrap(), 9007199254740993);
        assert!((msg.get_f64(0, "f").unwrap() - 1000.0).abs() < 1e-9);
        assert_eq!(msg.get_i64(0, "neg").unwrap(), -5);
        // Overflowing i64 falls back to f64.
        let msg = from_json(r#"{"big": 92233720368547758080}"#).unwrap();
        assert_eq!(msg.kind_of(0, "big").unwrap(), ValueKind::F64);
    }

    #[test]
    fn test_numbers_overflowing_f64_rejected() {
        // Magnitudes past f64 range would decode to Infinity, which the
        // encoder refuses; reject them on the way in too.
        assert_eq!(
            from_json(r#"{"huge": 1e400}"#).unwrap_err(),
            Status::ExpectedJsonValue
        );
        assert_eq!(
            from_json(r#"[-1e400]"#).unwrap_err(),
            Status::ExpectedJsonValue
        );
        // The largest finite doubles still pass.
        let msg = from_json(r#"{"edge": 1.7976931348623157e308}"#).unwrap();
        assert!(msg.get_f64(0, "edge").unwrap().is_finite());
    }

    #[test]
    fn test_escaped_strings() {
        let msg = from_json(r#"{"k\n1": "a\tb", "u": "é😀"}"#).unwrap();
        let live = msg.as_bytes();
        assert_eq!(
            crate::map::get_string(live, 0, "k\n1")
                .unwrap()
                .resolve(live)
                .unwrap(),
            "a\tb"
        );
        assert_eq!(
            crate::map::get_string(live, 0, "u")
                .unwrap()
                .resolve(live)
                .unwrap(),
            "é😀"
        );
    }

    #[test]
    fn test_duplicate_keys_overwrite() {
        let msg = from_json(r#"{"k": 1, "k": 2}"#).unwrap();
        assert_eq!(msg.get_i64(0, "k").unwrap(), 2);
        assert_eq!(msg.count(0).unwrap(), 1);
    }

    #[test]
    fn test_scalar_root_rejected() {
        assert_eq!(from_json("42").unwrap_err(), Status::ExpectedJsonArrayOrObject);
        assert_eq!(
            from_json(r#""str""#).unwrap_err(),
            Status::ExpectedJsonArrayOrObject
        );
    }

    #[test]
    fn test_grammar_errors() {
        assert_eq!(
            from_json(r#"{"a" 1}"#).unwrap_err(),
            Status::ExpectedJsonValue
        );
        assert_eq!(
            from_json(r#"{"a": 1,}"#).unwrap_err(),
            Status::ExpectedJsonProperty
        );
        assert_eq!(from_json(r#"[1,]"#).unwrap_err(), Status::ExpectedJsonValue);
        assert_eq!(from_json(r#"[1 2]"#).unwrap_err(), Status::ExpectedJsonValue);
        assert_eq!(
            from_json(r#"{1: 2}"#).unwrap_err(),
            Status::ExpectedJsonProperty
        );
    }

    #[test]
    fn test_truncated_document() {
        assert_eq!(
            from_json(r#"{"a": 1"#).unwrap_err(),
            Status::NeedsMoreData
        );
        assert_eq!(from_json(r#"{"a": "#).unwrap_err(), Status::NeedsMoreData);
        assert_eq!(from_json("").unwrap_err(), Status::NeedsMoreData);
    }

    #[test]
    fn test_trailing_data() {
        assert_eq!(from_json(r#"{} x"#).unwrap_err(), Status::TrailingData);
        assert_eq!(from_json(r#"[] 1"#).unwrap_err(), Status::TrailingData);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = "[".repeat(JSON_NESTING_MAX + 1) + &"]".repeat(JSON_NESTING_MAX + 1);
        assert_eq!(
            from_json(&deep).unwrap_err(),
            Status::JsonNestingDepthExceededMax
        );
        let ok = "[".repeat(JSON_NESTING_MAX) + &"]".repeat(JSON_NESTING_MAX);
        from_json(&ok).unwrap();
    }

    #[test]
    fn test_chunked_feed_suspends_across_tokens() {
        let json = r#"{"pending_key_name": "split value", "n": 1234}"#;
        let mut out = Message::object().unwrap();
        let mut decoder = JsonDecoder::new();
        // Feed one byte at a time: every token boundary and mid-token
        // suspension path gets exercised, including the pending-key copy.
        let bytes = json.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            let progress = decoder
                .feed(std::slice::from_ref(b), i == bytes.len() - 1, &mut out)
                .unwrap();
            if i == bytes.len() - 1 {
                assert_eq!(progress, Progress::Complete);
            }
        }
        assert_eq!(
            out.get_string(0, "pending_key_name")
                .unwrap()
                .resolve(out.as_bytes())
                .unwrap(),
            "split value"
        );
        assert_eq!(out.get_i64(0, "n").unwrap(), 1234);
    }

    #[test]
    fn test_decode_from_reader() {
        let json = r#"{"a": [1, 2, 3], "b": {"c": "deep"}}"#;
        let msg = decode_from_reader(json.as_bytes()).unwrap();
        let a = msg.get_array(0, "a").unwrap();
        assert_eq!(msg.count(a).unwrap(), 3);
        let b = msg.get_object(0, "b").unwrap();
        assert_eq!(
            crate::map::get_string(msg.as_bytes(), b, "c")
                .unwrap()
                .resolve(msg.as_bytes())
                .unwrap(),
            "deep"
        );
    }

    #[test]
    fn test_output_grows_for_large_document() {
        // Larger than the minimum buffer: growth and replay must kick in.
        let mut json = String::from("{");
        for i in 0..200 {
            if i > 0 {
                json.push(',');
            }
            json.push_str(&format!(r#""field{i:03}": "{}""#, "v".repeat(32)));
        }
        json.push('}');
        let msg = from_json(&json).unwrap();
        assert!(msg.capacity() > crate::buffer::BUF_SIZE_MIN);
        assert_eq!(msg.count(0).unwrap(), 200);
        for i in (0..200).step_by(17) {
            let key = format!("field{i:03}");
            assert_eq!(msg.get_string(0, &key).unwrap().len(), 32);
        }
        validate_tree(msg.as_bytes(), 0).unwrap();
    }

    #[test]
    fn test_value_views_after_decode() {
        let msg = from_json(r#"{"pi": 3.25}"#).unwrap();
        match msg.get(0, "pi").unwrap().typed().unwrap() {
            TypedValue::F64(f) => assert!((f - 3.25).abs() < 1e-12),
            other => panic!("expected F64, got {other:?}"),
        }
    }
}
