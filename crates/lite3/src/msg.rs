//! Owned message buffer.
//!
//! [`Message`] bundles a heap-backed buffer with its write frontier and
//! delegates to the free-function typed API with the root-relative
//! container offsets spelled out (0 is the root). It is the output target
//! of the JSON decoder and the convenient surface for building messages in
//! tests and examples; the free functions in [`map`](crate::map) and
//! [`arr`](crate::arr) remain the primitive layer and also work on fixed
//! borrowed slices.
//!
//! The live prefix (`as_bytes`) is directly transportable: copy it verbatim
//! and the receiving side can read and mutate it in place.

use crate::buffer::{self, BUF_SIZE_MIN};
use crate::iter::Iter;
use crate::status::{Result, Status};
use crate::tag::ValueKind;
use crate::value::{BytesHandle, StrHandle, ValueRef};
use crate::{arr, map, tree};

/// An owned, optionally growable message buffer.
pub struct Message {
    data: Vec<u8>,
    position: usize,
    growable: bool,
}

impl Message {
    /// Create a growable message with an empty Object root.
    pub fn object() -> Result<Self> {
        Self::object_with_capacity(BUF_SIZE_MIN, true)
    }

    /// Create a growable message with an empty Array root.
    pub fn array() -> Result<Self> {
        Self::array_with_capacity(BUF_SIZE_MIN, true)
    }

    /// Create a message with an empty Object root and the given capacity.
    pub fn object_with_capacity(capacity: usize, growable: bool) -> Result<Self> {
        let mut msg = Self {
            data: vec![0u8; capacity],
            position: 0,
            growable,
        };
        buffer::init_object(&mut msg.data, &mut msg.position)?;
        Ok(msg)
    }

    /// Create a message with an empty Array root and the given capacity.
    pub fn array_with_capacity(capacity: usize, growable: bool) -> Result<Self> {
        let mut msg = Self {
            data: vec![0u8; capacity],
            position: 0,
            growable,
        };
        buffer::init_array(&mut msg.data, &mut msg.position)?;
        Ok(msg)
    }

    /// Adopt a received message buffer; the whole vector is the live
    /// region. Validates the root tag.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let position = data.len();
        buffer::root_kind(&data)?;
        Ok(Self {
            data,
            position,
            growable: true,
        })
    }

    /// Re-initialize as an empty Object root, discarding current content.
    pub fn reset_object(&mut self) -> Result<()> {
        buffer::init_object(&mut self.data, &mut self.position)
    }

    /// Re-initialize as an empty Array root, discarding current content.
    pub fn reset_array(&mut self) -> Result<()> {
        buffer::init_array(&mut self.data, &mut self.position)
    }

    // --- Buffer state ---

    /// The live message bytes, `[0, position)`.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.position]
    }

    /// Consume the message, returning the backing vector truncated to the
    /// live region.
    #[must_use]
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.position);
        self.data
    }

    /// The write frontier.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The buffer capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Whether a full buffer may be reallocated larger.
    #[inline]
    #[must_use]
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// The buffer's generation counter.
    pub fn generation(&self) -> Result<u32> {
        buffer::generation(self.as_bytes())
    }

    /// The root container kind.
    pub fn root_kind(&self) -> Result<ValueKind> {
        buffer::root_kind(self.as_bytes())
    }

    /// Entry count of the container at `container` (0 for the root).
    pub fn count(&self, container: u32) -> Result<u32> {
        tree::count(self.as_bytes(), container)
    }

    /// Grow the buffer by the ×4 policy.
    ///
    /// # Errors
    ///
    /// `InsufficientBuffer` when the message is not growable or already at
    /// the size cap.
    pub fn grow(&mut self) -> Result<Status> {
        if !self.growable {
            return Err(Status::InsufficientBuffer);
        }
        buffer::grow(&mut self.data)
    }

    /// Iterate the container at `container` in tree order.
    pub fn iter(&self, container: u32) -> Result<Iter<'_>> {
        Iter::new(self.as_bytes(), container)
    }

    // --- Keyed (Object) operations ---

    /// Set `key` to null in the Object at `container`.
    pub fn set_null(&mut self, container: u32, key: &str) -> Result<()> {
        map::set_null(&mut self.data, &mut self.position, container, key)
    }

    /// Set `key` to a boolean.
    pub fn set_bool(&mut self, container: u32, key: &str, value: bool) -> Result<()> {
        map::set_bool(&mut self.data, &mut self.position, container, key, value)
    }

    /// Set `key` to a signed 64-bit integer.
    pub fn set_i64(&mut self, container: u32, key: &str, value: i64) -> Result<()> {
        map::set_i64(&mut self.data, &mut self.position, container, key, value)
    }

    /// Set `key` to a 64-bit float.
    pub fn set_f64(&mut self, container: u32, key: &str, value: f64) -> Result<()> {
        map::set_f64(&mut self.data, &mut self.position, container, key, value)
    }

    /// Set `key` to a binary value.
    pub fn set_bytes(&mut self, container: u32, key: &str, value: &[u8]) -> Result<()> {
        map::set_bytes(&mut self.data, &mut self.position, container, key, value)
    }

    /// Set `key` to a string value.
    pub fn set_string(&mut self, container: u32, key: &str, value: &str) -> Result<()> {
        map::set_string(&mut self.data, &mut self.position, container, key, value)
    }

    /// Set `key` to a fresh empty Object; returns the child node offset.
    pub fn set_object(&mut self, container: u32, key: &str) -> Result<u32> {
        map::set_object(&mut self.data, &mut self.position, container, key)
    }

    /// Set `key` to a fresh empty Array; returns the child node offset.
    pub fn set_array(&mut self, container: u32, key: &str) -> Result<u32> {
        map::set_array(&mut self.data, &mut self.position, container, key)
    }

    /// Get a read cursor for the value at `key`.
    pub fn get(&self, container: u32, key: &str) -> Result<ValueRef<'_>> {
        map::get(self.as_bytes(), container, key)
    }

    /// Get a boolean value.
    pub fn get_bool(&self, container: u32, key: &str) -> Result<bool> {
        map::get_bool(self.as_bytes(), container, key)
    }

    /// Get a signed 64-bit integer value.
    pub fn get_i64(&self, container: u32, key: &str) -> Result<i64> {
        map::get_i64(self.as_bytes(), container, key)
    }

    /// Get a 64-bit float value.
    pub fn get_f64(&self, container: u32, key: &str) -> Result<f64> {
        map::get_f64(self.as_bytes(), container, key)
    }

    /// Get a generation-checked string handle.
    pub fn get_string(&self, container: u32, key: &str) -> Result<StrHandle> {
        map::get_string(self.as_bytes(), container, key)
    }

    /// Get a generation-checked bytes handle.
    pub fn get_bytes(&self, container: u32, key: &str) -> Result<BytesHandle> {
        map::get_bytes(self.as_bytes(), container, key)
    }

    /// Get the node offset of an Object value.
    pub fn get_object(&self, container: u32, key: &str) -> Result<u32> {
        map::get_object(self.as_bytes(), container, key)
    }

    /// Get the node offset of an Array value.
    pub fn get_array(&self, container: u32, key: &str) -> Result<u32> {
        map::get_array(self.as_bytes(), container, key)
    }

    /// True when `key` is present.
    pub fn exists(&self, container: u32, key: &str) -> Result<bool> {
        map::exists(self.as_bytes(), container, key)
    }

    /// The kind of the value at `key`.
    pub fn kind_of(&self, container: u32, key: &str) -> Result<ValueKind> {
        map::kind_of(self.as_bytes(), container, key)
    }

    // --- Indexed (Array) operations ---

    /// Append null to the Array at `container`.
    pub fn append_null(&mut self, container: u32) -> Result<()> {
        arr::append_null(&mut self.data, &mut self.position, container)
    }

    /// Append a boolean.
    pub fn append_bool(&mut self, container: u32, value: bool) -> Result<()> {
        arr::append_bool(&mut self.data, &mut self.position, container, value)
    }

    /// Append a signed 64-bit integer.
    pub fn append_i64(&mut self, container: u32, value: i64) -> Result<()> {
        arr::append_i64(&mut self.data, &mut self.position, container, value)
    }

    /// Append a 64-bit float.
    pub fn append_f64(&mut self, container: u32, value: f64) -> Result<()> {
        arr::append_f64(&mut self.data, &mut self.position, container, value)
    }

    /// Append a binary value.
    pub fn append_bytes(&mut self, container: u32, value: &[u8]) -> Result<()> {
        arr::append_bytes(&mut self.data, &mut self.position, container, value)
    }

    /// Append a string value.
    pub fn append_string(&mut self, container: u32, value: &str) -> Result<()> {
        arr::append_string(&mut self.data, &mut self.position, container, value)
    }

    /// Append a fresh empty Object; returns the child node offset.
    pub fn append_object(&mut self, container: u32) -> Result<u32> {
        arr::append_object(&mut self.data, &mut self.position, container)
    }

    /// Append a fresh empty Array; returns the child node offset.
    pub fn append_array(&mut self, container: u32) -> Result<u32> {
        arr::append_array(&mut self.data, &mut self.position, container)
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("position", &self.position)
            .field("capacity", &self.data.len())
            .field("growable", &self.growable)
            .field("root", &self.root_kind().map(ValueKind::name).unwrap_or("?"))
            .finish()
    }
}
