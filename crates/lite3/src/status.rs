//! Status codes for Lite³ operations.
//!
//! A single signed enum is the only error channel of the crate. Negative
//! members are failures, [`Status::None`] (`0`) is nominal success, and the
//! positive members are in-band sentinels used by internal loops (a grown
//! buffer, an iterator step). Fallible operations return [`Result`]; the
//! error value is always a negative member, sentinels never cross the public
//! boundary.

use std::fmt;

/// Status code for Lite³ operations.
///
/// The discriminant is the on-the-wire signed code: `< 0` failure, `0`
/// success, `> 0` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    // Structural failures: corruption or misuse of an already-built buffer.
    /// A key entry offset points outside the live buffer.
    KeyEntryOutOfBounds = -1,
    /// A key tag's stored width disagrees with the width its size requires.
    KeyTagSizeDoesNotMatch = -2,
    /// A value's declared length reaches past the live buffer.
    ValueOutOfBounds = -3,
    /// A value tag byte is not one of the eight known kinds.
    ValueKindInvalid = -4,
    /// A node offset is not 4-byte aligned.
    NodeOffsetNotAligned = -5,
    /// A child offset reached during descent lies outside the live buffer.
    NodeWalksOffsetOutOfBounds = -6,
    /// Descent did not terminate within the maximum tree height.
    NodeWalksExceededTreeHeightMax = -7,
    /// A container start offset lies outside the live buffer.
    StartOffsetOutOfBounds = -8,
    /// All quadratic probe attempts were exhausted.
    HashProbeLimitReached = -9,
    /// The iterator was created against a different generation.
    InvalidIterator = -10,

    // Semantic failures: well-formed buffer, wrong usage.
    /// The root (or target) must be an Object or an Array.
    ExpectedArrayOrObject = -11,
    /// The operation requires an Object container.
    ExpectedObject = -12,
    /// The operation requires an Array container.
    ExpectedArray = -13,
    /// Object keys must be non-empty.
    ExpectedNonEmptyKey = -14,
    /// The value at the key has a different kind than requested.
    ValueKindDoesNotMatch = -15,
    /// The key is not present in the container.
    KeyNotFound = -16,
    /// The array index is not below the current length.
    ArrayIndexOutOfBounds = -17,
    /// The handle's generation no longer matches the buffer.
    MutatedBuffer = -18,
    /// Two distinct keys hashed identically at this probe attempt. Internal:
    /// the probe loop consumes this and retries with the next attempt.
    KeyHashCollision = -19,

    // Capacity.
    /// The buffer has no room for the operation (nothing was changed).
    InsufficientBuffer = -20,

    // JSON decode failures.
    /// Expected a property name inside an object.
    ExpectedJsonProperty = -21,
    /// The JSON root must be an object or an array.
    ExpectedJsonArrayOrObject = -22,
    /// Expected a JSON value.
    ExpectedJsonValue = -23,
    /// Nesting exceeded the maximum depth.
    JsonNestingDepthExceededMax = -24,
    /// The input ended inside a token or with open containers.
    NeedsMoreData = -25,
    /// Non-whitespace input after the root value.
    TrailingData = -26,

    // JSON encode failure.
    /// An f64 is NaN or Infinity and cannot be written as JSON.
    NonFiniteFloat = -27,

    /// Nominal success.
    None = 0,

    // Sentinels (positive, in-band).
    /// The iterator has emitted every entry.
    IteratorDone = 1,
    /// The iterator produced an entry.
    IteratorItem = 2,
    /// The buffer was reallocated larger; retry the operation.
    GrewBuffer = 3,
}

impl Status {
    /// The signed code of this status.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// True for failure codes (`< 0`).
    #[inline]
    #[must_use]
    pub const fn is_failure(self) -> bool {
        (self as i32) < 0
    }

    /// True for in-band sentinels (`> 0`).
    #[inline]
    #[must_use]
    pub const fn is_sentinel(self) -> bool {
        (self as i32) > 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Status::KeyEntryOutOfBounds => "key entry offset out of bounds",
            Status::KeyTagSizeDoesNotMatch => "key tag size does not match key size",
            Status::ValueOutOfBounds => "value out of bounds",
            Status::ValueKindInvalid => "invalid value kind tag",
            Status::NodeOffsetNotAligned => "node offset not 4-byte aligned",
            Status::NodeWalksOffsetOutOfBounds => "node walk reached an out-of-bounds offset",
            Status::NodeWalksExceededTreeHeightMax => "node walk exceeded maximum tree height",
            Status::StartOffsetOutOfBounds => "start offset out of bounds",
            Status::HashProbeLimitReached => "hash probe limit reached",
            Status::InvalidIterator => "iterator invalidated by mutation",
            Status::ExpectedArrayOrObject => "expected an array or object",
            Status::ExpectedObject => "expected an object",
            Status::ExpectedArray => "expected an array",
            Status::ExpectedNonEmptyKey => "expected a non-empty key",
            Status::ValueKindDoesNotMatch => "value kind does not match",
            Status::KeyNotFound => "key not found",
            Status::ArrayIndexOutOfBounds => "array index out of bounds",
            Status::MutatedBuffer => "buffer mutated since handle was taken",
            Status::KeyHashCollision => "key hash collision",
            Status::InsufficientBuffer => "insufficient buffer",
            Status::ExpectedJsonProperty => "expected a JSON property name",
            Status::ExpectedJsonArrayOrObject => "expected a JSON array or object",
            Status::ExpectedJsonValue => "expected a JSON value",
            Status::JsonNestingDepthExceededMax => "JSON nesting depth exceeded maximum",
            Status::NeedsMoreData => "needs more data",
            Status::TrailingData => "trailing data after JSON value",
            Status::NonFiniteFloat => "cannot encode non-finite float as JSON",
            Status::None => "ok",
            Status::IteratorDone => "iterator done",
            Status::IteratorItem => "iterator item",
            Status::GrewBuffer => "grew buffer",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for Status {}

/// Result type alias for Lite³ operations.
pub type Result<T> = std::result::Result<T, Status>;
