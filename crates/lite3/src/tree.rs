//! The node engine: the B-tree embedded in the message bytes.
//!
//! Containers index their entries with order-8 B-tree nodes keyed by 32-bit
//! hash. Object keys hash with DJB2 and recover from collisions by
//! quadratic probing; array elements use their index as the hash and probe
//! exactly once. Lookup is an ordered descent; insertion is a single
//! top-down pass that splits any full node it meets, so a splitting child's
//! parent always has a free slot.
//!
//! All functions here take the buffer and offsets explicitly. Readers
//! receive the live region (`&buf[..position]`); writers receive the whole
//! buffer plus the mutable write frontier.

use std::cmp::Ordering;

use log::trace;

use crate::buffer::{
    self, align_up, zero, HASH_PROBE_MAX, KEY_COUNT_MAX, KEY_COUNT_MIN, NODE_ALIGN, NODE_SIZE,
    TREE_HEIGHT_MAX,
};
use crate::hash::{djb2, probe_hash};
use crate::node::{self, NodeRef, CHILD_SLOTS, SLOTS};
use crate::status::{Result, Status};
use crate::tag::{decode_key_tag, encode_key_tag, ValueKind, KEY_SIZE_MAX};
use crate::value::{stored_size, NewValue};

/// How an operation addresses an entry inside a container.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ProbeKey<'a> {
    /// Object member by key bytes (no NUL).
    Key(&'a [u8]),
    /// Array element by index; must be below the current length.
    Index(u32),
    /// Array element at the current length.
    Append,
}

/// Result of a successful set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SetOutcome {
    /// Offset of the value's tag byte (the node offset for containers).
    pub value_offset: u32,
    /// True when a new entry was created rather than replaced.
    pub created: bool,
}

enum Found {
    /// The effective hash is stored in `node` at `slot`.
    At { node: u32, slot: usize },
    /// The effective hash is nowhere in the tree.
    Missing,
}

/// Validate a container offset against the live region, mapping the node
/// bounds error to the start-offset error the API contract uses.
pub(crate) fn container_at<'a>(live: &'a [u8], container: u32) -> Result<NodeRef<'a>> {
    NodeRef::at(live, container).map_err(|e| match e {
        Status::NodeWalksOffsetOutOfBounds => Status::StartOffsetOutOfBounds,
        other => other,
    })
}

/// Ordered descent for one effective hash.
fn descend(live: &[u8], container: u32, h: u32) -> Result<Found> {
    let mut cur = container;
    for _ in 0..=TREE_HEIGHT_MAX {
        let n = NodeRef::at(live, cur)?;
        let kc = n.key_count();
        let mut i = kc;
        for j in 0..kc {
            let hj = n.hash(j);
            if hj == h {
                return Ok(Found::At { node: cur, slot: j });
            }
            if hj > h {
                i = j;
                break;
            }
        }
        if n.is_leaf() {
            return Ok(Found::Missing);
        }
        let child = n.child_offset(i);
        if child == 0 {
            return Err(Status::NodeWalksOffsetOutOfBounds);
        }
        cur = child;
    }
    Err(Status::NodeWalksExceededTreeHeightMax)
}

/// Split an entry into its key bytes (objects only, NUL stripped) and the
/// offset of its value tag.
pub(crate) fn entry_parts<'a>(
    live: &'a [u8],
    kind: ValueKind,
    entry: u32,
) -> Result<(Option<&'a [u8]>, u32)> {
    match kind {
        ValueKind::Object => {
            let (key_size, width) = decode_key_tag(live, entry as usize)?;
            if key_size == 0 {
                return Err(Status::KeyEntryOutOfBounds);
            }
            let key_start = entry as usize + width;
            let key_end = key_start + key_size as usize;
            let bytes = live
                .get(key_start..key_end)
                .ok_or(Status::KeyEntryOutOfBounds)?;
            Ok((Some(&bytes[..bytes.len() - 1]), key_end as u32))
        }
        ValueKind::Array => Ok((None, entry)),
        _ => Err(Status::ExpectedArrayOrObject),
    }
}

/// Locate an entry's value offset, probing as needed.
///
/// # Errors
///
/// `KeyNotFound` when the key is absent, `ArrayIndexOutOfBounds` when an
/// index is not below the array length, `HashProbeLimitReached` when every
/// probe attempt collided.
pub(crate) fn lookup(live: &[u8], container: u32, key: ProbeKey) -> Result<u32> {
    let root = container_at(live, container)?;
    let kind = root.kind()?;
    let (base, attempts) = match key {
        ProbeKey::Key(k) => {
            if kind != ValueKind::Object {
                return Err(Status::ExpectedObject);
            }
            if k.is_empty() {
                return Err(Status::ExpectedNonEmptyKey);
            }
            (djb2(k), HASH_PROBE_MAX)
        }
        ProbeKey::Index(i) => {
            if kind != ValueKind::Array {
                return Err(Status::ExpectedArray);
            }
            if i >= root.size() {
                return Err(Status::ArrayIndexOutOfBounds);
            }
            (i, 1)
        }
        ProbeKey::Append => return Err(Status::ArrayIndexOutOfBounds),
    };

    for attempt in 0..attempts {
        let h = probe_hash(base, attempt);
        match descend(live, container, h)? {
            Found::At { node, slot } => {
                let entry = NodeRef::at(live, node)?.kv_offset(slot);
                let (entry_key, value_off) = entry_parts(live, kind, entry)?;
                let matched = match (key, entry_key) {
                    (ProbeKey::Key(k), Some(ek)) => k == ek,
                    (ProbeKey::Index(_), None) => true,
                    _ => return Err(Status::KeyEntryOutOfBounds),
                };
                if matched {
                    stored_size(live, value_off)?;
                    return Ok(value_off);
                }
                // Hash collision with a different key: next attempt.
            }
            Found::Missing => return Err(Status::KeyNotFound),
        }
    }
    Err(Status::HashProbeLimitReached)
}

/// Insert or overwrite one entry.
///
/// On success the buffer generation has been bumped and, for a created
/// entry, the container's size incremented. On `InsufficientBuffer` the
/// entry being written has made no observable change (completed node splits
/// from the same pass remain, which is content-neutral and replay-safe).
pub(crate) fn set_value(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    key: ProbeKey,
    value: NewValue,
) -> Result<SetOutcome> {
    if *position > buf.len() {
        return Err(Status::StartOffsetOutOfBounds);
    }
    let root = container_at(&buf[..*position], container)?;
    let kind = root.kind()?;
    let size = root.size();

    let (base, attempts, must_exist) = match key {
        ProbeKey::Key(k) => {
            if kind != ValueKind::Object {
                return Err(Status::ExpectedObject);
            }
            if k.is_empty() {
                return Err(Status::ExpectedNonEmptyKey);
            }
            if k.len() as u32 + 1 > KEY_SIZE_MAX {
                return Err(Status::KeyEntryOutOfBounds);
            }
            (djb2(k), HASH_PROBE_MAX, false)
        }
        ProbeKey::Index(i) => {
            if kind != ValueKind::Array {
                return Err(Status::ExpectedArray);
            }
            if i >= size {
                return Err(Status::ArrayIndexOutOfBounds);
            }
            (i, 1, true)
        }
        ProbeKey::Append => {
            if kind != ValueKind::Array {
                return Err(Status::ExpectedArray);
            }
            (size, 1, false)
        }
    };
    let key_bytes = match key {
        ProbeKey::Key(k) => Some(k),
        _ => None,
    };

    for attempt in 0..attempts {
        let h = probe_hash(base, attempt);
        match descend(&buf[..*position], container, h)? {
            Found::At { node, slot } => {
                let entry = NodeRef::at(&buf[..*position], node)?.kv_offset(slot);
                let (entry_key, value_off) =
                    entry_parts(&buf[..*position], kind, entry)?;
                let matched = match (key, entry_key) {
                    (ProbeKey::Key(k), Some(ek)) => k == ek,
                    (ProbeKey::Index(_) | ProbeKey::Append, None) => true,
                    _ => return Err(Status::KeyEntryOutOfBounds),
                };
                if matched {
                    let value_offset =
                        replace_entry(buf, position, node, slot, entry, value_off, key_bytes, value)?;
                    return Ok(SetOutcome {
                        value_offset,
                        created: false,
                    });
                }
            }
            Found::Missing => {
                if must_exist {
                    return Err(Status::KeyNotFound);
                }
                match insert_new(buf, position, container, kind, h, key_bytes, value) {
                    Err(Status::KeyHashCollision) => continue,
                    Err(e) => return Err(e),
                    Ok(value_offset) => {
                        return Ok(SetOutcome {
                            value_offset,
                            created: true,
                        })
                    }
                }
            }
        }
    }
    Err(Status::HashProbeLimitReached)
}

/// Overwrite the value of an existing entry, in place when the new value
/// fits, otherwise by appending a fresh entry and leaking the old bytes.
#[allow(clippy::too_many_arguments)]
fn replace_entry(
    buf: &mut [u8],
    position: &mut usize,
    node_off: u32,
    slot: usize,
    entry: u32,
    value_off: u32,
    key_bytes: Option<&[u8]>,
    value: NewValue,
) -> Result<u32> {
    let old_size = stored_size(&buf[..*position], value_off)?;
    let new_size = value.encoded_size();
    let vo = value_off as usize;
    let generation = buffer::generation(&buf[..*position])?;

    if new_size <= old_size && (!value.is_node() || vo % NODE_ALIGN == 0) {
        // In-place overwrite; the vacated tail stays zero.
        zero(buf, vo, vo + old_size);
        value.write(buf, vo, generation);
        buffer::bump_generation(buf);
        return Ok(value_off);
    }

    // Relocate: append a fresh entry and repoint the slot. Capacity first,
    // so a failure leaves the old entry intact.
    let prefix = match key_bytes {
        Some(k) => {
            let key_size = k.len() + 1;
            crate::tag::key_tag_width(key_size as u32) + key_size
        }
        None => 0,
    };
    let pad = if value.is_node() {
        align_up(*position + prefix) - (*position + prefix)
    } else {
        0
    };
    let new_entry = *position + pad;
    if new_entry + prefix + new_size > buf.len() {
        return Err(Status::InsufficientBuffer);
    }

    // Old key and value bytes are leaked; zero them so stale tags cannot be
    // misread later.
    zero(buf, entry as usize, vo + old_size);
    zero(buf, *position, new_entry);
    write_entry(buf, new_entry, key_bytes, value, generation);
    node::set_kv_offset(buf, node_off, slot, new_entry as u32);
    *position = new_entry + prefix + new_size;
    buffer::bump_generation(buf);
    Ok((new_entry + prefix) as u32)
}

/// Serialize `key || value` at `entry`. Capacity was checked by the caller.
fn write_entry(
    buf: &mut [u8],
    entry: usize,
    key_bytes: Option<&[u8]>,
    value: NewValue,
    generation: u32,
) {
    let mut at = entry;
    if let Some(k) = key_bytes {
        let key_size = k.len() as u32 + 1;
        let (tag, width) = encode_key_tag(key_size);
        buf[at..at + width].copy_from_slice(&tag[..width]);
        at += width;
        buf[at..at + k.len()].copy_from_slice(k);
        at += k.len();
        buf[at] = 0;
        at += 1;
    }
    value.write(buf, at, generation);
}

/// Insert a new entry for an absent hash: descend again, splitting any full
/// node on the way so the target leaf's ancestors always have room.
fn insert_new(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    kind: ValueKind,
    h: u32,
    key_bytes: Option<&[u8]>,
    value: NewValue,
) -> Result<u32> {
    let mut cur = container;
    let mut parent: Option<(u32, usize)> = None;
    for _ in 0..=TREE_HEIGHT_MAX {
        if NodeRef::at(&buf[..*position], cur)?.key_count() == KEY_COUNT_MAX {
            cur = match parent {
                None => {
                    split_root(buf, position, cur, kind)?;
                    cur
                }
                Some((p, ci)) => {
                    let (promoted, sibling) = split_child(buf, position, p, ci, kind)?;
                    match h.cmp(&promoted) {
                        Ordering::Less => cur,
                        Ordering::Greater => sibling,
                        // The probed hash equals an existing key's hash:
                        // surface the collision so the probe loop retries.
                        Ordering::Equal => return Err(Status::KeyHashCollision),
                    }
                }
            };
        }

        let n = NodeRef::at(&buf[..*position], cur)?;
        let kc = n.key_count();
        let mut i = kc;
        for j in 0..kc {
            let hj = n.hash(j);
            if hj == h {
                return Err(Status::KeyHashCollision);
            }
            if hj > h {
                i = j;
                break;
            }
        }
        if n.is_leaf() {
            return insert_at_leaf(buf, position, container, cur, i, h, key_bytes, value);
        }
        let child = n.child_offset(i);
        if child == 0 {
            return Err(Status::NodeWalksOffsetOutOfBounds);
        }
        parent = Some((cur, i));
        cur = child;
    }
    Err(Status::NodeWalksExceededTreeHeightMax)
}

/// Write the entry at the frontier and link it into slot `i` of `leaf`.
#[allow(clippy::too_many_arguments)]
fn insert_at_leaf(
    buf: &mut [u8],
    position: &mut usize,
    container: u32,
    leaf: u32,
    i: usize,
    h: u32,
    key_bytes: Option<&[u8]>,
    value: NewValue,
) -> Result<u32> {
    let prefix = match key_bytes {
        Some(k) => {
            let key_size = k.len() + 1;
            crate::tag::key_tag_width(key_size as u32) + key_size
        }
        None => 0,
    };
    let pad = if value.is_node() {
        align_up(*position + prefix) - (*position + prefix)
    } else {
        0
    };
    let entry = *position + pad;
    let value_size = value.encoded_size();
    if entry + prefix + value_size > buf.len() {
        return Err(Status::InsufficientBuffer);
    }
    let generation = buffer::generation(&buf[..*position])?;

    zero(buf, *position, entry);
    write_entry(buf, entry, key_bytes, value, generation);

    let kc = NodeRef::at(&buf[..*position], leaf)?.key_count();
    node::shift_slots_right(buf, leaf, i, kc);
    node::set_hash(buf, leaf, i, h);
    node::set_kv_offset(buf, leaf, i, entry as u32);
    node::set_key_count(buf, leaf, kc + 1);

    let size = NodeRef::at(&buf[..*position], container)?.size();
    node::set_size(buf, container, size + 1);
    *position = entry + prefix + value_size;
    buffer::bump_generation(buf);
    Ok((entry + prefix) as u32)
}

/// Split a full container root in place: cut two sibling nodes, move the
/// root's halves into them, and keep the promoted middle key in the root so
/// the container's offset never changes.
fn split_root(buf: &mut [u8], position: &mut usize, root: u32, kind: ValueKind) -> Result<()> {
    let start = align_up(*position);
    if start + 2 * NODE_SIZE > buf.len() {
        return Err(Status::InsufficientBuffer);
    }
    let generation = buffer::generation(&buf[..*position])?;
    let left = start as u32;
    let right = (start + NODE_SIZE) as u32;
    trace!("root split at {root:#x}: siblings {left:#x}/{right:#x}");

    zero(buf, *position, start);
    node::init_node(buf, left, kind, generation);
    node::init_node(buf, right, kind, generation);

    let r = NodeRef::at(&buf[..*position], root)?;
    let mut hashes = [0u32; SLOTS];
    let mut kvs = [0u32; SLOTS];
    let mut children = [0u32; CHILD_SLOTS];
    for i in 0..SLOTS {
        hashes[i] = r.hash(i);
        kvs[i] = r.kv_offset(i);
    }
    for i in 0..CHILD_SLOTS {
        children[i] = r.child_offset(i);
    }

    for i in 0..KEY_COUNT_MIN {
        node::set_hash(buf, left, i, hashes[i]);
        node::set_kv_offset(buf, left, i, kvs[i]);
        node::set_hash(buf, right, i, hashes[KEY_COUNT_MIN + 1 + i]);
        node::set_kv_offset(buf, right, i, kvs[KEY_COUNT_MIN + 1 + i]);
    }
    for i in 0..=KEY_COUNT_MIN {
        node::set_child_offset(buf, left, i, children[i]);
        node::set_child_offset(buf, right, i, children[KEY_COUNT_MIN + 1 + i]);
    }
    node::set_key_count(buf, left, KEY_COUNT_MIN);
    node::set_key_count(buf, right, KEY_COUNT_MIN);

    for i in 0..SLOTS {
        node::set_hash(buf, root, i, 0);
        node::set_kv_offset(buf, root, i, 0);
    }
    for i in 0..CHILD_SLOTS {
        node::set_child_offset(buf, root, i, 0);
    }
    node::set_hash(buf, root, 0, hashes[KEY_COUNT_MIN]);
    node::set_kv_offset(buf, root, 0, kvs[KEY_COUNT_MIN]);
    node::set_child_offset(buf, root, 0, left);
    node::set_child_offset(buf, root, 1, right);
    node::set_key_count(buf, root, 1);

    *position = start + 2 * NODE_SIZE;
    buffer::bump_generation(buf);
    Ok(())
}

/// Split the full child at `parent.child_offsets[ci]`, promoting its middle
/// key into the parent (which has room). Returns the promoted hash and the
/// new sibling's offset.
fn split_child(
    buf: &mut [u8],
    position: &mut usize,
    parent: u32,
    ci: usize,
    kind: ValueKind,
) -> Result<(u32, u32)> {
    let start = align_up(*position);
    if start + NODE_SIZE > buf.len() {
        return Err(Status::InsufficientBuffer);
    }
    let generation = buffer::generation(&buf[..*position])?;
    let child = NodeRef::at(&buf[..*position], parent)?.child_offset(ci);
    let sibling = start as u32;
    trace!("child split at {child:#x}: sibling {sibling:#x}");

    zero(buf, *position, start);
    node::init_node(buf, sibling, kind, generation);

    let c = NodeRef::at(&buf[..*position], child)?;
    let promoted_h = c.hash(KEY_COUNT_MIN);
    let promoted_kv = c.kv_offset(KEY_COUNT_MIN);
    let mut hashes = [0u32; SLOTS];
    let mut kvs = [0u32; SLOTS];
    let mut children = [0u32; CHILD_SLOTS];
    for i in 0..SLOTS {
        hashes[i] = c.hash(i);
        kvs[i] = c.kv_offset(i);
    }
    for i in 0..CHILD_SLOTS {
        children[i] = c.child_offset(i);
    }

    for i in 0..KEY_COUNT_MIN {
        node::set_hash(buf, sibling, i, hashes[KEY_COUNT_MIN + 1 + i]);
        node::set_kv_offset(buf, sibling, i, kvs[KEY_COUNT_MIN + 1 + i]);
    }
    for i in 0..=KEY_COUNT_MIN {
        node::set_child_offset(buf, sibling, i, children[KEY_COUNT_MIN + 1 + i]);
    }
    node::set_key_count(buf, sibling, KEY_COUNT_MIN);

    for i in KEY_COUNT_MIN..SLOTS {
        node::set_hash(buf, child, i, 0);
        node::set_kv_offset(buf, child, i, 0);
    }
    for i in KEY_COUNT_MIN + 1..CHILD_SLOTS {
        node::set_child_offset(buf, child, i, 0);
    }
    node::set_key_count(buf, child, KEY_COUNT_MIN);

    let pkc = NodeRef::at(&buf[..*position], parent)?.key_count();
    node::shift_slots_right(buf, parent, ci, pkc);
    node::set_hash(buf, parent, ci, promoted_h);
    node::set_kv_offset(buf, parent, ci, promoted_kv);
    node::shift_children_right(buf, parent, ci + 1, pkc + 1);
    node::set_child_offset(buf, parent, ci + 1, sibling);
    node::set_key_count(buf, parent, pkc + 1);

    *position = start + NODE_SIZE;
    buffer::bump_generation(buf);
    Ok((promoted_h, sibling))
}

/// Number of entries in the container at `container` (`size_kc >> 6` of
/// its root node).
pub fn count(live: &[u8], container: u32) -> Result<u32> {
    let root = container_at(live, container)?;
    if !root.kind()?.is_container() {
        return Err(Status::ExpectedArrayOrObject);
    }
    Ok(root.size())
}

/// Walk every node reachable from `container`, checking the structural
/// invariants: strictly ascending hashes, zeroed spare slots, leaf/child
/// consistency, hash-range nesting, entry and value bounds. Returns the
/// number of entries reachable.
pub fn validate_tree(live: &[u8], container: u32) -> Result<u32> {
    let root = container_at(live, container)?;
    let kind = root.kind()?;
    if !kind.is_container() {
        return Err(Status::ExpectedArrayOrObject);
    }
    let count = validate_node(live, kind, container, None, None, 0)?;
    if count != root.size() {
        return Err(Status::ValueOutOfBounds);
    }
    Ok(count)
}

fn validate_node(
    live: &[u8],
    kind: ValueKind,
    offset: u32,
    lower: Option<u32>,
    upper: Option<u32>,
    depth: usize,
) -> Result<u32> {
    if depth > TREE_HEIGHT_MAX {
        return Err(Status::NodeWalksExceededTreeHeightMax);
    }
    let n = NodeRef::at(live, offset)?;
    if n.kind()? != kind {
        return Err(Status::ValueKindInvalid);
    }
    let kc = n.key_count();
    let mut count = 0u32;

    let mut prev: Option<u32> = lower;
    for i in 0..kc {
        let h = n.hash(i);
        if let Some(p) = prev {
            if h <= p {
                return Err(Status::ValueOutOfBounds);
            }
        }
        if let Some(u) = upper {
            if h >= u {
                return Err(Status::ValueOutOfBounds);
            }
        }
        prev = Some(h);
        let (_, value_off) = entry_parts(live, kind, n.kv_offset(i))?;
        stored_size(live, value_off)?;
        if ValueKind::from_byte(live[value_off as usize])?.is_container() {
            // Nested containers are roots of their own trees.
            validate_tree(live, value_off)?;
        }
        count += 1;
    }
    for i in kc..SLOTS {
        if n.hash(i) != 0 || n.kv_offset(i) != 0 {
            return Err(Status::ValueOutOfBounds);
        }
    }

    if n.is_leaf() {
        for i in 0..CHILD_SLOTS {
            if n.child_offset(i) != 0 {
                return Err(Status::ValueOutOfBounds);
            }
        }
        return Ok(count);
    }
    for i in 0..=kc {
        let child = n.child_offset(i);
        if child == 0 {
            return Err(Status::ValueOutOfBounds);
        }
        let lo = if i == 0 { lower } else { Some(n.hash(i - 1)) };
        let hi = if i == kc { upper } else { Some(n.hash(i)) };
        count += validate_node(live, kind, child, lo, hi, depth + 1)?;
    }
    for i in kc + 1..CHILD_SLOTS {
        if n.child_offset(i) != 0 {
            return Err(Status::ValueOutOfBounds);
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::init_object;
    use crate::value::{TypedValue, ValueRef};

    fn setup(cap: usize) -> (Vec<u8>, usize) {
        let mut buf = vec![0xEEu8; cap];
        let mut position = 0;
        init_object(&mut buf, &mut position).unwrap();
        (buf, position)
    }

    fn set_i64(buf: &mut [u8], position: &mut usize, key: &str, v: i64) -> Result<SetOutcome> {
        set_value(
            buf,
            position,
            0,
            ProbeKey::Key(key.as_bytes()),
            NewValue::I64(v),
        )
    }

    fn get_i64(buf: &[u8], position: usize, key: &str) -> Result<i64> {
        let off = lookup(&buf[..position], 0, ProbeKey::Key(key.as_bytes()))?;
        match ValueRef::new(&buf[..position], off)?.typed()? {
            TypedValue::I64(n) => Ok(n),
            _ => Err(Status::ValueKindDoesNotMatch),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let (mut buf, mut position) = setup(4096);
        set_i64(&mut buf, &mut position, "alpha", 1).unwrap();
        set_i64(&mut buf, &mut position, "beta", 2).unwrap();
        assert_eq!(get_i64(&buf, position, "alpha").unwrap(), 1);
        assert_eq!(get_i64(&buf, position, "beta").unwrap(), 2);
        assert_eq!(
            get_i64(&buf, position, "gamma").unwrap_err(),
            Status::KeyNotFound
        );
        assert_eq!(validate_tree(&buf[..position], 0).unwrap(), 2);
    }

    #[test]
    fn test_overwrite_in_place_keeps_position() {
        let (mut buf, mut position) = setup(4096);
        set_i64(&mut buf, &mut position, "k", 1).unwrap();
        let frontier = position;
        let out = set_i64(&mut buf, &mut position, "k", 2).unwrap();
        assert!(!out.created);
        assert_eq!(position, frontier);
        assert_eq!(get_i64(&buf, position, "k").unwrap(), 2);
        assert_eq!(validate_tree(&buf[..position], 0).unwrap(), 1);
    }

    #[test]
    fn test_overwrite_larger_relocates_and_zeroes() {
        let (mut buf, mut position) = setup(4096);
        set_value(
            &mut buf,
            &mut position,
            0,
            ProbeKey::Key(b"k"),
            NewValue::Str("ab"),
        )
        .unwrap();
        let old_entry = NodeRef::at(&buf[..position], 0).unwrap().kv_offset(0);
        let frontier = position;
        set_value(
            &mut buf,
            &mut position,
            0,
            ProbeKey::Key(b"k"),
            NewValue::Str("a much longer replacement value"),
        )
        .unwrap();
        assert!(position > frontier);
        // The old entry bytes (key tag, key, value) were zeroed.
        let old_end = frontier;
        assert!(buf[old_entry as usize..old_end].iter().all(|&b| b == 0));
        let off = lookup(&buf[..position], 0, ProbeKey::Key(b"k")).unwrap();
        match ValueRef::new(&buf[..position], off).unwrap().typed().unwrap() {
            TypedValue::Str(s) => assert_eq!(s, "a much longer replacement value"),
            other => panic!("expected Str, got {other:?}"),
        }
    }

    #[test]
    fn test_split_preserves_all_keys() {
        let (mut buf, mut position) = setup(1 << 16);
        let keys: Vec<String> = (0..64).map(|i| format!("key{i:02}")).collect();
        for (i, k) in keys.iter().enumerate() {
            set_i64(&mut buf, &mut position, k, i as i64).unwrap();
            let n = validate_tree(&buf[..position], 0).unwrap();
            assert_eq!(n as usize, i + 1, "after inserting {k}");
        }
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(get_i64(&buf, position, k).unwrap(), i as i64);
        }
        // The root split: it is no longer a leaf.
        assert!(!NodeRef::at(&buf[..position], 0).unwrap().is_leaf());
    }

    #[test]
    fn test_colliding_keys_probe() {
        // djb2("ab") == djb2("bA").
        let (mut buf, mut position) = setup(4096);
        set_i64(&mut buf, &mut position, "ab", 1).unwrap();
        set_i64(&mut buf, &mut position, "bA", 2).unwrap();
        assert_eq!(get_i64(&buf, position, "ab").unwrap(), 1);
        assert_eq!(get_i64(&buf, position, "bA").unwrap(), 2);
        assert_eq!(validate_tree(&buf[..position], 0).unwrap(), 2);
        // The displaced key landed at the next probe slot.
        let root = NodeRef::at(&buf[..position], 0).unwrap();
        assert_eq!(root.hash(1), root.hash(0).wrapping_add(1));
    }

    #[test]
    fn test_insufficient_buffer_is_clean() {
        let (mut buf, mut position) = setup(128);
        // 32 spare bytes: too small for a key entry with an 80-byte string.
        let before = buf.clone();
        let frontier = position;
        let long = "x".repeat(80);
        let err = set_value(
            &mut buf,
            &mut position,
            0,
            ProbeKey::Key(b"k"),
            NewValue::Str(&long),
        )
        .unwrap_err();
        assert_eq!(err, Status::InsufficientBuffer);
        assert_eq!(position, frontier);
        assert_eq!(buf, before);
    }

    #[test]
    fn test_wrong_container_kind() {
        let (mut buf, mut position) = setup(1024);
        assert_eq!(
            set_value(&mut buf, &mut position, 0, ProbeKey::Append, NewValue::Null).unwrap_err(),
            Status::ExpectedArray
        );
        let live_len = position;
        assert_eq!(
            lookup(&buf[..live_len], 0, ProbeKey::Index(0)).unwrap_err(),
            Status::ExpectedArray
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        let (mut buf, mut position) = setup(1024);
        assert_eq!(
            set_value(&mut buf, &mut position, 0, ProbeKey::Key(b""), NewValue::Null).unwrap_err(),
            Status::ExpectedNonEmptyKey
        );
    }

    #[test]
    fn test_container_offset_checks() {
        let (buf, position) = setup(1024);
        assert_eq!(
            lookup(&buf[..position], 2, ProbeKey::Key(b"k")).unwrap_err(),
            Status::NodeOffsetNotAligned
        );
        assert_eq!(
            lookup(&buf[..position], 4096, ProbeKey::Key(b"k")).unwrap_err(),
            Status::StartOffsetOutOfBounds
        );
    }
}
