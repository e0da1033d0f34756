//! Tree-order iteration over a container's entries.
//!
//! [`IterCursor`] is the raw cursor form: plain data holding the creation
//! generation plus node and index stacks bounded by the maximum tree
//! height. Each `next` call takes the live region again and re-checks the
//! generation, so a cursor held across a mutation fails deterministically
//! with `InvalidIterator` instead of walking relocated bytes.
//!
//! Entries are emitted in hash order (index order for arrays); insertion
//! order is not preserved.

use crate::buffer::{self, TREE_HEIGHT_MAX};
use crate::node::NodeRef;
use crate::status::{Result, Status};
use crate::tag::ValueKind;
use crate::tree;
use crate::value::ValueRef;

/// One emitted entry: the key for objects (`None` for arrays) and a cursor
/// over the value.
#[derive(Debug)]
pub struct IterItem<'a> {
    pub key: Option<&'a str>,
    pub value: ValueRef<'a>,
}

/// A generation-checked iteration cursor over one container.
#[derive(Debug, Clone)]
pub struct IterCursor {
    generation: u32,
    kind: ValueKind,
    depth: usize,
    done: bool,
    descend_pending: bool,
    nodes: [u32; TREE_HEIGHT_MAX + 1],
    indices: [u8; TREE_HEIGHT_MAX + 1],
}

impl IterCursor {
    /// Create a cursor over the container at `container`.
    pub fn new(live: &[u8], container: u32) -> Result<Self> {
        let root = tree::container_at(live, container)?;
        let kind = root.kind()?;
        if !kind.is_container() {
            return Err(Status::ExpectedArrayOrObject);
        }
        let mut nodes = [0u32; TREE_HEIGHT_MAX + 1];
        nodes[0] = container;
        Ok(Self {
            generation: buffer::generation(live)?,
            kind,
            depth: 0,
            done: false,
            descend_pending: true,
            nodes,
            indices: [0; TREE_HEIGHT_MAX + 1],
        })
    }

    /// Advance to the next entry.
    ///
    /// # Errors
    ///
    /// `InvalidIterator` when the buffer has been mutated since the cursor
    /// was created.
    pub fn next<'a>(&mut self, live: &'a [u8]) -> Result<Option<IterItem<'a>>> {
        if buffer::generation(live)? != self.generation {
            return Err(Status::InvalidIterator);
        }
        if self.done {
            return Ok(None);
        }
        if self.descend_pending {
            loop {
                let n = NodeRef::at(live, self.nodes[self.depth])?;
                if n.is_leaf() {
                    break;
                }
                let child = n.child_offset(self.indices[self.depth] as usize);
                if child == 0 {
                    return Err(Status::NodeWalksOffsetOutOfBounds);
                }
                if self.depth + 1 > TREE_HEIGHT_MAX {
                    return Err(Status::NodeWalksExceededTreeHeightMax);
                }
                self.depth += 1;
                self.nodes[self.depth] = child;
                self.indices[self.depth] = 0;
            }
            self.descend_pending = false;
        }
        loop {
            let n = NodeRef::at(live, self.nodes[self.depth])?;
            let idx = self.indices[self.depth] as usize;
            if idx < n.key_count() {
                let entry = n.kv_offset(idx);
                self.indices[self.depth] += 1;
                self.descend_pending = !n.is_leaf();
                let (key_bytes, value_off) = tree::entry_parts(live, self.kind, entry)?;
                let key = match key_bytes {
                    Some(bytes) => Some(
                        std::str::from_utf8(bytes).map_err(|_| Status::ValueKindInvalid)?,
                    ),
                    None => None,
                };
                return Ok(Some(IterItem {
                    key,
                    value: ValueRef::new(live, value_off)?,
                }));
            }
            if self.depth == 0 {
                self.done = true;
                return Ok(None);
            }
            self.depth -= 1;
        }
    }
}

/// Borrowing iterator adapter over [`IterCursor`].
pub struct Iter<'a> {
    live: &'a [u8],
    cursor: IterCursor,
}

impl<'a> Iter<'a> {
    /// Create an iterator over the container at `container`.
    pub fn new(live: &'a [u8], container: u32) -> Result<Self> {
        Ok(Self {
            live,
            cursor: IterCursor::new(live, container)?,
        })
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<IterItem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next(self.live).transpose()
    }
}
