//! Node codec
//!
//! A node occupies one contiguous span of the blob:
//!
//! ```text
//! [counter: u64][name bytes][0x00][parent: u64][children: u64][child: u64] * children
//! ```
//!
//! All words are little-endian. The span length is never stored; it is
//! measured from the node start to one past its last child offset.

use std::ops::Range;

use crate::{LkmaError, Result};

/// Width of every integer field.
pub const WORD: usize = 8;

/// Field positions of one node, decoded with bounds checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    /// Offset of the node (its counter word)
    pub start: usize,

    /// Name length, terminator excluded
    pub name_len: usize,

    /// Number of child offsets
    pub children_count: usize,
}

impl NodeLayout {
    /// Decode the layout of the node starting at `start`.
    ///
    /// Every field, including the full child array, must lie inside `bytes`.
    pub fn decode(bytes: &[u8], start: usize) -> Result<Self> {
        let name_start = start
            .checked_add(WORD)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| LkmaError::corrupt(start, "counter runs past the end of the blob"))?;

        let name_len = bytes[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| LkmaError::corrupt(start, "name is not terminated"))?;

        let parent_at = name_start + name_len + 1;
        let count_at = parent_at + WORD;
        let children_at = count_at + WORD;
        if children_at > bytes.len() {
            return Err(LkmaError::corrupt(
                start,
                "parent or child count runs past the end of the blob",
            ));
        }

        let count = read_word(bytes, count_at);
        let children_count = usize::try_from(count)
            .map_err(|_| LkmaError::corrupt(start, format!("child count {} overflows", count)))?;
        let end = children_count
            .checked_mul(WORD)
            .and_then(|len| children_at.checked_add(len))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                LkmaError::corrupt(
                    start,
                    format!("{} child offsets run past the end of the blob", children_count),
                )
            })?;
        debug_assert!(end > start);

        Ok(Self {
            start,
            name_len,
            children_count,
        })
    }

    /// Offset of the counter word.
    #[inline]
    pub fn counter_at(&self) -> usize {
        self.start
    }

    /// Byte range of the name (terminator excluded).
    #[inline]
    pub fn name_range(&self) -> Range<usize> {
        let name_start = self.start + WORD;
        name_start..name_start + self.name_len
    }

    /// Offset of the parent word, right after the name terminator.
    #[inline]
    pub fn parent_at(&self) -> usize {
        self.start + WORD + self.name_len + 1
    }

    /// Offset of the first child offset.
    #[inline]
    pub fn children_at(&self) -> usize {
        self.parent_at() + 2 * WORD
    }

    /// Span length: node start to one past the last child offset.
    #[inline]
    pub fn size(&self) -> usize {
        self.children_at() + self.children_count * WORD - self.start
    }

    /// Offset of the next node in a linear scan.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.size()
    }

    /// Synthetic roots carry an empty name.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.name_len == 0
    }
}

/// Read the little-endian word at `at`. Callers guarantee the bounds.
#[inline]
pub(crate) fn read_word(bytes: &[u8], at: usize) -> u64 {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[at..at + WORD]);
    u64::from_le_bytes(word)
}

/// Convert a stored offset into a `usize`, rejecting values that cannot
/// address this platform's memory.
#[inline]
pub(crate) fn word_to_offset(word: u64, context: usize) -> Result<usize> {
    usize::try_from(word)
        .map_err(|_| LkmaError::corrupt(context, format!("offset {} overflows", word)))
}
