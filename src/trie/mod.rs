//! Trie blob arena
//!
//! The blob is a flat, immutable forest of call-site nodes. A node is
//! identified by its byte offset; [`NodeHandle`]s are only handed out for
//! offsets that were validated as node starts, so decoding never reads
//! outside the arena.
//!
//! The counter word of each node is the value at load time. Live values sit
//! in a parallel array of atomics that host writers bump with
//! [`TrieBlob::charge`] and [`TrieBlob::release`] while reports read them
//! with relaxed loads. A report therefore sees a snapshot-ish estimate, not
//! a linearizable total.

mod builder;
mod node;

pub use builder::{BuilderNode, EncodedTrie, TrieBuilder};
pub use node::{NodeLayout, WORD};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bitvec::prelude::*;
use node::{read_word, word_to_offset};

use crate::{LkmaError, Result};

/// Validated reference to a node of one [`TrieBlob`].
///
/// Handles are only meaningful for the blob that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle {
    offset: usize,
    ordinal: usize,
}

impl NodeHandle {
    /// Byte offset of the node inside the blob.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Position of the node in a linear scan of the blob.
    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.offset)
    }
}

/// Immutable trie blob plus live per-node counters.
pub struct TrieBlob {
    /// Raw serialization, never mutated after load
    bytes: Box<[u8]>,

    /// Decoded layouts in scan order (ascending start)
    layouts: Vec<NodeLayout>,

    /// Live counters, one per layout
    counters: Box<[AtomicU64]>,

    /// One past the last scanned node
    extent: usize,

    /// Hash of the structural bytes, used to detect stale indexes
    fingerprint: blake3::Hash,
}

impl fmt::Debug for TrieBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrieBlob")
            .field("len", &self.bytes.len())
            .field("extent", &self.extent)
            .field("nodes", &self.layouts.len())
            .field("fingerprint", &self.fingerprint.to_hex().as_str())
            .finish()
    }
}

impl TrieBlob {
    /// Validate `bytes` and build the arena.
    ///
    /// `offsets` is the externally maintained per-call-site offset table. Its
    /// largest entry locates the last node; that node's span ends the trie.
    /// Every node in `[0, extent)` is decoded, and every child offset, every
    /// named node's parent offset and every table offset must be the start
    /// of a scanned node.
    pub fn load(bytes: impl Into<Box<[u8]>>, offsets: &[u64]) -> Result<Self> {
        let bytes = bytes.into();

        let extent = Self::extent_of(&bytes, offsets)?;

        let mut layouts = Vec::new();
        let mut starts = bitvec![0; extent];
        let mut offset = 0usize;
        while offset < extent {
            let layout = NodeLayout::decode(&bytes, offset)?;
            starts.set(offset, true);
            offset = layout.end();
            layouts.push(layout);
        }
        if offset != extent {
            return Err(LkmaError::corrupt(
                offset,
                format!("linear scan overshoots the trie extent {}", extent),
            ));
        }

        let is_start = |target: usize| target < extent && starts[target];

        for layout in &layouts {
            for i in 0..layout.children_count {
                let at = layout.children_at() + i * WORD;
                let child = word_to_offset(read_word(&bytes, at), layout.start)?;
                if !is_start(child) {
                    return Err(LkmaError::corrupt(
                        layout.start,
                        format!("child offset {} is not a node", child),
                    ));
                }
            }
            if !layout.is_root() {
                let parent = word_to_offset(read_word(&bytes, layout.parent_at()), layout.start)?;
                if !is_start(parent) {
                    return Err(LkmaError::corrupt(
                        layout.start,
                        format!("parent offset {} is not a node", parent),
                    ));
                }
            }
        }

        for &raw in offsets {
            let target = word_to_offset(raw, 0)?;
            if !is_start(target) {
                return Err(LkmaError::corrupt(
                    target,
                    "offset table entry is not a node",
                ));
            }
        }

        let counters = layouts
            .iter()
            .map(|layout| AtomicU64::new(read_word(&bytes, layout.counter_at())))
            .collect();
        let fingerprint = blake3::hash(&bytes[..extent]);

        tracing::debug!(
            extent,
            nodes = layouts.len(),
            fingerprint = %fingerprint.to_hex(),
            "trie loaded"
        );

        Ok(Self {
            bytes,
            layouts,
            counters,
            extent,
            fingerprint,
        })
    }

    fn extent_of(bytes: &[u8], offsets: &[u64]) -> Result<usize> {
        if bytes.is_empty() {
            if let Some(&first) = offsets.first() {
                return Err(LkmaError::corrupt(
                    word_to_offset(first, 0)?,
                    "offset table refers into an empty blob",
                ));
            }
            return Ok(0);
        }

        let last = offsets.iter().copied().max().unwrap_or(0);
        let last = word_to_offset(last, 0)?;
        Ok(NodeLayout::decode(bytes, last)?.end())
    }

    /// Resolve a raw offset into a handle.
    pub fn node(&self, offset: usize) -> Result<NodeHandle> {
        self.layouts
            .binary_search_by_key(&offset, |layout| layout.start)
            .map(|ordinal| NodeHandle { offset, ordinal })
            .map_err(|_| LkmaError::corrupt(offset, "offset is not a node start"))
    }

    /// The node at offset 0, if the blob is not empty.
    pub fn first(&self) -> Option<NodeHandle> {
        self.layouts.first().map(|layout| NodeHandle {
            offset: layout.start,
            ordinal: 0,
        })
    }

    /// Every node in scan order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.layouts
            .iter()
            .enumerate()
            .map(|(ordinal, layout)| NodeHandle {
                offset: layout.start,
                ordinal,
            })
    }

    /// Decoded layout of `node`.
    #[inline]
    pub fn layout(&self, node: NodeHandle) -> &NodeLayout {
        &self.layouts[node.ordinal]
    }

    /// Zero-copy view of the node's name.
    #[inline]
    pub fn name_of(&self, node: NodeHandle) -> &[u8] {
        &self.bytes[self.layout(node).name_range()]
    }

    /// True for synthetic roots (empty name).
    #[inline]
    pub fn is_root(&self, node: NodeHandle) -> bool {
        self.layout(node).is_root()
    }

    /// Parent of `node`. Roots carry no meaningful parent and callers stop
    /// before asking for it.
    pub fn parent_of(&self, node: NodeHandle) -> Result<NodeHandle> {
        let raw = read_word(&self.bytes, self.layout(node).parent_at());
        self.node(word_to_offset(raw, node.offset)?)
    }

    /// Children of `node`; the count is read once.
    pub fn children_of(&self, node: NodeHandle) -> Children<'_> {
        let layout = self.layout(node);
        Children {
            trie: self,
            parent: node.offset,
            next: layout.children_at(),
            remaining: layout.children_count,
        }
    }

    /// Span length of `node` in bytes.
    #[inline]
    pub fn size_of(&self, node: NodeHandle) -> usize {
        self.layout(node).size()
    }

    /// Bytes currently attributed to this exact call-site.
    ///
    /// Relaxed load: concurrent writers may make the value momentarily
    /// stale, never torn.
    #[inline]
    pub fn self_count(&self, node: NodeHandle) -> u64 {
        self.counters[node.ordinal].load(Ordering::Relaxed)
    }

    /// Attribute `bytes` more to `node`.
    pub fn charge(&self, node: NodeHandle, bytes: u64) {
        self.counters[node.ordinal].fetch_add(bytes, Ordering::Relaxed);
    }

    /// Return `bytes` previously attributed to `node`, saturating at zero.
    pub fn release(&self, node: NodeHandle, bytes: u64) {
        let _ = self.counters[node.ordinal].fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |current| Some(current.saturating_sub(bytes)),
        );
    }

    /// Number of scanned nodes.
    pub fn node_count(&self) -> usize {
        self.layouts.len()
    }

    /// One past the last scanned node.
    pub fn extent(&self) -> usize {
        self.extent
    }

    /// Raw serialization.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hash of `[0, extent)` as loaded.
    pub fn fingerprint(&self) -> &blake3::Hash {
        &self.fingerprint
    }
}

/// Child handles of one node, decoded lazily from the blob.
#[derive(Debug, Clone)]
pub struct Children<'a> {
    trie: &'a TrieBlob,
    parent: usize,
    next: usize,
    remaining: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<NodeHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let raw = read_word(&self.trie.bytes, self.next);
        self.next += WORD;
        self.remaining -= 1;
        Some(
            word_to_offset(raw, self.parent).and_then(|offset| self.trie.node(offset)),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Children<'_> {}
