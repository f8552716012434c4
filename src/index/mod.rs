//! Call-site index
//!
//! Every node of the trie, sorted by name. Built once per loaded blob; a
//! filter then costs one binary search plus a scan over the run of equal
//! names around the hit. Equal names come from distinct call-sites that
//! share a file name (`init.c` under several directories, for instance).
//!
//! The sort is unstable: the relative order of equal names is unspecified.

use std::cmp::Ordering;
use std::ops::Range;

use crate::stack::GrowableStack;
use crate::trie::{NodeHandle, TrieBlob};
use crate::{LkmaError, Result};

/// Sorted index of node handles.
#[derive(Debug, Clone)]
pub struct CallSiteIndex {
    entries: Vec<NodeHandle>,
    fingerprint: blake3::Hash,
}

impl CallSiteIndex {
    /// Collect every node of `trie` and sort by name.
    ///
    /// `max_entries` caps the collection; crossing it fails the whole build
    /// with `OutOfMemory` and nothing partial is returned.
    pub fn build(trie: &TrieBlob, max_entries: Option<usize>) -> Result<Self> {
        let mut collected = GrowableStack::bounded("call-site index", max_entries);
        for node in trie.nodes() {
            collected.push(node).map_err(|err| {
                tracing::error!(
                    name = %String::from_utf8_lossy(trie.name_of(node)),
                    offset = node.offset(),
                    "failed to add call-site to the index"
                );
                err
            })?;
        }

        let mut entries = collected.into_vec();
        entries.sort_unstable_by(|a, b| compare_names(trie.name_of(*a), trie.name_of(*b)));

        tracing::debug!(entries = entries.len(), "call-site index built");

        Ok(Self {
            entries,
            fingerprint: *trie.fingerprint(),
        })
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the trie had no nodes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle at sorted position `position`.
    pub fn get(&self, position: usize) -> Option<NodeHandle> {
        self.entries.get(position).copied()
    }

    /// All handles in name order.
    pub fn entries(&self) -> &[NodeHandle] {
        &self.entries
    }

    /// Whether this index was built from `trie`.
    ///
    /// Lookups against any other blob are meaningless.
    pub fn is_built_from(&self, trie: &TrieBlob) -> bool {
        self.fingerprint == *trie.fingerprint()
    }

    /// Binary search for `name`; any position of its equal run.
    pub fn lookup(&self, trie: &TrieBlob, name: &[u8]) -> Result<usize> {
        self.entries
            .binary_search_by(|entry| compare_names(trie.name_of(*entry), name))
            .map_err(|_| LkmaError::NotFound(String::from_utf8_lossy(name).into_owned()))
    }

    /// Positions sharing the name found at `position`.
    ///
    /// Scans outward and stops at the first mismatch on each side.
    pub fn equal_run(&self, trie: &TrieBlob, position: usize) -> Range<usize> {
        let Some(&hit) = self.entries.get(position) else {
            return position..position;
        };
        let name = trie.name_of(hit);

        let mut start = position;
        while start > 0 && trie.name_of(self.entries[start - 1]) == name {
            start -= 1;
        }
        let mut end = position + 1;
        while end < self.entries.len() && trie.name_of(self.entries[end]) == name {
            end += 1;
        }
        start..end
    }

    /// Names in index order.
    pub fn names<'t>(&'t self, trie: &'t TrieBlob) -> impl Iterator<Item = &'t [u8]> + 't {
        self.entries.iter().map(move |entry| trie.name_of(*entry))
    }
}

/// Three-way byte comparison of two names.
#[inline]
pub fn compare_names(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}
