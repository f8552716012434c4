//! # Memory-Usage Attribution Engine
//!
//! Decodes a compact, offset-linked serialization of allocation call-sites
//! (the *trie blob*), aggregates the bytes attributed to each call-site and
//! to each consuming component, and renders a filterable text report that a
//! reader drains in chunks.
//!
//! ## Pipeline
//!
//! 1. **Load**: the blob is validated once into a [`TrieBlob`] arena; node
//!    handles are checked byte offsets.
//! 2. **Index**: every node is collected into a [`CallSiteIndex`] sorted by
//!    name, so a filter is a binary search plus a scan over the equal run.
//! 3. **Aggregate**: subtree totals come from an explicit-stack DFS
//!    ([`Aggregator`]), never from recursion.
//! 4. **Render**: lines are appended into a [`ReportBuffer`] that grows
//!    before every write.
//!
//! ## Usage Example
//!
//! ```
//! use std::sync::Arc;
//! use lkma::{AnalyzerConfig, ComponentRegistry, MemoryAnalyzer, TrieBuilder};
//!
//! let mut builder = TrieBuilder::new();
//! let root = builder.root();
//! let mm = builder.node(root, "mm", 0).unwrap();
//! builder.node(mm, "slab.c", 4096).unwrap();
//! let trie = builder.build().load().unwrap();
//!
//! let components = Arc::new(ComponentRegistry::new());
//! let analyzer = MemoryAnalyzer::new(Arc::new(trie), components, AnalyzerConfig::default()).unwrap();
//! let report = analyzer.render().unwrap();
//! assert!(String::from_utf8(report).unwrap().contains("/mm/slab.c"));
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod stack;       // Growable stack with doubling reallocation
pub mod trie;        // Trie blob arena and node codec
pub mod index;       // Sorted call-site index
pub mod aggregate;   // Iterative subtree aggregation
pub mod report;      // Report buffer and line rendering
pub mod components;  // Host component registry boundary
pub mod filter;      // Filter state machine
pub mod analyzer;    // Dispatch, snapshots and report sessions
pub mod config;      // Analyzer configuration and allocation ceilings

// Re-exports for convenience
pub use stack::GrowableStack;
pub use trie::{EncodedTrie, NodeHandle, TrieBlob, TrieBuilder};
pub use index::CallSiteIndex;
pub use aggregate::Aggregator;
pub use report::ReportBuffer;
pub use components::{Component, ComponentRegistry, ComponentSource};
pub use filter::{ControlCommand, FilterState};
pub use analyzer::{MemoryAnalyzer, ReportSession, Snapshot};
pub use config::{AnalyzerConfig, FullDumpMode, Limits};

use thiserror::Error;

/// Errors produced while loading, indexing or reporting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LkmaError {
    /// Backing storage could not grow
    #[error("out of memory while growing {what} to capacity {requested}")]
    OutOfMemory {
        /// Structure that failed to grow
        what: &'static str,
        /// Capacity that was requested
        requested: usize,
    },

    /// Name absent from the call-site index
    #[error("'{0}' not found in the call-site index")]
    NotFound(String),

    /// Malformed control write or configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Trie blob failed validation at the given offset
    #[error("corrupt trie at offset {offset}: {reason}")]
    Corrupt {
        /// Byte offset where the problem was found
        offset: usize,
        /// What was wrong
        reason: String,
    },
}

impl LkmaError {
    /// Helper for constructing corruption errors.
    pub fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        LkmaError::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    /// Helper for constructing allocation failures.
    pub fn out_of_memory(what: &'static str, requested: usize) -> Self {
        LkmaError::OutOfMemory { what, requested }
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = LkmaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = LkmaError::corrupt(24, "name is not terminated");
        assert_eq!(
            err.to_string(),
            "corrupt trie at offset 24: name is not terminated"
        );

        let err = LkmaError::out_of_memory("report buffer", 4000);
        assert_eq!(
            err.to_string(),
            "out of memory while growing report buffer to capacity 4000"
        );
    }
}
