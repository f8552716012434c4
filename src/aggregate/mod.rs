//! Subtree aggregation
//!
//! Iterative DFS over an explicit worklist: the trie can be deep and the
//! report path may run where stack space is scarce, so there is no
//! recursion. The worklist is reused between calls.
//!
//! Counters are read with relaxed loads while writers keep updating them;
//! a total is an estimate of a moving target, not a linearizable sum.

use crate::stack::GrowableStack;
use crate::trie::{NodeHandle, TrieBlob};
use crate::{LkmaError, Result};

/// Computes subtree totals with a reusable DFS worklist.
#[derive(Debug)]
pub struct Aggregator {
    worklist: GrowableStack<NodeHandle>,
    initial_capacity: usize,
}

impl Aggregator {
    /// Create an aggregator whose worklist starts at `capacity` slots and
    /// may grow up to `max_entries`.
    pub fn new(capacity: usize, max_entries: Option<usize>) -> Self {
        Self {
            worklist: GrowableStack::bounded("aggregation stack", max_entries),
            initial_capacity: capacity,
        }
    }

    /// Sum of `self_count` over `node` and every node reachable through
    /// its children.
    ///
    /// A worklist growth failure aborts this sum with `OutOfMemory`; a
    /// partial total is never returned. The walk visits at most
    /// `trie.node_count()` nodes, which no acyclic trie exceeds; a blob whose
    /// child links loop is reported as `Corrupt`.
    pub fn subtree_total(&mut self, trie: &TrieBlob, node: NodeHandle) -> Result<u64> {
        self.worklist.clear();
        self.worklist.init(self.initial_capacity)?;

        let result = self.walk(trie, node);
        self.worklist.clear();
        result
    }

    fn walk(&mut self, trie: &TrieBlob, node: NodeHandle) -> Result<u64> {
        let budget = trie.node_count();
        let mut visited = 0usize;
        let mut sum = 0u64;

        self.worklist.push(node)?;
        while let Some(current) = self.worklist.pop() {
            visited += 1;
            if visited > budget {
                return Err(LkmaError::corrupt(
                    node.offset(),
                    "child links form a cycle",
                ));
            }

            sum = sum.saturating_add(trie.self_count(current));

            let children = trie.children_of(current);
            tracing::trace!(node = %current, children = children.len(), "visiting");
            for child in children {
                self.worklist.push(child?)?;
            }
        }

        Ok(sum)
    }

    /// Release the worklist storage.
    pub fn release(&mut self) {
        self.worklist.destroy();
    }
}
