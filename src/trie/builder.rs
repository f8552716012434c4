//! Trie encoder
//!
//! Produces blobs in the same layout the loader decodes. Nodes are laid out
//! in insertion order, so a parent always precedes its children.

use super::node::WORD;
use super::TrieBlob;
use crate::{LkmaError, Result};

/// Identifier of a node added to a [`TrieBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuilderNode(usize);

#[derive(Debug, Clone)]
struct PendingNode {
    counter: u64,
    name: Vec<u8>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl PendingNode {
    fn size(&self) -> usize {
        WORD + self.name.len() + 1 + 2 * WORD + self.children.len() * WORD
    }
}

/// Incremental encoder for synthetic tries.
#[derive(Debug, Clone, Default)]
pub struct TrieBuilder {
    nodes: Vec<PendingNode>,
}

/// Encoded blob plus its per-call-site offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTrie {
    /// Serialized nodes
    pub bytes: Vec<u8>,

    /// Offsets of every named node, in insertion order
    pub offsets: Vec<u64>,

    /// Offset of every node, indexed by [`BuilderNode`]
    node_offsets: Vec<u64>,
}

impl EncodedTrie {
    /// Offset assigned to a builder node.
    ///
    /// `None` for a node this encoding does not contain.
    pub fn offset_of(&self, node: BuilderNode) -> Option<usize> {
        let offset = *self.node_offsets.get(node.0)?;
        usize::try_from(offset).ok()
    }

    /// Validate and load the encoded blob.
    pub fn load(&self) -> Result<TrieBlob> {
        TrieBlob::load(self.bytes.clone(), &self.offsets)
    }
}

impl TrieBuilder {
    /// Start an empty trie.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Add a synthetic root (empty name, zero counter).
    pub fn root(&mut self) -> BuilderNode {
        self.push(PendingNode {
            counter: 0,
            name: Vec::new(),
            parent: None,
            children: Vec::new(),
        })
    }

    /// Add a named call-site under `parent`.
    pub fn node(
        &mut self,
        parent: BuilderNode,
        name: impl AsRef<[u8]>,
        counter: u64,
    ) -> Result<BuilderNode> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(LkmaError::InvalidInput(
                "call-site names must not be empty".to_string(),
            ));
        }
        if name.contains(&0) {
            return Err(LkmaError::InvalidInput(format!(
                "call-site name {:?} contains a NUL byte",
                String::from_utf8_lossy(name)
            )));
        }
        if parent.0 >= self.nodes.len() {
            return Err(LkmaError::InvalidInput(format!(
                "unknown parent node {}",
                parent.0
            )));
        }

        let id = self.push(PendingNode {
            counter,
            name: name.to_vec(),
            parent: Some(parent.0),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id.0);
        Ok(id)
    }

    /// Number of nodes added so far.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no node has been added.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: PendingNode) -> BuilderNode {
        self.nodes.push(node);
        BuilderNode(self.nodes.len() - 1)
    }

    /// Serialize every node.
    pub fn build(&self) -> EncodedTrie {
        let mut node_offsets = Vec::with_capacity(self.nodes.len());
        let mut next = 0u64;
        for node in &self.nodes {
            node_offsets.push(next);
            next += node.size() as u64;
        }

        let mut bytes = Vec::with_capacity(next as usize);
        let mut offsets = Vec::new();
        for (id, node) in self.nodes.iter().enumerate() {
            bytes.extend_from_slice(&node.counter.to_le_bytes());
            bytes.extend_from_slice(&node.name);
            bytes.push(0);

            // Roots point at themselves; the field is never followed
            let parent = node.parent.map_or(node_offsets[id], |p| node_offsets[p]);
            bytes.extend_from_slice(&parent.to_le_bytes());
            bytes.extend_from_slice(&(node.children.len() as u64).to_le_bytes());
            for &child in &node.children {
                bytes.extend_from_slice(&node_offsets[child].to_le_bytes());
            }

            if !node.name.is_empty() {
                offsets.push(node_offsets[id]);
            }
        }

        EncodedTrie {
            bytes,
            offsets,
            node_offsets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_fields() {
        let mut builder = TrieBuilder::new();
        let root = builder.root();
        let net = builder.node(root, "net", 7).unwrap();
        let sock = builder.node(net, "socket.c", 4096).unwrap();
        let encoded = builder.build();
        let trie = encoded.load().unwrap();

        let net_h = trie.node(encoded.offset_of(net).unwrap()).unwrap();
        let sock_h = trie.node(encoded.offset_of(sock).unwrap()).unwrap();

        assert_eq!(trie.name_of(sock_h), b"socket.c");
        assert_eq!(trie.self_count(sock_h), 4096);
        assert_eq!(trie.parent_of(sock_h).unwrap(), net_h);
        assert_eq!(trie.size_of(sock_h), 8 + 8 + 1 + 8 + 8);
        assert_eq!(
            trie.children_of(net_h).map(|c| c.unwrap()).collect::<Vec<_>>(),
            vec![sock_h]
        );
        assert_eq!(encoded.offsets.len(), 2);
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut builder = TrieBuilder::new();
        let root = builder.root();
        assert!(builder.node(root, "", 0).is_err());
        assert!(builder.node(root, b"a\0b", 0).is_err());
        assert!(builder.node(BuilderNode(9), "x", 0).is_err());
    }

    #[test]
    fn test_offsets_follow_sizes() {
        let mut builder = TrieBuilder::new();
        let root = builder.root();
        let a = builder.node(root, "a", 0).unwrap();
        let encoded = builder.build();

        // root: 8 + 0 + 1 + 8 + 8 + 8 (one child)
        assert_eq!(encoded.offset_of(root), Some(0));
        assert_eq!(encoded.offset_of(a), Some(33));
        assert_eq!(encoded.offset_of(BuilderNode(5)), None);
        assert_eq!(encoded.bytes.len(), 33 + 8 + 1 + 1 + 16);
    }
}
