//! Report line formatting
//!
//! Two line shapes, kept byte-for-byte compatible with existing consumers:
//!
//! ```text
//! <total, right-justified to 10>\t/<segment>/<segment>\n
//! <total, right-justified to 10>\t<component>\t[module]\n
//! ```

use super::ReportBuffer;
use crate::stack::GrowableStack;
use crate::trie::{NodeHandle, TrieBlob};
use crate::{LkmaError, Result};

/// Column width of the byte total.
const CALL_SITE_WIDTH: usize = 10;

/// Suffix marking component lines.
const COMPONENT_TAG: &str = "[module]";

/// Names from the root down to `node`, synthetic root excluded.
///
/// Parents are followed while the current name is non-empty; names are
/// stacked on the way up so popping yields root-to-leaf order.
pub fn path_of(
    trie: &TrieBlob,
    node: NodeHandle,
    max_entries: Option<usize>,
) -> Result<Vec<&[u8]>> {
    let mut stack = GrowableStack::bounded("path stack", max_entries);
    let mut current = node;
    let mut steps = 0usize;

    while !trie.is_root(current) {
        steps += 1;
        if steps > trie.node_count() {
            return Err(LkmaError::corrupt(node.offset(), "parent links form a cycle"));
        }
        stack.push(trie.name_of(current))?;
        current = trie.parent_of(current)?;
    }

    let mut path = Vec::with_capacity(stack.len());
    while let Some(name) = stack.pop() {
        path.push(name);
    }
    Ok(path)
}

/// `/seg/seg/...` for a root-to-leaf path.
pub fn render_path(path: &[&[u8]]) -> Vec<u8> {
    let len = path.iter().map(|segment| segment.len() + 1).sum();
    let mut rendered = Vec::with_capacity(len);
    for segment in path {
        rendered.push(b'/');
        rendered.extend_from_slice(segment);
    }
    rendered
}

impl ReportBuffer {
    /// Append one call-site line.
    pub fn append_line(&mut self, total: u64, path: &[&[u8]]) -> Result<()> {
        let head = format!("{:>width$}\t", total, width = CALL_SITE_WIDTH);
        let rendered = render_path(path);
        self.reserve(head.len() + rendered.len() + 1)?;
        self.append(head.as_bytes())?;
        self.append(&rendered)?;
        self.append(b"\n")
    }

    /// Append one component line.
    pub fn append_component_line(&mut self, name: &str, bytes: i64) -> Result<()> {
        let line = format!(
            "{:>width$}\t{}\t{}\n",
            bytes,
            name,
            COMPONENT_TAG,
            width = CALL_SITE_WIDTH
        );
        self.append(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trie::TrieBuilder;

    #[test]
    fn test_path_is_root_to_leaf() {
        let mut builder = TrieBuilder::new();
        let root = builder.root();
        let drivers = builder.node(root, "drivers", 0).unwrap();
        let net = builder.node(drivers, "net", 0).unwrap();
        let e1000 = builder.node(net, "e1000.c", 0).unwrap();
        let encoded = builder.build();
        let trie = encoded.load().unwrap();

        let leaf = trie.node(encoded.offset_of(e1000).unwrap()).unwrap();
        let path = path_of(&trie, leaf, None).unwrap();
        assert_eq!(path, vec![&b"drivers"[..], &b"net"[..], &b"e1000.c"[..]]);
        assert_eq!(render_path(&path), b"/drivers/net/e1000.c");

        let root_h = trie.node(encoded.offset_of(root).unwrap()).unwrap();
        assert!(path_of(&trie, root_h, None).unwrap().is_empty());
    }

    /// Two named nodes whose parent words point at each other.
    fn parent_cycle() -> Vec<u8> {
        let mut bytes = Vec::new();
        for (name, parent) in [(b'a', 26u64), (b'b', 0u64)] {
            bytes.extend_from_slice(&1u64.to_le_bytes());
            bytes.extend_from_slice(&[name, 0]);
            bytes.extend_from_slice(&parent.to_le_bytes());
            bytes.extend_from_slice(&0u64.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_parent_cycle_is_corrupt() {
        let trie = TrieBlob::load(parent_cycle(), &[0, 26]).unwrap();
        assert_eq!(trie.node_count(), 2);

        let a = trie.node(0).unwrap();
        let err = path_of(&trie, a, None).unwrap_err();
        assert!(matches!(err, LkmaError::Corrupt { offset: 0, .. }));
    }

    #[test]
    fn test_call_site_line_format() {
        let mut buffer = ReportBuffer::with_capacity(4, None).unwrap();
        buffer.append_line(175, &[&b"kernel"[..], &b"fork.c"[..]]).unwrap();
        assert_eq!(buffer.as_bytes(), b"       175\t/kernel/fork.c\n");
    }

    #[test]
    fn test_wide_totals_are_not_truncated() {
        let mut buffer = ReportBuffer::with_capacity(64, None).unwrap();
        buffer.append_line(12_345_678_901, &[&b"a.c"[..]]).unwrap();
        assert_eq!(buffer.as_bytes(), b"12345678901\t/a.c\n");
    }

    #[test]
    fn test_component_line_format() {
        let mut buffer = ReportBuffer::with_capacity(4, None).unwrap();
        buffer.append_component_line("ext4", 8192).unwrap();
        buffer.append_component_line("loop", -16).unwrap();
        assert_eq!(
            buffer.as_bytes(),
            b"      8192\text4\t[module]\n       -16\tloop\t[module]\n"
        );
    }
}
