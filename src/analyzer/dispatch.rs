//! Report dispatch
//!
//! Without a filter every call-site (roots excepted) is rendered in index
//! order, followed by every component. With a filter, matching components
//! come first, then the run of equal call-site names around the binary
//! search hit: the hit itself, its left neighbours walking down, its right
//! neighbours walking up.
//!
//! A call-site whose total cannot be computed is left out of the report
//! rather than rendered with a partial sum. A buffer that cannot grow ends
//! the whole report.

use super::Snapshot;
use crate::aggregate::Aggregator;
use crate::components::ComponentSource;
use crate::config::{AnalyzerConfig, FullDumpMode};
use crate::report::{path_of, ReportBuffer};
use crate::trie::{NodeHandle, TrieBlob};
use crate::{LkmaError, Result};

/// Render one report.
pub(crate) fn generate(
    snapshot: &Snapshot,
    filter: Option<&[u8]>,
    components: &dyn ComponentSource,
    config: &AnalyzerConfig,
) -> Result<ReportBuffer> {
    debug_assert!(snapshot.index().is_built_from(snapshot.trie()));

    let mut renderer = Renderer {
        trie: snapshot.trie(),
        buffer: ReportBuffer::with_capacity(
            config.report_capacity,
            config.limits.max_report_bytes,
        )?,
        aggregator: Aggregator::new(config.stack_capacity, config.limits.max_stack_entries),
        config,
        skipped: 0,
    };

    match filter {
        None => renderer.dump_all(snapshot, components)?,
        Some(name) => renderer.apply_filter(snapshot, components, name)?,
    }

    renderer.aggregator.release();
    tracing::debug!(
        generation = snapshot.generation(),
        filtered = filter.is_some(),
        bytes = renderer.buffer.size(),
        skipped = renderer.skipped,
        "report generated"
    );
    Ok(renderer.buffer)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeValue {
    Subtree,
    SelfOnly,
}

struct Renderer<'a> {
    trie: &'a TrieBlob,
    buffer: ReportBuffer,
    aggregator: Aggregator,
    config: &'a AnalyzerConfig,
    skipped: usize,
}

impl Renderer<'_> {
    fn dump_all(&mut self, snapshot: &Snapshot, components: &dyn ComponentSource) -> Result<()> {
        let value = match self.config.full_dump_mode {
            FullDumpMode::Aggregate => NodeValue::Subtree,
            FullDumpMode::SelfOnly => NodeValue::SelfOnly,
        };
        for &node in snapshot.index().entries() {
            self.dump_node(node, value)?;
        }
        self.dump_components(components, None)
    }

    fn apply_filter(
        &mut self,
        snapshot: &Snapshot,
        components: &dyn ComponentSource,
        name: &[u8],
    ) -> Result<()> {
        self.dump_components(components, Some(name))?;

        let index = snapshot.index();
        let hit = match index.lookup(self.trie, name) {
            Ok(position) => position,
            Err(LkmaError::NotFound(_)) => {
                tracing::debug!(
                    filter = %String::from_utf8_lossy(name),
                    "filter matches no call-site"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let entries = index.entries();
        let run = index.equal_run(self.trie, hit);
        let order = std::iter::once(hit)
            .chain((run.start..hit).rev())
            .chain(hit + 1..run.end);
        for position in order {
            self.dump_node(entries[position], NodeValue::Subtree)?;
        }
        Ok(())
    }

    fn dump_node(&mut self, node: NodeHandle, value: NodeValue) -> Result<()> {
        if self.trie.is_root(node) {
            return Ok(());
        }

        let total = match value {
            NodeValue::SelfOnly => Ok(self.trie.self_count(node)),
            NodeValue::Subtree => self.aggregator.subtree_total(self.trie, node),
        };
        let line = total.and_then(|total| {
            path_of(self.trie, node, self.config.limits.max_stack_entries)
                .map(|path| (total, path))
        });

        match line {
            Ok((total, path)) => self.buffer.append_line(total, &path),
            Err(err) => {
                tracing::warn!(
                    node = %node,
                    name = %String::from_utf8_lossy(self.trie.name_of(node)),
                    error = %err,
                    "skipping call-site"
                );
                self.skipped += 1;
                Ok(())
            }
        }
    }

    fn dump_components(
        &mut self,
        components: &dyn ComponentSource,
        filter: Option<&[u8]>,
    ) -> Result<()> {
        let buffer = &mut self.buffer;
        components.for_each_component(&mut |component| {
            tracing::trace!(
                name = %component.name,
                bytes = component.attributed_bytes,
                "component"
            );
            match filter {
                Some(name) if component.name.as_bytes() != name => Ok(()),
                _ => buffer.append_component_line(&component.name, component.attributed_bytes),
            }
        })
    }
}
