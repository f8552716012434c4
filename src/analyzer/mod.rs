//! Analyzer context
//!
//! [`MemoryAnalyzer`] owns everything a report needs: the current snapshot
//! (trie + index), the filter and the component source. Nothing is global;
//! several analyzers, and several sessions per analyzer, coexist.
//!
//! Snapshots are versioned. [`MemoryAnalyzer::reload`] always rebuilds and
//! re-sorts the index for the new blob and bumps the generation; sessions
//! already rendering keep the snapshot they started with.

mod dispatch;
mod session;

pub use session::ReportSession;

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::components::ComponentSource;
use crate::config::{AnalyzerConfig, Limits};
use crate::filter::{parse_control, FilterState};
use crate::index::CallSiteIndex;
use crate::trie::TrieBlob;
use crate::Result;

/// A trie together with the index built from it.
#[derive(Debug)]
pub struct Snapshot {
    trie: Arc<TrieBlob>,
    index: CallSiteIndex,
    generation: u64,
}

impl Snapshot {
    /// Index `trie` under `generation`.
    pub fn build(trie: Arc<TrieBlob>, generation: u64, limits: &Limits) -> Result<Self> {
        let index = CallSiteIndex::build(&trie, limits.max_index_entries)?;
        Ok(Self {
            trie,
            index,
            generation,
        })
    }

    /// The loaded trie.
    pub fn trie(&self) -> &TrieBlob {
        &self.trie
    }

    /// The sorted call-site index.
    pub fn index(&self) -> &CallSiteIndex {
        &self.index
    }

    /// Reload counter; the first snapshot is generation 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    config: AnalyzerConfig,
    snapshot: RwLock<Arc<Snapshot>>,
    filter: Mutex<FilterState>,
    components: Arc<dyn ComponentSource>,
}

/// Report engine: snapshot, filter and components behind one handle.
#[derive(Debug, Clone)]
pub struct MemoryAnalyzer {
    shared: Arc<Shared>,
}

impl MemoryAnalyzer {
    /// Index `trie` and start with no filter.
    pub fn new(
        trie: Arc<TrieBlob>,
        components: Arc<dyn ComponentSource>,
        config: AnalyzerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let snapshot = Snapshot::build(trie, 1, &config.limits)?;
        tracing::debug!(
            nodes = snapshot.trie().node_count(),
            indexed = snapshot.index().len(),
            "analyzer ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                snapshot: RwLock::new(Arc::new(snapshot)),
                filter: Mutex::new(FilterState::NoFilter),
                components,
            }),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.shared.config
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.shared.snapshot.read())
    }

    /// Replace the trie, rebuilding the index. Returns the new generation.
    ///
    /// On failure the previous snapshot stays current.
    pub fn reload(&self, trie: Arc<TrieBlob>) -> Result<u64> {
        let index = CallSiteIndex::build(&trie, self.shared.config.limits.max_index_entries)?;

        let mut slot = self.shared.snapshot.write();
        let generation = slot.generation() + 1;
        *slot = Arc::new(Snapshot {
            trie,
            index,
            generation,
        });
        tracing::debug!(generation, "trie reloaded");
        Ok(generation)
    }

    /// Current filter.
    pub fn filter(&self) -> FilterState {
        self.shared.filter.lock().clone()
    }

    /// Handle a control write: a filter name, or `ALL` to clear it.
    ///
    /// Returns the number of bytes consumed. A failed write leaves the
    /// previous filter in place.
    pub fn write_control(&self, payload: &[u8]) -> Result<usize> {
        let command = parse_control(payload).map_err(|err| {
            tracing::error!(error = %err, "control write rejected");
            err
        })?;
        tracing::debug!(command = ?command, "control write");
        self.shared.filter.lock().apply(command);
        Ok(payload.len())
    }

    /// Start a report session; nothing is rendered until the first read.
    pub fn open_session(&self) -> ReportSession {
        ReportSession::new(Arc::clone(&self.shared))
    }

    /// Render a complete report in one go.
    pub fn render(&self) -> Result<Vec<u8>> {
        self.shared.generate().map(|buffer| buffer.into_bytes())
    }
}

impl Shared {
    fn generate(&self) -> Result<crate::report::ReportBuffer> {
        let snapshot = Arc::clone(&self.snapshot.read());
        let filter = self.filter.lock().clone();
        dispatch::generate(
            &snapshot,
            filter.name(),
            self.components.as_ref(),
            &self.config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ComponentRegistry;
    use crate::filter::FilterState;
    use crate::trie::TrieBuilder;
    use crate::LkmaError;

    fn trie(names: &[&str]) -> Arc<TrieBlob> {
        let mut builder = TrieBuilder::new();
        let root = builder.root();
        for (i, name) in names.iter().enumerate() {
            builder.node(root, name, (i as u64 + 1) * 10).unwrap();
        }
        Arc::new(builder.build().load().unwrap())
    }

    fn analyzer(names: &[&str]) -> MemoryAnalyzer {
        let components = Arc::new(ComponentRegistry::new());
        MemoryAnalyzer::new(trie(names), components, AnalyzerConfig::default()).unwrap()
    }

    #[test]
    fn test_write_control_transitions() {
        let analyzer = analyzer(&["a.c", "b.c"]);
        assert_eq!(analyzer.write_control(b"b.c\n").unwrap(), 4);
        assert_eq!(analyzer.filter().name(), Some(&b"b.c"[..]));

        let report = String::from_utf8(analyzer.render().unwrap()).unwrap();
        assert_eq!(report, "        20\t/b.c\n");

        analyzer.write_control(b"ALL").unwrap();
        assert_eq!(analyzer.filter(), FilterState::NoFilter);
        let report = String::from_utf8(analyzer.render().unwrap()).unwrap();
        assert_eq!(report.lines().count(), 2);
    }

    #[test]
    fn test_rejected_write_keeps_filter() {
        let analyzer = analyzer(&["a.c"]);
        analyzer.write_control(b"a.c").unwrap();
        let err = analyzer.write_control(b"\n").unwrap_err();
        assert!(matches!(err, LkmaError::InvalidInput(_)));
        assert_eq!(analyzer.filter().name(), Some(&b"a.c"[..]));
    }

    #[test]
    fn test_reload_bumps_generation() {
        let analyzer = analyzer(&["old.c"]);
        let before = analyzer.snapshot();
        assert_eq!(before.generation(), 1);

        let generation = analyzer.reload(trie(&["new.c"])).unwrap();
        assert_eq!(generation, 2);

        let report = String::from_utf8(analyzer.render().unwrap()).unwrap();
        assert!(report.contains("/new.c"));
        assert!(!report.contains("/old.c"));

        // The earlier snapshot is still intact for whoever holds it
        assert!(before.index().is_built_from(before.trie()));
        assert_eq!(before.index().len(), 2);
    }

    #[test]
    fn test_identical_reload_takes_new_counters() {
        let analyzer = analyzer(&["a.c"]);
        let fresh = trie(&["a.c"]);
        assert_eq!(analyzer.snapshot().trie().fingerprint(), fresh.fingerprint());

        let leaf = fresh.nodes().nth(1).unwrap();
        fresh.charge(leaf, 5);
        assert_eq!(analyzer.reload(fresh).unwrap(), 2);

        let report = String::from_utf8(analyzer.render().unwrap()).unwrap();
        assert_eq!(report, "        15\t/a.c\n");
    }

    #[test]
    fn test_failed_reload_keeps_snapshot() {
        let components = Arc::new(ComponentRegistry::new());
        let config = AnalyzerConfig::default().with_limits(Limits {
            max_index_entries: Some(2),
            ..Limits::default()
        });
        let analyzer = MemoryAnalyzer::new(trie(&["a.c"]), components, config).unwrap();

        let err = analyzer
            .reload(trie(&["a.c", "b.c", "c.c", "d.c"]))
            .unwrap_err();
        assert!(matches!(err, LkmaError::OutOfMemory { .. }));
        assert_eq!(analyzer.snapshot().generation(), 1);
        assert_eq!(analyzer.snapshot().index().len(), 2);
    }
}
