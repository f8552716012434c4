#[path = "common/mod.rs"]
mod common;

use common::assert_snapshot;
use lkma::{AnalyzerConfig, FullDumpMode};
use test_helpers::*;

#[test]
fn full_dump_matches_golden() {
    let analyzer = analyzer_for(&kernel_trie(), AnalyzerConfig::default());
    assert_snapshot("reports/full_dump.txt", &drain(&analyzer, 4096));
}

#[test]
fn self_only_dump_matches_golden() {
    let config = AnalyzerConfig::default().with_full_dump_mode(FullDumpMode::SelfOnly);
    let analyzer = analyzer_for(&kernel_trie(), config);
    assert_snapshot("reports/self_only.txt", &drain(&analyzer, 4096));
}

#[test]
fn small_buffer_renders_the_same_report() {
    let config = AnalyzerConfig::default().with_report_capacity(1);
    let analyzer = analyzer_for(&kernel_trie(), config);
    assert_snapshot("reports/full_dump.txt", &drain(&analyzer, 3));
}
