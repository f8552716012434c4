//! Analyzer configuration
//!
//! Capacities mirror the defaults the report path has always used: a 2000
//! byte report buffer and 40-entry traversal stacks, both doubling on demand.
//! [`Limits`] put a ceiling on that growth so allocation failure can be
//! reproduced deterministically.

use crate::{LkmaError, Result};

/// Initial report buffer capacity in bytes.
pub const DEFAULT_REPORT_CAPACITY: usize = 2000;

/// Initial capacity of traversal and path stacks.
pub const DEFAULT_STACK_CAPACITY: usize = 40;

/// How call-site lines are valued when no filter is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FullDumpMode {
    /// Sum of the node's whole subtree.
    #[default]
    Aggregate,
    /// The node's own counter only.
    SelfOnly,
}

/// Growth ceilings standing in for host allocation failure.
///
/// `None` means unbounded: growth then only fails if the global allocator
/// refuses the reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum report buffer capacity in bytes.
    pub max_report_bytes: Option<usize>,
    /// Maximum entries in any traversal or path stack.
    pub max_stack_entries: Option<usize>,
    /// Maximum entries in the call-site index.
    pub max_index_entries: Option<usize>,
}

impl Limits {
    /// No ceilings at all.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// Configuration for [`MemoryAnalyzer`](crate::MemoryAnalyzer).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnalyzerConfig {
    /// Initial report buffer capacity.
    pub report_capacity: usize,

    /// Initial stack capacity for traversals.
    pub stack_capacity: usize,

    /// Value rendered for call-site lines of an unfiltered report.
    pub full_dump_mode: FullDumpMode,

    /// Allocation ceilings.
    pub limits: Limits,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            report_capacity: DEFAULT_REPORT_CAPACITY,
            stack_capacity: DEFAULT_STACK_CAPACITY,
            full_dump_mode: FullDumpMode::Aggregate,
            limits: Limits::unbounded(),
        }
    }
}

impl AnalyzerConfig {
    /// Set the initial report buffer capacity.
    pub fn with_report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity;
        self
    }

    /// Set the initial traversal stack capacity.
    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity;
        self
    }

    /// Choose how unfiltered call-site lines are valued.
    pub fn with_full_dump_mode(mut self, mode: FullDumpMode) -> Self {
        self.full_dump_mode = mode;
        self
    }

    /// Install allocation ceilings.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Reject configurations that could never make progress.
    pub fn validate(&self) -> Result<()> {
        if self.report_capacity == 0 {
            return Err(LkmaError::InvalidInput(
                "report capacity must be > 0".to_string(),
            ));
        }
        if self.stack_capacity == 0 {
            return Err(LkmaError::InvalidInput(
                "stack capacity must be > 0".to_string(),
            ));
        }
        if let Some(max) = self.limits.max_stack_entries {
            if max < self.stack_capacity {
                return Err(LkmaError::InvalidInput(format!(
                    "stack ceiling {} is below the initial capacity {}",
                    max, self.stack_capacity
                )));
            }
        }
        if let Some(max) = self.limits.max_report_bytes {
            if max < self.report_capacity {
                return Err(LkmaError::InvalidInput(format!(
                    "report ceiling {} is below the initial capacity {}",
                    max, self.report_capacity
                )));
            }
        }
        Ok(())
    }
}
