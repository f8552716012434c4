//! Report buffer and line rendering
//!
//! The buffer tracks `size` (bytes written) and `capacity` (bytes reserved)
//! explicitly. Every append grows first, doubling until the pending bytes
//! fit, and only then writes; nothing is ever written and truncated after.

mod render;

pub use render::{path_of, render_path};

use crate::{LkmaError, Result};

/// Growable output buffer for one report.
#[derive(Debug)]
pub struct ReportBuffer {
    /// Rendered bytes, `data.len()` is the size
    data: Vec<u8>,

    /// Reserved bytes
    capacity: usize,

    /// Largest capacity growth may reach
    max_bytes: Option<usize>,
}

impl ReportBuffer {
    /// Reserve `capacity` bytes up front.
    pub fn with_capacity(capacity: usize, max_bytes: Option<usize>) -> Result<Self> {
        let mut buffer = Self {
            data: Vec::new(),
            capacity: 0,
            max_bytes,
        };
        buffer.grow_to(capacity.max(1))?;
        Ok(buffer)
    }

    /// Bytes written so far.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes reserved.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still free before the next growth.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Rendered content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the rendered content.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Make room for `additional` more bytes, doubling as often as needed.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let needed = self
            .data
            .len()
            .checked_add(additional)
            .ok_or_else(|| LkmaError::out_of_memory("report buffer", usize::MAX))?;
        if needed <= self.capacity {
            return Ok(());
        }

        let mut target = self.capacity.max(1);
        while target < needed {
            target = target
                .checked_mul(2)
                .ok_or_else(|| LkmaError::out_of_memory("report buffer", usize::MAX))?;
        }
        tracing::debug!(from = self.capacity, to = target, "growing report buffer");
        self.grow_to(target)
    }

    /// Append raw bytes, growing first.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        debug_assert!(self.data.len() <= self.capacity);
        Ok(())
    }

    fn grow_to(&mut self, target: usize) -> Result<()> {
        if let Some(max) = self.max_bytes {
            if target > max {
                tracing::error!(requested = target, max, "report buffer ceiling reached");
                return Err(LkmaError::out_of_memory("report buffer", target));
            }
        }
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| LkmaError::out_of_memory("report buffer", target))?;
        self.capacity = target;
        Ok(())
    }
}
