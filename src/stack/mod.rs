//! Growable stack
//!
//! Backing storage doubles when a push finds the stack full. Growth is
//! fallible: when the reservation is refused (or a configured ceiling would
//! be crossed) the existing storage is kept exactly as it was and the push
//! reports `OutOfMemory`.
//!
//! Used for DFS worklists, path reconstruction and index construction.

use crate::config::DEFAULT_STACK_CAPACITY;
use crate::{LkmaError, Result};

/// Stack with doubling reallocation and explicit capacity bookkeeping.
#[derive(Debug)]
pub struct GrowableStack<T> {
    /// Stored items, top at the end
    data: Vec<T>,

    /// Reserved slots (what growth decisions are based on)
    capacity: usize,

    /// Largest capacity growth may reach
    max_entries: Option<usize>,

    /// Label used in allocation errors and logs
    label: &'static str,
}

impl<T> GrowableStack<T> {
    /// Create an uninitialized stack; the first push allocates
    /// [`DEFAULT_STACK_CAPACITY`] slots.
    pub fn new() -> Self {
        Self::bounded("stack", None)
    }

    /// Create an uninitialized stack whose capacity may never exceed
    /// `max_entries`.
    pub fn bounded(label: &'static str, max_entries: Option<usize>) -> Self {
        Self {
            data: Vec::new(),
            capacity: 0,
            max_entries,
            label,
        }
    }

    /// Create a stack with `capacity` slots reserved up front.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut stack = Self::new();
        stack.init(capacity)?;
        Ok(stack)
    }

    /// Reserve `capacity` slots for an empty stack.
    ///
    /// Items already on the stack are kept; a capacity smaller than the
    /// current one is a no-op.
    pub fn init(&mut self, capacity: usize) -> Result<()> {
        if capacity <= self.capacity {
            return Ok(());
        }
        self.grow_to(capacity)
    }

    /// Push an item, doubling the storage first if the stack is full.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.capacity == 0 {
            let initial = match self.max_entries {
                Some(max) => DEFAULT_STACK_CAPACITY.min(max),
                None => DEFAULT_STACK_CAPACITY,
            };
            self.init(initial.max(1))?;
        }

        if self.data.len() == self.capacity {
            let doubled = self
                .capacity
                .checked_mul(2)
                .ok_or_else(|| LkmaError::out_of_memory(self.label, usize::MAX))?;
            tracing::trace!(stack = self.label, capacity = doubled, "growing stack");
            self.grow_to(doubled)?;
        }

        self.data.push(item);
        Ok(())
    }

    /// Remove the top item; `None` when empty.
    pub fn pop(&mut self) -> Option<T> {
        self.data.pop()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Reserved slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every item but keep the storage for reuse.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Release the backing storage and return to the uninitialized state.
    pub fn destroy(&mut self) {
        self.data = Vec::new();
        self.capacity = 0;
    }

    /// Stored items, bottom first.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        if let Some(max) = self.max_entries {
            if new_capacity > max {
                tracing::warn!(
                    stack = self.label,
                    requested = new_capacity,
                    max,
                    "stack ceiling reached"
                );
                return Err(LkmaError::out_of_memory(self.label, new_capacity));
            }
        }

        // try_reserve_exact leaves the vector untouched when it fails
        let additional = new_capacity - self.data.len();
        self.data
            .try_reserve_exact(additional)
            .map_err(|_| LkmaError::out_of_memory(self.label, new_capacity))?;
        self.capacity = new_capacity;
        Ok(())
    }
}

impl<T> Default for GrowableStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_lazy_init_on_first_push() {
        let mut stack = GrowableStack::new();
        assert_eq!(stack.capacity(), 0);

        stack.push(7u32).unwrap();
        assert_eq!(stack.capacity(), DEFAULT_STACK_CAPACITY);
        assert_eq!(stack.pop(), Some(7));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_lifo_order() {
        let mut stack = GrowableStack::with_capacity(4).unwrap();
        for i in 0..10 {
            stack.push(i).unwrap();
        }
        let drained: Vec<_> = std::iter::from_fn(|| stack.pop()).collect();
        assert_eq!(drained, (0..10).rev().collect::<Vec<_>>());
        assert!(stack.is_empty());
    }

    #[test_case(1, 2 ; "from one slot")]
    #[test_case(4, 8 ; "from four slots")]
    #[test_case(40, 80 ; "from default")]
    fn test_doubling(initial: usize, expected: usize) {
        let mut stack = GrowableStack::with_capacity(initial).unwrap();
        for i in 0..=initial {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.capacity(), expected);
        assert_eq!(stack.len(), initial + 1);
    }

    #[test]
    fn test_failed_growth_keeps_storage() {
        let mut stack = GrowableStack::bounded("test stack", Some(4));
        for i in 0..4 {
            stack.push(i).unwrap();
        }
        assert_eq!(stack.capacity(), 4);

        let err = stack.push(4).unwrap_err();
        assert_eq!(err, LkmaError::out_of_memory("test stack", 8));
        assert_eq!(stack.capacity(), 4);
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.pop(), Some(3));
    }

    #[test]
    fn test_destroy_resets() {
        let mut stack = GrowableStack::with_capacity(8).unwrap();
        stack.push("a").unwrap();
        stack.destroy();
        assert!(stack.is_empty());
        assert_eq!(stack.capacity(), 0);

        stack.push("b").unwrap();
        assert_eq!(stack.capacity(), DEFAULT_STACK_CAPACITY);
    }
}
