//! Capacity-Bounded FIFO Buffer

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO buffer; pushing into a full buffer drops the oldest entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedBuffer<T> {
    /// Stored entries, oldest first
    entries: VecDeque<T>,
    /// Maximum number of entries retained
    capacity: usize,
}

impl<T> BoundedBuffer<T> {
    /// Create a new buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an entry, evicting the oldest if the buffer is full
    pub fn push(&mut self, entry: T) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Get the number of entries currently in the buffer
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> BoundedBuffer<T> {
    /// Copy the contents out, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_and_read() {
        let mut buffer = BoundedBuffer::new(10);

        for i in 0..5 {
            buffer.push(i * 100);
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.to_vec(), vec![0, 100, 200, 300, 400]);
    }

    #[test]
    fn test_overwrite_oldest() {
        let mut buffer = BoundedBuffer::new(5);

        for i in 0..10 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.to_vec(), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut buffer = BoundedBuffer::new(0);
        assert!(buffer.is_empty());
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.to_vec(), vec!["b"]);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 1usize..100, pushes in 0usize..500) {
            let mut buffer = BoundedBuffer::new(capacity);
            for i in 0..pushes {
                buffer.push(i);
                prop_assert!(buffer.len() <= capacity);
            }
            if pushes > 0 {
                prop_assert_eq!(buffer.to_vec().last().copied(), Some(pushes - 1));
            }
        }
    }
}
