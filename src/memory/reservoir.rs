//! Reservoir memory for rehearsal
//!
//! Keeps a bounded uniform sample of every example offered so far.

use crate::features::Example;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Slots reserved up front; larger reservoirs grow on demand
const PREALLOCATE: usize = 1024;

/// Bounded reservoir of past examples
///
/// Once full, the n-th offered example replaces a uniformly random slot with
/// probability `capacity / n`, so every example seen has the same chance of
/// being retained regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryManager {
    /// Retained examples
    buffer: Vec<Example>,
    /// Maximum buffer capacity
    capacity: usize,
    /// Total number of examples offered
    total_seen: u64,
    /// Source of every random choice
    rng: ChaCha8Rng,
}

impl MemoryManager {
    /// Create an empty reservoir
    pub fn new(capacity: usize, seed: u64) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity.min(PREALLOCATE)),
            capacity,
            total_seen: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Offer an example; returns whether it was retained
    pub fn offer(&mut self, example: Example) -> bool {
        self.total_seen += 1;

        if self.buffer.len() < self.capacity {
            self.buffer.push(example);
            return true;
        }

        let slot = self.rng.gen_range(0..self.total_seen);
        if (slot as usize) < self.capacity {
            self.buffer[slot as usize] = example;
            true
        } else {
            false
        }
    }

    /// Draw up to `k` distinct retained examples in random order
    ///
    /// Asking for more than the buffer holds returns the whole buffer.
    pub fn sample(&mut self, k: usize) -> Vec<Example> {
        let amount = k.min(self.buffer.len());
        index::sample(&mut self.rng, self.buffer.len(), amount)
            .into_iter()
            .map(|i| self.buffer[i].clone())
            .collect()
    }

    /// Remove one uniformly random example
    pub fn evict(&mut self) -> Option<Example> {
        if self.buffer.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.buffer.len());
        Some(self.buffer.swap_remove(idx))
    }

    /// Retained examples in slot order
    pub fn examples(&self) -> &[Example] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of examples offered so far
    pub fn total_seen(&self) -> u64 {
        self.total_seen
    }

    /// Clear the buffer and the offer count
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.total_seen = 0;
    }

    /// Get statistics about the buffer
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            size: self.buffer.len(),
            capacity: self.capacity,
            labeled: self.buffer.iter().filter(|e| e.is_labeled()).count(),
            total_seen: self.total_seen,
        }
    }
}

/// Statistics about the memory buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Current buffer size
    pub size: usize,
    /// Buffer capacity
    pub capacity: usize,
    /// Retained examples that carry a label
    pub labeled: usize,
    /// Total examples offered
    pub total_seen: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn example(seq: u64) -> Example {
        Example::new(seq).with_numeric("x", seq as f64)
    }

    #[test]
    fn test_fills_before_replacing() {
        let mut memory = MemoryManager::new(5, 1);
        for i in 0..5 {
            assert!(memory.offer(example(i)));
        }
        assert_eq!(memory.len(), 5);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut memory = MemoryManager::new(8, 2);
        for i in 0..1000 {
            memory.offer(example(i));
            assert!(memory.len() <= 8);
        }
        assert_eq!(memory.total_seen(), 1000);
    }

    #[test]
    fn test_retained_items_were_offered() {
        let mut memory = MemoryManager::new(10, 3);
        for i in 0..200 {
            memory.offer(example(i));
        }
        for retained in memory.examples() {
            assert!(retained.seq() < 200);
            assert_eq!(
                retained.field("x"),
                Some(&crate::features::FieldValue::Numeric(retained.seq() as f64))
            );
        }
    }

    #[test]
    fn test_sample_without_replacement() {
        let mut memory = MemoryManager::new(20, 4);
        for i in 0..20 {
            memory.offer(example(i));
        }

        let sample = memory.sample(10);
        assert_eq!(sample.len(), 10);
        let distinct: HashSet<u64> = sample.iter().map(|e| e.seq()).collect();
        assert_eq!(distinct.len(), 10);
    }

    #[test]
    fn test_oversized_sample_returns_whole_buffer() {
        let mut memory = MemoryManager::new(20, 5);
        for i in 0..7 {
            memory.offer(example(i));
        }

        let sample = memory.sample(50);
        assert_eq!(sample.len(), 7);
        let distinct: HashSet<u64> = sample.iter().map(|e| e.seq()).collect();
        assert_eq!(distinct.len(), 7);
    }

    #[test]
    fn test_evict() {
        let mut memory = MemoryManager::new(3, 6);
        assert!(memory.evict().is_none());

        for i in 0..3 {
            memory.offer(example(i));
        }
        let evicted = memory.evict().unwrap();
        assert_eq!(memory.len(), 2);
        assert!(!memory.examples().contains(&evicted));
    }

    #[test]
    fn test_stats() {
        let mut memory = MemoryManager::new(10, 7);
        memory.offer(example(0).with_label(1.0));
        memory.offer(example(1));

        let stats = memory.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.labeled, 1);
        assert_eq!(stats.total_seen, 2);
    }
}
