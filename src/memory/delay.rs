//! Learning delay
//!
//! Holds labeled observations for a fixed number of further labeled
//! arrivals before they are learned from. Around a drift the most recent
//! observations may belong to either concept; waiting gives the detector a
//! chance to fire before the model absorbs them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// An encoded observation waiting to be learned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub seq: u64,
    pub vector: Vec<f64>,
    pub label: f64,
    pub weight: f64,
}

/// FIFO of observations not yet learned from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningDelay {
    delay: usize,
    pending: VecDeque<PendingUpdate>,
}

impl LearningDelay {
    /// `delay == 0` releases every observation immediately
    pub fn new(delay: usize) -> Self {
        Self {
            delay,
            pending: VecDeque::new(),
        }
    }

    /// Queue an observation and return the ones now old enough to learn from
    pub fn push(&mut self, update: PendingUpdate) -> Vec<PendingUpdate> {
        self.pending.push_back(update);

        let mut released = Vec::new();
        while self.pending.len() > self.delay {
            if let Some(ready) = self.pending.pop_front() {
                released.push(ready);
            }
        }
        released
    }

    /// Drop everything still waiting; returns how many were dropped
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn delay(&self) -> usize {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(seq: u64) -> PendingUpdate {
        PendingUpdate {
            seq,
            vector: vec![seq as f64],
            label: 1.0,
            weight: 1.0,
        }
    }

    #[test]
    fn test_zero_delay_releases_immediately() {
        let mut delay = LearningDelay::new(0);
        let released = delay.push(update(1));
        assert_eq!(released, vec![update(1)]);
        assert!(delay.is_empty());
    }

    #[test]
    fn test_releases_in_arrival_order() {
        let mut delay = LearningDelay::new(2);
        assert!(delay.push(update(1)).is_empty());
        assert!(delay.push(update(2)).is_empty());

        let released = delay.push(update(3));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].seq, 1);
        assert_eq!(delay.len(), 2);
    }

    #[test]
    fn test_discard() {
        let mut delay = LearningDelay::new(5);
        delay.push(update(1));
        delay.push(update(2));

        assert_eq!(delay.discard(), 2);
        assert!(delay.is_empty());
    }
}
