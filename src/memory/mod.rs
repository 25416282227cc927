//! Memory Module
//!
//! Bounded rehearsal memory and the learning delay queue.

mod delay;
mod reservoir;

pub use delay::{LearningDelay, PendingUpdate};
pub use reservoir::{MemoryManager, MemoryStats};
