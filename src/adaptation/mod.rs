//! Drift Adaptation Module
//!
//! What the controller does to the model when drift fires, and how buffered
//! examples are replayed afterwards.

mod repository;

pub use repository::{mean_loss, ConceptId, ConceptRepository, StoredConcept};

use crate::models::ModelSnapshot;
use serde::{Deserialize, Serialize};

/// Structural change applied to the model on drift
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationStrategy {
    /// Keep the model as is; only rehearse
    Retain,
    /// Scale parameters by `factor` in [0, 1) and clear optimizer state
    PartialReset { factor: f64 },
    /// Discard the model state entirely
    FullReset,
    /// Archive the model and switch to the stored concept that best fits the
    /// recent examples, or start fresh if none beats the current model
    Recall { max_concepts: usize },
}

impl Default for AdaptationStrategy {
    fn default() -> Self {
        AdaptationStrategy::PartialReset { factor: 0.5 }
    }
}

impl std::fmt::Display for AdaptationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdaptationStrategy::Retain => write!(f, "retain"),
            AdaptationStrategy::PartialReset { factor } => write!(f, "partial_reset({})", factor),
            AdaptationStrategy::FullReset => write!(f, "full_reset"),
            AdaptationStrategy::Recall { max_concepts } => write!(f, "recall({})", max_concepts),
        }
    }
}

/// Order in which a rehearsal sample is replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayOrder {
    /// The random order the sample was drawn in
    #[default]
    Random,
    /// Oldest example first
    Chronological,
}

/// How buffered examples are replayed after drift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RehearsalPolicy {
    pub order: ReplayOrder,
    /// Times the sample is replayed
    pub passes: usize,
}

impl Default for RehearsalPolicy {
    fn default() -> Self {
        Self {
            order: ReplayOrder::Random,
            passes: 1,
        }
    }
}

/// What one adaptation did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    /// Sequence number of the example that triggered the drift event
    pub seq: u64,
    pub strategy: AdaptationStrategy,
    /// Buffered examples replayed into the model
    pub rehearsed: usize,
    /// Delayed observations dropped instead of learned
    pub discarded: usize,
    /// Archived concept that was reactivated, if any
    pub recalled: Option<ConceptId>,
    /// Concept active before the adaptation
    pub previous_concept: ConceptId,
    /// Concept active after the adaptation
    pub concept: ConceptId,
    /// Model as it was when drift fired
    pub pre_drift: ModelSnapshot,
}
