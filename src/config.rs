//! Engine configuration
//!
//! Loaded from JSON or built in code; validated before any component is
//! constructed.

use crate::adaptation::{AdaptationStrategy, RehearsalPolicy};
use crate::drift::ErrorSignal;
use crate::error::{EngineError, Result};
use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration of a [`LifelongLearner`](crate::LifelongLearner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of examples kept for rehearsal
    pub buffer_capacity: usize,
    /// Error statistic level that raises a warning
    pub warning_threshold: f64,
    /// Error statistic level that confirms drift
    pub drift_threshold: f64,
    /// Updates a warning may last before it is promoted to drift
    pub drift_window: u64,
    /// Examples replayed after drift
    pub rehearsal_sample_size: usize,

    #[serde(default)]
    pub model: ModelKind,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default)]
    pub signal: ErrorSignal,
    /// Detector warm-up after construction and after every reset
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
    #[serde(default)]
    pub adaptation: AdaptationStrategy,
    #[serde(default)]
    pub rehearsal: RehearsalPolicy,
    /// Further labeled examples to wait before learning from one
    #[serde(default)]
    pub learning_delay: usize,
    /// Labeled examples used to score archived concepts
    #[serde(default = "default_recall_window")]
    pub recall_window: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_min_samples() -> u64 {
    50
}

fn default_recall_window() -> usize {
    30
}

fn default_seed() -> u64 {
    42
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(500, 0.2, 0.35, 30, 64)
    }
}

impl EngineConfig {
    pub fn new(
        buffer_capacity: usize,
        warning_threshold: f64,
        drift_threshold: f64,
        drift_window: u64,
        rehearsal_sample_size: usize,
    ) -> Self {
        Self {
            buffer_capacity,
            warning_threshold,
            drift_threshold,
            drift_window,
            rehearsal_sample_size,
            model: ModelKind::default(),
            learning_rate: default_learning_rate(),
            signal: ErrorSignal::default(),
            min_samples: default_min_samples(),
            adaptation: AdaptationStrategy::default(),
            rehearsal: RehearsalPolicy::default(),
            learning_delay: 0,
            recall_window: default_recall_window(),
            seed: default_seed(),
        }
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_signal(mut self, signal: ErrorSignal) -> Self {
        self.signal = signal;
        self
    }

    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    pub fn with_adaptation(mut self, adaptation: AdaptationStrategy) -> Self {
        self.adaptation = adaptation;
        self
    }

    pub fn with_rehearsal(mut self, rehearsal: RehearsalPolicy) -> Self {
        self.rehearsal = rehearsal;
        self
    }

    pub fn with_learning_delay(mut self, learning_delay: usize) -> Self {
        self.learning_delay = learning_delay;
        self
    }

    pub fn with_recall_window(mut self, recall_window: usize) -> Self {
        self.recall_window = recall_window;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return invalid("buffer_capacity must be at least 1");
        }
        if !self.warning_threshold.is_finite() || self.warning_threshold < 0.0 {
            return invalid(format!("warning_threshold must be finite and >= 0, got {}", self.warning_threshold));
        }
        if !self.drift_threshold.is_finite() || self.drift_threshold <= self.warning_threshold {
            return invalid(format!(
                "drift_threshold ({}) must be finite and greater than warning_threshold ({})",
                self.drift_threshold, self.warning_threshold
            ));
        }
        if self.drift_window == 0 {
            return invalid("drift_window must be at least 1");
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }

        match self.signal {
            ErrorSignal::Ewma { alpha } if !(alpha > 0.0 && alpha <= 1.0) => {
                return invalid(format!("ewma alpha must be in (0, 1], got {}", alpha));
            }
            ErrorSignal::Window { size: 0 } => return invalid("error window size must be at least 1"),
            _ => {}
        }

        match self.adaptation {
            AdaptationStrategy::PartialReset { factor } if !(0.0..1.0).contains(&factor) => {
                return invalid(format!("partial reset factor must be in [0, 1), got {}", factor));
            }
            AdaptationStrategy::Recall { max_concepts } => {
                if max_concepts == 0 {
                    return invalid("recall needs max_concepts >= 1");
                }
                if self.recall_window == 0 {
                    return invalid("recall needs recall_window >= 1");
                }
            }
            _ => {}
        }

        if self.rehearsal.passes == 0 {
            return invalid("rehearsal passes must be at least 1");
        }

        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn invalid<T>(reason: impl Into<String>) -> Result<T> {
    Err(EngineError::InvalidConfig(reason.into()))
}

/// What a full ingestion queue does with a new example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The producer waits for room
    #[default]
    Block,
    /// The oldest queued example is overwritten and counted as dropped
    DropOldest,
}

/// Largest ingestion queue accepted; the queue is allocated up front
pub const MAX_INGEST_CAPACITY: usize = 1 << 20;

/// Ingestion queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl IngestConfig {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self { capacity, overflow }
    }

    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return invalid("ingest capacity must be at least 1");
        }
        if self.capacity > MAX_INGEST_CAPACITY {
            return invalid(format!(
                "ingest capacity must be at most {}, got {}",
                MAX_INGEST_CAPACITY, self.capacity
            ));
        }
        Ok(())
    }
}
