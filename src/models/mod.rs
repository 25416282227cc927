//! Online Learning Models Module
//!
//! Incrementally trainable predictors behind one closed enum, plus the
//! versioned snapshot format used for checkpoints and rollback.

mod online_linear;
mod online_logistic;

pub use online_linear::OnlineLinearRegression;
pub use online_logistic::OnlineLogisticRegression;

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Snapshot format version written by this build
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Which predictor the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Regression on squared error; absolute error feeds the detector
    Linear,
    /// Binary classification; 0/1 misclassification feeds the detector
    #[default]
    Logistic,
}

/// The active online model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OnlineModel {
    Linear(OnlineLinearRegression),
    Logistic(OnlineLogisticRegression),
}

impl OnlineModel {
    /// Create an untrained model
    pub fn new(kind: ModelKind, n_features: usize, learning_rate: f64) -> Self {
        match kind {
            ModelKind::Linear => OnlineModel::Linear(OnlineLinearRegression::new(n_features, learning_rate)),
            ModelKind::Logistic => {
                OnlineModel::Logistic(OnlineLogisticRegression::new(n_features, learning_rate))
            }
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            OnlineModel::Linear(_) => ModelKind::Linear,
            OnlineModel::Logistic(_) => ModelKind::Logistic,
        }
    }

    /// Established input width
    pub fn n_features(&self) -> usize {
        match self {
            OnlineModel::Linear(m) => m.n_features(),
            OnlineModel::Logistic(m) => m.n_features(),
        }
    }

    pub fn samples_seen(&self) -> u64 {
        match self {
            OnlineModel::Linear(m) => m.samples_seen(),
            OnlineModel::Logistic(m) => m.samples_seen(),
        }
    }

    /// Fail with `DimensionMismatch` unless `x` has the established width
    pub fn check_input(&self, x: &[f64]) -> Result<()> {
        check_dimension(self.n_features(), x)
    }

    /// Predict without touching model state
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        match self {
            OnlineModel::Linear(m) => m.predict(x),
            OnlineModel::Logistic(m) => m.predict(x),
        }
    }

    /// Incorporate one labeled observation. On error nothing changed.
    pub fn update(&mut self, x: &[f64], label: f64, weight: f64) -> Result<()> {
        match self {
            OnlineModel::Linear(m) => m.learn(x, label, weight),
            OnlineModel::Logistic(m) => m.learn(x, label, weight),
        }
    }

    /// Error of a prediction, as fed to the drift detector
    pub fn loss(&self, prediction: f64, label: f64) -> f64 {
        match self {
            OnlineModel::Linear(_) => (prediction - label).abs(),
            OnlineModel::Logistic(_) => {
                let predicted = prediction >= 0.5;
                let actual = label >= 0.5;
                if predicted == actual {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    /// Scale parameters toward zero, keeping the learned direction
    pub fn shrink(&mut self, factor: f64) {
        match self {
            OnlineModel::Linear(m) => m.shrink(factor),
            OnlineModel::Logistic(m) => m.shrink(factor),
        }
    }

    /// Discard everything learned
    pub fn reset(&mut self) {
        match self {
            OnlineModel::Linear(m) => m.reset(),
            OnlineModel::Logistic(m) => m.reset(),
        }
    }

    /// Serialize the full model state
    pub fn snapshot(&self) -> Result<ModelSnapshot> {
        Ok(ModelSnapshot {
            version: MODEL_FORMAT_VERSION,
            payload: bincode::serialize(self)?,
        })
    }

    /// Rebuild a model from a snapshot
    pub fn restore(snapshot: &ModelSnapshot) -> Result<Self> {
        if snapshot.version > MODEL_FORMAT_VERSION {
            return Err(EngineError::IncompatibleVersion {
                found: snapshot.version,
                supported: MODEL_FORMAT_VERSION,
            });
        }
        Ok(bincode::deserialize(&snapshot.payload)?)
    }
}

/// Opaque, versioned serialization of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    version: u32,
    payload: Vec<u8>,
}

impl ModelSnapshot {
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Encode as a standalone blob
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a blob produced by [`to_bytes`](Self::to_bytes)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

pub(crate) fn check_dimension(expected: usize, x: &[f64]) -> Result<()> {
    if x.len() != expected {
        return Err(EngineError::DimensionMismatch {
            expected,
            got: x.len(),
        });
    }
    Ok(())
}
