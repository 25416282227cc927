//! Concept Drift Detection Module
//!
//! A rolling error signal and the state machine that turns it into drift
//! events.

mod detector;
mod signal;

pub use detector::DriftDetector;
pub use signal::{ErrorSignal, RollingError};

use serde::{Deserialize, Serialize};

/// Drift detection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftState {
    /// No drift suspected
    #[default]
    Stable,
    /// Error is elevated: possible drift
    Warning,
    /// Drift confirmed, waiting for adaptation
    Drift,
}

impl std::fmt::Display for DriftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftState::Stable => write!(f, "stable"),
            DriftState::Warning => write!(f, "warning"),
            DriftState::Drift => write!(f, "drift"),
        }
    }
}
