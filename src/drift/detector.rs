//! Threshold drift detector
//!
//! Three-state machine over a rolling error statistic:
//!
//! - `Stable -> Warning` when the statistic exceeds the warning threshold.
//!   A single spike past both thresholds also lands in `Warning`; `Drift`
//!   is never entered straight from `Stable`.
//! - `Warning -> Drift` when the statistic exceeds the drift threshold or the
//!   warning has lasted `drift_window` further updates.
//! - `Warning -> Stable` when the statistic falls back to the warning
//!   threshold or below before that.
//! - `Drift -> Stable` only through [`DriftDetector::reset`], called by the
//!   controller once adaptation is done.

use super::signal::{ErrorSignal, RollingError};
use super::DriftState;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Drift detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftDetector {
    /// Rolling error statistic
    statistic: RollingError,
    /// Warning level
    warning_threshold: f64,
    /// Drift level
    drift_threshold: f64,
    /// Maximum updates spent in warning before drift is declared
    drift_window: u64,
    /// Updates after a reset during which no transition happens
    min_samples: u64,
    /// Current state
    state: DriftState,
    /// Updates spent in the current warning episode
    warning_age: u64,
    /// Whether drift was entered on the last update
    drift_detected: bool,
    /// Number of warnings raised
    warning_count: u64,
    /// Number of drift events emitted
    drift_count: u64,
}

impl DriftDetector {
    /// Create a detector in the `Stable` state.
    ///
    /// Thresholds are validated by [`EngineConfig`](crate::EngineConfig).
    pub fn new(signal: ErrorSignal, warning_threshold: f64, drift_threshold: f64, drift_window: u64) -> Self {
        Self {
            statistic: RollingError::new(signal),
            warning_threshold,
            drift_threshold,
            drift_window,
            min_samples: 0,
            state: DriftState::Stable,
            warning_age: 0,
            drift_detected: false,
            warning_count: 0,
            drift_count: 0,
        }
    }

    /// Set the warm-up length (default: 0)
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Feed one prediction error and return the resulting state
    pub fn update(&mut self, error: f64) -> DriftState {
        self.drift_detected = false;
        let stat = self.statistic.push(error);

        if self.statistic.count() <= self.min_samples {
            return self.state;
        }

        match self.state {
            DriftState::Stable => {
                if stat > self.warning_threshold {
                    debug!(statistic = stat, "drift detector entering warning");
                    self.state = DriftState::Warning;
                    self.warning_age = 0;
                    self.warning_count += 1;
                }
            }
            DriftState::Warning => {
                self.warning_age += 1;
                let persisted =
                    stat > self.warning_threshold && self.warning_age >= self.drift_window;
                if stat > self.drift_threshold || persisted {
                    self.state = DriftState::Drift;
                    self.drift_detected = true;
                    self.drift_count += 1;
                } else if stat <= self.warning_threshold {
                    debug!(statistic = stat, "drift detector back to stable");
                    self.state = DriftState::Stable;
                    self.warning_age = 0;
                }
            }
            // duplicate events are suppressed until reset
            DriftState::Drift => {}
        }

        self.state
    }

    /// Return to `Stable` with a fresh statistic and warm-up
    pub fn reset(&mut self) {
        self.statistic.reset();
        self.state = DriftState::Stable;
        self.warning_age = 0;
        self.drift_detected = false;
    }

    pub fn state(&self) -> DriftState {
        self.state
    }

    /// Whether the last update entered `Drift`
    pub fn drift_detected(&self) -> bool {
        self.drift_detected
    }

    /// Current value of the rolling error statistic
    pub fn statistic(&self) -> f64 {
        self.statistic.value()
    }

    /// Updates since construction or the last reset
    pub fn samples_seen(&self) -> u64 {
        self.statistic.count()
    }

    pub fn warning_count(&self) -> u64 {
        self.warning_count
    }

    pub fn drift_count(&self) -> u64 {
        self.drift_count
    }
}
