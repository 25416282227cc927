//! Rolling error statistic
//!
//! O(1) per update, either an exponentially weighted mean (started as a
//! running mean) or the mean of a fixed-size window kept with a running sum.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the drift signal summarizes recent errors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSignal {
    /// Exponentially weighted moving average with smoothing `alpha`
    Ewma { alpha: f64 },
    /// Mean of the last `size` errors
    Window { size: usize },
}

impl Default for ErrorSignal {
    fn default() -> Self {
        ErrorSignal::Ewma { alpha: 0.05 }
    }
}

/// Incrementally maintained error statistic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingError {
    signal: ErrorSignal,
    /// Current EWMA value (unused for windows)
    ewma: f64,
    /// Window contents (unused for EWMA)
    window: VecDeque<f64>,
    /// Running sum of the window
    window_sum: f64,
    /// Updates since the last reset
    count: u64,
}

impl RollingError {
    pub fn new(signal: ErrorSignal) -> Self {
        Self {
            signal,
            ewma: 0.0,
            window: VecDeque::new(),
            window_sum: 0.0,
            count: 0,
        }
    }

    /// Add one error and return the updated statistic
    pub fn push(&mut self, error: f64) -> f64 {
        match self.signal {
            ErrorSignal::Ewma { alpha } => {
                // running mean until 1/alpha errors are in
                let weight = alpha.max(1.0 / (self.count + 1) as f64);
                self.ewma += weight * (error - self.ewma);
            }
            ErrorSignal::Window { size } => {
                self.window.push_back(error);
                self.window_sum += error;
                if self.window.len() > size {
                    if let Some(old) = self.window.pop_front() {
                        self.window_sum -= old;
                    }
                }
            }
        }
        self.count += 1;
        self.value()
    }

    /// Current value of the statistic (0 before any update)
    pub fn value(&self) -> f64 {
        match self.signal {
            ErrorSignal::Ewma { .. } => self.ewma,
            ErrorSignal::Window { .. } => {
                if self.window.is_empty() {
                    0.0
                } else {
                    self.window_sum / self.window.len() as f64
                }
            }
        }
    }

    /// Updates since the last reset
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        self.ewma = 0.0;
        self.window.clear();
        self.window_sum = 0.0;
        self.count = 0;
    }
}
