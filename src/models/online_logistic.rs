//! Online Logistic Regression
//!
//! Binary classifier trained by SGD on the log-loss. Predictions are
//! probabilities of the positive class.

use super::check_dimension;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum absolute gradient component
const MAX_GRAD: f64 = 1.0;

/// Bound on a single weight * feature term of the margin
const MAX_TERM: f64 = 1e12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineLogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    learning_rate: f64,
    l2_reg: f64,
    n_features: usize,
    n_samples: u64,
}

impl OnlineLogisticRegression {
    pub fn new(n_features: usize, learning_rate: f64) -> Self {
        Self {
            weights: vec![0.0; n_features],
            bias: 0.0,
            learning_rate,
            l2_reg: 0.0001,
            n_features,
            n_samples: 0,
        }
    }

    /// Set L2 regularization
    pub fn with_l2(mut self, l2_reg: f64) -> Self {
        self.l2_reg = l2_reg;
        self
    }

    /// Probability of the positive class
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.n_features, x)?;
        Ok(sigmoid(self.margin(x)))
    }

    /// Learn from one observation; labels >= 0.5 count as positive
    pub fn learn(&mut self, x: &[f64], y: f64, weight: f64) -> Result<()> {
        check_dimension(self.n_features, x)?;

        let target = if y >= 0.5 { 1.0 } else { 0.0 };
        let error = sigmoid(self.margin(x)) - target;
        let step = self.learning_rate * weight;

        let weights: Vec<f64> = self
            .weights
            .iter()
            .zip(x)
            .map(|(w, xi)| w - step * (error * xi + self.l2_reg * w).clamp(-MAX_GRAD, MAX_GRAD))
            .collect();
        let bias = self.bias - step * error;

        // parameters only change when the whole step is finite
        if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
            warn!(step, "skipping update with non-finite parameters");
            return Ok(());
        }

        self.weights = weights;
        self.bias = bias;
        self.n_samples += 1;
        Ok(())
    }

    fn margin(&self, x: &[f64]) -> f64 {
        let terms: f64 = self
            .weights
            .iter()
            .zip(x)
            .map(|(w, xi)| (w * xi).clamp(-MAX_TERM, MAX_TERM))
            .sum();
        self.bias + terms
    }

    /// Scale weights toward zero
    pub fn shrink(&mut self, factor: f64) {
        for w in self.weights.iter_mut() {
            *w *= factor;
        }
        self.bias *= factor;
    }

    pub fn reset(&mut self) {
        self.weights = vec![0.0; self.n_features];
        self.bias = 0.0;
        self.n_samples = 0;
    }

    pub fn samples_seen(&self) -> u64 {
        self.n_samples
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untrained_model_is_undecided() {
        let model = OnlineLogisticRegression::new(2, 0.1);
        assert_eq!(model.predict(&[3.0, -1.0]).unwrap(), 0.5);
    }

    #[test]
    fn test_learns_separable_concept() {
        let mut model = OnlineLogisticRegression::new(2, 0.5);

        let data = vec![
            (vec![1.0, 1.0], 1.0),
            (vec![2.0, 0.5], 1.0),
            (vec![-1.0, -1.0], 0.0),
            (vec![-0.5, -2.0], 0.0),
        ];

        for _ in 0..200 {
            for (x, y) in &data {
                model.learn(x, *y, 1.0).unwrap();
            }
        }

        assert!(model.predict(&[1.5, 1.0]).unwrap() > 0.9);
        assert!(model.predict(&[-1.5, -1.0]).unwrap() < 0.1);
    }

    #[test]
    fn test_sigmoid_is_stable_for_large_margins() {
        assert!(sigmoid(1000.0).is_finite());
        assert!(sigmoid(-1000.0).is_finite());
        assert!(sigmoid(-1000.0) >= 0.0);
    }

    #[test]
    fn test_extreme_features_keep_parameters_finite() {
        let mut model = OnlineLogisticRegression::new(2, 0.1);

        for i in 0..50 {
            let (x, y) = if i % 2 == 0 {
                ([1e300, -1e300], 1.0)
            } else {
                ([-1e300, 1e300], 0.0)
            };
            model.learn(&x, y, 1.0).unwrap();

            let p = model.predict(&x).unwrap();
            assert!((0.0..=1.0).contains(&p), "prediction {} at step {}", p, i);
        }

        assert!(model.weights().iter().all(|w| w.is_finite()));
        assert_eq!(model.samples_seen(), 50);
    }

    #[test]
    fn test_overflowing_step_is_skipped() {
        let mut model = OnlineLogisticRegression::new(1, 10.0);
        model.learn(&[1.0], 1.0, 1.0).unwrap();
        let before = model.clone();

        // learning_rate * weight overflows to infinity
        model.learn(&[1.0], 0.0, f64::MAX).unwrap();
        assert_eq!(model, before);
    }
}
