//! Online Linear Regression
//!
//! Implements stochastic gradient descent for linear regression
//! with Adam, running input normalization and L2 regularization.

use super::check_dimension;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Maximum absolute gradient component
const MAX_GRAD: f64 = 1.0;

/// Online Linear Regression with SGD
///
/// Updates weights incrementally; every update costs O(n_features)
/// regardless of how many samples were seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineLinearRegression {
    /// Model weights
    weights: Vec<f64>,
    /// Bias term
    bias: f64,
    /// Learning rate
    learning_rate: f64,
    /// L2 regularization strength
    l2_reg: f64,
    /// Number of features
    n_features: usize,
    /// Number of samples seen
    n_samples: u64,
    /// Running mean for input normalization
    running_mean: Vec<f64>,
    /// Running variance for input normalization
    running_var: Vec<f64>,
    /// Whether to use online normalization
    normalize: bool,
    /// Adam optimizer state: first moment
    m: Vec<f64>,
    /// Adam optimizer state: second moment
    v: Vec<f64>,
    /// Adam steps since the moments were last cleared
    adam_steps: u64,
    /// Adam beta1
    beta1: f64,
    /// Adam beta2
    beta2: f64,
    /// Use Adam optimizer
    use_adam: bool,
}

impl OnlineLinearRegression {
    /// Create a new online linear regression model
    ///
    /// # Arguments
    ///
    /// * `n_features` - Number of input features
    /// * `learning_rate` - Learning rate for SGD
    pub fn new(n_features: usize, learning_rate: f64) -> Self {
        Self {
            weights: vec![0.0; n_features],
            bias: 0.0,
            learning_rate,
            l2_reg: 0.001,
            n_features,
            n_samples: 0,
            running_mean: vec![0.0; n_features],
            running_var: vec![1.0; n_features],
            normalize: true,
            m: vec![0.0; n_features + 1], // +1 for bias
            v: vec![0.0; n_features + 1],
            adam_steps: 0,
            beta1: 0.9,
            beta2: 0.999,
            use_adam: true,
        }
    }

    /// Create with custom L2 regularization
    pub fn with_l2(mut self, l2_reg: f64) -> Self {
        self.l2_reg = l2_reg;
        self
    }

    /// Disable online normalization
    pub fn without_normalization(mut self) -> Self {
        self.normalize = false;
        self
    }

    /// Use simple SGD instead of Adam
    pub fn with_sgd(mut self) -> Self {
        self.use_adam = false;
        self
    }

    /// Normalize input using running statistics
    fn normalize_input(&self, x: &[f64]) -> Vec<f64> {
        if !self.normalize || self.n_samples < 2 {
            return x.to_vec();
        }

        x.iter()
            .zip(self.running_mean.iter())
            .zip(self.running_var.iter())
            .map(|((xi, mean), var)| {
                if *var > 1e-10 {
                    (xi - mean) / var.sqrt()
                } else {
                    xi - mean
                }
            })
            .collect()
    }

    /// Update running statistics (Welford)
    fn update_statistics(&mut self, x: &[f64]) {
        let n = self.n_samples as f64;

        for i in 0..self.n_features {
            let delta = x[i] - self.running_mean[i];
            self.running_mean[i] += delta / (n + 1.0);
            let delta2 = x[i] - self.running_mean[i];
            self.running_var[i] += (delta * delta2 - self.running_var[i]) / (n + 1.0);
        }
    }

    /// Adam optimizer update
    fn adam_update(&mut self, gradients: &[f64], bias_gradient: f64, step: f64) {
        self.adam_steps += 1;
        let t = self.adam_steps as f64;
        let epsilon = 1e-8;

        let bc1 = 1.0 - self.beta1.powf(t);
        let bc2 = 1.0 - self.beta2.powf(t);

        for i in 0..self.n_features {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * gradients[i];
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * gradients[i].powi(2);

            let m_hat = self.m[i] / bc1;
            let v_hat = self.v[i] / bc2;
            self.weights[i] -= step * m_hat / (v_hat.sqrt() + epsilon);
        }

        let bias_idx = self.n_features;
        self.m[bias_idx] = self.beta1 * self.m[bias_idx] + (1.0 - self.beta1) * bias_gradient;
        self.v[bias_idx] = self.beta2 * self.v[bias_idx] + (1.0 - self.beta2) * bias_gradient.powi(2);

        let m_hat = self.m[bias_idx] / bc1;
        let v_hat = self.v[bias_idx] / bc2;
        self.bias -= step * m_hat / (v_hat.sqrt() + epsilon);
    }

    /// Simple SGD update
    fn sgd_update(&mut self, gradients: &[f64], bias_gradient: f64, step: f64) {
        for (w, g) in self.weights.iter_mut().zip(gradients) {
            *w -= step * g;
        }
        self.bias -= step * bias_gradient;
    }

    /// Predict output for input features
    pub fn predict(&self, x: &[f64]) -> Result<f64> {
        check_dimension(self.n_features, x)?;

        let x_norm = self.normalize_input(x);
        Ok(self.bias
            + self
                .weights
                .iter()
                .zip(x_norm.iter())
                .map(|(w, xi)| w * xi)
                .sum::<f64>())
    }

    /// Learn from a single observation
    ///
    /// `weight` scales the step taken for this observation.
    pub fn learn(&mut self, x: &[f64], y: f64, weight: f64) -> Result<()> {
        check_dimension(self.n_features, x)?;

        if self.normalize {
            self.update_statistics(x);
        }

        let x_norm = self.normalize_input(x);
        let prediction = self.predict(x)?;
        let error = prediction - y;

        // MSE loss with L2 regularization, clipped
        let gradients: Vec<f64> = x_norm
            .iter()
            .zip(self.weights.iter())
            .map(|(xi, wi)| (2.0 * error * xi + 2.0 * self.l2_reg * wi).clamp(-MAX_GRAD, MAX_GRAD))
            .collect();
        let bias_gradient = (2.0 * error).clamp(-MAX_GRAD, MAX_GRAD);

        let step = self.learning_rate * weight;
        if self.use_adam {
            self.adam_update(&gradients, bias_gradient, step);
        } else {
            self.sgd_update(&gradients, bias_gradient, step);
        }

        self.n_samples += 1;
        Ok(())
    }

    /// Scale weights toward zero and clear the optimizer state
    ///
    /// Input statistics are kept: the feature distribution usually outlives
    /// the concept.
    pub fn shrink(&mut self, factor: f64) {
        for w in self.weights.iter_mut() {
            *w *= factor;
        }
        self.bias *= factor;
        self.m = vec![0.0; self.n_features + 1];
        self.v = vec![0.0; self.n_features + 1];
        self.adam_steps = 0;
    }

    /// Reset model to initial state
    pub fn reset(&mut self) {
        self.weights = vec![0.0; self.n_features];
        self.bias = 0.0;
        self.n_samples = 0;
        self.running_mean = vec![0.0; self.n_features];
        self.running_var = vec![1.0; self.n_features];
        self.m = vec![0.0; self.n_features + 1];
        self.v = vec![0.0; self.n_features + 1];
        self.adam_steps = 0;
    }

    /// Get number of samples processed
    pub fn samples_seen(&self) -> u64 {
        self.n_samples
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Get model weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Get bias term
    pub fn bias(&self) -> f64 {
        self.bias
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_online_linear_regression() {
        let mut model = OnlineLinearRegression::new(2, 0.1).without_normalization();

        // y = 2*x1 + 3*x2 + 1
        let data = vec![
            (vec![1.0, 0.0], 3.0),
            (vec![0.0, 1.0], 4.0),
            (vec![1.0, 1.0], 6.0),
            (vec![2.0, 1.0], 8.0),
        ];

        for _ in 0..100 {
            for (x, y) in &data {
                model.learn(x, *y, 1.0).unwrap();
            }
        }

        let pred = model.predict(&[1.0, 1.0]).unwrap();
        assert!((pred - 6.0).abs() < 1.0, "Prediction: {}", pred);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut model = OnlineLinearRegression::new(3, 0.01);
        let before = model.clone();

        assert!(matches!(
            model.learn(&[1.0, 2.0], 1.0, 1.0),
            Err(EngineError::DimensionMismatch { expected: 3, got: 2 })
        ));
        assert!(model.predict(&[1.0]).is_err());
        assert_eq!(model, before);
    }

    #[test]
    fn test_model_reset() {
        let mut model = OnlineLinearRegression::new(3, 0.01);
        model.learn(&[1.0, 2.0, 3.0], 10.0, 1.0).unwrap();

        assert!(model.samples_seen() > 0);

        model.reset();

        assert_eq!(model.samples_seen(), 0);
        assert!(model.weights().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_shrink_keeps_direction() {
        let mut model = OnlineLinearRegression::new(2, 0.1).without_normalization();
        for _ in 0..50 {
            model.learn(&[1.0, 0.0], 2.0, 1.0).unwrap();
        }
        let before = model.weights().to_vec();

        model.shrink(0.5);

        for (b, a) in before.iter().zip(model.weights()) {
            assert!((a - b * 0.5).abs() < 1e-12);
        }
        assert_eq!(model.samples_seen(), 50);
    }

    #[test]
    fn test_sample_weight_scales_step() {
        let mut light = OnlineLinearRegression::new(1, 0.1).without_normalization().with_sgd();
        let mut heavy = light.clone();

        light.learn(&[1.0], 0.5, 0.5).unwrap();
        heavy.learn(&[1.0], 0.5, 1.0).unwrap();

        assert!(heavy.weights()[0].abs() > light.weights()[0].abs());
    }
}
