//! From-scratch two-layer value approximator.
//!
//! Maps a feature vector to one value estimate per action:
//! input → hidden (ReLU) → output (linear, since value estimates are
//! unconstrained). Weights live in flat row-major vectors; there is no
//! autodiff and no configurability beyond the three layer widths.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A dense two-layer network holding its own weights.
///
/// Two independent instances exist inside the engine: the *live* network,
/// trained every learn cycle, and the *target* network, refreshed from the
/// live weights every [`target_sync_interval`](crate::EngineConfig) cycles
/// so that training targets do not chase a moving approximator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueNetwork {
    input_dim: usize,
    hidden_dim: usize,
    output_dim: usize,
    learning_rate: f64,
    /// Input→hidden weights, `[i * hidden_dim + h]`.
    w1: Vec<f64>,
    /// Hidden biases.
    b1: Vec<f64>,
    /// Hidden→output weights, `[h * output_dim + o]`.
    w2: Vec<f64>,
    /// Output biases.
    b2: Vec<f64>,
}

impl ValueNetwork {
    /// Creates a network with variance-scaled Gaussian initialization.
    ///
    /// Each layer draws zero-mean Gaussian weights with standard deviation
    /// `sqrt(2 / (fan_in + fan_out))`, independently per layer. Biases start
    /// at zero.
    ///
    /// # Arguments
    ///
    /// * `input_dim` - State feature width
    /// * `hidden_dim` - Hidden layer width
    /// * `output_dim` - Action count
    /// * `learning_rate` - Gradient descent step size
    /// * `rng` - Seeded generator; identical seeds yield identical weights
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        learning_rate: f64,
        rng: &mut StdRng,
    ) -> Self {
        assert!(
            input_dim > 0 && hidden_dim > 0 && output_dim > 0,
            "network dimensions must be nonzero"
        );

        let sigma1 = (2.0 / (input_dim + hidden_dim) as f64).sqrt();
        let dist1 = Normal::new(0.0, sigma1).expect("sigma is finite and positive");
        let w1 = (0..input_dim * hidden_dim)
            .map(|_| dist1.sample(rng))
            .collect();

        let sigma2 = (2.0 / (hidden_dim + output_dim) as f64).sqrt();
        let dist2 = Normal::new(0.0, sigma2).expect("sigma is finite and positive");
        let w2 = (0..hidden_dim * output_dim)
            .map(|_| dist2.sample(rng))
            .collect();

        Self {
            input_dim,
            hidden_dim,
            output_dim,
            learning_rate,
            w1,
            b1: vec![0.0; hidden_dim],
            w2,
            b2: vec![0.0; output_dim],
        }
    }

    /// State feature width this network accepts.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Number of action values this network produces.
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Predicts one value per action. Pure function of the current weights.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>, EngineError> {
        let (_, output) = self.forward(features)?;
        Ok(output)
    }

    /// Forward pass returning both the post-activation hidden layer and the
    /// output layer.
    fn forward(&self, features: &[f64]) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
        if features.len() != self.input_dim {
            return Err(EngineError::DimensionMismatch {
                expected: self.input_dim,
                actual: features.len(),
            });
        }

        let mut hidden = vec![0.0; self.hidden_dim];
        for (h, unit) in hidden.iter_mut().enumerate() {
            let mut sum = self.b1[h];
            for (i, &x) in features.iter().enumerate() {
                sum += x * self.w1[i * self.hidden_dim + h];
            }
            *unit = sum.max(0.0);
        }

        let mut output = vec![0.0; self.output_dim];
        for (o, unit) in output.iter_mut().enumerate() {
            let mut sum = self.b2[o];
            for (h, &a) in hidden.iter().enumerate() {
                sum += a * self.w2[h * self.output_dim + o];
            }
            *unit = sum;
        }

        Ok((hidden, output))
    }

    /// Performs one gradient descent step toward `targets` and returns the
    /// pre-update mean-squared error.
    ///
    /// Backpropagates through both layers: the output layer is linear, the
    /// hidden layer gradient is masked by the ReLU derivative. Only the live
    /// network is ever trained; the target network is updated by
    /// [`sync_from`](Self::sync_from).
    pub fn train_step(&mut self, features: &[f64], targets: &[f64]) -> Result<f64, EngineError> {
        if targets.len() != self.output_dim {
            return Err(EngineError::DimensionMismatch {
                expected: self.output_dim,
                actual: targets.len(),
            });
        }

        let (hidden, output) = self.forward(features)?;

        let mut loss = 0.0;
        let mut grad_out = vec![0.0; self.output_dim];
        for o in 0..self.output_dim {
            let error = output[o] - targets[o];
            loss += error * error;
            grad_out[o] = 2.0 * error / self.output_dim as f64;
        }
        loss /= self.output_dim as f64;

        // Hidden gradient must be computed against the weights used in the
        // forward pass, so it precedes the w2 update.
        let mut grad_hidden = vec![0.0; self.hidden_dim];
        for (h, grad) in grad_hidden.iter_mut().enumerate() {
            if hidden[h] <= 0.0 {
                continue; // ReLU derivative is zero here
            }
            let mut sum = 0.0;
            for (o, &g) in grad_out.iter().enumerate() {
                sum += g * self.w2[h * self.output_dim + o];
            }
            *grad = sum;
        }

        let lr = self.learning_rate;
        for (h, &a) in hidden.iter().enumerate() {
            for (o, &g) in grad_out.iter().enumerate() {
                self.w2[h * self.output_dim + o] -= lr * g * a;
            }
        }
        for (o, &g) in grad_out.iter().enumerate() {
            self.b2[o] -= lr * g;
        }

        for (i, &x) in features.iter().enumerate() {
            for (h, &g) in grad_hidden.iter().enumerate() {
                self.w1[i * self.hidden_dim + h] -= lr * g * x;
            }
        }
        for (h, &g) in grad_hidden.iter().enumerate() {
            self.b1[h] -= lr * g;
        }

        Ok(loss)
    }

    /// Copies all weights and biases from `other`.
    ///
    /// Used to refresh the target network from the live one; both must share
    /// the same dimensions.
    pub fn sync_from(&mut self, other: &ValueNetwork) {
        debug_assert_eq!(self.input_dim, other.input_dim);
        debug_assert_eq!(self.hidden_dim, other.hidden_dim);
        debug_assert_eq!(self.output_dim, other.output_dim);
        self.w1.copy_from_slice(&other.w1);
        self.b1.copy_from_slice(&other.b1);
        self.w2.copy_from_slice(&other.w2);
        self.b2.copy_from_slice(&other.b2);
    }
}
