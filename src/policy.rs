//! Epsilon-greedy exploration policy with geometric decay.

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::network::ValueNetwork;
use crate::types::{Action, State};

/// Epsilon-greedy action selector.
///
/// With probability epsilon a uniformly random action is returned; otherwise
/// the action with the highest predicted value, annotated with that value.
/// Ties break toward the lowest index, so greedy selection against fixed
/// weights is deterministic.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    decay: f64,
    floor: f64,
    action_dim: usize,
}

impl EpsilonGreedy {
    /// Creates a selector from the engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        assert!(config.action_dim > 0, "action set must be nonempty");
        Self {
            epsilon: config.epsilon_start.clamp(0.0, 1.0),
            decay: config.epsilon_decay,
            floor: config.epsilon_min,
            action_dim: config.action_dim,
        }
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Overrides the exploration rate, clamped to `[0, 1]`.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    /// Applies one geometric decay step, floored at the configured minimum.
    ///
    /// Called after each successful learn cycle.
    pub fn decay_after_learn(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.floor);
    }

    /// Snaps the exploration rate back to 1.0, the safest (most random)
    /// setting.
    pub fn reset(&mut self) {
        self.epsilon = 1.0;
    }

    /// Selects an action for `state`.
    ///
    /// Exploitation consults `network` for the highest-value action; the
    /// returned [`Action`] then carries the predicted value. Exploration
    /// draws uniformly over the action set and carries no annotation.
    pub fn select(
        &self,
        network: &ValueNetwork,
        state: &State,
        rng: &mut StdRng,
    ) -> Result<Action, EngineError> {
        if rng.gen::<f64>() < self.epsilon {
            return Ok(Action::new(rng.gen_range(0..self.action_dim)));
        }

        let values = network.predict(&state.features)?;
        let (best_index, best_value) = values.iter().enumerate().fold(
            (0usize, f64::NEG_INFINITY),
            |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) },
        );
        Ok(Action::greedy(best_index, best_value))
    }
}
