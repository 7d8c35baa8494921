//! Core data model: states, actions, and stored transitions.

use std::time::SystemTime;

use crate::{generate_id, Id};

/// An observed sensor state.
///
/// Features are expected to be normalized into `[0, 1]`; this is not
/// enforced, but training behavior is undefined outside that range.
/// Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    /// Opaque identifier for this observation.
    pub id: Id,
    /// Ordered, fixed-length feature vector.
    pub features: Vec<f64>,
    /// Whether this state ends an episode.
    pub terminal: bool,
}

impl State {
    /// Creates a non-terminal state from already-normalized features.
    pub fn new(features: Vec<f64>) -> Self {
        Self {
            id: generate_id(),
            features,
            terminal: false,
        }
    }

    /// Creates a terminal state from already-normalized features.
    pub fn terminal(features: Vec<f64>) -> Self {
        Self {
            id: generate_id(),
            features,
            terminal: true,
        }
    }

    /// Creates a state with a caller-chosen identifier.
    pub fn with_id(features: Vec<f64>, id: Id) -> Self {
        Self {
            id,
            features,
            terminal: false,
        }
    }

    /// Creates a non-terminal state from raw sensor readings, min–max
    /// normalizing them into `[0, 1]`.
    ///
    /// If all readings are equal the values are passed through unchanged
    /// (the range is degenerate and there is nothing to scale).
    pub fn from_raw(raw: &[f64]) -> Self {
        let min = raw.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = raw.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let features = if max > min {
            raw.iter().map(|v| (v - min) / (max - min)).collect()
        } else {
            raw.to_vec()
        };
        Self::new(features)
    }

    /// Number of features in this state.
    pub fn width(&self) -> usize {
        self.features.len()
    }
}

/// A discrete action chosen by the exploration policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Index into the fixed action set.
    pub index: usize,
    /// Identifier derived from the index.
    pub id: Id,
    /// Numeric parameter vector (minimally, the chosen index).
    pub parameters: Vec<f64>,
    /// Predicted value of this action, set when chosen by exploitation.
    pub expected_value: Option<f64>,
}

impl Action {
    /// Creates an action with no value annotation (exploration).
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: format!("action_{index}"),
            parameters: vec![index as f64],
            expected_value: None,
        }
    }

    /// Creates an action annotated with its predicted value (exploitation).
    pub fn greedy(index: usize, expected_value: f64) -> Self {
        Self {
            expected_value: Some(expected_value),
            ..Self::new(index)
        }
    }
}

/// One stored (state, action, reward, next state, done) tuple.
///
/// Immutable once appended; owned exclusively by the replay store.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: Action,
    pub reward: f64,
    pub next_state: State,
    pub done: bool,
    pub timestamp: SystemTime,
}

impl Transition {
    /// Creates a transition stamped with the current time.
    pub fn new(state: State, action: Action, reward: f64, next_state: State, done: bool) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            done,
            timestamp: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_width_matches_features() {
        let s = State::new(vec![0.1, 0.2, 0.3]);
        assert_eq!(s.width(), 3);
        assert!(!s.terminal);
    }

    #[test]
    fn terminal_state_sets_flag() {
        let s = State::terminal(vec![0.0; 4]);
        assert!(s.terminal);
    }

    #[test]
    fn states_get_distinct_ids() {
        let a = State::new(vec![0.0]);
        let b = State::new(vec![0.0]);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn from_raw_normalizes_to_unit_range() {
        let s = State::from_raw(&[10.0, 20.0, 30.0]);
        assert_eq!(s.features, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn from_raw_degenerate_range_passes_through() {
        let s = State::from_raw(&[5.0, 5.0, 5.0]);
        assert_eq!(s.features, vec![5.0, 5.0, 5.0]);
    }

    #[test]
    fn action_id_derived_from_index() {
        let a = Action::new(2);
        assert_eq!(a.id, "action_2");
        assert_eq!(a.parameters, vec![2.0]);
        assert!(a.expected_value.is_none());
    }

    #[test]
    fn greedy_action_carries_value() {
        let a = Action::greedy(1, 0.75);
        assert_eq!(a.index, 1);
        assert_eq!(a.expected_value, Some(0.75));
    }
}
