//! Bounded experience store with FIFO eviction.

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::EngineError;
use crate::types::Transition;

/// Fixed-capacity ring buffer of transitions.
///
/// Storage is a pre-sized vector with a write cursor: once full, each push
/// overwrites the oldest entry in place, so the store always holds the most
/// recent `capacity` transitions and never reallocates.
#[derive(Debug)]
pub struct ReplayBuffer {
    entries: Vec<Transition>,
    capacity: usize,
    /// Index of the oldest entry once the buffer is full.
    head: usize,
}

impl ReplayBuffer {
    /// Creates an empty buffer holding at most `capacity` transitions.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be nonzero");
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Appends a transition, evicting the oldest entry if at capacity. O(1).
    pub fn push(&mut self, transition: Transition) {
        if self.entries.len() < self.capacity {
            self.entries.push(transition);
        } else {
            self.entries[self.head] = transition;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    /// Draws `batch_size` indices uniformly at random, with replacement.
    ///
    /// Returns [`EngineError::InsufficientData`] when fewer than
    /// `batch_size` transitions are stored.
    pub fn sample_indices(
        &self,
        batch_size: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<usize>, EngineError> {
        if self.entries.len() < batch_size {
            return Err(EngineError::InsufficientData {
                needed: batch_size,
                available: self.entries.len(),
            });
        }
        Ok((0..batch_size)
            .map(|_| rng.gen_range(0..self.entries.len()))
            .collect())
    }

    /// Unweighted mean reward over all stored transitions, `0.0` if empty.
    pub fn average_reward(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|t| t.reward).sum::<f64>() / self.entries.len() as f64
    }

    /// Returns the transition at `index`, if stored.
    pub fn get(&self, index: usize) -> Option<&Transition> {
        self.entries.get(index)
    }

    /// Iterates over all stored transitions (no particular recency order).
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.entries.iter()
    }

    /// Removes all stored transitions.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.head = 0;
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of transitions this buffer will hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
