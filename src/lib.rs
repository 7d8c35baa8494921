//! orel - Online REinforcement Learning engine
//!
//! A bounded-memory Q-learning decision engine: callers feed it normalized
//! sensor states, it selects actions under an epsilon-greedy policy, and it
//! learns from observed rewards via experience replay against a periodically
//! synchronized target network.
//!
//! The [`LearningEngine`](engine::LearningEngine) facade serializes all access
//! behind a single lock and wraps every subsystem in a safety-control state
//! machine (pause / resume / reset / emergency-stop).

pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod network;
pub mod policy;
pub mod replay;
pub mod safety;
pub mod types;

mod persistence;

pub use config::EngineConfig;
pub use engine::{LearnOutcome, LearningEngine};
pub use error::EngineError;
pub use gate::{PermissiveGate, PolicyGate, Severity, OP_REINFORCEMENT_LEARNING};
pub use network::ValueNetwork;
pub use policy::EpsilonGreedy;
pub use replay::ReplayBuffer;
pub use safety::{ControlState, SafetyController};
pub use types::{Action, State, Transition};

/// Identifier type used for states, actions, and engine instances.
pub type Id = String;

/// Generates a new unique identifier (UUID v4).
pub fn generate_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}
