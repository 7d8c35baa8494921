//! Safety-control state machine.
//!
//! Three states: `Running`, `Paused`, and `Stopped` (terminal until an
//! explicit reset). The controller itself only tracks the state; the engine
//! performs the side effects (clearing the store, resetting epsilon) inside
//! its exclusion region so transitions are atomic for concurrent callers.

use std::fmt;

use crate::error::EngineError;

/// Operational state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Normal operation: selection and learning both run.
    Running,
    /// Learning is a no-op; action selection still permitted at the frozen
    /// exploration rate.
    Paused,
    /// All guarded operations are blocked until reset.
    Stopped,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Running => write!(f, "running"),
            ControlState::Paused => write!(f, "paused"),
            ControlState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Tracks and validates safety-state transitions.
#[derive(Debug)]
pub struct SafetyController {
    state: ControlState,
}

impl SafetyController {
    /// Creates a controller in the `Running` state.
    pub fn new() -> Self {
        Self {
            state: ControlState::Running,
        }
    }

    /// Current state.
    pub fn state(&self) -> ControlState {
        self.state
    }

    /// Returns true while in `Running`.
    pub fn is_running(&self) -> bool {
        self.state == ControlState::Running
    }

    /// Fails with [`EngineError::SafetyBlocked`] once stopped.
    pub fn check_not_stopped(&self) -> Result<(), EngineError> {
        if self.state == ControlState::Stopped {
            return Err(EngineError::SafetyBlocked(self.state));
        }
        Ok(())
    }

    /// `Running -> Paused`. Idempotent from `Paused`; blocked once stopped.
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.check_not_stopped()?;
        self.state = ControlState::Paused;
        Ok(())
    }

    /// `Paused -> Running`. Idempotent from `Running`; blocked once stopped.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.check_not_stopped()?;
        self.state = ControlState::Running;
        Ok(())
    }

    /// Any state `-> Stopped`. Always succeeds; idempotent.
    pub fn emergency_stop(&mut self) {
        self.state = ControlState::Stopped;
    }

    /// Any state `-> Running`.
    ///
    /// Reset is accepted from any state, not only `Stopped`, matching the
    /// recovery semantics of the rest of the engine: it is the one
    /// transition that can leave `Stopped`.
    pub fn reset(&mut self) {
        self.state = ControlState::Running;
    }
}

impl Default for SafetyController {
    fn default() -> Self {
        Self::new()
    }
}
