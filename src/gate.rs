//! Policy-gate interface consumed by the engine.
//!
//! The gate is an external collaborator: it admits or denies learning steps
//! and receives violation reports when a decision or learn cycle faults.
//! The engine never implements admission logic itself.

use std::fmt;

/// Operation tag presented to the gate before each learning step.
pub const OP_REINFORCEMENT_LEARNING: &str = "reinforcement_learning";

/// Severity attached to a violation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// Admission check and violation sink.
pub trait PolicyGate: Send + Sync {
    /// Returns true if the named operation may run now.
    fn may_execute(&self, operation: &str) -> bool;

    /// Receives a report of a fault or policy violation.
    fn report_violation(&self, source: &str, kind: &str, severity: Severity, message: &str);
}

/// Gate that admits everything and logs reported violations.
///
/// Default for tests and gate-less deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveGate;

impl PolicyGate for PermissiveGate {
    fn may_execute(&self, _operation: &str) -> bool {
        true
    }

    fn report_violation(&self, source: &str, kind: &str, severity: Severity, message: &str) {
        tracing::warn!(source, kind, %severity, message, "violation reported");
    }
}
