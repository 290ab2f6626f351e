//! The diagnostic record type.

use crate::severity::Severity;
use std::fmt;

/// The engine phase a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Option validation and capacity checks before any placement work.
    Setup,
    /// Quadratic placement and look-ahead legalization.
    GlobalPlacement,
    /// Stripe clustering, reordering, and tap insertion.
    Legalization,
    /// Result file emission.
    Output,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::GlobalPlacement => write!(f, "global placement"),
            Phase::Legalization => write!(f, "legalization"),
            Phase::Output => write!(f, "output"),
        }
    }
}

/// A single report emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// How serious the report is.
    pub severity: Severity,
    /// The phase the report originates from.
    pub phase: Phase,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Creates an informational diagnostic.
    pub fn info(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            phase,
            message: message.into(),
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            phase,
            message: message.into(),
        }
    }

    /// Creates an error diagnostic.
    pub fn error(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            phase,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.phase, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_severity() {
        assert_eq!(
            Diagnostic::info(Phase::Setup, "m").severity,
            Severity::Info
        );
        assert_eq!(
            Diagnostic::warning(Phase::GlobalPlacement, "m").severity,
            Severity::Warning
        );
        assert_eq!(
            Diagnostic::error(Phase::Legalization, "m").severity,
            Severity::Error
        );
    }

    #[test]
    fn display_format() {
        let d = Diagnostic::warning(Phase::GlobalPlacement, "solve diverged");
        assert_eq!(
            d.to_string(),
            "warning [global placement]: solve diverged"
        );
    }
}
