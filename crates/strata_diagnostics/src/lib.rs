//! Diagnostic reporting for the Strata placement engine.
//!
//! The engine does not print; it emits [`Diagnostic`] records into a
//! [`DiagnosticSink`] owned by the caller. Informational records carry
//! per-iteration wirelength reports, warnings record local recoveries
//! (for example an abandoned diverging solve), and errors accompany the
//! failure returned from the engine.

#![warn(missing_docs)]

mod diagnostic;
mod severity;
mod sink;

pub use diagnostic::{Diagnostic, Phase};
pub use severity::Severity;
pub use sink::DiagnosticSink;
