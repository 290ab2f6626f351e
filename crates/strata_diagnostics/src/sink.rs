//! Per-run diagnostic accumulator.

use crate::diagnostic::{Diagnostic, Phase};
use crate::severity::Severity;
use std::cell::{Cell, RefCell};

/// Collects the diagnostics of one placement run.
///
/// The engine is single-threaded and emits through shared references,
/// so the sink uses interior mutability instead of locks. Severity
/// counts are tracked alongside the records so `has_errors` stays cheap
/// even when a run has logged an iteration report per outer pass.
#[derive(Debug)]
pub struct DiagnosticSink {
    records: RefCell<Vec<Diagnostic>>,
    error_count: Cell<usize>,
    warning_count: Cell<usize>,
}

impl DiagnosticSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            records: RefCell::new(Vec::new()),
            error_count: Cell::new(0),
            warning_count: Cell::new(0),
        }
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => self.error_count.set(self.error_count.get() + 1),
            Severity::Warning => self.warning_count.set(self.warning_count.get() + 1),
            Severity::Info => {}
        }
        self.records.borrow_mut().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics were recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count.get() > 0
    }

    /// Returns the number of error-severity diagnostics recorded.
    pub fn error_count(&self) -> usize {
        self.error_count.get()
    }

    /// Returns the number of warning-severity diagnostics recorded.
    pub fn warning_count(&self) -> usize {
        self.warning_count.get()
    }

    /// Drains every record, resetting the sink to empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        self.error_count.set(0);
        self.warning_count.set(0);
        self.records.borrow_mut().drain(..).collect()
    }

    /// Returns a snapshot of all records without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.records.borrow().clone()
    }

    /// Returns the messages recorded for one engine phase, in order.
    pub fn messages_for(&self, phase: Phase) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|d| d.phase == phase)
            .map(|d| d.message.clone())
            .collect()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
