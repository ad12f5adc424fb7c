//! Diagnostics sink for soft failures.
//!
//! The walker never raises on an inapplicable node; it reports a message
//! here and carries on with [`Eval::Failed`](super::walker::Eval).  The sink
//! is handed to the [`Interpreter`](super::walker::Interpreter) when it is
//! built.

use std::cell::RefCell;

/// Receives one message per soft failure.
pub trait Diagnostics {
    fn warn(&self, message: &str);
}

/// Forwards every message to `tracing` at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "ponzu::walk", "{message}");
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    messages: RefCell<Vec<String>>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    /// Drain and return all collected messages.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.borrow_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.borrow().is_empty()
    }
}

impl Diagnostics for CollectedDiagnostics {
    fn warn(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_owned());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
