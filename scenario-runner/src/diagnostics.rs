//! Per-run collection of messages produced while executing a scenario

use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Trace,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Severity::Trace => "trace",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Id or kind of the step that produced the entry
    pub step: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.step, self.message)
    }
}

/// Sink created for one scenario run. Every entry is mirrored to `tracing`.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, step: impl Into<String>, message: impl Into<String>) {
        let entry = Diagnostic {
            severity,
            step: step.into(),
            message: message.into(),
        };
        match severity {
            Severity::Trace => debug!(step = %entry.step, "{}", entry.message),
            Severity::Info => info!(step = %entry.step, "{}", entry.message),
            Severity::Warning | Severity::Error => warn!(step = %entry.step, "{}", entry.message),
        }
        self.entries.push(entry);
    }

    pub fn trace(&mut self, step: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Trace, step, message);
    }

    pub fn info(&mut self, step: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, step, message);
    }

    pub fn error(&mut self, step: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, step, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|entry| entry.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
