//! Append-only diagnostics sink.
//!
//! Loaders, cursors and matchers report recoverable problems here. Entries are
//! forwarded to `tracing` as they arrive and kept for later inspection; nothing
//! in the crate reads them back for control flow.

use parking_lot::Mutex;
use serde::Serialize;

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Level {
    /// Internal detail (rejected candidates, skipped offsets).
    Debug,
    /// Recoverable degradation (defaulted references, discarded artifacts).
    Warning,
    /// Something could not be decoded at all.
    Error,
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity.
    pub level: Level,
    /// Subsystem that produced the entry (e.g. `"akao::seq"`).
    pub component: String,
    /// Human-readable message.
    pub message: String,
}

/// Thread-safe diagnostics collector.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a debug-level entry.
    pub fn debug(&self, component: &str, message: impl Into<String>) {
        self.push(Level::Debug, component, message.into());
    }

    /// Record a warning.
    pub fn warn(&self, component: &str, message: impl Into<String>) {
        self.push(Level::Warning, component, message.into());
    }

    /// Record an error.
    pub fn error(&self, component: &str, message: impl Into<String>) {
        self.push(Level::Error, component, message.into());
    }

    /// Snapshot of all entries recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Number of entries at `level` or above.
    pub fn count_at_least(&self, level: Level) -> usize {
        self.entries.lock().iter().filter(|d| d.level >= level).count()
    }

    /// Returns `true` if any entry message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|d| d.message.contains(needle))
    }

    fn push(&self, level: Level, component: &str, message: String) {
        match level {
            Level::Debug => tracing::debug!(component, "{message}"),
            Level::Warning => tracing::warn!(component, "{message}"),
            Level::Error => tracing::error!(component, "{message}"),
        }
        self.entries.lock().push(Diagnostic {
            level,
            component: component.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_kept_in_order() {
        let diag = Diagnostics::new();
        diag.debug("a", "first");
        diag.warn("b", "second");
        diag.error("c", "third");

        let entries = diag.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].component, "b");
        assert_eq!(diag.count_at_least(Level::Warning), 2);
        assert!(diag.contains("third"));
    }
}
