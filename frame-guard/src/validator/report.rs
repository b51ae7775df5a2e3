//! Warning records and sinks for `warn`-strategy violations.
//!
//! A warned violation never changes what a check returns. These types let a
//! caller observe them anyway, in addition to the `tracing` event every
//! warning emits.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// A violation that was reported under the `warn` strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationWarning {
    /// Name of the check that found the violation
    pub check: String,
    /// The same message a `fail` strategy would have raised
    pub message: String,
    /// When the violation was reported
    pub observed_at: DateTime<Utc>,
}

impl ValidationWarning {
    pub fn new(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            message: message.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Receives warnings as checks report them.
pub trait WarningSink: Send + Sync {
    fn on_warning(&self, warning: &ValidationWarning);
}

impl<F> WarningSink for F
where
    F: Fn(&ValidationWarning) + Send + Sync,
{
    fn on_warning(&self, warning: &ValidationWarning) {
        self(warning)
    }
}

/// A sink that keeps every warning in memory.
///
/// # Examples
///
/// ```rust
/// use frame_guard::validator::{CollectingSink, ValidationWarning, WarningSink};
///
/// let sink = CollectingSink::new();
/// sink.on_warning(&ValidationWarning::new("row_count", "Row count does not equal 3"));
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    warnings: Arc<Mutex<Vec<ValidationWarning>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the warnings received so far, oldest first.
    pub fn warnings(&self) -> Vec<ValidationWarning> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every stored warning.
    pub fn drain(&self) -> Vec<ValidationWarning> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ValidationWarning>> {
        // A panic while pushing leaves the vector intact, so poisoning is ignored.
        self.warnings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WarningSink for CollectingSink {
    fn on_warning(&self, warning: &ValidationWarning) {
        self.lock().push(warning.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_collecting_sink_shares_storage_between_clones() {
        let sink = CollectingSink::new();
        let handle = sink.clone();

        sink.on_warning(&ValidationWarning::new("primary_key", "dup"));
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.warnings()[0].check, "primary_key");

        let drained = handle.drain();
        assert_eq!(drained.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let sink = move |_: &ValidationWarning| {
            counter.fetch_add(1, Ordering::SeqCst);
        };

        sink.on_warning(&ValidationWarning::new("row_count", "x"));
        sink.on_warning(&ValidationWarning::new("row_count", "y"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_warning_serializes() {
        let warning = ValidationWarning::new("column_equality", "Column 'a' does not equal 'b'");
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["check"], "column_equality");
        assert!(json["observed_at"].is_string());
    }
}
