//! Fault history with consecutive-duplicate suppression

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Every fault is kept; only a change of message is worth showing again
#[derive(Debug, Default)]
pub struct FaultLog {
    history: Vec<FaultRecord>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fault. Returns true if it should be presented, i.e. its text
    /// differs from the previous fault.
    pub fn record(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) -> bool {
        let message = message.into();
        let fresh = self
            .history
            .last()
            .map_or(true, |last| last.message != message);
        self.history.push(FaultRecord { timestamp, message });
        fresh
    }

    pub fn history(&self) -> &[FaultRecord] {
        &self.history
    }

    pub fn last(&self) -> Option<&FaultRecord> {
        self.history.last()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_duplicates_suppressed_but_recorded() {
        let mut log = FaultLog::new();
        let now = Utc::now();

        assert!(log.record(now, "Comm error: Port not open"));
        assert!(!log.record(now, "Comm error: Port not open"));
        assert!(!log.record(now, "Comm error: Port not open"));
        assert!(log.record(now, "VFD Exception: Operation failed"));
        assert!(log.record(now, "Comm error: Port not open"));

        assert_eq!(log.len(), 5);
        assert_eq!(
            log.last().map(|r| r.message.as_str()),
            Some("Comm error: Port not open")
        );
    }

    #[test]
    fn test_empty_log() {
        let log = FaultLog::new();
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }
}
