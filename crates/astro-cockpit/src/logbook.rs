use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:<8} {}", self.at.time(), self.severity, self.message)
    }
}

/// Append-only session log shared between the cockpit (writer) and display
/// surfaces (readers). Clones share the same entries. Every append is also
/// emitted through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct LogBook {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Debug => debug!(target: "astro::cockpit", "{}", message),
            Severity::Info => info!(target: "astro::cockpit", "{}", message),
            Severity::Warning => warn!(target: "astro::cockpit", "{}", message),
            Severity::Error => error!(target: "astro::cockpit", "{}", message),
            Severity::Critical => error!(target: "astro::cockpit", critical = true, "{}", message),
        }
        let entry = LogEntry { at: now(), severity, message };
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }

    pub fn debug(&self, message: impl Into<String>) { self.append(Severity::Debug, message) }
    pub fn info(&self, message: impl Into<String>) { self.append(Severity::Info, message) }
    pub fn warning(&self, message: impl Into<String>) { self.append(Severity::Warning, message) }
    pub fn error(&self, message: impl Into<String>) { self.append(Severity::Error, message) }
    pub fn critical(&self, message: impl Into<String>) { self.append(Severity::Critical, message) }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entries appended after `cursor`, and the cursor to pass next time.
    pub fn since(&self, cursor: usize) -> (Vec<LogEntry>, usize) {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let start = cursor.min(entries.len());
        (entries[start..].to_vec(), entries.len())
    }
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries_in_order() {
        let book = LogBook::new();
        let reader = book.clone();
        book.info("Connecting to Tello...");
        book.warning("Low Battery Level");
        book.critical("Battery level too low");

        let sev: Vec<_> = reader.entries().iter().map(|e| e.severity).collect();
        assert_eq!(sev, vec![Severity::Info, Severity::Warning, Severity::Critical]);
        assert_eq!(reader.entries()[1].message, "Low Battery Level");
    }

    #[test]
    fn since_returns_only_new_entries() {
        let book = LogBook::new();
        book.info("a");
        book.info("b");
        let (first, cursor) = book.since(0);
        assert_eq!(first.len(), 2);

        book.debug("c");
        let (next, cursor) = book.since(cursor);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].message, "c");
        assert_eq!(cursor, 3);

        let (none, _) = book.since(99);
        assert!(none.is_empty());
    }
}
