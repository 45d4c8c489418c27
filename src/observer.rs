// src/observer.rs

//! Reporting sink shared by the resolver and the merge pipeline
//!
//! The resolver and every trigger report through an [`Observer`] handed to
//! them at construction time. Implementations:
//! - `TracingObserver`: forwards to `tracing` under a fixed target
//! - `RecordingObserver`: keeps messages in memory for reports and tests
//! - `NullObserver`: discards everything
//! - `SerializedObserver`: wraps another observer behind a mutex so worker
//!   pools inside a trigger deliver one message at a time

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Severity of a recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Core trait for reporting
///
/// Implementations must be thread-safe (Send + Sync). Return values are
/// never inspected; an observer cannot veto anything.
pub trait Observer: Send + Sync {
    fn warn(&self, msg: &str);

    fn error(&self, msg: &str);

    fn info(&self, msg: &str);

    fn debug(&self, msg: &str);
}

/// Shared handle used throughout the crate
pub type SharedObserver = Arc<dyn Observer>;

/// Observer that logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn warn(&self, msg: &str) {
        warn!(target: "pkgmerge::observer", "{}", msg);
    }

    fn error(&self, msg: &str) {
        error!(target: "pkgmerge::observer", "{}", msg);
    }

    fn info(&self, msg: &str) {
        info!(target: "pkgmerge::observer", "{}", msg);
    }

    fn debug(&self, msg: &str) {
        debug!(target: "pkgmerge::observer", "{}", msg);
    }
}

/// No-op observer for quiet or scripted use
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn warn(&self, _msg: &str) {}

    fn error(&self, _msg: &str) {}

    fn info(&self, _msg: &str) {}

    fn debug(&self, _msg: &str) {}
}

/// Observer that remembers every message
#[derive(Debug, Default)]
pub struct RecordingObserver {
    messages: Mutex<Vec<(Level, String)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: Level, msg: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, msg.to_string()));
        }
    }

    /// Snapshot of everything recorded so far
    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Messages at exactly `level`
    pub fn at_level(&self, level: Level) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// Whether any message at `level` contains `needle`
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.at_level(level).iter().any(|m| m.contains(needle))
    }
}

impl Observer for RecordingObserver {
    fn warn(&self, msg: &str) {
        self.push(Level::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }

    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }

    fn debug(&self, msg: &str) {
        self.push(Level::Debug, msg);
    }
}

/// Serializes calls into an inner observer
///
/// Triggers that fan work out to a thread pool hand each worker a clone of
/// this wrapper; the inner observer sees one call at a time.
#[derive(Clone)]
pub struct SerializedObserver {
    inner: Arc<Mutex<SharedObserver>>,
}

impl SerializedObserver {
    pub fn new(inner: SharedObserver) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn with<F: FnOnce(&dyn Observer)>(&self, f: F) {
        if let Ok(inner) = self.inner.lock() {
            f(inner.as_ref());
        }
    }
}

impl Observer for SerializedObserver {
    fn warn(&self, msg: &str) {
        self.with(|o| o.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.with(|o| o.error(msg));
    }

    fn info(&self, msg: &str) {
        self.with(|o| o.info(msg));
    }

    fn debug(&self, msg: &str) {
        self.with(|o| o.debug(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_recording_observer_levels() {
        let observer = RecordingObserver::new();
        observer.warn("disk nearly full");
        observer.info("merging");
        observer.debug("step 1");
        assert_eq!(observer.messages().len(), 3);
        assert_eq!(observer.at_level(Level::Warn), vec!["disk nearly full"]);
        assert!(observer.contains(Level::Info, "merg"));
        assert!(!observer.contains(Level::Error, "merg"));
    }

    #[test]
    fn test_serialized_observer_from_threads() {
        let recording = Arc::new(RecordingObserver::new());
        let serialized = SerializedObserver::new(recording.clone());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let obs = serialized.clone();
                thread::spawn(move || obs.info(&format!("worker {}", i)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(recording.at_level(Level::Info).len(), 8);
    }

    #[test]
    fn test_null_and_tracing_observers_accept_messages() {
        let observers: Vec<SharedObserver> =
            vec![Arc::new(NullObserver), Arc::new(TracingObserver)];
        for observer in observers {
            observer.warn("w");
            observer.error("e");
            observer.info("i");
            observer.debug("d");
        }
    }
}
