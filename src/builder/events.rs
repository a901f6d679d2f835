//! Build event types for JSON output.
//!
//! These events are emitted one JSON object per line when using
//! `--message-format json`.
//!
//! # Event Types
//!
//! - `pch-reused`: A unit's fingerprint hit an existing artifact
//! - `pch-built`: A stable prefix was compiled and published
//! - `unit-finished`: A unit's object file was produced
//! - `unit-failed`: A unit stopped with an error
//! - `build-finished`: Batch build completed
//!
//! # Stability
//!
//! New fields may be added, but existing fields should not be removed or renamed.

use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::Serialize;

/// A build event emitted during the build process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// An existing precompiled artifact was reused.
    #[serde(rename = "pch-reused")]
    PchReused {
        /// Translation unit identity
        unit: String,
        /// Fingerprint of the stable prefix
        fingerprint: String,
    },

    /// A precompiled artifact was compiled for a fingerprint.
    #[serde(rename = "pch-built")]
    PchBuilt {
        unit: String,
        fingerprint: String,
        /// Number of headers in the stable prefix
        headers: usize,
        /// Artifact size in bytes
        size: usize,
        /// Whether this build's artifact is the stored one
        published: bool,
    },

    /// A unit compiled successfully.
    #[serde(rename = "unit-finished")]
    UnitFinished {
        unit: String,
        fingerprint: String,
        /// Object file written
        object: PathBuf,
        /// Whether the precompiled artifact was reused
        fresh: bool,
    },

    /// A unit failed.
    #[serde(rename = "unit-failed")]
    UnitFailed {
        unit: String,
        /// State the unit was in when it failed
        stage: String,
        /// Error message text
        message: String,
        /// Offending header, for ordering violations
        #[serde(skip_serializing_if = "Option::is_none")]
        header: Option<String>,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        /// Whether every unit succeeded
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        units_built: u64,
        units_failed: u64,
    },
}

impl BuildEvent {
    /// Create a build finished event.
    pub fn finished(built: u64, failed: u64, duration_ms: u64) -> Self {
        BuildEvent::BuildFinished {
            success: failed == 0,
            duration_ms,
            units_built: built,
            units_failed: failed,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receiver for build events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BuildEvent);
}

/// Writes each event as one JSON line to stdout.
#[derive(Debug, Default)]
pub struct JsonLinesSink {
    lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new() -> Self {
        JsonLinesSink::default()
    }
}

impl EventSink for JsonLinesSink {
    fn emit(&self, event: BuildEvent) {
        let _guard = self.lock.lock();
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", event.to_json());
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<BuildEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        CollectingSink::default()
    }

    pub fn events(&self) -> Vec<BuildEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: BuildEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reused_serialization() {
        let event = BuildEvent::PchReused {
            unit: "myapp.cpp".to_string(),
            fingerprint: "ab".repeat(32),
        };
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"pch-reused\""));
        assert!(json.contains("\"unit\":\"myapp.cpp\""));
    }

    #[test]
    fn test_finished_serialization() {
        let json = BuildEvent::finished(3, 1, 2340).to_json();
        assert!(json.contains("\"reason\":\"build-finished\""));
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"duration_ms\":2340"));
        assert!(json.contains("\"units_failed\":1"));
    }

    #[test]
    fn test_failed_omits_missing_header() {
        let event = BuildEvent::UnitFailed {
            unit: "myapp.cpp".to_string(),
            stage: "validating".to_string(),
            message: "boundary missing".to_string(),
            header: None,
        };
        let json = event.to_json();
        assert!(json.contains("\"reason\":\"unit-failed\""));
        assert!(!json.contains("\"header\""));
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.emit(BuildEvent::finished(1, 0, 5));
        assert_eq!(sink.events(), vec![BuildEvent::finished(1, 0, 5)]);
    }
}
