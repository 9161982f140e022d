//! Observability subsystem for ccs
//!
//! Provides:
//! - Structured logging (JSON, one line per event, on stderr)
//! - Typed lifecycle events
//! - Begin/complete scopes for bulk operations
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on the operations it describes
//! 3. No background threads
//! 4. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use ccs::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::PinRecover, &[("cid", cid)]);
//!
//! let scope = ObservationScope::new("REPAIR");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{preview, Logger, Severity, DEBUG_ENV};
pub use scope::{ObservationScope, Timer};

fn severity_for(event: Event) -> Severity {
    if event.is_trace() {
        Severity::Trace
    } else if event.is_failure() {
        Severity::Error
    } else {
        Severity::Info
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}

/// Log a lifecycle event at WARN, regardless of its usual severity
pub fn warn_event(event: Event, fields: &[(&str, &str)]) {
    Logger::warn(event.as_str(), fields);
}
