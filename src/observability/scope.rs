//! ObservationScope for automatic begin/complete logging
//!
//! - Logs BEGIN on creation
//! - Logs COMPLETE or FAILED when closed explicitly
//! - Logs INCOMPLETE on drop if never closed

use super::logger::Logger;

/// A scope that logs the lifecycle of one operation.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("REPAIR", &[("dry_run", "false")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("broken", "2")]);
/// ```
///
/// The scope owns its fields, so it is `Send` and can live across
/// `.await` points inside operation futures.
pub struct ObservationScope {
    name: &'static str,
    completed: bool,
    fields: Vec<(&'static str, String)>,
}

impl ObservationScope {
    /// Create a new observation scope. Logs `{name}_BEGIN` immediately.
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every line.
    pub fn with_fields(name: &'static str, fields: &[(&'static str, &str)]) -> Self {
        let event = format!("{}_BEGIN", name);
        Logger::info(&event, fields);

        Self {
            name,
            completed: false,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    /// Mark the scope as successfully completed. Logs `{name}_COMPLETE`.
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as completed with result fields.
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let event = format!("{}_COMPLETE", self.name);
        let mut all_fields = self.field_refs();
        all_fields.extend(extra_fields.iter().copied());
        Logger::info(&event, &all_fields);
    }

    /// Mark the scope as failed. Logs `{name}_FAILED` at ERROR level.
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        let event = format!("{}_FAILED", self.name);
        let mut all_fields = self.field_refs();
        all_fields.push(("reason", reason));
        Logger::error(&event, &all_fields);
    }

    /// Check if the scope has been closed
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            let event = format!("{}_INCOMPLETE", self.name);
            Logger::warn(&event, &[("reason", "scope dropped without completion")]);
        }
    }
}

/// A simple duration timer for logging elapsed time
pub struct Timer {
    start: std::time::Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }

    /// Get elapsed milliseconds as a string
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
