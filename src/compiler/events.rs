//! Diagnostic event log of the transformation pipeline.
//!
//! Everything the engine decides about a compilation unit is recorded here:
//! transformations (encrypted constants, promoted locals, generated decoders),
//! recoverable problems (clamped configuration values, unsupported types) and
//! pass progress. Nothing in this log is fatal; fatal conditions are reported
//! through [`crate::Error`] instead.
//!
//! # Example
//!
//! ```rust
//! use obscura::compiler::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::ConstantEncrypted)
//!     .declaration("secret_key")
//!     .message("lite x1, deep x2");
//! log.warn("L2G_PROB=250 clamped to 100");
//!
//! assert_eq!(log.count_kind(EventKind::ConstantEncrypted), 1);
//! assert_eq!(log.warnings().count(), 1);
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A scalar constant was replaced by ciphertext.
    ConstantEncrypted,
    /// An array or vector constant was replaced by ciphertext.
    ArrayEncrypted,
    /// A function-local constant was promoted to module scope.
    LocalPromoted,
    /// A constant binary operation result was turned into a synthetic local.
    OperationPromoted,
    /// A promotion candidate was collapsed into an identical promoted global.
    ConstantDeduplicated,
    /// A shared decode routine was generated.
    DecoderGenerated,
    /// A read of a protected declaration was rewritten to decode it.
    UseSiteRewritten,
    /// A candidate declaration was excluded by the filter.
    DeclarationExcluded,
    /// A declaration of an unsupported type was left as plaintext.
    UnsupportedType,
    /// An out-of-range configuration value was clamped.
    ConfigurationClamped,

    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::ConstantEncrypted => "constant encrypted",
            Self::ArrayEncrypted => "array encrypted",
            Self::LocalPromoted => "local promoted",
            Self::OperationPromoted => "operation promoted",
            Self::ConstantDeduplicated => "constant deduplicated",
            Self::DecoderGenerated => "decoder generated",
            Self::UseSiteRewritten => "use-site rewritten",
            Self::DeclarationExcluded => "declaration excluded",
            Self::UnsupportedType => "unsupported type",
            Self::ConfigurationClamped => "configuration clamped",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the module.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::ConstantEncrypted
                | Self::ArrayEncrypted
                | Self::LocalPromoted
                | Self::OperationPromoted
                | Self::ConstantDeduplicated
                | Self::DecoderGenerated
                | Self::UseSiteRewritten
        )
    }

    /// Returns true if this event should reach the host's diagnostic channel.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType
                | Self::ConfigurationClamped
                | Self::ConstantDeduplicated
                | Self::Info
                | Self::Warning
                | Self::Error
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function the event concerns (if applicable).
    pub function: Option<String>,
    /// The declaration the event concerns (if applicable).
    pub declaration: Option<String>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            declaration: None,
            message: message.into(),
            pass: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        match (&self.function, &self.declaration) {
            (Some(function), Some(decl)) => write!(f, " {function}::{decl}:")?,
            (Some(function), None) => write!(f, " {function}:")?,
            (None, Some(decl)) => write!(f, " {decl}:")?,
            (None, None) => {}
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    declaration: Option<String>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            declaration: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and the declaration inside it.
    pub fn at(mut self, function: impl Into<String>, declaration: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self.declaration = Some(declaration.into());
        self
    }

    /// Sets only the function.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Sets only the declaration.
    pub fn declaration(mut self, declaration: impl Into<String>) -> Self {
        self.declaration = Some(declaration.into());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            function: self.function.take(),
            declaration: self.declaration.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Collection of events of one compilation unit.
///
/// Append-only and thread-safe: events can be recorded through shared
/// references. Statistics are derived from the events rather than tracked
/// separately.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let log = Self::new();
        log.merge(self);
        log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        let event = Event::new(EventKind::Warning, message);
        log::warn!("{}", event.message);
        self.events.push(event);
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of another log.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.events
            .iter()
            .filter_map(move |(_, e)| if e.kind == kind { Some(e) } else { None })
    }

    /// Returns an iterator over events concerning one declaration.
    pub fn filter_declaration<'a>(
        &'a self,
        declaration: &'a str,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .map(|(_, e)| e)
            .filter(move |e| e.declaration.as_deref() == Some(declaration))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over the events meant for the host's diagnostic channel.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Returns the number of unique functions with transformation events.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.function.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of all transformation events.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

/// Statistics derived from an EventLog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Number of functions with any transformation.
    pub functions_transformed: usize,
    /// Number of scalar constants encrypted.
    pub constants_encrypted: usize,
    /// Number of arrays and vectors encrypted.
    pub arrays_encrypted: usize,
    /// Number of locals promoted to module scope.
    pub locals_promoted: usize,
    /// Number of synthetic locals created from constant operations.
    pub operations_promoted: usize,
    /// Number of promotion candidates collapsed by deduplication.
    pub deduplicated: usize,
    /// Number of shared decode routines generated.
    pub decoders_generated: usize,
    /// Number of reads rewritten to decode.
    pub use_sites_rewritten: usize,
    /// Number of candidates excluded by the filter.
    pub excluded: usize,
    /// Number of declarations skipped for unsupported types.
    pub unsupported: usize,
    /// Number of clamped configuration values.
    pub clamped: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            functions_transformed: log.functions_affected(),
            constants_encrypted: get(EventKind::ConstantEncrypted),
            arrays_encrypted: get(EventKind::ArrayEncrypted),
            locals_promoted: get(EventKind::LocalPromoted),
            operations_promoted: get(EventKind::OperationPromoted),
            deduplicated: get(EventKind::ConstantDeduplicated),
            decoders_generated: get(EventKind::DecoderGenerated),
            use_sites_rewritten: get(EventKind::UseSiteRewritten),
            excluded: get(EventKind::DeclarationExcluded),
            unsupported: get(EventKind::UnsupportedType),
            clamped: get(EventKind::ConfigurationClamped),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
        }
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.constants_encrypted > 0 {
            parts.push(format!("{} constants encrypted", self.constants_encrypted));
        }
        if self.arrays_encrypted > 0 {
            parts.push(format!("{} arrays encrypted", self.arrays_encrypted));
        }
        if self.locals_promoted > 0 {
            parts.push(format!("{} locals promoted", self.locals_promoted));
        }
        if self.operations_promoted > 0 {
            parts.push(format!("{} operations promoted", self.operations_promoted));
        }
        if self.deduplicated > 0 {
            parts.push(format!("{} deduplicated", self.deduplicated));
        }
        if self.decoders_generated > 0 {
            parts.push(format!("{} decoders", self.decoders_generated));
        }
        if self.use_sites_rewritten > 0 {
            parts.push(format!("{} use-sites", self.use_sites_rewritten));
        }
        if self.functions_transformed > 0 {
            parts.push(format!("{} functions", self.functions_transformed));
        }

        if self.unsupported > 0 {
            parts.push(format!("{} unsupported", self.unsupported));
        }
        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }

        if parts.is_empty() {
            "no transformations".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_log() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert!(!log.has(EventKind::ConstantEncrypted));
        assert_eq!(log.summary(), "no events");
    }

    #[test]
    fn test_builder_commits_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::LocalPromoted)
            .at("main", "local_secret")
            .pass("promotion");
        log.record(EventKind::UnsupportedType)
            .declaration("wide")
            .message("i128 is not supported");

        assert_eq!(log.len(), 2);
        let event = log.filter_kind(EventKind::LocalPromoted).next().unwrap();
        assert_eq!(event.message, "local promoted");
        assert_eq!(event.function.as_deref(), Some("main"));
        assert_eq!(event.pass.as_deref(), Some("promotion"));
        assert_eq!(log.filter_declaration("wide").count(), 1);
    }

    #[test]
    fn test_diagnostics_and_transformations() {
        let log = EventLog::new();
        log.record(EventKind::ConstantEncrypted).declaration("a");
        log.record(EventKind::ConstantDeduplicated).declaration("b");
        log.record(EventKind::ConfigurationClamped).message("ENC_LITE_TIMES=0 clamped to 1");
        log.record(EventKind::PassStarted);

        assert_eq!(log.transformations().count(), 2);
        assert_eq!(log.diagnostics().count(), 2);
    }

    #[test]
    fn test_summary_and_stats() {
        let log = EventLog::new();
        log.record(EventKind::ConstantEncrypted).at("main", "a");
        log.record(EventKind::ConstantEncrypted).at("main", "b");
        log.record(EventKind::ArrayEncrypted).at("helper", "table");
        log.warn("odd flag");

        assert_eq!(log.summary(), "1 array encrypted, 2 constant encrypted");

        let stats = DerivedStats::from_log(&log);
        assert_eq!(stats.constants_encrypted, 2);
        assert_eq!(stats.arrays_encrypted, 1);
        assert_eq!(stats.functions_transformed, 2);
        assert_eq!(stats.warnings, 1);
        assert!(stats.summary().contains("2 constants encrypted"));
    }

    #[test]
    fn test_clone_and_merge() {
        let log = EventLog::new();
        log.info("first");
        let copy = log.clone();
        copy.info("second");

        assert_eq!(log.len(), 1);
        assert_eq!(copy.len(), 2);

        log.merge(&copy);
        assert_eq!(log.len(), 3);
    }
}
