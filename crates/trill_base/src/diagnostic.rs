//! The diagnostic engine (§4.2).
//!
//! Diagnostics accumulate in a [`DiagnosticEngine`] over the lifetime of a
//! compilation. Before being handed to consumers the engine deduplicates by
//! rendered description and sorts by `(file identity, byte offset)`, with
//! diagnostics that carry no location sorting last. Every registered
//! [`DiagnosticConsumer`] sees that single sorted, deduplicated stream once,
//! followed by a finalization call.

use std::cmp::Ordering;

use crate::span::{SourceId, Span};

/// The severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    Note,
    Warning,
    Error,
}

/// A secondary source range attached to a diagnostic, e.g. to underline a
/// related expression alongside the primary location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub span: Span,
    pub label: Option<&'static str>,
}

impl Highlight {
    pub fn new(span: Span) -> Self {
        Self { span, label: None }
    }

    pub fn labeled(span: Span, label: &'static str) -> Self {
        Self { span, label: Some(label) }
    }
}

/// One compiler diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Primary location, if any. Diagnostics synthesized without a real
    /// origin (e.g. driver-level configuration errors) carry `None`.
    pub location: Option<Span>,
    pub highlights: Vec<Highlight>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Error, message: message.into(), location: None, highlights: Vec::new() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Warning, message: message.into(), location: None, highlights: Vec::new() }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Note, message: message.into(), location: None, highlights: Vec::new() }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.location = Some(span);
        self
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlights.push(highlight);
        self
    }

    /// The rendered form used for deduplication: kind, message, and
    /// location collapsed to one string. Two diagnostics that print
    /// identically are the same diagnostic regardless of how they were
    /// constructed.
    fn dedup_key(&self) -> String {
        match self.location {
            Some(span) => format!("{:?}:{}:{}:{}", self.kind, span.file.index(), span.start, self.message),
            None => format!("{:?}:<none>:{}", self.kind, self.message),
        }
    }

    /// Sort key: `(file identity, byte offset)`, with no-location
    /// diagnostics ordered last and stable relative to each other.
    fn sort_key(&self) -> (bool, Option<SourceId>, usize) {
        match self.location {
            Some(span) => (false, Some(span.file), span.start),
            None => (true, None, 0),
        }
    }
}

/// Receives the finished, sorted, deduplicated diagnostic stream from a
/// [`DiagnosticEngine`].
///
/// Implementors render diagnostics however they see fit — to a terminal, to
/// JSON, to an in-memory buffer for tests. `finish` is called exactly once,
/// after every diagnostic in the batch has been delivered.
pub trait DiagnosticConsumer {
    fn consume(&mut self, diagnostic: &Diagnostic);

    /// Called once after the full sorted, deduplicated batch has been
    /// delivered via `consume`. The default implementation does nothing.
    fn finish(&mut self) {}
}

/// Accumulates diagnostics for one compilation and distributes the
/// sorted, deduplicated stream to registered consumers.
#[derive(Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    has_errors: bool,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a diagnostic. Deduplication happens at [`DiagnosticEngine::emit_to`]
    /// time, not here, so repeated identical emissions before that point are
    /// cheap appends.
    pub fn emit(&mut self, diagnostic: Diagnostic) {
        if diagnostic.kind == DiagnosticKind::Error {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// `true` if any emitted diagnostic has [`DiagnosticKind::Error`]
    /// severity. Passes in the driver pipeline (§4.10) short-circuit on
    /// this flag.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Sorts by `(file identity, byte offset)` (location-less diagnostics
    /// last) and deduplicates by rendered description, then delivers the
    /// resulting stream to `consumer` followed by a finalization call.
    pub fn emit_to(&self, consumer: &mut dyn DiagnosticConsumer) {
        for diagnostic in self.sorted_deduped() {
            consumer.consume(diagnostic);
        }
        consumer.finish();
    }

    /// Delivers the same sorted, deduplicated stream to every consumer in
    /// `consumers`, each independently, each followed by its own `finish`.
    pub fn emit_to_all(&self, consumers: &mut [Box<dyn DiagnosticConsumer>]) {
        let batch = self.sorted_deduped();
        for consumer in consumers.iter_mut() {
            for diagnostic in &batch {
                consumer.consume(diagnostic);
            }
            consumer.finish();
        }
    }

    fn sorted_deduped(&self) -> Vec<&Diagnostic> {
        let mut seen = std::collections::HashSet::new();
        let mut out: Vec<&Diagnostic> = Vec::new();
        for d in &self.diagnostics {
            if seen.insert(d.dedup_key()) {
                out.push(d);
            }
        }
        out.sort_by(|a, b| {
            a.sort_key()
                .0
                .cmp(&b.sort_key().0)
                .then_with(|| match (a.location, b.location) {
                    (Some(sa), Some(sb)) => sa
                        .file
                        .index()
                        .cmp(&sb.file.index())
                        .then(sa.start.cmp(&sb.start)),
                    _ => Ordering::Equal,
                })
        });
        out
    }
}

/// Plain-text diagnostic rendering with a caret pointing at the offending
/// column (§4.2 `[FULL]`). No ANSI color, per `spec.md` §1's non-goal.
pub struct HumanConsumer<'a> {
    sources: &'a crate::source::SourceManager,
    output: String,
}

impl<'a> HumanConsumer<'a> {
    pub fn new(sources: &'a crate::source::SourceManager) -> Self {
        Self { sources, output: String::new() }
    }

    /// Consumes the consumer, returning everything rendered so far.
    pub fn into_output(self) -> String {
        self.output
    }

    fn render_snippet(&mut self, span: Span) {
        let (Ok(loc), Ok(line_starts)) = (self.sources.resolve_start(span), self.sources.line_starts(span.file))
        else {
            return;
        };
        let Ok(contents) = self.sources.contents(span.file) else { return };
        let line_index = (loc.line as usize).saturating_sub(1);
        let line_start = line_starts.get(line_index).copied().unwrap_or(0);
        let line_end = line_starts.get(line_index + 1).map(|&e| e.saturating_sub(1)).unwrap_or(contents.len());
        let line_text = &contents[line_start..line_end.max(line_start)];
        let file = self.sources.file(span.file);
        self.output.push_str(&format!("  --> {}:{}:{}\n", file.display_name(), loc.line, loc.column));
        self.output.push_str(&format!("   | {line_text}\n"));
        let caret_column = loc.column.saturating_sub(1) as usize;
        self.output.push_str(&format!("   | {}^\n", " ".repeat(caret_column)));
    }
}

impl<'a> DiagnosticConsumer for HumanConsumer<'a> {
    fn consume(&mut self, diagnostic: &Diagnostic) {
        let prefix = match diagnostic.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        };
        self.output.push_str(&format!("{prefix}: {}\n", diagnostic.message));
        if let Some(span) = diagnostic.location {
            self.render_snippet(span);
        }
    }
}

/// JSON diagnostic rendering matching `spec.md` §6's "diagnostics as JSON"
/// output mode. Takes an optional [`crate::source::SourceManager`] so a
/// located diagnostic's line/column can be resolved; without one, only the
/// raw byte offset is reported.
pub struct JsonConsumer<'a> {
    sources: Option<&'a crate::source::SourceManager>,
    entries: Vec<JsonDiagnostic>,
}

#[derive(serde::Serialize)]
struct JsonSourceLoc {
    line: u32,
    column: u32,
    offset: usize,
}

#[derive(serde::Serialize)]
struct JsonHighlight {
    start: JsonSourceLoc,
    end: JsonSourceLoc,
}

#[derive(serde::Serialize)]
struct JsonDiagnostic {
    #[serde(rename = "type")]
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "sourceLocation")]
    source_location: Option<JsonSourceLoc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    highlights: Vec<JsonHighlight>,
}

impl<'a> JsonConsumer<'a> {
    pub fn new(sources: Option<&'a crate::source::SourceManager>) -> Self {
        Self { sources, entries: Vec::new() }
    }

    /// Renders the accumulated batch as a JSON array, matching `spec.md`
    /// §6's documented schema. Called after every diagnostic has been
    /// delivered via `consume`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.entries).unwrap_or(serde_json::Value::Array(Vec::new()))
    }

    fn resolve(&self, span: Span) -> Option<JsonSourceLoc> {
        let sources = self.sources?;
        let loc = sources.resolve(span.file, span.start).ok()?;
        Some(JsonSourceLoc { line: loc.line, column: loc.column, offset: span.start })
    }
}

impl<'a> DiagnosticConsumer for JsonConsumer<'a> {
    fn consume(&mut self, diagnostic: &Diagnostic) {
        let kind = match diagnostic.kind {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Note => "note",
        };
        let file = diagnostic
            .location
            .and_then(|span| self.sources.map(|sources| sources.file(span.file).display_name()));
        let highlights = diagnostic
            .highlights
            .iter()
            .filter_map(|h| {
                let start = self.resolve(Span::new(h.span.file, h.span.start, h.span.start))?;
                let end = self.resolve(Span::new(h.span.file, h.span.end, h.span.end))?;
                Some(JsonHighlight { start, end })
            })
            .collect();
        self.entries.push(JsonDiagnostic {
            kind,
            message: diagnostic.message.clone(),
            file,
            source_location: diagnostic.location.and_then(|span| self.resolve(span)),
            highlights,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingConsumer {
        messages: Vec<String>,
        finished: bool,
    }

    impl RecordingConsumer {
        fn new() -> Self {
            Self { messages: Vec::new(), finished: false }
        }
    }

    impl DiagnosticConsumer for RecordingConsumer {
        fn consume(&mut self, diagnostic: &Diagnostic) {
            self.messages.push(diagnostic.message.clone());
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn file() -> SourceId {
        SourceId::new(0)
    }

    #[test]
    fn has_errors_is_false_until_an_error_is_emitted() {
        let mut engine = DiagnosticEngine::new();
        assert!(!engine.has_errors());
        engine.emit(Diagnostic::warning("just a warning"));
        assert!(!engine.has_errors());
        engine.emit(Diagnostic::error("bad"));
        assert!(engine.has_errors());
    }

    #[test]
    fn emit_to_sorts_by_byte_offset_within_file() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("second").at(Span::new(file(), 10, 12)));
        engine.emit(Diagnostic::error("first").at(Span::new(file(), 0, 2)));
        let mut consumer = RecordingConsumer::new();
        engine.emit_to(&mut consumer);
        assert_eq!(consumer.messages, vec!["first".to_string(), "second".to_string()]);
        assert!(consumer.finished);
    }

    #[test]
    fn diagnostics_without_location_sort_last() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("no location"));
        engine.emit(Diagnostic::error("has location").at(Span::new(file(), 5, 6)));
        let mut consumer = RecordingConsumer::new();
        engine.emit_to(&mut consumer);
        assert_eq!(consumer.messages, vec!["has location".to_string(), "no location".to_string()]);
    }

    #[test]
    fn identical_diagnostics_are_deduplicated() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("duplicate").at(Span::new(file(), 0, 1)));
        engine.emit(Diagnostic::error("duplicate").at(Span::new(file(), 0, 1)));
        let mut consumer = RecordingConsumer::new();
        engine.emit_to(&mut consumer);
        assert_eq!(consumer.messages.len(), 1);
    }

    #[test]
    fn distinct_locations_are_not_deduplicated() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("same message").at(Span::new(file(), 0, 1)));
        engine.emit(Diagnostic::error("same message").at(Span::new(file(), 5, 6)));
        let mut consumer = RecordingConsumer::new();
        engine.emit_to(&mut consumer);
        assert_eq!(consumer.messages.len(), 2);
    }

    #[test]
    fn each_registered_consumer_sees_the_full_stream_once() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("a").at(Span::new(file(), 0, 1)));
        engine.emit(Diagnostic::warning("b").at(Span::new(file(), 2, 3)));
        let mut c1 = RecordingConsumer::new();
        let mut c2 = RecordingConsumer::new();
        let mut consumers: Vec<Box<dyn DiagnosticConsumer>> = vec![Box::new(RecordingConsumer::new())];
        engine.emit_to(&mut c1);
        engine.emit_to(&mut c2);
        assert_eq!(c1.messages, c2.messages);
        assert!(c1.finished && c2.finished);
        // Also exercise the multi-consumer batch path.
        engine.emit_to_all(&mut consumers);
    }

    #[test]
    fn ordering_across_files_uses_file_identity_first() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("in file 1").at(Span::new(SourceId::new(1), 0, 1)));
        engine.emit(Diagnostic::error("in file 0").at(Span::new(SourceId::new(0), 100, 101)));
        let mut consumer = RecordingConsumer::new();
        engine.emit_to(&mut consumer);
        assert_eq!(consumer.messages, vec!["in file 0".to_string(), "in file 1".to_string()]);
    }

    #[test]
    fn json_consumer_matches_the_documented_schema() {
        let sources = crate::source::SourceManager::new();
        let id = sources.open_buffer("<eval>", "let x: Int = \"hello\"");
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::error("cannot assign value of type String to Int").at(Span::new(id, 13, 20)));
        let mut consumer = JsonConsumer::new(Some(&sources));
        engine.emit_to(&mut consumer);
        let json = consumer.to_json();
        let entry = &json.as_array().unwrap()[0];
        assert_eq!(entry["type"], "error");
        assert_eq!(entry["message"], "cannot assign value of type String to Int");
        assert_eq!(entry["file"], "<eval>");
        assert_eq!(entry["sourceLocation"]["line"], 1);
        assert_eq!(entry["sourceLocation"]["offset"], 13);
    }

    #[test]
    fn json_consumer_without_a_source_manager_omits_location() {
        let mut engine = DiagnosticEngine::new();
        engine.emit(Diagnostic::warning("just a warning"));
        let mut consumer = JsonConsumer::new(None);
        engine.emit_to(&mut consumer);
        let json = consumer.to_json();
        let entry = &json.as_array().unwrap()[0];
        assert_eq!(entry["type"], "warning");
        assert!(entry.get("sourceLocation").is_none());
    }
}
