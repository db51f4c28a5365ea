//! Source files and the source-file manager (§4.1).
//!
//! A [`SourceFile`] is one compiler input, identified by one of four kinds:
//! a filesystem path, an in-memory buffer with a synthetic URL, the
//! process's standard input, or a sentinel `<none>` used for synthesized
//! diagnostics that have no real origin. Equality and hashing key off the
//! identifier, never the (possibly not-yet-loaded) contents.
//!
//! The [`SourceManager`] caches full contents and line-split views behind a
//! single lock, computing both lazily and memoizing under that one lock —
//! contention is bounded by first-touch, matching §5's concurrency model.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::span::{SourceId, SourceLoc, Span};

/// How a [`SourceFile`]'s contents are obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A real file on disk.
    Path(PathBuf),
    /// An in-memory buffer, identified by a synthetic URL (e.g. for a REPL
    /// line or a generated shim).
    Buffer { url: String, contents: String },
    /// The process's standard input, read eagerly to EOF at registration
    /// time — Trill is a batch compiler, not an interactive stdin reader.
    Stdin,
    /// No real source; used for synthesized/implicit nodes and internal
    /// diagnostics that must still carry *a* `SourceId`.
    None,
}

/// One registered compiler input.
///
/// Two `SourceFile`s are equal iff their identifying [`SourceKind`] is equal;
/// this governs [`SourceManager`] deduplication on `open`.
#[derive(Debug, Clone)]
pub struct SourceFile {
    id: SourceId,
    kind: SourceKind,
}

impl SourceFile {
    /// The display name used in diagnostics: the path, the buffer's URL,
    /// `<stdin>`, or `<unknown>`.
    pub fn display_name(&self) -> String {
        match &self.kind {
            SourceKind::Path(p) => p.display().to_string(),
            SourceKind::Buffer { url, .. } => url.clone(),
            SourceKind::Stdin => "<stdin>".to_string(),
            SourceKind::None => "<unknown>".to_string(),
        }
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lazily computed, memoized per-file state: full contents and the offsets
/// at which each line begins.
struct FileCache {
    contents: Option<String>,
    /// Byte offset of the start of each line; `line_starts[0] == 0`.
    line_starts: Option<Vec<usize>>,
}

impl FileCache {
    fn empty() -> Self {
        Self { contents: None, line_starts: None }
    }
}

/// Registers [`SourceFile`]s and serves their contents and line-split views.
///
/// A single [`parking_lot::Mutex`] guards both the identifier table and the
/// per-file cache (§4.1: "a single internal lock guards both caches").
/// Readers and writers all go through this one lock; since both contents and
/// line starts are memoized, steady-state contention is bounded by
/// first-touch per file.
pub struct SourceManager {
    inner: Mutex<Inner>,
}

struct Inner {
    files: Vec<SourceKind>,
    index: FxHashMap<SourceKind, SourceId>,
    cache: Vec<FileCache>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                files: Vec::new(),
                index: FxHashMap::default(),
                cache: Vec::new(),
            }),
        }
    }

    /// Registers a file path, returning its stable [`SourceId`].
    ///
    /// Opening the same path twice returns the same id without re-reading
    /// the file (contents are fetched lazily by [`SourceManager::contents`]).
    pub fn open_path(&self, path: impl Into<PathBuf>) -> SourceId {
        self.open(SourceKind::Path(path.into()))
    }

    /// Registers an in-memory buffer under a synthetic URL.
    pub fn open_buffer(&self, url: impl Into<String>, contents: impl Into<String>) -> SourceId {
        self.open(SourceKind::Buffer { url: url.into(), contents: contents.into() })
    }

    /// Registers standard input, reading it eagerly to EOF.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if stdin cannot be read.
    pub fn open_stdin(&self) -> io::Result<SourceId> {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let id = self.open(SourceKind::Stdin);
        let mut inner = self.inner.lock();
        inner.cache[id.index() as usize].contents = Some(buf);
        Ok(id)
    }

    /// Registers the sentinel "no source" file used for synthesized nodes.
    pub fn open_none(&self) -> SourceId {
        self.open(SourceKind::None)
    }

    fn open(&self, kind: SourceKind) -> SourceId {
        let mut inner = self.inner.lock();
        if let Some(&id) = inner.index.get(&kind) {
            return id;
        }
        let id = SourceId::new(inner.files.len() as u32);
        inner.index.insert(kind.clone(), id);
        inner.files.push(kind);
        inner.cache.push(FileCache::empty());
        id
    }

    /// Returns the registered [`SourceFile`] for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this manager.
    pub fn file(&self, id: SourceId) -> SourceFile {
        let inner = self.inner.lock();
        SourceFile { id, kind: inner.files[id.index() as usize].clone() }
    }

    /// Fetches (and memoizes) the full contents of `id`.
    ///
    /// Dispatches on the file's [`SourceKind`]: reads the path from disk,
    /// returns the buffer's contents directly, returns the eagerly-read
    /// stdin buffer, or the empty string for the `None` sentinel.
    ///
    /// # Errors
    ///
    /// Surfaces the underlying I/O error for `Path` sources; downstream
    /// diagnostics should fall back to `<unknown>` via
    /// [`SourceFile::display_name`] when this fails.
    pub fn contents(&self, id: SourceId) -> io::Result<std::sync::Arc<str>> {
        let mut inner = self.inner.lock();
        let idx = id.index() as usize;
        if let Some(c) = &inner.cache[idx].contents {
            return Ok(std::sync::Arc::from(c.as_str()));
        }
        let text = match &inner.files[idx] {
            SourceKind::Path(p) => fs::read_to_string(p)?,
            SourceKind::Buffer { contents, .. } => contents.clone(),
            SourceKind::Stdin => String::new(),
            SourceKind::None => String::new(),
        };
        inner.cache[idx].contents = Some(text.clone());
        Ok(std::sync::Arc::from(text.as_str()))
    }

    /// Fetches (and memoizes) the byte offset at which each line of `id`
    /// begins, splitting on Unicode line terminators (`\n`, `\r\n`, and
    /// lone `\r`).
    pub fn line_starts(&self, id: SourceId) -> io::Result<Vec<usize>> {
        {
            let inner = self.inner.lock();
            if let Some(starts) = &inner.cache[id.index() as usize].line_starts {
                return Ok(starts.clone());
            }
        }
        let text = self.contents(id)?;
        let starts = compute_line_starts(&text);
        let mut inner = self.inner.lock();
        inner.cache[id.index() as usize].line_starts = Some(starts.clone());
        Ok(starts)
    }

    /// Resolves a byte offset within `span.file` into a 1-based
    /// line/column [`SourceLoc`] (§3: "line indices are 1-based in
    /// locations, 0-based internally").
    pub fn resolve(&self, file: SourceId, offset: usize) -> io::Result<SourceLoc> {
        let starts = self.line_starts(file)?;
        // Binary search for the last line start <= offset.
        let line0 = match starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let column = offset.saturating_sub(starts[line0]) as u32 + 1;
        Ok(SourceLoc::new(file, line0 as u32 + 1, column, offset))
    }

    /// Convenience: resolves the start of `span`.
    pub fn resolve_start(&self, span: Span) -> io::Result<SourceLoc> {
        self.resolve(span.file, span.start)
    }

    /// Returns the text covered by `span`, or an empty string if the span
    /// is out of range (defensive against malformed implicit spans).
    pub fn text(&self, span: Span) -> io::Result<std::sync::Arc<str>> {
        let full = self.contents(span.file)?;
        let start = span.start.min(full.len());
        let end = span.end.min(full.len()).max(start);
        Ok(std::sync::Arc::from(&full[start..end]))
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                starts.push(i + 1);
                i += 1;
            }
            b'\r' => {
                let skip = if i + 1 < bytes.len() && bytes[i + 1] == b'\n' { 2 } else { 1 };
                starts.push(i + skip);
                i += skip;
            }
            _ => i += 1,
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_same_path_twice_is_idempotent() {
        let mgr = SourceManager::new();
        let a = mgr.open_path("foo.tr");
        let b = mgr.open_path("foo.tr");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_paths_get_distinct_ids() {
        let mgr = SourceManager::new();
        let a = mgr.open_path("a.tr");
        let b = mgr.open_path("b.tr");
        assert_ne!(a, b);
    }

    #[test]
    fn buffer_contents_are_returned_without_io() {
        let mgr = SourceManager::new();
        let id = mgr.open_buffer("<eval>", "func main() {}");
        let text = mgr.contents(id).unwrap();
        assert_eq!(&*text, "func main() {}");
    }

    #[test]
    fn line_starts_split_on_newlines() {
        let mgr = SourceManager::new();
        let id = mgr.open_buffer("<eval>", "a\nbb\nccc");
        let starts = mgr.line_starts(id).unwrap();
        assert_eq!(starts, vec![0, 2, 5]);
    }

    #[test]
    fn resolve_produces_one_based_line_and_column() {
        let mgr = SourceManager::new();
        let id = mgr.open_buffer("<eval>", "a\nbb\nccc");
        // offset 3 is the second 'b' on line 2 (0-based offsets 2,3 = "bb")
        let loc = mgr.resolve(id, 3).unwrap();
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 2);
    }

    #[test]
    fn resolve_first_byte_is_line_one_column_one() {
        let mgr = SourceManager::new();
        let id = mgr.open_buffer("<eval>", "hello");
        let loc = mgr.resolve(id, 0).unwrap();
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn none_source_has_unknown_display_name() {
        let mgr = SourceManager::new();
        let id = mgr.open_none();
        let file = mgr.file(id);
        assert_eq!(file.display_name(), "<unknown>");
    }

    #[test]
    fn text_extracts_span_contents() {
        let mgr = SourceManager::new();
        let id = mgr.open_buffer("<eval>", "hello world");
        let span = Span::new(id, 0, 5);
        assert_eq!(&*mgr.text(span).unwrap(), "hello");
    }
}
