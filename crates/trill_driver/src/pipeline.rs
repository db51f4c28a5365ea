//! The compiler's pass pipeline (§4.10): `Pipeline` runs a fixed sequence
//! of `Pass`es over one [`CompilationUnit`], halting at the first one that
//! leaves the session's diagnostic engine with errors recorded (§7 tier 1
//! — "the driver halts the pass pipeline at the first pass whose run
//! leaves `has errors` true").
//!
//! This covers the front end through type checking, where diagnostics
//! accumulate and short-circuiting applies. Codegen is a separate step
//! (see [`crate::generate_ir`]): it needs a borrowed `inkwell::context::
//! Context` supplied by the caller, which doesn't fit this trait's
//! signature without infecting every `Pass` with that lifetime, and it has
//! nothing left to recover from once it runs — any failure there is a
//! tier-2 `InternalError`, not a diagnostic.

use std::time::{Duration, Instant};

use trill_base::CompilerSession;
use trill_sema::SemaOutput;
use trill_syntax::ast::{AstContext, DeclId, Module};
use trill_typeck::TypeckOutput;

/// One file's worth of parsed declarations, carried alongside the shared
/// [`AstContext`]/[`trill_base::Interner`] every file in a compilation was
/// parsed into (§5: "parsing N files in parallel produces the same merged
/// AST... as parsing them sequentially").
pub struct ParsedFile {
    pub source: trill_base::SourceId,
    pub module: Module,
}

/// Everything the pipeline threads between passes: the shared AST arena,
/// each input file's own parsed declarations, the declarations merged into
/// one list in input-file order (what Sema/typeck actually walk), and the
/// outputs later passes attach once they run.
pub struct CompilationUnit {
    pub ast: AstContext,
    pub files: Vec<ParsedFile>,
    pub merged: Module,
    pub sema: Option<SemaOutput>,
    pub typeck: Option<TypeckOutput>,
}

impl CompilationUnit {
    pub fn new(ast: AstContext, files: Vec<ParsedFile>) -> Self {
        let mut decls: Vec<DeclId> = Vec::new();
        for file in &files {
            decls.extend(file.module.decls.iter().copied());
        }
        Self { ast, files, merged: Module { decls }, sema: None, typeck: None }
    }
}

/// Whether the pipeline should continue to the next pass regardless of the
/// diagnostic engine's state, or halt here even if no error was recorded
/// (used by a pass like `--parse-only` that intentionally stops early).
pub enum PassOutcome {
    Continue,
    Halt,
}

/// One stage of the pipeline. `run` mutates `unit` in place and records any
/// diagnostics on `session`; a pass that discovers a problem a user can fix
/// emits through `session.diags` rather than returning `Err` — only a
/// tier-2 internal-invariant violation (§7) is worth a Rust-level error,
/// and those `panic!` rather than flow through this trait.
pub trait Pass {
    fn name(&self) -> &'static str;
    fn run(&mut self, session: &mut CompilerSession, unit: &mut CompilationUnit) -> PassOutcome;
}

/// One pass's wall-clock cost, backing `--emit-pass-timings` (§6)
/// independent of whether `tracing` output is enabled.
#[derive(Debug, Clone)]
pub struct PassTiming {
    pub name: String,
    pub duration: Duration,
}

/// A fixed sequence of passes run in order over one [`CompilationUnit`].
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn push(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    /// Runs every pass in order, stopping after the first one that leaves
    /// `session.diags.has_errors()` true or that returns
    /// [`PassOutcome::Halt`]. Returns the per-pass timing table regardless
    /// of where the pipeline stopped.
    pub fn run(&mut self, session: &mut CompilerSession, unit: &mut CompilationUnit) -> Vec<PassTiming> {
        let mut timings = Vec::with_capacity(self.passes.len());
        for pass in &mut self.passes {
            let span = tracing::info_span!("pass", name = pass.name());
            let _entered = span.enter();
            let start = Instant::now();
            let outcome = pass.run(session, unit);
            let duration = start.elapsed();
            tracing::debug!(pass = pass.name(), ?duration, "pass finished");
            timings.push(PassTiming { name: pass.name().to_string(), duration });
            if session.diags.has_errors() || matches!(outcome, PassOutcome::Halt) {
                break;
            }
        }
        timings
    }
}

/// Runs Sema (§4.6) over the unit's merged module.
pub struct SemaPass {
    pub foreign_decls: Vec<trill_importer::ForeignDecl>,
}

impl SemaPass {
    pub fn new(foreign_decls: Vec<trill_importer::ForeignDecl>) -> Self {
        Self { foreign_decls }
    }
}

impl Pass for SemaPass {
    fn name(&self) -> &'static str {
        "sema"
    }

    fn run(&mut self, session: &mut CompilerSession, unit: &mut CompilationUnit) -> PassOutcome {
        let foreign_decls = std::mem::take(&mut self.foreign_decls);
        let sema = trill_sema::analyze(
            &mut unit.merged,
            &mut unit.ast,
            &mut session.interner,
            foreign_decls,
            &mut session.diags,
        );
        unit.sema = Some(sema);
        PassOutcome::Continue
    }
}

/// Runs the type checker (§4.7) using Sema's output.
pub struct TypeckPass;

impl Pass for TypeckPass {
    fn name(&self) -> &'static str {
        "typeck"
    }

    fn run(&mut self, session: &mut CompilerSession, unit: &mut CompilationUnit) -> PassOutcome {
        let sema = unit.sema.as_ref().expect("sema pass runs before typeck");
        let out = trill_typeck::check(&unit.merged, &mut unit.ast, &mut session.interner, sema, &mut session.diags);
        unit.typeck = Some(out);
        PassOutcome::Continue
    }
}

/// Reads and parses every input file (§5): file contents are fetched in
/// parallel over a `rayon` thread pool (genuinely independent per file —
/// plain I/O against a thread-safe [`trill_base::SourceManager`]), then
/// lexed and parsed sequentially, in input order, into one shared
/// [`AstContext`] and [`trill_base::Interner`].
///
/// Lexing and parsing can't run concurrently across files the way the file
/// reads do: both need `&mut` access to the same interner (so every file
/// shares one symbol table) and the same AST arena (so declaration ids are
/// stable and comparable across files), and neither of those is safe to
/// mutate from multiple threads at once in this arena's design. Reading
/// ahead in parallel still removes the dominant cost (file I/O) from the
/// pipeline's critical path; only the CPU-bound lex/parse work is
/// serialized, and it runs in the same deterministic input-file order a
/// sequential pipeline would use, so the merged AST is identical either
/// way (§8: "parsing N files in parallel produces the same merged AST...
/// as parsing them sequentially").
pub fn parse_files(session: &mut CompilerSession, inputs: &[trill_base::SourceId]) -> CompilationUnit {
    use rayon::prelude::*;

    let contents: Vec<(trill_base::SourceId, std::sync::Arc<str>)> = inputs
        .par_iter()
        .map(|&id| {
            let text = session.sources.contents(id).unwrap_or_else(|_| std::sync::Arc::from(""));
            (id, text)
        })
        .collect();

    let mut ast = AstContext::new();
    let mut files = Vec::with_capacity(contents.len());
    for (id, text) in contents {
        let tokens = trill_syntax::Lexer::new(id, &text).tokenize(&mut session.interner, &mut session.diags);
        let module =
            trill_syntax::Parser::new(id, tokens, &mut ast, &mut session.interner, &mut session.diags).parse_module();
        files.push(ParsedFile { source: id, module });
    }

    CompilationUnit::new(ast, files)
}

/// Parses every registered C header (`--include`, §4.5) into foreign
/// declarations ready for [`SemaPass`], in input order.
pub fn import_headers(session: &mut CompilerSession, headers: &[(trill_base::SourceId, String)]) -> Vec<trill_importer::ForeignDecl> {
    let mut decls = Vec::new();
    for (id, source) in headers {
        decls.extend(trill_importer::import_header(*id, source, &mut session.diags));
    }
    decls
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A no-op pass that records whether it ran, so tests can tell whether
    /// the pipeline actually halted after an earlier pass left an error.
    struct MarkerPass(std::rc::Rc<std::cell::Cell<bool>>);

    impl Pass for MarkerPass {
        fn name(&self) -> &'static str {
            "marker"
        }

        fn run(&mut self, _session: &mut CompilerSession, _unit: &mut CompilationUnit) -> PassOutcome {
            self.0.set(true);
            PassOutcome::Continue
        }
    }

    fn run(sources: &[&str]) -> (CompilerSession, CompilationUnit, Vec<PassTiming>, bool) {
        let mut session = CompilerSession::new();
        let ids: Vec<_> =
            sources.iter().enumerate().map(|(i, s)| session.sources.open_buffer(format!("t{i}.trill"), *s)).collect();
        let mut unit = parse_files(&mut session, &ids);
        let marker_ran = std::rc::Rc::new(std::cell::Cell::new(false));
        let mut pipe = Pipeline::new();
        pipe.push(Box::new(SemaPass::new(Vec::new())));
        pipe.push(Box::new(TypeckPass));
        pipe.push(Box::new(MarkerPass(marker_ran.clone())));
        let timings = pipe.run(&mut session, &mut unit);
        (session, unit, timings, marker_ran.get())
    }

    #[test]
    fn a_clean_program_runs_every_pass_with_no_diagnostics() {
        let (session, unit, timings, marker_ran) = run(&["func main() { let x = 1 }"]);
        assert!(!session.diags.has_errors());
        assert!(unit.sema.is_some());
        assert!(unit.typeck.is_some());
        assert_eq!(timings.len(), 3);
        assert_eq!(timings[0].name, "sema");
        assert_eq!(timings[1].name, "typeck");
        assert!(marker_ran, "a clean compilation should reach every pass");
    }

    #[test]
    fn a_type_mismatch_halts_the_pipeline_before_later_passes_run() {
        let (session, unit, timings, marker_ran) = run(&["func main() { let x: Int = \"hello\" }"]);
        assert!(session.diags.has_errors());
        assert!(unit.sema.is_some());
        assert!(unit.typeck.is_some());
        assert_eq!(timings.len(), 2, "typeck still runs once; the marker pass after it must not");
        assert!(!marker_ran, "the pipeline must halt once typeck leaves an error recorded");
    }

    #[test]
    fn multiple_files_merge_declarations_in_input_order() {
        let (_session, unit, _timings, _marker_ran) = run(&["func a() {}", "func b() {}"]);
        assert_eq!(unit.files.len(), 2);
        assert_eq!(unit.merged.decls.len(), 2);
        assert_eq!(unit.merged.decls, unit.files.iter().flat_map(|f| f.module.decls.iter().copied()).collect::<Vec<_>>());
    }
}
