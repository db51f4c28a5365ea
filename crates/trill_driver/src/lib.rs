//! # trill-driver
//!
//! Orchestrates the compiler's passes (§4.10): reads and parses one or
//! more source files, runs Sema and the type checker through a
//! [`pipeline::Pipeline`], generates LLVM IR, and either emits it (IR,
//! bitcode, object code, a linked executable) or JIT-executes it.
//!
//! This crate owns no UI surface of its own — `apps/trill_cli` is the only
//! consumer of [`run_frontend`]/[`generate_ir`]/[`emit`], and translates
//! its `clap` flags into the options below.

pub mod jit;
pub mod pipeline;

use std::path::{Path, PathBuf};

use inkwell::context::Context;
use inkwell::targets::FileType;
use trill_base::{CompilerSession, SourceId};
use trill_ir::InternalError;

pub use jit::MainSignature;
pub use pipeline::{CompilationUnit, Pass, PassOutcome, PassTiming, Pipeline};

/// Driver-level failures that are neither a user-facing diagnostic (tier 1,
/// recorded on `DiagnosticEngine`) nor a tier-2 compiler-bug `InternalError`
/// — writing an emitted artifact to disk failed because of the filesystem,
/// not because of anything the compiler got wrong.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to write {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error(transparent)]
    Codegen(#[from] InternalError),
}

/// A source file to import as a C header before Sema runs (§4.5).
pub struct HeaderInput {
    pub source: SourceId,
    pub text: String,
}

/// Inputs to one compilation, independent of what the caller ultimately
/// wants to do with the result (§6: the same front end feeds every
/// `--emit` mode and the JIT).
pub struct CompileRequest<'a> {
    pub inputs: &'a [SourceId],
    pub headers: &'a [HeaderInput],
    pub module_name: &'a str,
    pub target_triple: Option<&'a str>,
    pub opt_level: inkwell::OptimizationLevel,
}

/// Runs the front end (parse through typeck) for `request` against
/// `session`, returning the finished [`CompilationUnit`] and the
/// per-pass timing table even when the pipeline halted early on an error
/// (§6 `--emit-pass-timings` reports whatever ran, not just a full run).
pub fn run_frontend(session: &mut CompilerSession, request: &CompileRequest<'_>) -> (CompilationUnit, Vec<PassTiming>) {
    let headers: Vec<(SourceId, String)> =
        request.headers.iter().map(|h| (h.source, h.text.clone())).collect();
    let foreign_decls = pipeline::import_headers(session, &headers);

    let mut unit = pipeline::parse_files(session, request.inputs);

    let mut pipe = Pipeline::new();
    pipe.push(Box::new(pipeline::SemaPass::new(foreign_decls)));
    pipe.push(Box::new(pipeline::TypeckPass));
    let timings = pipe.run(session, &mut unit);

    (unit, timings)
}

/// Generates LLVM IR for a front-end result that ran clean (no recorded
/// diagnostics). Panics via [`InternalError::into_panic`] on a tier-2
/// failure (§7) — callers should only reach this after confirming
/// `session.diags.has_errors()` is false.
pub fn generate_ir<'ctx>(
    llvm_ctx: &'ctx Context,
    session: &CompilerSession,
    request: &CompileRequest<'_>,
    unit: &CompilationUnit,
) -> trill_ir::CodegenOutput<'ctx> {
    let sema = unit.sema.as_ref().expect("frontend must run before codegen");
    let typeck = unit.typeck.as_ref().expect("frontend must run before codegen");
    match trill_ir::generate(
        llvm_ctx,
        request.module_name,
        &unit.ast,
        &session.interner,
        sema,
        typeck,
        &unit.merged,
    ) {
        Ok(out) => out,
        Err(e) => e.into_panic(),
    }
}

/// What a successful compilation should produce (§6 `--emit`). An
/// executable is not one of these: the driver emits an object file and
/// the CLI layer links it, since spawning a system linker with
/// pass-through flags is a concern of the command-line surface, not of
/// this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    LlvmIr,
    LlvmBitcode,
    Assembly,
    Object,
}

/// Writes `module`'s chosen representation to `output`, resolving
/// `target_triple`/`opt_level` through [`trill_ir::resolve_target`] for
/// the forms that need an `inkwell::targets::TargetMachine` (§4.9).
pub fn emit(
    module: &inkwell::module::Module<'_>,
    kind: EmitKind,
    target_triple: Option<&str>,
    opt_level: inkwell::OptimizationLevel,
    output: &Path,
) -> Result<(), DriverError> {
    let io_err = |e: std::io::Error| DriverError::Io { path: output.to_path_buf(), source: e };
    match kind {
        EmitKind::LlvmIr => {
            module.print_to_file(output).map_err(|e| {
                io_err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            })?;
            Ok(())
        }
        EmitKind::LlvmBitcode => {
            if module.write_bitcode_to_path(output) {
                Ok(())
            } else {
                Err(io_err(std::io::Error::new(std::io::ErrorKind::Other, "LLVM bitcode writer failed")))
            }
        }
        EmitKind::Assembly => {
            let config = trill_ir::resolve_target(target_triple, opt_level)?;
            trill_ir::target::emit_to_file(&config, module, output, FileType::Assembly)?;
            Ok(())
        }
        EmitKind::Object => {
            let config = trill_ir::resolve_target(target_triple, opt_level)?;
            trill_ir::target::emit_to_file(&config, module, output, FileType::Object)?;
            Ok(())
        }
    }
}
