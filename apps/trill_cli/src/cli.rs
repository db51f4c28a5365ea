//! Command-line argument definitions (§6).
//!
//! One binary, one mode-selecting surface rather than subcommands: every
//! `--emit` value and the JIT/diagnostics-only modes run the same front
//! end, diverging only in what happens to a clean compilation's output.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// What a successful compilation should produce, or whether to run it
/// instead of emitting anything (§6 "Mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmitMode {
    /// Dump the parsed (and, unless diagnostics halted earlier, type-checked) AST.
    Ast,
    /// Target assembly text (`.s`).
    Asm,
    /// A relocatable object file (`.o`).
    Object,
    /// A linked, runnable executable.
    Executable,
    /// LLVM IR text (`.ll`).
    #[value(name = "llvm-ir")]
    LlvmIr,
    /// LLVM bitcode (`.bc`).
    #[value(name = "llvm-bc")]
    LlvmBitcode,
    /// A best-effort JavaScript transliteration.
    Js,
    /// JIT-compile and run `main` in-process; no artifact is written.
    Jit,
    /// Run the front end and report diagnostics; no codegen at all.
    Diagnostics,
}

/// Compiles, JIT-executes, or inspects Trill source files.
#[derive(Parser, Debug)]
#[command(name = "trillc", version, about = "Compiles, JIT-executes, or inspects Trill source files")]
pub struct Cli {
    /// Source files to compile, or `-` to read a single unit from stdin.
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// What the compilation should produce.
    #[arg(long, value_enum, default_value = "object")]
    pub emit: EmitMode,

    /// Target triple to compile for (defaults to the host triple).
    #[arg(long)]
    pub target: Option<String>,

    /// Where to write the emitted artifact. Defaults to stdout for
    /// `ast`/`js`/`diagnostics`, and to a derived filename otherwise.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// C headers to import as foreign declarations before Sema runs.
    /// Passing none at all turns the importer stage off entirely.
    #[arg(long = "import", value_name = "HEADER")]
    pub import_headers: Vec<PathBuf>,

    /// Skip importing the bundled prelude (`printf`, `malloc`, `free`) that
    /// runs by default so programs that call C library functions resolve
    /// without an explicit `--import`.
    #[arg(long = "no-stdlib")]
    pub no_stdlib: bool,

    /// Print each pass's name and wall-clock duration to stderr.
    #[arg(long = "emit-pass-timings")]
    pub emit_pass_timings: bool,

    /// Render diagnostics as JSON instead of the human-readable form.
    #[arg(long = "diagnostics-json")]
    pub diagnostics_json: bool,

    /// Stop after parsing; skip Sema and the type checker entirely.
    #[arg(long = "parse-only")]
    pub parse_only: bool,

    /// Include imported foreign declarations in an `--emit=ast` dump.
    #[arg(long = "show-imported-decls")]
    pub show_imported_decls: bool,

    /// Optimization level, 0-3.
    #[arg(short = 'O', long = "opt-level", value_parser = clap::value_parser!(u8).range(0..=3), default_value_t = 0)]
    pub opt_level: u8,

    /// Extra flags forwarded verbatim to the system linker (`--emit=executable` only).
    #[arg(long = "link-arg", value_name = "ARG")]
    pub link_args: Vec<String>,

    /// Extra flags forwarded verbatim to Clang when compiling the generated
    /// entry-point shim (`--emit=executable` only).
    #[arg(long = "clang-arg", value_name = "ARG")]
    pub clang_args: Vec<String>,

    /// Arguments forwarded as `argv` to the JIT-executed `main`, after a
    /// literal `--`.
    #[arg(last = true)]
    pub jit_args: Vec<String>,
}
