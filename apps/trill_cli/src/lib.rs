//! # trillc
//!
//! Command-line driver for the Trill compiler.
//!
//! `trillc` is the only consumer of `trill_driver`'s front end and codegen
//! entry points: it turns `--emit`/`--target`/etc into a
//! [`trill_driver::CompileRequest`], runs the shared front end once, and
//! then either writes an artifact, JIT-executes `main`, or dumps the AST
//! or diagnostics, depending on the chosen mode.
//!
//! # Modes
//!
//! | `--emit` | Produces |
//! |----------|----------|
//! | `ast` | A structural dump of the parsed (and type-checked) AST |
//! | `asm` | Target assembly text |
//! | `object` | A relocatable object file (the default) |
//! | `executable` | A linked, runnable binary |
//! | `llvm-ir` | LLVM IR text |
//! | `llvm-bc` | LLVM bitcode |
//! | `js` | A best-effort JavaScript transliteration |
//! | `jit` | Runs `main` in-process instead of emitting anything |
//! | `diagnostics` | Runs the front end and reports diagnostics only |

pub mod cli;

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser as _;
use inkwell::OptimizationLevel;

use trill_base::{CompilerSession, HumanConsumer, Interner, JsonConsumer, SourceId};
use trill_driver::{CompilationUnit, CompileRequest, EmitKind, HeaderInput, MainSignature};
use trill_importer::ForeignDecl;
use trill_syntax::ast::{AstContext, DeclId, DeclKind, Module};

pub use cli::{Cli, EmitMode};

/// C declarations imported by default unless `--no-stdlib` is given, so
/// programs that call out to the C library (as `spec.md` §8 scenario 1's
/// `printf` does) resolve without an explicit `--import`.
const BUILTIN_PRELUDE: &str = "\
int printf(const char *format, ...);
int putchar(int c);
void *malloc(unsigned long size);
void free(void *ptr);
";

/// Parses arguments and runs the requested compilation. Diagnostics and
/// JIT/process exit codes are reported directly (via `std::process::exit`)
/// rather than threaded back through this `Result`, matching the three-tier
/// error model (§7): only a driver-usage problem — a missing input file, an
/// unspawnable linker — is an `Err` here.
pub fn run_cli() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut session = CompilerSession::new();

    let inputs = register_inputs(&session, &cli.inputs)?;
    let headers = register_headers(&session, &cli)?;
    let module_name = module_name_for(&cli.inputs);

    if cli.parse_only {
        let header_tuples: Vec<(SourceId, String)> = headers.iter().map(|h| (h.source, h.text.clone())).collect();
        let foreign_decls = trill_driver::pipeline::import_headers(&mut session, &header_tuples);
        let unit = trill_driver::pipeline::parse_files(&mut session, &inputs);
        report_diagnostics(&session, &cli)?;
        if cli.emit == EmitMode::Ast {
            let text = render_ast(&unit.ast, &session.interner, &unit.merged, &foreign_decls, cli.show_imported_decls);
            write_text_output(&cli.output, &text)?;
        }
        std::process::exit(if session.diags.has_errors() { 1 } else { 0 });
    }

    let request = CompileRequest {
        inputs: &inputs,
        headers: &headers,
        module_name: &module_name,
        target_triple: cli.target.as_deref(),
        opt_level: opt_level_from(cli.opt_level),
    };

    let (unit, timings) = trill_driver::run_frontend(&mut session, &request);

    if cli.emit_pass_timings {
        for timing in &timings {
            eprintln!("{:>9.3}ms  {}", timing.duration.as_secs_f64() * 1000.0, timing.name);
        }
    }

    report_diagnostics(&session, &cli)?;

    // §7 tier 1: the driver halts at the first pass leaving an error
    // recorded, so a clean `unit.typeck` does not by itself mean codegen is
    // safe to run — only the diagnostic stream's error state does.
    if session.diags.has_errors() {
        std::process::exit(1);
    }

    match cli.emit {
        EmitMode::Diagnostics => return Ok(()),
        EmitMode::Ast => {
            let foreign_decls = if cli.show_imported_decls {
                let header_tuples: Vec<(SourceId, String)> = headers.iter().map(|h| (h.source, h.text.clone())).collect();
                trill_driver::pipeline::import_headers(&mut session, &header_tuples)
            } else {
                Vec::new()
            };
            let text = render_ast(&unit.ast, &session.interner, &unit.merged, &foreign_decls, cli.show_imported_decls);
            write_text_output(&cli.output, &text)?;
            return Ok(());
        }
        EmitMode::Js => {
            let source = trill_js::emit_module(&unit.ast, &session.interner, &unit.merged);
            write_text_output(&cli.output, &source)?;
            return Ok(());
        }
        EmitMode::Jit => {
            run_jit(&mut session, &request, &unit, &cli.jit_args)?;
            return Ok(());
        }
        _ => {}
    }

    let llvm_ctx = inkwell::context::Context::create();
    let codegen = trill_driver::generate_ir(&llvm_ctx, &session, &request, &unit);

    match cli.emit {
        EmitMode::Executable => link_executable(&mut session, &unit, &codegen, &cli, &module_name)?,
        other => {
            let kind = emit_kind_for(other);
            let output = cli.output.clone().unwrap_or_else(|| default_output_path(&module_name, other));
            trill_driver::emit(&codegen.module, kind, cli.target.as_deref(), request.opt_level, &output)?;
        }
    }

    Ok(())
}

fn register_inputs(session: &CompilerSession, raw: &[String]) -> Result<Vec<SourceId>> {
    let mut ids = Vec::with_capacity(raw.len());
    for s in raw {
        if s == "-" {
            ids.push(session.sources.open_stdin().context("reading standard input")?);
        } else {
            let path = PathBuf::from(s);
            if !path.is_file() {
                bail!("no such file: {}", path.display());
            }
            ids.push(session.sources.open_path(path));
        }
    }
    Ok(ids)
}

fn register_headers(session: &CompilerSession, cli: &Cli) -> Result<Vec<HeaderInput>> {
    let mut headers = Vec::new();
    if !cli.no_stdlib {
        let source = session.sources.open_buffer("<prelude>", BUILTIN_PRELUDE);
        headers.push(HeaderInput { source, text: BUILTIN_PRELUDE.to_string() });
    }
    for path in &cli.import_headers {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let source = session.sources.open_path(path.clone());
        headers.push(HeaderInput { source, text });
    }
    Ok(headers)
}

fn module_name_for(inputs: &[String]) -> String {
    inputs
        .iter()
        .find(|s| s.as_str() != "-")
        .map(|s| Path::new(s).file_stem().and_then(|s| s.to_str()).unwrap_or("module").to_string())
        .unwrap_or_else(|| "stdin".to_string())
}

fn opt_level_from(level: u8) -> OptimizationLevel {
    match level {
        0 => OptimizationLevel::None,
        1 => OptimizationLevel::Less,
        2 => OptimizationLevel::Default,
        _ => OptimizationLevel::Aggressive,
    }
}

fn report_diagnostics(session: &CompilerSession, cli: &Cli) -> Result<()> {
    if cli.diagnostics_json {
        let mut consumer = JsonConsumer::new(Some(&session.sources));
        session.diags.emit_to(&mut consumer);
        println!("{}", serde_json::to_string_pretty(&consumer.to_json())?);
    } else {
        let mut consumer = HumanConsumer::new(&session.sources);
        session.diags.emit_to(&mut consumer);
        eprint!("{}", consumer.into_output());
    }
    Ok(())
}

fn write_text_output(output: &Option<PathBuf>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text).with_context(|| format!("writing {}", path.display())),
        None => {
            print!("{text}");
            Ok(())
        }
    }
}

fn default_output_path(module_name: &str, mode: EmitMode) -> PathBuf {
    match mode {
        EmitMode::Executable => PathBuf::from(module_name),
        EmitMode::Asm => PathBuf::from(format!("{module_name}.s")),
        EmitMode::Object => PathBuf::from(format!("{module_name}.o")),
        EmitMode::LlvmIr => PathBuf::from(format!("{module_name}.ll")),
        EmitMode::LlvmBitcode => PathBuf::from(format!("{module_name}.bc")),
        EmitMode::Ast | EmitMode::Js | EmitMode::Jit | EmitMode::Diagnostics => {
            unreachable!("these modes never write to a derived path")
        }
    }
}

fn emit_kind_for(mode: EmitMode) -> EmitKind {
    match mode {
        EmitMode::Asm => EmitKind::Assembly,
        EmitMode::Object => EmitKind::Object,
        EmitMode::LlvmIr => EmitKind::LlvmIr,
        EmitMode::LlvmBitcode => EmitKind::LlvmBitcode,
        other => unreachable!("{other:?} is handled before reaching codegen"),
    }
}

/// Finds the top-level `main` function, if any, and whether it takes no
/// parameters (the other shape `trill_driver::jit::MainSignature` knows is
/// an `argc`/`argv` pair).
fn find_main(interner: &mut Interner, unit: &CompilationUnit) -> Option<(DeclId, bool)> {
    let main_symbol = interner.intern("main");
    unit.merged.decls.iter().find_map(|&id| match &unit.ast.decl(id).kind {
        DeclKind::Function(f) if f.name == main_symbol => Some((id, f.params.is_empty())),
        _ => None,
    })
}

fn run_jit(session: &mut CompilerSession, request: &CompileRequest<'_>, unit: &CompilationUnit, jit_args: &[String]) -> Result<()> {
    let (main_id, no_args) = find_main(&mut session.interner, unit).context("no `main` function found")?;
    let llvm_ctx = inkwell::context::Context::create();
    let codegen = trill_driver::generate_ir(&llvm_ctx, session, request, unit);
    let mangled = codegen.mangled_names.get(&main_id).context("`main` was never declared during codegen")?;
    let signature = if no_args { MainSignature::NoArgs } else { MainSignature::Argv };
    let code = trill_driver::jit::execute(&codegen.module, mangled, signature, jit_args).unwrap_or_else(|e| e.into_panic());
    std::process::exit(code);
}

fn link_executable(
    session: &mut CompilerSession,
    unit: &CompilationUnit,
    codegen: &trill_ir::CodegenOutput<'_>,
    cli: &Cli,
    module_name: &str,
) -> Result<()> {
    let (main_id, no_args) = find_main(&mut session.interner, unit).context("no `main` function found")?;
    let mangled =
        codegen.mangled_names.get(&main_id).context("`main` was never declared during codegen")?.clone();
    let returns_int = codegen.module.get_function(&mangled).and_then(|f| f.get_type().get_return_type()).is_some();

    let pid = std::process::id();
    let object_path = std::env::temp_dir().join(format!("trillc-{module_name}-{pid}.o"));
    trill_driver::emit(&codegen.module, EmitKind::Object, cli.target.as_deref(), opt_level_from(cli.opt_level), &object_path)?;

    let shim_path = std::env::temp_dir().join(format!("trillc-{module_name}-{pid}-entry.c"));
    fs::write(&shim_path, entry_shim_source(&mangled, no_args, returns_int))
        .with_context(|| format!("writing {}", shim_path.display()))?;

    let output = cli.output.clone().unwrap_or_else(|| PathBuf::from(module_name));

    let mut cmd = Command::new("cc");
    cmd.arg(&object_path).arg(&shim_path);
    if let Some(dir) = runtime_staticlib_dir() {
        cmd.arg(format!("-L{}", dir.display()));
    }
    cmd.arg("-ltrill_runtime");
    cmd.args(&cli.clang_args);
    cmd.args(&cli.link_args);
    cmd.arg("-o").arg(&output);

    let result = cmd.output().context("spawning the system linker (`cc`)")?;
    let _ = fs::remove_file(&object_path);
    let _ = fs::remove_file(&shim_path);
    if !result.status.success() {
        bail!("linking failed:\n{}", String::from_utf8_lossy(&result.stderr));
    }
    Ok(())
}

/// Trill's `func main()` grammar never declares a return type, so the
/// mangled symbol the linker sees is not named `main` and may return
/// `void`. This writes a tiny C translation unit with the platform's real
/// `main` that forwards into it, so the produced executable still has a
/// standard entry point.
fn entry_shim_source(mangled_main: &str, no_args: bool, returns_int: bool) -> String {
    let mut out = String::new();
    match (no_args, returns_int) {
        (true, true) => writeln!(out, "extern int {mangled_main}(void);").unwrap(),
        (true, false) => writeln!(out, "extern void {mangled_main}(void);").unwrap(),
        (false, true) => writeln!(out, "extern int {mangled_main}(int, char **);").unwrap(),
        (false, false) => writeln!(out, "extern void {mangled_main}(int, char **);").unwrap(),
    }
    writeln!(out, "int main(int argc, char **argv) {{").unwrap();
    writeln!(out, "    (void)argc; (void)argv;").unwrap();
    match (no_args, returns_int) {
        (true, true) => writeln!(out, "    return {mangled_main}();").unwrap(),
        (true, false) => writeln!(out, "    {mangled_main}(); return 0;").unwrap(),
        (false, true) => writeln!(out, "    return {mangled_main}(argc, argv);").unwrap(),
        (false, false) => writeln!(out, "    {mangled_main}(argc, argv); return 0;").unwrap(),
    }
    writeln!(out, "}}").unwrap();
    out
}

/// Where `cargo build` would have put `libtrill_runtime.a` for this same
/// workspace checkout, assuming the default `target/` layout.
fn runtime_staticlib_dir() -> Option<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir.parent()?.parent()?;
    let profile = if cfg!(debug_assertions) { "debug" } else { "release" };
    Some(workspace_root.join("target").join(profile))
}

fn render_ast(ast: &AstContext, interner: &Interner, module: &Module, foreign: &[ForeignDecl], show_imported: bool) -> String {
    let mut out = String::new();
    for &id in &module.decls {
        render_decl(ast, interner, id, 0, &mut out);
    }
    if show_imported {
        for decl in foreign {
            writeln!(out, "imported {decl:?}").unwrap();
        }
    }
    out
}

fn render_decl(ast: &AstContext, interner: &Interner, id: DeclId, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match &ast.decl(id).kind {
        DeclKind::Function(f) => {
            let variadic = if f.variadic { " variadic" } else { "" };
            writeln!(out, "{pad}func {}({} params){variadic}", interner.resolve(f.name), f.params.len()).unwrap();
        }
        DeclKind::Var(v) => {
            let kw = if v.mutable { "var" } else { "let" };
            writeln!(out, "{pad}{kw} {}", interner.resolve(v.name)).unwrap();
        }
        DeclKind::Field(field) => writeln!(out, "{pad}field {}", interner.resolve(field.name)).unwrap(),
        DeclKind::Type(t) => {
            writeln!(out, "{pad}type {} ({} fields, {} members)", interner.resolve(t.name), t.fields.len(), t.members.len())
                .unwrap();
            for &field in &t.fields {
                render_decl(ast, interner, field, indent + 1, out);
            }
            for &member in &t.members {
                render_decl(ast, interner, member, indent + 1, out);
            }
        }
        DeclKind::Extension(e) => {
            writeln!(out, "{pad}extension {}", interner.resolve(e.target)).unwrap();
            for &member in &e.members {
                render_decl(ast, interner, member, indent + 1, out);
            }
        }
        DeclKind::Protocol(p) => {
            writeln!(out, "{pad}protocol {}", interner.resolve(p.name)).unwrap();
            for &method in &p.methods {
                render_decl(ast, interner, method, indent + 1, out);
            }
        }
        DeclKind::TypeAlias(a) => writeln!(out, "{pad}typealias {}", interner.resolve(a.name)).unwrap(),
        DeclKind::Operator(op) => writeln!(out, "{pad}operator {}", interner.resolve(op.symbol)).unwrap(),
        DeclKind::Initializer(_) => writeln!(out, "{pad}init").unwrap(),
        DeclKind::Deinitializer(_) => writeln!(out, "{pad}deinit").unwrap(),
        DeclKind::Accessor(a) => writeln!(out, "{pad}{:?} {}", a.kind, interner.resolve(a.property)).unwrap(),
        DeclKind::Param(p) => writeln!(out, "{pad}param {}", interner.resolve(p.internal_name)).unwrap(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_base::CompilerSession;

    fn frontend(source: &str) -> (CompilerSession, CompilationUnit) {
        let mut session = CompilerSession::new();
        let id = session.sources.open_buffer("t.trill", source);
        let request = CompileRequest {
            inputs: &[id],
            headers: &[],
            module_name: "t",
            target_triple: None,
            opt_level: OptimizationLevel::None,
        };
        let (unit, _timings) = trill_driver::run_frontend(&mut session, &request);
        (session, unit)
    }

    /// Like `frontend`, but imports [`BUILTIN_PRELUDE`] first, for sources
    /// (like §8 scenario 1 and scenario 4) that call `printf`.
    fn frontend_with_prelude(source: &str) -> (CompilerSession, CompilationUnit) {
        let mut session = CompilerSession::new();
        let prelude_id = session.sources.open_buffer("<prelude>", BUILTIN_PRELUDE);
        let id = session.sources.open_buffer("t.trill", source);
        let headers = [HeaderInput { source: prelude_id, text: BUILTIN_PRELUDE.to_string() }];
        let request = CompileRequest {
            inputs: &[id],
            headers: &headers,
            module_name: "t",
            target_triple: None,
            opt_level: OptimizationLevel::None,
        };
        let (unit, _timings) = trill_driver::run_frontend(&mut session, &request);
        (session, unit)
    }

    /// Compiles and JIT-executes `source`'s `main`, asserting a clean
    /// front end and returning the process exit code.
    fn jit_run(session: &mut CompilerSession, unit: &CompilationUnit) -> i32 {
        assert!(!session.diags.has_errors(), "expected a clean compilation");
        let (main_id, no_args) = find_main(&mut session.interner, unit).expect("main should be found");
        let llvm_ctx = inkwell::context::Context::create();
        let request = CompileRequest {
            inputs: &[],
            headers: &[],
            module_name: "t",
            target_triple: None,
            opt_level: OptimizationLevel::None,
        };
        let codegen = trill_driver::generate_ir(&llvm_ctx, session, &request, unit);
        let mangled = codegen.mangled_names.get(&main_id).expect("main must be mangled during codegen");
        let signature = if no_args { MainSignature::NoArgs } else { MainSignature::Argv };
        trill_driver::jit::execute(&codegen.module, mangled, signature, &[]).expect("jit execution")
    }

    #[test]
    fn module_name_for_uses_the_first_non_stdin_input_stem() {
        assert_eq!(module_name_for(&["-".to_string(), "src/fib.trill".to_string()]), "fib");
        assert_eq!(module_name_for(&["-".to_string()]), "stdin");
    }

    #[test]
    fn opt_level_from_maps_every_clap_level() {
        assert_eq!(opt_level_from(0), OptimizationLevel::None);
        assert_eq!(opt_level_from(1), OptimizationLevel::Less);
        assert_eq!(opt_level_from(2), OptimizationLevel::Default);
        assert_eq!(opt_level_from(3), OptimizationLevel::Aggressive);
    }

    #[test]
    fn default_output_path_picks_the_right_extension() {
        assert_eq!(default_output_path("prog", EmitMode::Object), PathBuf::from("prog.o"));
        assert_eq!(default_output_path("prog", EmitMode::Asm), PathBuf::from("prog.s"));
        assert_eq!(default_output_path("prog", EmitMode::LlvmIr), PathBuf::from("prog.ll"));
        assert_eq!(default_output_path("prog", EmitMode::LlvmBitcode), PathBuf::from("prog.bc"));
        assert_eq!(default_output_path("prog", EmitMode::Executable), PathBuf::from("prog"));
    }

    #[test]
    fn entry_shim_source_declares_the_matching_c_signature() {
        let shim = entry_shim_source("_WF3fib", true, true);
        assert!(shim.contains("extern int _WF3fib(void);"));
        assert!(shim.contains("return _WF3fib();"));

        let shim = entry_shim_source("_WF4main", false, false);
        assert!(shim.contains("extern void _WF4main(int, char **);"));
        assert!(shim.contains("_WF4main(argc, argv); return 0;"));
    }

    #[test]
    fn find_main_locates_the_top_level_entry_point() {
        let (mut session, unit) = frontend("func main() { let x = 1 }");
        let (_id, no_args) = find_main(&mut session.interner, &unit).expect("main should be found");
        assert!(no_args);
    }

    #[test]
    fn find_main_returns_none_without_a_main_function() {
        let (mut session, unit) = frontend("func helper() {}");
        assert!(find_main(&mut session.interner, &unit).is_none());
    }

    #[test]
    fn render_ast_lists_every_top_level_declaration() {
        let (session, unit) = frontend("func main() { let x = 1 }\nlet y = 2");
        let text = render_ast(&unit.ast, &session.interner, &unit.merged, &[], false);
        assert!(text.contains("func main"));
        assert!(text.contains("let y"));
    }

    #[test]
    fn a_clean_program_jit_executes_through_its_mangled_main() {
        let (mut session, unit) = frontend("func main() { let x = 1 }");
        assert!(!session.diags.has_errors());
        let (main_id, no_args) = find_main(&mut session.interner, &unit).expect("main should be found");
        let llvm_ctx = inkwell::context::Context::create();
        let request = CompileRequest {
            inputs: &[],
            headers: &[],
            module_name: "t",
            target_triple: None,
            opt_level: OptimizationLevel::None,
        };
        let codegen = trill_driver::generate_ir(&llvm_ctx, &session, &request, &unit);
        let mangled = codegen.mangled_names.get(&main_id).expect("main must be mangled during codegen");
        let signature = if no_args { MainSignature::NoArgs } else { MainSignature::Argv };
        let code = trill_driver::jit::execute(&codegen.module, mangled, signature, &[]).expect("jit execution");
        assert_eq!(code, 0);
    }

    #[test]
    fn a_type_mismatch_is_reported_as_a_single_error_with_no_ir_step() {
        let (session, unit) = frontend("func main() { let x: Int = \"hello\" }");
        assert!(session.diags.has_errors());
        assert_eq!(session.diags.len(), 1);
        assert!(unit.typeck.is_some(), "typeck still runs and records the diagnostic before codegen is skipped");
    }

    #[test]
    fn reassigning_an_indirect_local_jit_executes_without_aborting() {
        // §8 scenario 3: the first `Box`'s deinitializer runs exactly once
        // before `main` returns; a release of a refcount-1 box that ran its
        // deinitializer twice, or that freed memory still in use, would
        // abort the process (`trill_fatalError`) rather than exit cleanly.
        let (mut session, unit) = frontend(
            "indirect type Box { var x: Int; init(x: Int) { self.x = x } } \
             func main() { var b = Box(x: 3); b = Box(x: 4) }",
        );
        assert_eq!(jit_run(&mut session, &unit), 0);
    }

    #[test]
    fn a_successful_checked_cast_jit_executes_and_prints_through_printf() {
        // §8 scenario 4's success half: `a as Int` on an `Any` boxing an
        // `Int` must not take the `checked cast failed` trap.
        let (mut session, unit) =
            frontend_with_prelude("func main() { let a: Any = 42; let b = a as Int; printf(\"%d\\n\", b) }");
        assert_eq!(jit_run(&mut session, &unit), 0);
    }
}
