//! JIT execution of a generated module (§6 "JIT-execute" mode, §8
//! scenario 1 — `func main() { print(fib(10)) }` JIT-executes and prints
//! `89`).
//!
//! `inkwell::execution_engine::ExecutionEngine::get_function` resolves a
//! symbol by name and hands back a typed function pointer without
//! checking that the requested Rust signature actually matches the LLVM
//! function it found — calling it with the wrong arity or argument types
//! is undefined behavior, not a caught error. The caller is expected to
//! already know, from the mangled `main` declaration it looked up in the
//! type-checked module, which of [`MainSignature`]'s two shapes applies;
//! this module does not attempt to infer it from the `Module` itself.

use std::ffi::CString;
use std::os::raw::{c_char, c_int};

use inkwell::execution_engine::JitFunction;
use inkwell::module::Module;
use inkwell::OptimizationLevel;

use trill_ir::InternalError;

/// The two `main` shapes the JIT knows how to invoke, matching the two
/// forms spec.md §8 scenario 1 allows: a no-argument entry point, or one
/// that receives `argc`/`argv` the way a linked executable's `main` would
/// (§4.10: "the JIT path marshals the process's own command-line
/// arguments into the same argv layout the native executable receives").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainSignature {
    NoArgs,
    Argv,
}

type NoArgsVoidMain = unsafe extern "C" fn();
type ArgvVoidMain = unsafe extern "C" fn(c_int, *const *const c_char);
type NoArgsIntMain = unsafe extern "C" fn() -> c_int;
type ArgvIntMain = unsafe extern "C" fn(c_int, *const *const c_char) -> c_int;

/// JIT-compiles `module` and calls its `main` symbol (as mangled by
/// `trill_ir::mangle`), forwarding `args` as argv when `signature` is
/// [`MainSignature::Argv`]. Trill's `func main()` grammar never declares a
/// return type, so the generated LLVM function returns `void`; reading an
/// `i32` back from a call to it would be undefined behavior, not just a
/// wrong answer. This looks up `main`'s actual LLVM return type on
/// `module` before choosing which of the four calling shapes to use, and
/// reports exit code `0` for a `void` `main` that returned normally — a
/// runtime-fatal condition aborts the process itself via `trill_fatalError`
/// (§7 tier 3) rather than flowing back through this return value.
pub fn execute(
    module: &Module<'_>,
    main_symbol: &str,
    signature: MainSignature,
    args: &[String],
) -> Result<i32, InternalError> {
    let returns_void = module
        .get_function(main_symbol)
        .map(|f| f.get_type().get_return_type().is_none())
        .unwrap_or(true);

    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| InternalError::VerificationFailed(e.to_string()))?;

    // Keep the CStrings alive for the duration of the call; argv's
    // pointers must stay valid until `main` returns.
    let owned: Vec<CString> = args.iter().map(|a| CString::new(a.as_str()).unwrap_or_default()).collect();
    let argv: Vec<*const c_char> = owned.iter().map(|c| c.as_ptr()).collect();

    macro_rules! call {
        ($ty:ty, $invoke:expr) => {{
            let main_fn: JitFunction<'_, $ty> =
                unsafe { engine.get_function(main_symbol).map_err(|e| InternalError::VerificationFailed(e.to_string()))? };
            $invoke(main_fn)
        }};
    }

    let code = match (signature, returns_void) {
        (MainSignature::NoArgs, true) => {
            call!(NoArgsVoidMain, |f: JitFunction<'_, NoArgsVoidMain>| unsafe { f.call() });
            0
        }
        (MainSignature::NoArgs, false) => call!(NoArgsIntMain, |f: JitFunction<'_, NoArgsIntMain>| unsafe { f.call() }),
        (MainSignature::Argv, true) => {
            call!(ArgvVoidMain, |f: JitFunction<'_, ArgvVoidMain>| unsafe {
                f.call(argv.len() as c_int, argv.as_ptr())
            });
            0
        }
        (MainSignature::Argv, false) => {
            call!(ArgvIntMain, |f: JitFunction<'_, ArgvIntMain>| unsafe {
                f.call(argv.len() as c_int, argv.as_ptr())
            })
        }
    };

    Ok(code)
}
