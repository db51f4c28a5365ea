//! # trill-ir
//!
//! LLVM IR generation (§4.8, §4.9): lowers a name-resolved, type-checked
//! Trill module to an `inkwell::module::Module`, mirrors `trill_runtime`'s
//! `#[repr(C)]` ABI structs as LLVM struct types so the two descriptions of
//! memory layout can never drift apart, and mangles every declaration's
//! link name through the grammar `trill_runtime::mangle` already
//! implements. This is the last AST-consuming pass before the driver hands
//! bitcode, object code, or assembly text to a linker or an in-process JIT.

pub mod codegen;
pub mod mangle;
pub mod target;

pub use codegen::{generate, CodegenOutput};
pub use target::{resolve_target, TargetConfig};

/// Tier-2 internal errors (§7): a condition that indicates a bug in an
/// earlier pass, not something a user wrote wrong. The driver converts
/// these into a `panic!` with a captured backtrace rather than routing
/// them through `DiagnosticEngine`.
#[derive(Debug, thiserror::Error)]
pub enum InternalError {
    #[error("codegen: no resolved type recorded for expression {0:?}")]
    MissingExprType(trill_syntax::ast::ExprId),
    #[error("codegen: call site {0:?} has no resolved callee")]
    UnresolvedCallee(trill_syntax::ast::ExprId),
    #[error("codegen: declaration {0:?} was never declared in the module")]
    UnknownDeclaration(trill_syntax::ast::DeclId),
    #[error("codegen: unsupported or unparseable target triple `{0}`")]
    UnsupportedTarget(String),
    #[error("codegen: LLVM module verification failed: {0}")]
    VerificationFailed(String),
}

impl InternalError {
    /// Captures a backtrace at the point this error became fatal, for the
    /// driver to attach to the `panic!` it raises (§7).
    pub fn into_panic(self) -> ! {
        let backtrace = std::backtrace::Backtrace::capture();
        panic!("{self}\n{backtrace}")
    }
}
