//! Compilation session state (§2 `[FULL]`).
//!
//! A [`CompilerSession`] ties one compilation's source manager, interner,
//! and diagnostic engine together so later passes (Sema, the type checker,
//! the driver's pipeline) borrow from one place instead of threading three
//! separate `&mut` parameters through every function signature.

use crate::diagnostic::DiagnosticEngine;
use crate::intern::Interner;
use crate::source::SourceManager;

/// Everything one compilation shares across every pass: registered source
/// files, the interned string table, and the accumulated diagnostic
/// stream. Lives exactly as long as the compilation it backs; nothing here
/// is meant to survive across separate invocations of the compiler.
pub struct CompilerSession {
    pub sources: SourceManager,
    pub interner: Interner,
    pub diags: DiagnosticEngine,
}

impl CompilerSession {
    pub fn new() -> Self {
        Self { sources: SourceManager::new(), interner: Interner::new(), diags: DiagnosticEngine::new() }
    }
}

impl Default for CompilerSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_session_has_no_diagnostics() {
        let session = CompilerSession::new();
        assert!(!session.diags.has_errors());
        assert!(session.diags.is_empty());
    }
}
