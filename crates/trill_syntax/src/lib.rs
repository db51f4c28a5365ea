//! # trill-syntax
//!
//! Lexer, AST and recursive-descent parser for Trill (§3, §4.3, §4.4).
//!
//! This crate has no knowledge of name resolution or types — it turns
//! source text into an [`ast::Module`] of syntax, nothing more. Resolution
//! lives in `trill_sema`, typing in `trill_typeck`.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::AstContext;
pub use lexer::Lexer;
pub use parser::Parser;

#[cfg(test)]
mod tests {
    use trill_base::{DiagnosticEngine, Interner, SourceId};

    use crate::ast::{AstContext, DeclKind, ExprKind, StmtKind};
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse(source: &str) -> (crate::ast::Module, AstContext, DiagnosticEngine) {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ctx = AstContext::new();
        let module = Parser::new(file, tokens, &mut ctx, &mut interner, &mut diags).parse_module();
        (module, ctx, diags)
    }

    #[test]
    fn parses_a_function_with_for_loop_and_return() {
        let source = "func fib(_ n: Int) -> Int { var p = 0; var c = 1; for var i = 0; i < n; i += 1 { let t = p; p = c; c = p + t } return c }";
        let (module, ctx, diags) = parse(source);
        assert!(!diags.has_errors(), "unexpected diagnostics");
        assert_eq!(module.decls.len(), 1);
        let DeclKind::Function(f) = &ctx.decl(module.decls[0]).kind else {
            panic!("expected a function declaration");
        };
        assert_eq!(f.params.len(), 1);
        assert!(f.body.is_some());
    }

    #[test]
    fn parses_indirect_type_with_initializer() {
        let source = "indirect type Box { var x: Int; init(x: Int) { self.x = x } }";
        let (module, ctx, diags) = parse(source);
        assert!(!diags.has_errors());
        assert_eq!(module.decls.len(), 1);
        let DeclKind::Type(t) = &ctx.decl(module.decls[0]).kind else {
            panic!("expected a type declaration");
        };
        assert_eq!(t.fields.len(), 1);
        assert_eq!(t.members.len(), 1);
    }

    #[test]
    fn parses_pound_error_statement() {
        let source = "func main() { #error \"broken\" }";
        let (module, ctx, diags) = parse(source);
        assert!(!diags.has_errors());
        let DeclKind::Function(f) = &ctx.decl(module.decls[0]).kind else {
            panic!("expected a function");
        };
        let body = ctx.stmt(f.body.unwrap());
        let StmtKind::Compound(stmts) = &body.kind else { panic!("expected compound body") };
        assert_eq!(stmts.len(), 1);
        assert!(matches!(ctx.stmt(stmts[0]).kind, StmtKind::PoundDiagnostic { is_error: true, .. }));
    }

    #[test]
    fn parses_any_cast_expressions() {
        let source = "func main() { let a: Any = 42; let b = a as Int }";
        let (_, _, diags) = parse(source);
        assert!(!diags.has_errors());
    }

    #[test]
    fn recovers_after_a_malformed_top_level_declaration() {
        let source = "@@@ func ok() { return 1 }";
        let (module, ctx, diags) = parse(source);
        assert!(diags.has_errors());
        assert_eq!(module.decls.len(), 1);
        assert!(matches!(ctx.decl(module.decls[0]).kind, DeclKind::Function(_)));
    }

    #[test]
    fn ternary_and_assignment_parse_at_expected_precedence() {
        let source = "func main() { var x = 1; x = 1 < 2 ? 3 : 4 }";
        let (_, _, diags) = parse(source);
        assert!(!diags.has_errors());
    }

    #[test]
    fn call_with_labeled_and_positional_arguments() {
        let source = "func main() { f(1, label: 2) }";
        let (module, ctx, diags) = parse(source);
        assert!(!diags.has_errors());
        let DeclKind::Function(f) = &ctx.decl(module.decls[0]).kind else { panic!() };
        let body = ctx.stmt(f.body.unwrap());
        let StmtKind::Compound(stmts) = &body.kind else { panic!() };
        let StmtKind::ExprStmt(e) = ctx.stmt(stmts[0]).kind else { panic!() };
        let ExprKind::Call { args, .. } = &ctx.expr(e).kind else { panic!("expected call") };
        assert_eq!(args.len(), 2);
        assert!(args[0].label.is_none());
        assert!(args[1].label.is_some());
    }
}
