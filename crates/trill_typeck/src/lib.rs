//! # trill-typeck
//!
//! Bottom-up type assignment, overload resolution, and Any-boxing insertion
//! for Trill (§4.7). Typeck runs after `trill_sema` has resolved every name
//! and computed field layout, and consumes [`trill_sema::SemaOutput`] as its
//! starting point: it does not re-walk scopes or re-resolve declarations,
//! only assigns a [`trill_sema::Type`] to every expression and validates the
//! statements around them. Like Sema, it mutates the AST in place rather
//! than building a second tree — an implicit `Any` box or a narrowing cast
//! becomes a new node spliced in where the checked expression used to be.

pub mod check;

pub use check::{check, TypeckOutput};

#[cfg(test)]
mod tests {
    use trill_base::{DiagnosticEngine, Interner, SourceId};
    use trill_sema::{SemaOutput, Type};
    use trill_syntax::ast::{AstContext, DeclKind, ExprKind, Module};
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

    use super::*;

    fn check_source(source: &str) -> (TypeckOutput, SemaOutput, AstContext, DiagnosticEngine, Module) {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ctx = AstContext::new();
        let mut module = Parser::new(file, tokens, &mut ctx, &mut interner, &mut diags).parse_module();
        let sema = trill_sema::analyze(&mut module, &mut ctx, &mut interner, Vec::new(), &mut diags);
        let out = check(&module, &mut ctx, &mut interner, &sema, &mut diags);
        (out, sema, ctx, diags, module)
    }

    fn only_function<'a>(ctx: &'a AstContext, module: &Module) -> &'a trill_syntax::ast::FunctionDecl {
        module
            .decls
            .iter()
            .find_map(|&id| match &ctx.decl(id).kind {
                DeclKind::Function(f) => Some(f),
                _ => None,
            })
            .expect("expected a top-level function")
    }

    #[test]
    fn integer_literals_default_to_the_platform_int() {
        let source = "func main() { let x = 1 }";
        let (out, _sema, ctx, diags, module) = check_source(source);
        assert!(!diags.has_errors());
        let body = only_function(&ctx, &module).body.unwrap();
        let trill_syntax::ast::StmtKind::Compound(stmts) = &ctx.stmt(body).kind else { panic!("expected a block") };
        let trill_syntax::ast::StmtKind::DeclStmt(decl_id) = &ctx.stmt(stmts[0]).kind else { panic!("expected a decl") };
        assert_eq!(out.decl_types[decl_id], Type::PLATFORM_INT);
    }

    #[test]
    fn mismatched_arithmetic_operands_are_rejected() {
        let source = "func main() { let x: Double = 1.0; let y = x + true }";
        let (_out, _sema, _ctx, diags, _module) = check_source(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn a_call_with_no_matching_overload_reports_exactly_one_diagnostic() {
        let source = "\
            func take(x: Int) {}\n\
            func take(x: Double) {}\n\
            func main() { take(x: true) }\n\
        ";
        let (_out, _sema, _ctx, diags, _module) = check_source(source);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn assigning_a_concrete_value_into_an_any_binding_inserts_a_bitcast() {
        let source = "func main() { var x: Any = 1; x = \"hi\" }";
        let (out, _sema, ctx, diags, _module) = check_source(source);
        assert!(!diags.has_errors());
        let boxed = out.expr_types.iter().find(|(id, ty)| **ty == Type::Any && matches!(ctx.expr(**id).kind, ExprKind::BitcastToAny(_)));
        assert!(boxed.is_some(), "expected a BitcastToAny node recording an Any type");
    }

    #[test]
    fn narrowing_an_any_value_rewrites_the_cast_to_checked() {
        let source = "func main() { let x: Any = 1; let y = x as Int }";
        let (_out, _sema, ctx, diags, module) = check_source(source);
        assert!(!diags.has_errors());
        let body = only_function(&ctx, &module).body.unwrap();
        let trill_syntax::ast::StmtKind::Compound(stmts) = &ctx.stmt(body).kind else { panic!("expected a block") };
        let trill_syntax::ast::StmtKind::DeclStmt(decl_id) = &ctx.stmt(stmts[1]).kind else { panic!("expected a decl") };
        let DeclKind::Var(v) = &ctx.decl(*decl_id).kind else { panic!("expected a var") };
        let init = v.initializer.unwrap();
        assert!(matches!(ctx.expr(init).kind, ExprKind::CheckedCast { .. }));
    }

    #[test]
    fn a_computed_property_getters_return_type_is_inferred_from_its_body() {
        let source = "\
            type Circle { var radius: Double\n\
                var area: Double { return radius * radius }\n\
            }\n\
            func main() {\n\
                let c = Circle(radius: 2.0)\n\
                let a = c.area\n\
            }\n\
        ";
        let (out, sema, ctx, diags, _module) = check_source(source);
        assert!(!diags.has_errors(), "unexpected diagnostics");
        let type_id = *sema.type_decls.values().next().unwrap();
        let getter = sema.type_members[&type_id]
            .iter()
            .find(|&&m| matches!(&ctx.decl(m).kind, DeclKind::Accessor(a) if a.kind == trill_syntax::ast::AccessorKind::Getter))
            .copied()
            .unwrap();
        match &out.decl_types[&getter] {
            Type::Function { ret, .. } => assert_eq!(**ret, Type::Double),
            other => panic!("expected a function type, found {other:?}"),
        }
    }

    #[test]
    fn switch_over_a_non_equatable_scrutinee_is_rejected() {
        let source = "\
            func makePair() -> (Int, Int) { return (1, 2) }\n\
            func main() { switch makePair() { case 1: break } }\n\
        ";
        let (_out, _sema, _ctx, diags, _module) = check_source(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn assigning_to_a_let_binding_is_rejected() {
        let source = "func main() { let x = 1; x = 2 }";
        let (_out, _sema, _ctx, diags, _module) = check_source(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn assigning_through_a_get_only_computed_property_is_rejected() {
        let source = "\
            type Circle { var radius: Double\n\
                var area: Double { return radius * radius }\n\
            }\n\
            func main() {\n\
                let c = Circle(radius: 2.0)\n\
                c.area = 4.0\n\
            }\n\
        ";
        let (_out, _sema, _ctx, diags, _module) = check_source(source);
        assert!(diags.has_errors());
    }
}
