//! # trill-sema
//!
//! Name resolution and declaration enrichment for Trill (§4.6).
//!
//! Sema walks a parsed [`trill_syntax::ast::Module`] once it already has
//! foreign declarations merged in (§4.5), and mutates the AST in place
//! rather than building a second tree: a `VarRef` becomes a `DeclRef` once
//! its declaration is known, a `type` gains a synthesized memberwise
//! initializer or deinitializer stub if it declared none, and every stored
//! field gets a computed offset. Nothing here assigns expression types —
//! that's `trill_typeck`, which consumes [`resolve::SemaOutput`] as its
//! starting point.

pub mod foreign;
pub mod layout;
pub mod resolve;
pub mod scope;
pub mod types;

pub use resolve::{analyze, SemaOutput};
pub use types::{IntWidth, Type};

#[cfg(test)]
mod tests {
    use trill_base::{DiagnosticEngine, Interner, SourceId};
    use trill_syntax::ast::{AstContext, DeclKind};
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

    use super::*;

    fn analyze_source(source: &str) -> (SemaOutput, AstContext, DiagnosticEngine) {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ctx = AstContext::new();
        let mut module = Parser::new(file, tokens, &mut ctx, &mut interner, &mut diags).parse_module();
        let out = analyze(&mut module, &mut ctx, &mut interner, Vec::new(), &mut diags);
        (out, ctx, diags)
    }

    #[test]
    fn a_whole_small_program_resolves_without_diagnostics() {
        let source = "\
            type Point { var x: Int; var y: Int }\n\
            func distanceSquared(a: Point, b: Point) -> Int {\n\
                let dx = a.x - b.x\n\
                let dy = a.y - b.y\n\
                return dx * dx + dy * dy\n\
            }\n\
            func main() {\n\
                let p = Point(x: 1, y: 2)\n\
                let q = Point(x: 4, y: 6)\n\
                let d = distanceSquared(a: p, b: q)\n\
            }\n\
        ";
        let (out, _, diags) = analyze_source(source);
        assert!(!diags.has_errors(), "unexpected diagnostics");
        assert_eq!(out.type_decls.len(), 1);
        assert!(!out.layouts.is_empty());
    }

    #[test]
    fn foreign_declarations_are_visible_to_trill_code() {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let header =
            trill_importer::import_header(SourceId::new(1), "int triple(int x);", &mut diags);
        let tokens = Lexer::new(file, "func main() { triple(1) }").tokenize(&mut interner, &mut diags);
        let mut ctx = AstContext::new();
        let mut module = Parser::new(file, tokens, &mut ctx, &mut interner, &mut diags).parse_module();
        let out = analyze(&mut module, &mut ctx, &mut interner, header, &mut diags);
        assert!(!diags.has_errors());
        assert!(out.call_candidates.values().any(|c| c.len() == 1));
    }

    #[test]
    fn protocol_conformance_is_recorded_for_declared_protocols() {
        let source = "protocol Greetable { func greet() -> Int } type Person: Greetable { func greet() -> Int { return 1 } }";
        let (out, ctx, diags) = analyze_source(source);
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let protocol_id = *out.protocol_decls.values().next().unwrap();
        assert_eq!(out.conformances[&type_id], vec![protocol_id]);
        let _ = ctx.decl_count();
    }

    #[test]
    fn extension_members_merge_into_the_target_type() {
        let source = "type Box { var x: Int } extension Box { func double() -> Int { return self.x * 2 } }";
        let (out, ctx, diags) = analyze_source(source);
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let members = &out.type_members[&type_id];
        // The extension's `double` plus the synthesized memberwise init.
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| matches!(ctx.decl(*m).kind, DeclKind::Function(_))));
        assert!(members.iter().any(|m| matches!(ctx.decl(*m).kind, DeclKind::Initializer(_))));
    }
}
