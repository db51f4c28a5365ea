//! # trill-importer
//!
//! Minimal C declaration importer (§4.5). Given the text of a C
//! translation unit, produces foreign declarations the driver injects
//! into the Trill AST before Sema.
//!
//! This is deliberately **not** a real C compiler front-end: per the
//! purpose statement, the importer is a thin collaborator bounded by the
//! interface in this crate, not a libclang binding. It covers the subset
//! of C declaration syntax needed to describe headers: `typedef`s,
//! function prototypes, `enum`s, and `struct` record types.

mod lexer;
mod parser;
mod types;

pub use types::{CType, ForeignDecl, ForeignField, ForeignParam};

use trill_base::{DiagnosticEngine, SourceId};

/// Parses `source` as a C translation unit and returns the foreign
/// declarations it describes, in source order. Malformed declarations are
/// skipped with a diagnostic; the importer never panics on malformed
/// input.
pub fn import_header(file: SourceId, source: &str, diags: &mut DiagnosticEngine) -> Vec<ForeignDecl> {
    let tokens = lexer::tokenize(file, source, diags);
    parser::Parser::new(tokens, diags).parse_translation_unit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_base::SourceId;

    fn import(source: &str) -> (Vec<ForeignDecl>, DiagnosticEngine) {
        let mut diags = DiagnosticEngine::new();
        let decls = import_header(SourceId::new(0), source, &mut diags);
        (decls, diags)
    }

    #[test]
    fn imports_a_function_prototype() {
        let (decls, diags) = import("int add(int a, int b);");
        assert!(!diags.has_errors());
        assert_eq!(decls.len(), 1);
        match &decls[0] {
            ForeignDecl::Function { name, params, ret, variadic, .. } => {
                assert_eq!(name, "add");
                assert_eq!(params.len(), 2);
                assert_eq!(*ret, CType::Int { signed: true, bits: 32 });
                assert!(!variadic);
            }
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn imports_unknown_pointee_as_void_pointer() {
        let (decls, _) = import("void use(Opaque *p);");
        let ForeignDecl::Function { params, .. } = &decls[0] else { panic!() };
        assert_eq!(params[0].ty, CType::Pointer(Box::new(CType::Void)));
    }

    #[test]
    fn imports_enum_as_sequential_constants() {
        let (decls, diags) = import("enum Color { Red, Green, Blue };");
        assert!(!diags.has_errors());
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0], ForeignDecl::Constant { name: "Red".into(), value: 0 });
        assert_eq!(decls[1], ForeignDecl::Constant { name: "Green".into(), value: 1 });
        assert_eq!(decls[2], ForeignDecl::Constant { name: "Blue".into(), value: 2 });
    }

    #[test]
    fn imports_struct_fields_in_declaration_order() {
        let (decls, _) = import("struct Point { int x; int y; };");
        let ForeignDecl::Record { name, fields } = &decls[0] else { panic!() };
        assert_eq!(name, "Point");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "x");
        assert_eq!(fields[1].name, "y");
    }

    #[test]
    fn imports_variadic_function() {
        let (decls, _) = import("int printf(const char *fmt, ...);");
        let ForeignDecl::Function { variadic, .. } = &decls[0] else { panic!() };
        assert!(variadic);
    }

    #[test]
    fn imports_typedef_as_type_alias() {
        let (decls, _) = import("typedef unsigned long size_t;");
        let ForeignDecl::TypeAlias { name, target } = &decls[0] else { panic!() };
        assert_eq!(name, "size_t");
        assert_eq!(*target, CType::Int { signed: false, bits: 64 });
    }
}
