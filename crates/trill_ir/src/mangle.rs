//! Adapts Trill declarations into `trill_runtime::mangle::Symbol` values
//! (§4.9): codegen needs a link name for every function, initializer,
//! accessor, global, and witness-table slot it emits, and this is the one
//! place that walks a [`trill_sema::Type`] and a [`DeclKind`] into the
//! mangler's own `TypeSig`/`Arg` grammar, so the grammar lives exactly once
//! and `trill_runtime::mangle::encode` is the only thing that renders it.

use trill_base::Interner;
use trill_runtime::mangle::{self, Arg, Modifier, Special, Symbol as MangleSymbol, TypeSig};
use trill_sema::{IntWidth, SemaOutput, Type};
use trill_syntax::ast::{AccessorKind, AstContext, DeclId, DeclKind, Param};

/// Looks up the source name of a `Type::Named(DeclId)` by reversing
/// `SemaOutput::type_decls`. Declarations always go through Sema before
/// reaching codegen, so every `Named` id has an entry.
pub(crate) fn type_decl_name(sema: &SemaOutput, interner: &Interner, decl: DeclId) -> String {
    sema.type_decls
        .iter()
        .find(|(_, d)| **d == decl)
        .map(|(name, _)| interner.resolve(*name).to_string())
        .unwrap_or_else(|| "<type>".to_string())
}

fn type_sig(ty: &Type, sema: &SemaOutput, interner: &Interner) -> TypeSig {
    match ty {
        Type::Int { signed, width } => {
            let bits = match width {
                IntWidth::Platform => None,
                other => Some(other.bits() as u32),
            };
            TypeSig::Special(if *signed { Special::Int(bits) } else { Special::UInt(bits) })
        }
        Type::Bool => TypeSig::Special(Special::Bool),
        Type::Float => TypeSig::Special(Special::Float),
        Type::Double => TypeSig::Special(Special::Double),
        Type::Void => TypeSig::Special(Special::Void),
        Type::Pointer(inner) => {
            // Collapse a chain of nested pointers into one `Pointer(depth, _)`
            // node, matching the grammar's `P<depth><type>` production.
            let mut depth = 1u32;
            let mut cur = inner.as_ref();
            while let Type::Pointer(next) = cur {
                depth += 1;
                cur = next.as_ref();
            }
            TypeSig::Pointer(depth, Box::new(type_sig(cur, sema, interner)))
        }
        Type::Tuple(elems) => TypeSig::Tuple(elems.iter().map(|t| type_sig(t, sema, interner)).collect()),
        Type::Function { params, ret, .. } => {
            TypeSig::Function(params.iter().map(|t| type_sig(t, sema, interner)).collect(), Box::new(type_sig(ret, sema, interner)))
        }
        Type::Named(decl) => TypeSig::Named(type_decl_name(sema, interner, *decl)),
        Type::Any => TypeSig::Named("Any".to_string()),
        Type::Error => TypeSig::Named("<error>".to_string()),
    }
}

fn param_arg(param: &Param, sema: &SemaOutput, interner: &Interner) -> Arg {
    let ty = sema.type_of_type_expr.get(&param.ty).cloned().unwrap_or(Type::Error);
    Arg {
        external: param.external_label.map(|s| interner.resolve(s).to_string()),
        internal: interner.resolve(param.internal_name).to_string(),
        ty: type_sig(&ty, sema, interner),
    }
}

/// Builds the mangler's `Symbol` for a top-level (free) function.
pub fn free_function_symbol(ast: &AstContext, interner: &Interner, sema: &SemaOutput, id: DeclId) -> MangleSymbol {
    let DeclKind::Function(f) = &ast.decl(id).kind else {
        panic!("free_function_symbol called on a non-function declaration");
    };
    let args = f.params.iter().map(|p| param_arg(p, sema, interner)).collect();
    let ret = f.ret.and_then(|t| sema.type_of_type_expr.get(&t).cloned()).unwrap_or(Type::Void);
    MangleSymbol::Function {
        modifier: None,
        owner: None,
        name: interner.resolve(f.name).to_string(),
        args,
        ret: type_sig(&ret, sema, interner),
    }
}

/// Builds the mangler's `Symbol` for a member of `owner` (a method,
/// initializer, deinitializer, or accessor), dispatching the modifier
/// letter from the member's own `DeclKind` (§4.9).
pub fn member_symbol(
    ast: &AstContext,
    interner: &Interner,
    sema: &SemaOutput,
    owner: DeclId,
    member: DeclId,
    is_static: bool,
) -> MangleSymbol {
    let owner_name = type_decl_name(sema, interner, owner);
    match &ast.decl(member).kind {
        DeclKind::Function(f) => {
            let args = f.params.iter().map(|p| param_arg(p, sema, interner)).collect();
            let ret = f.ret.and_then(|t| sema.type_of_type_expr.get(&t).cloned()).unwrap_or(Type::Void);
            MangleSymbol::Function {
                modifier: Some(if is_static { Modifier::Static } else { Modifier::Instance }),
                owner: Some(owner_name),
                name: interner.resolve(f.name).to_string(),
                args,
                ret: type_sig(&ret, sema, interner),
            }
        }
        DeclKind::Initializer(i) => {
            let args = i.params.iter().map(|p| param_arg(p, sema, interner)).collect();
            MangleSymbol::Function {
                modifier: Some(Modifier::Init),
                owner: Some(owner_name),
                name: "init".to_string(),
                args,
                ret: TypeSig::Special(Special::Void),
            }
        }
        DeclKind::Deinitializer(_) => MangleSymbol::Function {
            modifier: Some(Modifier::Deinit),
            owner: Some(owner_name),
            name: "deinit".to_string(),
            args: Vec::new(),
            ret: TypeSig::Special(Special::Void),
        },
        DeclKind::Accessor(a) => {
            let modifier = match a.kind {
                AccessorKind::Getter => Modifier::Getter,
                AccessorKind::Setter => Modifier::Setter,
            };
            let args = a.params.iter().map(|p| param_arg(p, sema, interner)).collect();
            let ret = sema.decl_type.get(&member).cloned().unwrap_or(Type::Void);
            let ret = match ret {
                Type::Function { ret, .. } => *ret,
                other => other,
            };
            MangleSymbol::Function {
                modifier: Some(modifier),
                owner: Some(owner_name),
                name: interner.resolve(a.property).to_string(),
                args,
                ret: type_sig(&ret, sema, interner),
            }
        }
        other => panic!("member_symbol called on unsupported declaration kind: {other:?}"),
    }
}

/// Builds the mangler's `Symbol` for a type's witness table against one of
/// its conformed protocols (§4.8's generic-dispatch slot).
pub fn witness_symbol(sema: &SemaOutput, interner: &Interner, type_decl: DeclId, protocol_decl: DeclId) -> MangleSymbol {
    let type_name = type_decl_name(sema, interner, type_decl);
    let protocol_name = sema
        .protocol_decls
        .iter()
        .find(|(_, d)| **d == protocol_decl)
        .map(|(name, _)| interner.resolve(*name).to_string())
        .unwrap_or_else(|| "<protocol>".to_string());
    MangleSymbol::Witness { type_name, protocol_name }
}

/// Builds the mangler's `Symbol` identifying a type's metadata global.
pub fn type_metadata_symbol(sema: &SemaOutput, interner: &Interner, type_decl: DeclId) -> MangleSymbol {
    MangleSymbol::Type(type_decl_name(sema, interner, type_decl))
}

/// Renders `symbol` through the shared grammar.
pub fn mangled_name(symbol: &MangleSymbol) -> String {
    mangle::encode(symbol)
}

#[cfg(test)]
mod tests {
    use trill_base::{DiagnosticEngine, Interner, SourceId};
    use trill_syntax::ast::AstContext;
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

    use super::*;

    fn analyze(source: &str) -> (AstContext, Interner, SemaOutput, trill_syntax::ast::Module) {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ctx = AstContext::new();
        let mut module = Parser::new(file, tokens, &mut ctx, &mut interner, &mut diags).parse_module();
        let sema = trill_sema::analyze(&mut module, &mut ctx, &mut interner, Vec::new(), &mut diags);
        (ctx, interner, sema, module)
    }

    #[test]
    fn a_free_function_mangles_with_no_owner_or_modifier() {
        let (ctx, interner, sema, module) = analyze("func add(a: Int, b: Int) -> Int { return a + b }");
        let id = module.decls[0];
        let symbol = free_function_symbol(&ctx, &interner, &sema, id);
        let name = mangled_name(&symbol);
        assert!(name.starts_with("_WF"));
        assert!(!name.contains('I'), "a free function carries no modifier letter");
    }

    #[test]
    fn a_static_method_mangles_with_an_owner_and_static_modifier() {
        let (ctx, interner, sema, module) = analyze(
            "type Foo { static func bar(x baz: Int) -> *Int { return &baz } }",
        );
        let type_id = *sema.type_decls.values().next().unwrap();
        let member = sema.type_members[&type_id][0];
        let symbol = member_symbol(&ctx, &interner, &sema, type_id, member, true);
        let name = mangled_name(&symbol);
        assert!(name.starts_with("_WF"));

        let rendered = mangle::demangle_display(&symbol);
        assert!(rendered.contains("static"));
        assert!(rendered.contains("Foo"));
        assert!(rendered.contains("bar"));
        assert!(rendered.contains("x baz: Int"));
        assert!(rendered.contains("-> *Int"));
    }
}
