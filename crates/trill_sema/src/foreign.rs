//! Merges `trill_importer::ForeignDecl`s into the Trill AST before the
//! rest of Sema runs (§4.5: "injected into the compilation's AST context
//! before Sema").

use trill_base::Interner;
use trill_importer::{CType, ForeignDecl, ForeignParam};
use trill_syntax::ast::{
    AstContext, Attributes, DeclId, ExprKind, FieldDecl, FunctionDecl, Param, TypeDecl, TypeExprId, TypeExprKind,
    VarDecl,
};

fn ctype_to_type_expr(ctx: &mut AstContext, interner: &mut Interner, ty: &CType) -> TypeExprId {
    let kind = match ty {
        CType::Int { signed, bits } => {
            let name = match (signed, bits) {
                (true, 8) => "Int8",
                (true, 16) => "Int16",
                (true, 32) => "Int32",
                (true, _) => "Int64",
                (false, 8) => "UInt8",
                (false, 16) => "UInt16",
                (false, 32) => "UInt32",
                (false, _) => "UInt64",
            };
            TypeExprKind::Named(interner.intern(name))
        }
        CType::Float => TypeExprKind::Named(interner.intern("Float")),
        CType::Double => TypeExprKind::Named(interner.intern("Double")),
        CType::Void => TypeExprKind::Named(interner.intern("Void")),
        CType::Bool => TypeExprKind::Named(interner.intern("Bool")),
        CType::Pointer(inner) => {
            let inner_id = ctype_to_type_expr(ctx, interner, inner);
            TypeExprKind::Pointer(inner_id)
        }
        CType::Named(name) => TypeExprKind::Named(interner.intern(name)),
    };
    ctx.alloc_type_expr(kind, None)
}

fn foreign_param(ctx: &mut AstContext, interner: &mut Interner, param: &ForeignParam, index: usize) -> Param {
    let ty = ctype_to_type_expr(ctx, interner, &param.ty);
    let name = interner.intern(param.name.as_deref().unwrap_or(&format!("arg{index}")));
    Param { external_label: None, internal_name: name, ty, span: None }
}

/// Converts imported declarations into AST nodes and appends their ids to
/// `decls`, all carrying [`Attributes::FOREIGN`] (and [`Attributes::IMPLICIT`]
/// since they have no source range, §3 invariant i).
pub fn inject(ctx: &mut AstContext, interner: &mut Interner, decls: Vec<ForeignDecl>, into: &mut Vec<DeclId>) {
    let attrs = Attributes::FOREIGN.with(Attributes::IMPLICIT);
    for decl in decls {
        match decl {
            ForeignDecl::Function { name, params, ret, variadic, noreturn } => {
                let params: Vec<Param> =
                    params.iter().enumerate().map(|(i, p)| foreign_param(ctx, interner, p, i)).collect();
                let ret_ty = ctype_to_type_expr(ctx, interner, &ret);
                let fn_attrs = if noreturn { attrs.with(Attributes::NORETURN) } else { attrs };
                let id = ctx.alloc_decl(
                    trill_syntax::ast::DeclKind::Function(FunctionDecl {
                        name: interner.intern(&name),
                        params,
                        variadic,
                        ret: Some(ret_ty),
                        body: None,
                    }),
                    None,
                    fn_attrs,
                );
                into.push(id);
            }
            ForeignDecl::TypeAlias { name, target } => {
                let target_ty = ctype_to_type_expr(ctx, interner, &target);
                let id = ctx.alloc_decl(
                    trill_syntax::ast::DeclKind::TypeAlias(trill_syntax::ast::TypeAliasDecl {
                        name: interner.intern(&name),
                        target: target_ty,
                    }),
                    None,
                    attrs,
                );
                into.push(id);
            }
            ForeignDecl::Constant { name, value } => {
                let init = ctx.alloc_expr_with(ExprKind::IntLiteral(value), None, Attributes::IMPLICIT);
                let id = ctx.alloc_decl(
                    trill_syntax::ast::DeclKind::Var(VarDecl {
                        name: interner.intern(&name),
                        mutable: false,
                        ty: None,
                        initializer: Some(init),
                    }),
                    None,
                    attrs,
                );
                into.push(id);
            }
            ForeignDecl::Record { name, fields } => {
                let field_ids: Vec<DeclId> = fields
                    .iter()
                    .map(|f| {
                        let ty = ctype_to_type_expr(ctx, interner, &f.ty);
                        ctx.alloc_decl(
                            trill_syntax::ast::DeclKind::Field(FieldDecl { name: interner.intern(&f.name), ty }),
                            None,
                            attrs,
                        )
                    })
                    .collect();
                let id = ctx.alloc_decl(
                    trill_syntax::ast::DeclKind::Type(TypeDecl {
                        name: interner.intern(&name),
                        fields: field_ids,
                        members: Vec::new(),
                        conforms_to: Vec::new(),
                    }),
                    None,
                    attrs,
                );
                into.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_a_foreign_function_with_foreign_attribute() {
        let mut ctx = AstContext::new();
        let mut interner = Interner::new();
        let mut decls = Vec::new();
        inject(
            &mut ctx,
            &mut interner,
            vec![ForeignDecl::Function {
                name: "add".into(),
                params: vec![ForeignParam { name: Some("a".into()), ty: CType::Int { signed: true, bits: 32 } }],
                ret: CType::Int { signed: true, bits: 32 },
                variadic: false,
                noreturn: false,
            }],
            &mut decls,
        );
        assert_eq!(decls.len(), 1);
        let node = ctx.decl(decls[0]);
        assert!(node.attributes.contains(Attributes::FOREIGN));
        assert!(matches!(node.kind, trill_syntax::ast::DeclKind::Function(_)));
    }

    #[test]
    fn injects_a_record_with_fields_in_order() {
        let mut ctx = AstContext::new();
        let mut interner = Interner::new();
        let mut decls = Vec::new();
        inject(
            &mut ctx,
            &mut interner,
            vec![ForeignDecl::Record {
                name: "Point".into(),
                fields: vec![
                    trill_importer::ForeignField { name: "x".into(), ty: CType::Int { signed: true, bits: 32 } },
                    trill_importer::ForeignField { name: "y".into(), ty: CType::Int { signed: true, bits: 32 } },
                ],
            }],
            &mut decls,
        );
        let trill_syntax::ast::DeclKind::Type(t) = &ctx.decl(decls[0]).kind else { panic!() };
        assert_eq!(t.fields.len(), 2);
    }
}
