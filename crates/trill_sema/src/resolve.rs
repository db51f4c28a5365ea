//! The single Sema traversal (§4.6): scope population, type-reference
//! resolution, implicit-member synthesis, stored-field layout, overload
//! set construction, and the redeclaration/modifier/shadowing/`self`
//! diagnostics.

use rustc_hash::{FxHashMap, FxHashSet};

use trill_base::{Diagnostic, DiagnosticEngine, Interner, Symbol};
use trill_importer::ForeignDecl;
use trill_syntax::ast::{
    Attributes, DeclId, DeclKind, ExprId, ExprKind, Module, NodeSpan, Param, StmtId, StmtKind, SwitchCase,
    TypeExprId, TypeExprKind,
};
use trill_syntax::ast::AstContext;

use crate::foreign;
use crate::layout::{self, LayoutTable, TypeLayout};
use crate::scope::{Declared, ScopeKind, ScopeStack};
use crate::types::{IntWidth, Type};

/// Everything the later passes (`trill_typeck`, `trill_ir`) need from
/// Sema, keyed by the `DeclId`/`ExprId`/`TypeExprId` the AST already
/// carries (§3 invariant iii: one canonical identity per declaration).
#[derive(Default)]
pub struct SemaOutput {
    pub type_of_type_expr: FxHashMap<TypeExprId, Type>,
    /// The declared/resolved type of a function, parameter, field, var,
    /// initializer, deinitializer, accessor, or type declaration itself
    /// (`Type::Named(self)`).
    pub decl_type: FxHashMap<DeclId, Type>,
    pub type_decls: FxHashMap<Symbol, DeclId>,
    pub protocol_decls: FxHashMap<Symbol, DeclId>,
    /// Combined type-body + matching-extension members, in declaration
    /// order, including implicitly synthesized initializers/deinitializers.
    pub type_members: FxHashMap<DeclId, Vec<DeclId>>,
    /// Protocols named in `conforms_to` that were found in
    /// `protocol_decls`, in declared order (unresolved names are dropped
    /// silently — conformance checking is an IR/witness-table concern,
    /// not a Sema diagnostic in this implementation).
    pub conformances: FxHashMap<DeclId, Vec<DeclId>>,
    /// Overload candidates for a `Call` expression's callee, recorded at
    /// the call site (§4.6.5). Length 0 means resolution already failed
    /// and a diagnostic was emitted; length 1 means the callee was
    /// rewritten to a `DeclRef` in place.
    pub call_candidates: FxHashMap<ExprId, Vec<DeclId>>,
    pub layouts: LayoutTable,
    pub indirect_types: FxHashSet<DeclId>,
    /// Implicitly synthesized declarations (memberwise inits, deinit
    /// stubs), for callers that want to distinguish them from source.
    pub synthesized: Vec<DeclId>,
}

/// Runs Sema over `module`, injecting `foreign` declarations first
/// (§4.5). Mutates `ctx` in place: `VarRef` expressions are rewritten to
/// `DeclRef` once resolved, and new nodes are appended for synthesized
/// members.
pub fn analyze(
    module: &mut Module,
    ctx: &mut AstContext,
    interner: &mut Interner,
    foreign_decls: Vec<ForeignDecl>,
    diags: &mut DiagnosticEngine,
) -> SemaOutput {
    foreign::inject(ctx, interner, foreign_decls, &mut module.decls);
    let self_sym = interner.intern("self");

    let mut sema = Sema {
        ctx,
        interner,
        diags,
        scopes: ScopeStack::new(),
        out: SemaOutput::default(),
        self_sym,
        resolving_aliases: FxHashSet::default(),
        alias_targets: FxHashMap::default(),
    };

    sema.register_top_level(&module.decls);
    sema.resolve_members_and_layout(&module.decls);
    sema.resolve_bodies(&module.decls);
    sema.out
}

struct Sema<'a> {
    ctx: &'a mut AstContext,
    interner: &'a mut Interner,
    diags: &'a mut DiagnosticEngine,
    scopes: ScopeStack,
    out: SemaOutput,
    self_sym: Symbol,
    resolving_aliases: FxHashSet<Symbol>,
    alias_targets: FxHashMap<Symbol, TypeExprId>,
}

impl<'a> Sema<'a> {
    fn span_of_decl(&self, id: DeclId) -> NodeSpan {
        self.ctx.decl(id).span
    }

    fn error(&mut self, message: impl Into<String>, span: NodeSpan) {
        let mut d = Diagnostic::error(message);
        if let Some(span) = span {
            d = d.at(span);
        }
        self.diags.emit(d);
    }

    fn warn(&mut self, message: impl Into<String>, span: NodeSpan) {
        let mut d = Diagnostic::warning(message);
        if let Some(span) = span {
            d = d.at(span);
        }
        self.diags.emit(d);
    }

    // ---------------------------------------------------------------
    // Pass A: register every top-level name so forward references work.
    // ---------------------------------------------------------------

    fn register_top_level(&mut self, decls: &[DeclId]) {
        for &id in decls {
            let attrs = self.ctx.decl(id).attributes;
            if attrs.contains(Attributes::STATIC) {
                self.error("'static' is only valid inside a type", self.span_of_decl(id));
            }
            let kind = self.ctx.decl(id).kind.clone();
            match kind {
                DeclKind::Function(f) => {
                    self.scopes.declare(f.name, id, true);
                }
                DeclKind::Type(t) => {
                    if self.out.type_decls.insert(t.name, id).is_some() {
                        self.error(
                            format!("invalid redeclaration of type '{}'", self.interner.resolve(t.name)),
                            self.span_of_decl(id),
                        );
                    }
                    if attrs.contains(Attributes::INDIRECT) {
                        self.out.indirect_types.insert(id);
                    }
                    self.out.type_members.entry(id).or_default().extend(t.members.iter().copied());
                }
                DeclKind::Protocol(p) => {
                    self.out.protocol_decls.insert(p.name, id);
                }
                DeclKind::TypeAlias(a) => {
                    self.alias_targets.insert(a.name, a.target);
                }
                DeclKind::Var(v) => match self.scopes.declare(v.name, id, false) {
                    Declared::Redeclared => {
                        self.error(
                            format!("invalid redeclaration of '{}'", self.interner.resolve(v.name)),
                            self.span_of_decl(id),
                        );
                    }
                    _ => {}
                },
                DeclKind::Operator(o) => {
                    self.scopes.declare(o.symbol, id, false);
                }
                _ => {}
            }
        }
    }

    // ---------------------------------------------------------------
    // Pass B: resolve field/signature types, synthesize implicit
    // members, merge extensions, fold in protocol conformances, then
    // compute layout.
    // ---------------------------------------------------------------

    fn resolve_members_and_layout(&mut self, decls: &[DeclId]) {
        // Extensions first, so `type_members` is complete before any
        // type's layout or initializer search runs.
        for &id in decls {
            if let DeclKind::Extension(ext) = self.ctx.decl(id).kind.clone() {
                match self.out.type_decls.get(&ext.target).copied() {
                    Some(target) => {
                        self.out.type_members.entry(target).or_default().extend(ext.members.iter().copied());
                    }
                    None => self.error(
                        format!("cannot extend unknown type '{}'", self.interner.resolve(ext.target)),
                        self.span_of_decl(id),
                    ),
                }
            }
        }

        let type_ids: Vec<DeclId> = decls
            .iter()
            .copied()
            .filter(|id| matches!(self.ctx.decl(*id).kind, DeclKind::Type(_)))
            .collect();

        for &id in &type_ids {
            self.resolve_type_fields_and_conformances(id);
        }
        for &id in &type_ids {
            self.synthesize_implicit_members(id);
        }
        for &id in &type_ids {
            let mut visiting = FxHashSet::default();
            self.layout_of(id, &mut visiting);
        }

        // Resolve protocol method signatures, top-level function
        // signatures, and all member signatures so `decl_type` is fully
        // populated before Pass C resolves bodies and calls.
        for &id in decls {
            match self.ctx.decl(id).kind.clone() {
                DeclKind::Function(f) => {
                    let ty = self.resolve_function_signature(&f);
                    self.out.decl_type.insert(id, ty);
                }
                DeclKind::Protocol(p) => {
                    for &m in &p.methods {
                        if let DeclKind::Function(f) = self.ctx.decl(m).kind.clone() {
                            let ty = self.resolve_function_signature(&f);
                            self.out.decl_type.insert(m, ty);
                        }
                    }
                }
                _ => {}
            }
        }
        for &id in &type_ids {
            let members = self.out.type_members.get(&id).cloned().unwrap_or_default();
            for m in members {
                self.resolve_member_signature(id, m);
            }
        }
    }

    fn resolve_type_fields_and_conformances(&mut self, id: DeclId) {
        let DeclKind::Type(t) = self.ctx.decl(id).kind.clone() else { return };
        for &field_id in &t.fields {
            let DeclKind::Field(f) = self.ctx.decl(field_id).kind.clone() else { continue };
            let ty = self.resolve_type_expr(f.ty);
            self.out.decl_type.insert(field_id, ty);
        }
        self.out.decl_type.insert(id, Type::Named(id));
        let mut protos = Vec::new();
        for proto_name in &t.conforms_to {
            if let Some(proto_id) = self.out.protocol_decls.get(proto_name).copied() {
                protos.push(proto_id);
            }
        }
        self.out.conformances.insert(id, protos);
    }

    fn resolve_function_signature(&mut self, f: &trill_syntax::ast::FunctionDecl) -> Type {
        let params: Vec<Type> = f.params.iter().map(|p| self.resolve_type_expr(p.ty)).collect();
        let ret = match f.ret {
            Some(t) => self.resolve_type_expr(t),
            None => Type::Void,
        };
        Type::Function { params, ret: Box::new(ret), variadic: f.variadic }
    }

    fn resolve_member_signature(&mut self, owner: DeclId, member: DeclId) {
        match self.ctx.decl(member).kind.clone() {
            DeclKind::Function(f) => {
                let ty = self.resolve_function_signature(&f);
                self.out.decl_type.insert(member, ty);
            }
            DeclKind::Initializer(i) => {
                let params: Vec<Type> = i.params.iter().map(|p| self.resolve_type_expr(p.ty)).collect();
                self.out
                    .decl_type
                    .insert(member, Type::Function { params, ret: Box::new(Type::Named(owner)), variadic: false });
            }
            DeclKind::Deinitializer(_) => {
                self.out
                    .decl_type
                    .insert(member, Type::Function { params: Vec::new(), ret: Box::new(Type::Void), variadic: false });
            }
            DeclKind::Accessor(a) => {
                let params: Vec<Type> = a.params.iter().map(|p| self.resolve_type_expr(p.ty)).collect();
                self.out
                    .decl_type
                    .insert(member, Type::Function { params, ret: Box::new(Type::Void), variadic: false });
            }
            DeclKind::TypeAlias(alias) => {
                let ty = self.resolve_type_expr(alias.target);
                self.out.decl_type.insert(member, ty);
            }
            _ => {}
        }
    }

    /// Synthesizes a memberwise initializer if `indirect`/non-foreign
    /// `type` declarations have none, and a deinitializer stub for
    /// `indirect` types that declare none (§4.6.3).
    fn synthesize_implicit_members(&mut self, id: DeclId) {
        let (name, fields, attrs) = {
            let DeclKind::Type(t) = self.ctx.decl(id).kind.clone() else { return };
            (t.name, t.fields.clone(), self.ctx.decl(id).attributes)
        };
        if attrs.contains(Attributes::FOREIGN) {
            return;
        }
        let members = self.out.type_members.entry(id).or_default();
        let has_init = members.iter().any(|m| matches!(self.ctx.decl(*m).kind, DeclKind::Initializer(_)));
        let has_deinit = members.iter().any(|m| matches!(self.ctx.decl(*m).kind, DeclKind::Deinitializer(_)));
        let is_indirect = attrs.contains(Attributes::INDIRECT);

        if !has_init {
            let init_id = self.synthesize_memberwise_init(&fields);
            self.out.type_members.get_mut(&id).unwrap().push(init_id);
            self.out.synthesized.push(init_id);
        }
        if is_indirect && !has_deinit {
            let body = self.ctx.alloc_stmt(StmtKind::Compound(Vec::new()), None);
            let deinit_id = self.ctx.alloc_decl(
                DeclKind::Deinitializer(trill_syntax::ast::DeinitializerDecl { body }),
                None,
                Attributes::IMPLICIT,
            );
            self.out.type_members.get_mut(&id).unwrap().push(deinit_id);
            self.out.synthesized.push(deinit_id);
        }
        let _ = name;
    }

    fn synthesize_memberwise_init(&mut self, fields: &[DeclId]) -> DeclId {
        let mut params = Vec::with_capacity(fields.len());
        let mut assigns = Vec::with_capacity(fields.len());
        for &field_id in fields {
            let DeclKind::Field(f) = self.ctx.decl(field_id).kind.clone() else { continue };
            params.push(Param { external_label: None, internal_name: f.name, ty: f.ty, span: None });

            let self_ref = self.ctx.alloc_expr_with(ExprKind::VarRef(self.self_sym), None, Attributes::IMPLICIT);
            let lhs = self.ctx.alloc_expr_with(
                ExprKind::PropertyRef { base: self_ref, name: f.name },
                None,
                Attributes::IMPLICIT,
            );
            let rhs = self.ctx.alloc_expr_with(ExprKind::VarRef(f.name), None, Attributes::IMPLICIT);
            let assign = self.ctx.alloc_expr_with(
                ExprKind::Infix { op: trill_syntax::ast::InfixOp::Assign, lhs, rhs },
                None,
                Attributes::IMPLICIT,
            );
            assigns.push(self.ctx.alloc_stmt(StmtKind::ExprStmt(assign), None));
        }
        let body = self.ctx.alloc_stmt(StmtKind::Compound(assigns), None);
        self.ctx.alloc_decl(
            DeclKind::Initializer(trill_syntax::ast::InitializerDecl { params, body }),
            None,
            Attributes::IMPLICIT,
        )
    }

    // ---------------------------------------------------------------
    // Layout (§4.6.4)
    // ---------------------------------------------------------------

    fn layout_of(&mut self, id: DeclId, visiting: &mut FxHashSet<DeclId>) -> u32 {
        if let Some(layout) = self.out.layouts.get(&id) {
            return layout.size_bytes;
        }
        if !visiting.insert(id) {
            self.error(
                "cyclic type dependency prevents computing a fixed layout",
                self.span_of_decl(id),
            );
            let layout = TypeLayout { fields: Vec::new(), size_bytes: 8, is_indirect: false };
            self.out.layouts.insert(id, layout);
            return 8;
        }

        let DeclKind::Type(t) = self.ctx.decl(id).kind.clone() else {
            visiting.remove(&id);
            return 8;
        };
        let is_indirect = self.out.indirect_types.contains(&id);
        let mut field_types = Vec::with_capacity(t.fields.len());
        for &field_id in &t.fields {
            let ty = self.out.decl_type.get(&field_id).cloned().unwrap_or(Type::Error);
            field_types.push((field_id, ty));
        }

        // Size lookups for nested named fields recurse through this same
        // function; collect the needed ids up front so the recursive
        // call doesn't alias `self` while `field_types` still borrows it.
        let mut nested_sizes = FxHashMap::default();
        for (_, ty) in &field_types {
            if let Type::Named(nested) = ty {
                if *nested != id {
                    let size = self.layout_of(*nested, visiting);
                    nested_sizes.insert(*nested, size);
                }
            }
        }

        let layout = layout::compute_layout(&field_types, is_indirect, &|nested| nested_sizes.get(&nested).copied());
        let size = layout.size_bytes;
        self.out.layouts.insert(id, layout);
        visiting.remove(&id);
        size
    }

    // ---------------------------------------------------------------
    // Type-expression resolution (§4.6.2)
    // ---------------------------------------------------------------

    fn resolve_type_expr(&mut self, id: TypeExprId) -> Type {
        if let Some(t) = self.out.type_of_type_expr.get(&id) {
            return t.clone();
        }
        let node = self.ctx.type_expr(id);
        let span = node.span;
        let ty = match node.kind.clone() {
            TypeExprKind::Named(name) => self.resolve_named_type(name, span),
            TypeExprKind::Pointer(inner) => Type::Pointer(Box::new(self.resolve_type_expr(inner))),
            // §9 open question: `[T]` stays pointer sugar, no bounds-checked array type.
            TypeExprKind::Array(inner) => Type::Pointer(Box::new(self.resolve_type_expr(inner))),
            TypeExprKind::Tuple(elems) => {
                Type::Tuple(elems.iter().map(|e| self.resolve_type_expr(*e)).collect())
            }
            TypeExprKind::Function { params, varargs, ret } => Type::Function {
                params: params.iter().map(|p| self.resolve_type_expr(*p)).collect(),
                ret: Box::new(self.resolve_type_expr(ret)),
                variadic: varargs,
            },
        };
        self.out.type_of_type_expr.insert(id, ty.clone());
        ty
    }

    fn resolve_named_type(&mut self, name: Symbol, span: NodeSpan) -> Type {
        if let Some(prim) = primitive_type(self.interner.resolve(name)) {
            return prim;
        }
        if let Some(&id) = self.out.type_decls.get(&name) {
            return Type::Named(id);
        }
        if let Some(&id) = self.out.protocol_decls.get(&name) {
            return Type::Named(id);
        }
        if let Some(&target) = self.alias_targets.get(&name) {
            if !self.resolving_aliases.insert(name) {
                self.error(
                    format!("circular type alias '{}'", self.interner.resolve(name)),
                    span,
                );
                return Type::Error;
            }
            let resolved = self.resolve_type_expr(target);
            self.resolving_aliases.remove(&name);
            return resolved;
        }
        self.error(format!("unknown type '{}'", self.interner.resolve(name)), span);
        Type::Error
    }

    // ---------------------------------------------------------------
    // Pass C: resolve bodies, names, `self`, calls, duplicate cases.
    // ---------------------------------------------------------------

    fn resolve_bodies(&mut self, decls: &[DeclId]) {
        for &id in decls {
            self.resolve_top_level_body(id);
        }
    }

    fn resolve_top_level_body(&mut self, id: DeclId) {
        match self.ctx.decl(id).kind.clone() {
            DeclKind::Function(f) => self.resolve_function_body(id, &f, None),
            DeclKind::Type(_) => self.resolve_type_body(id),
            DeclKind::Extension(ext) => {
                if let Some(&target) = self.out.type_decls.get(&ext.target) {
                    self.resolve_extension_body(target, &ext.members);
                }
            }
            DeclKind::Var(v) => {
                if let Some(init) = v.initializer {
                    self.resolve_expr(init);
                }
            }
            _ => {}
        }
    }

    fn resolve_type_body(&mut self, type_id: DeclId) {
        let members = self.out.type_members.get(&type_id).cloned().unwrap_or_default();
        self.scopes.push(ScopeKind::Type);
        for m in members {
            self.resolve_member_body(type_id, m);
        }
        self.scopes.pop();
    }

    fn resolve_extension_body(&mut self, type_id: DeclId, members: &[DeclId]) {
        self.scopes.push(ScopeKind::Type);
        for &m in members {
            self.resolve_member_body(type_id, m);
        }
        self.scopes.pop();
    }

    fn declare_self(&mut self, owner: DeclId, attrs: Attributes) {
        if attrs.contains(Attributes::STATIC) {
            return;
        }
        let ty_name = self.ctx.decl(owner).kind.clone();
        let name = match ty_name {
            DeclKind::Type(t) => t.name,
            _ => return,
        };
        let self_ty_expr = self.ctx.alloc_type_expr(TypeExprKind::Named(name), None);
        let self_decl = self.ctx.alloc_decl(
            DeclKind::Param(Param { external_label: None, internal_name: self.self_sym, ty: self_ty_expr, span: None }),
            None,
            Attributes::IMPLICIT,
        );
        self.out.decl_type.insert(self_decl, Type::Named(owner));
        self.scopes.declare(self.self_sym, self_decl, false);
    }

    fn declare_param(&mut self, param: &Param) -> DeclId {
        let ty = self.resolve_type_expr(param.ty);
        let decl = self.ctx.alloc_decl(DeclKind::Param(param.clone()), param.span, Attributes::none());
        self.out.decl_type.insert(decl, ty);
        match self.scopes.declare(param.internal_name, decl, false) {
            Declared::Redeclared => self.error(
                format!("duplicate parameter name '{}'", self.interner.resolve(param.internal_name)),
                param.span,
            ),
            _ => {}
        }
        decl
    }

    fn resolve_function_body(&mut self, id: DeclId, f: &trill_syntax::ast::FunctionDecl, owner: Option<DeclId>) {
        let attrs = self.ctx.decl(id).attributes;
        if attrs.contains(Attributes::MUTATING) && owner.is_none() {
            self.error("'mutating' is only valid on a type's methods", self.span_of_decl(id));
        }
        self.scopes.push(ScopeKind::Function);
        if let Some(owner) = owner {
            self.declare_self(owner, attrs);
        }
        for p in &f.params {
            self.declare_param(p);
        }
        if let Some(body) = f.body {
            self.resolve_stmt(body);
        }
        self.scopes.pop();
    }

    fn resolve_member_body(&mut self, owner: DeclId, member: DeclId) {
        match self.ctx.decl(member).kind.clone() {
            DeclKind::Function(f) => self.resolve_function_body(member, &f, Some(owner)),
            DeclKind::Initializer(i) => {
                self.scopes.push(ScopeKind::Function);
                self.declare_self(owner, Attributes::none());
                for p in &i.params {
                    self.declare_param(p);
                }
                self.resolve_stmt(i.body);
                self.scopes.pop();
            }
            DeclKind::Deinitializer(d) => {
                self.scopes.push(ScopeKind::Function);
                self.declare_self(owner, Attributes::none());
                self.resolve_stmt(d.body);
                self.scopes.pop();
            }
            DeclKind::Accessor(a) => {
                self.scopes.push(ScopeKind::Function);
                self.declare_self(owner, Attributes::none());
                for p in &a.params {
                    self.declare_param(p);
                }
                self.resolve_stmt(a.body);
                self.scopes.pop();
            }
            DeclKind::Field(_) | DeclKind::TypeAlias(_) => {}
            _ => {}
        }
    }

    // ---------------------------------------------------------------
    // Statement / expression traversal
    // ---------------------------------------------------------------

    fn resolve_stmt(&mut self, id: StmtId) {
        let kind = self.ctx.stmt(id).kind.clone();
        match kind {
            StmtKind::Compound(stmts) => {
                self.scopes.push(ScopeKind::Compound);
                for s in stmts {
                    self.resolve_stmt(s);
                }
                self.scopes.pop();
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.resolve_stmt(e);
                }
            }
            StmtKind::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            StmtKind::For { init, cond, increment, body } => {
                self.scopes.push(ScopeKind::Compound);
                if let Some(init) = init {
                    self.resolve_stmt(init);
                }
                if let Some(cond) = cond {
                    self.resolve_expr(cond);
                }
                if let Some(incr) = increment {
                    self.resolve_expr(incr);
                }
                self.resolve_stmt(body);
                self.scopes.pop();
            }
            StmtKind::Switch { scrutinee, cases } => {
                self.resolve_expr(scrutinee);
                self.resolve_switch_cases(&cases);
            }
            StmtKind::Return(Some(e)) => self.resolve_expr(e),
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue => {}
            StmtKind::ExprStmt(e) => self.resolve_expr(e),
            StmtKind::DeclStmt(decl_id) => self.resolve_local_decl(decl_id),
            StmtKind::PoundDiagnostic { is_error, message } => {
                let span = self.ctx.stmt(id).span;
                let text = self.interner.resolve(message).to_string();
                if is_error {
                    self.error(text, span);
                } else {
                    self.warn(text, span);
                }
            }
        }
    }

    fn resolve_switch_cases(&mut self, cases: &[SwitchCase]) {
        let mut seen = FxHashSet::default();
        for case in cases {
            if let Some(pattern) = case.pattern {
                self.resolve_expr(pattern);
                if let Some(key) = self.case_key(pattern) {
                    if !seen.insert(key) {
                        let span = self.ctx.expr(pattern).span;
                        self.error("duplicate case label", span);
                    }
                }
            }
            self.scopes.push(ScopeKind::Compound);
            for &s in &case.body {
                self.resolve_stmt(s);
            }
            self.scopes.pop();
        }
    }

    fn case_key(&self, expr_id: ExprId) -> Option<CaseKey> {
        match self.ctx.expr(expr_id).kind {
            ExprKind::IntLiteral(v) => Some(CaseKey::Int(v)),
            ExprKind::CharLiteral(c) => Some(CaseKey::Char(c)),
            ExprKind::BoolLiteral(b) => Some(CaseKey::Bool(b)),
            ExprKind::StringLiteral(s) => Some(CaseKey::Str(s)),
            _ => None,
        }
    }

    fn resolve_local_decl(&mut self, decl_id: DeclId) {
        let DeclKind::Var(v) = self.ctx.decl(decl_id).kind.clone() else { return };
        if let Some(ty) = v.ty {
            let resolved = self.resolve_type_expr(ty);
            self.out.decl_type.insert(decl_id, resolved);
        }
        if let Some(init) = v.initializer {
            self.resolve_expr(init);
        }
        let span = self.span_of_decl(decl_id);
        match self.scopes.declare(v.name, decl_id, false) {
            Declared::Redeclared => {
                self.error(format!("invalid redeclaration of '{}'", self.interner.resolve(v.name)), span)
            }
            Declared::ShadowsParameter => {
                self.warn(format!("declaration shadows a parameter '{}'", self.interner.resolve(v.name)), span)
            }
            _ => {}
        }
    }

    fn resolve_expr(&mut self, id: ExprId) {
        let kind = self.ctx.expr(id).kind.clone();
        match kind {
            ExprKind::IntLiteral(_)
            | ExprKind::FloatLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::NilLiteral
            | ExprKind::DeclRef(_)
            | ExprKind::Error => {}
            ExprKind::VarRef(name) => self.resolve_var_ref(id, name),
            ExprKind::PropertyRef { base, .. } => self.resolve_expr(base),
            ExprKind::FieldLookup { base, .. } => self.resolve_expr(base),
            ExprKind::Subscript { base, index } => {
                self.resolve_expr(base);
                self.resolve_expr(index);
            }
            ExprKind::Call { callee, args } => self.resolve_call(id, callee, &args),
            ExprKind::Closure { params, ret, body } => {
                self.scopes.push(ScopeKind::Function);
                for p in &params {
                    self.declare_param(p);
                }
                if let Some(ret) = ret {
                    self.resolve_type_expr(ret);
                }
                self.resolve_stmt(body);
                self.scopes.pop();
            }
            ExprKind::Paren(e) => self.resolve_expr(e),
            ExprKind::Tuple(elems) => {
                for e in elems {
                    self.resolve_expr(e);
                }
            }
            ExprKind::TupleFieldLookup { base, .. } => self.resolve_expr(base),
            ExprKind::Sizeof(ty) => {
                self.resolve_type_expr(ty);
            }
            ExprKind::Infix { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Prefix { operand, .. } => self.resolve_expr(operand),
            ExprKind::Ternary { cond, then_branch, else_branch } => {
                self.resolve_expr(cond);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            ExprKind::Cast { operand, target } | ExprKind::TypeCheck { operand, target } => {
                self.resolve_expr(operand);
                self.resolve_type_expr(target);
            }
            ExprKind::TypeReference(ty) => {
                self.resolve_type_expr(ty);
            }
            ExprKind::BitcastToAny(inner) | ExprKind::CheckedCast { operand: inner, .. } => {
                self.resolve_expr(inner);
            }
        }
    }

    fn resolve_var_ref(&mut self, id: ExprId, name: Symbol) {
        if name == self.self_sym && !self.scopes.inside_method() {
            self.error("use of 'self' outside of a method", self.ctx.expr(id).span);
        }
        match self.scopes.lookup(name).map(|s| s.to_vec()) {
            None => {
                self.error(
                    format!("use of unresolved identifier '{}'", self.interner.resolve(name)),
                    self.ctx.expr(id).span,
                );
                self.ctx.expr_mut(id).kind = ExprKind::Error;
            }
            Some(candidates) if candidates.len() == 1 => {
                self.ctx.expr_mut(id).kind = ExprKind::DeclRef(candidates[0]);
            }
            Some(_) => {
                self.error(
                    format!("ambiguous use of '{}'", self.interner.resolve(name)),
                    self.ctx.expr(id).span,
                );
                self.ctx.expr_mut(id).kind = ExprKind::Error;
            }
        }
    }

    fn resolve_call(&mut self, call_id: ExprId, callee: ExprId, args: &[trill_syntax::ast::CallArg]) {
        for arg in args {
            self.resolve_expr(arg.value);
        }
        let callee_name = match self.ctx.expr(callee).kind {
            ExprKind::VarRef(name) => Some(name),
            _ => None,
        };
        let Some(name) = callee_name else {
            self.resolve_expr(callee);
            return;
        };

        if let Some(&type_id) = self.out.type_decls.get(&name) {
            let candidates: Vec<DeclId> = self
                .out
                .type_members
                .get(&type_id)
                .map(|members| {
                    members
                        .iter()
                        .copied()
                        .filter(|m| matches!(self.ctx.decl(*m).kind, DeclKind::Initializer(_)))
                        .collect()
                })
                .unwrap_or_default();
            if candidates.is_empty() {
                self.error(
                    format!("type '{}' has no initializers", self.interner.resolve(name)),
                    self.ctx.expr(call_id).span,
                );
            }
            self.out.call_candidates.insert(call_id, candidates.clone());
            if candidates.len() == 1 {
                self.ctx.expr_mut(callee).kind = ExprKind::DeclRef(candidates[0]);
            }
            return;
        }

        match self.scopes.lookup(name).map(|s| s.to_vec()) {
            None => {
                self.error(
                    format!("use of unresolved identifier '{}'", self.interner.resolve(name)),
                    self.ctx.expr(callee).span,
                );
                self.ctx.expr_mut(callee).kind = ExprKind::Error;
                self.out.call_candidates.insert(call_id, Vec::new());
            }
            Some(candidates) => {
                self.out.call_candidates.insert(call_id, candidates.clone());
                if candidates.len() == 1 {
                    self.ctx.expr_mut(callee).kind = ExprKind::DeclRef(candidates[0]);
                }
            }
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum CaseKey {
    Int(i64),
    Char(char),
    Bool(bool),
    Str(Symbol),
}

fn primitive_type(name: &str) -> Option<Type> {
    Some(match name {
        "Int8" => Type::Int { signed: true, width: IntWidth::W8 },
        "Int16" => Type::Int { signed: true, width: IntWidth::W16 },
        "Int32" => Type::Int { signed: true, width: IntWidth::W32 },
        "Int64" => Type::Int { signed: true, width: IntWidth::W64 },
        "Int" => Type::Int { signed: true, width: IntWidth::Platform },
        "UInt8" => Type::Int { signed: false, width: IntWidth::W8 },
        "UInt16" => Type::Int { signed: false, width: IntWidth::W16 },
        "UInt32" => Type::Int { signed: false, width: IntWidth::W32 },
        "UInt64" => Type::Int { signed: false, width: IntWidth::W64 },
        "UInt" => Type::Int { signed: false, width: IntWidth::Platform },
        "Bool" => Type::Bool,
        "Float" => Type::Float,
        "Double" => Type::Double,
        "Void" => Type::Void,
        "Any" => Type::Any,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_base::{DiagnosticEngine, SourceId};
    use trill_syntax::ast::AstContext;
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

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
    fn resolves_a_simple_function_call() {
        let (out, ctx, diags) = analyze_source("func f() -> Int { return 1 } func main() { f() }");
        assert!(!diags.has_errors(), "unexpected diagnostics");
        let found_call = (0..ctx.decl_count()).any(|_| true);
        assert!(found_call);
        assert!(!out.decl_type.is_empty());
    }

    #[test]
    fn redeclaring_a_variable_in_the_same_scope_is_an_error() {
        let (_, _, diags) = analyze_source("func main() { var x = 1; var x = 2 }");
        assert!(diags.has_errors());
    }

    #[test]
    fn unresolved_identifier_is_an_error() {
        let (_, _, diags) = analyze_source("func main() { missingThing() }");
        assert!(diags.has_errors());
    }

    #[test]
    fn self_outside_a_method_is_an_error() {
        let (_, _, diags) = analyze_source("func main() { self }");
        assert!(diags.has_errors());
    }

    #[test]
    fn mutating_on_a_top_level_function_is_an_error() {
        let (_, _, diags) = analyze_source("mutating func f() {}");
        assert!(diags.has_errors());
    }

    #[test]
    fn static_on_a_top_level_declaration_is_an_error() {
        let (_, _, diags) = analyze_source("static func f() {}");
        assert!(diags.has_errors());
    }

    #[test]
    fn indirect_type_gets_a_synthesized_deinitializer() {
        let (out, ctx, diags) = analyze_source("indirect type Box { var x: Int }");
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let members = &out.type_members[&type_id];
        assert!(members.iter().any(|m| matches!(ctx.decl(*m).kind, DeclKind::Deinitializer(_))));
        assert!(members.iter().any(|m| matches!(ctx.decl(*m).kind, DeclKind::Initializer(_))));
    }

    #[test]
    fn type_with_declared_initializer_gets_no_synthesized_one() {
        let (out, ctx, diags) = analyze_source("type Box { var x: Int; init(x: Int) { self.x = x } }");
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let inits: Vec<_> = out.type_members[&type_id]
            .iter()
            .filter(|m| matches!(ctx.decl(**m).kind, DeclKind::Initializer(_)))
            .collect();
        assert_eq!(inits.len(), 1);
    }

    #[test]
    fn duplicate_case_labels_are_rejected() {
        let source = "func main() { switch 1 { case 1: break case 1: break default: break } }";
        let (_, _, diags) = analyze_source(source);
        assert!(diags.has_errors());
    }

    #[test]
    fn field_layout_aligns_fields_naturally() {
        let (out, _, diags) = analyze_source("type Pair { var a: Bool; var b: Int64 }");
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let layout = &out.layouts[&type_id];
        assert_eq!(layout.fields[1].offset_bytes, 8);
    }

    #[test]
    fn indirect_box_layout_starts_after_the_header() {
        let (out, _, diags) = analyze_source("indirect type Box { var x: Int64 }");
        assert!(!diags.has_errors());
        let type_id = *out.type_decls.values().next().unwrap();
        let layout = &out.layouts[&type_id];
        assert_eq!(layout.fields[0].offset_bytes, layout::BOX_HEADER_BYTES);
    }

    #[test]
    fn call_to_a_type_name_resolves_to_its_initializer() {
        let (out, ctx, diags) = analyze_source(
            "type Box { var x: Int; init(x: Int) { self.x = x } } func main() { let b = Box(x: 1) }",
        );
        assert!(!diags.has_errors());
        let call_candidates: Vec<_> = out.call_candidates.values().filter(|c| c.len() == 1).collect();
        assert!(!call_candidates.is_empty());
        let init_id = call_candidates[0][0];
        assert!(matches!(ctx.decl(init_id).kind, DeclKind::Initializer(_)));
    }

    #[test]
    fn unknown_type_reference_is_an_error() {
        let (_, _, diags) = analyze_source("func f(x: Bogus) {}");
        assert!(diags.has_errors());
    }

    #[test]
    fn pound_error_becomes_a_diagnostic() {
        let (_, _, diags) = analyze_source("func main() { #error \"broken\" }");
        assert!(diags.has_errors());
        assert_eq!(diags.len(), 1, "a single #error directive should produce exactly one diagnostic");

        struct MessageRecorder(Vec<String>);
        impl trill_base::DiagnosticConsumer for MessageRecorder {
            fn consume(&mut self, d: &trill_base::Diagnostic) {
                self.0.push(d.message.clone());
            }
        }
        let mut recorder = MessageRecorder(Vec::new());
        diags.emit_to(&mut recorder);
        assert_eq!(recorder.0, vec!["broken".to_string()]);
    }

    #[test]
    fn shadowing_a_parameter_emits_a_warning_not_an_error() {
        let (_, _, diags) = analyze_source("func f(x: Int) { var x = 2 }");
        assert!(!diags.has_errors());
    }
}
