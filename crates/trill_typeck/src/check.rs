//! Bottom-up type assignment and statement validation (§4.7).
//!
//! Every expression gets a [`Type`] recorded in [`TypeckOutput::expr_types`];
//! every declaration gets its final type in [`TypeckOutput::decl_types`] —
//! seeded from `trill_sema::SemaOutput::decl_type` and filled in for the
//! local variables Sema left open (those without an explicit type clause)
//! and for computed-property getters (Sema records their signature with a
//! `Void` placeholder return, since the property's real type depends on
//! type-checking the getter body — see [`Checker::infer_getter_returns`]).
//!
//! Implicit `Any` boxing and narrowing casts are inserted as new nodes by
//! rewriting the referencing node in place — the same in-place-rewrite
//! technique Sema uses for `VarRef` → `DeclRef` (§4.6).

use rustc_hash::FxHashMap;

use trill_base::{Diagnostic, DiagnosticEngine, Interner, Symbol};
use trill_sema::{SemaOutput, Type};
use trill_syntax::ast::{
    AccessorKind, AstContext, CallArg, DeclId, DeclKind, ExprId, ExprKind, FunctionDecl, InfixOp, Module, NodeSpan,
    Param, PrefixOp, StmtId, StmtKind, TypeExprId,
};

#[derive(Default)]
pub struct TypeckOutput {
    pub expr_types: FxHashMap<ExprId, Type>,
    pub decl_types: FxHashMap<DeclId, Type>,
    /// The call site's chosen overload, once resolved — `trill_ir` reads
    /// this instead of re-deriving it from `call_candidates`.
    pub call_callee: FxHashMap<ExprId, DeclId>,
    /// A `PropertyRef`/`FieldLookup` access that resolved to a computed
    /// property, keyed by the access expression, mapped to its getter —
    /// `trill_ir` emits a call instead of a field load for these. Absent
    /// for a stored field.
    pub property_getter: FxHashMap<ExprId, DeclId>,
    /// As `property_getter`, but the setter used when the same access is
    /// an assignment target. Absent for a get-only property or a stored
    /// field.
    pub property_setter: FxHashMap<ExprId, DeclId>,
}

/// Runs the type checker over every top-level declaration in `module`,
/// consuming Sema's output and mutating `ctx` in place to insert boxing and
/// checked-cast nodes (§4.7).
pub fn check(
    module: &Module,
    ctx: &mut AstContext,
    interner: &mut Interner,
    sema: &SemaOutput,
    diags: &mut DiagnosticEngine,
) -> TypeckOutput {
    let mut checker =
        Checker { ctx, interner, sema, diags, out: TypeckOutput::default(), member_field: FxHashMap::default() };
    checker.out.decl_types = sema.decl_type.clone();
    checker.infer_getter_returns(module);
    for &id in &module.decls {
        checker.check_top_level(id);
    }
    checker.out
}

struct Checker<'a> {
    ctx: &'a mut AstContext,
    interner: &'a mut Interner,
    sema: &'a SemaOutput,
    diags: &'a mut DiagnosticEngine,
    out: TypeckOutput,
    /// Whether the member a field-access expression resolved to is mutable
    /// (a stored field, or a property with a setter), keyed by the access
    /// expression itself — computed once in [`Checker::check_field_access`]
    /// and reused by [`Checker::is_mutable_lvalue`].
    member_field: FxHashMap<ExprId, bool>,
}

impl<'a> Checker<'a> {
    fn error(&mut self, message: impl Into<String>, span: NodeSpan) {
        let mut d = Diagnostic::error(message);
        if let Some(span) = span {
            d = d.at(span);
        }
        self.diags.emit(d);
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    fn display(&self, ty: &Type) -> String {
        let type_decls = &self.sema.type_decls;
        ty.display(&|id| {
            type_decls
                .iter()
                .find(|(_, decl)| **decl == id)
                .map(|(name, _)| self.interner.resolve(*name).to_string())
                .unwrap_or_else(|| "<type>".to_string())
        })
    }

    // -----------------------------------------------------------------
    // Pre-pass: computed-property getter return types (§4.7 inference).
    // -----------------------------------------------------------------

    /// Sema records every accessor's signature with a `Void` placeholder
    /// return, since a getter's real type isn't known until its body is
    /// examined. This pass infers it from the first `return` reachable in
    /// the getter body (not descending into nested closures) and overwrites
    /// the placeholder before any expression is checked, so a property read
    /// anywhere in the module sees the real type regardless of declaration
    /// order.
    fn infer_getter_returns(&mut self, module: &Module) {
        for &id in &module.decls {
            if let DeclKind::Type(_) = self.ctx.decl(id).kind {
                for member in self.sema.type_members.get(&id).cloned().unwrap_or_default() {
                    self.infer_one_getter(member);
                }
            }
            if let DeclKind::Extension(e) = self.ctx.decl(id).kind.clone() {
                if let Some(&owner) = self.sema.type_decls.get(&e.target) {
                    for member in self.sema.type_members.get(&owner).cloned().unwrap_or_default() {
                        self.infer_one_getter(member);
                    }
                }
            }
        }
    }

    fn infer_one_getter(&mut self, member: DeclId) {
        let DeclKind::Accessor(a) = self.ctx.decl(member).kind.clone() else { return };
        if a.kind != AccessorKind::Getter {
            return;
        }
        let ret = match self.find_first_return(a.body) {
            Some(expr) => self.check_expr(expr),
            None => Type::Void,
        };
        let params = match self.out.decl_types.get(&member) {
            Some(Type::Function { params, .. }) => params.clone(),
            _ => Vec::new(),
        };
        self.out.decl_types.insert(member, Type::Function { params, ret: Box::new(ret), variadic: false });
    }

    fn find_first_return(&self, id: StmtId) -> Option<ExprId> {
        match &self.ctx.stmt(id).kind {
            StmtKind::Compound(stmts) => stmts.iter().find_map(|&s| self.find_first_return(s)),
            StmtKind::If { then_branch, else_branch, .. } => {
                self.find_first_return(*then_branch).or_else(|| else_branch.and_then(|e| self.find_first_return(e)))
            }
            StmtKind::While { body, .. } => self.find_first_return(*body),
            StmtKind::For { body, .. } => self.find_first_return(*body),
            StmtKind::Switch { cases, .. } => {
                cases.iter().find_map(|c| c.body.iter().find_map(|&s| self.find_first_return(s)))
            }
            StmtKind::Return(Some(e)) => Some(*e),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Top level
    // -----------------------------------------------------------------

    fn check_top_level(&mut self, id: DeclId) {
        match self.ctx.decl(id).kind.clone() {
            DeclKind::Function(f) => self.check_function(id, &f),
            DeclKind::Type(_) => {
                for member in self.sema.type_members.get(&id).cloned().unwrap_or_default() {
                    self.check_member(member);
                }
            }
            DeclKind::Extension(e) => {
                for member in e.members.clone() {
                    self.check_member(member);
                }
            }
            DeclKind::Var(v) => {
                if let Some(init) = v.initializer {
                    let init_ty = self.check_expr(init);
                    self.finish_var_decl(id, v.ty.is_some(), init_ty);
                }
            }
            DeclKind::Protocol(_) | DeclKind::TypeAlias(_) | DeclKind::Operator(_) | DeclKind::Param(_)
            | DeclKind::Field(_) | DeclKind::Initializer(_) | DeclKind::Deinitializer(_) | DeclKind::Accessor(_) => {}
        }
    }

    fn check_member(&mut self, member: DeclId) {
        match self.ctx.decl(member).kind.clone() {
            DeclKind::Function(f) => self.check_function(member, &f),
            DeclKind::Initializer(i) => self.check_stmt(i.body, &Type::Void),
            DeclKind::Deinitializer(d) => self.check_stmt(d.body, &Type::Void),
            DeclKind::Accessor(a) => {
                let ret = match self.out.decl_types.get(&member) {
                    Some(Type::Function { ret, .. }) => (**ret).clone(),
                    _ => Type::Void,
                };
                self.check_stmt(a.body, &ret);
            }
            DeclKind::Field(_) => {}
            _ => {}
        }
    }

    fn check_function(&mut self, id: DeclId, f: &FunctionDecl) {
        let ret = match self.out.decl_types.get(&id) {
            Some(Type::Function { ret, .. }) => (**ret).clone(),
            _ => Type::Void,
        };
        if let Some(body) = f.body {
            self.check_stmt(body, &ret);
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    fn check_stmt(&mut self, id: StmtId, expected_return: &Type) {
        let kind = self.ctx.stmt(id).kind.clone();
        match kind {
            StmtKind::Compound(stmts) => {
                for s in stmts {
                    self.check_stmt(s, expected_return);
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_condition(cond);
                self.check_stmt(then_branch, expected_return);
                if let Some(e) = else_branch {
                    self.check_stmt(e, expected_return);
                }
            }
            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.check_stmt(body, expected_return);
            }
            StmtKind::For { init, cond, increment, body } => {
                if let Some(init) = init {
                    self.check_stmt(init, expected_return);
                }
                if let Some(cond) = cond {
                    self.check_condition(cond);
                }
                if let Some(inc) = increment {
                    self.check_expr(inc);
                }
                self.check_stmt(body, expected_return);
            }
            StmtKind::Switch { scrutinee, cases } => {
                let scrutinee_ty = self.check_expr(scrutinee);
                if !scrutinee_ty.is_error() && !scrutinee_ty.is_equatable() {
                    let span = self.ctx.expr(scrutinee).span;
                    self.error(format!("switch value of type '{}' is not Equatable", self.display(&scrutinee_ty)), span);
                }
                for case in cases {
                    if let Some(pattern) = case.pattern {
                        let pat_ty = self.check_expr(pattern);
                        if !pat_ty.is_error() && !scrutinee_ty.is_error() && pat_ty != scrutinee_ty {
                            let span = self.ctx.expr(pattern).span;
                            self.error(
                                format!(
                                    "case pattern of type '{}' does not match switch value of type '{}'",
                                    self.display(&pat_ty),
                                    self.display(&scrutinee_ty)
                                ),
                                span,
                            );
                        }
                    }
                    for s in case.body {
                        self.check_stmt(s, expected_return);
                    }
                }
            }
            StmtKind::Return(value) => match value {
                Some(expr) => {
                    let ty = self.check_expr(expr);
                    if *expected_return == Type::Void {
                        if !ty.is_error() {
                            let span = self.ctx.expr(expr).span;
                            self.error("cannot return a value from a function declared to return Void", span);
                        }
                    } else {
                        self.coerce_return_value(id, expr, &ty, expected_return);
                    }
                }
                None => {
                    if *expected_return != Type::Void && !expected_return.is_error() {
                        self.error(
                            format!("non-Void function must return a value of type '{}'", self.display(expected_return)),
                            self.ctx.stmt(id).span,
                        );
                    }
                }
            },
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::ExprStmt(e) => {
                self.check_expr(e);
            }
            StmtKind::DeclStmt(decl_id) => self.check_local_decl(decl_id),
            StmtKind::PoundDiagnostic { .. } => {}
        }
    }

    fn check_condition(&mut self, cond: ExprId) {
        let ty = self.check_expr(cond);
        if !ty.is_error() && ty != Type::Bool {
            let span = self.ctx.expr(cond).span;
            self.error(format!("condition must have type Bool, found '{}'", self.display(&ty)), span);
        }
    }

    fn check_local_decl(&mut self, decl_id: DeclId) {
        let DeclKind::Var(v) = self.ctx.decl(decl_id).kind.clone() else { return };
        match v.initializer {
            Some(init) => {
                let init_ty = self.check_expr(init);
                self.finish_var_decl(decl_id, v.ty.is_some(), init_ty);
            }
            None => {
                let span = self.ctx.decl(decl_id).span;
                self.error(format!("let/var declaration of '{}' has no initializer", self.name(v.name)), span);
                self.out.decl_types.insert(decl_id, Type::Error);
            }
        }
    }

    /// §4.7 "Inference": a declaration without an explicit type clause takes
    /// its initializer's type; one that declared a type instead validates
    /// the initializer is assignable to it.
    fn finish_var_decl(&mut self, decl_id: DeclId, had_explicit_type: bool, init_ty: Type) {
        if had_explicit_type {
            let declared = self.out.decl_types.get(&decl_id).cloned().unwrap_or(Type::Error);
            if !declared.is_error() && !init_ty.is_error() && !self.assignable(&init_ty, &declared) {
                let span = self.ctx.decl(decl_id).span;
                self.error(
                    format!("cannot assign value of type {} to {}", self.display(&init_ty), self.display(&declared)),
                    span,
                );
            }
        } else {
            self.out.decl_types.insert(decl_id, init_ty);
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    fn check_expr(&mut self, id: ExprId) -> Type {
        let kind = self.ctx.expr(id).kind.clone();
        let ty = match kind {
            ExprKind::IntLiteral(_) => Type::PLATFORM_INT,
            ExprKind::FloatLiteral(_) => Type::Double,
            ExprKind::CharLiteral(_) => Type::Int { signed: true, width: trill_sema::IntWidth::W8 },
            ExprKind::StringLiteral(_) => {
                Type::Pointer(Box::new(Type::Int { signed: false, width: trill_sema::IntWidth::W8 }))
            }
            ExprKind::BoolLiteral(_) => Type::Bool,
            ExprKind::NilLiteral => Type::Pointer(Box::new(Type::Void)),
            ExprKind::VarRef(_) => Type::Error,
            ExprKind::DeclRef(decl_id) => self.out.decl_types.get(&decl_id).cloned().unwrap_or(Type::Error),
            ExprKind::PropertyRef { base, name } | ExprKind::FieldLookup { base, name } => {
                self.check_field_access(id, base, name)
            }
            ExprKind::Subscript { base, index } => {
                let base_ty = self.check_expr(base);
                let index_ty = self.check_expr(index);
                if !index_ty.is_error() && !index_ty.is_integer() {
                    let span = self.ctx.expr(index).span;
                    self.error("subscript index must be an integer", span);
                }
                match base_ty {
                    Type::Pointer(inner) => *inner,
                    Type::Error => Type::Error,
                    other => {
                        let span = self.ctx.expr(base).span;
                        self.error(format!("cannot subscript a value of type '{}'", self.display(&other)), span);
                        Type::Error
                    }
                }
            }
            ExprKind::Call { callee, args } => self.check_call(id, callee, &args),
            ExprKind::Closure { params, ret, body } => self.check_closure(&params, ret, body),
            ExprKind::Paren(inner) => self.check_expr(inner),
            ExprKind::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.check_expr(*e)).collect()),
            ExprKind::TupleFieldLookup { base, index } => {
                let base_ty = self.check_expr(base);
                match base_ty {
                    Type::Tuple(elems) => elems.get(index as usize).cloned().unwrap_or(Type::Error),
                    Type::Error => Type::Error,
                    other => {
                        let span = self.ctx.expr(base).span;
                        self.error(format!("'{}' is not a tuple", self.display(&other)), span);
                        Type::Error
                    }
                }
            }
            ExprKind::Sizeof(ty) => {
                let _ = self.sema.type_of_type_expr.get(&ty);
                Type::PLATFORM_INT
            }
            ExprKind::Infix { op, lhs, rhs } => self.check_infix(id, op, lhs, rhs),
            ExprKind::Prefix { op, operand } => self.check_prefix(op, operand),
            ExprKind::Ternary { cond, then_branch, else_branch } => {
                self.check_condition(cond);
                let then_ty = self.check_expr(then_branch);
                let else_ty = self.check_expr(else_branch);
                if !then_ty.is_error() && !else_ty.is_error() && then_ty != else_ty {
                    let span = self.ctx.expr(id).span;
                    self.error(
                        format!(
                            "ternary branches have mismatched types '{}' and '{}'",
                            self.display(&then_ty),
                            self.display(&else_ty)
                        ),
                        span,
                    );
                    Type::Error
                } else {
                    then_ty
                }
            }
            ExprKind::Cast { operand, target } => self.check_cast(id, operand, target),
            ExprKind::TypeCheck { operand, target } => {
                let operand_ty = self.check_expr(operand);
                let _ = self.sema.type_of_type_expr.get(&target);
                if !operand_ty.is_error() && operand_ty != Type::Any {
                    let span = self.ctx.expr(operand).span;
                    self.error("'is' requires an Any value on the left-hand side", span);
                }
                Type::Bool
            }
            ExprKind::TypeReference(ty) => self.sema.type_of_type_expr.get(&ty).cloned().unwrap_or(Type::Error),
            ExprKind::BitcastToAny(inner) => {
                self.check_expr(inner);
                Type::Any
            }
            ExprKind::CheckedCast { operand, target } => {
                self.check_expr(operand);
                self.sema.type_of_type_expr.get(&target).cloned().unwrap_or(Type::Error)
            }
            ExprKind::Error => Type::Error,
        };
        self.out.expr_types.insert(id, ty.clone());
        ty
    }

    fn check_field_access(&mut self, access: ExprId, base: ExprId, name: Symbol) -> Type {
        let base_ty = self.check_expr(base);
        let owner = match &base_ty {
            Type::Named(owner) => *owner,
            Type::Error => return Type::Error,
            other => {
                let span = self.ctx.expr(base).span;
                self.error(format!("'{}' has no member '{}'", self.display(other), self.name(name)), span);
                return Type::Error;
            }
        };
        let members = self.sema.type_members.get(&owner).cloned().unwrap_or_default();
        let mut has_getter = false;
        let mut has_setter = false;
        for &member in &members {
            match &self.ctx.decl(member).kind {
                DeclKind::Field(f) if f.name == name => {
                    self.member_field.insert(access, true);
                    return self.out.decl_types.get(&member).cloned().unwrap_or(Type::Error);
                }
                DeclKind::Accessor(a) if a.property == name => match a.kind {
                    AccessorKind::Getter => has_getter = true,
                    AccessorKind::Setter => has_setter = true,
                },
                _ => {}
            }
        }
        if has_getter {
            self.member_field.insert(access, has_setter);
            for &member in &members {
                if let DeclKind::Accessor(a) = &self.ctx.decl(member).kind {
                    if a.property == name {
                        match a.kind {
                            AccessorKind::Getter => {
                                self.out.property_getter.insert(access, member);
                            }
                            AccessorKind::Setter => {
                                self.out.property_setter.insert(access, member);
                            }
                        }
                    }
                }
            }
            for &member in &members {
                if let DeclKind::Accessor(a) = &self.ctx.decl(member).kind {
                    if a.property == name && a.kind == AccessorKind::Getter {
                        return match self.out.decl_types.get(&member) {
                            Some(Type::Function { ret, .. }) => (**ret).clone(),
                            _ => Type::Error,
                        };
                    }
                }
            }
        }
        let span = self.ctx.expr(base).span;
        self.error(format!("'{}' has no member '{}'", self.display(&base_ty), self.name(name)), span);
        Type::Error
    }

    fn check_closure(&mut self, params: &[Param], ret: Option<TypeExprId>, body: StmtId) -> Type {
        let param_types: Vec<Type> =
            params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
        let ret_ty = match ret {
            Some(t) => self.sema.type_of_type_expr.get(&t).cloned().unwrap_or(Type::Error),
            None => Type::Void,
        };
        self.check_stmt(body, &ret_ty);
        Type::Function { params: param_types, ret: Box::new(ret_ty), variadic: false }
    }

    fn check_prefix(&mut self, op: PrefixOp, operand: ExprId) -> Type {
        let ty = self.check_expr(operand);
        if ty.is_error() {
            return Type::Error;
        }
        match op {
            PrefixOp::Neg => {
                if ty.is_numeric() {
                    ty
                } else {
                    self.type_error(operand, "negation requires a numeric operand", &ty)
                }
            }
            PrefixOp::Not => {
                if ty == Type::Bool {
                    Type::Bool
                } else {
                    self.type_error(operand, "'!' requires a Bool operand", &ty)
                }
            }
            PrefixOp::BitNot => {
                if ty.is_integer() {
                    ty
                } else {
                    self.type_error(operand, "'~' requires an integer operand", &ty)
                }
            }
            PrefixOp::AddressOf => {
                if self.is_lvalue(operand) {
                    Type::Pointer(Box::new(ty))
                } else {
                    self.type_error(operand, "'&' requires an addressable (l-value) operand", &ty)
                }
            }
            PrefixOp::Deref => match ty {
                Type::Pointer(inner) => *inner,
                other => self.type_error(operand, "dereference requires a pointer operand", &other),
            },
        }
    }

    fn type_error(&mut self, at: ExprId, message: &str, found: &Type) -> Type {
        let span = self.ctx.expr(at).span;
        self.error(format!("{message}, found '{}'", self.display(found)), span);
        Type::Error
    }

    fn check_infix(&mut self, id: ExprId, op: InfixOp, lhs: ExprId, rhs: ExprId) -> Type {
        if op.is_assignment() {
            return self.check_assignment(id, op, lhs, rhs);
        }
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);
        if lhs_ty.is_error() || rhs_ty.is_error() {
            return Type::Error;
        }
        match op {
            InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Gt | InfixOp::Le | InfixOp::Ge => {
                let unified = self.unify_numeric(lhs, rhs, &lhs_ty, &rhs_ty);
                if unified.is_none() && lhs_ty != rhs_ty {
                    let span = self.ctx.expr(id).span;
                    self.error(
                        format!("cannot compare '{}' and '{}'", self.display(&lhs_ty), self.display(&rhs_ty)),
                        span,
                    );
                }
                Type::Bool
            }
            InfixOp::And | InfixOp::Or => {
                if lhs_ty != Type::Bool || rhs_ty != Type::Bool {
                    let span = self.ctx.expr(id).span;
                    self.error("logical operators require Bool operands", span);
                }
                Type::Bool
            }
            InfixOp::Add if matches!(lhs_ty, Type::Pointer(_)) && rhs_ty.is_integer() => lhs_ty,
            InfixOp::Sub if matches!((&lhs_ty, &rhs_ty), (Type::Pointer(_), Type::Pointer(_))) => Type::PLATFORM_INT,
            InfixOp::Add | InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod | InfixOp::BitAnd
            | InfixOp::BitOr | InfixOp::BitXor | InfixOp::Shl | InfixOp::Shr => {
                match self.unify_numeric(lhs, rhs, &lhs_ty, &rhs_ty) {
                    Some(ty) => ty,
                    None => {
                        let span = self.ctx.expr(id).span;
                        self.error(
                            format!(
                                "arithmetic requires matching numeric types, found '{}' and '{}'",
                                self.display(&lhs_ty),
                                self.display(&rhs_ty)
                            ),
                            span,
                        );
                        Type::Error
                    }
                }
            }
            InfixOp::Assign
            | InfixOp::AddAssign
            | InfixOp::SubAssign
            | InfixOp::MulAssign
            | InfixOp::DivAssign
            | InfixOp::ModAssign
            | InfixOp::AndAssign
            | InfixOp::OrAssign
            | InfixOp::XorAssign
            | InfixOp::ShlAssign
            | InfixOp::ShrAssign => unreachable!("handled by is_assignment() above"),
        }
    }

    /// Literal defaulting (§4.7): an untyped literal operand adopts the
    /// other operand's concrete numeric type; two literals default
    /// independently and must then agree. `None` means a genuine mismatch.
    fn unify_numeric(&mut self, lhs: ExprId, rhs: ExprId, lhs_ty: &Type, rhs_ty: &Type) -> Option<Type> {
        if !lhs_ty.is_numeric() || !rhs_ty.is_numeric() {
            return None;
        }
        if lhs_ty == rhs_ty {
            return Some(lhs_ty.clone());
        }
        let lhs_literal = self.is_bare_numeric_literal(lhs);
        let rhs_literal = self.is_bare_numeric_literal(rhs);
        if lhs_literal && !rhs_literal {
            self.out.expr_types.insert(lhs, rhs_ty.clone());
            Some(rhs_ty.clone())
        } else if rhs_literal && !lhs_literal {
            self.out.expr_types.insert(rhs, lhs_ty.clone());
            Some(lhs_ty.clone())
        } else {
            None
        }
    }

    fn is_bare_numeric_literal(&self, id: ExprId) -> bool {
        matches!(self.ctx.expr(id).kind, ExprKind::IntLiteral(_) | ExprKind::FloatLiteral(_))
    }

    fn is_lvalue(&self, id: ExprId) -> bool {
        match &self.ctx.expr(id).kind {
            ExprKind::DeclRef(_)
            | ExprKind::FieldLookup { .. }
            | ExprKind::PropertyRef { .. }
            | ExprKind::Subscript { .. }
            | ExprKind::TupleFieldLookup { .. } => true,
            ExprKind::Prefix { op: PrefixOp::Deref, .. } => true,
            ExprKind::Paren(inner) => self.is_lvalue(*inner),
            _ => false,
        }
    }

    fn is_mutable_lvalue(&self, id: ExprId) -> bool {
        match &self.ctx.expr(id).kind {
            ExprKind::DeclRef(decl_id) => match &self.ctx.decl(*decl_id).kind {
                DeclKind::Var(v) => v.mutable,
                _ => false,
            },
            ExprKind::FieldLookup { .. } | ExprKind::PropertyRef { .. } => {
                self.member_field.get(&id).copied().unwrap_or(true)
            }
            ExprKind::Subscript { .. } => true,
            ExprKind::TupleFieldLookup { base, .. } => self.is_mutable_lvalue(*base),
            ExprKind::Prefix { op: PrefixOp::Deref, .. } => true,
            ExprKind::Paren(inner) => self.is_mutable_lvalue(*inner),
            _ => false,
        }
    }

    fn check_assignment(&mut self, id: ExprId, op: InfixOp, lhs: ExprId, rhs: ExprId) -> Type {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.check_expr(rhs);
        if !self.is_lvalue(lhs) {
            let span = self.ctx.expr(lhs).span;
            self.error("left-hand side of assignment is not assignable", span);
            return Type::Error;
        }
        if !self.is_mutable_lvalue(lhs) {
            let span = self.ctx.expr(lhs).span;
            self.error("cannot assign to an immutable declaration", span);
            return Type::Error;
        }
        if lhs_ty.is_error() || rhs_ty.is_error() {
            return Type::Void;
        }
        if matches!(op, InfixOp::Assign) {
            if !self.assignable(&rhs_ty, &lhs_ty) {
                let span = self.ctx.expr(id).span;
                self.error(
                    format!("cannot assign value of type {} to {}", self.display(&rhs_ty), self.display(&lhs_ty)),
                    span,
                );
            } else if lhs_ty == Type::Any && rhs_ty != Type::Any {
                let wrapped = self.box_into_any(rhs);
                if let ExprKind::Infix { op, lhs, .. } = self.ctx.expr(id).kind.clone() {
                    self.ctx.expr_mut(id).kind = ExprKind::Infix { op, lhs, rhs: wrapped };
                }
            }
        } else if self.unify_numeric(lhs, rhs, &lhs_ty, &rhs_ty).is_none() {
            let span = self.ctx.expr(id).span;
            self.error(
                format!(
                    "compound assignment requires matching numeric types, found '{}' and '{}'",
                    self.display(&lhs_ty),
                    self.display(&rhs_ty)
                ),
                span,
            );
        }
        Type::Void
    }

    /// Allocates a `BitcastToAny` wrapper around `inner` and records its
    /// type; the caller patches whichever parent node referenced `inner`.
    fn box_into_any(&mut self, inner: ExprId) -> ExprId {
        let span = self.ctx.expr(inner).span;
        let wrapped =
            self.ctx.alloc_expr_with(ExprKind::BitcastToAny(inner), span, trill_syntax::ast::Attributes::IMPLICIT);
        self.out.expr_types.insert(wrapped, Type::Any);
        wrapped
    }

    /// `from` is assignable to `to` when they're structurally equal or
    /// `to` is `Any` (an implicit box, §4.7 "Any boxing").
    fn assignable(&self, from: &Type, to: &Type) -> bool {
        from == to || *to == Type::Any || from.is_error() || to.is_error()
    }

    fn check_cast(&mut self, id: ExprId, operand: ExprId, target: TypeExprId) -> Type {
        let operand_ty = self.check_expr(operand);
        let target_ty = self.sema.type_of_type_expr.get(&target).cloned().unwrap_or(Type::Error);
        if operand_ty.is_error() || target_ty.is_error() {
            return target_ty;
        }
        let permitted = operand_ty == target_ty
            || target_ty == Type::Any
            || operand_ty == Type::Any
            || (operand_ty.is_numeric() && target_ty.is_numeric())
            || matches!((&operand_ty, &target_ty), (Type::Pointer(_), Type::Pointer(_)));
        if !permitted {
            let span = self.ctx.expr(id).span;
            self.error(
                format!("cannot cast value of type '{}' to '{}'", self.display(&operand_ty), self.display(&target_ty)),
                span,
            );
            return Type::Error;
        }
        if operand_ty == Type::Any && target_ty != Type::Any {
            // Narrowing an `Any` requires a checked cast that can trap at
            // runtime (§4.7, §4.8) — rewrite this node in place.
            self.ctx.expr_mut(id).kind = ExprKind::CheckedCast { operand, target };
        } else if operand_ty != Type::Any && target_ty == Type::Any {
            self.ctx.expr_mut(id).kind = ExprKind::BitcastToAny(operand);
        }
        target_ty
    }

    fn coerce_return_value(&mut self, stmt_id: StmtId, expr: ExprId, ty: &Type, expected: &Type) {
        if ty.is_error() {
            return;
        }
        if !self.assignable(ty, expected) {
            let span = self.ctx.expr(expr).span;
            self.error(
                format!(
                    "cannot return value of type '{}' from a function returning '{}'",
                    self.display(ty),
                    self.display(expected)
                ),
                span,
            );
            return;
        }
        if *expected == Type::Any && *ty != Type::Any {
            let wrapped = self.box_into_any(expr);
            self.ctx.stmt_mut(stmt_id).kind = StmtKind::Return(Some(wrapped));
        }
    }

    // -----------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------

    fn check_call(&mut self, call_id: ExprId, callee: ExprId, args: &[CallArg]) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|a| self.check_expr(a.value)).collect();
        if let Some(candidates) = self.sema.call_candidates.get(&call_id).cloned() {
            if candidates.is_empty() {
                // Sema already diagnosed (unresolved name or type with no
                // initializers) — don't cascade a second diagnostic.
                return Type::Error;
            }
            let matches: Vec<DeclId> =
                candidates.iter().filter(|&&c| self.candidate_matches(c, args, &arg_types)).copied().collect();
            match matches.len() {
                1 => {
                    let chosen = matches[0];
                    self.out.call_callee.insert(call_id, chosen);
                    self.box_call_args(call_id, chosen, args);
                    self.return_type_of(chosen)
                }
                0 => {
                    let span = self.ctx.expr(call_id).span;
                    self.error("no matching overload for this call", span);
                    Type::Error
                }
                _ => {
                    let span = self.ctx.expr(call_id).span;
                    self.error("ambiguous call: multiple overloads match", span);
                    Type::Error
                }
            }
        } else {
            let callee_ty = self.check_expr(callee);
            match callee_ty {
                Type::Function { params, ret, variadic } => {
                    if !self.arity_ok(params.len(), variadic, args.len()) || !self.positional_types_ok(&params, &arg_types)
                    {
                        let span = self.ctx.expr(call_id).span;
                        self.error("call arguments do not match the callee's parameter types", span);
                        Type::Error
                    } else {
                        *ret
                    }
                }
                Type::Error => Type::Error,
                other => {
                    let span = self.ctx.expr(callee).span;
                    self.error(format!("'{}' is not callable", self.display(&other)), span);
                    Type::Error
                }
            }
        }
    }

    fn member_params(&self, decl_id: DeclId) -> Option<Vec<Param>> {
        match &self.ctx.decl(decl_id).kind {
            DeclKind::Function(f) => Some(f.params.clone()),
            DeclKind::Initializer(i) => Some(i.params.clone()),
            DeclKind::Accessor(a) => Some(a.params.clone()),
            _ => None,
        }
    }

    fn is_variadic(&self, decl_id: DeclId) -> bool {
        matches!(&self.ctx.decl(decl_id).kind, DeclKind::Function(f) if f.variadic)
    }

    fn return_type_of(&self, decl_id: DeclId) -> Type {
        match self.out.decl_types.get(&decl_id) {
            Some(Type::Function { ret, .. }) => (**ret).clone(),
            _ => Type::Error,
        }
    }

    fn candidate_matches(&self, decl_id: DeclId, args: &[CallArg], arg_types: &[Type]) -> bool {
        let Some(params) = self.member_params(decl_id) else { return false };
        let variadic = self.is_variadic(decl_id);
        if !self.arity_ok(params.len(), variadic, args.len()) {
            return false;
        }
        for (i, arg) in args.iter().enumerate() {
            if i >= params.len() {
                break; // variadic tail, untyped
            }
            let param = &params[i];
            if let Some(label) = arg.label {
                let expected_label = param.external_label.unwrap_or(param.internal_name);
                if label != expected_label {
                    return false;
                }
            }
            let param_ty = self.sema.type_of_type_expr.get(&param.ty).cloned().unwrap_or(Type::Error);
            if !arg_types[i].is_error() && !param_ty.is_error() && !self.assignable(&arg_types[i], &param_ty) {
                return false;
            }
        }
        true
    }

    fn arity_ok(&self, param_count: usize, variadic: bool, arg_count: usize) -> bool {
        if variadic {
            arg_count >= param_count
        } else {
            arg_count == param_count
        }
    }

    fn positional_types_ok(&self, params: &[Type], arg_types: &[Type]) -> bool {
        if arg_types.len() < params.len() {
            return false;
        }
        params.iter().zip(arg_types.iter()).all(|(p, a)| a.is_error() || p.is_error() || self.assignable(a, p))
    }

    /// Once a single candidate is chosen, box any argument whose parameter
    /// expects `Any` but whose argument is concrete (§4.7 "Any boxing"),
    /// rewriting the call node's argument list in place.
    fn box_call_args(&mut self, call_id: ExprId, decl_id: DeclId, args: &[CallArg]) {
        let Some(params) = self.member_params(decl_id) else { return };
        let mut changed = false;
        let mut updated = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            if let Some(param) = params.get(i) {
                let param_ty = self.sema.type_of_type_expr.get(&param.ty).cloned().unwrap_or(Type::Error);
                let arg_ty = self.out.expr_types.get(&arg.value).cloned().unwrap_or(Type::Error);
                if param_ty == Type::Any && arg_ty != Type::Any && !arg_ty.is_error() {
                    changed = true;
                    updated.push(CallArg { label: arg.label, value: self.box_into_any(arg.value) });
                    continue;
                }
            }
            updated.push(arg.clone());
        }
        if changed {
            if let ExprKind::Call { callee, .. } = self.ctx.expr(call_id).kind.clone() {
                self.ctx.expr_mut(call_id).kind = ExprKind::Call { callee, args: updated };
            }
        }
    }
}
