//! Expression codegen (§4.7, §4.8): every expression the type checker
//! assigned a [`Type`] to lowers to exactly one LLVM value here, following
//! the same bottom-up shape `trill_typeck::check` itself uses.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FloatValue, IntValue, PointerValue};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};
use trill_sema::Type;
use trill_syntax::ast::{CallArg, DeclKind, ExprId, ExprKind, InfixOp, PrefixOp};

use super::Codegen;

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    fn expr_type(&self, id: ExprId) -> Type {
        self.typeck.expr_types.get(&id).cloned().unwrap_or(Type::Error)
    }

    /// `true` if `id` (after peeling parens) is a call to a `Type`'s
    /// initializer — the one case where a freshly produced indirect-type
    /// value already carries refcount 1 and must not be retained again
    /// (§4.8's `trill_allocateIndirectType` contract). Every other route
    /// to an indirect-type value (a load, a field, a function return) is
    /// treated as borrowed and retained when it's bound into a new owning
    /// slot — a deliberate simplification of full ownership tracking,
    /// recorded in `DESIGN.md`.
    fn is_fresh_construction(&self, id: ExprId) -> bool {
        match self.ast.expr(id).kind.clone() {
            ExprKind::Paren(inner) => self.is_fresh_construction(inner),
            ExprKind::Call { .. } => self
                .typeck
                .call_callee
                .get(&id)
                .map(|callee| matches!(self.ast.decl(*callee).kind, DeclKind::Initializer(_)))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn is_indirect_named(&self, ty: &Type) -> bool {
        matches!(ty, Type::Named(decl) if self.types.is_indirect(*decl))
    }

    fn as_i8p(&self, value: PointerValue<'ctx>) -> PointerValue<'ctx> {
        self.builder
            .build_pointer_cast(value, self.llvm_ctx.i8_type().ptr_type(AddressSpace::default()), "as_i8p")
            .expect("pointer cast never fails for same address space")
    }

    fn emit_retain(&self, value: BasicValueEnum<'ctx>) {
        if let BasicValueEnum::PointerValue(ptr) = value {
            let casted = self.as_i8p(ptr);
            self.builder.build_call(self.runtime.retain, &[casted.into()], "retain").expect("retain call");
        }
    }

    pub(super) fn emit_release(&self, value: BasicValueEnum<'ctx>) {
        if let BasicValueEnum::PointerValue(ptr) = value {
            let casted = self.as_i8p(ptr);
            self.builder.build_call(self.runtime.release, &[casted.into()], "release").expect("release call");
        }
    }

    /// Retains `value` in place if its static type is an `indirect type`
    /// and `id` names a borrowed route to it (see
    /// [`Self::is_fresh_construction`]); used at every point ownership of
    /// a reference is handed to a new slot (a `let`/`var` binding, a
    /// reassignment, or a `return`).
    pub(super) fn retain_if_borrowed(&self, id: ExprId, ty: &Type, value: BasicValueEnum<'ctx>) {
        if self.is_indirect_named(ty) && !self.is_fresh_construction(id) {
            self.emit_retain(value);
        }
    }

    pub(super) fn gen_expr(&mut self, id: ExprId) -> BasicValueEnum<'ctx> {
        let kind = self.ast.expr(id).kind.clone();
        match kind {
            ExprKind::IntLiteral(v) => {
                let ty = self.expr_type(id);
                self.types.llvm_type(&ty).into_int_type().const_int(v as u64, true).into()
            }
            ExprKind::FloatLiteral(v) => {
                let ty = self.expr_type(id);
                self.types.llvm_type(&ty).into_float_type().const_float(v).into()
            }
            ExprKind::CharLiteral(c) => self.llvm_ctx.i8_type().const_int(c as u64, false).into(),
            ExprKind::StringLiteral(sym) => {
                let text = self.interner.resolve(sym);
                let global = self.builder.build_global_string_ptr(text, "strlit").expect("global string");
                global.as_pointer_value().into()
            }
            ExprKind::BoolLiteral(b) => self.llvm_ctx.bool_type().const_int(b as u64, false).into(),
            ExprKind::NilLiteral => {
                let ty = self.expr_type(id);
                self.types.llvm_type(&ty).into_pointer_type().const_null().into()
            }
            ExprKind::VarRef(_) | ExprKind::Error => {
                // Never reaches codegen in a module that passed Sema/typeck
                // cleanly; produce a well-typed poison value rather than
                // panicking mid-function.
                let ty = self.expr_type(id);
                self.types.llvm_type(&ty).const_zero()
            }
            ExprKind::DeclRef(decl_id) => self.gen_decl_ref(decl_id),
            ExprKind::PropertyRef { base, .. } | ExprKind::FieldLookup { base, .. } if self.typeck.property_getter.contains_key(&id) => {
                self.gen_getter_call(id, base)
            }
            ExprKind::PropertyRef { .. } | ExprKind::FieldLookup { .. } | ExprKind::Subscript { .. } | ExprKind::TupleFieldLookup { .. } => {
                let ptr = self.gen_lvalue(id);
                self.builder.build_load(self.types.llvm_type(&self.expr_type(id)), ptr, "load").expect("load")
            }
            ExprKind::Call { callee, args } => self.gen_call(id, callee, &args),
            ExprKind::Closure { body, params, ret } => self.gen_closure(&params, ret, body),
            ExprKind::Paren(inner) => self.gen_expr(inner),
            ExprKind::Tuple(elems) => self.gen_tuple(id, &elems),
            ExprKind::Sizeof(ty_expr) => {
                let ty = self.sema.type_of_type_expr.get(&ty_expr).cloned().unwrap_or(Type::Error);
                let llvm_ty = self.types.llvm_type(&ty);
                let size = llvm_ty.size_of().unwrap_or_else(|| self.llvm_ctx.i64_type().const_int(0, false));
                size.into()
            }
            ExprKind::Infix { op, lhs, rhs } => self.gen_infix(id, op, lhs, rhs),
            ExprKind::Prefix { op, operand } => self.gen_prefix(op, operand),
            ExprKind::Ternary { cond, then_branch, else_branch } => self.gen_ternary(id, cond, then_branch, else_branch),
            ExprKind::Cast { operand, .. } => self.gen_numeric_cast(id, operand),
            ExprKind::TypeCheck { operand, target } => self.gen_type_check(operand, target),
            ExprKind::TypeReference(_) => self.llvm_ctx.i64_type().const_int(0, false).into(),
            ExprKind::BitcastToAny(inner) => self.gen_bitcast_to_any(inner),
            ExprKind::CheckedCast { operand, target } => self.gen_checked_cast(id, operand, target),
        }
    }

    fn gen_decl_ref(&mut self, decl_id: trill_syntax::ast::DeclId) -> BasicValueEnum<'ctx> {
        if let Some(&function) = self.functions.get(&decl_id) {
            return function.as_global_value().as_pointer_value().into();
        }
        let ptr = *self.locals.get(&decl_id).unwrap_or_else(|| panic!("no local bound for declaration {decl_id:?}"));
        let ty = self.sema.decl_type.get(&decl_id).cloned().unwrap_or(Type::Error);
        self.builder.build_load(self.types.llvm_type(&ty), ptr, "load").expect("load")
    }

    /// Resolves `id` to a pointer suitable for loading from or storing
    /// into — the l-value routes the type checker already validated in
    /// `is_mutable_lvalue`/`is_lvalue` (§4.7).
    pub(super) fn gen_lvalue(&mut self, id: ExprId) -> PointerValue<'ctx> {
        match self.ast.expr(id).kind.clone() {
            ExprKind::DeclRef(decl_id) => {
                *self.locals.get(&decl_id).unwrap_or_else(|| panic!("no local bound for declaration {decl_id:?}"))
            }
            ExprKind::Paren(inner) => self.gen_lvalue(inner),
            ExprKind::Prefix { op: PrefixOp::Deref, operand } => {
                let value = self.gen_expr(operand);
                value.into_pointer_value()
            }
            ExprKind::PropertyRef { base, name } | ExprKind::FieldLookup { base, name } => self.gen_field_gep(base, name),
            ExprKind::Subscript { base, index } => {
                let base_value = self.gen_expr(base);
                let index_value = self.gen_expr(index).into_int_value();
                let base_ty = self.expr_type(base);
                let elem_ty = match base_ty {
                    Type::Pointer(inner) => self.types.llvm_type(&inner),
                    other => self.types.llvm_type(&other),
                };
                unsafe {
                    self.builder
                        .build_gep(elem_ty, base_value.into_pointer_value(), &[index_value], "subscript")
                        .expect("gep")
                }
            }
            ExprKind::TupleFieldLookup { base, index } => {
                let base_ptr = self.gen_lvalue(base);
                let base_ty = self.expr_type(base);
                let llvm_ty = self.types.llvm_type(&base_ty);
                self.builder.build_struct_gep(llvm_ty, base_ptr, index, "tuple_field").expect("tuple field gep")
            }
            other => panic!("expression kind is not an l-value: {other:?}"),
        }
    }

    fn gen_field_gep(&mut self, base: ExprId, name: trill_base::Symbol) -> PointerValue<'ctx> {
        let base_ty = self.expr_type(base);
        let Type::Named(owner) = base_ty else { panic!("field access base is not a named type") };
        let layout = &self.sema.layouts[&owner];
        let field_name = self.interner.resolve(name);
        let field_index =
            layout.fields.iter().position(|f| self.interner.resolve(self.field_name(f.decl)) == field_name).unwrap_or(0);
        let llvm_index = if self.types.is_indirect(owner) { field_index as u32 + 1 } else { field_index as u32 };

        let base_value = self.gen_expr(base);
        let struct_ptr = match base_value {
            BasicValueEnum::PointerValue(p) => p,
            _ => panic!("field access base did not lower to a pointer"),
        };
        let struct_ty = self.types.named_struct(owner).expect("named type registered");
        self.builder.build_struct_gep(struct_ty, struct_ptr, llvm_index, "field").expect("field gep")
    }

    fn field_name(&self, field_decl: trill_syntax::ast::DeclId) -> trill_base::Symbol {
        match &self.ast.decl(field_decl).kind {
            DeclKind::Field(f) => f.name,
            DeclKind::Var(v) => v.name,
            DeclKind::Param(p) => p.internal_name,
            _ => trill_base::Symbol::EMPTY,
        }
    }

    fn gen_tuple(&mut self, id: ExprId, elems: &[ExprId]) -> BasicValueEnum<'ctx> {
        let ty = self.expr_type(id);
        let llvm_ty = self.types.llvm_type(&ty).into_struct_type();
        let alloca = self.builder.build_alloca(llvm_ty, "tuple");
        let alloca = alloca.expect("alloca");
        for (i, &elem) in elems.iter().enumerate() {
            let value = self.gen_expr(elem);
            let field_ptr = self.builder.build_struct_gep(llvm_ty, alloca, i as u32, "tuple_elem").expect("tuple gep");
            self.builder.build_store(field_ptr, value).expect("store");
        }
        self.builder.build_load(llvm_ty, alloca, "tuple_value").expect("load")
    }

    /// Non-capturing closures only (a `Closure` node never records a
    /// capture list): lowered as a fresh top-level function emitted at
    /// the point the literal appears, then referenced by pointer. A
    /// closure body that reads an enclosing local falls back to whatever
    /// stale `self.locals` happen to still be bound, which is a known
    /// gap recorded in `DESIGN.md` rather than full capture support.
    fn gen_closure(
        &mut self,
        params: &[trill_syntax::ast::Param],
        ret: Option<trill_syntax::ast::TypeExprId>,
        body: trill_syntax::ast::StmtId,
    ) -> BasicValueEnum<'ctx> {
        let param_types: Vec<Type> =
            params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
        let ret_ty = ret.and_then(|t| self.sema.type_of_type_expr.get(&t).cloned()).unwrap_or(Type::Void);
        let fn_type = self.function_type(&param_types, false, &ret_ty);
        let function = self.module.add_function("trill.closure", fn_type, None);

        let caller_block = self.builder.get_insert_block();
        let saved_function = self.current_function;
        let saved_self = self.current_self.take();
        let saved_locals = std::mem::take(&mut self.locals);

        self.current_function = Some(function);
        let entry = self.llvm_ctx.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        for (index, (param, decl_id)) in params.iter().zip(self.find_param_decls(body, params)).enumerate() {
            let llvm_param = function.get_nth_param(index as u32).expect("closure parameter present");
            let alloca =
                self.builder.build_alloca(llvm_param.get_type(), self.interner.resolve(param.internal_name)).expect("alloca");
            self.builder.build_store(alloca, llvm_param).expect("store");
            if let Some(id) = decl_id {
                self.locals.insert(id, alloca);
            }
        }

        self.gen_stmt(body);
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_return(None).expect("return");
        }

        self.locals = saved_locals;
        self.current_function = saved_function;
        self.current_self = saved_self;
        if let Some(block) = caller_block {
            self.builder.position_at_end(block);
        }
        function.as_global_value().as_pointer_value().into()
    }

    /// Invokes a computed property's getter with `base` as its implicit
    /// `self` argument — the read-side counterpart of
    /// [`Self::gen_setter_call`].
    fn gen_getter_call(&mut self, access: ExprId, base: ExprId) -> BasicValueEnum<'ctx> {
        let getter = *self.typeck.property_getter.get(&access).expect("checked by the caller's match guard");
        let self_value = self.gen_expr(base);
        let function = *self.functions.get(&getter).unwrap_or_else(|| panic!("getter {getter:?} was never declared"));
        let call_site = self.builder.build_call(function, &[self_value.into()], "getter_call").expect("call");
        call_site.try_as_basic_value().left().unwrap_or_else(|| {
            let ty = self.expr_type(access);
            self.types.llvm_type(&ty).const_zero()
        })
    }

    /// Invokes a computed property's setter with `base` as its implicit
    /// `self` argument and `value` as the new value, in place of a store
    /// to a stored field.
    fn gen_setter_call(&mut self, access: ExprId, base: ExprId, value: BasicValueEnum<'ctx>) {
        let setter = *self.typeck.property_setter.get(&access).expect("checked by the caller");
        let self_value = self.gen_expr(base);
        let function = *self.functions.get(&setter).unwrap_or_else(|| panic!("setter {setter:?} was never declared"));
        self.builder.build_call(function, &[self_value.into(), value.into()], "setter_call").expect("call");
    }

    fn gen_call(&mut self, id: ExprId, callee: ExprId, args: &[CallArg]) -> BasicValueEnum<'ctx> {
        let Some(&callee_decl) = self.typeck.call_callee.get(&id) else {
            // An unresolved call is a Sema/typeck diagnostic already
            // reported; codegen still needs *some* value for the
            // surrounding expression.
            let ty = self.expr_type(id);
            return self.types.llvm_type(&ty).const_zero();
        };

        let is_member = matches!(
            self.ast.decl(callee_decl).kind,
            DeclKind::Function(_) | DeclKind::Initializer(_) | DeclKind::Deinitializer(_) | DeclKind::Accessor(_)
        ) && self.owner_of(callee_decl).is_some();

        let mut arg_values: Vec<BasicMetadataValueEnum> = Vec::new();

        if matches!(self.ast.decl(callee_decl).kind, DeclKind::Initializer(_)) {
            // Calling an initializer allocates a fresh box (or a plain
            // alloca for a value type) and passes it as the implicit
            // `self` argument; the initializer's own return is `Void`.
            let owner = self.owner_of(callee_decl).expect("initializer belongs to a type");
            let self_ptr = self.construct_instance(owner);
            arg_values.push(self.load_for_arg(self_ptr, owner).into());
            for arg in args {
                arg_values.push(self.gen_expr(arg.value).into());
            }
            let function = *self.functions.get(&callee_decl).expect("initializer declared");
            self.builder.build_call(function, &arg_values, "init_call").expect("call");
            return self_ptr.into();
        }

        if is_member && !self.ast.decl(callee_decl).attributes.contains(trill_syntax::ast::Attributes::STATIC) {
            match self.ast.expr(callee).kind.clone() {
                // `base.method(args...)`: the callee expression's base
                // carries the receiver.
                ExprKind::PropertyRef { base, .. } | ExprKind::FieldLookup { base, .. } => {
                    arg_values.push(self.gen_expr(base).into());
                }
                // A bare name resolving to a member of the enclosing type:
                // an implicit-`self` call, using the body's own `self`.
                _ => {
                    let owner = self.owner_of(callee_decl).expect("instance member call resolves to a type member");
                    let self_slot = self.current_self.expect("instance member call outside a method body");
                    let self_ty = Type::Named(owner);
                    let value =
                        self.builder.build_load(self.types.llvm_type(&self_ty), self_slot, "self_arg").expect("load");
                    arg_values.push(value.into());
                }
            }
        }

        for arg in args {
            let value = self.gen_expr(arg.value);
            let arg_ty = self.typeck.expr_types.get(&arg.value).cloned().unwrap_or(Type::Error);
            self.retain_if_borrowed(arg.value, &arg_ty, value);
            arg_values.push(value.into());
        }

        let function = *self.functions.get(&callee_decl).unwrap_or_else(|| panic!("callee {callee_decl:?} was never declared"));
        let call_site = self.builder.build_call(function, &arg_values, "call").expect("call");
        match call_site.try_as_basic_value().left() {
            Some(v) => v,
            None => self.llvm_ctx.struct_type(&[], false).const_zero().into(),
        }
    }

    fn owner_of(&self, decl: trill_syntax::ast::DeclId) -> Option<trill_syntax::ast::DeclId> {
        self.sema.type_members.iter().find(|(_, members)| members.contains(&decl)).map(|(owner, _)| *owner)
    }

    /// Allocates storage for a fresh instance of `owner`: a heap box via
    /// `trill_allocateIndirectType` for `indirect type`s, a plain stack
    /// `alloca` otherwise (§4.6.4, §4.8).
    fn construct_instance(&mut self, owner: trill_syntax::ast::DeclId) -> PointerValue<'ctx> {
        let struct_ty = self.types.named_struct(owner).expect("named type registered");
        if self.types.is_indirect(owner) {
            let layout = &self.sema.layouts[&owner];
            let payload_bytes = layout.size_bytes as u64;
            let size = self.llvm_ctx.i64_type().const_int(payload_bytes, false);
            let deinit_ptr = self.llvm_ctx.i8_type().ptr_type(AddressSpace::default()).const_null();
            let call = self
                .builder
                .build_call(self.runtime.allocate_indirect, &[size.into(), deinit_ptr.into()], "alloc_instance")
                .expect("call");
            let raw = call.try_as_basic_value().left().expect("allocateIndirectType returns a value").into_pointer_value();
            self.builder
                .build_pointer_cast(raw, struct_ty.ptr_type(AddressSpace::default()), "instance_ptr")
                .expect("pointer cast")
        } else {
            self.builder.build_alloca(struct_ty, "instance").expect("alloca")
        }
    }

    fn load_for_arg(&mut self, ptr: PointerValue<'ctx>, owner: trill_syntax::ast::DeclId) -> BasicValueEnum<'ctx> {
        // `self` is always passed as `Type::Named(owner)`, which the type
        // table maps to a pointer for `indirect` types and a by-value
        // struct load otherwise.
        if self.types.is_indirect(owner) {
            ptr.into()
        } else {
            let struct_ty = self.types.named_struct(owner).expect("named type registered");
            self.builder.build_load(struct_ty, ptr, "instance_value").expect("load")
        }
    }

    fn gen_infix(&mut self, id: ExprId, op: InfixOp, lhs: ExprId, rhs: ExprId) -> BasicValueEnum<'ctx> {
        if is_assignment_op(op) {
            return self.gen_assignment(id, op, lhs, rhs);
        }
        if matches!(op, InfixOp::And | InfixOp::Or) {
            return self.gen_short_circuit(op, lhs, rhs);
        }

        let lhs_ty = self.expr_type(lhs);
        let l = self.gen_expr(lhs);
        let r = self.gen_expr(rhs);

        if matches!(lhs_ty, Type::Float | Type::Double) {
            self.gen_float_infix(op, l.into_float_value(), r.into_float_value())
        } else {
            self.gen_int_infix(op, l.into_int_value(), r.into_int_value(), lhs_ty.is_integer() && matches!(lhs_ty, Type::Int { signed: true, .. }))
        }
    }

    fn gen_short_circuit(&mut self, op: InfixOp, lhs: ExprId, rhs: ExprId) -> BasicValueEnum<'ctx> {
        let function = self.current_function.expect("inside a function body");
        let rhs_block = self.llvm_ctx.append_basic_block(function, "sc.rhs");
        let merge_block = self.llvm_ctx.append_basic_block(function, "sc.merge");

        let lhs_value = self.gen_expr(lhs).into_int_value();
        let start_block = self.builder.get_insert_block().expect("inside a block");
        match op {
            InfixOp::And => self.builder.build_conditional_branch(lhs_value, rhs_block, merge_block),
            _ => self.builder.build_conditional_branch(lhs_value, merge_block, rhs_block),
        }
        .expect("branch");

        self.builder.position_at_end(rhs_block);
        let rhs_value = self.gen_expr(rhs).into_int_value();
        let rhs_end_block = self.builder.get_insert_block().expect("inside a block");
        self.builder.build_unconditional_branch(merge_block).expect("branch");

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(self.llvm_ctx.bool_type(), "sc.result").expect("phi");
        phi.add_incoming(&[(&lhs_value, start_block), (&rhs_value, rhs_end_block)]);
        phi.as_basic_value()
    }

    fn gen_int_infix(&mut self, op: InfixOp, l: IntValue<'ctx>, r: IntValue<'ctx>, signed: bool) -> BasicValueEnum<'ctx> {
        let b = &self.builder;
        match op {
            InfixOp::Add => b.build_int_add(l, r, "add").expect("add").into(),
            InfixOp::Sub => b.build_int_sub(l, r, "sub").expect("sub").into(),
            InfixOp::Mul => b.build_int_mul(l, r, "mul").expect("mul").into(),
            InfixOp::Div if signed => b.build_int_signed_div(l, r, "sdiv").expect("sdiv").into(),
            InfixOp::Div => b.build_int_unsigned_div(l, r, "udiv").expect("udiv").into(),
            InfixOp::Mod if signed => b.build_int_signed_rem(l, r, "srem").expect("srem").into(),
            InfixOp::Mod => b.build_int_unsigned_rem(l, r, "urem").expect("urem").into(),
            InfixOp::BitAnd => b.build_and(l, r, "and").expect("and").into(),
            InfixOp::BitOr => b.build_or(l, r, "or").expect("or").into(),
            InfixOp::BitXor => b.build_xor(l, r, "xor").expect("xor").into(),
            InfixOp::Shl => b.build_left_shift(l, r, "shl").expect("shl").into(),
            InfixOp::Shr => b.build_right_shift(l, r, signed, "shr").expect("shr").into(),
            InfixOp::Eq => b.build_int_compare(IntPredicate::EQ, l, r, "eq").expect("cmp").into(),
            InfixOp::Ne => b.build_int_compare(IntPredicate::NE, l, r, "ne").expect("cmp").into(),
            InfixOp::Lt => b.build_int_compare(if signed { IntPredicate::SLT } else { IntPredicate::ULT }, l, r, "lt").expect("cmp").into(),
            InfixOp::Gt => b.build_int_compare(if signed { IntPredicate::SGT } else { IntPredicate::UGT }, l, r, "gt").expect("cmp").into(),
            InfixOp::Le => b.build_int_compare(if signed { IntPredicate::SLE } else { IntPredicate::ULE }, l, r, "le").expect("cmp").into(),
            InfixOp::Ge => b.build_int_compare(if signed { IntPredicate::SGE } else { IntPredicate::UGE }, l, r, "ge").expect("cmp").into(),
            InfixOp::And | InfixOp::Or => unreachable!("handled by gen_short_circuit"),
            _ => unreachable!("assignment operators handled by gen_assignment"),
        }
    }

    fn gen_float_infix(&mut self, op: InfixOp, l: FloatValue<'ctx>, r: FloatValue<'ctx>) -> BasicValueEnum<'ctx> {
        let b = &self.builder;
        match op {
            InfixOp::Add => b.build_float_add(l, r, "fadd").expect("fadd").into(),
            InfixOp::Sub => b.build_float_sub(l, r, "fsub").expect("fsub").into(),
            InfixOp::Mul => b.build_float_mul(l, r, "fmul").expect("fmul").into(),
            InfixOp::Div => b.build_float_div(l, r, "fdiv").expect("fdiv").into(),
            InfixOp::Mod => b.build_float_rem(l, r, "frem").expect("frem").into(),
            InfixOp::Eq => b.build_float_compare(FloatPredicate::OEQ, l, r, "feq").expect("cmp").into(),
            InfixOp::Ne => b.build_float_compare(FloatPredicate::ONE, l, r, "fne").expect("cmp").into(),
            InfixOp::Lt => b.build_float_compare(FloatPredicate::OLT, l, r, "flt").expect("cmp").into(),
            InfixOp::Gt => b.build_float_compare(FloatPredicate::OGT, l, r, "fgt").expect("cmp").into(),
            InfixOp::Le => b.build_float_compare(FloatPredicate::OLE, l, r, "fle").expect("cmp").into(),
            InfixOp::Ge => b.build_float_compare(FloatPredicate::OGE, l, r, "fge").expect("cmp").into(),
            other => unreachable!("non-numeric operator {other:?} on floats"),
        }
    }

    fn gen_assignment(&mut self, id: ExprId, op: InfixOp, lhs: ExprId, rhs: ExprId) -> BasicValueEnum<'ctx> {
        let lhs_ty = self.expr_type(lhs);

        if let ExprKind::PropertyRef { base, .. } | ExprKind::FieldLookup { base, .. } = self.ast.expr(lhs).kind.clone() {
            if self.typeck.property_setter.contains_key(&lhs) {
                let new_value = if op == InfixOp::Assign {
                    self.gen_expr(rhs)
                } else {
                    let current = self.gen_getter_call(lhs, base);
                    let rhs_value = self.gen_expr(rhs);
                    self.apply_compound_op(op, &lhs_ty, current, rhs_value)
                };
                self.gen_setter_call(lhs, base, new_value);
                let _ = id;
                return new_value;
            }
        }

        let target = self.gen_lvalue(lhs);

        let new_value = if op == InfixOp::Assign {
            self.gen_expr(rhs)
        } else {
            let current = self.builder.build_load(self.types.llvm_type(&lhs_ty), target, "current").expect("load");
            let rhs_value = self.gen_expr(rhs);
            self.apply_compound_op(op, &lhs_ty, current, rhs_value)
        };

        if self.is_indirect_named(&lhs_ty) {
            let old = self.builder.build_load(self.types.llvm_type(&lhs_ty), target, "old_ref").expect("load");
            self.retain_if_borrowed(rhs, &lhs_ty, new_value);
            self.emit_release(old);
        }

        self.builder.build_store(target, new_value).expect("store");
        let _ = id;
        new_value
    }

    fn apply_compound_op(&mut self, op: InfixOp, ty: &Type, current: BasicValueEnum<'ctx>, rhs: BasicValueEnum<'ctx>) -> BasicValueEnum<'ctx> {
        let arith_op = compound_to_arith(op);
        if matches!(ty, Type::Float | Type::Double) {
            self.gen_float_infix(arith_op, current.into_float_value(), rhs.into_float_value())
        } else {
            let signed = matches!(ty, Type::Int { signed: true, .. });
            self.gen_int_infix(arith_op, current.into_int_value(), rhs.into_int_value(), signed)
        }
    }

    fn gen_prefix(&mut self, op: PrefixOp, operand: ExprId) -> BasicValueEnum<'ctx> {
        match op {
            PrefixOp::Neg => {
                let ty = self.expr_type(operand);
                let v = self.gen_expr(operand);
                if matches!(ty, Type::Float | Type::Double) {
                    self.builder.build_float_neg(v.into_float_value(), "fneg").expect("fneg").into()
                } else {
                    self.builder.build_int_neg(v.into_int_value(), "neg").expect("neg").into()
                }
            }
            PrefixOp::Not => {
                let v = self.gen_expr(operand).into_int_value();
                self.builder.build_not(v, "not").expect("not").into()
            }
            PrefixOp::BitNot => {
                let v = self.gen_expr(operand).into_int_value();
                self.builder.build_not(v, "bitnot").expect("bitnot").into()
            }
            PrefixOp::AddressOf => self.gen_lvalue(operand).into(),
            PrefixOp::Deref => {
                let ptr = self.gen_expr(operand).into_pointer_value();
                let ty = self.typeck.expr_types.get(&operand).cloned().unwrap_or(Type::Error);
                let pointee = match ty {
                    Type::Pointer(inner) => self.types.llvm_type(&inner),
                    other => self.types.llvm_type(&other),
                };
                self.builder.build_load(pointee, ptr, "deref").expect("load")
            }
        }
    }

    fn gen_ternary(&mut self, id: ExprId, cond: ExprId, then_branch: ExprId, else_branch: ExprId) -> BasicValueEnum<'ctx> {
        let function = self.current_function.expect("inside a function body");
        let then_block = self.llvm_ctx.append_basic_block(function, "ternary.then");
        let else_block = self.llvm_ctx.append_basic_block(function, "ternary.else");
        let merge_block = self.llvm_ctx.append_basic_block(function, "ternary.merge");

        let cond_value = self.gen_expr(cond).into_int_value();
        self.builder.build_conditional_branch(cond_value, then_block, else_block).expect("branch");

        self.builder.position_at_end(then_block);
        let then_value = self.gen_expr(then_branch);
        let then_end = self.builder.get_insert_block().expect("block");
        self.builder.build_unconditional_branch(merge_block).expect("branch");

        self.builder.position_at_end(else_block);
        let else_value = self.gen_expr(else_branch);
        let else_end = self.builder.get_insert_block().expect("block");
        self.builder.build_unconditional_branch(merge_block).expect("branch");

        self.builder.position_at_end(merge_block);
        let ty = self.expr_type(id);
        let phi = self.builder.build_phi(self.types.llvm_type(&ty), "ternary.result").expect("phi");
        phi.add_incoming(&[(&then_value, then_end), (&else_value, else_end)]);
        phi.as_basic_value()
    }

    fn gen_numeric_cast(&mut self, id: ExprId, operand: ExprId) -> BasicValueEnum<'ctx> {
        let from = self.expr_type(operand);
        let to = self.expr_type(id);
        let value = self.gen_expr(operand);
        let target_ty = self.types.llvm_type(&to);

        match (&from, &to) {
            (Type::Int { .. }, Type::Int { .. }) => {
                self.builder.build_int_cast(value.into_int_value(), target_ty.into_int_type(), "intcast").expect("cast").into()
            }
            (Type::Int { signed: true, .. }, Type::Float | Type::Double) => self
                .builder
                .build_signed_int_to_float(value.into_int_value(), target_ty.into_float_type(), "sitofp")
                .expect("cast")
                .into(),
            (Type::Int { signed: false, .. }, Type::Float | Type::Double) => self
                .builder
                .build_unsigned_int_to_float(value.into_int_value(), target_ty.into_float_type(), "uitofp")
                .expect("cast")
                .into(),
            (Type::Float | Type::Double, Type::Int { signed: true, .. }) => self
                .builder
                .build_float_to_signed_int(value.into_float_value(), target_ty.into_int_type(), "fptosi")
                .expect("cast")
                .into(),
            (Type::Float | Type::Double, Type::Int { signed: false, .. }) => self
                .builder
                .build_float_to_unsigned_int(value.into_float_value(), target_ty.into_int_type(), "fptoui")
                .expect("cast")
                .into(),
            (Type::Float, Type::Double) => {
                self.builder.build_float_ext(value.into_float_value(), target_ty.into_float_type(), "fpext").expect("cast").into()
            }
            (Type::Double, Type::Float) => {
                self.builder.build_float_trunc(value.into_float_value(), target_ty.into_float_type(), "fptrunc").expect("cast").into()
            }
            (Type::Pointer(_), Type::Pointer(_)) => self
                .builder
                .build_pointer_cast(value.into_pointer_value(), target_ty.into_pointer_type(), "ptrcast")
                .expect("cast")
                .into(),
            _ => value,
        }
    }

    fn gen_type_check(&mut self, operand: ExprId, target: trill_syntax::ast::TypeExprId) -> BasicValueEnum<'ctx> {
        let any_value = self.gen_expr(operand);
        self.type_check_value(any_value, target).0
    }

    /// `x is T`: compares an already-boxed `Any` value's type-metadata
    /// pointer against `T`'s metadata global, covering primitive targets
    /// as well as named ones (§8 scenario 4: `a as Int` must succeed for
    /// an `Any` boxing an `Int`, not just for boxed `type` values). Split
    /// out from [`Self::gen_type_check`] so a checked cast can run the
    /// test and the extraction against the same evaluation of its operand
    /// rather than re-running a (potentially side-effecting) expression
    /// twice; also hands back the actual value's metadata pointer so a
    /// failed cast can report what it actually found.
    fn type_check_value(
        &mut self,
        any_value: BasicValueEnum<'ctx>,
        target: trill_syntax::ast::TypeExprId,
    ) -> (BasicValueEnum<'ctx>, PointerValue<'ctx>) {
        let any_alloca = self.builder.build_alloca(self.types.abi().any_box, "is_check").expect("alloca");
        self.builder.build_store(any_alloca, any_value).expect("store");
        let metadata_ptr_field = self.builder.build_struct_gep(self.types.abi().any_box, any_alloca, 1, "metadata_ptr").expect("gep");
        let actual_metadata = self
            .builder
            .build_load(self.types.abi().type_metadata.ptr_type(AddressSpace::default()), metadata_ptr_field, "actual")
            .expect("load")
            .into_pointer_value();

        let target_ty = self.sema.type_of_type_expr.get(&target).cloned().unwrap_or(Type::Error);
        let expected = self.metadata_ptr_for(&target_ty);
        let matches = self
            .builder
            .build_int_compare(IntPredicate::EQ, actual_metadata, expected, "is_match")
            .expect("cmp")
            .into();
        (matches, actual_metadata)
    }

    /// Boxes `inner`'s value into a fresh `AnyBox` via
    /// `trill_any_updateField` (§4.7, §4.8): the implicit coercion the
    /// type checker inserts whenever a concrete value flows into an `Any`
    /// slot.
    fn gen_bitcast_to_any(&mut self, inner: ExprId) -> BasicValueEnum<'ctx> {
        let inner_ty = self.expr_type(inner);
        let inner_value = self.gen_expr(inner);

        let storage = self.builder.build_alloca(self.types.llvm_type(&inner_ty), "boxed_value").expect("alloca");
        self.builder.build_store(storage, inner_value).expect("store");
        let storage_i8p = self.as_i8p(storage);

        let size = self
            .types
            .llvm_type(&inner_ty)
            .size_of()
            .unwrap_or_else(|| self.llvm_ctx.i64_type().const_int(0, false));

        let metadata_ptr = self.metadata_ptr_for(&inner_ty);

        let any_alloca = self.builder.build_alloca(self.types.abi().any_box, "any").expect("alloca");
        self.builder
            .build_call(self.runtime.any_update_field, &[any_alloca.into(), storage_i8p.into(), size.into(), metadata_ptr.into()], "update_any")
            .expect("call");
        self.builder.build_load(self.types.abi().any_box, any_alloca, "any_value").expect("load")
    }

    /// Narrows an `Any` value back to a concrete type via
    /// `trill_any_extractField`, then traps through `trill_fatalError` if
    /// the boxed type doesn't match (§4.7, §4.8 — "traps at runtime on
    /// mismatch").
    fn gen_checked_cast(&mut self, id: ExprId, operand: ExprId, target: trill_syntax::ast::TypeExprId) -> BasicValueEnum<'ctx> {
        let any_value = self.gen_expr(operand);
        let (match_value, actual_metadata) = self.type_check_value(any_value, target);

        let function = self.current_function.expect("inside a function body");
        let ok_block = self.llvm_ctx.append_basic_block(function, "cast.ok");
        let fail_block = self.llvm_ctx.append_basic_block(function, "cast.fail");
        self.builder.build_conditional_branch(match_value.into_int_value(), ok_block, fail_block).expect("branch");

        // §8 scenario 4: "checked cast failed: cannot convert Int to
        // Bool" — the actual type's name is read back from the boxed
        // value's own metadata (known only at runtime); the target's name
        // is a compile-time constant since the cast's target type is
        // fixed in the source.
        self.builder.position_at_end(fail_block);
        let actual_name_field =
            self.builder.build_struct_gep(self.types.abi().type_metadata, actual_metadata, 0, "actual_name_field").expect("gep");
        let actual_name = self
            .builder
            .build_load(self.llvm_ctx.i8_type().ptr_type(AddressSpace::default()), actual_name_field, "actual_name")
            .expect("load");
        let target_name_str = self.expr_type(id).display(&|decl| crate::mangle::type_decl_name(self.sema, self.interner, decl));
        let target_name = self.builder.build_global_string_ptr(&target_name_str, "target_name").expect("global string");
        self.builder
            .build_call(self.runtime.cast_failed, &[actual_name.into(), target_name.as_pointer_value().into()], "fatal")
            .expect("call");
        self.builder.build_unreachable().expect("unreachable");

        self.builder.position_at_end(ok_block);
        let any_alloca = self.builder.build_alloca(self.types.abi().any_box, "checked").expect("alloca");
        self.builder.build_store(any_alloca, any_value).expect("store");
        let any_i8p = self.as_i8p(any_alloca);

        let target_ty = self.expr_type(id);
        let out_ty = self.types.llvm_type(&target_ty);
        let out_alloca = self.builder.build_alloca(out_ty, "extracted").expect("alloca");
        let out_i8p = self.as_i8p(out_alloca);
        let size = out_ty.size_of().unwrap_or_else(|| self.llvm_ctx.i64_type().const_int(0, false));
        self.builder.build_call(self.runtime.any_extract_field, &[any_i8p.into(), out_i8p.into(), size.into()], "extract").expect("call");
        self.builder.build_load(out_ty, out_alloca, "extracted_value").expect("load")
    }
}

fn is_assignment_op(op: InfixOp) -> bool {
    matches!(
        op,
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
            | InfixOp::ShrAssign
    )
}

fn compound_to_arith(op: InfixOp) -> InfixOp {
    match op {
        InfixOp::AddAssign => InfixOp::Add,
        InfixOp::SubAssign => InfixOp::Sub,
        InfixOp::MulAssign => InfixOp::Mul,
        InfixOp::DivAssign => InfixOp::Div,
        InfixOp::ModAssign => InfixOp::Mod,
        InfixOp::AndAssign => InfixOp::BitAnd,
        InfixOp::OrAssign => InfixOp::BitOr,
        InfixOp::XorAssign => InfixOp::BitXor,
        InfixOp::ShlAssign => InfixOp::Shl,
        InfixOp::ShrAssign => InfixOp::Shr,
        other => other,
    }
}
