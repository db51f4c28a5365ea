//! LLVM IR generation (§4.8): walks a type-checked [`trill_syntax::ast::Module`]
//! and emits one `inkwell::module::Module`. Declares every function (free,
//! method, initializer, deinitializer, accessor) before emitting any body,
//! so forward references and mutual recursion resolve without a second
//! pass over the AST.

mod expr;
mod stmt;
pub mod types;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::BasicType;
use inkwell::values::{FunctionValue, GlobalValue, PointerValue};
use inkwell::{AddressSpace, AttributeLoc};
use rustc_hash::FxHashMap;
use trill_base::Interner;
use trill_sema::{SemaOutput, Type};
use trill_syntax::ast::{
    AstContext, Attributes, DeclId, DeclKind, ExprId, ExprKind, Module as AstModule, StmtId, StmtKind,
};
use trill_typeck::TypeckOutput;

use crate::InternalError;
use types::TypeTable;

/// Declarations for the `trill_runtime` ABI entry points every generated
/// module links against (§4.8, §6). Built once, referenced by every
/// function body that needs to allocate, retain/release, or box an `Any`.
struct RuntimeFns<'ctx> {
    alloc: FunctionValue<'ctx>,
    allocate_indirect: FunctionValue<'ctx>,
    retain: FunctionValue<'ctx>,
    release: FunctionValue<'ctx>,
    is_uniquely_referenced: FunctionValue<'ctx>,
    any_update_field: FunctionValue<'ctx>,
    any_extract_field: FunctionValue<'ctx>,
    fatal_error: FunctionValue<'ctx>,
    cast_failed: FunctionValue<'ctx>,
}

/// Output of a successful codegen pass: the LLVM module, ready for
/// verification, optimization, and emission, plus the mangled link name
/// chosen for every declaration the driver might want to report (e.g. for
/// `--emit-pass-timings`, or JIT symbol lookup).
pub struct CodegenOutput<'ctx> {
    pub module: Module<'ctx>,
    pub mangled_names: FxHashMap<DeclId, String>,
}

pub(super) struct Codegen<'a, 'ctx> {
    llvm_ctx: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    types: TypeTable<'ctx>,
    runtime: RuntimeFns<'ctx>,
    ast: &'a AstContext,
    interner: &'a Interner,
    sema: &'a SemaOutput,
    typeck: &'a TypeckOutput,
    functions: FxHashMap<DeclId, FunctionValue<'ctx>>,
    locals: FxHashMap<DeclId, PointerValue<'ctx>>,
    mangled_names: FxHashMap<DeclId, String>,
    type_metadata_globals: FxHashMap<DeclId, GlobalValue<'ctx>>,
    /// Metadata for types with no `DeclId` of their own (`Int`, `Bool`, ...),
    /// built lazily and keyed by the same name `type_check_value`/
    /// `gen_bitcast_to_any` compare against, so every `Any` box — not just
    /// ones boxing a user-declared `type` — carries a real type identity.
    primitive_metadata_globals: FxHashMap<String, GlobalValue<'ctx>>,
    current_function: Option<FunctionValue<'ctx>>,
    /// The `self` local of the method body currently being emitted, if
    /// any — consulted by a call whose callee is a bare name rather than
    /// `base.method(...)` (an implicit-`self` member call).
    current_self: Option<PointerValue<'ctx>>,
    /// `(continue target, break target)` for the innermost enclosing loop.
    loop_stack: Vec<(inkwell::basic_block::BasicBlock<'ctx>, inkwell::basic_block::BasicBlock<'ctx>)>,
}

fn declare_runtime_fns<'ctx>(ctx: &'ctx Context, module: &Module<'ctx>, types: &TypeTable<'ctx>) -> RuntimeFns<'ctx> {
    let i8p = ctx.i8_type().ptr_type(AddressSpace::default());
    let i64_t = ctx.i64_type();
    let void_t = ctx.void_type();

    let alloc = module.add_function("trill_alloc", i8p.fn_type(&[i64_t.into()], false), Some(Linkage::External));

    let deinit_ptr = void_t.fn_type(&[i8p.into()], false).ptr_type(AddressSpace::default());
    let allocate_indirect = module.add_function(
        "trill_allocateIndirectType",
        i8p.fn_type(&[i64_t.into(), deinit_ptr.into()], false),
        Some(Linkage::External),
    );

    let retain = module.add_function("trill_retain", void_t.fn_type(&[i8p.into()], false), Some(Linkage::External));
    let release = module.add_function("trill_release", void_t.fn_type(&[i8p.into()], false), Some(Linkage::External));
    let is_uniquely_referenced = module.add_function(
        "trill_isUniquelyReferenced",
        ctx.i8_type().fn_type(&[i8p.into()], false),
        Some(Linkage::External),
    );

    let any_box_ptr = types.abi().any_box.ptr_type(AddressSpace::default());
    let type_metadata_ptr = types.abi().type_metadata.ptr_type(AddressSpace::default());
    let any_update_field = module.add_function(
        "trill_any_updateField",
        void_t.fn_type(&[any_box_ptr.into(), i8p.into(), i64_t.into(), type_metadata_ptr.into()], false),
        Some(Linkage::External),
    );
    let any_extract_field = module.add_function(
        "trill_any_extractField",
        void_t.fn_type(&[any_box_ptr.into(), i8p.into(), i64_t.into()], false),
        Some(Linkage::External),
    );

    let fatal_error =
        module.add_function("trill_fatalError", void_t.fn_type(&[i8p.into()], false), Some(Linkage::External));
    let cast_failed =
        module.add_function("trill_castFailed", void_t.fn_type(&[i8p.into(), i8p.into()], false), Some(Linkage::External));
    let noreturn_kind = inkwell::attributes::Attribute::get_named_enum_kind_id("noreturn");
    fatal_error.add_attribute(AttributeLoc::Function, ctx.create_enum_attribute(noreturn_kind, 0));
    cast_failed.add_attribute(AttributeLoc::Function, ctx.create_enum_attribute(noreturn_kind, 0));

    RuntimeFns {
        alloc,
        allocate_indirect,
        retain,
        release,
        is_uniquely_referenced,
        any_update_field,
        any_extract_field,
        fatal_error,
        cast_failed,
    }
}

/// Generates LLVM IR for `module` (whose declarations have already been
/// through `trill_sema::analyze` and `trill_typeck::check`).
pub fn generate<'ctx>(
    llvm_ctx: &'ctx Context,
    module_name: &str,
    ast: &AstContext,
    interner: &Interner,
    sema: &SemaOutput,
    typeck: &TypeckOutput,
    module: &AstModule,
) -> Result<CodegenOutput<'ctx>, InternalError> {
    let llvm_module = llvm_ctx.create_module(module_name);
    let builder = llvm_ctx.create_builder();

    let mut types = TypeTable::new(llvm_ctx);
    types.register_named_types(sema);
    let runtime = declare_runtime_fns(llvm_ctx, &llvm_module, &types);

    let mut cg = Codegen {
        llvm_ctx,
        module: llvm_module,
        builder,
        types,
        runtime,
        ast,
        interner,
        sema,
        typeck,
        functions: FxHashMap::default(),
        locals: FxHashMap::default(),
        mangled_names: FxHashMap::default(),
        type_metadata_globals: FxHashMap::default(),
        primitive_metadata_globals: FxHashMap::default(),
        current_function: None,
        current_self: None,
        loop_stack: Vec::new(),
    };

    cg.declare_all(module);
    cg.build_type_metadata();
    cg.emit_all(module);

    cg.module.verify().map_err(|e| InternalError::VerificationFailed(e.to_string()))?;

    Ok(CodegenOutput { module: cg.module, mangled_names: cg.mangled_names })
}

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    fn function_type(&self, params: &[Type], variadic: bool, ret: &Type) -> inkwell::types::FunctionType<'ctx> {
        let param_types: Vec<inkwell::types::BasicMetadataTypeEnum> =
            params.iter().map(|t| self.types.llvm_type(t).into()).collect();
        match ret {
            Type::Void => self.llvm_ctx.void_type().fn_type(&param_types, variadic),
            other => self.types.llvm_type(other).fn_type(&param_types, variadic),
        }
    }

    fn declare_all(&mut self, module: &AstModule) {
        for &id in &module.decls {
            match self.ast.decl(id).kind.clone() {
                DeclKind::Function(f) => {
                    // A `FOREIGN` declaration (from `trill_importer`, §4.5)
                    // names an existing C symbol; mangling it would produce
                    // a link name nothing in the C library actually exports.
                    let link_name = if self.ast.decl(id).attributes.contains(Attributes::FOREIGN) {
                        self.interner.resolve(f.name).to_string()
                    } else {
                        let symbol = crate::mangle::free_function_symbol(self.ast, self.interner, self.sema, id);
                        crate::mangle::mangled_name(&symbol)
                    };
                    let params: Vec<Type> =
                        f.params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
                    let ret = f.ret.and_then(|t| self.sema.type_of_type_expr.get(&t).cloned()).unwrap_or(Type::Void);
                    let fn_type = self.function_type(&params, f.variadic, &ret);
                    let function = self.module.add_function(&link_name, fn_type, Some(Linkage::External));
                    self.functions.insert(id, function);
                    self.mangled_names.insert(id, link_name);
                }
                DeclKind::Type(_) => {
                    for member in self.sema.type_members.get(&id).cloned().unwrap_or_default() {
                        self.declare_member(id, member);
                    }
                }
                _ => {}
            }
        }
    }

    fn declare_member(&mut self, owner: DeclId, member: DeclId) {
        let is_static = self.ast.decl(member).attributes.contains(Attributes::STATIC);
        let self_param = if is_static { None } else { Some(Type::Named(owner)) };

        let (params, ret, body): (Vec<Type>, Type, Option<StmtId>) = match self.ast.decl(member).kind.clone() {
            DeclKind::Function(f) => {
                let p = f.params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
                let r = f.ret.and_then(|t| self.sema.type_of_type_expr.get(&t).cloned()).unwrap_or(Type::Void);
                (p, r, f.body)
            }
            DeclKind::Initializer(i) => {
                let p = i.params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
                (p, Type::Void, Some(i.body))
            }
            DeclKind::Deinitializer(d) => (Vec::new(), Type::Void, Some(d.body)),
            DeclKind::Accessor(a) => {
                let p = a.params.iter().map(|p| self.sema.type_of_type_expr.get(&p.ty).cloned().unwrap_or(Type::Error)).collect();
                let ret = match self.typeck.decl_types.get(&member).or_else(|| self.sema.decl_type.get(&member)) {
                    Some(Type::Function { ret, .. }) => (**ret).clone(),
                    _ => Type::Void,
                };
                (p, ret, Some(a.body))
            }
            _ => return,
        };

        let symbol = crate::mangle::member_symbol(self.ast, self.interner, self.sema, owner, member, is_static);
        let link_name = crate::mangle::mangled_name(&symbol);

        let mut full_params = params;
        if let Some(self_ty) = self_param {
            full_params.insert(0, self_ty);
        }
        let fn_type = self.function_type(&full_params, false, &ret);
        let function = self.module.add_function(&link_name, fn_type, Some(Linkage::External));
        self.functions.insert(member, function);
        self.mangled_names.insert(member, link_name);
        let _ = body;
    }

    fn emit_all(&mut self, module: &AstModule) {
        for &id in &module.decls {
            match self.ast.decl(id).kind.clone() {
                DeclKind::Function(f) => {
                    if let Some(body) = f.body {
                        self.emit_function_body(id, &f.params, false, None, body);
                    }
                }
                DeclKind::Type(_) => {
                    for member in self.sema.type_members.get(&id).cloned().unwrap_or_default() {
                        self.emit_member(id, member);
                    }
                }
                _ => {}
            }
        }
    }

    fn emit_member(&mut self, owner: DeclId, member: DeclId) {
        let expects_self = !self.ast.decl(member).attributes.contains(Attributes::STATIC);
        match self.ast.decl(member).kind.clone() {
            DeclKind::Function(f) => {
                if let Some(body) = f.body {
                    let self_decl = expects_self.then(|| find_self_decl(self.ast, self.interner, body)).flatten();
                    self.emit_function_body(member, &f.params, expects_self, self_decl, body);
                }
            }
            DeclKind::Initializer(i) => {
                let self_decl = find_self_decl(self.ast, self.interner, i.body);
                self.emit_function_body(member, &i.params, true, self_decl, i.body);
            }
            DeclKind::Deinitializer(d) => {
                let self_decl = find_self_decl(self.ast, self.interner, d.body);
                self.emit_function_body(member, &[], true, self_decl, d.body);
            }
            DeclKind::Accessor(a) => {
                let self_decl = expects_self.then(|| find_self_decl(self.ast, self.interner, a.body)).flatten();
                self.emit_function_body(member, &a.params, expects_self, self_decl, a.body);
            }
            _ => {
                let _ = owner;
            }
        }
    }

    fn emit_function_body(
        &mut self,
        decl: DeclId,
        explicit_params: &[trill_syntax::ast::Param],
        expects_self: bool,
        self_decl: Option<DeclId>,
        body: StmtId,
    ) {
        let function = *self.functions.get(&decl).expect("every defined declaration was declared first");
        self.current_function = Some(function);
        self.current_self = None;
        self.locals.clear();

        let entry = self.llvm_ctx.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        let mut llvm_param_index = 0u32;
        if expects_self {
            let llvm_param = function.get_nth_param(llvm_param_index).expect("self parameter present");
            llvm_param_index += 1;
            let alloca = self.builder.build_alloca(llvm_param.get_type(), "self").expect("alloca");
            self.builder.build_store(alloca, llvm_param).expect("store");
            self.current_self = Some(alloca);
            if let Some(self_id) = self_decl {
                self.locals.insert(self_id, alloca);
            }
        }

        for (param, decl_param) in explicit_params.iter().zip(self.find_param_decls(body, explicit_params)) {
            let llvm_param = function.get_nth_param(llvm_param_index).unwrap_or_else(|| {
                panic!("missing LLVM parameter for '{}'", self.interner.resolve(param.internal_name))
            });
            llvm_param_index += 1;
            let alloca = self
                .builder
                .build_alloca(llvm_param.get_type(), self.interner.resolve(param.internal_name))
                .expect("alloca");
            self.builder.build_store(alloca, llvm_param).expect("store");
            if let Some(id) = decl_param {
                self.locals.insert(id, alloca);
            }
        }

        self.gen_stmt(body);

        // A block with no explicit terminator (e.g. a `Void`-returning
        // function whose body falls off the end) gets an implicit `ret`.
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            if function.get_type().get_return_type().is_none() {
                self.builder.build_return(None).expect("return");
            } else {
                let ty = function.get_type().get_return_type().unwrap();
                self.builder.build_return(Some(&ty.const_zero())).expect("return");
            }
        }

        self.current_function = None;
    }

    /// Parameters aren't stored with stable `DeclId`s on the `Param`
    /// struct itself (unlike `self`, which Sema wraps in its own
    /// `DeclKind::Param`); resolve each by walking the body for the first
    /// `DeclRef` whose name matches, in declaration order.
    fn find_param_decls(&self, body: StmtId, params: &[trill_syntax::ast::Param]) -> Vec<Option<DeclId>> {
        params
            .iter()
            .map(|p| find_named_param_decl(self.ast, self.interner, body, self.interner.resolve(p.internal_name)))
            .collect()
    }

    fn build_type_metadata(&mut self) {
        let decls: Vec<DeclId> = self.sema.layouts.keys().copied().collect();
        let mut globals: FxHashMap<DeclId, GlobalValue<'ctx>> = FxHashMap::default();
        for &decl in &decls {
            let symbol = crate::mangle::type_metadata_symbol(self.sema, self.interner, decl);
            let name = crate::mangle::mangled_name(&symbol);
            let global = self.module.add_global(self.types.abi().type_metadata, None, &name);
            globals.insert(decl, global);
        }
        for &decl in &decls {
            let layout = &self.sema.layouts[&decl];
            let type_name = self.global_string(&crate::mangle::type_decl_name(self.sema, self.interner, decl));
            let is_indirect = self.types.is_indirect(decl);

            let field_metadata_ty = self.types.abi().field_metadata;
            let field_inits: Vec<_> = layout
                .fields
                .iter()
                .map(|field| {
                    let field_name = self.global_string(self.field_decl_name(field.decl));
                    let field_ty_ptr = match self.field_type_metadata(&field.ty, &globals) {
                        Some(ptr) => ptr,
                        None => self.types.abi().type_metadata.ptr_type(AddressSpace::default()).const_null(),
                    };
                    field_metadata_ty.const_named_struct(&[
                        field_name.as_pointer_value().into(),
                        field_ty_ptr.into(),
                        self.llvm_ctx.i32_type().const_int(field.offset_bytes as u64, false).into(),
                    ])
                })
                .collect();

            let fields_array_ty = field_metadata_ty.array_type(field_inits.len() as u32);
            let fields_global = self.module.add_global(fields_array_ty, None, &format!("trill.fields.{}", decl.index()));
            fields_global.set_initializer(&field_metadata_ty.const_array(&field_inits));
            fields_global.set_linkage(Linkage::Private);

            let initializer = self.types.abi().type_metadata.const_named_struct(&[
                type_name.as_pointer_value().into(),
                fields_global.as_pointer_value().into(),
                self.llvm_ctx.i32_type().const_int(layout.fields.len() as u64, false).into(),
                self.llvm_ctx.i8_type().const_int(is_indirect as u64, false).into(),
                self.llvm_ctx.i32_type().const_int(layout.size_bytes as u64 * 8, false).into(),
                self.llvm_ctx.i32_type().const_int(0, false).into(),
            ]);
            globals[&decl].set_initializer(&initializer);
            globals[&decl].set_linkage(Linkage::Private);
        }
        self.type_metadata_globals = globals;
    }

    fn field_type_metadata(&self, ty: &Type, globals: &FxHashMap<DeclId, GlobalValue<'ctx>>) -> Option<PointerValue<'ctx>> {
        match ty {
            Type::Named(decl) => globals.get(decl).map(|g| g.as_pointer_value()),
            _ => None,
        }
    }

    fn field_decl_name(&self, decl: DeclId) -> &str {
        match &self.ast.decl(decl).kind {
            DeclKind::Field(f) => self.interner.resolve(f.name),
            _ => "field",
        }
    }

    /// The `trill.TypeMetadata` global identifying `ty` at runtime: a
    /// user-declared type's own global for `Type::Named`, or a lazily
    /// built one for a primitive (§8 scenario 4 needs both an `Any`
    /// holding a primitive to carry a real identity, and a checked cast
    /// against a primitive target to compare against something).
    fn metadata_ptr_for(&mut self, ty: &Type) -> PointerValue<'ctx> {
        if let Type::Named(decl) = ty {
            if let Some(global) = self.type_metadata_globals.get(decl) {
                return global.as_pointer_value();
            }
        }
        let sema = self.sema;
        let interner = self.interner;
        let name = ty.display(&|id| crate::mangle::type_decl_name(sema, interner, id));
        if let Some(global) = self.primitive_metadata_globals.get(&name) {
            return global.as_pointer_value();
        }
        let global = self.build_primitive_metadata(&name, ty);
        self.primitive_metadata_globals.insert(name, global);
        global.as_pointer_value()
    }

    fn build_primitive_metadata(&mut self, name: &str, ty: &Type) -> GlobalValue<'ctx> {
        let type_name = self.global_string(name);
        let global = self.module.add_global(self.types.abi().type_metadata, None, &format!("trill.meta.{name}"));
        let initializer = self.types.abi().type_metadata.const_named_struct(&[
            type_name.as_pointer_value().into(),
            self.types.abi().field_metadata.ptr_type(AddressSpace::default()).const_null().into(),
            self.llvm_ctx.i32_type().const_int(0, false).into(),
            self.llvm_ctx.i8_type().const_int(0, false).into(),
            self.llvm_ctx.i32_type().const_int(ty.size_bits().unwrap_or(0) as u64, false).into(),
            self.llvm_ctx.i32_type().const_int(0, false).into(),
        ]);
        global.set_initializer(&initializer);
        global.set_linkage(Linkage::Private);
        global
    }

    fn global_string(&self, s: &str) -> inkwell::values::GlobalValue<'ctx> {
        // Metadata construction runs before any function body exists, so
        // the NUL-terminated constant is built directly against the
        // module rather than through `Builder::build_global_string_ptr`,
        // which requires an active insertion point.
        let bytes = s.as_bytes();
        let array_ty = self.llvm_ctx.i8_type().array_type(bytes.len() as u32 + 1);
        let mut with_nul: Vec<u8> = bytes.to_vec();
        with_nul.push(0);
        let const_str = self.llvm_ctx.const_string(&with_nul, false);
        let global = self.module.add_global(array_ty, None, "trill.str");
        global.set_initializer(&const_str);
        global.set_linkage(Linkage::Private);
        global.set_constant(true);
        global
    }
}

/// Recursively looks for the first `DeclRef` in `body` whose underlying
/// `Param` is named `self` (§4.6.6's implicit method receiver) — Sema
/// declares one fresh `DeclId` per member and every lookup of `self`
/// within that member's body resolves to the same id.
pub(super) fn find_self_decl(ast: &AstContext, interner: &Interner, body: StmtId) -> Option<DeclId> {
    find_named_param_decl(ast, interner, body, "self")
}

fn find_named_param_decl(ast: &AstContext, interner: &Interner, body: StmtId, name: &str) -> Option<DeclId> {
    let mut found = None;
    walk_stmt(ast, body, &mut |expr_id| {
        if found.is_some() {
            return;
        }
        if let ExprKind::DeclRef(decl_id) = ast.expr(expr_id).kind {
            if let DeclKind::Param(p) = &ast.decl(decl_id).kind {
                if interner.resolve(p.internal_name) == name {
                    found = Some(decl_id);
                }
            }
        }
    });
    found
}

fn walk_stmt(ast: &AstContext, id: StmtId, visit: &mut impl FnMut(ExprId)) {
    match ast.stmt(id).kind.clone() {
        StmtKind::Compound(stmts) => stmts.iter().for_each(|&s| walk_stmt(ast, s, visit)),
        StmtKind::If { cond, then_branch, else_branch } => {
            walk_expr(ast, cond, visit);
            walk_stmt(ast, then_branch, visit);
            if let Some(e) = else_branch {
                walk_stmt(ast, e, visit);
            }
        }
        StmtKind::While { cond, body } => {
            walk_expr(ast, cond, visit);
            walk_stmt(ast, body, visit);
        }
        StmtKind::For { init, cond, increment, body } => {
            if let Some(i) = init {
                walk_stmt(ast, i, visit);
            }
            if let Some(c) = cond {
                walk_expr(ast, c, visit);
            }
            if let Some(inc) = increment {
                walk_expr(ast, inc, visit);
            }
            walk_stmt(ast, body, visit);
        }
        StmtKind::Switch { scrutinee, cases } => {
            walk_expr(ast, scrutinee, visit);
            for case in &cases {
                if let Some(p) = case.pattern {
                    walk_expr(ast, p, visit);
                }
                case.body.iter().for_each(|&s| walk_stmt(ast, s, visit));
            }
        }
        StmtKind::Return(Some(e)) => walk_expr(ast, e, visit),
        StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::PoundDiagnostic { .. } => {}
        StmtKind::ExprStmt(e) => walk_expr(ast, e, visit),
        StmtKind::DeclStmt(d) => {
            if let DeclKind::Var(v) = &ast.decl(d).kind {
                if let Some(init) = v.initializer {
                    walk_expr(ast, init, visit);
                }
            }
        }
    }
}

fn walk_expr(ast: &AstContext, id: ExprId, visit: &mut impl FnMut(ExprId)) {
    visit(id);
    match ast.expr(id).kind.clone() {
        ExprKind::PropertyRef { base, .. } | ExprKind::FieldLookup { base, .. } => walk_expr(ast, base, visit),
        ExprKind::Subscript { base, index } => {
            walk_expr(ast, base, visit);
            walk_expr(ast, index, visit);
        }
        ExprKind::Call { callee, args } => {
            walk_expr(ast, callee, visit);
            args.iter().for_each(|a| walk_expr(ast, a.value, visit));
        }
        ExprKind::Closure { body, .. } => walk_stmt(ast, body, &mut |e| visit(e)),
        ExprKind::Paren(inner) => walk_expr(ast, inner, visit),
        ExprKind::Tuple(elems) => elems.iter().for_each(|&e| walk_expr(ast, e, visit)),
        ExprKind::TupleFieldLookup { base, .. } => walk_expr(ast, base, visit),
        ExprKind::Infix { lhs, rhs, .. } => {
            walk_expr(ast, lhs, visit);
            walk_expr(ast, rhs, visit);
        }
        ExprKind::Prefix { operand, .. } => walk_expr(ast, operand, visit),
        ExprKind::Ternary { cond, then_branch, else_branch } => {
            walk_expr(ast, cond, visit);
            walk_expr(ast, then_branch, visit);
            walk_expr(ast, else_branch, visit);
        }
        ExprKind::Cast { operand, .. }
        | ExprKind::TypeCheck { operand, .. }
        | ExprKind::CheckedCast { operand, .. }
        | ExprKind::BitcastToAny(operand) => walk_expr(ast, operand, visit),
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::CharLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::NilLiteral
        | ExprKind::VarRef(_)
        | ExprKind::DeclRef(_)
        | ExprKind::TypeReference(_)
        | ExprKind::Sizeof(_)
        | ExprKind::Error => {}
    }
}

#[cfg(test)]
mod tests {
    use trill_base::{DiagnosticEngine, Interner, SourceId};
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

    use super::*;

    /// Runs a source string through the same front end the driver's
    /// pipeline does (lex, parse, Sema, typeck), panicking on any recorded
    /// diagnostic so a test only reaches `generate` with a clean module.
    fn compile<'ctx>(llvm_ctx: &'ctx Context, source: &str) -> CodegenOutput<'ctx> {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ast = AstContext::new();
        let mut module = Parser::new(file, tokens, &mut ast, &mut interner, &mut diags).parse_module();
        let sema = trill_sema::analyze(&mut module, &mut ast, &mut interner, Vec::new(), &mut diags);
        let typeck = trill_typeck::check(&module, &mut ast, &mut interner, &sema, &mut diags);
        assert!(!diags.has_errors(), "expected a clean compilation, got {} diagnostic(s)", diags.len());
        generate(llvm_ctx, "test", &ast, &interner, &sema, &typeck, &module).expect("codegen should succeed")
    }

    #[test]
    fn a_free_function_gets_a_mangled_definition() {
        let llvm_ctx = Context::create();
        let out = compile(&llvm_ctx, "func add(a: Int, b: Int) -> Int { return a + b }");
        let ir = out.module.print_to_string().to_string();
        let (_, mangled) = out.mangled_names.iter().next().expect("one declaration was codegen'd");
        assert!(ir.contains(mangled.as_str()), "IR should define the function under its mangled name:\n{ir}");
        assert!(mangled.starts_with("_WF"));
    }

    #[test]
    fn recursive_calls_resolve_through_the_declare_before_emit_pass() {
        let llvm_ctx = Context::create();
        let out = compile(
            &llvm_ctx,
            "func fib(_ n: Int) -> Int { \
                var p = 0; var c = 1; \
                for var i = 0; i < n; i += 1 { let t = p; p = c; c = p + t } \
                return c \
            }",
        );
        assert_eq!(out.mangled_names.len(), 1);
        let ir = out.module.print_to_string().to_string();
        assert!(ir.contains("define"), "a function body should have been emitted:\n{ir}");
    }

    #[test]
    fn every_declared_function_gets_a_distinct_mangled_name() {
        let llvm_ctx = Context::create();
        let out = compile(&llvm_ctx, "func a() {} func b() {}");
        assert_eq!(out.mangled_names.len(), 2);
        let names: std::collections::HashSet<&String> = out.mangled_names.values().collect();
        assert_eq!(names.len(), 2, "two distinct functions must not collide on their mangled name");
    }

    #[test]
    fn a_type_with_fields_and_an_initializer_codegens_cleanly() {
        let llvm_ctx = Context::create();
        let out = compile(&llvm_ctx, "type Box { var x: Int; init(x: Int) { self.x = x } }");
        assert!(!out.mangled_names.is_empty());
        let ir = out.module.print_to_string().to_string();
        assert!(ir.contains("define"));
    }

    #[test]
    fn reassigning_an_indirect_local_releases_the_old_value_once() {
        let llvm_ctx = Context::create();
        let out = compile(
            &llvm_ctx,
            "indirect type Box { var x: Int; init(x: Int) { self.x = x } } \
             func main() { var b = Box(x: 3); b = Box(x: 4) }",
        );
        let ir = out.module.print_to_string().to_string();
        // Two allocations (the original `b` and its replacement), and two
        // releases: one for the reassignment's old value, one for `b`
        // falling out of scope at the end of `main` — each release of a
        // refcount-1 box runs its deinitializer exactly once (§8 scenario 3).
        let alloc_calls = ir.matches("trill_allocateIndirectType").count();
        assert!(alloc_calls >= 2, "both constructions should allocate a box:\n{ir}");
        let release_calls = ir.matches("trill_release").count();
        assert!(release_calls >= 2, "the reassignment's old value and the final scope-exit value must each be released:\n{ir}");
    }

    #[test]
    fn a_checked_cast_of_a_boxed_primitive_to_its_own_type_reads_back_cleanly() {
        let llvm_ctx = Context::create();
        let out = compile(&llvm_ctx, "func main() { let x: Any = 1; let y = x as Int }");
        let ir = out.module.print_to_string().to_string();
        assert!(ir.contains("trill_any_updateField"), "boxing the literal into Any should go through the runtime:\n{ir}");
        assert!(ir.contains("trill_any_extractField"), "the successful cast path should extract the field back out:\n{ir}");
        assert!(ir.contains("trill_castFailed"), "the failure path must still be emitted even when the cast can succeed:\n{ir}");
    }

    #[test]
    fn a_checked_cast_failure_reports_both_type_names() {
        let llvm_ctx = Context::create();
        let out = compile(&llvm_ctx, "func main() { let x: Any = 1; let y = x as Bool }");
        let ir = out.module.print_to_string().to_string();
        assert!(ir.contains("trill_castFailed"), "a mismatched checked cast must call into the runtime's failure reporter:\n{ir}");
        assert!(ir.contains("Bool"), "the target type's name is a compile-time constant available to the failure message:\n{ir}");
    }
}
