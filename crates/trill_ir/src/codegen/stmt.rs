//! Statement codegen (§4.7, §4.8). `Compound` blocks own the locals
//! declared directly in them and release any `indirect type` locals that
//! are still alive when the block falls off its end — a lexical, not
//! flow-sensitive, release discipline: an early `return`/`break` inside the
//! block skips those releases, a known simplification recorded in
//! `DESIGN.md` rather than a full drop-flow analysis.

use inkwell::values::BasicValueEnum;
use trill_sema::Type;
use trill_syntax::ast::{DeclKind, StmtId, StmtKind};

use super::Codegen;

impl<'a, 'ctx> Codegen<'a, 'ctx> {
    pub(super) fn gen_stmt(&mut self, id: StmtId) {
        match self.ast.stmt(id).kind.clone() {
            StmtKind::Compound(stmts) => self.gen_compound(&stmts),
            StmtKind::If { cond, then_branch, else_branch } => self.gen_if(cond, then_branch, else_branch),
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::For { init, cond, increment, body } => self.gen_for(init, cond, increment, body),
            StmtKind::Switch { scrutinee, cases } => self.gen_switch(&scrutinee, &cases),
            StmtKind::Return(value) => self.gen_return(value),
            StmtKind::Break => self.gen_break(),
            StmtKind::Continue => self.gen_continue(),
            StmtKind::ExprStmt(expr) => {
                self.gen_expr(expr);
            }
            StmtKind::DeclStmt(decl) => self.gen_decl_stmt(decl),
            // Sema already turns `#error`/`#warning` into diagnostics at
            // compile time (§4.4); if one still reaches codegen the module
            // never should have passed typeck, so it's a no-op rather than
            // a panic.
            StmtKind::PoundDiagnostic { .. } => {}
        }
    }

    fn gen_compound(&mut self, stmts: &[StmtId]) {
        let mut indirect_locals: Vec<trill_syntax::ast::DeclId> = Vec::new();
        for &stmt in stmts {
            if let StmtKind::DeclStmt(decl) = self.ast.stmt(stmt).kind.clone() {
                if let DeclKind::Var(v) = &self.ast.decl(decl).kind {
                    let ty = self.sema.decl_type.get(&decl).cloned().unwrap_or(Type::Error);
                    if matches!(ty, Type::Named(owner) if self.types.is_indirect(owner)) {
                        indirect_locals.push(decl);
                    }
                }
            }
            self.gen_stmt(stmt);
            if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_some() {
                // The block already ended in a `return`/`break`/`continue`;
                // nothing after it is reachable, and that path's own release
                // bookkeeping already ran (or was skipped, per the lexical
                // simplification above).
                return;
            }
        }
        for decl in indirect_locals {
            if let Some(&ptr) = self.locals.get(&decl) {
                let ty = self.sema.decl_type.get(&decl).cloned().unwrap_or(Type::Error);
                let value = self.builder.build_load(self.types.llvm_type(&ty), ptr, "scope_exit").expect("load");
                self.emit_release(value);
            }
        }
    }

    fn gen_if(&mut self, cond: trill_syntax::ast::ExprId, then_branch: StmtId, else_branch: Option<StmtId>) {
        let function = self.current_function.expect("inside a function body");
        let then_block = self.llvm_ctx.append_basic_block(function, "if.then");
        let else_block = self.llvm_ctx.append_basic_block(function, "if.else");
        let merge_block = self.llvm_ctx.append_basic_block(function, "if.merge");

        let cond_value = self.gen_expr(cond).into_int_value();
        self.builder.build_conditional_branch(cond_value, then_block, else_block).expect("branch");

        self.builder.position_at_end(then_block);
        self.gen_stmt(then_branch);
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(merge_block).expect("branch");
        }

        self.builder.position_at_end(else_block);
        if let Some(else_stmt) = else_branch {
            self.gen_stmt(else_stmt);
        }
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(merge_block).expect("branch");
        }

        self.builder.position_at_end(merge_block);
    }

    fn gen_while(&mut self, cond: trill_syntax::ast::ExprId, body: StmtId) {
        let function = self.current_function.expect("inside a function body");
        let cond_block = self.llvm_ctx.append_basic_block(function, "while.cond");
        let body_block = self.llvm_ctx.append_basic_block(function, "while.body");
        let end_block = self.llvm_ctx.append_basic_block(function, "while.end");

        self.builder.build_unconditional_branch(cond_block).expect("branch");
        self.builder.position_at_end(cond_block);
        let cond_value = self.gen_expr(cond).into_int_value();
        self.builder.build_conditional_branch(cond_value, body_block, end_block).expect("branch");

        self.builder.position_at_end(body_block);
        self.loop_stack.push((cond_block, end_block));
        self.gen_stmt(body);
        self.loop_stack.pop();
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(cond_block).expect("branch");
        }

        self.builder.position_at_end(end_block);
    }

    fn gen_for(
        &mut self,
        init: Option<StmtId>,
        cond: Option<trill_syntax::ast::ExprId>,
        increment: Option<trill_syntax::ast::ExprId>,
        body: StmtId,
    ) {
        let function = self.current_function.expect("inside a function body");
        if let Some(init) = init {
            self.gen_stmt(init);
        }

        let cond_block = self.llvm_ctx.append_basic_block(function, "for.cond");
        let body_block = self.llvm_ctx.append_basic_block(function, "for.body");
        let increment_block = self.llvm_ctx.append_basic_block(function, "for.inc");
        let end_block = self.llvm_ctx.append_basic_block(function, "for.end");

        self.builder.build_unconditional_branch(cond_block).expect("branch");
        self.builder.position_at_end(cond_block);
        match cond {
            Some(cond) => {
                let cond_value = self.gen_expr(cond).into_int_value();
                self.builder.build_conditional_branch(cond_value, body_block, end_block).expect("branch");
            }
            None => {
                self.builder.build_unconditional_branch(body_block).expect("branch");
            }
        }

        self.builder.position_at_end(body_block);
        self.loop_stack.push((increment_block, end_block));
        self.gen_stmt(body);
        self.loop_stack.pop();
        if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
            self.builder.build_unconditional_branch(increment_block).expect("branch");
        }

        self.builder.position_at_end(increment_block);
        if let Some(increment) = increment {
            self.gen_expr(increment);
        }
        self.builder.build_unconditional_branch(cond_block).expect("branch");

        self.builder.position_at_end(end_block);
    }

    /// Lowers a `switch` as a linear chain of equality comparisons against
    /// the scrutinee rather than an LLVM `switch` instruction — patterns
    /// are arbitrary expressions (§4.7's `Equatable` constraint), not bare
    /// integer constants, so `switch`'s jump-table requirement doesn't
    /// apply.
    fn gen_switch(&mut self, scrutinee: &trill_syntax::ast::ExprId, cases: &[trill_syntax::ast::SwitchCase]) {
        let function = self.current_function.expect("inside a function body");
        let end_block = self.llvm_ctx.append_basic_block(function, "switch.end");
        let scrutinee_value = self.gen_expr(*scrutinee);
        let scrutinee_ty = self.typeck.expr_types.get(scrutinee).cloned().unwrap_or(Type::Error);

        let mut next_check_block = self.builder.get_insert_block().expect("inside a block");
        for case in cases {
            self.builder.position_at_end(next_check_block);
            let case_block = self.llvm_ctx.append_basic_block(function, "switch.case");
            let fallthrough_block = self.llvm_ctx.append_basic_block(function, "switch.next");

            match case.pattern {
                Some(pattern) => {
                    let pattern_value = self.gen_expr(pattern);
                    let matches = self.values_equal(&scrutinee_ty, scrutinee_value, pattern_value);
                    self.builder.build_conditional_branch(matches, case_block, fallthrough_block).expect("branch");
                }
                // `default`/`else` case: always taken.
                None => {
                    self.builder.build_unconditional_branch(case_block).expect("branch");
                }
            }

            self.builder.position_at_end(case_block);
            for &stmt in &case.body {
                self.gen_stmt(stmt);
            }
            if self.builder.get_insert_block().and_then(|b| b.get_terminator()).is_none() {
                self.builder.build_unconditional_branch(end_block).expect("branch");
            }

            next_check_block = fallthrough_block;
        }

        self.builder.position_at_end(next_check_block);
        self.builder.build_unconditional_branch(end_block).expect("branch");
        self.builder.position_at_end(end_block);
    }

    fn values_equal(&mut self, ty: &Type, lhs: BasicValueEnum<'ctx>, rhs: BasicValueEnum<'ctx>) -> inkwell::values::IntValue<'ctx> {
        match ty {
            Type::Float | Type::Double => self
                .builder
                .build_float_compare(inkwell::FloatPredicate::OEQ, lhs.into_float_value(), rhs.into_float_value(), "case_eq")
                .expect("cmp"),
            _ => self
                .builder
                .build_int_compare(inkwell::IntPredicate::EQ, lhs.into_int_value(), rhs.into_int_value(), "case_eq")
                .expect("cmp"),
        }
    }

    fn gen_return(&mut self, value: Option<trill_syntax::ast::ExprId>) {
        match value {
            Some(expr) => {
                let ty = self.typeck.expr_types.get(&expr).cloned().unwrap_or(Type::Error);
                let result = self.gen_expr(expr);
                self.retain_if_borrowed(expr, &ty, result);
                if matches!(ty, Type::Void) {
                    self.builder.build_return(None).expect("return");
                } else {
                    self.builder.build_return(Some(&result)).expect("return");
                }
            }
            None => {
                self.builder.build_return(None).expect("return");
            }
        }
    }

    fn gen_break(&mut self) {
        if let Some(&(_, break_target)) = self.loop_stack.last() {
            self.builder.build_unconditional_branch(break_target).expect("branch");
        }
    }

    fn gen_continue(&mut self) {
        if let Some(&(continue_target, _)) = self.loop_stack.last() {
            self.builder.build_unconditional_branch(continue_target).expect("branch");
        }
    }

    fn gen_decl_stmt(&mut self, decl: trill_syntax::ast::DeclId) {
        let DeclKind::Var(v) = self.ast.decl(decl).kind.clone() else {
            // Nested `type`/`func`/etc. declarations inside a function body
            // aren't part of this language's surface grammar; only `var`/
            // `let` ever appear as a `DeclStmt`.
            return;
        };
        let ty = self.sema.decl_type.get(&decl).cloned().unwrap_or(Type::Error);
        let llvm_ty = self.types.llvm_type(&ty);
        let alloca = self.builder.build_alloca(llvm_ty, self.interner.resolve(v.name)).expect("alloca");

        if let Some(init) = v.initializer {
            let value = self.gen_expr(init);
            self.retain_if_borrowed(init, &ty, value);
            self.builder.build_store(alloca, value).expect("store");
        }

        self.locals.insert(decl, alloca);
    }
}
