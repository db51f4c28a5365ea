//! Owns the per-kind node arenas and hands out stable ids (§9).
//!
//! Each kind gets its own growable arena rather than one mixed arena, so a
//! `DeclId` can never be confused with an `ExprId` at the type level, and
//! so Sema can mutate a `DeclNode` in place (e.g. attach a canonical
//! `DeclId` to a resolved reference) without invalidating sibling ids —
//! growth only ever appends.

use super::{
    DeclId, DeclKind, DeclNode, ExprId, ExprKind, ExprNode, NodeSpan, StmtId, StmtKind, StmtNode, TypeExprId,
    TypeExprKind, TypeExprNode,
};
use super::Attributes;

#[derive(Default)]
pub struct AstContext {
    exprs: Vec<ExprNode>,
    stmts: Vec<StmtNode>,
    decls: Vec<DeclNode>,
    types: Vec<TypeExprNode>,
}

impl AstContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, kind: ExprKind, span: NodeSpan) -> ExprId {
        self.alloc_expr_with(kind, span, Attributes::none())
    }

    pub fn alloc_expr_with(&mut self, kind: ExprKind, span: NodeSpan, attributes: Attributes) -> ExprId {
        let id = ExprId::new(self.exprs.len() as u32);
        self.exprs.push(ExprNode { kind, span, attributes });
        id
    }

    pub fn expr(&self, id: ExprId) -> &ExprNode {
        &self.exprs[id.index()]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut ExprNode {
        &mut self.exprs[id.index()]
    }

    pub fn alloc_stmt(&mut self, kind: StmtKind, span: NodeSpan) -> StmtId {
        let id = StmtId::new(self.stmts.len() as u32);
        self.stmts.push(StmtNode { kind, span });
        id
    }

    pub fn stmt(&self, id: StmtId) -> &StmtNode {
        &self.stmts[id.index()]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.stmts[id.index()]
    }

    pub fn alloc_decl(&mut self, kind: DeclKind, span: NodeSpan, attributes: Attributes) -> DeclId {
        let id = DeclId::new(self.decls.len() as u32);
        self.decls.push(DeclNode { kind, span, attributes });
        id
    }

    pub fn decl(&self, id: DeclId) -> &DeclNode {
        &self.decls[id.index()]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut DeclNode {
        &mut self.decls[id.index()]
    }

    pub fn alloc_type_expr(&mut self, kind: TypeExprKind, span: NodeSpan) -> TypeExprId {
        let id = TypeExprId::new(self.types.len() as u32);
        self.types.push(TypeExprNode { kind, span });
        id
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExprNode {
        &self.types[id.index()]
    }

    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_expr_returns_increasing_ids() {
        let mut ctx = AstContext::new();
        let a = ctx.alloc_expr(ExprKind::IntLiteral(1), None);
        let b = ctx.alloc_expr(ExprKind::IntLiteral(2), None);
        assert_ne!(a, b);
        assert!(matches!(ctx.expr(a).kind, ExprKind::IntLiteral(1)));
        assert!(matches!(ctx.expr(b).kind, ExprKind::IntLiteral(2)));
    }

    #[test]
    fn expr_mut_allows_in_place_rewriting() {
        let mut ctx = AstContext::new();
        let id = ctx.alloc_expr(ExprKind::Error, None);
        ctx.expr_mut(id).kind = ExprKind::IntLiteral(7);
        assert!(matches!(ctx.expr(id).kind, ExprKind::IntLiteral(7)));
    }

    #[test]
    fn decl_count_tracks_allocations() {
        let mut ctx = AstContext::new();
        assert_eq!(ctx.decl_count(), 0);
        ctx.alloc_decl(
            DeclKind::Operator(super::super::OperatorDecl { symbol: trill_base::Symbol::EMPTY }),
            None,
            Attributes::none(),
        );
        assert_eq!(ctx.decl_count(), 1);
    }
}
