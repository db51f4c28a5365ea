//! Statement nodes (§3).

use super::{DeclId, ExprId, NodeSpan, StmtId};
use trill_base::Symbol;

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` marks the `default:` case.
    pub pattern: Option<ExprId>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Compound(Vec<StmtId>),
    If { cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId> },
    While { cond: ExprId, body: StmtId },
    /// C-style for: `for init; cond; increment { body }`.
    For { init: Option<StmtId>, cond: Option<ExprId>, increment: Option<ExprId>, body: StmtId },
    Switch { scrutinee: ExprId, cases: Vec<SwitchCase> },
    Return(Option<ExprId>),
    Break,
    Continue,
    ExprStmt(ExprId),
    DeclStmt(DeclId),
    /// `#error`/`#warning` as a statement (§4.4); lowered to a diagnostic
    /// emission during Sema with the declared severity.
    PoundDiagnostic { is_error: bool, message: Symbol },
}

#[derive(Debug, Clone)]
pub struct StmtNode {
    pub kind: StmtKind,
    pub span: NodeSpan,
}
