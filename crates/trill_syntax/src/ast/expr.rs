//! Expression nodes (§3).

use trill_base::Symbol;

use super::{DeclId, ExprId, NodeSpan, TypeExprId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl InfixOp {
    /// `true` for `=` and the compound `op=` family — these carry a
    /// mutation semantic and require an l-value left operand (§4.4, §4.7).
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    Neg,
    Not,
    BitNot,
    /// `&x`: address-of, requires an l-value operand, yields `*T`.
    AddressOf,
    /// `*p`: pointer dereference.
    Deref,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    CharLiteral(char),
    StringLiteral(Symbol),
    BoolLiteral(bool),
    NilLiteral,
    /// An unresolved name; Sema rewrites the reference's `DeclId` once the
    /// declaration it denotes is known.
    VarRef(Symbol),
    /// A name already bound to its declaration (post-Sema form, also used
    /// by the parser for implicit self-references where unambiguous).
    DeclRef(DeclId),
    /// `base.name` before Sema decides whether `name` is a field or
    /// property.
    PropertyRef { base: ExprId, name: Symbol },
    FieldLookup { base: ExprId, name: Symbol },
    Subscript { base: ExprId, index: ExprId },
    Call { callee: ExprId, args: Vec<CallArg> },
    Closure { params: Vec<super::Param>, ret: Option<TypeExprId>, body: super::StmtId },
    Paren(ExprId),
    Tuple(Vec<ExprId>),
    TupleFieldLookup { base: ExprId, index: u32 },
    Sizeof(TypeExprId),
    Infix { op: InfixOp, lhs: ExprId, rhs: ExprId },
    Prefix { op: PrefixOp, operand: ExprId },
    Ternary { cond: ExprId, then_branch: ExprId, else_branch: ExprId },
    /// `x as T`.
    Cast { operand: ExprId, target: TypeExprId },
    /// `x is T`.
    TypeCheck { operand: ExprId, target: TypeExprId },
    /// A syntactic type used in expression position (e.g. `Int.self`-style
    /// metatype references, or as the operand of `sizeof`/casts parsed
    /// through the expression grammar).
    TypeReference(TypeExprId),
    /// Implicit coercion from concrete `T` to `Any`, inserted by the type
    /// checker (§4.7); never produced by the parser, always `implicit`.
    BitcastToAny(ExprId),
    /// Implicit/explicit narrowing from `Any` back to a concrete type;
    /// traps at runtime on mismatch (§4.7, §4.8).
    CheckedCast { operand: ExprId, target: TypeExprId },
    /// A node that failed to type-check; carries the `error` type and
    /// suppresses cascading diagnostics (§3 invariant ii, §4.7).
    Error,
}

#[derive(Debug, Clone)]
pub struct CallArg {
    pub label: Option<Symbol>,
    pub value: ExprId,
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub span: NodeSpan,
    pub attributes: super::Attributes,
}
