//! Declaration nodes (§3).

use trill_base::Symbol;

use super::{Attributes, DeclId, ExprId, NodeSpan, StmtId, TypeExprId};

/// A function parameter: an optional external label distinct from its
/// internal name (§4.4, mirroring Swift's `func f(extLabel intName: T)`).
#[derive(Debug, Clone)]
pub struct Param {
    pub external_label: Option<Symbol>,
    pub internal_name: Symbol,
    pub ty: TypeExprId,
    pub span: NodeSpan,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Symbol,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub ret: Option<TypeExprId>,
    /// `None` for `foreign func` declarations (§3 invariant iv).
    pub body: Option<StmtId>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: Symbol,
    /// `true` for `var`, `false` for `let`.
    pub mutable: bool,
    pub ty: Option<TypeExprId>,
    pub initializer: Option<ExprId>,
}

#[derive(Debug, Clone)]
pub struct InitializerDecl {
    pub params: Vec<Param>,
    pub body: StmtId,
}

#[derive(Debug, Clone)]
pub struct DeinitializerDecl {
    pub body: StmtId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    Getter,
    Setter,
}

#[derive(Debug, Clone)]
pub struct AccessorDecl {
    pub kind: AccessorKind,
    pub property: Symbol,
    pub params: Vec<Param>,
    pub body: StmtId,
}

/// A stored field inside a `type`/`extension` body, distinct from a
/// top-level [`VarDecl`] only in that it participates in layout (§4.6.4).
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: Symbol,
    pub ty: TypeExprId,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: Symbol,
    pub fields: Vec<DeclId>,
    pub members: Vec<DeclId>,
    pub conforms_to: Vec<Symbol>,
}

#[derive(Debug, Clone)]
pub struct ExtensionDecl {
    pub target: Symbol,
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone)]
pub struct ProtocolDecl {
    pub name: Symbol,
    /// Method signatures required by conformers, in declared order — this
    /// order becomes the witness table layout (§4.8).
    pub methods: Vec<DeclId>,
}

#[derive(Debug, Clone)]
pub struct TypeAliasDecl {
    pub name: Symbol,
    pub target: TypeExprId,
}

#[derive(Debug, Clone)]
pub struct OperatorDecl {
    pub symbol: Symbol,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Var(VarDecl),
    Param(Param),
    Function(FunctionDecl),
    Initializer(InitializerDecl),
    Deinitializer(DeinitializerDecl),
    Accessor(AccessorDecl),
    Field(FieldDecl),
    Type(TypeDecl),
    Extension(ExtensionDecl),
    Protocol(ProtocolDecl),
    TypeAlias(TypeAliasDecl),
    Operator(OperatorDecl),
}

#[derive(Debug, Clone)]
pub struct DeclNode {
    pub kind: DeclKind,
    pub span: NodeSpan,
    pub attributes: Attributes,
}
