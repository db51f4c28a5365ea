//! The foreign declaration shapes the importer produces (§4.5).

#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Int { signed: bool, bits: u32 },
    Float,
    Double,
    Void,
    Bool,
    Pointer(Box<CType>),
    /// An unresolved struct/typedef name; resolved against already-imported
    /// declarations by Sema, not by this crate.
    Named(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignParam {
    pub name: Option<String>,
    pub ty: CType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignField {
    pub name: String,
    pub ty: CType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForeignDecl {
    Function {
        name: String,
        params: Vec<ForeignParam>,
        ret: CType,
        variadic: bool,
        /// `__attribute__((noreturn))` → attribute `noreturn` (§4.5).
        noreturn: bool,
    },
    TypeAlias {
        name: String,
        target: CType,
    },
    /// One enumerator of a C `enum`, assigned its sequential value (§4.5).
    Constant {
        name: String,
        value: i64,
    },
    Record {
        name: String,
        fields: Vec<ForeignField>,
    },
}
