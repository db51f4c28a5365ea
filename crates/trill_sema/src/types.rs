//! The resolved type lattice (§3): the sum of primitive ints, `Bool`,
//! `Float`, `Double`, `Void`, named user types/protocols, tuples,
//! functions, pointers, the `Any` existential, and `error`.
//!
//! This is distinct from [`trill_syntax::ast::TypeExprKind`], which is
//! still just syntax. A [`Type`] is what a `TypeExprId` resolves *to* once
//! Sema has looked its name up; two `Type` values compare equal by
//! structure, matching §3 ("Types interned by structural identity;
//! equality is by value").

use trill_syntax::ast::DeclId;

/// The width of an integer type (§3: "widths {8,16,32,64,platform}").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
    /// The pointer-sized platform default (`Int`/`UInt` with no explicit
    /// width suffix).
    Platform,
}

impl IntWidth {
    /// Bit width assuming a 64-bit target, used by layout and the IR
    /// generator's default target. A true cross-compiling driver would
    /// thread the target's pointer width through here instead.
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 | IntWidth::Platform => 64,
        }
    }
}

/// A fully resolved Trill type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int { signed: bool, width: IntWidth },
    Bool,
    Float,
    Double,
    Void,
    /// A user struct or protocol, identified by its canonical declaration
    /// (§3 invariant iii).
    Named(DeclId),
    Tuple(Vec<Type>),
    Function { params: Vec<Type>, ret: Box<Type>, variadic: bool },
    Pointer(Box<Type>),
    /// The `Any` existential box (§4.8, §9).
    Any,
    /// A node that failed to resolve; suppresses cascading diagnostics
    /// (§3 invariant ii).
    Error,
}

impl Type {
    pub const INT64: Type = Type::Int { signed: true, width: IntWidth::W64 };
    pub const PLATFORM_INT: Type = Type::Int { signed: true, width: IntWidth::Platform };

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Float | Type::Double)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// `Equatable` for the purposes of this compiler (§4.7): primitives
    /// and strings (modelled here as `*UInt8`-style pointers are not
    /// distinguished from other pointers — string literals type as
    /// `Type::Pointer(UInt8)`, which is covered by the pointer arm).
    pub fn is_equatable(&self) -> bool {
        matches!(
            self,
            Type::Int { .. } | Type::Bool | Type::Float | Type::Double | Type::Pointer(_)
        )
    }

    /// Size in bits, if statically known. Named types are resolved by the
    /// caller via [`crate::layout::LayoutTable`] since their size depends
    /// on field layout, not on the `Type` value alone.
    pub fn size_bits(&self) -> Option<u32> {
        match self {
            Type::Int { width, .. } => Some(width.bits()),
            Type::Bool => Some(8),
            Type::Float => Some(32),
            Type::Double => Some(64),
            Type::Void => Some(0),
            Type::Pointer(_) => Some(64),
            Type::Tuple(elems) => elems.iter().map(|t| t.size_bits()).sum::<Option<u32>>(),
            Type::Any => Some((24 + 8) * 8),
            Type::Function { .. } => Some(64),
            Type::Named(_) | Type::Error => None,
        }
    }

    /// A human-readable rendering used in diagnostics, independent of any
    /// rendering crate (kept plain text per the Non-goal on ANSI
    /// rendering, §1).
    pub fn display(&self, names: &dyn Fn(DeclId) -> String) -> String {
        match self {
            Type::Int { signed, width } => {
                let prefix = if *signed { "Int" } else { "UInt" };
                match width {
                    IntWidth::Platform => prefix.to_string(),
                    w => format!("{prefix}{}", w.bits()),
                }
            }
            Type::Bool => "Bool".to_string(),
            Type::Float => "Float".to_string(),
            Type::Double => "Double".to_string(),
            Type::Void => "Void".to_string(),
            Type::Named(id) => names(*id),
            Type::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|t| t.display(names)).collect();
                format!("({})", parts.join(", "))
            }
            Type::Function { params, ret, variadic } => {
                let mut parts: Vec<String> = params.iter().map(|t| t.display(names)).collect();
                if *variadic {
                    parts.push("...".to_string());
                }
                format!("({}) -> {}", parts.join(", "), ret.display(names))
            }
            Type::Pointer(inner) => format!("*{}", inner.display(names)),
            Type::Any => "Any".to_string(),
            Type::Error => "<error>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_structural_types_compare_equal() {
        let a = Type::Pointer(Box::new(Type::INT64));
        let b = Type::Pointer(Box::new(Type::Int { signed: true, width: IntWidth::W64 }));
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_widths_are_not_equal() {
        let a = Type::Int { signed: true, width: IntWidth::W32 };
        let b = Type::Int { signed: true, width: IntWidth::W64 };
        assert_ne!(a, b);
    }

    #[test]
    fn equatable_excludes_tuples_and_functions() {
        assert!(Type::Bool.is_equatable());
        assert!(Type::INT64.is_equatable());
        assert!(!Type::Tuple(vec![Type::Bool]).is_equatable());
    }

    #[test]
    fn any_box_is_32_bytes() {
        assert_eq!(Type::Any.size_bits(), Some(256));
    }
}
