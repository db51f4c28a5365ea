//! Stored-field layout (§4.6.4): order of appearance, natural alignment,
//! and the indirect-type box header.
//!
//! For `indirect type`, the box header precedes the fields (§4.8): an
//! atomic 32-bit refcount plus a pointer to the deinitializer, which on a
//! 64-bit target natural-aligns to 16 bytes. `trill_runtime::layout`
//! defines the bit-exact `#[repr(C)]` counterpart; the two must never
//! drift (§9 "Shared `AnyBox` header layout").

use rustc_hash::FxHashMap;
use trill_syntax::ast::DeclId;

use crate::types::Type;

/// Bytes occupied by the indirect-type box header on a 64-bit target:
/// `{ atomic u32 count; u32 padding; fn(*mut ()) deinit; }`.
pub const BOX_HEADER_BYTES: u32 = 16;

#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub decl: DeclId,
    pub ty: Type,
    pub offset_bytes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TypeLayout {
    pub fields: Vec<FieldLayout>,
    pub size_bytes: u32,
    pub is_indirect: bool,
}

/// Maps a type declaration to its computed layout. Populated in
/// dependency order by [`crate::resolve::Sema`]; types with a cyclic
/// sizing dependency (§3 invariant vii) are reported and given a
/// zero-sized layout instead of recursing forever.
pub type LayoutTable = FxHashMap<DeclId, TypeLayout>;

/// Rounds a bit-size up to whole bytes, with a 1-byte floor so a
/// zero-sized field (shouldn't occur for stored fields, but defensive)
/// never collapses layout to nothing.
fn bytes_for_bits(bits: u32) -> u32 {
    ((bits + 7) / 8).max(1)
}

/// Computes one type's field layout given each field's already-resolved
/// [`Type`] and the sizes of any named types it depends on (via
/// `named_size_bytes`, consulted for `Type::Named` fields so a struct
/// containing another struct lays out correctly).
pub fn compute_layout(
    fields: &[(DeclId, Type)],
    is_indirect: bool,
    named_size_bytes: &dyn Fn(DeclId) -> Option<u32>,
) -> TypeLayout {
    let mut offset = if is_indirect { BOX_HEADER_BYTES } else { 0 };
    let mut laid_out = Vec::with_capacity(fields.len());
    for (decl, ty) in fields {
        let size = field_size_bytes(ty, named_size_bytes);
        // Natural alignment: align the offset up to a multiple of the
        // field's own size (§4.6.4 / §4.8).
        let align = size.max(1);
        offset = offset.div_ceil(align) * align;
        laid_out.push(FieldLayout { decl: *decl, ty: ty.clone(), offset_bytes: offset });
        offset += size;
    }
    TypeLayout { fields: laid_out, size_bytes: offset.max(1), is_indirect }
}

fn field_size_bytes(ty: &Type, named_size_bytes: &dyn Fn(DeclId) -> Option<u32>) -> u32 {
    match ty {
        Type::Named(id) => named_size_bytes(*id).unwrap_or(8),
        other => other.size_bits().map(bytes_for_bits).unwrap_or(8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_syntax::ast::{AstContext, Attributes, DeclKind, OperatorDecl};

    fn decl_id(ctx: &mut AstContext) -> DeclId {
        ctx.alloc_decl(
            DeclKind::Operator(OperatorDecl { symbol: trill_base::Symbol::EMPTY }),
            None,
            Attributes::none(),
        )
    }

    #[test]
    fn fields_lay_out_in_order_with_natural_alignment() {
        let mut ctx = AstContext::new();
        let a = decl_id(&mut ctx);
        let b = decl_id(&mut ctx);
        // An 8-bit field followed by a 64-bit field: the second must
        // align up to offset 8, not sit at offset 1.
        let fields = vec![(a, Type::Bool), (b, Type::INT64)];
        let layout = compute_layout(&fields, false, &|_| None);
        assert_eq!(layout.fields[0].offset_bytes, 0);
        assert_eq!(layout.fields[1].offset_bytes, 8);
        assert_eq!(layout.size_bytes, 16);
    }

    #[test]
    fn indirect_type_fields_start_after_the_box_header() {
        let mut ctx = AstContext::new();
        let a = decl_id(&mut ctx);
        let fields = vec![(a, Type::INT64)];
        let layout = compute_layout(&fields, true, &|_| None);
        assert_eq!(layout.fields[0].offset_bytes, BOX_HEADER_BYTES);
        assert!(layout.is_indirect);
    }

    #[test]
    fn named_field_size_consults_the_callback() {
        let mut ctx = AstContext::new();
        let a = decl_id(&mut ctx);
        let nested = decl_id(&mut ctx);
        let fields = vec![(a, Type::Named(nested))];
        let layout = compute_layout(&fields, false, &|id| if id == nested { Some(4) } else { None });
        assert_eq!(layout.size_bytes, 4);
    }
}
