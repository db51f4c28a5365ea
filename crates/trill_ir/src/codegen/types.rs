//! Mirrors `trill_sema::Type` and `trill_runtime::layout`'s `#[repr(C)]`
//! ABI structs as LLVM types (§4.8). The ABI structs are built once per
//! `inkwell::context::Context` from the exact field order and widths
//! `trill_runtime::layout` defines, so a mismatch there is a compile error
//! in `trill_runtime` itself, not a silent divergence here.

use inkwell::context::Context;
use inkwell::types::{BasicTypeEnum, StructType};
use inkwell::AddressSpace;
use rustc_hash::{FxHashMap, FxHashSet};
use trill_sema::{IntWidth, SemaOutput, Type};
use trill_syntax::ast::DeclId;

/// LLVM mirrors of `trill_runtime::layout`'s structs, shared by every
/// function codegen visits (§4.8, §9's "bit-exact" box-header invariant).
pub struct AbiTypes<'ctx> {
    pub box_header: StructType<'ctx>,
    pub any_box: StructType<'ctx>,
    pub field_metadata: StructType<'ctx>,
    pub type_metadata: StructType<'ctx>,
    pub protocol_metadata: StructType<'ctx>,
    pub generic_box: StructType<'ctx>,
}

impl<'ctx> AbiTypes<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        let i8p = ctx.i8_type().ptr_type(AddressSpace::default());
        let i32_t = ctx.i32_type();

        // `BoxHeader { refcount: AtomicU32, _padding: u32, deinit: Option<extern "C" fn(*mut c_void)> }`
        let deinit_fn_ptr = ctx.void_type().fn_type(&[i8p.into()], false).ptr_type(AddressSpace::default());
        let box_header = ctx.opaque_struct_type("trill.BoxHeader");
        box_header.set_body(&[i32_t.into(), i32_t.into(), deinit_fn_ptr.into()], false);

        let type_metadata = ctx.opaque_struct_type("trill.TypeMetadata");
        let field_metadata = ctx.opaque_struct_type("trill.FieldMetadata");
        // `FieldMetadata { name: *const c_char, ty: *const TypeMetadata, offset_bytes: u32 }`
        field_metadata.set_body(&[i8p.into(), type_metadata.ptr_type(AddressSpace::default()).into(), i32_t.into()], false);

        // `TypeMetadata { name, fields, field_count, is_reference_type, size_in_bits, pointer_level }`
        type_metadata.set_body(
            &[
                i8p.into(),
                field_metadata.ptr_type(AddressSpace::default()).into(),
                i32_t.into(),
                ctx.i8_type().into(),
                i32_t.into(),
                i32_t.into(),
            ],
            false,
        );

        // `ProtocolMetadata { name, method_names, method_count }`
        let protocol_metadata = ctx.opaque_struct_type("trill.ProtocolMetadata");
        protocol_metadata.set_body(&[i8p.into(), i8p.ptr_type(AddressSpace::default()).into(), i32_t.into()], false);

        // `AnyBox { payload: [u8; ANY_PAYLOAD_BYTES], type_metadata: *const TypeMetadata }`
        let any_box = ctx.opaque_struct_type("trill.AnyBox");
        any_box.set_body(
            &[
                ctx.i8_type().array_type(trill_runtime::layout::ANY_PAYLOAD_BYTES as u32).into(),
                type_metadata.ptr_type(AddressSpace::default()).into(),
            ],
            false,
        );

        // `GenericBox { type_metadata, witness_table: *const *const c_void }`
        let generic_box = ctx.opaque_struct_type("trill.GenericBox");
        generic_box.set_body(
            &[
                type_metadata.ptr_type(AddressSpace::default()).into(),
                i8p.ptr_type(AddressSpace::default()).ptr_type(AddressSpace::default()).into(),
            ],
            false,
        );

        Self { box_header, any_box, field_metadata, type_metadata, protocol_metadata, generic_box }
    }
}

/// Caches the LLVM type for every `trill_sema::Type`, including the
/// struct types for user-declared `type`s (fields in declared order,
/// prefixed with a `BoxHeader` for `indirect` types, §4.6.4/§4.8).
pub struct TypeTable<'ctx> {
    ctx: &'ctx Context,
    abi: AbiTypes<'ctx>,
    named: FxHashMap<DeclId, StructType<'ctx>>,
    indirect: FxHashSet<DeclId>,
}

impl<'ctx> TypeTable<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self { ctx, abi: AbiTypes::new(ctx), named: FxHashMap::default(), indirect: FxHashSet::default() }
    }

    pub fn abi(&self) -> &AbiTypes<'ctx> {
        &self.abi
    }

    pub fn is_indirect(&self, decl: DeclId) -> bool {
        self.indirect.contains(&decl)
    }

    pub fn named_struct(&self, decl: DeclId) -> Option<StructType<'ctx>> {
        self.named.get(&decl).copied()
    }

    /// Declares an opaque struct per layout-bearing type, then fills in
    /// every body — a two-pass process because field types may reference
    /// other named types before their own bodies are set (§4.6.4's layout
    /// pass already resolved the cycle at the `Type` level; this just
    /// mirrors the same declarations into LLVM).
    pub fn register_named_types(&mut self, sema: &SemaOutput) {
        self.indirect = sema.indirect_types.clone();
        for &decl in sema.layouts.keys() {
            let st = self.ctx.opaque_struct_type(&format!("trill.type.{}", decl.index()));
            self.named.insert(decl, st);
        }
        for (&decl, layout) in sema.layouts.iter() {
            let mut field_types: Vec<BasicTypeEnum> = Vec::new();
            if self.indirect.contains(&decl) {
                field_types.push(self.abi.box_header.into());
            }
            for field in &layout.fields {
                field_types.push(self.llvm_type(&field.ty));
            }
            self.named[&decl].set_body(&field_types, false);
        }
    }

    /// Maps a resolved `Type` to its LLVM representation. `indirect type`
    /// values are pointers to their struct (reference semantics, §4.6.4);
    /// every other named type is passed by value.
    pub fn llvm_type(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty {
            Type::Int { width, .. } => match width {
                IntWidth::W8 => self.ctx.i8_type().into(),
                IntWidth::W16 => self.ctx.i16_type().into(),
                IntWidth::W32 => self.ctx.i32_type().into(),
                IntWidth::W64 | IntWidth::Platform => self.ctx.i64_type().into(),
            },
            Type::Bool => self.ctx.bool_type().into(),
            Type::Float => self.ctx.f32_type().into(),
            Type::Double => self.ctx.f64_type().into(),
            // Never directly stored or loaded; call sites with a `Void`
            // return simply skip emitting a result value.
            Type::Void => self.ctx.struct_type(&[], false).into(),
            Type::Pointer(inner) => self.llvm_type(inner).ptr_type(AddressSpace::default()).into(),
            Type::Tuple(elems) => {
                let field_types: Vec<BasicTypeEnum> = elems.iter().map(|t| self.llvm_type(t)).collect();
                self.ctx.struct_type(&field_types, false).into()
            }
            Type::Function { .. } => self.ctx.i8_type().ptr_type(AddressSpace::default()).into(),
            Type::Named(decl) => match self.named.get(decl) {
                Some(st) => {
                    if self.indirect.contains(decl) {
                        st.ptr_type(AddressSpace::default()).into()
                    } else {
                        (*st).into()
                    }
                }
                None => self.ctx.i8_type().into(),
            },
            Type::Any => self.abi.any_box.into(),
            // `Error` never reaches codegen in a module that passed
            // typeck without diagnostics; treated as an opaque byte so a
            // stray reference still produces *some* value rather than a
            // panic deep in LLVM's type checker.
            Type::Error => self.ctx.i8_type().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_header_is_sixteen_bytes_matching_the_runtime_layout() {
        let ctx = Context::create();
        let abi = AbiTypes::new(&ctx);
        let target = inkwell::targets::TargetData::create("e-m:e-i64:64-f80:128-n8:16:32:64-S128");
        assert_eq!(target.get_abi_size(&abi.box_header), trill_runtime::layout::BOX_HEADER_BYTES as u64);
    }

    #[test]
    fn any_box_matches_the_runtime_payload_plus_pointer_layout() {
        let ctx = Context::create();
        let abi = AbiTypes::new(&ctx);
        let target = inkwell::targets::TargetData::create("e-m:e-i64:64-f80:128-n8:16:32:64-S128");
        assert_eq!(target.get_abi_size(&abi.any_box), trill_runtime::layout::ANY_BOX_BYTES as u64);
    }
}
