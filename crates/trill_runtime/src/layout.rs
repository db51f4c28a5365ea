//! `#[repr(C)]` struct layouts shared with the IR generator (§4.8, §9).
//!
//! These types are the single source of truth for the runtime ABI's memory
//! layout. `trill_ir::codegen::types` builds matching LLVM struct types from
//! the same field order and widths, so the compiler and this crate can never
//! describe two different `AnyBox`es. Nothing in this module allocates or
//! mutates memory — see [`crate::arc`] and [`crate::any`] for that.

use std::ffi::c_void;

/// Bytes occupied by the indirect-type box header that precedes every
/// heap-allocated `indirect type`'s payload: an atomic 32-bit refcount, its
/// alignment padding, and a pointer to the deinitializer. Must match
/// `trill_sema::layout::BOX_HEADER_BYTES` bit-for-bit.
pub const BOX_HEADER_BYTES: usize = 16;

/// Payload bytes inside an `AnyBox` before the type-metadata pointer
/// (§4.8, §9: "bit-exact, 24-byte payload, 1 pointer").
pub const ANY_PAYLOAD_BYTES: usize = 24;

/// Total size of an `AnyBox`: the 24-byte payload plus one pointer.
pub const ANY_BOX_BYTES: usize = ANY_PAYLOAD_BYTES + std::mem::size_of::<usize>();

/// The header prefixing every `indirect type` allocation. A value of
/// `indirect type T` at the ABI boundary is a pointer to the byte just past
/// this header; the header is reached by subtracting `size_of::<BoxHeader>()`
/// from that pointer.
#[repr(C)]
pub struct BoxHeader {
    pub refcount: std::sync::atomic::AtomicU32,
    _padding: u32,
    pub deinit: Option<extern "C" fn(*mut c_void)>,
}

const _: () = assert!(std::mem::size_of::<BoxHeader>() == BOX_HEADER_BYTES);

/// One field of a [`TypeMetadata`] (§4.8: "`{name, typeMetadata*, offsetBytes}`").
#[repr(C)]
pub struct FieldMetadata {
    pub name: *const std::ffi::c_char,
    pub ty: *const TypeMetadata,
    pub offset_bytes: u32,
}

/// A statically-emitted descriptor for a user type (§4.8).
#[repr(C)]
pub struct TypeMetadata {
    pub name: *const std::ffi::c_char,
    pub fields: *const FieldMetadata,
    pub field_count: u32,
    pub is_reference_type: bool,
    pub size_in_bits: u32,
    pub pointer_level: u32,
}

/// A statically-emitted descriptor for a protocol (§4.8).
#[repr(C)]
pub struct ProtocolMetadata {
    pub name: *const std::ffi::c_char,
    pub method_names: *const *const std::ffi::c_char,
    pub method_count: u32,
}

/// The existential box backing `Any` values. When the boxed value's size
/// exceeds [`ANY_PAYLOAD_BYTES`], `payload` holds a heap pointer the box
/// owns instead of the value inline (§4.8).
#[repr(C)]
pub struct AnyBox {
    pub payload: [u8; ANY_PAYLOAD_BYTES],
    pub type_metadata: *const TypeMetadata,
}

const _: () = assert!(std::mem::size_of::<AnyBox>() == ANY_BOX_BYTES);

/// What a generic parameter is passed as at the IR level: metadata plus a
/// witness-table pointer, immediately followed by the value payload at the
/// call site (§4.8).
#[repr(C)]
pub struct GenericBox {
    pub type_metadata: *const TypeMetadata,
    pub witness_table: *const *const c_void,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_header_is_sixteen_bytes() {
        assert_eq!(std::mem::size_of::<BoxHeader>(), 16);
    }

    #[test]
    fn any_box_is_twenty_four_plus_one_pointer() {
        assert_eq!(std::mem::size_of::<AnyBox>(), 24 + std::mem::size_of::<usize>());
    }
}
