//! # trill-runtime
//!
//! The C-ABI runtime every Trill binary links against (§4.8, §6): type and
//! protocol metadata, the `Any` existential box, reference counting for
//! `indirect type` values, a one-shot process-init barrier, and the symbol
//! demangler. Every public function here is `#[no_mangle] pub extern "C"`
//! and forms part of the bit-exact ABI `trill_ir`'s codegen targets — this
//! crate has no dependencies, on purpose, so linking it never pulls in a
//! transitive graph a minimal embedded target can't afford.

pub mod any;
pub mod arc;
pub mod error;
pub mod init;
pub mod layout;
pub mod mangle;
pub mod once;
