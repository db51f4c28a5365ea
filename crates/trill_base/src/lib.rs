#![cfg_attr(docsrs, feature(doc_cfg))]

//! # trill-base
//!
//! Source model, diagnostics, arenas, interning and spans shared by every
//! crate in the Trill compiler.
//!
//! This crate provides the foundational types the rest of the pipeline
//! builds on:
//!
//! - [`Arena`] — bump allocation for stable AST references
//! - [`Interner`]/[`Symbol`] — string interning for O(1) equality
//! - [`Span`]/[`SourceLoc`] — source location tracking
//! - [`SourceFile`]/[`SourceManager`] — the source model (§4.1)
//! - [`Diagnostic`]/[`DiagnosticEngine`] — the diagnostic engine (§4.2)
//! - [`SpannedError`]/[`Result`] — lightweight errors with source positions
//!
//! # Design principles
//!
//! This crate has **no knowledge of Trill syntax**. It provides only the
//! generic, reusable infrastructure that the lexer, parser, Sema, type
//! checker and IR generator build upon, the way `logicaffeine-base`
//! underlies every other crate in its workspace.
//!
//! # Example
//!
//! ```
//! use trill_base::{Arena, Interner, SourceId, Span};
//!
//! let arena: Arena<&str> = Arena::new();
//! let mut interner = Interner::new();
//!
//! let hello = interner.intern("hello");
//! let file = SourceId::new(0);
//! let span = Span::new(file, 0, 5);
//!
//! let allocated = arena.alloc("hello");
//! assert_eq!(*allocated, "hello");
//! ```

pub mod arena;
pub mod ctx;
pub mod diagnostic;
pub mod error;
pub mod intern;
pub mod source;
pub mod span;

pub use arena::Arena;
pub use ctx::CompilerSession;
pub use diagnostic::{
    Diagnostic, DiagnosticConsumer, DiagnosticEngine, DiagnosticKind, Highlight, HumanConsumer, JsonConsumer,
};
pub use error::{Result, SpannedError};
pub use intern::{Interner, Symbol, SymbolEq};
pub use source::{SourceFile, SourceManager};
pub use span::{SourceId, SourceLoc, Span};
