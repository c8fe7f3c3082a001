//! # Opal Syntax Layer
//!
//! The read-only syntax surface the resolution engine consumes: source files
//! exposing an ordered sequence of declaration nodes, a package qualifier,
//! import directives, and lexical-parent lookup.
//!
//! The parser itself is an external collaborator; [`SourceFileBuilder`] is the
//! programmatic stand-in for it. Built files carry a canonical textual
//! rendering, and every node span indexes into that text so diagnostics can be
//! reported with real source excerpts.
//!
//! Source files are immutable after construction and shared as
//! `Arc<SourceFile>`; the resolution engine never mutates them.

pub mod ast;
pub mod builder;
pub mod name;


pub use ast::{
    ClassKind, ClassNode, DeclId, DeclRef, DeclarationKind, DeclarationNode, FileId, FunctionNode,
    ImportDirective, Modality, Modifiers, Parameter, PropertyNode, SourceFile, TypeReference,
    Visibility,
};
pub use builder::{ClassBuilder, FunctionBuilder, SourceFileBuilder};
pub use name::{FqName, Name};

// The span type is owned by the diagnostics crate so both layers agree on it.
pub use opal_compiler_diagnostics::Span;
