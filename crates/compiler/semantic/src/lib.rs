//! # Opal Lazy Semantic Resolution
//!
//! Turns parsed syntax trees into fully resolved, typed declarations on
//! demand. The engine is built in layers:
//!
//! 1. **Declaration index**: groups top-level declarations by enclosing
//!    package and class members by enclosing class ([`index`]).
//! 2. **Declaration providers**: per-container lookup tables handed out by a
//!    factory that also synthesizes ancestor packages ([`providers`]).
//! 3. **Lazy descriptors**: typed symbol-table entries whose structural fields
//!    (supertypes, member scopes, signatures) are memoized lazy values sourced
//!    from the providers ([`descriptors`]).
//! 4. **Scopes**: ordered chains of lookup tables with fixed precedence,
//!    composed per file and per declaration context ([`scopes`]).
//! 5. **The analyzer facade**: a [`session::ResolveSession`] tying the layers
//!    together, with `force_resolve_all` as the escape hatch for consumers
//!    that cannot tolerate laziness (multi-threaded codegen, IDE indexing).
//!
//! ## Laziness contract
//!
//! Reading one structural field triggers only the resolution that field needs.
//! Once read, a field's value is referentially stable for the session's
//! lifetime. Inheritance cycles are detected at the point of cycle closure and
//! surfaced as diagnostics on the offending declaration; the rest of the model
//! stays queryable.

pub mod descriptors;
pub mod errors;
mod force;
pub mod index;
pub mod providers;
pub mod scopes;
pub mod session;

#[cfg(test)]
mod index_tests;
#[cfg(test)]
mod resolve_tests;
#[cfg(test)]
mod scope_tests;

pub use descriptors::{
    ClassDescriptor, Classifier, Descriptor, FunctionDescriptor, FunctionSignature,
    PackageFragmentDescriptor, PropertyDescriptor, ResolvedType, Supertype,
    TypeParameterDescriptor, ValueParameterDescriptor,
};
pub use errors::ResolveError;
pub use index::DeclarationIndex;
pub use providers::{
    ClassDeclarationProvider, ClassInfo, DeclarationProvider, DeclarationProviderFactory,
    PackageDeclarationProvider,
};
pub use scopes::{ChainedScope, DescriptorKindFilter, LookupScope, ScopeProvider};
pub use session::{AnalyzerConfig, BindingTrace, CodeAnalyzer, ResolveSession, SessionState};
