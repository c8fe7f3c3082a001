//! Hard failures of the resolution engine.
//!
//! Resolution-level conditions (unresolved names, inheritance cycles) are
//! recorded as diagnostics and never abort the session. The variants here are
//! different: they either signal a caller bug (`UnknownContainer`,
//! `LocalDeclaration`), a lifecycle violation (`Discarded`), or carry a
//! storage-level cycle upward to the point that turns it into a diagnostic.

use opal_compiler_storage::CycleError;
use opal_compiler_syntax::{DeclRef, FqName};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A lazy computation re-entered itself. Contained by the supertype
    /// machinery; seeing this at an outer boundary means a new kind of
    /// recursive dependency was introduced.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// A class-level provider was requested for a class whose package was
    /// never indexed by this session. Guards against cross-session leakage.
    #[error("unknown container `{fq_name}`: its package was never indexed by this session")]
    UnknownContainer { fq_name: FqName },

    /// A resolution scope was requested for a declaration nested inside a
    /// function body or property initializer; those are resolved through the
    /// statement-level machinery, not this engine.
    #[error("declaration {decl:?} is local; body-level declarations are not resolved here")]
    LocalDeclaration { decl: DeclRef },

    /// The session was discarded; no further operations are accepted.
    #[error("analysis session has been discarded")]
    Discarded,
}

impl ResolveError {
    pub const fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}
