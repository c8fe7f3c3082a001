//! # Diagnostic System for Lazy Resolution
//!
//! Diagnostic infrastructure for reporting resolution errors, warnings, and
//! hints. Resolution-level conditions (cycles, unresolved supertypes) are
//! recorded here against the offending declaration and never abort the
//! analysis session; callers decide how to react based on severity.

mod diagnostics;
mod reporting;
mod span;

pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollection, DiagnosticSeverity};
pub use reporting::build_diagnostic_message;
pub use span::Span;
