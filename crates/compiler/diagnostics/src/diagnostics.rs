//! Diagnostic model shared by the resolution engine and its consumers.

use std::fmt;

use ariadne::ReportKind;

use crate::span::Span;

/// A diagnostic message from declaration resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub code: DiagnosticCode,
    pub message: String,
    /// Name of the file this diagnostic belongs to
    pub file_name: String,
    /// Source span where this diagnostic applies
    pub span: Span,
    /// Optional related spans for additional context
    pub related_spans: Vec<(Span, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<DiagnosticSeverity> for ReportKind<'static> {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => Self::Error,
            DiagnosticSeverity::Warning => Self::Warning,
            DiagnosticSeverity::Info => Self::Advice,
            DiagnosticSeverity::Hint => Self::Advice,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Hint => write!(f, "hint"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    // Resolution errors (1000-1999)
    UnresolvedReference,
    UnresolvedSupertype,
    CyclicInheritance,
    UnresolvedImport,
    ConflictingDeclaration,
}

impl From<DiagnosticCode> for u32 {
    fn from(code: DiagnosticCode) -> Self {
        match code {
            DiagnosticCode::UnresolvedReference => 1001,
            DiagnosticCode::UnresolvedSupertype => 1002,
            DiagnosticCode::CyclicInheritance => 1003,
            DiagnosticCode::UnresolvedImport => 1004,
            DiagnosticCode::ConflictingDeclaration => 1005,
        }
    }
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            code,
            message,
            file_name: String::new(),
            span: Span::default(),
            related_spans: Vec::new(),
        }
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: String) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            code,
            message,
            file_name: String::new(),
            span: Span::default(),
            related_spans: Vec::new(),
        }
    }

    /// Add location information to this diagnostic
    pub fn with_location(mut self, file_name: impl Into<String>, span: Span) -> Self {
        self.file_name = file_name.into();
        self.span = span;
        self
    }

    /// Add a related span with context message
    pub fn with_related_span(mut self, span: Span, message: String) -> Self {
        self.related_spans.push((span, message));
        self
    }

    /// Convenience method for unresolved reference errors
    pub fn unresolved_reference(name: &str) -> Self {
        Self::error(
            DiagnosticCode::UnresolvedReference,
            format!("Unresolved reference '{name}'"),
        )
    }

    /// Convenience method for unresolved supertype errors
    pub fn unresolved_supertype(name: &str) -> Self {
        Self::error(
            DiagnosticCode::UnresolvedSupertype,
            format!("Unresolved supertype '{name}'"),
        )
    }

    /// Convenience method for inheritance cycle errors
    pub fn cyclic_inheritance(name: &str) -> Self {
        Self::error(
            DiagnosticCode::CyclicInheritance,
            format!("There is a cycle in the inheritance hierarchy of '{name}'"),
        )
    }

    /// Convenience method for unresolved import errors
    pub fn unresolved_import(path: &str) -> Self {
        Self::error(
            DiagnosticCode::UnresolvedImport,
            format!("Unresolved import '{path}'"),
        )
    }

    /// Convenience method for conflicting declaration warnings
    pub fn conflicting_declaration(name: &str) -> Self {
        Self::warning(
            DiagnosticCode::ConflictingDeclaration,
            format!("Conflicting declarations of '{name}'"),
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        write!(f, " (at {}:{})", self.file_name, self.span)?;
        for (span, message) in &self.related_spans {
            write!(f, "\n  note: {message} (at {span})")?;
        }
        Ok(())
    }
}

/// Collection of diagnostics accumulated during resolution
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the collection
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add multiple diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Get all diagnostics in recording order
    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Get only error diagnostics
    pub fn errors(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect()
    }

    /// Get only warning diagnostics
    pub fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::Warning)
            .collect()
    }

    /// Get diagnostics with a given code
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.code == code).collect()
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    /// Get the total number of diagnostics
    pub const fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}
