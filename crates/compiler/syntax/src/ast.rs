//! Declaration nodes and source files.
//!
//! A [`SourceFile`] owns an arena of [`DeclarationNode`]s indexed by
//! [`DeclId`]; nodes reference their lexical parent, which is what the scope
//! provider walks when computing a declaration's resolution scope.

use std::fmt;

use index_vec::IndexVec;
use opal_compiler_diagnostics::Span;

use crate::name::{FqName, Name};

index_vec::define_index_type! {
    /// A unique ID for a source file within an analysis session
    pub struct FileId = u32;

    MAX_INDEX = u32::MAX as usize;
}

index_vec::define_index_type! {
    /// A unique ID for a declaration within a file
    pub struct DeclId = u32;

    MAX_INDEX = u32::MAX as usize;
}

/// Session-wide identity of a declaration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclRef {
    pub file: FileId,
    pub decl: DeclId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Modality {
    #[default]
    Final,
    Open,
    Abstract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub visibility: Visibility,
    pub modality: Modality,
}

/// A (possibly qualified) reference to a type, as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    pub segments: Vec<Name>,
    pub span: Span,
}

impl TypeReference {
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    Interface,
    Object,
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "class"),
            Self::Interface => write!(f, "interface"),
            Self::Object => write!(f, "object"),
        }
    }
}

/// A value parameter as written (primary constructor or function parameter).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: Name,
    pub type_ref: TypeReference,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassNode {
    pub name: Name,
    pub kind: ClassKind,
    pub modifiers: Modifiers,
    pub type_parameters: Vec<Name>,
    pub constructor_parameters: Vec<Parameter>,
    pub supertypes: Vec<TypeReference>,
    /// Member declarations, in source order.
    pub members: Vec<DeclId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionNode {
    pub name: Name,
    pub modifiers: Modifiers,
    pub parameters: Vec<Parameter>,
    /// `None` means the unit type.
    pub return_type: Option<TypeReference>,
    pub has_body: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyNode {
    pub name: Name,
    pub modifiers: Modifiers,
    pub type_ref: Option<TypeReference>,
    pub has_initializer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class(ClassNode),
    Function(FunctionNode),
    Property(PropertyNode),
}

impl DeclarationKind {
    pub const fn as_class(&self) -> Option<&ClassNode> {
        match self {
            Self::Class(node) => Some(node),
            _ => None,
        }
    }

    pub const fn as_function(&self) -> Option<&FunctionNode> {
        match self {
            Self::Function(node) => Some(node),
            _ => None,
        }
    }

    pub const fn as_property(&self) -> Option<&PropertyNode> {
        match self {
            Self::Property(node) => Some(node),
            _ => None,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(node) => write!(f, "{}", node.kind),
            Self::Function(_) => write!(f, "function"),
            Self::Property(_) => write!(f, "property"),
        }
    }
}

/// A syntax subtree representing one declaration.
///
/// Identity is structural: a node is identified by its position in the owning
/// file's arena, never by content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclarationNode {
    /// Lexically enclosing declaration, `None` for top-level nodes.
    pub parent: Option<DeclId>,
    pub span: Span,
    pub name_span: Span,
    pub kind: DeclarationKind,
}

impl DeclarationNode {
    pub fn name(&self) -> &Name {
        match &self.kind {
            DeclarationKind::Class(node) => &node.name,
            DeclarationKind::Function(node) => &node.name,
            DeclarationKind::Property(node) => &node.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportDirective {
    pub path: Vec<Name>,
    pub is_wildcard: bool,
    pub alias: Option<Name>,
    pub span: Span,
}

impl ImportDirective {
    /// The simple name this directive binds; `None` for wildcard imports.
    pub fn imported_name(&self) -> Option<&Name> {
        if self.is_wildcard {
            return None;
        }
        self.alias.as_ref().or_else(|| self.path.last())
    }

    pub fn to_dotted(&self) -> String {
        self.path.join(".")
    }
}

/// An immutable parsed source file.
#[derive(Debug)]
pub struct SourceFile {
    name: String,
    package: FqName,
    imports: Vec<ImportDirective>,
    declarations: IndexVec<DeclId, DeclarationNode>,
    top_level: Vec<DeclId>,
    text: String,
}

impl SourceFile {
    pub(crate) fn new(
        name: String,
        package: FqName,
        imports: Vec<ImportDirective>,
        declarations: IndexVec<DeclId, DeclarationNode>,
        top_level: Vec<DeclId>,
        text: String,
    ) -> Self {
        Self {
            name,
            package,
            imports,
            declarations,
            top_level,
            text,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The package qualifier this file declares its contents into.
    pub fn package(&self) -> &FqName {
        &self.package
    }

    pub fn imports(&self) -> &[ImportDirective] {
        &self.imports
    }

    /// The canonical textual rendering node spans index into.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn declaration(&self, id: DeclId) -> &DeclarationNode {
        &self.declarations[id]
    }

    /// Top-level declarations in source order.
    pub fn top_level_declarations(&self) -> impl Iterator<Item = (DeclId, &DeclarationNode)> {
        self.top_level.iter().map(|&id| (id, &self.declarations[id]))
    }

    /// The lexically enclosing declaration of `id`, if any.
    pub fn lexical_parent(&self, id: DeclId) -> Option<DeclId> {
        self.declarations[id].parent
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }
}
