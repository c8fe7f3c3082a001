//! # Lazy Descriptors
//!
//! Typed symbol-table entries for classes, functions, properties and package
//! fragments. Scalar fields (names, kinds, modifiers) are set eagerly at
//! construction; structural fields (supertypes, member scopes, signatures)
//! are independent memoized lazy values, so accessing one triggers only the
//! resolution that value needs.
//!
//! Once read, a structural field is referentially stable: repeated reads
//! return the same `Arc`, and nothing ever mutates a published value.
//! Inheritance cycles surface while a supertype list is being computed: the
//! re-entrant read fails with a cycle error, which is converted into a
//! `CyclicInheritance` diagnostic on the declaration that closed the cycle.

use std::sync::Arc;

use opal_compiler_diagnostics::{Diagnostic, Span};
use opal_compiler_storage::LazyValue;
use opal_compiler_syntax::{ClassKind, DeclRef, FqName, Modality, Modifiers, Name, TypeReference, Visibility};

use crate::errors::ResolveError;
use crate::scopes::{ChainedScope, ClassMemberScope, LookupScope, PackageMemberScope, TypeParameterScope};
use crate::session::{upgrade_session, ResolveSession};

/// A resolved, typed symbol-table entry of any kind.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Class(Arc<ClassDescriptor>),
    Function(Arc<FunctionDescriptor>),
    Property(Arc<PropertyDescriptor>),
    TypeParameter(Arc<TypeParameterDescriptor>),
    ValueParameter(Arc<ValueParameterDescriptor>),
    PackageFragment(Arc<PackageFragmentDescriptor>),
}

impl Descriptor {
    pub fn name(&self) -> Name {
        match self {
            Self::Class(d) => d.name.clone(),
            Self::Function(d) => d.name.clone(),
            Self::Property(d) => d.name.clone(),
            Self::TypeParameter(d) => d.name.clone(),
            Self::ValueParameter(d) => d.name.clone(),
            Self::PackageFragment(d) => d
                .fq_name
                .short_name()
                .cloned()
                .unwrap_or_else(|| Name::from("<root>")),
        }
    }

    /// Identity key for dedup in "all descriptors" queries.
    pub(crate) fn ptr_key(&self) -> usize {
        match self {
            Self::Class(d) => Arc::as_ptr(d) as usize,
            Self::Function(d) => Arc::as_ptr(d) as usize,
            Self::Property(d) => Arc::as_ptr(d) as usize,
            Self::TypeParameter(d) => Arc::as_ptr(d) as usize,
            Self::ValueParameter(d) => Arc::as_ptr(d) as usize,
            Self::PackageFragment(d) => Arc::as_ptr(d) as usize,
        }
    }
}

/// What a classifier lookup can produce.
#[derive(Debug, Clone)]
pub enum Classifier {
    Class(Arc<ClassDescriptor>),
    TypeParameter(Arc<TypeParameterDescriptor>),
}

impl Classifier {
    pub fn name(&self) -> &Name {
        match self {
            Self::Class(d) => &d.name,
            Self::TypeParameter(d) => &d.name,
        }
    }
}

impl From<Classifier> for ResolvedType {
    fn from(classifier: Classifier) -> Self {
        match classifier {
            Classifier::Class(d) => Self::Class(d),
            Classifier::TypeParameter(d) => Self::TypeParameter(d),
        }
    }
}

/// Outcome of resolving a written type reference.
///
/// Rich typing is out of scope here; what matters is the identity of the
/// resolved classifier.
#[derive(Debug, Clone)]
pub enum ResolvedType {
    Class(Arc<ClassDescriptor>),
    TypeParameter(Arc<TypeParameterDescriptor>),
    /// The implicit unit type (no return type written).
    Unit,
    /// No annotation and no way to tell without inference.
    Unknown,
    /// The written path, which did not resolve.
    Error(String),
}

impl ResolvedType {
    pub const fn as_class(&self) -> Option<&Arc<ClassDescriptor>> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// One entry of a class's resolved supertype list.
#[derive(Debug, Clone)]
pub struct Supertype {
    /// Span of the written reference, for diagnostics.
    pub span: Span,
    pub resolved: ResolvedType,
}

impl Supertype {
    pub const fn class(&self) -> Option<&Arc<ClassDescriptor>> {
        self.resolved.as_class()
    }
}

#[derive(Debug)]
pub struct TypeParameterDescriptor {
    pub name: Name,
    pub index: usize,
    /// The class declaring this parameter.
    pub container: DeclRef,
}

#[derive(Debug)]
pub struct ValueParameterDescriptor {
    pub name: Name,
    pub index: usize,
    pub resolved_type: ResolvedType,
}

/// A class, interface or object declaration, resolved on demand.
#[derive(Debug)]
pub struct ClassDescriptor {
    decl: DeclRef,
    name: Name,
    fq_name: FqName,
    kind: ClassKind,
    modifiers: Modifiers,
    type_parameters: LazyValue<Vec<Arc<TypeParameterDescriptor>>>,
    constructor_parameters: LazyValue<Vec<Arc<ValueParameterDescriptor>>>,
    supertypes: LazyValue<Vec<Supertype>>,
    member_scope: LazyValue<ClassMemberScope>,
}

impl ClassDescriptor {
    pub(crate) fn new(session: &Arc<ResolveSession>, decl: DeclRef) -> Self {
        let info = session.class_info(decl);
        let file = session.file(decl.file);
        let node = file
            .declaration(decl.decl)
            .kind
            .as_class()
            .expect("class descriptor requested for a class node");
        let name = node.name.clone();
        let kind = node.kind;
        let modifiers = node.modifiers;

        let storage = session.storage();
        let weak = Arc::downgrade(session);
        let fq = &info.fq_name;

        let type_parameters = storage.create_lazy_value(format!("type parameters of {fq}"), {
            let weak = weak.clone();
            move || compute_type_parameters(&upgrade_session(&weak), decl)
        });
        let constructor_parameters =
            storage.create_lazy_value(format!("constructor parameters of {fq}"), {
                let weak = weak.clone();
                move || compute_constructor_parameters(&upgrade_session(&weak), decl)
            });
        let supertypes = storage.create_lazy_value(format!("supertypes of {fq}"), {
            let weak = weak.clone();
            move || compute_supertypes(&upgrade_session(&weak), decl)
        });
        let member_scope = storage.create_lazy_value(format!("member scope of {fq}"), {
            let weak = weak.clone();
            move || compute_member_scope(&upgrade_session(&weak), decl)
        });

        Self {
            decl,
            name,
            fq_name: info.fq_name,
            kind,
            modifiers,
            type_parameters,
            constructor_parameters,
            supertypes,
            member_scope,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn fq_name(&self) -> &FqName {
        &self.fq_name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn visibility(&self) -> Visibility {
        self.modifiers.visibility
    }

    pub fn modality(&self) -> Modality {
        self.modifiers.modality
    }

    pub fn declaration(&self) -> DeclRef {
        self.decl
    }

    pub fn type_parameters(
        &self,
    ) -> Result<Arc<Vec<Arc<TypeParameterDescriptor>>>, ResolveError> {
        Ok(self.type_parameters.get()?)
    }

    pub fn constructor_parameters(
        &self,
    ) -> Result<Arc<Vec<Arc<ValueParameterDescriptor>>>, ResolveError> {
        Ok(self.constructor_parameters.get()?)
    }

    /// Resolved direct supertypes. The first read triggers resolution and, if
    /// the inheritance hierarchy is cyclic, records a diagnostic instead of
    /// failing the session.
    pub fn supertypes(&self) -> Result<Arc<Vec<Supertype>>, ResolveError> {
        Ok(self.supertypes.get()?)
    }

    pub fn member_scope(&self) -> Result<Arc<ClassMemberScope>, ResolveError> {
        Ok(self.member_scope.get()?)
    }

    /// True once every lazy field of this descriptor has been evaluated.
    pub fn is_fully_computed(&self) -> bool {
        self.type_parameters.is_computed()
            && self.constructor_parameters.is_computed()
            && self.supertypes.is_computed()
            && self.member_scope.is_computed()
    }
}

/// A function declaration, resolved on demand.
#[derive(Debug)]
pub struct FunctionDescriptor {
    decl: DeclRef,
    name: Name,
    modifiers: Modifiers,
    signature: LazyValue<FunctionSignature>,
}

#[derive(Debug)]
pub struct FunctionSignature {
    pub value_parameters: Vec<Arc<ValueParameterDescriptor>>,
    pub return_type: ResolvedType,
}

impl FunctionDescriptor {
    pub(crate) fn new(session: &Arc<ResolveSession>, decl: DeclRef) -> Self {
        let file = session.file(decl.file);
        let node = file
            .declaration(decl.decl)
            .kind
            .as_function()
            .expect("function descriptor requested for a function node");
        let name = node.name.clone();
        let modifiers = node.modifiers;

        let weak = Arc::downgrade(session);
        let signature = session
            .storage()
            .create_lazy_value(format!("signature of {name}"), {
                move || compute_signature(&upgrade_session(&weak), decl)
            });

        Self {
            decl,
            name,
            modifiers,
            signature,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.modifiers.visibility
    }

    pub fn declaration(&self) -> DeclRef {
        self.decl
    }

    pub fn signature(&self) -> Result<Arc<FunctionSignature>, ResolveError> {
        Ok(self.signature.get()?)
    }

    pub fn is_fully_computed(&self) -> bool {
        self.signature.is_computed()
    }
}

/// A property declaration, resolved on demand.
#[derive(Debug)]
pub struct PropertyDescriptor {
    decl: DeclRef,
    name: Name,
    modifiers: Modifiers,
    has_initializer: bool,
    resolved_type: LazyValue<ResolvedType>,
}

impl PropertyDescriptor {
    pub(crate) fn new(session: &Arc<ResolveSession>, decl: DeclRef) -> Self {
        let file = session.file(decl.file);
        let node = file
            .declaration(decl.decl)
            .kind
            .as_property()
            .expect("property descriptor requested for a property node");
        let name = node.name.clone();
        let modifiers = node.modifiers;
        let has_initializer = node.has_initializer;

        let weak = Arc::downgrade(session);
        let resolved_type = session
            .storage()
            .create_lazy_value(format!("type of {name}"), {
                move || compute_property_type(&upgrade_session(&weak), decl)
            });

        Self {
            decl,
            name,
            modifiers,
            has_initializer,
            resolved_type,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.modifiers.visibility
    }

    pub fn declaration(&self) -> DeclRef {
        self.decl
    }

    pub fn has_initializer(&self) -> bool {
        self.has_initializer
    }

    pub fn resolved_type(&self) -> Result<Arc<ResolvedType>, ResolveError> {
        Ok(self.resolved_type.get()?)
    }

    pub fn is_fully_computed(&self) -> bool {
        self.resolved_type.is_computed()
    }
}

/// The slice of one package visible to resolution: its member scope, built
/// lazily from the package's declaration provider.
#[derive(Debug)]
pub struct PackageFragmentDescriptor {
    fq_name: FqName,
    member_scope: LazyValue<PackageMemberScope>,
}

impl PackageFragmentDescriptor {
    pub(crate) fn new(session: &Arc<ResolveSession>, fq_name: FqName) -> Self {
        let weak = Arc::downgrade(session);
        let member_scope = session
            .storage()
            .create_lazy_value(format!("member scope of package {fq_name}"), {
                let fq_name = fq_name.clone();
                move || compute_package_member_scope(&upgrade_session(&weak), fq_name.clone())
            });
        Self {
            fq_name,
            member_scope,
        }
    }

    pub fn fq_name(&self) -> &FqName {
        &self.fq_name
    }

    pub fn member_scope(&self) -> Result<Arc<PackageMemberScope>, ResolveError> {
        Ok(self.member_scope.get()?)
    }

    pub fn is_fully_computed(&self) -> bool {
        self.member_scope.is_computed()
    }
}

// --- computations -----------------------------------------------------------

fn compute_type_parameters(
    session: &Arc<ResolveSession>,
    decl: DeclRef,
) -> Vec<Arc<TypeParameterDescriptor>> {
    let file = session.file(decl.file);
    let node = file
        .declaration(decl.decl)
        .kind
        .as_class()
        .expect("type parameters computed for a class node");
    node.type_parameters
        .iter()
        .enumerate()
        .map(|(index, name)| {
            Arc::new(TypeParameterDescriptor {
                name: name.clone(),
                index,
                container: decl,
            })
        })
        .collect()
}

fn compute_constructor_parameters(
    session: &Arc<ResolveSession>,
    decl: DeclRef,
) -> Vec<Arc<ValueParameterDescriptor>> {
    let file = Arc::clone(session.file(decl.file));
    let node = file
        .declaration(decl.decl)
        .kind
        .as_class()
        .expect("constructor parameters computed for a class node");
    let scope = class_header_scope(session, decl);
    node.constructor_parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let resolved_type =
                resolve_type_or_report(session, scope.as_ref(), &parameter.type_ref, file.name());
            Arc::new(ValueParameterDescriptor {
                name: parameter.name.clone(),
                index,
                resolved_type,
            })
        })
        .collect()
}

fn compute_supertypes(session: &Arc<ResolveSession>, decl: DeclRef) -> Vec<Supertype> {
    let file = Arc::clone(session.file(decl.file));
    let node = file
        .declaration(decl.decl)
        .kind
        .as_class()
        .expect("supertypes computed for a class node");
    let _span = tracing::trace_span!("supertypes", class = %node.name).entered();

    let scope = class_header_scope(session, decl);
    let mut supertypes = Vec::with_capacity(node.supertypes.len());
    for reference in &node.supertypes {
        let resolved = resolve_type_reference(session, scope.as_ref(), reference);
        match &resolved {
            ResolvedType::Class(superclass) => {
                // Reading the resolved class's own supertype list closes
                // transitive inheritance cycles while this list is still
                // marked in-progress.
                if superclass.supertypes().is_err() {
                    session.report(
                        Diagnostic::cyclic_inheritance(&node.name)
                            .with_location(file.name(), reference.span),
                    );
                }
            }
            _ => {
                session.report(
                    Diagnostic::unresolved_supertype(&reference.to_dotted())
                        .with_location(file.name(), reference.span),
                );
            }
        }
        supertypes.push(Supertype {
            span: reference.span,
            resolved,
        });
    }
    supertypes
}

fn compute_member_scope(session: &Arc<ResolveSession>, decl: DeclRef) -> ClassMemberScope {
    let info = session.class_info(decl);
    let provider = session
        .factory()
        .class_provider(&info)
        .expect("indexed class belongs to an indexed package");
    ClassMemberScope::new(Arc::downgrade(session), decl, provider)
}

fn compute_signature(session: &Arc<ResolveSession>, decl: DeclRef) -> FunctionSignature {
    let file = Arc::clone(session.file(decl.file));
    let node = file
        .declaration(decl.decl)
        .kind
        .as_function()
        .expect("signature computed for a function node")
        .clone();
    let _span = tracing::trace_span!("signature", function = %node.name).entered();

    let scope = session
        .scope_provider()
        .resolution_scope_for_declaration(decl)
        .expect("indexed function has a resolution scope");

    let value_parameters = node
        .parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let resolved_type =
                resolve_type_or_report(session, scope.as_ref(), &parameter.type_ref, file.name());
            Arc::new(ValueParameterDescriptor {
                name: parameter.name.clone(),
                index,
                resolved_type,
            })
        })
        .collect();
    let return_type = node.return_type.as_ref().map_or(ResolvedType::Unit, |ty| {
        resolve_type_or_report(session, scope.as_ref(), ty, file.name())
    });

    FunctionSignature {
        value_parameters,
        return_type,
    }
}

fn compute_property_type(session: &Arc<ResolveSession>, decl: DeclRef) -> ResolvedType {
    let file = Arc::clone(session.file(decl.file));
    let node = file
        .declaration(decl.decl)
        .kind
        .as_property()
        .expect("property type computed for a property node");

    let Some(reference) = &node.type_ref else {
        // No annotation; inference belongs to the type checker.
        return ResolvedType::Unknown;
    };
    let scope = session
        .scope_provider()
        .resolution_scope_for_declaration(decl)
        .expect("indexed property has a resolution scope");
    resolve_type_or_report(session, scope.as_ref(), reference, file.name())
}

fn compute_package_member_scope(
    session: &Arc<ResolveSession>,
    fq_name: FqName,
) -> PackageMemberScope {
    let provider = session
        .factory()
        .package_provider(&fq_name)
        .expect("package fragment exists only for declared packages");
    PackageMemberScope::new(Arc::downgrade(session), fq_name, provider)
}

/// The scope a class header (supertypes, constructor parameters) resolves in:
/// the class's own type parameters in front of its outer resolution scope.
fn class_header_scope(session: &Arc<ResolveSession>, decl: DeclRef) -> Arc<dyn LookupScope> {
    let class = session.class_inner(decl);
    let type_parameters = class
        .type_parameters()
        .expect("type parameter list does not recurse");
    let outer = session
        .scope_provider()
        .resolution_scope_for_declaration(decl)
        .expect("indexed class has a resolution scope");
    Arc::new(ChainedScope::new(
        "class-header",
        vec![
            Arc::new(TypeParameterScope::new(type_parameters)) as Arc<dyn LookupScope>,
            outer,
        ],
    ))
}

// --- type reference resolution ----------------------------------------------

/// Resolves a written type reference against a scope.
///
/// The head segment is tried in the lexical scope first; remaining segments
/// descend through nested-class member scopes. If the head does not resolve
/// lexically, the longest leading prefix naming a declared package is
/// interpreted as an absolute package qualifier.
pub(crate) fn resolve_type_reference(
    session: &Arc<ResolveSession>,
    scope: &dyn LookupScope,
    reference: &TypeReference,
) -> ResolvedType {
    let segments = &reference.segments;
    let Some(head) = segments.first() else {
        // Embedders construct references directly; tolerate an empty one.
        return ResolvedType::Error(reference.to_dotted());
    };
    if let Some(classifier) = scope.classifier(head) {
        if let Some(resolved) = descend_nested(classifier, &segments[1..]) {
            return resolved.into();
        }
        return ResolvedType::Error(reference.to_dotted());
    }

    if segments.len() >= 2 {
        for split in (1..segments.len()).rev() {
            let package = FqName::from_segments(segments[..split].to_vec());
            let Some(package_scope) = session.package_scope(&package) else {
                continue;
            };
            if let Some(classifier) = package_scope.classifier(&segments[split]) {
                if let Some(resolved) = descend_nested(classifier, &segments[split + 1..]) {
                    return resolved.into();
                }
            }
        }
    }

    ResolvedType::Error(reference.to_dotted())
}

fn descend_nested(classifier: Classifier, rest: &[Name]) -> Option<Classifier> {
    let mut current = classifier;
    for segment in rest {
        let Classifier::Class(class) = &current else {
            // Type parameters have no nested classifiers.
            return None;
        };
        let scope = class.member_scope().ok()?;
        current = scope.classifier(segment)?;
    }
    Some(current)
}

fn resolve_type_or_report(
    session: &Arc<ResolveSession>,
    scope: &dyn LookupScope,
    reference: &TypeReference,
    file_name: &str,
) -> ResolvedType {
    let resolved = resolve_type_reference(session, scope, reference);
    if resolved.is_error() {
        session.report(
            Diagnostic::unresolved_reference(&reference.to_dotted())
                .with_location(file_name, reference.span),
        );
    }
    resolved
}
