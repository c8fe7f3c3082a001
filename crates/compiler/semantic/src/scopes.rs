//! # Lookup Scopes
//!
//! Ordered name-lookup tables. Every resolution context is a [`ChainedScope`]
//! over primitive scopes (package members, class members, type parameters,
//! constructor parameters, imports) with fixed precedence:
//!
//! - single-name lookups take the first delegate that answers;
//! - "all descriptors" queries union the delegates, keeping the first
//!   occurrence of each descriptor.
//!
//! A file's scope chain is `[own package, root package, explicit imports,
//! default imports]`. File scopes are memoized weakly; rebuilding one from the
//! index is cheap, and long IDE sessions touch many files once.

use std::sync::{Arc, Weak};

use opal_compiler_diagnostics::Diagnostic;
use opal_compiler_storage::{LazyValue, MemoizedFunction, ReferenceKind, StorageManager};
use opal_compiler_syntax::{DeclRef, DeclarationKind, FileId, FqName, Name, SourceFile};
use rustc_hash::FxHashSet;

use crate::descriptors::{
    Classifier, Descriptor, FunctionDescriptor, PropertyDescriptor, TypeParameterDescriptor,
    ValueParameterDescriptor,
};
use crate::errors::ResolveError;
use crate::providers::{ClassDeclarationProvider, DeclarationProvider, PackageDeclarationProvider};
use crate::session::{upgrade_session, ResolveSession};

bitflags::bitflags! {
    /// Selects which descriptor kinds an "all descriptors" query returns.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorKindFilter: u8 {
        const CLASSIFIERS = 1 << 0;
        const FUNCTIONS = 1 << 1;
        const PROPERTIES = 1 << 2;
        const VALUE_PARAMETERS = 1 << 3;
        const ALL = Self::CLASSIFIERS.bits()
            | Self::FUNCTIONS.bits()
            | Self::PROPERTIES.bits()
            | Self::VALUE_PARAMETERS.bits();
    }
}

/// A name-lookup table. Single-name queries return descriptors in declaration
/// order; enumeration follows first-encountered order.
pub trait LookupScope: Send + Sync + std::fmt::Debug {
    fn classifier(&self, name: &Name) -> Option<Classifier>;

    fn functions(&self, name: &Name) -> Vec<Arc<FunctionDescriptor>>;

    fn properties(&self, name: &Name) -> Vec<Arc<PropertyDescriptor>>;

    fn value_parameter(&self, name: &Name) -> Option<Arc<ValueParameterDescriptor>> {
        let _ = name;
        None
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor>;

    fn all_descriptors(&self) -> Vec<Descriptor> {
        self.descriptors_filtered(DescriptorKindFilter::ALL)
    }
}

/// Delegating scope with first-delegate-wins precedence.
#[derive(Debug)]
pub struct ChainedScope {
    debug_name: &'static str,
    delegates: Vec<Arc<dyn LookupScope>>,
}

impl ChainedScope {
    pub fn new(debug_name: &'static str, delegates: Vec<Arc<dyn LookupScope>>) -> Self {
        Self {
            debug_name,
            delegates,
        }
    }

    pub fn debug_name(&self) -> &'static str {
        self.debug_name
    }

    pub fn delegates(&self) -> &[Arc<dyn LookupScope>] {
        &self.delegates
    }
}

impl LookupScope for ChainedScope {
    fn classifier(&self, name: &Name) -> Option<Classifier> {
        self.delegates.iter().find_map(|scope| scope.classifier(name))
    }

    fn functions(&self, name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        self.delegates
            .iter()
            .map(|scope| scope.functions(name))
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn properties(&self, name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        self.delegates
            .iter()
            .map(|scope| scope.properties(name))
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn value_parameter(&self, name: &Name) -> Option<Arc<ValueParameterDescriptor>> {
        self.delegates
            .iter()
            .find_map(|scope| scope.value_parameter(name))
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        let mut seen = FxHashSet::default();
        let mut result = Vec::new();
        for scope in &self.delegates {
            for descriptor in scope.descriptors_filtered(filter) {
                if seen.insert(descriptor.ptr_key()) {
                    result.push(descriptor);
                }
            }
        }
        result
    }
}

/// Top-level declarations of one package, materialized as descriptors.
#[derive(Debug)]
pub struct PackageMemberScope {
    session: Weak<ResolveSession>,
    fq_name: FqName,
    provider: Arc<PackageDeclarationProvider>,
}

impl PackageMemberScope {
    pub(crate) fn new(
        session: Weak<ResolveSession>,
        fq_name: FqName,
        provider: Arc<PackageDeclarationProvider>,
    ) -> Self {
        Self {
            session,
            fq_name,
            provider,
        }
    }

    pub fn fq_name(&self) -> &FqName {
        &self.fq_name
    }
}

impl LookupScope for PackageMemberScope {
    fn classifier(&self, name: &Name) -> Option<Classifier> {
        let session = upgrade_session(&self.session);
        first_class(&session, &self.provider.declarations(name))
    }

    fn functions(&self, name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        let session = upgrade_session(&self.session);
        functions_of(&session, &self.provider.declarations(name))
    }

    fn properties(&self, name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        let session = upgrade_session(&self.session);
        properties_of(&session, &self.provider.declarations(name))
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        let session = upgrade_session(&self.session);
        let mut result = Vec::new();
        for name in self.provider.all_declared_names() {
            collect_filtered(&session, &self.provider.declarations(&name), filter, &mut result);
        }
        result
    }
}

/// Directly declared members of one class body. Shallow: supertype members
/// belong to the inheritance-aware member scope of a later resolution stage.
#[derive(Debug)]
pub struct ClassMemberScope {
    session: Weak<ResolveSession>,
    class: DeclRef,
    provider: Arc<ClassDeclarationProvider>,
}

impl ClassMemberScope {
    pub(crate) fn new(
        session: Weak<ResolveSession>,
        class: DeclRef,
        provider: Arc<ClassDeclarationProvider>,
    ) -> Self {
        Self {
            session,
            class,
            provider,
        }
    }

    pub fn class(&self) -> DeclRef {
        self.class
    }
}

impl LookupScope for ClassMemberScope {
    fn classifier(&self, name: &Name) -> Option<Classifier> {
        let session = upgrade_session(&self.session);
        first_class(&session, &self.provider.declarations(name))
    }

    fn functions(&self, name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        let session = upgrade_session(&self.session);
        functions_of(&session, &self.provider.declarations(name))
    }

    fn properties(&self, name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        let session = upgrade_session(&self.session);
        properties_of(&session, &self.provider.declarations(name))
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        let session = upgrade_session(&self.session);
        let mut result = Vec::new();
        for name in self.provider.all_declared_names() {
            collect_filtered(&session, &self.provider.declarations(&name), filter, &mut result);
        }
        result
    }
}

/// A class's type parameters.
#[derive(Debug)]
pub struct TypeParameterScope {
    parameters: Arc<Vec<Arc<TypeParameterDescriptor>>>,
}

impl TypeParameterScope {
    pub(crate) fn new(parameters: Arc<Vec<Arc<TypeParameterDescriptor>>>) -> Self {
        Self { parameters }
    }
}

impl LookupScope for TypeParameterScope {
    fn classifier(&self, name: &Name) -> Option<Classifier> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == *name)
            .map(|parameter| Classifier::TypeParameter(Arc::clone(parameter)))
    }

    fn functions(&self, _name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        Vec::new()
    }

    fn properties(&self, _name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        Vec::new()
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        if !filter.contains(DescriptorKindFilter::CLASSIFIERS) {
            return Vec::new();
        }
        self.parameters
            .iter()
            .map(|parameter| Descriptor::TypeParameter(Arc::clone(parameter)))
            .collect()
    }
}

/// A class's primary constructor parameters, visible to property initializers.
#[derive(Debug)]
pub struct ConstructorParameterScope {
    parameters: Arc<Vec<Arc<ValueParameterDescriptor>>>,
}

impl ConstructorParameterScope {
    pub(crate) fn new(parameters: Arc<Vec<Arc<ValueParameterDescriptor>>>) -> Self {
        Self { parameters }
    }
}

impl LookupScope for ConstructorParameterScope {
    fn classifier(&self, _name: &Name) -> Option<Classifier> {
        None
    }

    fn functions(&self, _name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        Vec::new()
    }

    fn properties(&self, _name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        Vec::new()
    }

    fn value_parameter(&self, name: &Name) -> Option<Arc<ValueParameterDescriptor>> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == *name)
            .map(Arc::clone)
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        if !filter.contains(DescriptorKindFilter::VALUE_PARAMETERS) {
            return Vec::new();
        }
        self.parameters
            .iter()
            .map(|parameter| Descriptor::ValueParameter(Arc::clone(parameter)))
            .collect()
    }
}

/// The explicit imports of one file, resolved eagerly when the file scope is
/// built. Single imports shadow wildcard imports. Unresolvable directives are
/// reported and then ignored.
#[derive(Debug)]
pub struct ExplicitImportsScope {
    singles: Vec<(Name, Vec<Descriptor>)>,
    wildcards: Vec<Arc<PackageMemberScope>>,
}

impl ExplicitImportsScope {
    pub(crate) fn build(session: &Arc<ResolveSession>, file: &Arc<SourceFile>) -> Self {
        let mut singles: Vec<(Name, Vec<Descriptor>)> = Vec::new();
        let mut wildcards = Vec::new();

        for import in file.imports() {
            if import.is_wildcard {
                let package = FqName::from_segments(import.path.clone());
                match session.package_scope(&package) {
                    Some(scope) => wildcards.push(scope),
                    None => session.report(
                        Diagnostic::unresolved_import(&package.to_dotted())
                            .with_location(file.name(), import.span),
                    ),
                }
                continue;
            }

            let (member, package_path) = import
                .path
                .split_last()
                .expect("import directive has at least one segment");
            let package = FqName::from_segments(package_path.to_vec());
            let targets = session
                .factory()
                .package_provider(&package)
                .map(|provider| provider.declarations(member))
                .unwrap_or_default();
            if targets.is_empty() {
                session.report(
                    Diagnostic::unresolved_import(&FqName::from_segments(import.path.clone()).to_dotted())
                        .with_location(file.name(), import.span),
                );
                continue;
            }
            let binding = import
                .imported_name()
                .expect("single import binds a name")
                .clone();
            let mut descriptors = Vec::new();
            collect_filtered(session, &targets, DescriptorKindFilter::ALL, &mut descriptors);
            singles.push((binding, descriptors));
        }

        Self { singles, wildcards }
    }

    fn single(&self, name: &Name) -> Option<&[Descriptor]> {
        self.singles
            .iter()
            .find(|(binding, _)| binding == name)
            .map(|(_, descriptors)| descriptors.as_slice())
    }
}

impl LookupScope for ExplicitImportsScope {
    fn classifier(&self, name: &Name) -> Option<Classifier> {
        if let Some(descriptors) = self.single(name) {
            return descriptors.iter().find_map(|descriptor| match descriptor {
                Descriptor::Class(class) => Some(Classifier::Class(Arc::clone(class))),
                _ => None,
            });
        }
        self.wildcards.iter().find_map(|scope| scope.classifier(name))
    }

    fn functions(&self, name: &Name) -> Vec<Arc<FunctionDescriptor>> {
        if let Some(descriptors) = self.single(name) {
            return descriptors
                .iter()
                .filter_map(|descriptor| match descriptor {
                    Descriptor::Function(function) => Some(Arc::clone(function)),
                    _ => None,
                })
                .collect();
        }
        self.wildcards
            .iter()
            .map(|scope| scope.functions(name))
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn properties(&self, name: &Name) -> Vec<Arc<PropertyDescriptor>> {
        if let Some(descriptors) = self.single(name) {
            return descriptors
                .iter()
                .filter_map(|descriptor| match descriptor {
                    Descriptor::Property(property) => Some(Arc::clone(property)),
                    _ => None,
                })
                .collect();
        }
        self.wildcards
            .iter()
            .map(|scope| scope.properties(name))
            .find(|found| !found.is_empty())
            .unwrap_or_default()
    }

    fn descriptors_filtered(&self, filter: DescriptorKindFilter) -> Vec<Descriptor> {
        let mut seen = FxHashSet::default();
        let mut result = Vec::new();
        for (_, descriptors) in &self.singles {
            for descriptor in descriptors {
                if matches_filter(descriptor, filter) && seen.insert(descriptor.ptr_key()) {
                    result.push(descriptor.clone());
                }
            }
        }
        for scope in &self.wildcards {
            for descriptor in scope.descriptors_filtered(filter) {
                if seen.insert(descriptor.ptr_key()) {
                    result.push(descriptor);
                }
            }
        }
        result
    }
}

/// Builds and memoizes the scope chains of the session.
#[derive(Debug)]
pub struct ScopeProvider {
    session: Weak<ResolveSession>,
    file_scopes: MemoizedFunction<FileId, ChainedScope>,
    default_imports_scope: LazyValue<ChainedScope>,
}

impl ScopeProvider {
    pub(crate) fn new(session: Weak<ResolveSession>, storage: &StorageManager) -> Self {
        let file_scopes =
            storage.create_memoized_function("file-scopes", ReferenceKind::Weak, {
                let session = session.clone();
                move |file: &FileId| build_file_scope(&upgrade_session(&session), *file)
            });
        let default_imports_scope =
            storage.create_lazy_value("default-imports-scope".to_owned(), {
                let session = session.clone();
                move || build_default_imports_scope(&upgrade_session(&session))
            });
        Self {
            session,
            file_scopes,
            default_imports_scope,
        }
    }

    /// The lexical scope of a file's top level.
    pub fn file_scope(&self, file: FileId) -> Arc<ChainedScope> {
        self.file_scopes
            .invoke(file)
            .expect("file scope construction does not recurse")
    }

    /// The scope a declaration's own headers (types, supertypes) resolve in.
    ///
    /// Top-level declarations resolve in their file scope. Class members see
    /// the class's type parameters and, except for properties, its member
    /// scope; property headers see the constructor parameters instead, so a
    /// property annotation cannot name sibling members. Declarations nested
    /// inside function bodies or initializers are rejected.
    pub fn resolution_scope_for_declaration(
        &self,
        decl: DeclRef,
    ) -> Result<Arc<dyn LookupScope>, ResolveError> {
        let session = upgrade_session(&self.session);
        let file = Arc::clone(session.file(decl.file));
        let Some(parent_id) = file.lexical_parent(decl.decl) else {
            return Ok(self.file_scope(decl.file) as Arc<dyn LookupScope>);
        };

        let parent_node = file.declaration(parent_id);
        if !matches!(parent_node.kind, DeclarationKind::Class(_)) {
            return Err(ResolveError::LocalDeclaration { decl });
        }

        let parent = DeclRef {
            file: decl.file,
            decl: parent_id,
        };
        let class = session.class_inner(parent);
        let type_parameters: Arc<dyn LookupScope> =
            Arc::new(TypeParameterScope::new(class.type_parameters()?));
        let enclosing = self.resolution_scope_for_declaration(parent)?;

        let delegates = if matches!(file.declaration(decl.decl).kind, DeclarationKind::Property(_))
        {
            let constructor: Arc<dyn LookupScope> = Arc::new(ConstructorParameterScope::new(
                class.constructor_parameters()?,
            ));
            vec![constructor, type_parameters, enclosing]
        } else {
            let members = class.member_scope()? as Arc<dyn LookupScope>;
            vec![members, type_parameters, enclosing]
        };
        Ok(Arc::new(ChainedScope::new("class-body", delegates)))
    }

    pub(crate) fn default_imports_scope(&self) -> Arc<ChainedScope> {
        self.default_imports_scope
            .get()
            .expect("default imports scope construction does not recurse")
    }
}

fn build_file_scope(session: &Arc<ResolveSession>, file_id: FileId) -> ChainedScope {
    let file = Arc::clone(session.file(file_id));
    let _span =
        tracing::trace_span!("file_scope", file = file.name(), package = %file.package()).entered();

    let mut delegates: Vec<Arc<dyn LookupScope>> = Vec::new();
    let own = session
        .package_scope(file.package())
        .expect("indexed file's package is declared");
    delegates.push(own);
    if !file.package().is_root() {
        let root = session
            .package_scope(&FqName::root())
            .expect("root package is always declared");
        delegates.push(root);
    }
    delegates.push(Arc::new(ExplicitImportsScope::build(session, &file)));
    delegates.push(session.scope_provider().default_imports_scope());

    ChainedScope::new("file", delegates)
}

fn build_default_imports_scope(session: &Arc<ResolveSession>) -> ChainedScope {
    // Configured default packages that no source file declares are skipped
    // quietly; a session without a standard library is legitimate.
    let delegates = session
        .config()
        .default_imports
        .iter()
        .filter_map(|package| session.package_scope(package))
        .map(|scope| scope as Arc<dyn LookupScope>)
        .collect();
    ChainedScope::new("default-imports", delegates)
}

// --- materialization helpers ------------------------------------------------

fn first_class(session: &Arc<ResolveSession>, declarations: &[DeclRef]) -> Option<Classifier> {
    declarations.iter().find_map(|&decl| {
        match session.file(decl.file).declaration(decl.decl).kind {
            DeclarationKind::Class(_) => Some(Classifier::Class(session.class_inner(decl))),
            _ => None,
        }
    })
}

fn functions_of(
    session: &Arc<ResolveSession>,
    declarations: &[DeclRef],
) -> Vec<Arc<FunctionDescriptor>> {
    declarations
        .iter()
        .filter(|decl| {
            matches!(
                session.file(decl.file).declaration(decl.decl).kind,
                DeclarationKind::Function(_)
            )
        })
        .map(|&decl| session.function_inner(decl))
        .collect()
}

fn properties_of(
    session: &Arc<ResolveSession>,
    declarations: &[DeclRef],
) -> Vec<Arc<PropertyDescriptor>> {
    declarations
        .iter()
        .filter(|decl| {
            matches!(
                session.file(decl.file).declaration(decl.decl).kind,
                DeclarationKind::Property(_)
            )
        })
        .map(|&decl| session.property_inner(decl))
        .collect()
}

fn collect_filtered(
    session: &Arc<ResolveSession>,
    declarations: &[DeclRef],
    filter: DescriptorKindFilter,
    out: &mut Vec<Descriptor>,
) {
    for &decl in declarations {
        let descriptor = match session.file(decl.file).declaration(decl.decl).kind {
            DeclarationKind::Class(_) if filter.contains(DescriptorKindFilter::CLASSIFIERS) => {
                Descriptor::Class(session.class_inner(decl))
            }
            DeclarationKind::Function(_) if filter.contains(DescriptorKindFilter::FUNCTIONS) => {
                Descriptor::Function(session.function_inner(decl))
            }
            DeclarationKind::Property(_) if filter.contains(DescriptorKindFilter::PROPERTIES) => {
                Descriptor::Property(session.property_inner(decl))
            }
            _ => continue,
        };
        out.push(descriptor);
    }
}

fn matches_filter(descriptor: &Descriptor, filter: DescriptorKindFilter) -> bool {
    match descriptor {
        Descriptor::Class(_) | Descriptor::TypeParameter(_) => {
            filter.contains(DescriptorKindFilter::CLASSIFIERS)
        }
        Descriptor::Function(_) => filter.contains(DescriptorKindFilter::FUNCTIONS),
        Descriptor::Property(_) => filter.contains(DescriptorKindFilter::PROPERTIES),
        Descriptor::ValueParameter(_) => filter.contains(DescriptorKindFilter::VALUE_PARAMETERS),
        Descriptor::PackageFragment(_) => false,
    }
}
