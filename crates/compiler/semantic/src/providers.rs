//! # Declaration Providers
//!
//! The per-container abstraction answering "what is declared here". A
//! provider wraps a package-level or class-level slice of the
//! [`DeclarationIndex`] and is handed out by [`DeclarationProviderFactory`], which
//! decides whether a package exists at all (absence is a normal outcome, not
//! an error) and guards class-level requests against containers this session
//! never indexed.
//!
//! Providers are memoized weakly: IDE sessions touch many transient
//! containers, and a reclaimed provider is cheap to rebuild from the index.

use std::sync::Arc;

use indexmap::IndexMap;
use opal_compiler_storage::{ReferenceKind, StorageManager};
use opal_compiler_syntax::{DeclRef, DeclarationKind, FqName, Name};

use crate::errors::ResolveError;
use crate::index::DeclarationIndex;
use opal_compiler_storage::MemoizedFunction;

/// Identity of a class-like container as seen by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassInfo {
    /// Fully-qualified name of the class itself.
    pub fq_name: FqName,
    /// The package the class's file declares.
    pub package: FqName,
    /// The class declaration node.
    pub decl: DeclRef,
}

/// Common surface of package- and class-level providers.
pub trait DeclarationProvider: Send + Sync {
    /// All declarations with the given simple name, in source order.
    fn declarations(&self, name: &Name) -> Vec<DeclRef>;

    /// Every declared simple name, in first-encountered order.
    fn all_declared_names(&self) -> Vec<Name>;
}

/// Answers declaration queries for one package.
#[derive(Debug)]
pub struct PackageDeclarationProvider {
    index: Arc<DeclarationIndex>,
    fq_name: FqName,
}

impl PackageDeclarationProvider {
    fn new(index: Arc<DeclarationIndex>, fq_name: FqName) -> Self {
        Self { index, fq_name }
    }

    pub fn fq_name(&self) -> &FqName {
        &self.fq_name
    }

    /// True if no file declares this package directly (it exists only as a
    /// synthesized ancestor).
    pub fn is_empty(&self) -> bool {
        self.index
            .package_entry(&self.fq_name)
            .is_none_or(|entry| entry.files().is_empty())
    }

    pub fn has_sub_package(&self, name: &Name) -> bool {
        self.index
            .package_entry(&self.fq_name)
            .is_some_and(|entry| entry.has_sub_package(name))
    }

    pub fn sub_package_names(&self) -> Vec<Name> {
        self.index
            .package_entry(&self.fq_name)
            .map(|entry| entry.sub_package_names().cloned().collect())
            .unwrap_or_default()
    }
}

impl DeclarationProvider for PackageDeclarationProvider {
    fn declarations(&self, name: &Name) -> Vec<DeclRef> {
        self.index
            .package_entry(&self.fq_name)
            .map(|entry| entry.declarations(name).to_vec())
            .unwrap_or_default()
    }

    fn all_declared_names(&self) -> Vec<Name> {
        self.index
            .package_entry(&self.fq_name)
            .map(|entry| entry.all_declared_names().cloned().collect())
            .unwrap_or_default()
    }
}

/// Answers declaration queries for the body of one class.
#[derive(Debug)]
pub struct ClassDeclarationProvider {
    class: DeclRef,
    members: IndexMap<Name, Vec<DeclRef>>,
}

impl ClassDeclarationProvider {
    fn new(index: &DeclarationIndex, class: DeclRef) -> Self {
        let file = index.file(class.file);
        let node = file
            .declaration(class.decl)
            .kind
            .as_class()
            .expect("class provider requested for a class declaration");

        let mut members: IndexMap<Name, Vec<DeclRef>> = IndexMap::new();
        for &member in &node.members {
            let name = file.declaration(member).name().clone();
            members.entry(name).or_default().push(DeclRef {
                file: class.file,
                decl: member,
            });
        }
        Self { class, members }
    }

    pub fn class(&self) -> DeclRef {
        self.class
    }
}

impl DeclarationProvider for ClassDeclarationProvider {
    fn declarations(&self, name: &Name) -> Vec<DeclRef> {
        self.members.get(name).cloned().unwrap_or_default()
    }

    fn all_declared_names(&self) -> Vec<Name> {
        self.members.keys().cloned().collect()
    }
}

/// Maps container identities to declaration providers.
pub struct DeclarationProviderFactory {
    index: Arc<DeclarationIndex>,
    package_providers: MemoizedFunction<FqName, PackageDeclarationProvider>,
    class_providers: MemoizedFunction<DeclRef, ClassDeclarationProvider>,
}

impl DeclarationProviderFactory {
    pub fn new(storage: &StorageManager, index: Arc<DeclarationIndex>) -> Self {
        let package_providers = storage.create_memoized_function(
            "package-declaration-providers",
            ReferenceKind::Weak,
            {
                let index = Arc::clone(&index);
                move |fq_name: &FqName| {
                    PackageDeclarationProvider::new(Arc::clone(&index), fq_name.clone())
                }
            },
        );
        let class_providers = storage.create_memoized_function(
            "class-declaration-providers",
            ReferenceKind::Weak,
            {
                let index = Arc::clone(&index);
                move |class: &DeclRef| ClassDeclarationProvider::new(&index, *class)
            },
        );
        Self {
            index,
            package_providers,
            class_providers,
        }
    }

    pub fn index(&self) -> &Arc<DeclarationIndex> {
        &self.index
    }

    /// The provider for a package, or `None` if the package was never
    /// declared. Synthesized ancestors are present but empty.
    pub fn package_provider(&self, fq_name: &FqName) -> Option<Arc<PackageDeclarationProvider>> {
        if !self.index.is_declared_package(fq_name) {
            return None;
        }
        let provider = self
            .package_providers
            .invoke(fq_name.clone())
            .expect("package provider construction does not recurse");
        Some(provider)
    }

    /// The provider for a class body. Fails when the class's package was
    /// never indexed here, which signals a caller mixing up sessions.
    pub fn class_provider(
        &self,
        info: &ClassInfo,
    ) -> Result<Arc<ClassDeclarationProvider>, ResolveError> {
        if !self.index.is_declared_package(&info.package) {
            return Err(ResolveError::UnknownContainer {
                fq_name: info.fq_name.clone(),
            });
        }
        let provider = self
            .class_providers
            .invoke(info.decl)
            .expect("class provider construction does not recurse");
        Ok(provider)
    }

    /// Every declared package in deterministic first-encountered order.
    pub fn all_declared_packages(&self) -> Vec<FqName> {
        self.index.all_declared_packages()
    }
}

impl std::fmt::Debug for DeclarationProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarationProviderFactory")
            .field("packages", &self.index.all_declared_packages().len())
            .finish()
    }
}

/// Filters a declaration list down to class nodes.
pub(crate) fn class_declarations(
    index: &DeclarationIndex,
    declarations: &[DeclRef],
) -> Vec<DeclRef> {
    declarations
        .iter()
        .copied()
        .filter(|decl| {
            matches!(
                index.file(decl.file).declaration(decl.decl).kind,
                DeclarationKind::Class(_)
            )
        })
        .collect()
}
