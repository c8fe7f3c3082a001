//! # Resolve Session
//!
//! The analyzer facade. A [`ResolveSession`] owns the storage manager, the
//! declaration index, the provider factory and the scope provider, and hands
//! out lazy descriptors through memoized per-declaration caches.
//!
//! ## Lifecycle
//!
//! A session starts `PartiallyResolved`: queries trigger exactly the
//! resolution they need, on the calling thread. [`ResolveSession::force_resolve_all`]
//! walks every reachable lazy field and moves the session to `FullyResolved`,
//! after which descriptors are plain immutable data and safe to read from any
//! number of threads. [`ResolveSession::discard`] ends the session; every
//! subsequent query fails with [`ResolveError::Discarded`].
//!
//! Diagnostics accumulate in a [`BindingTrace`]. Identical diagnostics are
//! recorded once: weakly-retained scopes may be rebuilt after reclamation and
//! would otherwise re-report their import errors.

use std::sync::{Arc, Mutex, Weak};

use opal_compiler_diagnostics::{Diagnostic, DiagnosticCollection};
use opal_compiler_storage::{ReferenceKind, StorageManager};
use opal_compiler_syntax::{DeclRef, DeclarationKind, FileId, FqName, SourceFile};
use rustc_hash::FxHashSet;

use crate::descriptors::{
    ClassDescriptor, Descriptor, FunctionDescriptor, PackageFragmentDescriptor, PropertyDescriptor,
};
use crate::errors::ResolveError;
use crate::force::ForceResolver;
use crate::index::DeclarationIndex;
use crate::providers::{ClassInfo, DeclarationProviderFactory};
use crate::scopes::{ChainedScope, LookupScope, PackageMemberScope, ScopeProvider};
use opal_compiler_storage::MemoizedFunction;

/// Consumer-tunable knobs of an analysis session.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    /// Packages whose members are in scope in every file without an explicit
    /// import, lowest precedence. Entries naming no declared package are
    /// ignored.
    pub default_imports: Vec<FqName>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Queries resolve lazily on the calling thread.
    PartiallyResolved,
    /// Every reachable lazy field is computed; reads are thread-safe.
    FullyResolved,
    /// The session is closed; all queries fail.
    Discarded,
}

/// Ordered, deduplicating sink for resolution diagnostics.
#[derive(Debug, Default)]
pub struct BindingTrace {
    inner: Mutex<TraceInner>,
}

#[derive(Debug, Default)]
struct TraceInner {
    seen: FxHashSet<Diagnostic>,
    ordered: Vec<Diagnostic>,
}

impl BindingTrace {
    /// Records a diagnostic unless an identical one was already recorded.
    pub fn report(&self, diagnostic: Diagnostic) {
        let mut inner = self.lock();
        if inner.seen.insert(diagnostic.clone()) {
            inner.ordered.push(diagnostic);
        }
    }

    /// All diagnostics recorded so far, in first-report order.
    pub fn snapshot(&self) -> DiagnosticCollection {
        let mut collection = DiagnosticCollection::default();
        collection.extend(self.lock().ordered.iter().cloned());
        collection
    }

    pub fn diagnostics_for_file(&self, file_name: &str) -> Vec<Diagnostic> {
        self.lock()
            .ordered
            .iter()
            .filter(|diagnostic| diagnostic.file_name == file_name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ordered.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TraceInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The consumer-facing surface of an analysis session.
///
/// `ResolveSession` is the engine's implementation; downstream stages (type
/// checking, IDE features) should depend on this trait so they can be driven
/// by a different resolution backend in tests.
pub trait CodeAnalyzer: Send + Sync {
    /// The typed descriptor for a non-local declaration.
    fn resolve_to_descriptor(&self, decl: DeclRef) -> Result<Descriptor, ResolveError>;

    /// The fragment for a declared package, `None` for an undeclared one.
    fn package_fragment(
        &self,
        fq_name: &FqName,
    ) -> Result<Option<Arc<PackageFragmentDescriptor>>, ResolveError>;

    /// The lexical scope of a file's top level.
    fn file_scope(&self, file: FileId) -> Result<Arc<ChainedScope>, ResolveError>;

    /// Computes every reachable lazy field and seals the session.
    fn force_resolve_all(&self) -> Result<(), ResolveError>;

    fn diagnostics(&self) -> DiagnosticCollection;

    fn state(&self) -> SessionState;
}

/// One analysis session over a fixed set of source files.
#[derive(Debug)]
pub struct ResolveSession {
    storage: Arc<StorageManager>,
    config: AnalyzerConfig,
    index: Arc<DeclarationIndex>,
    factory: DeclarationProviderFactory,
    scope_provider: ScopeProvider,
    trace: BindingTrace,
    state: Mutex<SessionState>,
    classes: MemoizedFunction<DeclRef, ClassDescriptor>,
    functions: MemoizedFunction<DeclRef, FunctionDescriptor>,
    properties: MemoizedFunction<DeclRef, PropertyDescriptor>,
    package_fragments: MemoizedFunction<FqName, PackageFragmentDescriptor>,
}

impl ResolveSession {
    pub fn new(files: Vec<Arc<SourceFile>>, config: AnalyzerConfig) -> Arc<Self> {
        let storage = StorageManager::new("resolve-session");
        let index = Arc::new(DeclarationIndex::build(files));
        tracing::debug!(
            packages = index.all_declared_packages().len(),
            files = index.files().len(),
            "resolve session created"
        );

        let session = Arc::new_cyclic(|weak: &Weak<Self>| {
            let factory = DeclarationProviderFactory::new(&storage, Arc::clone(&index));
            let scope_provider = ScopeProvider::new(weak.clone(), &storage);

            // Descriptor caches are strong: descriptor identity is the
            // referential stability guarantee consumers rely on.
            let classes = storage.create_memoized_function(
                "class-descriptors",
                ReferenceKind::Strong,
                {
                    let weak = weak.clone();
                    move |decl: &DeclRef| ClassDescriptor::new(&upgrade_session(&weak), *decl)
                },
            );
            let functions = storage.create_memoized_function(
                "function-descriptors",
                ReferenceKind::Strong,
                {
                    let weak = weak.clone();
                    move |decl: &DeclRef| FunctionDescriptor::new(&upgrade_session(&weak), *decl)
                },
            );
            let properties = storage.create_memoized_function(
                "property-descriptors",
                ReferenceKind::Strong,
                {
                    let weak = weak.clone();
                    move |decl: &DeclRef| PropertyDescriptor::new(&upgrade_session(&weak), *decl)
                },
            );
            let package_fragments = storage.create_memoized_function(
                "package-fragments",
                ReferenceKind::Strong,
                {
                    let weak = weak.clone();
                    move |fq_name: &FqName| {
                        PackageFragmentDescriptor::new(&upgrade_session(&weak), fq_name.clone())
                    }
                },
            );

            Self {
                storage,
                config,
                index,
                factory,
                scope_provider,
                trace: BindingTrace::default(),
                state: Mutex::new(SessionState::PartiallyResolved),
                classes,
                functions,
                properties,
                package_fragments,
            }
        });
        session.report_conflicting_classifiers();
        session
    }

    /// Two classifiers with one name in one package shadow each other, so the
    /// conflict is reported up front rather than whenever a lookup happens to
    /// hit the name.
    fn report_conflicting_classifiers(&self) {
        for fq_name in self.index.all_declared_packages() {
            let Some(entry) = self.index.package_entry(&fq_name) else {
                continue;
            };
            for name in entry.all_declared_names() {
                let classes =
                    crate::providers::class_declarations(&self.index, entry.declarations(name));
                for duplicate in classes.iter().skip(1) {
                    let file = self.file(duplicate.file);
                    let node = file.declaration(duplicate.decl);
                    self.report(
                        Diagnostic::conflicting_declaration(name)
                            .with_location(file.name(), node.name_span),
                    );
                }
            }
        }
    }

    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<DeclarationIndex> {
        &self.index
    }

    pub fn trace(&self) -> &BindingTrace {
        &self.trace
    }

    pub fn scope_provider(&self) -> &ScopeProvider {
        &self.scope_provider
    }

    /// Every declared package, synthesized ancestors included, root first.
    pub fn all_declared_packages(&self) -> Vec<FqName> {
        self.index.all_declared_packages()
    }

    pub fn package_fragment(
        &self,
        fq_name: &FqName,
    ) -> Result<Option<Arc<PackageFragmentDescriptor>>, ResolveError> {
        self.check_usable()?;
        if !self.index.is_declared_package(fq_name) {
            return Ok(None);
        }
        Ok(Some(self.package_fragments.invoke(fq_name.clone())?))
    }

    pub fn class_descriptor(&self, decl: DeclRef) -> Result<Arc<ClassDescriptor>, ResolveError> {
        self.check_usable()?;
        if self.is_local(decl) {
            return Err(ResolveError::LocalDeclaration { decl });
        }
        Ok(self.classes.invoke(decl)?)
    }

    /// The typed descriptor for any non-local declaration.
    pub fn resolve_to_descriptor(&self, decl: DeclRef) -> Result<Descriptor, ResolveError> {
        self.check_usable()?;
        if self.is_local(decl) {
            return Err(ResolveError::LocalDeclaration { decl });
        }
        let descriptor = match self.file(decl.file).declaration(decl.decl).kind {
            DeclarationKind::Class(_) => Descriptor::Class(self.classes.invoke(decl)?),
            DeclarationKind::Function(_) => Descriptor::Function(self.functions.invoke(decl)?),
            DeclarationKind::Property(_) => Descriptor::Property(self.properties.invoke(decl)?),
        };
        Ok(descriptor)
    }

    pub fn file_scope(&self, file: FileId) -> Result<Arc<ChainedScope>, ResolveError> {
        self.check_usable()?;
        Ok(self.scope_provider.file_scope(file))
    }

    pub fn resolution_scope_for_declaration(
        &self,
        decl: DeclRef,
    ) -> Result<Arc<dyn LookupScope>, ResolveError> {
        self.check_usable()?;
        self.scope_provider.resolution_scope_for_declaration(decl)
    }

    /// Computes every lazy field reachable from every declared package, then
    /// marks the session fully resolved. Idempotent. Required before sharing
    /// descriptors across threads.
    pub fn force_resolve_all(&self) -> Result<(), ResolveError> {
        self.check_usable()?;
        let _span = tracing::trace_span!("force_resolve_all").entered();

        let mut resolver = ForceResolver::default();
        for fq_name in self.index.all_declared_packages() {
            let fragment = self
                .package_fragment(&fq_name)?
                .expect("declared package has a fragment");
            resolver.force(&Descriptor::PackageFragment(fragment));
        }

        *self.lock_state() = SessionState::FullyResolved;
        tracing::debug!(diagnostics = self.trace.len(), "session fully resolved");
        Ok(())
    }

    /// Computes every lazy field reachable from one descriptor.
    pub fn force_resolve_all_contents(&self, descriptor: &Descriptor) -> Result<(), ResolveError> {
        self.check_usable()?;
        ForceResolver::default().force(descriptor);
        Ok(())
    }

    /// Closes the session. Descriptors already handed out stay readable, but
    /// the session itself answers no further queries.
    pub fn discard(&self) {
        *self.lock_state() = SessionState::Discarded;
    }

    pub fn diagnostics(&self) -> DiagnosticCollection {
        self.trace.snapshot()
    }

    // --- internals ----------------------------------------------------------

    fn check_usable(&self) -> Result<(), ResolveError> {
        if *self.lock_state() == SessionState::Discarded {
            return Err(ResolveError::Discarded);
        }
        Ok(())
    }

    /// True if the declaration is nested inside a function body or property
    /// initializer anywhere up its lexical chain.
    fn is_local(&self, decl: DeclRef) -> bool {
        let file = self.file(decl.file);
        let mut current = decl.decl;
        while let Some(parent) = file.lexical_parent(current) {
            if !matches!(file.declaration(parent).kind, DeclarationKind::Class(_)) {
                return true;
            }
            current = parent;
        }
        false
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub(crate) fn factory(&self) -> &DeclarationProviderFactory {
        &self.factory
    }

    pub(crate) fn file(&self, id: FileId) -> &Arc<SourceFile> {
        self.index.file(id)
    }

    pub(crate) fn report(&self, diagnostic: Diagnostic) {
        self.trace.report(diagnostic);
    }

    pub(crate) fn class_inner(&self, decl: DeclRef) -> Arc<ClassDescriptor> {
        self.classes
            .invoke(decl)
            .expect("class descriptor construction does not recurse")
    }

    pub(crate) fn function_inner(&self, decl: DeclRef) -> Arc<FunctionDescriptor> {
        self.functions
            .invoke(decl)
            .expect("function descriptor construction does not recurse")
    }

    pub(crate) fn property_inner(&self, decl: DeclRef) -> Arc<PropertyDescriptor> {
        self.properties
            .invoke(decl)
            .expect("property descriptor construction does not recurse")
    }

    /// The member scope of a declared package, `None` for an undeclared one.
    pub(crate) fn package_scope(&self, fq_name: &FqName) -> Option<Arc<PackageMemberScope>> {
        if !self.index.is_declared_package(fq_name) {
            return None;
        }
        let fragment = self
            .package_fragments
            .invoke(fq_name.clone())
            .expect("package fragment construction does not recurse");
        let scope = fragment
            .member_scope()
            .expect("package member scope construction does not recurse");
        Some(scope)
    }

    /// Container identity of a class declaration, with its fully-qualified
    /// name built from the file's package and the lexical chain.
    pub(crate) fn class_info(&self, decl: DeclRef) -> ClassInfo {
        let file = self.file(decl.file);
        let mut names = vec![file.declaration(decl.decl).name().clone()];
        let mut current = decl.decl;
        while let Some(parent) = file.lexical_parent(current) {
            names.push(file.declaration(parent).name().clone());
            current = parent;
        }
        let mut fq_name = file.package().clone();
        for name in names.into_iter().rev() {
            fq_name = fq_name.child(name);
        }
        ClassInfo {
            fq_name,
            package: file.package().clone(),
            decl,
        }
    }
}

impl CodeAnalyzer for ResolveSession {
    fn resolve_to_descriptor(&self, decl: DeclRef) -> Result<Descriptor, ResolveError> {
        Self::resolve_to_descriptor(self, decl)
    }

    fn package_fragment(
        &self,
        fq_name: &FqName,
    ) -> Result<Option<Arc<PackageFragmentDescriptor>>, ResolveError> {
        Self::package_fragment(self, fq_name)
    }

    fn file_scope(&self, file: FileId) -> Result<Arc<ChainedScope>, ResolveError> {
        Self::file_scope(self, file)
    }

    fn force_resolve_all(&self) -> Result<(), ResolveError> {
        Self::force_resolve_all(self)
    }

    fn diagnostics(&self) -> DiagnosticCollection {
        Self::diagnostics(self)
    }

    fn state(&self) -> SessionState {
        Self::state(self)
    }
}

/// Upgrades the back-reference a descriptor or scope holds to its session.
///
/// Lazy computations run only while some caller holds the session `Arc`, so
/// the upgrade cannot fail during normal use.
pub(crate) fn upgrade_session(weak: &Weak<ResolveSession>) -> Arc<ResolveSession> {
    weak.upgrade()
        .expect("resolve session dropped while a resolution was in flight")
}
