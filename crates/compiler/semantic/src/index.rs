//! # Declaration Index
//!
//! Groups raw declarations by enclosing container: top-level declarations by
//! package, files by the package they declare. Built once per session, before
//! any lazy resolution starts; everything downstream reads it through
//! declaration providers.
//!
//! Iteration order is significant everywhere it is observable: packages,
//! declared names, and declarations all iterate in first-encountered order,
//! which follows source-file processing order. Compilers are expected to be
//! deterministic, and diagnostic and generated-code ordering depend on it.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use opal_compiler_syntax::{DeclRef, FileId, FqName, Name, SourceFile};

/// Per-package slice of the index.
#[derive(Debug, Default)]
pub struct PackageEntry {
    /// Files declaring exactly this package, in processing order.
    files: Vec<FileId>,
    /// Top-level declarations grouped by simple name, insertion-ordered.
    members: IndexMap<Name, Vec<DeclRef>>,
    /// Names of direct sub-packages, insertion-ordered.
    sub_packages: IndexSet<Name>,
}

impl PackageEntry {
    pub fn files(&self) -> &[FileId] {
        &self.files
    }

    pub fn declarations(&self, name: &Name) -> &[DeclRef] {
        self.members.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn all_declared_names(&self) -> impl Iterator<Item = &Name> {
        self.members.keys()
    }

    pub fn has_sub_package(&self, name: &Name) -> bool {
        self.sub_packages.contains(name)
    }

    pub fn sub_package_names(&self) -> impl Iterator<Item = &Name> {
        self.sub_packages.iter()
    }
}

/// The session-wide mapping from packages to their raw declarations.
///
/// When a file declares package `a.b.c`, the packages `a`, `a.b` and `a.b.c`
/// are all registered as declared, so a lookup for `a.b` succeeds as an
/// empty-but-present package even if no file declares it directly.
#[derive(Debug)]
pub struct DeclarationIndex {
    files: Vec<Arc<SourceFile>>,
    packages: IndexMap<FqName, PackageEntry>,
}

impl DeclarationIndex {
    pub fn build(files: Vec<Arc<SourceFile>>) -> Self {
        let _span = tracing::trace_span!("declaration_index", files = files.len()).entered();

        let mut packages: IndexMap<FqName, PackageEntry> = IndexMap::new();
        packages.entry(FqName::root()).or_default();

        for (i, file) in files.iter().enumerate() {
            let file_id = FileId::new(i);

            // Register the file's package and every ancestor, linking each
            // child into its parent's sub-package set.
            let path: Vec<FqName> = file.package().path_from_root().collect();
            for fq in &path {
                packages.entry(fq.clone()).or_default();
            }
            for pair in path.windows(2) {
                let child = pair[1]
                    .short_name()
                    .expect("non-root package has a short name")
                    .clone();
                packages
                    .get_mut(&pair[0])
                    .expect("ancestor package registered above")
                    .sub_packages
                    .insert(child);
            }

            let entry = packages
                .get_mut(file.package())
                .expect("file package registered above");
            entry.files.push(file_id);
            for (decl_id, node) in file.top_level_declarations() {
                entry
                    .members
                    .entry(node.name().clone())
                    .or_default()
                    .push(DeclRef {
                        file: file_id,
                        decl: decl_id,
                    });
            }
        }

        Self { files, packages }
    }

    pub fn file(&self, id: FileId) -> &Arc<SourceFile> {
        &self.files[id.raw() as usize]
    }

    pub fn files(&self) -> &[Arc<SourceFile>] {
        &self.files
    }

    /// True if at least one file declares this package or a descendant of it.
    pub fn is_declared_package(&self, fq_name: &FqName) -> bool {
        self.packages.contains_key(fq_name)
    }

    pub fn package_entry(&self, fq_name: &FqName) -> Option<&PackageEntry> {
        self.packages.get(fq_name)
    }

    /// Every declared package (explicit and synthesized ancestors), in
    /// first-encountered order. The root package is always first.
    pub fn all_declared_packages(&self) -> Vec<FqName> {
        self.packages.keys().cloned().collect()
    }
}
