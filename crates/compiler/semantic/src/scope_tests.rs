//! Tests for scope composition and lookup precedence.

use std::sync::Arc;

use opal_compiler_diagnostics::DiagnosticCode;
use opal_compiler_syntax::{DeclId, DeclRef, FileId, FqName, SourceFile, SourceFileBuilder};

use crate::descriptors::Classifier;
use crate::errors::ResolveError;
use crate::scopes::{DescriptorKindFilter, LookupScope};
use crate::session::{AnalyzerConfig, ResolveSession};

fn analyze(files: Vec<SourceFile>) -> Arc<ResolveSession> {
    analyze_with(files, AnalyzerConfig::default())
}

fn analyze_with(files: Vec<SourceFile>, config: AnalyzerConfig) -> Arc<ResolveSession> {
    ResolveSession::new(files.into_iter().map(Arc::new).collect(), config)
}

fn find_decl(session: &ResolveSession, file: FileId, name: &str) -> DeclRef {
    let source = session.index().file(file);
    (0..source.declaration_count())
        .map(DeclId::new)
        .find(|&id| source.declaration(id).name().as_str() == name)
        .map(|decl| DeclRef { file, decl })
        .expect("declaration present in file")
}

fn classifier_fq(scope: &dyn LookupScope, name: &str) -> FqName {
    match scope.classifier(&name.into()) {
        Some(Classifier::Class(class)) => class.fq_name().clone(),
        Some(Classifier::TypeParameter(parameter)) => {
            panic!("`{name}` resolved to type parameter {}", parameter.name)
        }
        None => panic!("`{name}` did not resolve"),
    }
}

#[test]
fn own_package_shadows_explicit_imports() {
    let session = analyze(vec![
        SourceFileBuilder::new("lib.opal", "lib")
            .class("C", |class| class)
            .build(),
        SourceFileBuilder::new("main.opal", "demo")
            .import("lib.C")
            .class("C", |class| class)
            .build(),
    ]);

    let scope = session.file_scope(FileId::new(1)).unwrap();
    assert_eq!(classifier_fq(scope.as_ref(), "C"), FqName::from_dotted("demo.C"));
}

#[test]
fn single_import_shadows_wildcard_import() {
    let session = analyze(vec![
        SourceFileBuilder::new("one.opal", "one")
            .class("C", |class| class)
            .build(),
        SourceFileBuilder::new("two.opal", "two")
            .class("C", |class| class)
            .build(),
        SourceFileBuilder::new("main.opal", "demo")
            .wildcard_import("two")
            .import("one.C")
            .build(),
    ]);

    let scope = session.file_scope(FileId::new(2)).unwrap();
    assert_eq!(classifier_fq(scope.as_ref(), "C"), FqName::from_dotted("one.C"));
}

#[test]
fn import_alias_binds_the_alias_only() {
    let session = analyze(vec![
        SourceFileBuilder::new("lib.opal", "lib")
            .class("Widget", |class| class)
            .build(),
        SourceFileBuilder::new("main.opal", "demo")
            .import_as("lib.Widget", "W")
            .build(),
    ]);

    let scope = session.file_scope(FileId::new(1)).unwrap();
    assert_eq!(classifier_fq(scope.as_ref(), "W"), FqName::from_dotted("lib.Widget"));
    assert!(scope.classifier(&"Widget".into()).is_none());
}

#[test]
fn root_package_members_are_visible_everywhere() {
    let session = analyze(vec![
        SourceFileBuilder::new("top.opal", "")
            .class("Top", |class| class)
            .build(),
        SourceFileBuilder::new("main.opal", "demo").build(),
    ]);

    let scope = session.file_scope(FileId::new(1)).unwrap();
    assert_eq!(classifier_fq(scope.as_ref(), "Top"), FqName::from_dotted("Top"));
}

#[test]
fn default_imports_have_lowest_precedence() {
    let config = AnalyzerConfig {
        default_imports: vec![FqName::from_dotted("std")],
    };
    let session = analyze_with(
        vec![
            SourceFileBuilder::new("std.opal", "std")
                .class("List", |class| class)
                .class("Map", |class| class)
                .build(),
            SourceFileBuilder::new("main.opal", "demo")
                .class("List", |class| class)
                .build(),
        ],
        config,
    );

    let scope = session.file_scope(FileId::new(1)).unwrap();
    // Shadowed by the file's own package member.
    assert_eq!(classifier_fq(scope.as_ref(), "List"), FqName::from_dotted("demo.List"));
    // Reachable with no import at all.
    assert_eq!(classifier_fq(scope.as_ref(), "Map"), FqName::from_dotted("std.Map"));
}

#[test]
fn unresolvable_imports_are_reported() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .import("nowhere.Thing")
        .wildcard_import("nope")
        .build()]);

    // Import resolution happens when the file scope is first built.
    session.file_scope(FileId::new(0)).unwrap();
    let diagnostics = session.diagnostics();
    assert_eq!(
        diagnostics.with_code(DiagnosticCode::UnresolvedImport).len(),
        2
    );
}

#[test]
fn all_descriptors_deduplicate_across_delegates() {
    // `A` is visible both as a package member and through the import.
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .import("demo.A")
        .class("A", |class| class)
        .build()]);

    let scope = session.file_scope(FileId::new(0)).unwrap();
    let classifiers = scope.descriptors_filtered(DescriptorKindFilter::CLASSIFIERS);
    assert_eq!(classifiers.len(), 1);
}

#[test]
fn member_function_scope_sees_members_and_type_parameters() {
    let session = analyze(vec![SourceFileBuilder::new("box.opal", "demo")
        .class("Box", |class| {
            class
                .type_parameter("T")
                .nested_class("Inner", |inner| inner)
                .function("get")
        })
        .build()]);

    let get = find_decl(&session, FileId::new(0), "get");
    let scope = session.resolution_scope_for_declaration(get).unwrap();

    assert_eq!(
        classifier_fq(scope.as_ref(), "Inner"),
        FqName::from_dotted("demo.Box.Inner")
    );
    assert!(matches!(
        scope.classifier(&"T".into()),
        Some(Classifier::TypeParameter(_))
    ));
}

#[test]
fn property_scope_sees_constructor_parameters_not_sibling_functions() {
    let session = analyze(vec![SourceFileBuilder::new("holder.opal", "demo")
        .class("Dep", |class| class)
        .class("Holder", |class| {
            class
                .constructor_parameter("dep", "Dep")
                .property("mirror", Some("Dep"), true)
                .function("helper")
        })
        .build()]);

    let mirror = find_decl(&session, FileId::new(0), "mirror");
    let scope = session.resolution_scope_for_declaration(mirror).unwrap();

    assert!(scope.value_parameter(&"dep".into()).is_some());
    assert!(scope.functions(&"helper".into()).is_empty());
    // The enclosing file scope is still reachable.
    assert_eq!(classifier_fq(scope.as_ref(), "Dep"), FqName::from_dotted("demo.Dep"));
}

#[test]
fn declarations_in_function_bodies_are_rejected_as_local() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("Seen", |class| class)
        .function_declaring("main", |function| {
            function.local_class("Helper", |class| class)
        })
        .build()]);

    let helper = find_decl(&session, FileId::new(0), "Helper");
    // Distinct from absence: the declaration exists, but body-level
    // declarations are outside this engine's scope machinery.
    assert!(matches!(
        session.resolution_scope_for_declaration(helper),
        Err(ResolveError::LocalDeclaration { decl }) if decl == helper
    ));
    assert!(matches!(
        session.resolve_to_descriptor(helper),
        Err(ResolveError::LocalDeclaration { .. })
    ));

    // The enclosing function itself is top-level and resolves normally.
    let main = find_decl(&session, FileId::new(0), "main");
    let scope = session.resolution_scope_for_declaration(main).unwrap();
    assert_eq!(classifier_fq(scope.as_ref(), "Seen"), FqName::from_dotted("demo.Seen"));
}

#[test]
fn member_scopes_are_shallow() {
    let session = analyze(vec![SourceFileBuilder::new("inherit.opal", "demo")
        .class("Base", |class| class.function("inherited"))
        .class("Derived", |class| class.supertype("Base").function("own"))
        .build()]);

    let derived = find_decl(&session, FileId::new(0), "Derived");
    let class = session.class_descriptor(derived).unwrap();
    let scope = class.member_scope().unwrap();

    assert_eq!(scope.functions(&"own".into()).len(), 1);
    assert!(scope.functions(&"inherited".into()).is_empty());
}
