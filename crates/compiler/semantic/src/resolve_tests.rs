//! Tests for lazy descriptor resolution: supertypes, signatures, cycles,
//! force-resolution and the session lifecycle.

use std::sync::Arc;

use opal_compiler_diagnostics::{DiagnosticCode, DiagnosticSeverity};
use opal_compiler_syntax::{
    DeclId, DeclRef, FileId, FqName, SourceFile, SourceFileBuilder, Span, TypeReference,
};

use crate::descriptors::{resolve_type_reference, Descriptor, ResolvedType};
use crate::errors::ResolveError;
use crate::session::{AnalyzerConfig, ResolveSession, SessionState};

fn analyze(files: Vec<SourceFile>) -> Arc<ResolveSession> {
    ResolveSession::new(
        files.into_iter().map(Arc::new).collect(),
        AnalyzerConfig::default(),
    )
}

fn find_decl(session: &ResolveSession, file: FileId, name: &str) -> DeclRef {
    let source = session.index().file(file);
    (0..source.declaration_count())
        .map(DeclId::new)
        .find(|&id| source.declaration(id).name().as_str() == name)
        .map(|decl| DeclRef { file, decl })
        .expect("declaration present in file")
}

fn assert_class(resolved: &ResolvedType, fq: &str) {
    match resolved {
        ResolvedType::Class(class) => assert_eq!(class.fq_name().to_dotted(), fq),
        other => panic!("expected class {fq}, got {other:?}"),
    }
}

#[test]
fn resolves_supertype_in_same_package() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .class("B", |class| class.supertype("A"))
        .build()]);

    let b = session
        .class_descriptor(find_decl(&session, FileId::new(0), "B"))
        .unwrap();
    let supertypes = b.supertypes().unwrap();
    assert_eq!(supertypes.len(), 1);
    assert_class(&supertypes[0].resolved, "demo.A");
    assert!(!session.diagnostics().has_errors());
}

#[test]
fn supertype_resolution_is_lazy_and_stable() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .class("B", |class| {
            class.supertype("A").constructor_parameter("a", "A")
        })
        .build()]);

    let b = session
        .class_descriptor(find_decl(&session, FileId::new(0), "B"))
        .unwrap();
    assert!(!b.is_fully_computed());

    let first = b.supertypes().unwrap();
    // Reading supertypes must not drag in unrelated fields.
    assert!(!b.is_fully_computed());

    let second = b.supertypes().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn descriptor_identity_is_memoized() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .build()]);

    let decl = find_decl(&session, FileId::new(0), "A");
    let first = session.class_descriptor(decl).unwrap();
    let second = session.class_descriptor(decl).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn inheritance_cycle_is_reported_once_and_contained() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class.supertype("B"))
        .class("B", |class| class.supertype("A"))
        .class("C", |class| class.supertype("A"))
        .build()]);

    let a = session
        .class_descriptor(find_decl(&session, FileId::new(0), "A"))
        .unwrap();
    let supertypes = a.supertypes().unwrap();
    // The cycle is diagnosed, but both supertype lists still resolve.
    assert_class(&supertypes[0].resolved, "demo.B");

    let b = session
        .class_descriptor(find_decl(&session, FileId::new(0), "B"))
        .unwrap();
    assert_class(&b.supertypes().unwrap()[0].resolved, "demo.A");

    let diagnostics = session.diagnostics();
    assert_eq!(
        diagnostics
            .with_code(DiagnosticCode::CyclicInheritance)
            .len(),
        1
    );

    // An unrelated class in the same session still resolves cleanly.
    let c = session
        .class_descriptor(find_decl(&session, FileId::new(0), "C"))
        .unwrap();
    assert_class(&c.supertypes().unwrap()[0].resolved, "demo.A");
}

#[test]
fn self_inheritance_is_a_cycle() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class.supertype("A"))
        .build()]);

    let a = session
        .class_descriptor(find_decl(&session, FileId::new(0), "A"))
        .unwrap();
    let supertypes = a.supertypes().unwrap();
    assert_class(&supertypes[0].resolved, "demo.A");
    assert_eq!(
        session
            .diagnostics()
            .with_code(DiagnosticCode::CyclicInheritance)
            .len(),
        1
    );
}

#[test]
fn unresolved_supertype_is_reported() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("B", |class| class.supertype("Missing"))
        .build()]);

    let b = session
        .class_descriptor(find_decl(&session, FileId::new(0), "B"))
        .unwrap();
    let supertypes = b.supertypes().unwrap();
    assert!(supertypes[0].resolved.is_error());
    assert_eq!(
        session
            .diagnostics()
            .with_code(DiagnosticCode::UnresolvedSupertype)
            .len(),
        1
    );
}

#[test]
fn simple_name_resolves_across_files_of_one_package() {
    let session = analyze(vec![
        SourceFileBuilder::new("foo.opal", "demo")
            .class("Foo", |class| class)
            .build(),
        SourceFileBuilder::new("bar.opal", "demo")
            .class("Bar", |class| class.supertype("Foo"))
            .build(),
    ]);

    let bar = session
        .class_descriptor(find_decl(&session, FileId::new(1), "Bar"))
        .unwrap();
    assert_class(&bar.supertypes().unwrap()[0].resolved, "demo.Foo");
    assert!(!session.diagnostics().has_errors());
}

#[test]
fn class_provider_rejects_unknown_container() {
    use opal_compiler_storage::StorageManager;

    use crate::index::DeclarationIndex;
    use crate::providers::{ClassInfo, DeclarationProviderFactory};

    let storage = StorageManager::new("test-session");
    let index = Arc::new(DeclarationIndex::build(vec![Arc::new(
        SourceFileBuilder::new("main.opal", "demo")
            .class("A", |class| class)
            .build(),
    )]));
    let factory = DeclarationProviderFactory::new(&storage, Arc::clone(&index));

    let info = ClassInfo {
        fq_name: FqName::from_dotted("ghost.A"),
        package: FqName::from_dotted("ghost"),
        decl: DeclRef {
            file: FileId::new(0),
            decl: DeclId::new(0),
        },
    };
    assert!(matches!(
        factory.class_provider(&info),
        Err(ResolveError::UnknownContainer { .. })
    ));
}

#[test]
fn qualified_supertype_resolves_without_import() {
    let session = analyze(vec![
        SourceFileBuilder::new("lib.opal", "a.b")
            .class("C", |class| class)
            .build(),
        SourceFileBuilder::new("main.opal", "demo")
            .class("D", |class| class.supertype("a.b.C"))
            .build(),
    ]);

    let d = session
        .class_descriptor(find_decl(&session, FileId::new(1), "D"))
        .unwrap();
    assert_class(&d.supertypes().unwrap()[0].resolved, "a.b.C");
    assert!(!session.diagnostics().has_errors());
}

#[test]
fn nested_classifier_resolves_through_member_scopes() {
    let session = analyze(vec![
        SourceFileBuilder::new("lib.opal", "lib")
            .class("Outer", |class| class.nested_class("Inner", |inner| inner))
            .build(),
        SourceFileBuilder::new("main.opal", "demo")
            .import("lib.Outer")
            .class("D", |class| class.supertype("Outer.Inner"))
            .build(),
    ]);

    let d = session
        .class_descriptor(find_decl(&session, FileId::new(1), "D"))
        .unwrap();
    assert_class(&d.supertypes().unwrap()[0].resolved, "lib.Outer.Inner");
}

#[test]
fn empty_type_reference_resolves_to_error() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .build()]);

    let scope = session.file_scope(FileId::new(0)).unwrap();
    let reference = TypeReference {
        segments: Vec::new(),
        span: Span::new(0, 0),
    };
    let resolved = resolve_type_reference(&session, scope.as_ref(), &reference);
    assert!(resolved.is_error());
}

#[test]
fn function_signature_resolves_parameters_and_return_type() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("Dep", |class| class)
        .function_with("make", &[("dep", "Dep")], Some("Dep"))
        .function("noop")
        .build()]);

    let make = session
        .resolve_to_descriptor(find_decl(&session, FileId::new(0), "make"))
        .unwrap();
    let Descriptor::Function(make) = make else {
        panic!("expected a function descriptor");
    };
    let signature = make.signature().unwrap();
    assert_eq!(signature.value_parameters.len(), 1);
    assert_eq!(signature.value_parameters[0].name, "dep");
    assert_class(&signature.value_parameters[0].resolved_type, "demo.Dep");
    assert_class(&signature.return_type, "demo.Dep");

    let Descriptor::Function(noop) = session
        .resolve_to_descriptor(find_decl(&session, FileId::new(0), "noop"))
        .unwrap()
    else {
        panic!("expected a function descriptor");
    };
    assert!(matches!(
        noop.signature().unwrap().return_type,
        ResolvedType::Unit
    ));
}

#[test]
fn property_types_resolve_or_stay_unknown() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("Num", |class| class)
        .property("count", Some("Num"), false)
        .property("inferred", None, true)
        .build()]);

    let Descriptor::Property(count) = session
        .resolve_to_descriptor(find_decl(&session, FileId::new(0), "count"))
        .unwrap()
    else {
        panic!("expected a property descriptor");
    };
    assert_class(&count.resolved_type().unwrap(), "demo.Num");

    let Descriptor::Property(inferred) = session
        .resolve_to_descriptor(find_decl(&session, FileId::new(0), "inferred"))
        .unwrap()
    else {
        panic!("expected a property descriptor");
    };
    assert!(matches!(
        *inferred.resolved_type().unwrap(),
        ResolvedType::Unknown
    ));
}

#[test]
fn unresolved_parameter_type_is_reported() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .function_with("make", &[("dep", "Missing")], None)
        .build()]);

    let Descriptor::Function(make) = session
        .resolve_to_descriptor(find_decl(&session, FileId::new(0), "make"))
        .unwrap()
    else {
        panic!("expected a function descriptor");
    };
    assert!(make.signature().unwrap().value_parameters[0]
        .resolved_type
        .is_error());
    assert_eq!(
        session
            .diagnostics()
            .with_code(DiagnosticCode::UnresolvedReference)
            .len(),
        1
    );
}

#[test]
fn conflicting_classifiers_are_warned_up_front() {
    let session = analyze(vec![
        SourceFileBuilder::new("one.opal", "demo")
            .class("C", |class| class)
            .build(),
        SourceFileBuilder::new("two.opal", "demo")
            .class("C", |class| class)
            .build(),
    ]);

    let conflicts = session.diagnostics();
    let conflicts = conflicts.with_code(DiagnosticCode::ConflictingDeclaration);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].severity, DiagnosticSeverity::Warning);
    // Attributed to the later declaration.
    assert_eq!(conflicts[0].file_name, "two.opal");
}

#[test]
fn force_resolve_all_computes_everything() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .class("B", |class| {
            class
                .supertype("A")
                .type_parameter("T")
                .constructor_parameter("a", "A")
                .function_with("get", &[], Some("A"))
                .property("cached", Some("A"), true)
        })
        .function("top")
        .build()]);

    session.force_resolve_all().unwrap();
    assert_eq!(session.state(), SessionState::FullyResolved);

    let b = session
        .class_descriptor(find_decl(&session, FileId::new(0), "B"))
        .unwrap();
    assert!(b.is_fully_computed());

    let fragment = session
        .package_fragment(&FqName::from_dotted("demo"))
        .unwrap()
        .expect("demo is declared");
    assert!(fragment.is_fully_computed());

    // Idempotent.
    session.force_resolve_all().unwrap();
    assert_eq!(session.state(), SessionState::FullyResolved);
}

#[test]
fn package_fragment_is_none_for_undeclared_packages() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "a.b").build()]);

    assert!(session
        .package_fragment(&FqName::from_dotted("a"))
        .unwrap()
        .is_some());
    assert!(session
        .package_fragment(&FqName::from_dotted("a.b.c"))
        .unwrap()
        .is_none());
}

#[test]
fn discarded_session_rejects_queries() {
    let session = analyze(vec![SourceFileBuilder::new("main.opal", "demo")
        .class("A", |class| class)
        .build()]);
    let decl = find_decl(&session, FileId::new(0), "A");

    session.discard();
    assert_eq!(session.state(), SessionState::Discarded);
    assert!(matches!(
        session.class_descriptor(decl),
        Err(ResolveError::Discarded)
    ));
    assert!(matches!(
        session.force_resolve_all(),
        Err(ResolveError::Discarded)
    ));
}
