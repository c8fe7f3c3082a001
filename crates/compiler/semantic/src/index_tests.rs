//! Tests for the declaration index.

use std::sync::Arc;

use opal_compiler_syntax::{FileId, FqName, Name, SourceFile, SourceFileBuilder};

use crate::index::DeclarationIndex;

fn source(builder: SourceFileBuilder) -> Arc<SourceFile> {
    Arc::new(builder.build())
}

#[test]
fn root_package_is_always_declared() {
    let index = DeclarationIndex::build(vec![]);
    assert!(index.is_declared_package(&FqName::root()));
    assert_eq!(index.all_declared_packages(), vec![FqName::root()]);
}

#[test]
fn ancestor_packages_are_synthesized() {
    let index = DeclarationIndex::build(vec![source(
        SourceFileBuilder::new("deep.opal", "a.b.c").class("C", |class| class),
    )]);

    for dotted in ["a", "a.b", "a.b.c"] {
        assert!(
            index.is_declared_package(&FqName::from_dotted(dotted)),
            "package {dotted} not declared"
        );
    }

    // Synthesized ancestors have no files of their own but know their
    // children.
    let middle = index.package_entry(&FqName::from_dotted("a")).unwrap();
    assert!(middle.files().is_empty());
    assert!(middle.has_sub_package(&Name::from("b")));

    let root = index.package_entry(&FqName::root()).unwrap();
    assert!(root.has_sub_package(&Name::from("a")));
}

#[test]
fn top_level_declarations_grouped_by_name() {
    let index = DeclarationIndex::build(vec![
        source(
            SourceFileBuilder::new("one.opal", "demo")
                .class("A", |class| class)
                .function("helper"),
        ),
        source(SourceFileBuilder::new("two.opal", "demo").function("helper")),
    ]);

    let entry = index.package_entry(&FqName::from_dotted("demo")).unwrap();
    assert_eq!(entry.files(), &[FileId::new(0), FileId::new(1)]);
    assert_eq!(entry.declarations(&Name::from("A")).len(), 1);

    // Same-named declarations from different files stay in processing order.
    let helpers = entry.declarations(&Name::from("helper"));
    assert_eq!(helpers.len(), 2);
    assert_eq!(helpers[0].file, FileId::new(0));
    assert_eq!(helpers[1].file, FileId::new(1));
}

#[test]
fn package_order_is_first_encountered() {
    let index = DeclarationIndex::build(vec![
        source(SourceFileBuilder::new("z.opal", "zeta")),
        source(SourceFileBuilder::new("a.opal", "alpha")),
    ]);

    let packages = index.all_declared_packages();
    assert_eq!(
        packages,
        vec![
            FqName::root(),
            FqName::from_dotted("zeta"),
            FqName::from_dotted("alpha"),
        ]
    );
}

#[test]
fn nested_declarations_are_not_package_members() {
    let index = DeclarationIndex::build(vec![source(
        SourceFileBuilder::new("outer.opal", "demo")
            .class("Outer", |class| class.nested_class("Inner", |inner| inner)),
    )]);

    let entry = index.package_entry(&FqName::from_dotted("demo")).unwrap();
    assert_eq!(entry.declarations(&Name::from("Outer")).len(), 1);
    assert!(entry.declarations(&Name::from("Inner")).is_empty());
}
