//! Programmatic construction of source files.
//!
//! Stands in for the parser: tests and embedders assemble declaration trees
//! through [`SourceFileBuilder`], which renders a canonical text as it goes and
//! assigns every node a span into that text.

use index_vec::IndexVec;
use opal_compiler_diagnostics::Span;

use crate::ast::{
    ClassKind, ClassNode, DeclId, DeclarationKind, DeclarationNode, FunctionNode, ImportDirective,
    Modality, Modifiers, Parameter, PropertyNode, SourceFile, TypeReference, Visibility,
};
use crate::name::{FqName, Name};

/// Builder for a single [`SourceFile`].
pub struct SourceFileBuilder {
    name: String,
    package: FqName,
    imports: Vec<ImportDirective>,
    declarations: IndexVec<DeclId, DeclarationNode>,
    top_level: Vec<DeclId>,
    text: String,
}

impl SourceFileBuilder {
    /// Starts a file named `file_name` declaring package `package` (dotted,
    /// empty for the root package).
    pub fn new(file_name: impl Into<String>, package: &str) -> Self {
        let package = FqName::from_dotted(package);
        let mut text = String::new();
        if !package.is_root() {
            text.push_str("package ");
            text.push_str(&package.to_dotted());
            text.push('\n');
        }
        Self {
            name: file_name.into(),
            package,
            imports: Vec::new(),
            declarations: IndexVec::new(),
            top_level: Vec::new(),
            text,
        }
    }

    pub fn import(self, path: &str) -> Self {
        self.push_import(path, false, None)
    }

    pub fn import_as(self, path: &str, alias: &str) -> Self {
        self.push_import(path, false, Some(Name::from(alias)))
    }

    pub fn wildcard_import(self, path: &str) -> Self {
        self.push_import(path, true, None)
    }

    pub fn class(self, name: &str, f: impl FnOnce(ClassBuilder) -> ClassBuilder) -> Self {
        self.push_top_level_class(name, ClassKind::Class, f)
    }

    pub fn interface(self, name: &str, f: impl FnOnce(ClassBuilder) -> ClassBuilder) -> Self {
        self.push_top_level_class(name, ClassKind::Interface, f)
    }

    pub fn object(self, name: &str, f: impl FnOnce(ClassBuilder) -> ClassBuilder) -> Self {
        self.push_top_level_class(name, ClassKind::Object, f)
    }

    /// A top-level function with a body, unit return type and no parameters.
    pub fn function(self, name: &str) -> Self {
        self.function_with(name, &[], None)
    }

    /// A top-level function with the given `(name, dotted type)` parameters
    /// and optional dotted return type.
    pub fn function_with(
        mut self,
        name: &str,
        parameters: &[(&str, &str)],
        return_type: Option<&str>,
    ) -> Self {
        let spec = MemberSpec::Function {
            name: Name::from(name),
            parameters: parameters
                .iter()
                .map(|(n, t)| (Name::from(*n), (*t).to_string()))
                .collect(),
            return_type: return_type.map(str::to_string),
            has_body: true,
            local_classes: Vec::new(),
        };
        let id = self.append_member(None, spec, 0);
        self.top_level.push(id);
        self
    }

    /// A top-level function assembled piecewise, including classes declared
    /// locally in its body.
    pub fn function_declaring(
        mut self,
        name: &str,
        f: impl FnOnce(FunctionBuilder) -> FunctionBuilder,
    ) -> Self {
        let spec = f(FunctionBuilder::new());
        let id = self.append_member(
            None,
            MemberSpec::Function {
                name: Name::from(name),
                parameters: spec.parameters,
                return_type: spec.return_type,
                has_body: true,
                local_classes: spec.local_classes,
            },
            0,
        );
        self.top_level.push(id);
        self
    }

    /// A top-level property with an optional dotted type annotation.
    pub fn property(mut self, name: &str, type_ref: Option<&str>, has_initializer: bool) -> Self {
        let spec = MemberSpec::Property {
            name: Name::from(name),
            type_ref: type_ref.map(str::to_string),
            has_initializer,
        };
        let id = self.append_member(None, spec, 0);
        self.top_level.push(id);
        self
    }

    pub fn build(self) -> SourceFile {
        SourceFile::new(
            self.name,
            self.package,
            self.imports,
            self.declarations,
            self.top_level,
            self.text,
        )
    }

    fn push_import(mut self, path: &str, is_wildcard: bool, alias: Option<Name>) -> Self {
        self.text.push_str("import ");
        let start = self.text.len();
        self.text.push_str(path);
        let span = Span::new(start, self.text.len());
        if is_wildcard {
            self.text.push_str(".*");
        }
        if let Some(alias) = &alias {
            self.text.push_str(" as ");
            self.text.push_str(alias);
        }
        self.text.push('\n');
        self.imports.push(ImportDirective {
            path: path.split('.').map(Name::from).collect(),
            is_wildcard,
            alias,
            span,
        });
        self
    }

    fn push_top_level_class(
        mut self,
        name: &str,
        kind: ClassKind,
        f: impl FnOnce(ClassBuilder) -> ClassBuilder,
    ) -> Self {
        let spec = f(ClassBuilder::new(kind));
        let id = self.append_class(None, Name::from(name), spec, 0);
        self.top_level.push(id);
        self
    }

    fn append_class(
        &mut self,
        parent: Option<DeclId>,
        name: Name,
        spec: ClassBuilder,
        indent: usize,
    ) -> DeclId {
        self.text.push('\n');
        let start = self.text.len();
        self.push_indent(indent);
        self.push_modifiers(&spec.modifiers);
        self.text.push_str(match spec.kind {
            ClassKind::Class => "class ",
            ClassKind::Interface => "interface ",
            ClassKind::Object => "object ",
        });
        let name_start = self.text.len();
        self.text.push_str(&name);
        let name_span = Span::new(name_start, self.text.len());

        if !spec.type_parameters.is_empty() {
            self.text.push('<');
            for (i, param) in spec.type_parameters.iter().enumerate() {
                if i > 0 {
                    self.text.push_str(", ");
                }
                self.text.push_str(param);
            }
            self.text.push('>');
        }

        let mut constructor_parameters = Vec::new();
        if !spec.constructor_parameters.is_empty() {
            self.text.push('(');
            for (i, (param_name, param_type)) in spec.constructor_parameters.iter().enumerate() {
                if i > 0 {
                    self.text.push_str(", ");
                }
                let param_start = self.text.len();
                self.text.push_str(param_name);
                self.text.push_str(": ");
                let type_ref = self.push_type_reference(param_type);
                constructor_parameters.push(Parameter {
                    name: param_name.clone(),
                    type_ref,
                    span: Span::new(param_start, self.text.len()),
                });
            }
            self.text.push(')');
        }

        let mut supertypes = Vec::new();
        if !spec.supertypes.is_empty() {
            self.text.push_str(" : ");
            for (i, supertype) in spec.supertypes.iter().enumerate() {
                if i > 0 {
                    self.text.push_str(", ");
                }
                supertypes.push(self.push_type_reference(supertype));
            }
        }

        // Push the node before its members so children can reference it.
        let id = self.declarations.push(DeclarationNode {
            parent,
            span: Span::new(start, self.text.len()),
            name_span,
            kind: DeclarationKind::Class(ClassNode {
                name,
                kind: spec.kind,
                modifiers: spec.modifiers,
                type_parameters: spec.type_parameters,
                constructor_parameters,
                supertypes,
                members: Vec::new(),
            }),
        });

        if spec.members.is_empty() {
            self.text.push('\n');
        } else {
            self.text.push_str(" {\n");
            let mut members = Vec::with_capacity(spec.members.len());
            for member in spec.members {
                members.push(self.append_member(Some(id), member, indent + 1));
            }
            self.push_indent(indent);
            self.text.push_str("}\n");
            match &mut self.declarations[id].kind {
                DeclarationKind::Class(node) => node.members = members,
                _ => unreachable!(),
            }
        }
        self.declarations[id].span = Span::new(start, self.text.len());
        id
    }

    fn append_member(&mut self, parent: Option<DeclId>, spec: MemberSpec, indent: usize) -> DeclId {
        match spec {
            MemberSpec::Class { name, builder } => self.append_class(parent, name, builder, indent),
            MemberSpec::Function {
                name,
                parameters,
                return_type,
                has_body,
                local_classes,
            } => {
                let start = self.text.len();
                self.push_indent(indent);
                self.text.push_str("fun ");
                let name_start = self.text.len();
                self.text.push_str(&name);
                let name_span = Span::new(name_start, self.text.len());
                self.text.push('(');
                let mut rendered_parameters = Vec::new();
                for (i, (param_name, param_type)) in parameters.iter().enumerate() {
                    if i > 0 {
                        self.text.push_str(", ");
                    }
                    let param_start = self.text.len();
                    self.text.push_str(param_name);
                    self.text.push_str(": ");
                    let type_ref = self.push_type_reference(param_type);
                    rendered_parameters.push(Parameter {
                        name: param_name.clone(),
                        type_ref,
                        span: Span::new(param_start, self.text.len()),
                    });
                }
                self.text.push(')');
                let rendered_return = return_type.map(|ty| {
                    self.text.push_str(": ");
                    self.push_type_reference(&ty)
                });
                // Push the node before any body declarations so locals can
                // reference it as their lexical parent.
                let id = self.declarations.push(DeclarationNode {
                    parent,
                    span: Span::new(start, self.text.len()),
                    name_span,
                    kind: DeclarationKind::Function(FunctionNode {
                        name,
                        modifiers: Modifiers::default(),
                        parameters: rendered_parameters,
                        return_type: rendered_return,
                        has_body,
                    }),
                });
                if local_classes.is_empty() {
                    if has_body {
                        self.text.push_str(" {}");
                    }
                    self.text.push('\n');
                } else {
                    self.text.push_str(" {");
                    for (local_name, local) in local_classes {
                        self.append_class(Some(id), local_name, local, indent + 1);
                    }
                    self.push_indent(indent);
                    self.text.push_str("}\n");
                }
                self.declarations[id].span = Span::new(start, self.text.len());
                id
            }
            MemberSpec::Property {
                name,
                type_ref,
                has_initializer,
            } => {
                let start = self.text.len();
                self.push_indent(indent);
                self.text.push_str("val ");
                let name_start = self.text.len();
                self.text.push_str(&name);
                let name_span = Span::new(name_start, self.text.len());
                let rendered_type = type_ref.map(|ty| {
                    self.text.push_str(": ");
                    self.push_type_reference(&ty)
                });
                if has_initializer {
                    self.text.push_str(" = TODO()");
                }
                self.text.push('\n');
                self.declarations.push(DeclarationNode {
                    parent,
                    span: Span::new(start, self.text.len()),
                    name_span,
                    kind: DeclarationKind::Property(PropertyNode {
                        name,
                        modifiers: Modifiers::default(),
                        type_ref: rendered_type,
                        has_initializer,
                    }),
                })
            }
        }
    }

    fn push_type_reference(&mut self, dotted: &str) -> TypeReference {
        let start = self.text.len();
        self.text.push_str(dotted);
        TypeReference {
            segments: dotted.split('.').map(Name::from).collect(),
            span: Span::new(start, self.text.len()),
        }
    }

    fn push_modifiers(&mut self, modifiers: &Modifiers) {
        match modifiers.visibility {
            Visibility::Public => {}
            Visibility::Internal => self.text.push_str("internal "),
            Visibility::Private => self.text.push_str("private "),
        }
        match modifiers.modality {
            Modality::Final => {}
            Modality::Open => self.text.push_str("open "),
            Modality::Abstract => self.text.push_str("abstract "),
        }
    }

    fn push_indent(&mut self, indent: usize) {
        for _ in 0..indent {
            self.text.push_str("    ");
        }
    }
}

/// Collects the pieces of one class-like declaration.
pub struct ClassBuilder {
    kind: ClassKind,
    modifiers: Modifiers,
    type_parameters: Vec<Name>,
    constructor_parameters: Vec<(Name, String)>,
    supertypes: Vec<String>,
    members: Vec<MemberSpec>,
}

enum MemberSpec {
    Class {
        name: Name,
        builder: ClassBuilder,
    },
    Function {
        name: Name,
        parameters: Vec<(Name, String)>,
        return_type: Option<String>,
        has_body: bool,
        local_classes: Vec<(Name, ClassBuilder)>,
    },
    Property {
        name: Name,
        type_ref: Option<String>,
        has_initializer: bool,
    },
}

/// Collects the pieces of one function declaration. Classes added through
/// [`FunctionBuilder::local_class`] land in the function body, parented to
/// the function rather than to a class or the file.
pub struct FunctionBuilder {
    parameters: Vec<(Name, String)>,
    return_type: Option<String>,
    local_classes: Vec<(Name, ClassBuilder)>,
}

impl FunctionBuilder {
    fn new() -> Self {
        Self {
            parameters: Vec::new(),
            return_type: None,
            local_classes: Vec::new(),
        }
    }

    pub fn parameter(mut self, name: &str, type_ref: &str) -> Self {
        self.parameters
            .push((Name::from(name), type_ref.to_string()));
        self
    }

    pub fn returns(mut self, type_ref: &str) -> Self {
        self.return_type = Some(type_ref.to_string());
        self
    }

    /// A class declared locally inside the function body.
    pub fn local_class(mut self, name: &str, f: impl FnOnce(ClassBuilder) -> ClassBuilder) -> Self {
        self.local_classes
            .push((Name::from(name), f(ClassBuilder::new(ClassKind::Class))));
        self
    }
}

impl ClassBuilder {
    fn new(kind: ClassKind) -> Self {
        Self {
            kind,
            modifiers: Modifiers::default(),
            type_parameters: Vec::new(),
            constructor_parameters: Vec::new(),
            supertypes: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.modifiers.visibility = visibility;
        self
    }

    pub fn modality(mut self, modality: Modality) -> Self {
        self.modifiers.modality = modality;
        self
    }

    pub fn type_parameter(mut self, name: &str) -> Self {
        self.type_parameters.push(Name::from(name));
        self
    }

    /// A primary-constructor parameter with a dotted type.
    pub fn constructor_parameter(mut self, name: &str, type_ref: &str) -> Self {
        self.constructor_parameters
            .push((Name::from(name), type_ref.to_string()));
        self
    }

    /// A supertype reference, dotted or simple.
    pub fn supertype(mut self, type_ref: &str) -> Self {
        self.supertypes.push(type_ref.to_string());
        self
    }

    /// A member function with a body, no parameters, unit return type.
    pub fn function(self, name: &str) -> Self {
        self.function_with(name, &[], None)
    }

    pub fn function_with(
        mut self,
        name: &str,
        parameters: &[(&str, &str)],
        return_type: Option<&str>,
    ) -> Self {
        self.members.push(MemberSpec::Function {
            name: Name::from(name),
            parameters: parameters
                .iter()
                .map(|(n, t)| (Name::from(*n), (*t).to_string()))
                .collect(),
            return_type: return_type.map(str::to_string),
            has_body: true,
            local_classes: Vec::new(),
        });
        self
    }

    pub fn property(mut self, name: &str, type_ref: Option<&str>, has_initializer: bool) -> Self {
        self.members.push(MemberSpec::Property {
            name: Name::from(name),
            type_ref: type_ref.map(str::to_string),
            has_initializer,
        });
        self
    }

    pub fn nested_class(mut self, name: &str, f: impl FnOnce(Self) -> Self) -> Self {
        self.members.push(MemberSpec::Class {
            name: Name::from(name),
            builder: f(Self::new(ClassKind::Class)),
        });
        self
    }

    pub fn nested_object(mut self, name: &str, f: impl FnOnce(Self) -> Self) -> Self {
        self.members.push(MemberSpec::Class {
            name: Name::from(name),
            builder: f(Self::new(ClassKind::Object)),
        });
        self
    }
}
