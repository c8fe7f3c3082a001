//! Eager traversal over lazy descriptor fields.
//!
//! Used by `force_resolve_all` to compute everything reachable before the
//! session is shared across threads. Failed fields are skipped: any cycle they
//! carry was already diagnosed when the field was first computed.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::descriptors::{Descriptor, ResolvedType};
use crate::scopes::LookupScope;

#[derive(Debug, Default)]
pub(crate) struct ForceResolver {
    visited: FxHashSet<usize>,
}

impl ForceResolver {
    pub(crate) fn force(&mut self, descriptor: &Descriptor) {
        if !self.visited.insert(descriptor.ptr_key()) {
            return;
        }
        match descriptor {
            Descriptor::Class(class) => {
                if let Ok(parameters) = class.type_parameters() {
                    for parameter in parameters.iter() {
                        self.force(&Descriptor::TypeParameter(Arc::clone(parameter)));
                    }
                }
                if let Ok(parameters) = class.constructor_parameters() {
                    for parameter in parameters.iter() {
                        self.force_type(&parameter.resolved_type);
                    }
                }
                if let Ok(supertypes) = class.supertypes() {
                    for supertype in supertypes.iter() {
                        self.force_type(&supertype.resolved);
                    }
                }
                if let Ok(scope) = class.member_scope() {
                    for member in scope.all_descriptors() {
                        self.force(&member);
                    }
                }
            }
            Descriptor::Function(function) => {
                if let Ok(signature) = function.signature() {
                    for parameter in &signature.value_parameters {
                        self.force_type(&parameter.resolved_type);
                    }
                    self.force_type(&signature.return_type);
                }
            }
            Descriptor::Property(property) => {
                if let Ok(resolved) = property.resolved_type() {
                    self.force_type(&resolved);
                }
            }
            Descriptor::TypeParameter(_) | Descriptor::ValueParameter(_) => {}
            Descriptor::PackageFragment(fragment) => {
                if let Ok(scope) = fragment.member_scope() {
                    for member in scope.all_descriptors() {
                        self.force(&member);
                    }
                }
            }
        }
    }

    fn force_type(&mut self, resolved: &ResolvedType) {
        if let ResolvedType::Class(class) = resolved {
            self.force(&Descriptor::Class(Arc::clone(class)));
        }
    }
}
