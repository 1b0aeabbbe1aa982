//! The finalized form of a synthesized type.

use std::sync::Arc;

use veneer_ir::LoweredBody;
use veneer_types::{MethodFlags, MethodRef, Ty, TypeFlags};

use crate::error::SynthesisError;
use crate::generics::EmittedGenericParam;

/// Shared handle to a finalized type. Cheap to clone; compared by identity
/// with [`Arc::ptr_eq`].
pub type TypeHandle = Arc<SynthesizedType>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmittedField {
    pub name: String,
    pub ty: Ty,
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmittedMethod {
    pub name: String,
    pub flags: MethodFlags,
    pub generics: Vec<EmittedGenericParam>,
    pub params: Vec<Ty>,
    pub ret: Ty,
    /// The source method this one overrides or implements.
    pub overrides: Option<MethodRef>,
    pub body: LoweredBody,
}

impl EmittedMethod {
    /// An instance constructor. Type initializers are static.
    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR) && !self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_type_initializer(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR | MethodFlags::STATIC)
    }

    /// Same name, generic arity and parameter types.
    pub fn same_signature(&self, other: &EmittedMethod) -> bool {
        self.name == other.name
            && self.generics.len() == other.generics.len()
            && self.params == other.params
    }
}

/// An event and the names of its accessor methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmittedEvent {
    pub name: String,
    pub handler: Ty,
    pub add: String,
    pub remove: String,
}

/// A property and the names of its accessor methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmittedProperty {
    pub name: String,
    pub ty: Ty,
    pub get: Option<String>,
    pub set: Option<String>,
}

/// A finalized, constructible type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesizedType {
    pub name: String,
    pub flags: TypeFlags,
    pub base: Ty,
    pub interfaces: Vec<Ty>,
    pub generics: Vec<EmittedGenericParam>,
    pub fields: Vec<EmittedField>,
    /// Methods in generation order.
    pub methods: Vec<EmittedMethod>,
    pub events: Vec<EmittedEvent>,
    pub properties: Vec<EmittedProperty>,
}

impl SynthesizedType {
    pub fn constructors(&self) -> impl Iterator<Item = &EmittedMethod> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// The static constructor, if one was declared.
    pub fn type_initializer(&self) -> Option<&EmittedMethod> {
        self.methods.iter().find(|m| m.is_type_initializer())
    }

    /// Methods named `name`, in generation order.
    pub fn methods_named(&self, name: &str) -> impl Iterator<Item = &EmittedMethod> {
        let name = name.to_owned();
        self.methods.iter().filter(move |m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&EmittedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&EmittedProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Methods generated so far for one type under construction.
#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    owner: String,
    methods: Vec<EmittedMethod>,
}

impl MemberTable {
    pub(crate) fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            methods: Vec::new(),
        }
    }

    /// Add a generated method, rejecting a second method with the same
    /// signature.
    pub(crate) fn insert(&mut self, method: EmittedMethod) -> Result<(), SynthesisError> {
        if self.methods.iter().any(|m| m.same_signature(&method)) {
            return Err(SynthesisError::DuplicateMemberDefinition {
                owner: self.owner.clone(),
                name: method.name,
            });
        }
        self.methods.push(method);
        Ok(())
    }

    pub fn methods(&self) -> &[EmittedMethod] {
        &self.methods
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn into_methods(self) -> Vec<EmittedMethod> {
        self.methods
    }
}
