//! Type emitter: the aggregate of everything declared on one synthesized
//! type.
//!
//! Owns the type's fields and its method, event and property emitters, and
//! turns them into a single [`SynthesizedType`] when finalized. Finalization fills
//! the gaps a caller may leave (a default constructor, default bodies) and
//! then checks the result as a whole: every interface method and abstract
//! base method is implemented, and no signature still mentions a generic
//! parameter of a source member.

use std::sync::Arc;

use veneer_ir::{Dispatch, Expression, FieldIndex, FieldReference, Reference, Statement};
use veneer_types::{
    GenericOwner, GenericParamRef, MethodFlags, MethodRef, Name, Ty, TypeFlags, TypePool,
};

use crate::error::{SynthesisError, TranslationError};
use crate::event::EventEmitter;
use crate::format::describe_method;
use crate::generics::{copy_signature, EmittedGenericParam, GenericBinder, SignatureTranslator};
use crate::method::MethodEmitter;
use crate::property::PropertyEmitter;
use crate::synthesized::{
    EmittedEvent, EmittedField, EmittedProperty, MemberTable, SynthesizedType, TypeHandle,
};

/// Name every instance constructor is declared under.
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name of the static type initializer.
pub const TYPE_INITIALIZER_NAME: &str = ".cctor";

/// A method emitter owned by a [`TypeEmitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodHandle(u32);

impl MethodHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// An event emitter owned by a [`TypeEmitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandle(u32);

impl EventHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A property emitter owned by a [`TypeEmitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyHandle(u32);

impl PropertyHandle {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Builds one synthesized type.
pub struct TypeEmitter<'p> {
    pool: &'p TypePool,
    name: String,
    base: Ty,
    interfaces: Vec<Ty>,
    verify_bodies: bool,
    generics: Option<Vec<EmittedGenericParam>>,
    fields: Vec<EmittedField>,
    methods: Vec<MethodEmitter>,
    events: Vec<EventEmitter>,
    properties: Vec<PropertyEmitter>,
    table: MemberTable,
    finalized: bool,
}

impl<'p> TypeEmitter<'p> {
    pub fn new(pool: &'p TypePool, name: &str, base: Ty, interfaces: Vec<Ty>) -> Self {
        Self {
            pool,
            name: name.to_owned(),
            base,
            interfaces,
            verify_bodies: true,
            generics: None,
            fields: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
            table: MemberTable::new(name),
            finalized: false,
        }
    }

    /// Whether generated bodies are run through the verifier.
    #[must_use]
    pub fn with_verification(mut self, verify_bodies: bool) -> Self {
        self.verify_bodies = verify_bodies;
        self
    }

    pub fn pool(&self) -> &'p TypePool {
        self.pool
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> &Ty {
        &self.base
    }

    pub fn interfaces(&self) -> &[Ty] {
        &self.interfaces
    }

    pub fn generic_parameters(&self) -> &[EmittedGenericParam] {
        self.generics.as_deref().unwrap_or_default()
    }

    /// Methods generated so far.
    pub fn member_table(&self) -> &MemberTable {
        &self.table
    }

    fn ensure_open(&self) -> Result<(), SynthesisError> {
        if self.finalized {
            return Err(SynthesisError::AlreadyFinalized {
                ty: self.name.clone(),
            });
        }
        Ok(())
    }

    // Fields

    pub fn create_field(&mut self, name: &str, ty: Ty) -> Result<FieldReference, SynthesisError> {
        let index = self.push_field(name, ty.clone(), false)?;
        Ok(FieldReference::instance(index, name, ty))
    }

    pub fn create_static_field(
        &mut self,
        name: &str,
        ty: Ty,
    ) -> Result<FieldReference, SynthesisError> {
        let index = self.push_field(name, ty.clone(), true)?;
        Ok(FieldReference::static_field(index, name, ty))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "field count never exceeds u32"
    )]
    fn push_field(
        &mut self,
        name: &str,
        ty: Ty,
        is_static: bool,
    ) -> Result<FieldIndex, SynthesisError> {
        self.ensure_open()?;
        if self.fields.iter().any(|f| f.name == name) {
            return Err(self.duplicate(name));
        }
        let index = FieldIndex::new(self.fields.len() as u32);
        self.fields.push(EmittedField {
            name: name.to_owned(),
            ty,
            is_static,
        });
        Ok(index)
    }

    /// A field declared on this type.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "field count never exceeds u32"
    )]
    pub fn field(&self, name: &str) -> Option<FieldReference> {
        let (index, field) = self
            .fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)?;
        let index = FieldIndex::new(index as u32);
        Some(if field.is_static {
            FieldReference::static_field(index, name, field.ty.clone())
        } else {
            FieldReference::instance(index, name, field.ty.clone())
        })
    }

    // Methods

    pub fn create_method(
        &mut self,
        name: &str,
        flags: MethodFlags,
    ) -> Result<MethodHandle, SynthesisError> {
        self.ensure_open()?;
        Ok(self.push_method(MethodEmitter::new(name, flags)))
    }

    /// Create an override of `source`, with its signature copied through
    /// `translator`.
    pub fn create_method_from(
        &mut self,
        source: &MethodRef,
        translator: SignatureTranslator,
    ) -> Result<MethodHandle, SynthesisError> {
        self.ensure_open()?;
        let method = self.pool.method(source.method);
        if !self.pool.is_interface(&source.declaring) && !method.flags.is_overridable() {
            return Err(SynthesisError::NonVirtualMember {
                member: describe_method(self.pool, source),
            });
        }
        let flags = MethodFlags::OVERRIDE | (method.flags & MethodFlags::SPECIAL_NAME);
        let mut emitter = MethodEmitter::from_source(
            self.pool,
            self.pool.name(method.name),
            flags,
            source,
            translator,
        )?;
        emitter.set_overrides(source.clone())?;
        Ok(self.push_method(emitter))
    }

    /// Create a new, non-overriding method named `name` whose signature is
    /// copied from `source`.
    pub fn create_method_like(
        &mut self,
        name: &str,
        flags: MethodFlags,
        source: &MethodRef,
        translator: SignatureTranslator,
    ) -> Result<MethodHandle, SynthesisError> {
        self.ensure_open()?;
        let emitter = MethodEmitter::from_source(self.pool, name, flags, source, translator)?;
        Ok(self.push_method(emitter))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "method count never exceeds u32"
    )]
    fn push_method(&mut self, emitter: MethodEmitter) -> MethodHandle {
        let handle = MethodHandle(self.methods.len() as u32);
        self.methods.push(emitter);
        handle
    }

    pub fn method(&self, handle: MethodHandle) -> &MethodEmitter {
        &self.methods[handle.index()]
    }

    pub fn method_mut(&mut self, handle: MethodHandle) -> &mut MethodEmitter {
        &mut self.methods[handle.index()]
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodHandle, &MethodEmitter)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodHandle(index_u32(i)), m))
    }

    /// Lower `handle`'s body into the member table. Generating a method a
    /// second time does nothing.
    pub fn generate(&mut self, handle: MethodHandle) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        self.methods[handle.index()].generate(self.pool, &mut self.table, self.verify_bodies)
    }

    // Constructors

    pub fn create_constructor(&mut self, params: &[Ty]) -> Result<MethodHandle, SynthesisError> {
        let handle = self.create_method(
            CONSTRUCTOR_NAME,
            MethodFlags::CONSTRUCTOR | MethodFlags::PUBLIC,
        )?;
        self.methods[handle.index()].set_parameters(params)?;
        Ok(handle)
    }

    /// The static `.cctor`, run once before the type is first used. A type
    /// has at most one.
    pub fn create_type_constructor(&mut self) -> Result<MethodHandle, SynthesisError> {
        self.ensure_open()?;
        if self.methods.iter().any(|m| m.name() == TYPE_INITIALIZER_NAME) {
            return Err(self.duplicate(TYPE_INITIALIZER_NAME));
        }
        self.create_method(
            TYPE_INITIALIZER_NAME,
            MethodFlags::CONSTRUCTOR | MethodFlags::STATIC | MethodFlags::SPECIAL_NAME,
        )
    }

    /// A parameterless constructor that chains to the base default
    /// constructor.
    pub fn create_default_constructor(&mut self) -> Result<MethodHandle, SynthesisError> {
        let handle = self.create_constructor(&[])?;
        if let Some(call) = self.base_constructor_call()? {
            self.methods[handle.index()].add_statement(call)?;
        }
        self.methods[handle.index()].add_statement(Statement::Return(None))?;
        Ok(handle)
    }

    /// `base()` as a statement, or `None` when the base declares no
    /// constructors at all.
    pub fn base_constructor_call(&self) -> Result<Option<Statement>, SynthesisError> {
        let Some(def) = self.pool.def_of(&self.base) else {
            return Ok(None);
        };
        if let Some(ctor) = self.pool.default_constructor(def) {
            return Ok(Some(Statement::Expr(Expression::Invoke {
                receiver: Some(Box::new(Reference::This.load())),
                method: ctor,
                generic_args: Vec::new(),
                args: Vec::new(),
                dispatch: Dispatch::Direct,
                ret: Ty::Void,
            })));
        }
        if self.pool.has_instance_constructors(def) {
            return Err(SynthesisError::InvalidProxyTarget {
                ty: self.pool.display(&self.base),
                reason: "the base type has no parameterless constructor",
            });
        }
        Ok(None)
    }

    // Events

    /// Declare an event with `add_<name>` / `remove_<name>` accessors
    /// taking a `handler`.
    pub fn create_event(
        &mut self,
        name: &str,
        handler: Ty,
        flags: MethodFlags,
    ) -> Result<EventHandle, SynthesisError> {
        self.ensure_open()?;
        if self.events.iter().any(|e| e.name() == name) {
            return Err(self.duplicate(name));
        }
        let add_name = format!("add_{name}");
        let remove_name = format!("remove_{name}");
        self.ensure_unnamed(&[add_name.as_str(), remove_name.as_str()])?;

        let flags = flags | MethodFlags::SPECIAL_NAME;
        let add = self.create_method(&add_name, flags)?;
        let remove = self.create_method(&remove_name, flags)?;
        for accessor in [add, remove] {
            self.methods[accessor.index()].set_parameters(std::slice::from_ref(&handler))?;
        }
        let handle = EventHandle(index_u32(self.events.len()));
        self.events
            .push(EventEmitter::new(name.to_owned(), handler, add, remove));
        Ok(handle)
    }

    pub fn event(&self, handle: EventHandle) -> &EventEmitter {
        &self.events[handle.index()]
    }

    /// Generate both accessors of an event.
    pub fn generate_event(&mut self, handle: EventHandle) -> Result<(), SynthesisError> {
        for accessor in self.events[handle.index()].accessors() {
            self.generate(accessor)?;
        }
        Ok(())
    }

    fn ensure_unnamed(&self, names: &[&str]) -> Result<(), SynthesisError> {
        match names
            .iter()
            .find(|n| self.methods.iter().any(|m| m.name() == **n))
        {
            Some(taken) => Err(self.duplicate(taken)),
            None => Ok(()),
        }
    }

    // Properties

    /// Declare a property of type `ty` with a `get_<name>` accessor, a
    /// `set_<name>` accessor, or both.
    pub fn create_property(
        &mut self,
        name: &str,
        ty: Ty,
        flags: MethodFlags,
        readable: bool,
        writable: bool,
    ) -> Result<PropertyHandle, SynthesisError> {
        self.ensure_open()?;
        if !readable && !writable {
            return Err(SynthesisError::InvalidProxyTarget {
                ty: format!("{}.{name}", self.name),
                reason: "a property needs at least one accessor",
            });
        }
        if self.properties.iter().any(|p| p.name() == name) {
            return Err(self.duplicate(name));
        }
        let get_name = format!("get_{name}");
        let set_name = format!("set_{name}");
        self.ensure_unnamed(&[get_name.as_str(), set_name.as_str()])?;

        let flags = flags | MethodFlags::SPECIAL_NAME;
        let get = if readable {
            let get = self.create_method(&get_name, flags)?;
            self.methods[get.index()].set_return_type(ty.clone())?;
            Some(get)
        } else {
            None
        };
        let set = if writable {
            let set = self.create_method(&set_name, flags)?;
            self.methods[set.index()].set_parameters(std::slice::from_ref(&ty))?;
            Some(set)
        } else {
            None
        };
        let handle = PropertyHandle(index_u32(self.properties.len()));
        self.properties
            .push(PropertyEmitter::new(name.to_owned(), ty, get, set));
        Ok(handle)
    }

    pub fn property(&self, handle: PropertyHandle) -> &PropertyEmitter {
        &self.properties[handle.index()]
    }

    /// Generate every accessor of a property.
    pub fn generate_property(&mut self, handle: PropertyHandle) -> Result<(), SynthesisError> {
        let accessors: Vec<MethodHandle> = self.properties[handle.index()].accessors().collect();
        for accessor in accessors {
            self.generate(accessor)?;
        }
        Ok(())
    }

    // Generic parameters

    /// Declare this type's generic parameters as copies of `source`'s.
    /// Members can then refer to them through
    /// [`translate_onto_type_params`](crate::translate_onto_type_params).
    ///
    /// The parameter list is fixed by the first call, even when `source`
    /// has no generic parameters; a second call fails.
    pub fn copy_generic_parameters_from(
        &mut self,
        source: &MethodRef,
    ) -> Result<(), SynthesisError> {
        self.ensure_open()?;
        if self.generics.is_some() {
            return Err(SynthesisError::GenericParametersAlreadyDefined {
                owner: self.name.clone(),
            });
        }
        let pool = self.pool;
        copy_signature(pool, source, self)?;
        self.generics.get_or_insert_with(Vec::new);
        Ok(())
    }

    // Finalization

    /// Complete the type and hand out its descriptor.
    ///
    /// Adds a default constructor if none was declared, gives every method
    /// without a body the default one, generates everything not yet
    /// generated, then checks the aggregate.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = %self.name))]
    pub fn finalize(&mut self) -> Result<TypeHandle, SynthesisError> {
        self.ensure_open()?;
        if !self.methods.iter().any(MethodEmitter::is_constructor) {
            self.create_default_constructor()?;
        }
        for method in &mut self.methods {
            method.ensure_valid_code_block();
            method.generate(self.pool, &mut self.table, self.verify_bodies)?;
        }
        self.check_implementations()?;
        self.check_translated()?;

        let method_name = |h: MethodHandle| self.methods[h.index()].name().to_owned();
        let events = self
            .events
            .iter()
            .map(|e| EmittedEvent {
                name: e.name().to_owned(),
                handler: e.handler().clone(),
                add: method_name(e.add_method()),
                remove: method_name(e.remove_method()),
            })
            .collect();
        let properties = self
            .properties
            .iter()
            .map(|p| EmittedProperty {
                name: p.name().to_owned(),
                ty: p.ty().clone(),
                get: p.get_method().map(method_name),
                set: p.set_method().map(method_name),
            })
            .collect();
        self.finalized = true;
        let table = std::mem::take(&mut self.table);
        let ty = SynthesizedType {
            name: self.name.clone(),
            flags: TypeFlags::SYNTHESIZED,
            base: self.base.clone(),
            interfaces: self.interfaces.clone(),
            generics: self.generics.take().unwrap_or_default(),
            fields: std::mem::take(&mut self.fields),
            methods: table.into_methods(),
            events,
            properties,
        };
        tracing::debug!(
            fields = ty.fields.len(),
            methods = ty.methods.len(),
            events = ty.events.len(),
            properties = ty.properties.len(),
            "type finalized"
        );
        Ok(Arc::new(ty))
    }

    /// Every interface method, and every abstract method of the base, has
    /// an implementation.
    fn check_implementations(&self) -> Result<(), SynthesisError> {
        let inherited = self.pool.all_interfaces(&self.base);
        let mut required = Vec::new();
        for iface in &self.interfaces {
            for iface in self.pool.all_interfaces(iface) {
                if inherited.contains(&iface) {
                    continue;
                }
                required.extend(
                    self.pool
                        .methods_of(&iface)
                        .into_iter()
                        .filter(|m| !self.pool.method(m.method).is_static()),
                );
            }
        }
        required.extend(self.pool.unimplemented_abstract_methods(&self.base));

        for source in &required {
            if !self.implements(source) {
                return Err(SynthesisError::MissingImplementation {
                    ty: self.name.clone(),
                    member: describe_method(self.pool, source),
                });
            }
        }
        Ok(())
    }

    /// Whether a generated method overrides `source`, either explicitly or
    /// by matching its name and closed signature.
    fn implements(&self, source: &MethodRef) -> bool {
        let method = self.pool.method(source.method);
        let params: Vec<Ty> = method
            .param_types()
            .map(|t| self.pool.substitute_declaring(t, &source.declaring))
            .collect();
        self.table.methods().iter().any(|m| {
            m.overrides.as_ref() == Some(source)
                || (m.name == self.pool.name(method.name)
                    && m.flags.contains(MethodFlags::VIRTUAL)
                    && m.generics.len() == method.generics.len()
                    && m.params == params)
        })
    }

    /// No signature or constraint mentions a generic parameter that does not
    /// belong to the synthesized type or the member itself.
    fn check_translated(&self) -> Result<(), SynthesisError> {
        let type_arity = self.generic_parameters().len();
        for field in &self.fields {
            self.check_params_in(&field.ty, 0, type_arity, &field.name)?;
        }
        for param in self.generic_parameters() {
            for ty in param.constraint_types() {
                self.check_params_in(ty, 0, type_arity, &self.name)?;
            }
        }
        for method in self.table.methods() {
            let label = method.name.as_str();
            let arity = method.generics.len();
            let constraints = method.generics.iter().flat_map(|g| g.constraint_types());
            for ty in method
                .params
                .iter()
                .chain(std::iter::once(&method.ret))
                .chain(constraints)
            {
                self.check_params_in(ty, arity, type_arity, label)?;
            }
        }
        Ok(())
    }

    fn check_params_in(
        &self,
        ty: &Ty,
        method_arity: usize,
        type_arity: usize,
        member: &str,
    ) -> Result<(), TranslationError> {
        let mut leftover: Option<GenericParamRef> = None;
        ty.any_param(&mut |p| {
            let in_scope = match p.owner {
                GenericOwner::EmittedMethod => (p.index as usize) < method_arity,
                GenericOwner::EmittedType => (p.index as usize) < type_arity,
                GenericOwner::Method(_) | GenericOwner::Type(_) => false,
            };
            if !in_scope {
                leftover = Some(p);
            }
            !in_scope
        });
        match leftover {
            Some(p) => Err(TranslationError::LeftoverParameter {
                member: format!("{}.{member}", self.name),
                param: self.pool.display(&Ty::Param(p)),
            }),
            None => Ok(()),
        }
    }

    fn duplicate(&self, name: &str) -> SynthesisError {
        SynthesisError::DuplicateMemberDefinition {
            owner: self.name.clone(),
            name: name.to_owned(),
        }
    }
}

impl GenericBinder for TypeEmitter<'_> {
    fn generic_owner(&self) -> GenericOwner {
        GenericOwner::EmittedType
    }

    fn define_generic_parameters(
        &mut self,
        names: &[Name],
    ) -> Result<&mut [EmittedGenericParam], SynthesisError> {
        if self.generics.is_some() {
            return Err(SynthesisError::GenericParametersAlreadyDefined {
                owner: self.name.clone(),
            });
        }
        let params = names.iter().copied().map(EmittedGenericParam::new).collect();
        Ok(self.generics.insert(params).as_mut_slice())
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "member counts never exceed u32"
)]
fn index_u32(index: usize) -> u32 {
    index as u32
}
