//! Registry of type, method, event and property descriptors.
//!
//! The pool is the engine's view of "reflection": every base type,
//! interface and source member a proxy is synthesized against is registered
//! here first. Once populated the pool is only read, so a single
//! `Arc<TypePool>` can back any number of concurrent syntheses.

mod format;

use rustc_hash::FxHashMap;

use crate::flags::{GenericParamAttrs, MethodFlags, TypeFlags};
use crate::name::{Name, NameTable};
use crate::ty::{DefId, EventId, GenericOwner, GenericParamRef, MethodId, PropertyId, Ty};

/// What kind of type a definition describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeDefKind {
    Class,
    Interface,
    Struct,
}

/// A generic parameter declaration: name, special attributes and constraints.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericParamDef {
    pub name: Name,
    pub attrs: GenericParamAttrs,
    /// Interface constraints and at most one base-class constraint, in
    /// declaration order.
    pub constraints: Vec<Ty>,
}

impl GenericParamDef {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            attrs: GenericParamAttrs::empty(),
            constraints: Vec::new(),
        }
    }
}

/// A named type definition.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: Name,
    pub kind: TypeDefKind,
    pub flags: TypeFlags,
    pub base: Option<Ty>,
    pub interfaces: Vec<Ty>,
    pub generics: Vec<GenericParamDef>,
    pub methods: Vec<MethodId>,
    pub events: Vec<EventId>,
    pub properties: Vec<PropertyId>,
}

/// A formal parameter. By-ref parameters carry a [`Ty::ByRef`] type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamDef {
    pub name: Name,
    pub ty: Ty,
}

/// A method or constructor descriptor.
#[derive(Clone, Debug)]
pub struct MethodDef {
    pub name: Name,
    pub declaring: DefId,
    pub flags: MethodFlags,
    pub params: Vec<ParamDef>,
    pub ret: Ty,
    pub generics: Vec<GenericParamDef>,
}

impl MethodDef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.flags.contains(MethodFlags::CONSTRUCTOR)
    }

    pub fn param_types(&self) -> impl Iterator<Item = &Ty> {
        self.params.iter().map(|p| &p.ty)
    }
}

/// An event: a named pair of subscribe/unsubscribe accessors.
#[derive(Clone, Debug)]
pub struct EventDef {
    pub name: Name,
    pub declaring: DefId,
    pub handler: Ty,
    pub add: MethodId,
    pub remove: MethodId,
}

/// A property: a named value type with a getter, a setter, or both.
#[derive(Clone, Debug)]
pub struct PropertyDef {
    pub name: Name,
    pub declaring: DefId,
    pub ty: Ty,
    pub get: Option<MethodId>,
    pub set: Option<MethodId>,
}

impl PropertyDef {
    pub fn accessors(&self) -> impl Iterator<Item = MethodId> {
        self.get.into_iter().chain(self.set)
    }
}

/// A method as seen through its (possibly closed generic) declaring type.
///
/// `declaring` is `Ty::Named(def)` for non-generic types and
/// `Ty::Instance { def, args }` for members reached through a closed generic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub method: MethodId,
    pub declaring: Ty,
}

/// Infrastructure types every synthesized proxy refers to.
#[derive(Clone, Copy, Debug)]
pub struct WellKnown {
    /// Value type identifying a forwarded source method.
    pub method_token: DefId,
    /// The interceptor pipeline handed to every proxy constructor.
    pub interceptor_chain: DefId,
    /// `InterceptorChain.invoke(MethodToken, object, object[]) -> object`.
    pub chain_invoke: MethodId,
}

/// The descriptor registry.
pub struct TypePool {
    names: NameTable,
    defs: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    events: Vec<EventDef>,
    properties: Vec<PropertyDef>,
    by_name: FxHashMap<Name, DefId>,
    well_known: WellKnown,
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

impl TypePool {
    /// Create a pool with the well-known infrastructure types registered.
    pub fn new() -> Self {
        let mut pool = Self {
            names: NameTable::new(),
            defs: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
            by_name: FxHashMap::default(),
            well_known: WellKnown {
                method_token: DefId::new(0),
                interceptor_chain: DefId::new(0),
                chain_invoke: MethodId::new(0),
            },
        };

        let method_token = pool.define_type("Veneer.MethodToken", TypeDefKind::Struct);
        pool.defs[method_token.index()].flags |= TypeFlags::SEALED;
        let interceptor_chain = pool.define_type("Veneer.InterceptorChain", TypeDefKind::Class);
        pool.defs[interceptor_chain.index()].flags |= TypeFlags::SEALED;
        let chain_invoke = pool.add_method(
            interceptor_chain,
            "invoke",
            MethodFlags::PUBLIC,
            &[
                ("token", Ty::Named(method_token)),
                ("target", Ty::Object),
                ("args", Ty::array_of(Ty::Object)),
            ],
            Ty::Object,
        );
        pool.well_known = WellKnown {
            method_token,
            interceptor_chain,
            chain_invoke,
        };
        pool
    }

    // Names

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    #[inline]
    pub fn intern(&mut self, s: &str) -> Name {
        self.names.intern(s)
    }

    #[inline]
    pub fn name(&self, name: Name) -> &str {
        self.names.lookup(name)
    }

    pub fn well_known(&self) -> WellKnown {
        self.well_known
    }

    // Registration

    /// Register a new named type definition.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "definition count never exceeds u32"
    )]
    pub fn define_type(&mut self, name: &str, kind: TypeDefKind) -> DefId {
        let id = DefId::new(self.defs.len() as u32);
        let name = self.intern(name);
        let base = match kind {
            TypeDefKind::Class => Some(Ty::Object),
            TypeDefKind::Interface | TypeDefKind::Struct => None,
        };
        self.defs.push(TypeDef {
            name,
            kind,
            flags: TypeFlags::empty(),
            base,
            interfaces: Vec::new(),
            generics: Vec::new(),
            methods: Vec::new(),
            events: Vec::new(),
            properties: Vec::new(),
        });
        self.by_name.insert(name, id);
        id
    }

    pub fn def_mut(&mut self, def: DefId) -> &mut TypeDef {
        &mut self.defs[def.index()]
    }

    /// Declare the next generic parameter of a pool type definition.
    ///
    /// Returns the parameter as a type, for use in signatures and constraints.
    pub fn add_type_generic_param(&mut self, def: DefId, name: &str) -> Ty {
        let param = GenericParamDef::new(self.intern(name));
        let list = &mut self.defs[def.index()].generics;
        let index = Self::next_index(list);
        list.push(param);
        Ty::type_param(def, index)
    }

    /// Declare the next generic parameter of a pool method.
    pub fn add_method_generic_param(&mut self, method: MethodId, name: &str) -> Ty {
        let param = GenericParamDef::new(self.intern(name));
        let list = &mut self.methods[method.index()].generics;
        let index = Self::next_index(list);
        list.push(param);
        Ty::method_param(method, index)
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "generic arity never exceeds u32"
    )]
    fn next_index(list: &[GenericParamDef]) -> u32 {
        list.len() as u32
    }

    /// Set the attributes and constraints of a pool generic parameter.
    pub fn constrain_generic_param(
        &mut self,
        param: &Ty,
        attrs: GenericParamAttrs,
        constraints: Vec<Ty>,
    ) {
        let Ty::Param(p) = param else {
            return;
        };
        let slot = match p.owner {
            GenericOwner::Method(m) => self.methods[m.index()].generics.get_mut(p.index as usize),
            GenericOwner::Type(d) => self.defs[d.index()].generics.get_mut(p.index as usize),
            GenericOwner::EmittedMethod | GenericOwner::EmittedType => None,
        };
        if let Some(def) = slot {
            def.attrs = attrs;
            def.constraints = constraints;
        }
    }

    /// Declare a method with no parameters yet. Use this when the signature
    /// mentions the method's own generic parameters.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "method count never exceeds u32"
    )]
    pub fn declare_method(&mut self, declaring: DefId, name: &str, flags: MethodFlags) -> MethodId {
        let id = MethodId::new(self.methods.len() as u32);
        let name = self.intern(name);
        self.methods.push(MethodDef {
            name,
            declaring,
            flags,
            params: Vec::new(),
            ret: Ty::Void,
            generics: Vec::new(),
        });
        self.defs[declaring.index()].methods.push(id);
        id
    }

    pub fn set_signature(&mut self, method: MethodId, params: &[(&str, Ty)], ret: Ty) {
        let params = params
            .iter()
            .map(|(name, ty)| ParamDef {
                name: self.intern(name),
                ty: ty.clone(),
            })
            .collect();
        let def = &mut self.methods[method.index()];
        def.params = params;
        def.ret = ret;
    }

    /// Declare a method and its signature in one step.
    pub fn add_method(
        &mut self,
        declaring: DefId,
        name: &str,
        flags: MethodFlags,
        params: &[(&str, Ty)],
        ret: Ty,
    ) -> MethodId {
        let id = self.declare_method(declaring, name, flags);
        self.set_signature(id, params, ret);
        id
    }

    /// Declare an event along with its `add_`/`remove_` accessors.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "event count never exceeds u32"
    )]
    pub fn add_event(
        &mut self,
        declaring: DefId,
        name: &str,
        flags: MethodFlags,
        handler: Ty,
    ) -> EventId {
        let accessor_flags = flags | MethodFlags::SPECIAL_NAME;
        let params = [("handler", handler.clone())];
        let add = self.add_method(
            declaring,
            &format!("add_{name}"),
            accessor_flags,
            &params,
            Ty::Void,
        );
        let remove = self.add_method(
            declaring,
            &format!("remove_{name}"),
            accessor_flags,
            &params,
            Ty::Void,
        );
        let id = EventId::new(self.events.len() as u32);
        let name = self.intern(name);
        self.events.push(EventDef {
            name,
            declaring,
            handler,
            add,
            remove,
        });
        self.defs[declaring.index()].events.push(id);
        id
    }

    /// Declare a property along with a `get_` accessor, a `set_` accessor,
    /// or both.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "property count never exceeds u32"
    )]
    pub fn add_property(
        &mut self,
        declaring: DefId,
        name: &str,
        flags: MethodFlags,
        ty: Ty,
        readable: bool,
        writable: bool,
    ) -> PropertyId {
        let accessor_flags = flags | MethodFlags::SPECIAL_NAME;
        let get = readable.then(|| {
            self.add_method(declaring, &format!("get_{name}"), accessor_flags, &[], ty.clone())
        });
        let set = writable.then(|| {
            self.add_method(
                declaring,
                &format!("set_{name}"),
                accessor_flags,
                &[("value", ty.clone())],
                Ty::Void,
            )
        });
        let id = PropertyId::new(self.properties.len() as u32);
        let name = self.intern(name);
        self.properties.push(PropertyDef {
            name,
            declaring,
            ty,
            get,
            set,
        });
        self.defs[declaring.index()].properties.push(id);
        id
    }

    // Lookup

    pub fn def(&self, def: DefId) -> &TypeDef {
        &self.defs[def.index()]
    }

    pub fn method(&self, method: MethodId) -> &MethodDef {
        &self.methods[method.index()]
    }

    pub fn event(&self, event: EventId) -> &EventDef {
        &self.events[event.index()]
    }

    pub fn property(&self, property: PropertyId) -> &PropertyDef {
        &self.properties[property.index()]
    }

    pub fn lookup_type(&self, name: &str) -> Option<DefId> {
        self.by_name.get(&self.names.get(name)?).copied()
    }

    /// Find a method declared directly on `def` by name.
    pub fn find_method(&self, def: DefId, name: &str) -> Option<MethodId> {
        let name = self.names.get(name)?;
        self.def(def)
            .methods
            .iter()
            .copied()
            .find(|m| self.method(*m).name == name)
    }

    /// The declaration of a pool generic parameter.
    pub fn generic_param(&self, param: GenericParamRef) -> Option<&GenericParamDef> {
        match param.owner {
            GenericOwner::Method(m) => self.method(m).generics.get(param.index as usize),
            GenericOwner::Type(d) => self.def(d).generics.get(param.index as usize),
            GenericOwner::EmittedMethod | GenericOwner::EmittedType => None,
        }
    }

    /// A parameterless instance constructor declared on `def`.
    pub fn default_constructor(&self, def: DefId) -> Option<MethodId> {
        self.def(def).methods.iter().copied().find(|m| {
            let m = self.method(*m);
            m.is_constructor() && !m.is_static() && m.params.is_empty()
        })
    }

    /// Whether `def` declares any instance constructor.
    pub fn has_instance_constructors(&self, def: DefId) -> bool {
        self.def(def).methods.iter().any(|m| {
            let m = self.method(*m);
            m.is_constructor() && !m.is_static()
        })
    }

    // Classification

    /// The definition a named or instantiated type refers to.
    pub fn def_of(&self, ty: &Ty) -> Option<DefId> {
        match ty {
            Ty::Named(def) | Ty::Instance { def, .. } => Some(*def),
            _ => None,
        }
    }

    fn kind_of(&self, ty: &Ty) -> Option<TypeDefKind> {
        self.def_of(ty).map(|d| self.def(d).kind)
    }

    pub fn is_interface(&self, ty: &Ty) -> bool {
        self.kind_of(ty) == Some(TypeDefKind::Interface)
    }

    /// Whether a type can serve as a base class.
    pub fn is_class(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Object | Ty::String) || self.kind_of(ty) == Some(TypeDefKind::Class)
    }

    pub fn is_sealed(&self, ty: &Ty) -> bool {
        match ty {
            Ty::String => true,
            _ => self
                .def_of(ty)
                .is_some_and(|d| self.def(d).flags.contains(TypeFlags::SEALED)),
        }
    }

    /// Whether values of this type are stored inline and must be boxed to
    /// travel as `object`.
    pub fn is_value_type(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Bool | Ty::Int32 | Ty::Int64 | Ty::Float64 => true,
            Ty::Named(_) | Ty::Instance { .. } => self.kind_of(ty) == Some(TypeDefKind::Struct),
            Ty::Void | Ty::String | Ty::Object | Ty::Array(_) | Ty::ByRef(_) | Ty::Param(_) => {
                false
            }
        }
    }

    /// Whether a conversion to `object` must box. Generic parameters always
    /// box; boxing a reference type is the identity.
    pub fn needs_boxing(&self, ty: &Ty) -> bool {
        matches!(ty, Ty::Param(_)) || self.is_value_type(ty)
    }

    /// Whether a type is, or contains, an unbound generic definition.
    ///
    /// A bare `Named` reference to a generic definition is open; so is an
    /// instantiation that binds fewer or more arguments than the definition
    /// declares, or whose arguments mention any generic parameter.
    pub fn is_open_generic(&self, ty: &Ty) -> bool {
        match ty {
            Ty::Named(def) => !self.def(*def).generics.is_empty(),
            Ty::Instance { def, args } => {
                args.len() != self.def(*def).generics.len()
                    || args.iter().any(|a| a.has_params() || self.is_open_generic(a))
            }
            Ty::Array(elem) | Ty::ByRef(elem) => self.is_open_generic(elem),
            Ty::Param(_) => true,
            Ty::Void | Ty::Bool | Ty::Int32 | Ty::Int64 | Ty::Float64 | Ty::String | Ty::Object => {
                false
            }
        }
    }

    // Substitution

    /// Replace the type parameters of `declaring`'s definition with its
    /// concrete arguments. Types mentioning no such parameter are returned
    /// unchanged.
    pub fn substitute_declaring(&self, ty: &Ty, declaring: &Ty) -> Ty {
        let Ty::Instance { def, args } = declaring else {
            return ty.clone();
        };
        let substituted: Result<Ty, std::convert::Infallible> = ty.try_map_params(&mut |p| {
            Ok(match p.owner {
                GenericOwner::Type(owner) if owner == *def => args
                    .get(p.index as usize)
                    .cloned()
                    .unwrap_or(Ty::Param(p)),
                _ => Ty::Param(p),
            })
        });
        match substituted {
            Ok(ty) => ty,
            Err(never) => match never {},
        }
    }

    /// Every interface `ty` implements, transitively, deduplicated, in
    /// declaration order. An interface type includes itself.
    pub fn all_interfaces(&self, ty: &Ty) -> Vec<Ty> {
        let mut out = Vec::new();
        self.collect_interfaces(ty, &mut out);
        out
    }

    fn collect_interfaces(&self, ty: &Ty, out: &mut Vec<Ty>) {
        let Some(def) = self.def_of(ty) else {
            return;
        };
        let td = self.def(def);
        if td.kind == TypeDefKind::Interface && !out.contains(ty) {
            out.push(ty.clone());
        }
        for iface in &td.interfaces {
            let iface = self.substitute_declaring(iface, ty);
            self.collect_interfaces(&iface, out);
        }
        if let Some(base) = &td.base {
            let base = self.substitute_declaring(base, ty);
            self.collect_interfaces(&base, out);
        }
    }

    /// Methods declared directly on `ty`, seen through `ty`.
    pub fn methods_of(&self, ty: &Ty) -> Vec<MethodRef> {
        let Some(def) = self.def_of(ty) else {
            return Vec::new();
        };
        self.def(def)
            .methods
            .iter()
            .map(|&method| MethodRef {
                method,
                declaring: ty.clone(),
            })
            .collect()
    }

    /// The base-class chain of `ty`, most derived first, excluding `ty`.
    pub fn base_chain(&self, ty: &Ty) -> Vec<Ty> {
        let mut chain = Vec::new();
        let mut current = ty.clone();
        while let Some(def) = self.def_of(&current) {
            let Some(base) = &self.def(def).base else {
                break;
            };
            let base = self.substitute_declaring(base, &current);
            chain.push(base.clone());
            current = base;
        }
        chain
    }

    /// Abstract methods on `ty` or its bases that no more-derived class in
    /// the chain implements.
    pub fn unimplemented_abstract_methods(&self, ty: &Ty) -> Vec<MethodRef> {
        let mut chain = vec![ty.clone()];
        chain.extend(self.base_chain(ty));

        let mut implemented: Vec<(Name, Vec<Ty>)> = Vec::new();
        let mut missing = Vec::new();
        for class in &chain {
            for mref in self.methods_of(class) {
                let m = self.method(mref.method);
                if m.is_constructor() {
                    continue;
                }
                let key = (
                    m.name,
                    m.param_types()
                        .map(|t| self.substitute_declaring(t, class))
                        .collect(),
                );
                if m.flags.contains(MethodFlags::ABSTRACT) {
                    if !implemented.contains(&key) {
                        missing.push(mref);
                    }
                } else {
                    implemented.push(key);
                }
            }
        }
        missing
    }
}
