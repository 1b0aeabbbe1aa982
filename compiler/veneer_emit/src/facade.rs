//! Proxy type synthesis.
//!
//! [`synthesize_type`] builds a type that derives from a base class,
//! implements a set of interfaces, and forwards every interface member
//! (methods, and the accessors of events and properties) and every
//! intercepted base member to an interceptor chain:
//!
//! ```text
//! object[] args = { a0, a1, ... };
//! object result = this.__interceptors.invoke(token, target, args);
//! ref/out arguments = args[i];
//! return (R) result;
//! ```
//!
//! `target` is the `__target` field when the proxy wraps an instance, and
//! the proxy itself otherwise. What the chain does with a call is outside
//! this crate.

use veneer_ir::{
    pack_to_object_array, ArgumentReference, Dispatch, Expression, FieldReference,
    LocalReference, Reference, Statement,
};
use veneer_types::{EventId, MethodFlags, MethodId, MethodRef, PropertyId, Ty, TypePool};

use crate::error::SynthesisError;
use crate::format::describe_method;
use crate::generics::copy_signature;
use crate::method::MethodEmitter;
use crate::synthesized::TypeHandle;
use crate::type_emitter::{MethodHandle, TypeEmitter};

/// Field holding the interceptor chain.
pub const INTERCEPTORS_FIELD: &str = "__interceptors";
/// Field holding the wrapped instance, when the proxy has one.
pub const TARGET_FIELD: &str = "__target";
/// Suffix of the methods that call a base implementation directly.
pub const CALLBACK_SUFFIX: &str = "_callback";

/// Shape options of a proxy type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProxyOptions {
    /// Forward to a wrapped instance passed to the constructor.
    pub with_target: bool,
    /// Emit a `<name>_callback` method per intercepted base method.
    pub emit_callbacks: bool,
}

/// Everything that determines a proxy type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyTypeRequest {
    pub name: String,
    pub base: Ty,
    pub interfaces: Vec<Ty>,
    /// Overridable base methods to route through the interceptors.
    /// Abstract base methods are always included.
    pub intercept: Vec<MethodId>,
    pub options: ProxyOptions,
}

impl ProxyTypeRequest {
    pub fn new(name: impl Into<String>, base: Ty) -> Self {
        Self {
            name: name.into(),
            base,
            interfaces: Vec::new(),
            intercept: Vec::new(),
            options: ProxyOptions::default(),
        }
    }

    #[must_use]
    pub fn with_interfaces(mut self, interfaces: impl IntoIterator<Item = Ty>) -> Self {
        self.interfaces.extend(interfaces);
        self
    }

    #[must_use]
    pub fn intercepting(mut self, methods: impl IntoIterator<Item = MethodId>) -> Self {
        self.intercept.extend(methods);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ProxyOptions) -> Self {
        self.options = options;
        self
    }
}

/// Synthesize and finalize a proxy type.
#[tracing::instrument(level = "debug", skip_all, fields(
    name = %request.name,
    interfaces = request.interfaces.len(),
    intercept = request.intercept.len(),
))]
pub fn synthesize_type(
    pool: &TypePool,
    request: &ProxyTypeRequest,
    verify_bodies: bool,
) -> Result<TypeHandle, SynthesisError> {
    validate(pool, request)?;
    let mut emitter = TypeEmitter::new(
        pool,
        &request.name,
        request.base.clone(),
        request.interfaces.clone(),
    )
    .with_verification(verify_bodies);

    let fields = ProxyFields::declare(&mut emitter, request.options)?;
    emit_constructor(&mut emitter, &fields)?;

    let targets = interface_targets(pool, request);
    let intercepted = base_targets(pool, request)?;
    tracing::debug!(
        interface_methods = targets.methods.len(),
        events = targets.events.len(),
        properties = targets.properties.len(),
        base_methods = intercepted.len(),
        "forwarding members"
    );

    for source in targets.methods.iter().chain(&intercepted) {
        let handle = emitter.create_method_from(source, copy_signature)?;
        attach_forwarding_body(&mut emitter, handle, &fields, source)?;
        emitter.generate(handle)?;
    }
    for (event, declaring) in &targets.events {
        emit_event(&mut emitter, &fields, *event, declaring)?;
    }
    for (property, declaring) in &targets.properties {
        emit_property(&mut emitter, &fields, *property, declaring)?;
    }
    if request.options.emit_callbacks {
        for source in &intercepted {
            if !pool.method(source.method).flags.contains(MethodFlags::ABSTRACT) {
                emit_callback(&mut emitter, source)?;
            }
        }
    }

    emitter.finalize()
}

/// Reject open generics first, then anything that cannot be derived from or
/// implemented.
fn validate(pool: &TypePool, request: &ProxyTypeRequest) -> Result<(), SynthesisError> {
    for ty in std::iter::once(&request.base).chain(&request.interfaces) {
        if pool.is_open_generic(ty) {
            return Err(SynthesisError::UnsupportedOpenGeneric {
                ty: pool.display(ty),
            });
        }
    }
    let invalid = |ty: &Ty, reason: &'static str| SynthesisError::InvalidProxyTarget {
        ty: pool.display(ty),
        reason,
    };
    if !pool.is_class(&request.base) {
        return Err(invalid(&request.base, "the base type must be a class"));
    }
    if pool.is_sealed(&request.base) {
        return Err(invalid(&request.base, "the base type is sealed"));
    }
    if let Some(iface) = request.interfaces.iter().find(|i| !pool.is_interface(i)) {
        return Err(invalid(iface, "not an interface"));
    }
    Ok(())
}

// Targets

struct InterfaceTargets {
    methods: Vec<MethodRef>,
    events: Vec<(EventId, Ty)>,
    properties: Vec<(PropertyId, Ty)>,
}

/// Members of every requested interface the base does not already
/// implement. Accessors that belong to a declared event or property are
/// forwarded through it; every other instance method, special-named or
/// not, is forwarded on its own.
fn interface_targets(pool: &TypePool, request: &ProxyTypeRequest) -> InterfaceTargets {
    let inherited = pool.all_interfaces(&request.base);
    let mut interfaces: Vec<Ty> = Vec::new();
    for iface in request.interfaces.iter().flat_map(|i| pool.all_interfaces(i)) {
        if !inherited.contains(&iface) && !interfaces.contains(&iface) {
            interfaces.push(iface);
        }
    }

    let mut targets = InterfaceTargets {
        methods: Vec::new(),
        events: Vec::new(),
        properties: Vec::new(),
    };
    for iface in interfaces {
        let Some(def) = pool.def_of(&iface) else {
            continue;
        };
        let def = pool.def(def);
        let mut accessors: Vec<MethodId> = Vec::new();
        for &event in &def.events {
            let ev = pool.event(event);
            accessors.extend([ev.add, ev.remove]);
            targets.events.push((event, iface.clone()));
        }
        for &property in &def.properties {
            accessors.extend(pool.property(property).accessors());
            targets.properties.push((property, iface.clone()));
        }
        targets.methods.extend(
            pool.methods_of(&iface)
                .into_iter()
                .filter(|m| !pool.method(m.method).is_static() && !accessors.contains(&m.method)),
        );
    }
    targets
}

/// The requested base methods, seen through the base class that declares
/// them, plus every abstract method still lacking an implementation.
fn base_targets(
    pool: &TypePool,
    request: &ProxyTypeRequest,
) -> Result<Vec<MethodRef>, SynthesisError> {
    let mut chain = vec![request.base.clone()];
    chain.extend(pool.base_chain(&request.base));

    let mut targets: Vec<MethodRef> = Vec::new();
    for &method in &request.intercept {
        let declaring = chain
            .iter()
            .find(|c| {
                pool.def_of(c)
                    .is_some_and(|d| pool.def(d).methods.contains(&method))
            })
            .ok_or_else(|| SynthesisError::InvalidProxyTarget {
                ty: pool.display(&request.base),
                reason: "an intercepted method is not declared on the base type",
            })?;
        let source = MethodRef {
            method,
            declaring: declaring.clone(),
        };
        if !pool.method(method).flags.is_overridable() {
            return Err(SynthesisError::NonVirtualMember {
                member: describe_method(pool, &source),
            });
        }
        if !targets.contains(&source) {
            targets.push(source);
        }
    }
    for source in pool.unimplemented_abstract_methods(&request.base) {
        if !targets.contains(&source) {
            targets.push(source);
        }
    }
    Ok(targets)
}

// Infrastructure members

struct ProxyFields {
    interceptors: FieldReference,
    target: Option<FieldReference>,
}

impl ProxyFields {
    fn declare(emitter: &mut TypeEmitter<'_>, options: ProxyOptions) -> Result<Self, SynthesisError> {
        let chain = Ty::Named(emitter.pool().well_known().interceptor_chain);
        let interceptors = emitter.create_field(INTERCEPTORS_FIELD, chain)?;
        let target = if options.with_target {
            Some(emitter.create_field(TARGET_FIELD, Ty::Object)?)
        } else {
            None
        };
        Ok(Self {
            interceptors,
            target,
        })
    }

    /// The object calls are forwarded on behalf of.
    fn target(&self) -> Expression {
        match &self.target {
            Some(field) => Reference::Field(field.clone()).load(),
            None => Reference::This.load(),
        }
    }
}

/// `.ctor(InterceptorChain interceptors[, object target])`: chain to the
/// base default constructor, then store the fields.
fn emit_constructor(
    emitter: &mut TypeEmitter<'_>,
    fields: &ProxyFields,
) -> Result<(), SynthesisError> {
    let mut params = vec![Ty::Named(emitter.pool().well_known().interceptor_chain)];
    if fields.target.is_some() {
        params.push(Ty::Object);
    }
    let ctor = emitter.create_constructor(&params)?;
    let base_call = emitter.base_constructor_call()?;

    let method = emitter.method_mut(ctor);
    let args = method.arguments().to_vec();
    if let Some(call) = base_call {
        method.add_statement(call)?;
    }
    method.add_statement(Statement::assign(
        fields.interceptors.clone(),
        Reference::Arg(args[0].clone()).load(),
    ))?;
    if let Some(target) = &fields.target {
        method.add_statement(Statement::assign(
            target.clone(),
            Reference::Arg(args[1].clone()).load(),
        ))?;
    }
    method.add_statement(Statement::Return(None))?;
    emitter.generate(ctor)
}

// Forwarding

fn attach_forwarding_body(
    emitter: &mut TypeEmitter<'_>,
    handle: MethodHandle,
    fields: &ProxyFields,
    source: &MethodRef,
) -> Result<(), SynthesisError> {
    let chain_invoke = emitter.pool().well_known().chain_invoke;
    let method = emitter.method_mut(handle);
    let args = method.arguments().to_vec();
    let ret = method.return_type().clone();
    let token = Expression::MethodToken {
        method: source.method,
        generic_args: method.generic_arguments().to_vec(),
    };

    let refs: Vec<Reference> = args.iter().cloned().map(Reference::from).collect();
    let packed = method.declare_local(Ty::array_of(Ty::Object))?;
    method.add_statement(Statement::assign(packed.clone(), pack_to_object_array(&refs)))?;

    let call = Expression::Invoke {
        receiver: Some(Box::new(
            Reference::Field(fields.interceptors.clone()).load(),
        )),
        method: chain_invoke,
        generic_args: Vec::new(),
        args: vec![token, fields.target(), Reference::Local(packed.clone()).load()],
        dispatch: Dispatch::Virtual,
        ret: Ty::Object,
    };

    if ret.is_void() {
        method.add_statement(Statement::Expr(call))?;
        write_back_by_ref(method, &args, &packed)?;
        method.add_statement(Statement::Return(None))?;
    } else {
        let result = method.declare_local(Ty::Object)?;
        method.add_statement(Statement::assign(result.clone(), call))?;
        write_back_by_ref(method, &args, &packed)?;
        method.add_statement(Statement::Return(Some(Expression::convert(
            Reference::Local(result).load(),
            Ty::Object,
            ret,
        ))))?;
    }
    Ok(())
}

/// Copy values the interceptors may have replaced in the argument array back
/// into by-ref arguments.
fn write_back_by_ref(
    method: &mut MethodEmitter,
    args: &[ArgumentReference],
    packed: &LocalReference,
) -> Result<(), SynthesisError> {
    for (index, arg) in args.iter().enumerate() {
        if !arg.ty().is_by_ref() {
            continue;
        }
        let elem = arg.ty().strip_by_ref().clone();
        let value = Expression::ArrayElement {
            array: Box::new(Reference::Local(packed.clone()).load()),
            index: Box::new(Expression::int32(array_index(index))),
            elem: Ty::Object,
        };
        method.add_statement(Statement::Assign {
            target: Reference::Arg(arg.clone()).deref_if_by_ref(),
            value: Expression::convert(value, Ty::Object, elem),
        })?;
    }
    Ok(())
}

/// An interface event whose accessors forward like methods.
fn emit_event(
    emitter: &mut TypeEmitter<'_>,
    fields: &ProxyFields,
    event: EventId,
    declaring: &Ty,
) -> Result<(), SynthesisError> {
    let pool = emitter.pool();
    let def = pool.event(event);
    let handler = pool.substitute_declaring(&def.handler, declaring);
    let handle = emitter.create_event(pool.name(def.name), handler, MethodFlags::OVERRIDE)?;
    let emitted = emitter.event(handle).clone();
    for (accessor, source) in [
        (emitted.add_method(), def.add),
        (emitted.remove_method(), def.remove),
    ] {
        let source = MethodRef {
            method: source,
            declaring: declaring.clone(),
        };
        emitter.method_mut(accessor).set_overrides(source.clone())?;
        attach_forwarding_body(emitter, accessor, fields, &source)?;
    }
    emitter.generate_event(handle)
}

/// An interface property whose accessors forward like methods.
fn emit_property(
    emitter: &mut TypeEmitter<'_>,
    fields: &ProxyFields,
    property: PropertyId,
    declaring: &Ty,
) -> Result<(), SynthesisError> {
    let pool = emitter.pool();
    let def = pool.property(property);
    let ty = pool.substitute_declaring(&def.ty, declaring);
    let handle = emitter.create_property(
        pool.name(def.name),
        ty,
        MethodFlags::OVERRIDE,
        def.get.is_some(),
        def.set.is_some(),
    )?;
    let emitted = emitter.property(handle).clone();
    let pairs = [
        (emitted.get_method(), def.get),
        (emitted.set_method(), def.set),
    ];
    for (accessor, source) in pairs {
        let (Some(accessor), Some(source)) = (accessor, source) else {
            continue;
        };
        let source = MethodRef {
            method: source,
            declaring: declaring.clone(),
        };
        emitter.method_mut(accessor).set_overrides(source.clone())?;
        attach_forwarding_body(emitter, accessor, fields, &source)?;
    }
    emitter.generate_property(handle)
}

/// `<name>_callback(...)`: call the base implementation directly.
fn emit_callback(emitter: &mut TypeEmitter<'_>, source: &MethodRef) -> Result<(), SynthesisError> {
    let pool = emitter.pool();
    let name = format!(
        "{}{CALLBACK_SUFFIX}",
        pool.name(pool.method(source.method).name)
    );
    let handle = emitter.create_method_like(&name, MethodFlags::PUBLIC, source, copy_signature)?;

    let method = emitter.method_mut(handle);
    let ret = method.return_type().clone();
    let call = Expression::Invoke {
        receiver: Some(Box::new(Reference::This.load())),
        method: source.method,
        generic_args: method.generic_arguments().to_vec(),
        args: method
            .arguments()
            .iter()
            .map(|a| Reference::Arg(a.clone()).load())
            .collect(),
        dispatch: Dispatch::Direct,
        ret: ret.clone(),
    };
    if ret.is_void() {
        method.add_statement(Statement::Expr(call))?;
        method.add_statement(Statement::Return(None))?;
    } else {
        method.add_statement(Statement::Return(Some(call)))?;
    }
    emitter.generate(handle)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    reason = "argument lists never exceed i32::MAX entries"
)]
fn array_index(index: usize) -> i32 {
    index as i32
}

#[cfg(test)]
mod tests;
