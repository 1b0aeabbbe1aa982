#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use veneer_ir::{CallSite, Instr};
use veneer_types::{
    DefId, GenericOwner, GenericParamRef, MethodFlags, MethodId, Ty, TypeDefKind, TypeFlags,
    TypePool,
};

use super::{synthesize_type, ProxyOptions, ProxyTypeRequest, INTERCEPTORS_FIELD, TARGET_FIELD};
use crate::error::SynthesisError;
use crate::synthesized::{EmittedMethod, SynthesizedType};
use crate::type_emitter::CONSTRUCTOR_NAME;

const ABSTRACT: MethodFlags = MethodFlags::VIRTUAL
    .union(MethodFlags::ABSTRACT)
    .union(MethodFlags::PUBLIC);

struct Store {
    def: DefId,
    get: MethodId,
    try_get: MethodId,
}

/// ```text
/// interface IStore {
///     int Get(string key);
///     bool TryGet(string key, out int value);
///     T Echo<T>(T value);
///     event Changed(object);
/// }
/// ```
fn store(pool: &mut TypePool) -> Store {
    let def = pool.define_type("App.IStore", TypeDefKind::Interface);
    let get = pool.add_method(def, "Get", ABSTRACT, &[("key", Ty::String)], Ty::Int32);
    let try_get = pool.add_method(
        def,
        "TryGet",
        ABSTRACT,
        &[("key", Ty::String), ("value", Ty::by_ref(Ty::Int32))],
        Ty::Bool,
    );
    let echo = pool.declare_method(def, "Echo", ABSTRACT);
    let t = pool.add_method_generic_param(echo, "T");
    pool.set_signature(echo, &[("value", t.clone())], t);
    pool.add_event(def, "Changed", ABSTRACT, Ty::Object);
    Store { def, get, try_get }
}

struct Repo {
    def: DefId,
    load: MethodId,
    save: MethodId,
    describe: MethodId,
}

/// ```text
/// abstract class Repo {
///     Repo();
///     virtual string Load(int id);
///     abstract void Save(string item);
///     string Describe();
/// }
/// ```
fn repo(pool: &mut TypePool) -> Repo {
    let def = pool.define_type("App.Repo", TypeDefKind::Class);
    pool.def_mut(def).flags |= TypeFlags::ABSTRACT;
    pool.add_method(
        def,
        CONSTRUCTOR_NAME,
        MethodFlags::CONSTRUCTOR | MethodFlags::PUBLIC,
        &[],
        Ty::Void,
    );
    let load = pool.add_method(def, "Load", MethodFlags::OVERRIDE, &[("id", Ty::Int32)], Ty::String);
    let save = pool.add_method(def, "Save", ABSTRACT, &[("item", Ty::String)], Ty::Void);
    let describe = pool.add_method(def, "Describe", MethodFlags::PUBLIC, &[], Ty::String);
    Repo {
        def,
        load,
        save,
        describe,
    }
}

fn method<'a>(ty: &'a SynthesizedType, name: &str) -> &'a EmittedMethod {
    ty.methods_named(name)
        .next()
        .unwrap_or_else(|| panic!("no method `{name}`"))
}

fn calls_chain(pool: &TypePool, method: &EmittedMethod) -> bool {
    let invoke = pool.well_known().chain_invoke;
    method.body.instrs.iter().any(|i| {
        matches!(i, Instr::Call(CallSite { method, is_virtual: true, argc: 3, .. }) if *method == invoke)
    })
}

#[test]
fn interface_proxy_forwards_every_member() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let request = ProxyTypeRequest::new("StoreProxy", Ty::Object).with_interfaces([Ty::Named(s.def)]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let fields: Vec<_> = ty.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec![INTERCEPTORS_FIELD]);

    let get = method(&ty, "Get");
    assert_eq!(get.params, vec![Ty::String]);
    assert_eq!(get.overrides.as_ref().map(|m| m.method), Some(s.get));
    assert!(calls_chain(&pool, get));
    assert!(get.body.instrs.contains(&Instr::LdToken {
        method: s.get,
        generic_args: Vec::new(),
    }));
    assert_eq!(
        get.body.instrs[get.body.instrs.len() - 2..],
        [Instr::UnboxAny(Ty::Int32), Instr::Ret]
    );
    assert!(get.body.max_stack >= 4);

    for name in ["TryGet", "Echo", "add_Changed", "remove_Changed"] {
        assert!(calls_chain(&pool, method(&ty, name)), "{name}");
    }
    assert_eq!(ty.events.len(), 1);
}

#[test]
fn constructor_stores_interceptors_and_target() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let request = ProxyTypeRequest::new("StoreProxy", Ty::Object)
        .with_interfaces([Ty::Named(s.def)])
        .with_options(ProxyOptions {
            with_target: true,
            emit_callbacks: false,
        });
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let fields: Vec<_> = ty.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec![INTERCEPTORS_FIELD, TARGET_FIELD]);

    let ctors: Vec<_> = ty.constructors().collect();
    assert_eq!(ctors.len(), 1);
    assert_eq!(
        ctors[0].params,
        vec![Ty::Named(pool.well_known().interceptor_chain), Ty::Object]
    );
    assert_eq!(
        ctors[0].body.instrs,
        vec![
            Instr::LdArg(0),
            Instr::LdArg(1),
            Instr::StFld(veneer_ir::FieldIndex::new(0)),
            Instr::LdArg(0),
            Instr::LdArg(2),
            Instr::StFld(veneer_ir::FieldIndex::new(1)),
            Instr::Ret,
        ]
    );
}

#[test]
fn by_ref_arguments_are_written_back() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let request = ProxyTypeRequest::new("StoreProxy", Ty::Object).with_interfaces([Ty::Named(s.def)]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let try_get = method(&ty, "TryGet");
    assert_eq!(try_get.overrides.as_ref().map(|m| m.method), Some(s.try_get));
    let instrs = &try_get.body.instrs;
    let load = instrs.iter().position(|i| *i == Instr::LdInd(Ty::Int32)).unwrap();
    let store = instrs.iter().position(|i| *i == Instr::StInd(Ty::Int32)).unwrap();
    let call = instrs.iter().position(|i| matches!(i, Instr::Call(_))).unwrap();
    assert!(load < call, "value is read before the call");
    assert!(call < store, "value is written back after the call");
}

#[test]
fn generic_method_is_forwarded_with_its_own_parameters() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let request = ProxyTypeRequest::new("StoreProxy", Ty::Object).with_interfaces([Ty::Named(s.def)]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let t = Ty::Param(GenericParamRef {
        owner: GenericOwner::EmittedMethod,
        index: 0,
    });
    let echo = method(&ty, "Echo");
    assert_eq!(echo.generics.len(), 1);
    assert_eq!(echo.params, vec![t.clone()]);
    assert_eq!(echo.ret, t);
    assert!(echo.body.instrs.contains(&Instr::Box(t.clone())));
    assert!(echo
        .body
        .instrs
        .iter()
        .any(|i| matches!(i, Instr::LdToken { generic_args, .. } if *generic_args == vec![t.clone()])));
}

#[test]
fn synthesis_is_deterministic() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let r = repo(&mut pool);
    let request = |name: &str| {
        ProxyTypeRequest::new(name, Ty::Named(r.def))
            .with_interfaces([Ty::Named(s.def)])
            .intercepting([r.load])
    };

    let a = synthesize_type(&pool, &request("A"), true).unwrap();
    let b = synthesize_type(&pool, &request("B"), true).unwrap();
    assert_eq!(a.fields, b.fields);
    assert_eq!(a.methods, b.methods);
    assert_eq!(a.events, b.events);
}

#[test]
fn class_proxy_overrides_intercepted_and_abstract_methods() {
    let mut pool = TypePool::new();
    let r = repo(&mut pool);
    let request = ProxyTypeRequest::new("RepoProxy", Ty::Named(r.def)).intercepting([r.load]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let load = method(&ty, "Load");
    assert_eq!(load.overrides.as_ref().map(|m| m.method), Some(r.load));
    let save = method(&ty, "Save");
    assert_eq!(save.overrides.as_ref().map(|m| m.method), Some(r.save));
    assert!(calls_chain(&pool, save));
    assert!(ty.methods_named("Describe").next().is_none());
}

#[test]
fn callbacks_call_the_base_implementation() {
    let mut pool = TypePool::new();
    let r = repo(&mut pool);
    let request = ProxyTypeRequest::new("RepoProxy", Ty::Named(r.def))
        .intercepting([r.load])
        .with_options(ProxyOptions {
            with_target: false,
            emit_callbacks: true,
        });
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let callback = method(&ty, "Load_callback");
    assert!(!callback.flags.contains(MethodFlags::VIRTUAL));
    assert_eq!(callback.overrides, None);
    assert_eq!(
        callback.body.instrs,
        vec![
            Instr::LdArg(0),
            Instr::LdArg(1),
            Instr::Call(CallSite {
                method: r.load,
                generic_args: Vec::new(),
                argc: 1,
                has_this: true,
                returns: true,
                is_virtual: false,
            }),
            Instr::Ret,
        ]
    );
    // Abstract methods have no base implementation to call.
    assert!(ty.methods_named("Save_callback").next().is_none());
}

#[test]
fn open_generic_targets_are_rejected() {
    let mut pool = TypePool::new();
    let list = pool.define_type("App.List", TypeDefKind::Class);
    pool.add_type_generic_param(list, "T");
    let source = pool.define_type("App.ISource", TypeDefKind::Interface);
    pool.add_type_generic_param(source, "T");

    let err = synthesize_type(&pool, &ProxyTypeRequest::new("P", Ty::Named(list)), true).unwrap_err();
    assert_eq!(
        err,
        SynthesisError::UnsupportedOpenGeneric {
            ty: pool.display(&Ty::Named(list)),
        }
    );

    let request = ProxyTypeRequest::new("P", Ty::Object).with_interfaces([Ty::Named(source)]);
    assert!(matches!(
        synthesize_type(&pool, &request, true),
        Err(SynthesisError::UnsupportedOpenGeneric { .. })
    ));
}

#[test]
fn generic_instances_with_missing_arguments_are_rejected() {
    let mut pool = TypePool::new();
    let list = pool.define_type("App.List", TypeDefKind::Class);
    pool.add_type_generic_param(list, "T");
    let pair = pool.define_type("App.IPair", TypeDefKind::Interface);
    pool.add_type_generic_param(pair, "K");
    pool.add_type_generic_param(pair, "V");

    let unbound = Ty::Instance {
        def: list,
        args: Vec::new(),
    };
    let half = Ty::Instance {
        def: pair,
        args: vec![Ty::String],
    };
    let requests = [
        ProxyTypeRequest::new("P", unbound),
        ProxyTypeRequest::new("P", Ty::Object).with_interfaces([half]),
    ];
    for request in &requests {
        assert!(matches!(
            synthesize_type(&pool, request, true),
            Err(SynthesisError::UnsupportedOpenGeneric { .. })
        ));
    }
}

#[test]
fn closed_generic_interface_is_accepted() {
    let mut pool = TypePool::new();
    let source = pool.define_type("App.ISource", TypeDefKind::Interface);
    let t = pool.add_type_generic_param(source, "T");
    pool.add_method(source, "Next", ABSTRACT, &[], t);

    let closed = Ty::Instance {
        def: source,
        args: vec![Ty::String],
    };
    let request = ProxyTypeRequest::new("P", Ty::Object).with_interfaces([closed]);
    let ty = synthesize_type(&pool, &request, true).unwrap();
    let next = method(&ty, "Next");
    assert_eq!(next.ret, Ty::String);
    assert_eq!(next.body.instrs[next.body.instrs.len() - 2], Instr::CastClass(Ty::String));
}

#[test]
fn unsuitable_targets_are_rejected() {
    let mut pool = TypePool::new();
    let s = store(&mut pool);
    let r = repo(&mut pool);
    let sealed = pool.define_type("App.Sealed", TypeDefKind::Class);
    pool.def_mut(sealed).flags |= TypeFlags::SEALED;

    let cases = [
        ProxyTypeRequest::new("P", Ty::Named(sealed)),
        ProxyTypeRequest::new("P", Ty::Named(s.def)),
        ProxyTypeRequest::new("P", Ty::Object).with_interfaces([Ty::Named(r.def)]),
    ];
    for request in &cases {
        assert!(matches!(
            synthesize_type(&pool, request, true),
            Err(SynthesisError::InvalidProxyTarget { .. })
        ));
    }
}

#[test]
fn intercepting_a_non_virtual_method_fails() {
    let mut pool = TypePool::new();
    let r = repo(&mut pool);
    let request = ProxyTypeRequest::new("RepoProxy", Ty::Named(r.def)).intercepting([r.describe]);
    assert_eq!(
        synthesize_type(&pool, &request, true).unwrap_err(),
        SynthesisError::NonVirtualMember {
            member: "App.Repo.Describe".to_owned(),
        }
    );
}

#[test]
fn special_named_methods_without_a_property_are_forwarded() {
    let mut pool = TypePool::new();
    let named = pool.define_type("App.INamed", TypeDefKind::Interface);
    let get_name = pool.add_method(
        named,
        "get_Name",
        ABSTRACT | MethodFlags::SPECIAL_NAME,
        &[],
        Ty::String,
    );
    let request = ProxyTypeRequest::new("P", Ty::Object).with_interfaces([Ty::Named(named)]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let get = method(&ty, "get_Name");
    assert_eq!(get.overrides.as_ref().map(|m| m.method), Some(get_name));
    assert!(get.flags.contains(MethodFlags::SPECIAL_NAME));
    assert!(calls_chain(&pool, get));
    assert!(ty.properties.is_empty());
}

/// ```text
/// interface IConfig {
///     string Name { get; set; }
///     int Version { get; }
/// }
/// ```
#[test]
fn interface_properties_forward_their_accessors() {
    let mut pool = TypePool::new();
    let config = pool.define_type("App.IConfig", TypeDefKind::Interface);
    pool.add_property(config, "Name", ABSTRACT, Ty::String, true, true);
    let version = pool.add_property(config, "Version", ABSTRACT, Ty::Int32, true, false);
    let request = ProxyTypeRequest::new("ConfigProxy", Ty::Object).with_interfaces([Ty::Named(config)]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    assert_eq!(ty.properties.len(), 2);
    let name = ty.property("Name").unwrap();
    assert_eq!(name.ty, Ty::String);
    assert_eq!(name.get.as_deref(), Some("get_Name"));
    assert_eq!(name.set.as_deref(), Some("set_Name"));
    let version_prop = ty.property("Version").unwrap();
    assert_eq!(version_prop.set, None);

    for accessor in ["get_Name", "set_Name", "get_Version"] {
        assert_eq!(ty.methods_named(accessor).count(), 1, "{accessor}");
        assert!(calls_chain(&pool, method(&ty, accessor)), "{accessor}");
    }
    let get_version = method(&ty, "get_Version");
    assert_eq!(
        get_version.overrides.as_ref().map(|m| m.method),
        pool.property(version).get
    );
    assert_eq!(get_version.ret, Ty::Int32);
    assert_eq!(method(&ty, "set_Name").params, vec![Ty::String]);

    let dump = crate::format::dump_type(&pool, &ty);
    assert!(dump.contains("  property Name: string (get_Name, set_Name)"));
    assert!(dump.contains("  property Version: int32 (get_Version)"));
}

#[test]
fn closed_generic_property_type_is_substituted() {
    let mut pool = TypePool::new();
    let boxed = pool.define_type("App.IBoxed", TypeDefKind::Interface);
    let t = pool.add_type_generic_param(boxed, "T");
    pool.add_property(boxed, "Value", ABSTRACT, t, true, false);
    let closed = Ty::Instance {
        def: boxed,
        args: vec![Ty::Int64],
    };
    let request = ProxyTypeRequest::new("P", Ty::Object).with_interfaces([closed]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    assert_eq!(ty.property("Value").unwrap().ty, Ty::Int64);
    assert_eq!(method(&ty, "get_Value").ret, Ty::Int64);
}

#[test]
fn dump_lists_members_with_their_bodies() {
    let mut pool = TypePool::new();
    let r = repo(&mut pool);
    let request = ProxyTypeRequest::new("RepoProxy", Ty::Named(r.def)).intercepting([r.load]);
    let ty = synthesize_type(&pool, &request, true).unwrap();

    let dump = crate::format::dump_type(&pool, &ty);
    let mut lines = dump.lines();
    assert_eq!(lines.next(), Some("class RepoProxy : App.Repo"));
    assert_eq!(lines.next(), Some("  field __interceptors: Veneer.InterceptorChain"));
    assert!(dump.contains("  virtual Load(int32) -> string overrides App.Repo.Load"));
    assert!(dump.contains("  virtual Save(string) -> void overrides App.Repo.Save"));
}
