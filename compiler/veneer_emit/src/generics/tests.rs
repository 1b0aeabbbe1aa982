#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use veneer_types::{
    DefId, GenericOwner, GenericParamAttrs, GenericParamRef, MethodFlags, MethodId, MethodRef, Ty,
    TypeDefKind, TypePool,
};

use super::{copy_signature, translate_onto_type_params, GenericBinder};
use crate::error::{SynthesisError, TranslationError};
use crate::method::MethodEmitter;

const ABSTRACT: MethodFlags = MethodFlags::VIRTUAL
    .union(MethodFlags::ABSTRACT)
    .union(MethodFlags::PUBLIC);

fn emitted(index: u32) -> Ty {
    Ty::Param(GenericParamRef {
        owner: GenericOwner::EmittedMethod,
        index,
    })
}

/// `interface IComparable<T> { int CompareTo(T other); }`
fn comparable(pool: &mut TypePool) -> DefId {
    let def = pool.define_type("IComparable", TypeDefKind::Interface);
    let t = pool.add_type_generic_param(def, "T");
    pool.add_method(def, "CompareTo", ABSTRACT, &[("other", t)], Ty::Int32);
    def
}

/// `interface ISorter { U Max<U>(U[] items) where U : IComparable<U>; }`
fn sorter(pool: &mut TypePool) -> (DefId, MethodId) {
    let cmp = comparable(pool);
    let def = pool.define_type("ISorter", TypeDefKind::Interface);
    let max = pool.declare_method(def, "Max", ABSTRACT);
    let u = pool.add_method_generic_param(max, "U");
    pool.constrain_generic_param(
        &u,
        GenericParamAttrs::empty(),
        vec![Ty::Instance {
            def: cmp,
            args: vec![u.clone()],
        }],
    );
    pool.set_signature(max, &[("items", Ty::array_of(u.clone()))], u);
    (def, max)
}

fn binder() -> MethodEmitter {
    MethodEmitter::new("target", MethodFlags::OVERRIDE)
}

#[test]
fn self_referential_constraint_maps_to_new_parameter() {
    let mut pool = TypePool::new();
    let (def, max) = sorter(&mut pool);
    let cmp = pool.lookup_type("IComparable").unwrap();
    let source = MethodRef {
        method: max,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    let sig = copy_signature(&pool, &source, &mut target).unwrap();

    assert_eq!(sig.params, vec![Ty::array_of(emitted(0))]);
    assert_eq!(sig.ret, emitted(0));
    assert_eq!(sig.map.targets(), &[emitted(0)]);

    let params = target.generic_parameters();
    assert_eq!(params.len(), 1);
    assert_eq!(pool.name(params[0].name()), "U");
    assert_eq!(
        params[0].interface_constraints(),
        &[Ty::Instance {
            def: cmp,
            args: vec![emitted(0)],
        }]
    );
    assert!(!params[0].is_degraded());
}

#[test]
fn non_generic_method_copies_signature_verbatim() {
    let mut pool = TypePool::new();
    let cmp = comparable(&mut pool);
    let compare = pool.find_method(cmp, "CompareTo").unwrap();
    let source = MethodRef {
        method: compare,
        declaring: Ty::Instance {
            def: cmp,
            args: vec![Ty::String],
        },
    };

    let mut target = binder();
    let sig = copy_signature(&pool, &source, &mut target).unwrap();
    assert_eq!(sig.params, vec![Ty::String]);
    assert_eq!(sig.ret, Ty::Int32);
    assert!(sig.map.is_empty());
    assert!(target.generic_parameters().is_empty());
}

#[test]
fn open_declaring_type_is_rejected() {
    let mut pool = TypePool::new();
    let cmp = comparable(&mut pool);
    let compare = pool.find_method(cmp, "CompareTo").unwrap();
    let source = MethodRef {
        method: compare,
        declaring: Ty::Named(cmp),
    };

    let err = copy_signature(&pool, &source, &mut binder()).unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Translation(TranslationError::OpenDeclaringType { .. })
    ));
}

#[test]
fn parameter_of_an_unrelated_method_is_foreign() {
    let mut pool = TypePool::new();
    let def = pool.define_type("IOdd", TypeDefKind::Interface);
    let other = pool.declare_method(def, "Other", ABSTRACT);
    let stray = pool.add_method_generic_param(other, "V");
    let odd = pool.add_method(def, "Odd", ABSTRACT, &[("value", stray)], Ty::Void);
    let source = MethodRef {
        method: odd,
        declaring: Ty::Named(def),
    };

    let err = copy_signature(&pool, &source, &mut binder()).unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::Translation(TranslationError::ForeignParameter { .. })
    ));
}

#[test]
fn inexpressible_attributes_and_constraints_degrade() {
    let mut pool = TypePool::new();
    let def = pool.define_type("IProducer", TypeDefKind::Interface);
    let produce = pool.declare_method(def, "Produce", ABSTRACT);
    let t = pool.add_method_generic_param(produce, "T");
    pool.constrain_generic_param(
        &t,
        GenericParamAttrs::COVARIANT | GenericParamAttrs::DEFAULT_CONSTRUCTOR,
        vec![Ty::String],
    );
    pool.set_signature(produce, &[], t);
    let source = MethodRef {
        method: produce,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    let sig = copy_signature(&pool, &source, &mut target).unwrap();
    assert_eq!(sig.ret, emitted(0));

    let param = &target.generic_parameters()[0];
    assert!(param.is_degraded());
    assert_eq!(param.attrs(), GenericParamAttrs::empty());
    assert_eq!(param.base_constraint(), None);
}

#[test]
fn class_constraint_is_kept_as_base_constraint() {
    let mut pool = TypePool::new();
    let animal = pool.define_type("Animal", TypeDefKind::Class);
    let def = pool.define_type("IShelter", TypeDefKind::Interface);
    let adopt = pool.declare_method(def, "Adopt", ABSTRACT);
    let t = pool.add_method_generic_param(adopt, "T");
    pool.constrain_generic_param(
        &t,
        GenericParamAttrs::REFERENCE_TYPE,
        vec![Ty::Named(animal)],
    );
    pool.set_signature(adopt, &[("pet", t)], Ty::Void);
    let source = MethodRef {
        method: adopt,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    copy_signature(&pool, &source, &mut target).unwrap();
    let param = &target.generic_parameters()[0];
    assert_eq!(param.base_constraint(), Some(&Ty::Named(animal)));
    assert_eq!(param.attrs(), GenericParamAttrs::REFERENCE_TYPE);
    assert!(!param.is_degraded());
}

#[test]
fn constraint_referring_to_an_earlier_parameter_is_remapped() {
    let mut pool = TypePool::new();
    let cmp = comparable(&mut pool);
    let def = pool.define_type("IMerger", TypeDefKind::Interface);
    let merge = pool.declare_method(def, "Merge", ABSTRACT);
    let t = pool.add_method_generic_param(merge, "T");
    let u = pool.add_method_generic_param(merge, "U");
    pool.constrain_generic_param(
        &u,
        GenericParamAttrs::empty(),
        vec![Ty::Instance {
            def: cmp,
            args: vec![t.clone()],
        }],
    );
    pool.set_signature(merge, &[("a", t), ("b", u.clone())], u);
    let source = MethodRef {
        method: merge,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    let sig = copy_signature(&pool, &source, &mut target).unwrap();
    assert_eq!(sig.params, vec![emitted(0), emitted(1)]);
    assert_eq!(sig.ret, emitted(1));

    let params = target.generic_parameters();
    assert_eq!(params.len(), 2);
    assert!(params[0].interface_constraints().is_empty());
    assert_eq!(
        params[1].interface_constraints(),
        &[Ty::Instance {
            def: cmp,
            args: vec![emitted(0)],
        }]
    );
}

#[test]
fn constraint_on_declaring_type_parameter_takes_the_closed_argument() {
    let mut pool = TypePool::new();
    let cmp = comparable(&mut pool);
    let holder = pool.define_type("IHolder", TypeDefKind::Interface);
    let k = pool.add_type_generic_param(holder, "K");
    let put = pool.declare_method(holder, "Put", ABSTRACT);
    let v = pool.add_method_generic_param(put, "V");
    pool.constrain_generic_param(
        &v,
        GenericParamAttrs::empty(),
        vec![Ty::Instance {
            def: cmp,
            args: vec![k.clone()],
        }],
    );
    pool.set_signature(put, &[("key", k), ("value", v)], Ty::Void);
    let source = MethodRef {
        method: put,
        declaring: Ty::Instance {
            def: holder,
            args: vec![Ty::String],
        },
    };

    let mut target = binder();
    let sig = copy_signature(&pool, &source, &mut target).unwrap();
    assert_eq!(sig.params, vec![Ty::String, emitted(0)]);
    assert_eq!(
        target.generic_parameters()[0].interface_constraints(),
        &[Ty::Instance {
            def: cmp,
            args: vec![Ty::String],
        }]
    );
}

#[test]
fn generic_parameters_are_declared_once() {
    let mut pool = TypePool::new();
    let (def, max) = sorter(&mut pool);
    let source = MethodRef {
        method: max,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    copy_signature(&pool, &source, &mut target).unwrap();
    let err = target
        .define_generic_parameters(&[pool.intern("X")])
        .unwrap_err();
    assert!(matches!(
        err,
        SynthesisError::GenericParametersAlreadyDefined { .. }
    ));
}

#[test]
fn translation_onto_type_parameters_declares_nothing() {
    let mut pool = TypePool::new();
    let (def, max) = sorter(&mut pool);
    let source = MethodRef {
        method: max,
        declaring: Ty::Named(def),
    };

    let mut target = binder();
    let sig = translate_onto_type_params(&pool, &source, &mut target).unwrap();
    let type_param = Ty::Param(GenericParamRef {
        owner: GenericOwner::EmittedType,
        index: 0,
    });
    assert_eq!(sig.ret, type_param);
    assert_eq!(sig.params, vec![Ty::array_of(type_param)]);
    assert!(target.generic_parameters().is_empty());
}
