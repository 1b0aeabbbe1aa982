//! Generic-signature translation.
//!
//! Copies a source method's generic parameters, their attributes and their
//! constraints onto a member (or type) being synthesized, and rewrites the
//! method's parameter and return types to refer to the new parameters.
//!
//! References inside constraints and signatures are resolved in two ways:
//!
//! - a parameter of the source method maps to the new parameter at the same
//!   position
//! - a parameter of the method's declaring type maps to the concrete argument
//!   the (closed) declaring type supplies
//!
//! Anything else is a [`TranslationError`] and aborts the member. Attributes
//! and constraints the target cannot express are dropped instead, and the
//! emitted parameter is marked degraded.

use rustc_hash::FxHashMap;
use thiserror::Error;
use veneer_types::{
    GenericOwner, GenericParamAttrs, GenericParamRef, MethodRef, Name, Ty, TypePool,
};

use crate::error::{SynthesisError, TranslationError};
use crate::format::describe_method;

/// A constraint or attribute the synthesized representation cannot express.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UnsupportedConstraint(&'static str);

/// A generic parameter declared on a synthesized member or type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmittedGenericParam {
    name: Name,
    attrs: GenericParamAttrs,
    base_constraint: Option<Ty>,
    interface_constraints: Vec<Ty>,
    degraded: bool,
}

impl EmittedGenericParam {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            attrs: GenericParamAttrs::empty(),
            base_constraint: None,
            interface_constraints: Vec::new(),
            degraded: false,
        }
    }

    pub fn name(&self) -> Name {
        self.name
    }

    pub fn attrs(&self) -> GenericParamAttrs {
        self.attrs
    }

    pub fn base_constraint(&self) -> Option<&Ty> {
        self.base_constraint.as_ref()
    }

    pub fn interface_constraints(&self) -> &[Ty] {
        &self.interface_constraints
    }

    /// Whether an attribute or constraint of the source parameter was dropped.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Set variance and special-constraint attributes.
    ///
    /// Synthesized members and types are classes, so variance is never
    /// expressible; neither is requiring both a reference and a value type.
    pub fn set_attributes(&mut self, attrs: GenericParamAttrs) -> Result<(), UnsupportedConstraint> {
        if attrs.intersects(GenericParamAttrs::VARIANCE) {
            return Err(UnsupportedConstraint(
                "variance is only valid on interface and delegate parameters",
            ));
        }
        if attrs.contains(GenericParamAttrs::REFERENCE_TYPE | GenericParamAttrs::VALUE_TYPE) {
            return Err(UnsupportedConstraint(
                "a parameter cannot be both a reference type and a value type",
            ));
        }
        self.attrs = attrs;
        Ok(())
    }

    /// Set the base-type constraint: another generic parameter, or a class
    /// that can be derived from.
    pub fn set_base_constraint(
        &mut self,
        pool: &TypePool,
        ty: Ty,
    ) -> Result<(), UnsupportedConstraint> {
        if self.base_constraint.is_some() {
            return Err(UnsupportedConstraint("at most one base-type constraint is allowed"));
        }
        let accepted = match &ty {
            Ty::Param(_) => true,
            other => pool.is_class(other) && !pool.is_sealed(other),
        };
        if !accepted {
            return Err(UnsupportedConstraint(
                "base-type constraints must name a non-sealed class",
            ));
        }
        self.base_constraint = Some(ty);
        Ok(())
    }

    pub fn add_interface_constraint(
        &mut self,
        pool: &TypePool,
        ty: Ty,
    ) -> Result<(), UnsupportedConstraint> {
        if !pool.is_interface(&ty) {
            return Err(UnsupportedConstraint("interface constraints must name an interface"));
        }
        if !self.interface_constraints.contains(&ty) {
            self.interface_constraints.push(ty);
        }
        Ok(())
    }

    fn degrade(&mut self) {
        self.degraded = true;
    }

    /// All constraint types, base first.
    pub(crate) fn constraint_types(&self) -> impl Iterator<Item = &Ty> {
        self.base_constraint.iter().chain(&self.interface_constraints)
    }
}

/// Something that can declare generic parameters: a method emitter, or a
/// type emitter copying a method's parameters onto itself.
pub trait GenericBinder {
    /// Owner the declared parameters are referenced through.
    fn generic_owner(&self) -> GenericOwner;

    /// Declare one parameter per name, in order. Parameters may be declared
    /// only once.
    fn define_generic_parameters(
        &mut self,
        names: &[Name],
    ) -> Result<&mut [EmittedGenericParam], SynthesisError>;
}

/// Source parameter → synthesized parameter, for one translation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenericParameterMap {
    params: FxHashMap<GenericParamRef, Ty>,
    targets: Vec<Ty>,
}

impl GenericParameterMap {
    fn insert(&mut self, source: GenericParamRef, target: Ty) {
        self.params.insert(source, target.clone());
        self.targets.push(target);
    }

    pub fn get(&self, source: GenericParamRef) -> Option<&Ty> {
        self.params.get(&source)
    }

    /// The synthesized parameters, in declaration order. These are the
    /// generic arguments a forwarding body passes back to the source method.
    pub fn targets(&self) -> &[Ty] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Result of translating a source signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopiedSignature {
    pub map: GenericParameterMap,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

/// How a member emitter binds generic arguments when copying a source
/// method's signature.
pub type SignatureTranslator = fn(
    &TypePool,
    &MethodRef,
    &mut dyn GenericBinder,
) -> Result<CopiedSignature, SynthesisError>;

/// Declare fresh generic parameters on `binder` mirroring `source`'s, copy
/// their attributes and constraints, and rewrite `source`'s signature onto
/// them.
#[tracing::instrument(level = "trace", skip_all, fields(method = source.method.raw()))]
pub fn copy_signature(
    pool: &TypePool,
    source: &MethodRef,
    binder: &mut dyn GenericBinder,
) -> Result<CopiedSignature, SynthesisError> {
    let member = describe_method(pool, source);
    check_closed(pool, source, &member)?;
    let method = pool.method(source.method);

    let mut map = GenericParameterMap::default();
    if method.generics.is_empty() {
        return rewrite_signature(pool, source, map, &member);
    }

    let owner = binder.generic_owner();
    let names: Vec<Name> = method.generics.iter().map(|g| g.name).collect();
    for index in 0..names.len() {
        map.insert(
            GenericParamRef {
                owner: GenericOwner::Method(source.method),
                index: index_u32(index),
            },
            Ty::Param(GenericParamRef {
                owner,
                index: index_u32(index),
            }),
        );
    }

    let declared = binder.define_generic_parameters(&names)?;
    if declared.len() != names.len() {
        return Err(TranslationError::ArityMismatch {
            member,
            expected: names.len(),
            found: declared.len(),
        }
        .into());
    }

    for (target, source_param) in declared.iter_mut().zip(&method.generics) {
        let param_name = pool.name(source_param.name);
        if let Err(reason) = target.set_attributes(source_param.attrs) {
            tracing::debug!(member = %member, param = param_name, %reason, "dropping generic parameter attributes");
            target.degrade();
        }
        for constraint in &source_param.constraints {
            let constraint = rewrite(pool, constraint, &map, source, &member)?;
            let applied = if pool.is_interface(&constraint) {
                target.add_interface_constraint(pool, constraint)
            } else {
                target.set_base_constraint(pool, constraint)
            };
            if let Err(reason) = applied {
                tracing::debug!(member = %member, param = param_name, %reason, "dropping generic constraint");
                target.degrade();
            }
        }
    }

    rewrite_signature(pool, source, map, &member)
}

/// Rewrite `source`'s signature onto the generic parameters of the type
/// being synthesized, which were copied from `source` beforehand with
/// `TypeEmitter::copy_generic_parameters_from`. Declares nothing on the
/// member itself.
pub fn translate_onto_type_params(
    pool: &TypePool,
    source: &MethodRef,
    _binder: &mut dyn GenericBinder,
) -> Result<CopiedSignature, SynthesisError> {
    let member = describe_method(pool, source);
    check_closed(pool, source, &member)?;
    let mut map = GenericParameterMap::default();
    for index in 0..pool.method(source.method).generics.len() {
        map.insert(
            GenericParamRef {
                owner: GenericOwner::Method(source.method),
                index: index_u32(index),
            },
            Ty::Param(GenericParamRef {
                owner: GenericOwner::EmittedType,
                index: index_u32(index),
            }),
        );
    }
    rewrite_signature(pool, source, map, &member)
}

fn check_closed(pool: &TypePool, source: &MethodRef, member: &str) -> Result<(), TranslationError> {
    if pool.is_open_generic(&source.declaring) {
        return Err(TranslationError::OpenDeclaringType {
            member: member.to_owned(),
            declaring: pool.display(&source.declaring),
        });
    }
    Ok(())
}

fn rewrite_signature(
    pool: &TypePool,
    source: &MethodRef,
    map: GenericParameterMap,
    member: &str,
) -> Result<CopiedSignature, SynthesisError> {
    let method = pool.method(source.method);
    let params = method
        .param_types()
        .map(|ty| rewrite(pool, ty, &map, source, member))
        .collect::<Result<Vec<_>, _>>()?;
    let ret = rewrite(pool, &method.ret, &map, source, member)?;
    Ok(CopiedSignature { map, params, ret })
}

/// Substitute every generic parameter in `ty`.
fn rewrite(
    pool: &TypePool,
    ty: &Ty,
    map: &GenericParameterMap,
    source: &MethodRef,
    member: &str,
) -> Result<Ty, TranslationError> {
    ty.try_map_params(&mut |param| {
        if let Some(target) = map.get(param) {
            return Ok(target.clone());
        }
        let closed = match (&param.owner, &source.declaring) {
            (GenericOwner::Type(owner), Ty::Instance { def, args }) if owner == def => {
                args.get(param.index as usize).cloned()
            }
            _ => None,
        };
        closed.ok_or_else(|| TranslationError::ForeignParameter {
            member: member.to_owned(),
            param: pool.display(&Ty::Param(param)),
        })
    })
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "generic arity never exceeds u32"
)]
fn index_u32(index: usize) -> u32 {
    index as u32
}

#[cfg(test)]
mod tests;
