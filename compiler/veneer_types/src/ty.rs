//! Type references and descriptor IDs.
//!
//! [`Ty`] is a plain value tree. Named types and their members live in the
//! [`TypePool`](crate::TypePool) and are referenced by ID; generic parameters
//! are referenced positionally through their owner, the same way metadata
//! signatures encode them (`!0` for a type parameter, `!!0` for a method
//! parameter).

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// A type definition (class, interface or struct) in the pool.
    DefId
);
define_id!(
    /// A method (or constructor) descriptor in the pool.
    MethodId
);
define_id!(
    /// An event descriptor in the pool.
    EventId
);
define_id!(
    /// A property descriptor in the pool.
    PropertyId
);

/// Who declares a generic parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GenericOwner {
    /// A source method registered in the pool.
    Method(MethodId),
    /// A source generic type definition registered in the pool.
    Type(DefId),
    /// The member currently being synthesized.
    EmittedMethod,
    /// The type currently being synthesized.
    EmittedType,
}

/// A generic parameter, identified by owner and declaration position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenericParamRef {
    pub owner: GenericOwner,
    pub index: u32,
}

/// A type as it appears in a signature, constraint or IR node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Ty {
    Void,
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Object,
    /// A non-generic named type, or a generic definition used bare (open).
    Named(DefId),
    /// A generic type applied to arguments.
    Instance { def: DefId, args: Vec<Ty> },
    /// Single-dimension array.
    Array(Box<Ty>),
    /// Pass-by-reference slot holding the address of an `elem`.
    ByRef(Box<Ty>),
    /// A generic parameter.
    Param(GenericParamRef),
}

impl Ty {
    /// Shorthand for a method-owned generic parameter of the member being emitted.
    pub const fn emitted_method_param(index: u32) -> Self {
        Ty::Param(GenericParamRef {
            owner: GenericOwner::EmittedMethod,
            index,
        })
    }

    /// Shorthand for a generic parameter declared by a source method.
    pub const fn method_param(method: MethodId, index: u32) -> Self {
        Ty::Param(GenericParamRef {
            owner: GenericOwner::Method(method),
            index,
        })
    }

    /// Shorthand for a generic parameter declared by a source type.
    pub const fn type_param(def: DefId, index: u32) -> Self {
        Ty::Param(GenericParamRef {
            owner: GenericOwner::Type(def),
            index,
        })
    }

    pub fn array_of(elem: Ty) -> Self {
        Ty::Array(Box::new(elem))
    }

    pub fn by_ref(elem: Ty) -> Self {
        Ty::ByRef(Box::new(elem))
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Ty::Void)
    }

    #[inline]
    pub fn is_by_ref(&self) -> bool {
        matches!(self, Ty::ByRef(_))
    }

    /// Element type of a by-ref slot, or the type itself.
    pub fn strip_by_ref(&self) -> &Ty {
        match self {
            Ty::ByRef(elem) => elem,
            other => other,
        }
    }

    /// Whether any generic parameter satisfying `pred` occurs in this type.
    pub fn any_param(&self, pred: &mut impl FnMut(GenericParamRef) -> bool) -> bool {
        match self {
            Ty::Param(p) => pred(*p),
            Ty::Instance { args, .. } => args.iter().any(|a| a.any_param(pred)),
            Ty::Array(elem) | Ty::ByRef(elem) => elem.any_param(pred),
            Ty::Void
            | Ty::Bool
            | Ty::Int32
            | Ty::Int64
            | Ty::Float64
            | Ty::String
            | Ty::Object
            | Ty::Named(_) => false,
        }
    }

    /// Whether this type mentions any generic parameter at all.
    pub fn has_params(&self) -> bool {
        self.any_param(&mut |_| true)
    }

    /// Rebuild this type with every generic parameter replaced by `f`.
    ///
    /// Composite types are rewritten argument by argument; the first error
    /// aborts the whole rewrite.
    pub fn try_map_params<E>(
        &self,
        f: &mut impl FnMut(GenericParamRef) -> Result<Ty, E>,
    ) -> Result<Ty, E> {
        Ok(match self {
            Ty::Param(p) => f(*p)?,
            Ty::Instance { def, args } => Ty::Instance {
                def: *def,
                args: args
                    .iter()
                    .map(|a| a.try_map_params(f))
                    .collect::<Result<_, _>>()?,
            },
            Ty::Array(elem) => Ty::Array(Box::new(elem.try_map_params(f)?)),
            Ty::ByRef(elem) => Ty::ByRef(Box::new(elem.try_map_params(f)?)),
            other => other.clone(),
        })
    }
}

impl fmt::Display for GenericOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenericOwner::Method(m) => write!(f, "method#{}", m.raw()),
            GenericOwner::Type(d) => write!(f, "type#{}", d.raw()),
            GenericOwner::EmittedMethod => f.write_str("emitted method"),
            GenericOwner::EmittedType => f.write_str("emitted type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn map_params_rewrites_nested_arguments() {
        let m = MethodId::new(3);
        let list = DefId::new(7);
        let ty = Ty::array_of(Ty::Instance {
            def: list,
            args: vec![Ty::method_param(m, 0), Ty::Int32],
        });
        let mapped: Result<Ty, ()> = ty.try_map_params(&mut |p| Ok(Ty::emitted_method_param(p.index)));
        assert_eq!(
            mapped,
            Ok(Ty::array_of(Ty::Instance {
                def: list,
                args: vec![Ty::emitted_method_param(0), Ty::Int32],
            }))
        );
    }

    #[test]
    fn map_params_propagates_first_error() {
        let ty = Ty::Instance {
            def: DefId::new(1),
            args: vec![Ty::method_param(MethodId::new(0), 1)],
        };
        let mapped: Result<Ty, u32> = ty.try_map_params(&mut |p| Err(p.index));
        assert_eq!(mapped, Err(1));
    }

    #[test]
    fn any_param_sees_through_by_ref() {
        let ty = Ty::by_ref(Ty::type_param(DefId::new(2), 0));
        assert!(ty.has_params());
        assert!(!Ty::by_ref(Ty::Int64).has_params());
        assert_eq!(ty.strip_by_ref(), &Ty::type_param(DefId::new(2), 0));
    }
}
