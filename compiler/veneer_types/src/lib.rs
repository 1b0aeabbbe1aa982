//! Type and member descriptors for the veneer proxy type synthesizer.
//!
//! This crate is the input side of synthesis: it models the base types,
//! interfaces and member signatures (including generic parameters and their
//! constraints) that a proxy is built against.
//!
//! - [`Ty`]: a signature type as a value tree
//! - [`TypePool`]: registry of [`TypeDef`], [`MethodDef`], [`EventDef`] and
//!   [`PropertyDef`] descriptors, plus the [`WellKnown`] infrastructure types
//! - [`Name`] / [`NameTable`]: pool-owned identifiers
//!
//! Generic parameters are referenced positionally through their owner
//! ([`GenericOwner`]). The two "emitted" owners stand for the member or type
//! currently being synthesized, which lets synthesized signatures be built
//! without mutating the shared pool.

mod flags;
mod name;
mod pool;
mod ty;

pub use flags::{GenericParamAttrs, MethodFlags, TypeFlags};
pub use name::{Name, NameTable};
pub use pool::{
    EventDef, GenericParamDef, MethodDef, MethodRef, ParamDef, PropertyDef, TypeDef, TypeDefKind,
    TypePool, WellKnown,
};
pub use ty::{DefId, EventId, GenericOwner, GenericParamRef, MethodId, PropertyId, Ty};
