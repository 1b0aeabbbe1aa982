//! Veneer IR - member bodies and their lowering.
//!
//! A synthesized member's body is described with a small, closed IR and
//! lowered into a stack-machine instruction sequence:
//!
//! - [`Reference`] / [`Expression`] / [`Statement`]: the body IR
//! - [`lower_block`]: IR → [`Instr`], written to any [`InstrSink`]
//! - [`verify_body`]: stack-discipline check of a [`LoweredBody`]
//! - [`bind_arguments`] / [`pack_to_object_array`]: argument helpers used
//!   by forwarding bodies
//!
//! # Evaluation Order
//!
//! Composite nodes lower their operands left to right before themselves.
//! Owners of instance fields and addresses of by-ref slots are pushed before
//! the value being stored.

mod args;
mod error;
mod instr;
mod ir;
mod lower;
mod stack;
mod verify;

pub use args::{bind_arguments, has_by_ref, load_arguments, pack_to_object_array};
pub use error::{BindingError, LowerError, VerifyError};
pub use instr::{CallSite, FieldIndex, Instr, InstrBuffer, InstrSink, Label, LocalId, LoweredBody};
pub use ir::{
    ArgumentReference, CodeBlock, CompareOp, Constant, Dispatch, Expression, FieldReference,
    LocalReference, Reference, Statement,
};
pub use lower::{lower_block, LowerCtx, MemberShape};
pub use verify::verify_body;
