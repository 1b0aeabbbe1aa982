//! Errors raised while binding, lowering and verifying member bodies.

use thiserror::Error;

use crate::instr::Label;

/// An IR node referenced a storage slot that does not exist in the member
/// being lowered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("argument reference was never bound to a position")]
    Unbound,
    #[error("argument already bound to position {position}")]
    AlreadyBound { position: u32 },
    #[error("argument position {position} is outside the member's {slots} argument slots")]
    PositionOutOfRange { position: u32, slots: u32 },
    #[error("receiver referenced from a static member")]
    ReceiverInStaticMember,
    #[error("the receiver slot cannot be assigned")]
    AssignToReceiver,
    #[error("local #{local} is not declared in this body")]
    UnknownLocal { local: u32 },
}

/// Failure to lower an IR body.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LowerError {
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error("a `void` value was used as an operand")]
    VoidValue,
    #[error("virtual call has no receiver")]
    VirtualCallWithoutReceiver,
    #[error("`return` with a value in a member returning `void`")]
    ReturnValueFromVoid,
}

/// A lowered body violates the stack discipline of the target format.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("stack underflow at instruction {at}")]
    StackUnderflow { at: usize },
    #[error("label {label:?} reached with stack depth {found}, expected {expected}")]
    DepthMismatch {
        label: Label,
        expected: u32,
        found: u32,
    },
    #[error("`ret` at instruction {at} with stack depth {found}, expected {expected}")]
    BadReturnDepth { at: usize, expected: u32, found: u32 },
    #[error("branch at instruction {at} targets unmarked label {label:?}")]
    UnknownLabel { at: usize, label: Label },
    #[error("execution falls off the end of the body")]
    FallsOffEnd,
    #[error("instruction {at} uses argument slot {slot}, member has {slots}")]
    ArgumentOutOfRange { at: usize, slot: u32, slots: u32 },
    #[error("instruction {at} uses undeclared local #{local}")]
    UnknownLocal { at: usize, local: u32 },
}
