//! Errors surfaced by type synthesis.
//!
//! Every failure is local to one synthesis and reported synchronously; none
//! is retried, since synthesis is a pure function of its inputs. Errors are
//! `Clone` so the cache can hand one failure to every waiter on a key.

use thiserror::Error;
use veneer_ir::{BindingError, LowerError, VerifyError};

use crate::method::EmitterState;

/// A structural invariant of generic-signature translation was violated.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("`{member}` is reached through open generic type `{declaring}`")]
    OpenDeclaringType { member: String, declaring: String },
    #[error("`{member}` refers to generic parameter `{param}`, which belongs to neither the member nor its declaring type")]
    ForeignParameter { member: String, param: String },
    #[error("binder declared {found} generic parameters for `{member}`, expected {expected}")]
    ArityMismatch {
        member: String,
        expected: usize,
        found: usize,
    },
    #[error("`{member}` still mentions untranslated generic parameter `{param}`")]
    LeftoverParameter { member: String, param: String },
}

/// Failure to synthesize a type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SynthesisError {
    #[error("`{ty}` is an open generic definition; only closed generic types can be proxied")]
    UnsupportedOpenGeneric { ty: String },

    #[error("member `{member}` cannot be overridden")]
    NonVirtualMember { member: String },

    #[error("`{owner}` already defines a member `{name}` with this signature")]
    DuplicateMemberDefinition { owner: String, name: String },

    #[error("type name `{name}` is already defined in this scope")]
    DuplicateTypeName { name: String },

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error("in `{member}`: {source}")]
    Binding {
        member: String,
        #[source]
        source: BindingError,
    },

    #[error("cannot lower `{member}`: {source}")]
    Lowering {
        member: String,
        #[source]
        source: LowerError,
    },

    #[error("`{member}` body failed verification: {source}")]
    Verification {
        member: String,
        #[source]
        source: VerifyError,
    },

    #[error("cannot {operation} `{member}` in state {state:?}")]
    InvalidState {
        member: String,
        state: EmitterState,
        operation: &'static str,
    },

    #[error("generic parameters of `{owner}` are already defined")]
    GenericParametersAlreadyDefined { owner: String },

    #[error("`{member}` has no body")]
    MissingBody { member: String },

    #[error("`{ty}` does not implement `{member}`")]
    MissingImplementation { ty: String, member: String },

    #[error("`{ty}` cannot be proxied: {reason}")]
    InvalidProxyTarget { ty: String, reason: &'static str },

    #[error("`{ty}` has already been finalized")]
    AlreadyFinalized { ty: String },
}

impl SynthesisError {
    /// Attribute a lowering failure to `member`. Binding failures keep their
    /// own kind.
    pub(crate) fn lowering(member: impl Into<String>, err: LowerError) -> Self {
        let member = member.into();
        match err {
            LowerError::Binding(source) => SynthesisError::Binding { member, source },
            source => SynthesisError::Lowering { member, source },
        }
    }
}
