//! Veneer emit - member emitters and proxy type synthesis.
//!
//! Builds new types at run time whose members forward to an interceptor
//! chain:
//!
//! - [`copy_signature`]: rewrites a source method's generic parameters,
//!   constraints and signature onto a member being synthesized
//! - [`MethodEmitter`] / [`EventEmitter`] / [`PropertyEmitter`] /
//!   [`TypeEmitter`]: per-member and per-type builders that lower and
//!   verify IR bodies
//! - [`synthesize_type`]: the proxy facade
//! - [`ModuleScope`] / [`ProxyCache`]: the injected per-process context with
//!   fresh type names and a single-flight cache
//!
//! # Tracing
//!
//! Synthesis and finalization open `debug` spans; per-member lowering logs
//! at `trace`. Call [`init_tracing`] to print them when `RUST_LOG` is set.

mod cache;
mod error;
mod event;
mod facade;
mod format;
mod generics;
mod method;
mod property;
mod scope;
mod synthesized;
mod type_emitter;

use std::sync::Once;

pub use cache::{CacheKey, ProxyCache};
pub use error::{SynthesisError, TranslationError};
pub use event::EventEmitter;
pub use facade::{
    synthesize_type, ProxyOptions, ProxyTypeRequest, CALLBACK_SUFFIX, INTERCEPTORS_FIELD,
    TARGET_FIELD,
};
pub use format::{describe_method, dump_type};
pub use generics::{
    copy_signature, translate_onto_type_params, CopiedSignature, EmittedGenericParam,
    GenericBinder, GenericParameterMap, SignatureTranslator, UnsupportedConstraint,
};
pub use method::{EmitterState, MethodEmitter};
pub use property::PropertyEmitter;
pub use scope::{ModuleScope, ScopeOptions, DEFAULT_NAMESPACE};
pub use synthesized::{
    EmittedEvent, EmittedField, EmittedMethod, EmittedProperty, MemberTable, SynthesizedType,
    TypeHandle,
};
pub use type_emitter::{
    EventHandle, MethodHandle, PropertyHandle, TypeEmitter, CONSTRUCTOR_NAME,
    TYPE_INITIALIZER_NAME,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing subscriber for debug output.
///
/// Call this once at startup to enable tracing output.
/// Use `RUST_LOG` environment variable to control log levels:
/// - `RUST_LOG=veneer_emit=debug` - synthesis and finalization spans
/// - `RUST_LOG=veneer_emit=trace` - per-member lowering
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
