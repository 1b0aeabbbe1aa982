//! Single-flight cache of synthesized proxy types.
//!
//! Each key owns a slot (`Arc<OnceLock<_>>`). The map's shard lock is held
//! only long enough to fetch or insert the slot; synthesis then runs inside
//! `OnceLock::get_or_init`, so racing requests for one key wait for the
//! first synthesis while requests for other keys proceed.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use veneer_types::{MethodId, Ty};

use crate::error::SynthesisError;
use crate::facade::ProxyOptions;
use crate::synthesized::TypeHandle;

/// Everything that distinguishes one proxy type from another, normalized so
/// that equivalent requests compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    base: Ty,
    interfaces: Vec<Ty>,
    intercept: Vec<MethodId>,
    options: ProxyOptions,
}

impl CacheKey {
    /// Interfaces and intercepted methods are sorted and deduplicated.
    pub fn new(
        base: Ty,
        interfaces: impl IntoIterator<Item = Ty>,
        intercept: impl IntoIterator<Item = MethodId>,
        options: ProxyOptions,
    ) -> Self {
        let mut interfaces: Vec<Ty> = interfaces.into_iter().collect();
        interfaces.sort();
        interfaces.dedup();
        let mut intercept: Vec<MethodId> = intercept.into_iter().collect();
        intercept.sort_unstable();
        intercept.dedup();
        Self {
            base,
            interfaces,
            intercept,
            options,
        }
    }

    /// An interface proxy over `object`.
    pub fn for_interfaces(interfaces: impl IntoIterator<Item = Ty>, options: ProxyOptions) -> Self {
        Self::new(Ty::Object, interfaces, std::iter::empty(), options)
    }

    pub fn base(&self) -> &Ty {
        &self.base
    }

    pub fn interfaces(&self) -> &[Ty] {
        &self.interfaces
    }

    pub fn intercept(&self) -> &[MethodId] {
        &self.intercept
    }

    pub fn options(&self) -> ProxyOptions {
        self.options
    }
}

type Slot = Arc<OnceLock<Result<TypeHandle, SynthesisError>>>;

/// Synthesized types by key. Failures are cached like successes.
#[derive(Debug, Default)]
pub struct ProxyCache {
    slots: DashMap<CacheKey, Slot, FxBuildHasher>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached result for `key`, running `synthesize` if no request for
    /// it has completed or is in flight.
    pub fn get_or_synthesize<F>(
        &self,
        key: &CacheKey,
        synthesize: F,
    ) -> Result<TypeHandle, SynthesisError>
    where
        F: FnOnce() -> Result<TypeHandle, SynthesisError>,
    {
        let slot = self.slot(key);
        let mut ran = false;
        let result = slot.get_or_init(|| {
            ran = true;
            synthesize()
        });
        if !ran {
            tracing::trace!(base = ?key.base, "proxy cache hit");
        }
        result.clone()
    }

    /// The completed result for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Result<TypeHandle, SynthesisError>> {
        let slot = self.slots.get(key)?.value().clone();
        slot.get().cloned()
    }

    /// Number of keys requested so far, including in-flight ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fetch or insert the slot without holding the shard lock afterwards.
    fn slot(&self, key: &CacheKey) -> Slot {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(key.clone()).or_default().value())
    }
}

#[cfg(test)]
mod tests;
