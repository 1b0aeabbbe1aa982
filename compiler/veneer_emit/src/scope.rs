//! The module scope: per-process synthesis context.
//!
//! A [`ModuleScope`] is created once and shared by every proxy request. It
//! owns the type pool, hands out fresh type names and holds the cache of
//! synthesized types. Nothing here is global; tear the scope down by
//! dropping it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use veneer_types::{Ty, TypePool};

use crate::cache::{CacheKey, ProxyCache};
use crate::error::SynthesisError;
use crate::facade::{synthesize_type, ProxyTypeRequest};
use crate::synthesized::TypeHandle;

/// Default namespace of synthesized type names.
pub const DEFAULT_NAMESPACE: &str = "Veneer.Proxies";

/// Configuration of a [`ModuleScope`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeOptions {
    /// Prefix of every fresh type name.
    pub namespace: String,
    /// Run the stack verifier over every lowered body.
    pub verify_bodies: bool,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            verify_bodies: true,
        }
    }
}

impl ScopeOptions {
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_verification(mut self, verify_bodies: bool) -> Self {
        self.verify_bodies = verify_bodies;
        self
    }
}

/// Shared synthesis context.
pub struct ModuleScope {
    pool: Arc<TypePool>,
    options: ScopeOptions,
    counter: AtomicU32,
    cache: ProxyCache,
    types: RwLock<FxHashMap<String, TypeHandle>>,
}

impl ModuleScope {
    pub fn new(pool: Arc<TypePool>) -> Self {
        Self::with_options(pool, ScopeOptions::default())
    }

    pub fn with_options(pool: Arc<TypePool>, options: ScopeOptions) -> Self {
        Self {
            pool,
            options,
            counter: AtomicU32::new(0),
            cache: ProxyCache::new(),
            types: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn pool(&self) -> &TypePool {
        &self.pool
    }

    pub fn options(&self) -> &ScopeOptions {
        &self.options
    }

    pub fn cache(&self) -> &ProxyCache {
        &self.cache
    }

    /// `{namespace}.{Hint}Proxy{n}`, unique within this scope. The hint is
    /// the last segment of `ty`'s name.
    pub fn fresh_type_name(&self, ty: &Ty) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}.{}Proxy{n}", self.options.namespace, self.hint(ty))
    }

    fn hint(&self, ty: &Ty) -> &str {
        let Some(def) = self.pool.def_of(ty) else {
            return match ty {
                Ty::String => "String",
                _ => "Object",
            };
        };
        let name = self.pool.name(self.pool.def(def).name);
        name.rsplit('.').next().unwrap_or(name)
    }

    /// The proxy type for `key`, synthesized on first request and shared
    /// afterwards. Concurrent first requests synthesize once.
    #[tracing::instrument(level = "debug", skip_all, fields(interfaces = key.interfaces().len()))]
    pub fn proxy_type(&self, key: &CacheKey) -> Result<TypeHandle, SynthesisError> {
        self.cache.get_or_synthesize(key, || {
            let hint = match (key.base(), key.interfaces().first()) {
                (Ty::Object, Some(iface)) => iface,
                (base, _) => base,
            };
            let request = ProxyTypeRequest::new(self.fresh_type_name(hint), key.base().clone())
                .with_interfaces(key.interfaces().iter().cloned())
                .intercepting(key.intercept().iter().copied())
                .with_options(key.options());
            self.synthesize(&request)
        })
    }

    /// Synthesize `request` without consulting the cache. The name must
    /// not have been used by an earlier synthesis in this scope.
    pub fn synthesize(&self, request: &ProxyTypeRequest) -> Result<TypeHandle, SynthesisError> {
        let duplicate = || SynthesisError::DuplicateTypeName {
            name: request.name.clone(),
        };
        if self.types.read().contains_key(&request.name) {
            return Err(duplicate());
        }
        let ty = synthesize_type(&self.pool, request, self.options.verify_bodies)?;
        let mut types = self.types.write();
        if types.contains_key(&request.name) {
            return Err(duplicate());
        }
        types.insert(request.name.clone(), Arc::clone(&ty));
        tracing::debug!(name = %request.name, "proxy type registered");
        Ok(ty)
    }

    /// A type synthesized in this scope, by full name.
    pub fn lookup_type(&self, name: &str) -> Option<TypeHandle> {
        self.types.read().get(name).cloned()
    }

    /// Number of types synthesized in this scope.
    pub fn type_count(&self) -> usize {
        self.types.read().len()
    }

    /// Synthesize many keys in parallel, returning results in input order.
    pub fn prewarm(&self, keys: &[CacheKey]) -> Vec<Result<TypeHandle, SynthesisError>> {
        keys.par_iter().map(|key| self.proxy_type(key)).collect()
    }
}
