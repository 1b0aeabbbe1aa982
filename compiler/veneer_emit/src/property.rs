//! Property emitter: a named value with a getter, a setter, or both.

use veneer_types::Ty;

use crate::type_emitter::MethodHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEmitter {
    name: String,
    ty: Ty,
    get: Option<MethodHandle>,
    set: Option<MethodHandle>,
}

impl PropertyEmitter {
    pub(crate) fn new(
        name: String,
        ty: Ty,
        get: Option<MethodHandle>,
        set: Option<MethodHandle>,
    ) -> Self {
        Self { name, ty, get, set }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    /// The `get_<name>` accessor.
    pub fn get_method(&self) -> Option<MethodHandle> {
        self.get
    }

    /// The `set_<name>` accessor.
    pub fn set_method(&self) -> Option<MethodHandle> {
        self.set
    }

    pub(crate) fn accessors(&self) -> impl Iterator<Item = MethodHandle> {
        self.get.into_iter().chain(self.set)
    }
}
