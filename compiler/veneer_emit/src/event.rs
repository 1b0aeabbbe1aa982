//! Event emitter: a named pair of subscribe / unsubscribe accessors.
//!
//! The accessors are ordinary method emitters owned by the type emitter;
//! the event only records which two they are.

use veneer_types::Ty;

use crate::type_emitter::MethodHandle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventEmitter {
    name: String,
    handler: Ty,
    add: MethodHandle,
    remove: MethodHandle,
}

impl EventEmitter {
    pub(crate) fn new(name: String, handler: Ty, add: MethodHandle, remove: MethodHandle) -> Self {
        Self {
            name,
            handler,
            add,
            remove,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &Ty {
        &self.handler
    }

    /// The `add_<name>` accessor.
    pub fn add_method(&self) -> MethodHandle {
        self.add
    }

    /// The `remove_<name>` accessor.
    pub fn remove_method(&self) -> MethodHandle {
        self.remove
    }

    pub(crate) fn accessors(&self) -> [MethodHandle; 2] {
        [self.add, self.remove]
    }
}
