//! Attribute flags on type, method and generic-parameter descriptors.

use bitflags::bitflags;

bitflags! {
    /// Properties of a type definition.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct TypeFlags: u32 {
        /// Cannot be derived from.
        const SEALED = 1 << 0;
        /// Cannot be instantiated directly.
        const ABSTRACT = 1 << 1;
        /// Synthesized at run time rather than registered up front.
        const SYNTHESIZED = 1 << 2;
    }
}

bitflags! {
    /// Properties of a method descriptor.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct MethodFlags: u32 {
        /// Dispatched through the receiver's method table.
        const VIRTUAL = 1 << 0;
        /// Has no body; derived types must override.
        const ABSTRACT = 1 << 1;
        /// No receiver.
        const STATIC = 1 << 2;
        /// Virtual but may not be overridden further.
        const FINAL = 1 << 3;
        /// Instance constructor.
        const CONSTRUCTOR = 1 << 4;
        /// Accessor of a property or event (`add_X`, `remove_X`).
        const SPECIAL_NAME = 1 << 5;
        /// Visible outside the declaring type.
        const PUBLIC = 1 << 6;
    }
}

impl MethodFlags {
    /// Flags given to members that override a virtual or interface method.
    pub const OVERRIDE: Self = Self::VIRTUAL.union(Self::PUBLIC);

    /// Whether a derived type may supply its own body for this method.
    pub fn is_overridable(self) -> bool {
        self.intersects(Self::VIRTUAL | Self::ABSTRACT) && !self.intersects(Self::FINAL | Self::STATIC)
    }
}

bitflags! {
    /// Variance and special constraints of a generic parameter.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct GenericParamAttrs: u32 {
        /// `out T`
        const COVARIANT = 1 << 0;
        /// `in T`
        const CONTRAVARIANT = 1 << 1;
        /// Must be a reference type.
        const REFERENCE_TYPE = 1 << 2;
        /// Must be a non-nullable value type.
        const VALUE_TYPE = 1 << 3;
        /// Must expose a public parameterless constructor.
        const DEFAULT_CONSTRUCTOR = 1 << 4;
    }
}

impl GenericParamAttrs {
    /// Variance bits.
    pub const VARIANCE: Self = Self::COVARIANT.union(Self::CONTRAVARIANT);
}
