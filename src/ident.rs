// src/ident.rs
//
// Type handles. A TypeId identifies a node in a TypeContext; the three
// sentinel types are guaranteed to be registered at fixed indices by
// TypeContext::new().

/// Handle to a type node stored in a [`crate::context::TypeContext`].
///
/// Copy, trivial Eq/Hash - type equality is handle equality within one
/// context.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    /// Supertype of every type.
    pub const ANY: TypeId = TypeId(0);
    /// The type of the null value.
    pub const NULL: TypeId = TypeId(1);
    /// Sentinel for failed type computations.
    pub const INVALID: TypeId = TypeId(2);

    /// First index available for registered types.
    pub const FIRST_DYNAMIC: u32 = 3;

    pub(crate) fn new(index: u32) -> Self {
        TypeId(index)
    }

    /// Raw index (for debugging).
    pub fn index(self) -> u32 {
        self.0
    }

    /// Check if this is one of the three sentinel types.
    #[inline]
    pub fn is_sentinel(self) -> bool {
        self.0 < Self::FIRST_DYNAMIC
    }

    #[inline]
    pub fn is_any(self) -> bool {
        self == Self::ANY
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    #[inline]
    pub fn is_invalid(self) -> bool {
        self == Self::INVALID
    }
}
