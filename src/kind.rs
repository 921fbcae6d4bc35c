// src/kind.rs
//
// Kind tags for type nodes. Algebra and subtype checks dispatch on these.

use std::fmt;

/// What kind of type a [`crate::object::MetaObject`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Supertype of everything.
    Any,
    /// Type of the null value.
    Null,
    /// Sentinel for failed type computations.
    Invalid,
    /// Atomic value type (String, Integer, ...).
    Primitive,
    /// Class type: single inheritance, abstractness, versioning.
    Item,
    /// Plain structure without inheritance.
    Struct,
    /// Homogeneous collection (COLLECTION/LIST/SET).
    Collection,
    /// Fixed-arity heterogeneous product.
    Tuple,
    /// Function signature.
    Function,
    /// Union-like type defined by its specialisation set.
    Alternative,
}

impl Kind {
    pub fn is_item(self) -> bool {
        self == Kind::Item
    }

    /// Kinds whose values admit ordering comparison.
    pub fn is_comparable(self) -> bool {
        matches!(self, Kind::Null | Kind::Primitive | Kind::Tuple)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Any => "ANY",
            Kind::Null => "NULL",
            Kind::Invalid => "INVALID",
            Kind::Primitive => "primitive",
            Kind::Item => "item",
            Kind::Struct => "struct",
            Kind::Collection => "collection",
            Kind::Tuple => "tuple",
            Kind::Function => "function",
            Kind::Alternative => "alternative",
        };
        f.write_str(name)
    }
}
