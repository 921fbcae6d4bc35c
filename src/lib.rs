// src/lib.rs
//! Type and schema metadata engine for a versioned object store.
//!
//! A [`context::TypeContext`] holds one closed set of type definitions:
//! primitives, structures, classes with single inheritance, collections,
//! tuples, functions and alternatives. Definitions are built mutable,
//! then the whole context is resolved (symbolic names become ids) and
//! frozen (derived caches computed, nodes immutable) in one pass via
//! [`context::TypeContext::resolve_references`]. A frozen context can be
//! shared and wrapped in an [`algebra::TypeSystem`] for union,
//! intersection and compatibility queries.

pub mod algebra;
pub mod attribute;
pub mod class;
pub mod context;
pub mod errors;
pub mod freeze;
pub mod ident;
pub mod index;
pub mod kind;
pub mod object;
pub mod structure;

pub use algebra::TypeSystem;
pub use attribute::{Attribute, AttributeSeq, DbColumn, HistoryType, Reference, ReferenceAspect, StorageSpec};
pub use class::ClassType;
pub use context::TypeContext;
pub use errors::{MetaError, Result};
pub use freeze::FreezeState;
pub use ident::TypeId;
pub use index::{DeferredIndex, Index, IndexHandle, IndexPart};
pub use kind::Kind;
pub use object::{CollectionKind, MetaObject, PrimitiveType, TypeRef};
pub use structure::StructType;
