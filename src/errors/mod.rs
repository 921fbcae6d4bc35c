// src/errors/mod.rs
//! Structured errors for the metadata engine.
//!
//! Two families, with stable diagnostic codes:
//! - E1xxx: structural/configuration errors raised during
//!   resolve/freeze/construction. These abort the whole repository build.
//! - E2xxx: usage errors (mutating frozen nodes, querying unresolved
//!   state) - programmer errors, not expected at steady state.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MetaError>;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum MetaError {
    #[error("unknown type '{name}'")]
    #[diagnostic(code(E1001))]
    UnknownType { name: String },

    #[error("duplicate type name '{name}'")]
    #[diagnostic(code(E1002))]
    DuplicateType { name: String },

    #[error("duplicate attribute '{attribute}' in '{type_name}'")]
    #[diagnostic(code(E1003))]
    DuplicateAttribute {
        type_name: String,
        attribute: String,
    },

    #[error("cyclic inheritance hierarchy in '{type_name}'")]
    #[diagnostic(code(E1004))]
    CyclicHierarchy { type_name: String },

    #[error("final class '{super_name}' cannot be sub-classed (as '{type_name}')")]
    #[diagnostic(code(E1005))]
    FinalSuperclass {
        super_name: String,
        type_name: String,
    },

    #[error("type '{type_name}': {message}")]
    #[diagnostic(code(E1006))]
    InvalidOverride { type_name: String, message: String },

    #[error("unique index '{index}' over nullable column '{column}'")]
    #[diagnostic(
        code(E1007),
        help("all columns of a unique index must be declared not-null")
    )]
    IncompatibleIndexColumn { index: String, column: String },

    #[error("index '{index}': no column for attribute '{attribute}'")]
    #[diagnostic(code(E1008))]
    MissingIndexColumn { index: String, attribute: String },

    #[error("index '{index}' has no columns")]
    #[diagnostic(code(E1009))]
    EmptyIndex { index: String },

    #[error("no common root in item type hierarchy: '{first}' vs. '{second}'")]
    #[diagnostic(code(E1010))]
    NoCommonRoot { first: String, second: String },

    #[error("ancestor '{ancestor}' of '{type_name}' is not declared in the type context")]
    #[diagnostic(code(E1011))]
    UndeclaredAncestor {
        type_name: String,
        ancestor: String,
    },

    #[error("attribute '{attribute}' is already attached to another type")]
    #[diagnostic(
        code(E1012),
        help("use copy() to re-attach an attribute to a different owner")
    )]
    AttributeAlreadyAttached { attribute: String },

    #[error("cannot modify frozen type '{type_name}'")]
    #[diagnostic(code(E2001))]
    Frozen { type_name: String },

    #[error("unresolved reference: {what}")]
    #[diagnostic(code(E2002), help("call TypeContext::resolve_references() first"))]
    Unresolved { what: String },

    #[error("type context is not completed")]
    #[diagnostic(
        code(E2003),
        help("a TypeSystem can only be built over a resolved and frozen context")
    )]
    ContextNotCompleted,
}

impl MetaError {
    pub fn unknown_type(name: &str) -> Self {
        MetaError::UnknownType { name: name.into() }
    }

    pub fn unresolved(what: impl Into<String>) -> Self {
        MetaError::Unresolved { what: what.into() }
    }

    /// Whether this is a structural error (aborts the repository build)
    /// as opposed to a usage error.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            MetaError::Frozen { .. } | MetaError::Unresolved { .. } | MetaError::ContextNotCompleted
        )
    }
}
