// src/index.rs
//
// Index model. An index starts as a DeferredIndex holding symbolic
// (attribute-name, aspect) pairs and is expanded into a concrete Index
// against its owning structure during resolution. copy() goes the other
// way: a resolved index re-emits its symbolic form so a structure clone
// can be re-attached to a different owner.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::attribute::{Attribute, ReferenceAspect};
use crate::errors::{MetaError, Result};

/// Snapshot of one key column of a resolved index. `aspect` is the
/// selector the symbolic form used (None when the whole attribute was
/// selected), kept for copy-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    attribute: Box<str>,
    aspect: Option<ReferenceAspect>,
    column: Box<str>,
    not_null: bool,
}

impl IndexColumn {
    pub(crate) fn new(
        attribute: impl Into<Box<str>>,
        aspect: Option<ReferenceAspect>,
        column: impl Into<Box<str>>,
        not_null: bool,
    ) -> Self {
        IndexColumn {
            attribute: attribute.into(),
            aspect,
            column: column.into(),
            not_null,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn aspect(&self) -> Option<ReferenceAspect> {
        self.aspect
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn not_null(&self) -> bool {
        self.not_null
    }
}

/// A resolved index: a non-empty ordered column list plus flags and the
/// derived deduplicated owning-attribute list.
#[derive(Debug, Clone)]
pub struct Index {
    name: Box<str>,
    unique: bool,
    custom: bool,
    in_memory: bool,
    compress: usize,
    columns: SmallVec<[IndexColumn; 4]>,
    key_attributes: SmallVec<[Box<str>; 4]>,
}

impl Index {
    /// Unique indexes require every column to be non-nullable; this is
    /// checked here, at construction, not deferred to the DB layer.
    pub fn new(
        name: impl Into<Box<str>>,
        unique: bool,
        custom: bool,
        in_memory: bool,
        compress: usize,
        columns: SmallVec<[IndexColumn; 4]>,
    ) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(MetaError::EmptyIndex {
                index: name.to_string(),
            });
        }
        if unique {
            if let Some(nullable) = columns.iter().find(|c| !c.not_null) {
                return Err(MetaError::IncompatibleIndexColumn {
                    index: name.to_string(),
                    column: nullable.column.to_string(),
                });
            }
        }
        let mut key_attributes: SmallVec<[Box<str>; 4]> = SmallVec::new();
        for col in &columns {
            if key_attributes.iter().all(|a| **a != *col.attribute) {
                key_attributes.push(col.attribute.clone());
            }
        }
        Ok(Index {
            name,
            unique,
            custom,
            in_memory,
            compress,
            columns,
            key_attributes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_custom(&self) -> bool {
        self.custom
    }

    pub fn is_in_memory(&self) -> bool {
        self.in_memory
    }

    pub fn compress(&self) -> usize {
        self.compress
    }

    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    /// Deduplicated owning attributes, in column order.
    pub fn key_attributes(&self) -> &[Box<str>] {
        &self.key_attributes
    }

    /// Symbolic form of this index, re-resolvable under a different
    /// owner. Consecutive columns of the same whole-attribute selection
    /// collapse back into one part.
    pub fn to_deferred(&self) -> DeferredIndex {
        let mut parts: Vec<IndexPart> = Vec::new();
        for col in &self.columns {
            let part = IndexPart {
                attribute: col.attribute.clone(),
                aspect: col.aspect,
            };
            if parts.last() != Some(&part) {
                parts.push(part);
            }
        }
        DeferredIndex {
            name: self.name.clone(),
            unique: self.unique,
            custom: self.custom,
            in_memory: self.in_memory,
            compress: self.compress,
            parts,
        }
    }
}

/// One symbolic key of a deferred index: an attribute name plus an
/// optional reference-aspect selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPart {
    pub attribute: Box<str>,
    pub aspect: Option<ReferenceAspect>,
}

impl IndexPart {
    pub fn attribute(name: impl Into<Box<str>>) -> Self {
        IndexPart {
            attribute: name.into(),
            aspect: None,
        }
    }

    pub fn aspect(name: impl Into<Box<str>>, aspect: ReferenceAspect) -> Self {
        IndexPart {
            attribute: name.into(),
            aspect: Some(aspect),
        }
    }
}

/// An index in symbolic form, before resolution against its owner.
#[derive(Debug, Clone)]
pub struct DeferredIndex {
    name: Box<str>,
    unique: bool,
    custom: bool,
    in_memory: bool,
    compress: usize,
    parts: Vec<IndexPart>,
}

impl DeferredIndex {
    pub fn new(name: impl Into<Box<str>>, parts: Vec<IndexPart>) -> Self {
        DeferredIndex {
            name: name.into(),
            unique: false,
            custom: false,
            in_memory: false,
            compress: 0,
            parts,
        }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn custom(mut self, custom: bool) -> Self {
        self.custom = custom;
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn compress(mut self, compress: usize) -> Self {
        self.compress = compress;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parts(&self) -> &[IndexPart] {
        &self.parts
    }

    /// Expand the symbolic parts against the owner's attribute scope.
    ///
    /// A plain part contributes all columns of its attribute. An aspect
    /// part contributes exactly that aspect's column - or nothing if the
    /// aspect has no persisted column under the current configuration
    /// (no branch column in a single-branch system, no revision column
    /// for unversioned references); a missing target-id or target-type
    /// column is a structural failure.
    pub fn resolve<F>(&self, find: F) -> Result<Index>
    where
        F: Fn(&str) -> Result<Option<Arc<Attribute>>>,
    {
        let mut columns: SmallVec<[IndexColumn; 4]> = SmallVec::new();
        for part in &self.parts {
            let attr = find(&part.attribute)?.ok_or_else(|| MetaError::MissingIndexColumn {
                index: self.name.to_string(),
                attribute: part.attribute.to_string(),
            })?;
            match part.aspect {
                None => {
                    for col in attr.columns() {
                        columns.push(IndexColumn::new(
                            attr.name(),
                            None,
                            col.name(),
                            col.not_null(),
                        ));
                    }
                }
                Some(aspect) => match attr.column_for_aspect(aspect) {
                    Some(col) => columns.push(IndexColumn::new(
                        attr.name(),
                        Some(aspect),
                        col.name(),
                        col.not_null(),
                    )),
                    None if aspect.is_configurable() => {}
                    None => {
                        return Err(MetaError::MissingIndexColumn {
                            index: self.name.to_string(),
                            attribute: part.attribute.to_string(),
                        })
                    }
                },
            }
        }
        Index::new(
            self.name.clone(),
            self.unique,
            self.custom,
            self.in_memory,
            self.compress,
            columns,
        )
    }
}

/// An index slot of a structure: symbolic until the owning structure is
/// resolved, concrete afterwards.
#[derive(Debug, Clone)]
pub enum IndexHandle {
    Deferred(DeferredIndex),
    Resolved(Index),
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        match self {
            IndexHandle::Deferred(d) => d.name(),
            IndexHandle::Resolved(i) => i.name(),
        }
    }

    /// Access the concrete index; querying before resolution is a usage
    /// error.
    pub fn resolved(&self) -> Result<&Index> {
        match self {
            IndexHandle::Resolved(index) => Ok(index),
            IndexHandle::Deferred(d) => {
                Err(MetaError::unresolved(format!("index '{}'", d.name())))
            }
        }
    }

    /// Copy for re-attachment: always the symbolic form.
    pub fn copy(&self) -> IndexHandle {
        match self {
            IndexHandle::Deferred(d) => IndexHandle::Deferred(d.clone()),
            IndexHandle::Resolved(i) => IndexHandle::Deferred(i.to_deferred()),
        }
    }
}

/// The implicit lookup index for a reference attribute: branch, target
/// identifier and revision aspects, named after the attribute. Aspects
/// without a persisted column drop out during resolution.
pub fn reference_index(attr: &Attribute) -> DeferredIndex {
    DeferredIndex::new(
        attr.name(),
        vec![
            IndexPart::aspect(attr.name(), ReferenceAspect::Branch),
            IndexPart::aspect(attr.name(), ReferenceAspect::TargetId),
            IndexPart::aspect(attr.name(), ReferenceAspect::Revision),
        ],
    )
}
