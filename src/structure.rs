// src/structure.rs
//
// Structure types: a named, ordered attribute list with indexes and
// storage hints, but no inheritance. Classes embed a StructType and add
// the hierarchy on top.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::attribute::{Attribute, AttributeSeq};
use crate::context::TypeContext;
use crate::errors::{MetaError, Result};
use crate::freeze::TypeHeader;
use crate::ident::TypeId;
use crate::index::{reference_index, DeferredIndex, Index, IndexColumn, IndexHandle};

/// Totals cached when a structure freezes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrozenStruct {
    pub(crate) cache_size: u32,
    pub(crate) db_column_count: u32,
}

/// A plain structure type without inheritance.
#[derive(Debug)]
pub struct StructType {
    header: TypeHeader,
    declared: AttributeSeq,
    indexes: Vec<IndexHandle>,
    primary_key: Option<IndexHandle>,
    db_name: Option<Box<str>>,
    db_compress: usize,
    pkey_storage: Option<Box<str>>,
    frozen: Option<FrozenStruct>,
}

impl StructType {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        StructType {
            header: TypeHeader::new(name),
            declared: AttributeSeq::new(),
            indexes: Vec::new(),
            primary_key: None,
            db_name: None,
            db_compress: 0,
            pkey_storage: None,
            frozen: None,
        }
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }

    pub fn header(&self) -> &TypeHeader {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut TypeHeader {
        &mut self.header
    }

    pub fn is_frozen(&self) -> bool {
        self.header.is_frozen()
    }

    /// Append a declared attribute. The name must be unique within this
    /// structure.
    pub fn add_attribute(&mut self, attr: Attribute) -> Result<()> {
        self.header.check_update()?;
        self.declared.push(Arc::new(attr)).map_err(|rejected| {
            MetaError::DuplicateAttribute {
                type_name: self.header.name().to_string(),
                attribute: rejected.name().to_string(),
            }
        })
    }

    pub fn add_index(&mut self, index: DeferredIndex) -> Result<()> {
        self.header.check_update()?;
        self.indexes.push(IndexHandle::Deferred(index));
        Ok(())
    }

    pub fn set_primary_key(&mut self, index: DeferredIndex) -> Result<()> {
        self.header.check_update()?;
        self.primary_key = Some(IndexHandle::Deferred(index));
        Ok(())
    }

    pub fn set_db_name(&mut self, db_name: impl Into<Box<str>>) -> Result<()> {
        self.header.check_update()?;
        self.db_name = Some(db_name.into());
        Ok(())
    }

    pub fn set_db_compress(&mut self, compress: usize) -> Result<()> {
        self.header.check_update()?;
        self.db_compress = compress;
        Ok(())
    }

    pub fn set_pkey_storage(&mut self, storage: impl Into<Box<str>>) -> Result<()> {
        self.header.check_update()?;
        self.pkey_storage = Some(storage.into());
        Ok(())
    }

    pub fn attributes(&self) -> &AttributeSeq {
        &self.declared
    }

    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.declared.get(name)
    }

    pub fn db_name(&self) -> Option<&str> {
        self.db_name.as_deref()
    }

    pub fn db_compress(&self) -> usize {
        self.db_compress
    }

    pub fn pkey_storage(&self) -> Option<&str> {
        self.pkey_storage.as_deref()
    }

    pub fn index_handles(&self) -> &[IndexHandle] {
        &self.indexes
    }

    /// The resolved index list; querying before resolution is a usage
    /// error.
    pub fn indexes(&self) -> Result<Vec<Index>> {
        self.indexes
            .iter()
            .map(|h| h.resolved().cloned())
            .collect()
    }

    pub fn primary_key(&self) -> Result<Option<&Index>> {
        match &self.primary_key {
            None => Ok(None),
            Some(handle) => handle.resolved().map(Some),
        }
    }

    pub(crate) fn primary_key_handle(&self) -> Option<&IndexHandle> {
        self.primary_key.as_ref()
    }

    /// Total cache slots: frozen types answer from the cached total,
    /// modifiable ones recompute from the declared attributes.
    pub fn cache_size(&self) -> u32 {
        match &self.frozen {
            Some(f) => f.cache_size,
            None => self.declared.iter().map(|a| a.cache_size()).sum(),
        }
    }

    pub fn db_column_count(&self) -> u32 {
        match &self.frozen {
            Some(f) => f.db_column_count,
            None => self
                .declared
                .iter()
                .map(|a| a.columns().len() as u32)
                .sum(),
        }
    }

    /// Disjoint borrows for index resolution: the attribute scope stays
    /// readable while the index slots are rewritten.
    pub(crate) fn index_state(
        &mut self,
    ) -> (&AttributeSeq, &mut Vec<IndexHandle>, &mut Option<IndexHandle>) {
        (&self.declared, &mut self.indexes, &mut self.primary_key)
    }

    pub(crate) fn resolve(&mut self, ctx: &mut TypeContext, _self_id: TypeId) -> Result<()> {
        if !self.header.begin_resolve() {
            return Ok(());
        }
        for attr in self.declared.iter() {
            attr.resolve(ctx)?;
        }
        let (declared, indexes, primary_key) = self.index_state();
        let find = |name: &str| -> Result<Option<Arc<Attribute>>> {
            Ok(declared.get(name).cloned())
        };
        resolve_index_list(declared, indexes, primary_key, &find)
    }

    /// Assign the storage layout and cache the totals. Structures lay out
    /// from slot and column zero.
    pub(crate) fn freeze_hook(&mut self, self_id: TypeId) -> Result<()> {
        let (cache_size, db_column_count) =
            attach_layout(self.declared.as_slice(), self_id, 0, 0)?;
        for handle in &self.indexes {
            handle.resolved()?;
        }
        if let Some(pk) = &self.primary_key {
            pk.resolved()?;
        }
        self.frozen = Some(FrozenStruct {
            cache_size,
            db_column_count,
        });
        Ok(())
    }

    /// Structural clone: detached attributes, symbolic indexes, fresh
    /// lifecycle state.
    pub fn copy(&self) -> StructType {
        let mut declared = AttributeSeq::new();
        for attr in self.declared.iter() {
            // Names were unique in the source, so re-insertion cannot
            // collide.
            let _ = declared.push(Arc::new(attr.copy()));
        }
        StructType {
            header: TypeHeader::new(self.header.name()),
            declared,
            indexes: self.indexes.iter().map(IndexHandle::copy).collect(),
            primary_key: self.primary_key.as_ref().map(IndexHandle::copy),
            db_name: self.db_name.clone(),
            db_compress: self.db_compress,
            pkey_storage: self.pkey_storage.clone(),
            frozen: None,
        }
    }
}

/// Attach layout data to a run of attributes starting at the given
/// offsets; returns the totals after the run.
pub(crate) fn attach_layout(
    attrs: &[Arc<Attribute>],
    owner: TypeId,
    first_cache: u32,
    first_column: u32,
) -> Result<(u32, u32)> {
    let mut cache = first_cache;
    let mut column = first_column;
    for attr in attrs {
        attr.attach(owner, cache)?;
        cache += attr.cache_size();
        for col in attr.columns() {
            col.init_index(column)?;
            column += 1;
        }
    }
    Ok((cache, column))
}

/// Resolve the index slots of one structure against an attribute scope.
///
/// The primary key resolves first. Then every reference attribute that
/// requests the default lookup index gets one synthesized, named after
/// the attribute, unless an explicit index of that name exists; a
/// reference without persisted columns of its own falls back to the
/// primary-key columns, or is skipped when there is no primary key.
/// Synthesized indexes precede the declared ones. Remaining deferred
/// slots resolve last.
pub(crate) fn resolve_index_list(
    declared: &AttributeSeq,
    indexes: &mut Vec<IndexHandle>,
    primary_key: &mut Option<IndexHandle>,
    find: &dyn Fn(&str) -> Result<Option<Arc<Attribute>>>,
) -> Result<()> {
    if let Some(handle) = primary_key.as_mut() {
        if let IndexHandle::Deferred(deferred) = handle {
            let resolved = deferred.resolve(find)?;
            *handle = IndexHandle::Resolved(resolved);
        }
    }
    let pk = match primary_key.as_ref() {
        Some(IndexHandle::Resolved(index)) => Some(index.clone()),
        _ => None,
    };

    let mut synthesized: Vec<IndexHandle> = Vec::new();
    for attr in declared.iter() {
        let wants_index = attr
            .reference()
            .is_some_and(|r| r.uses_default_index());
        if !wants_index {
            continue;
        }
        if indexes.iter().any(|h| h.name() == attr.name()) {
            // An explicitly declared index of the same name wins.
            continue;
        }
        if attr.columns().is_empty() {
            // Reference held entirely in the row identity: index over the
            // primary-key columns, if there are any.
            if let Some(pk) = &pk {
                let columns: SmallVec<[IndexColumn; 4]> =
                    pk.columns().iter().cloned().collect();
                let index = Index::new(attr.name(), false, false, false, 0, columns)?;
                synthesized.push(IndexHandle::Resolved(index));
            }
        } else {
            let index = reference_index(attr).resolve(find)?;
            synthesized.push(IndexHandle::Resolved(index));
        }
    }
    if !synthesized.is_empty() {
        synthesized.append(indexes);
        *indexes = synthesized;
    }

    for handle in indexes.iter_mut() {
        if let IndexHandle::Deferred(deferred) = handle {
            let resolved = deferred.resolve(find)?;
            *handle = IndexHandle::Resolved(resolved);
        }
    }
    Ok(())
}
