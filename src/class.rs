// src/class.rs
//
// Class types: single-inheritance item types on top of StructType. The
// interesting machinery is the attribute merge engine (inherited list
// with in-place override substitution), the override compatibility
// checks, and the freeze hook that snapshots ancestors, the merged
// attribute list and the merged index list.

use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::attribute::{Attribute, AttributeSeq, HistoryType};
use crate::context::TypeContext;
use crate::errors::{MetaError, Result};
use crate::freeze::TypeHeader;
use crate::ident::TypeId;
use crate::index::{DeferredIndex, Index};
use crate::object::TypeRef;
use crate::structure::{attach_layout, resolve_index_list, StructType};

/// Caches computed when a class freezes. Queries on a frozen class are
/// O(1) or a plain clone; nothing walks the hierarchy anymore.
#[derive(Debug)]
pub(crate) struct FrozenClass {
    /// This class and every superclass, as a set.
    ancestors: FxHashSet<TypeId>,
    /// Inherited attributes (with overrides substituted in place)
    /// followed by the locally declared ones.
    all_attributes: Vec<Arc<Attribute>>,
    by_name: FxHashMap<Box<str>, usize>,
    all_indices: Vec<Index>,
    primary_key: Option<Index>,
    cache_size: u32,
    db_column_count: u32,
}

/// An item type: structure plus single inheritance, abstractness,
/// finality and versioning.
pub struct ClassType {
    structure: StructType,
    superclass: Option<TypeRef>,
    is_abstract: bool,
    is_final: bool,
    versioned: bool,
    association: bool,
    annotations: FxHashMap<any::TypeId, Arc<dyn Any + Send + Sync>>,
    overrides: FxHashMap<Box<str>, Arc<Attribute>>,
    frozen: Option<FrozenClass>,
}

impl ClassType {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        ClassType {
            structure: StructType::new(name),
            superclass: None,
            is_abstract: false,
            is_final: false,
            versioned: true,
            association: false,
            annotations: FxHashMap::default(),
            overrides: FxHashMap::default(),
            frozen: None,
        }
    }

    pub fn name(&self) -> &str {
        self.structure.name()
    }

    pub fn header(&self) -> &TypeHeader {
        self.structure.header()
    }

    pub(crate) fn header_mut(&mut self) -> &mut TypeHeader {
        self.structure.header_mut()
    }

    pub fn structure(&self) -> &StructType {
        &self.structure
    }

    pub fn is_frozen(&self) -> bool {
        self.structure.is_frozen()
    }

    // --- builders / mutators (all guarded by the freeze state) ---

    pub fn set_superclass(&mut self, name: impl Into<Box<str>>) -> Result<()> {
        self.header().check_update()?;
        self.superclass = Some(TypeRef::named(name));
        Ok(())
    }

    pub fn set_abstract(&mut self, is_abstract: bool) -> Result<()> {
        self.header().check_update()?;
        self.is_abstract = is_abstract;
        Ok(())
    }

    pub fn set_final(&mut self, is_final: bool) -> Result<()> {
        self.header().check_update()?;
        self.is_final = is_final;
        Ok(())
    }

    pub fn set_versioned(&mut self, versioned: bool) -> Result<()> {
        self.header().check_update()?;
        self.versioned = versioned;
        Ok(())
    }

    pub fn set_association(&mut self, association: bool) -> Result<()> {
        self.header().check_update()?;
        self.association = association;
        Ok(())
    }

    pub fn add_attribute(&mut self, attr: Attribute) -> Result<()> {
        self.structure.add_attribute(attr)
    }

    pub fn add_index(&mut self, index: DeferredIndex) -> Result<()> {
        self.structure.add_index(index)
    }

    pub fn set_primary_key(&mut self, index: DeferredIndex) -> Result<()> {
        self.structure.set_primary_key(index)
    }

    /// Register a replacement for an inherited attribute. At most one
    /// override per attribute name; whether the inherited original exists
    /// and is compatible is checked during resolution.
    pub fn override_attribute(&mut self, attr: Attribute) -> Result<()> {
        self.header().check_update()?;
        let name = attr.name().to_string();
        if self.structure.attributes().contains(&name) {
            return Err(MetaError::InvalidOverride {
                type_name: self.name().to_string(),
                message: format!("attribute '{name}' is declared locally, not inherited"),
            });
        }
        if self.overrides.contains_key(name.as_str()) {
            return Err(MetaError::InvalidOverride {
                type_name: self.name().to_string(),
                message: format!("attribute '{name}' is already overridden"),
            });
        }
        self.overrides.insert(name.into(), Arc::new(attr));
        Ok(())
    }

    pub fn add_annotation<T: Any + Send + Sync>(&mut self, value: T) -> Result<()> {
        self.header().check_update()?;
        self.annotations.insert(any::TypeId::of::<T>(), Arc::new(value));
        Ok(())
    }

    pub fn annotation<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.annotations
            .get(&any::TypeId::of::<T>())
            .and_then(|v| v.as_ref().downcast_ref::<T>())
    }

    pub fn remove_annotation<T: Any + Send + Sync>(&mut self) -> Result<bool> {
        self.header().check_update()?;
        Ok(self.annotations.remove(&any::TypeId::of::<T>()).is_some())
    }

    // --- queries ---

    pub fn superclass_ref(&self) -> Option<&TypeRef> {
        self.superclass.as_ref()
    }

    /// The resolved superclass id, if any.
    pub fn superclass_id(&self) -> Option<TypeId> {
        match &self.superclass {
            Some(TypeRef::Id(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    pub fn is_association(&self) -> bool {
        self.association
    }

    pub fn declared_attributes(&self) -> &AttributeSeq {
        self.structure.attributes()
    }

    pub fn overridden(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.overrides.get(name)
    }

    pub(crate) fn frozen_ancestors(&self) -> Option<&FxHashSet<TypeId>> {
        self.frozen.as_ref().map(|f| &f.ancestors)
    }

    /// Whether this class has (a subclass of) the named class among its
    /// ancestors, by registered name.
    pub fn is_subtype_of_name(&self, ctx: &TypeContext, name: &str) -> bool {
        if self.name() == name {
            return true;
        }
        if let Some(frozen) = &self.frozen {
            return frozen
                .ancestors
                .iter()
                .any(|id| ctx.name_of(*id) == name);
        }
        let mut seen = FxHashSet::default();
        let mut next = self.superclass.as_ref().and_then(|r| r.peek(ctx));
        while let Some(id) = next {
            if !seen.insert(id) {
                return false;
            }
            let Some(class) = ctx.node(id).as_class() else {
                return false;
            };
            if class.name() == name {
                return true;
            }
            next = class.superclass.as_ref().and_then(|r| r.peek(ctx));
        }
        false
    }

    /// Look up an attribute visible on this class: declared, overridden
    /// or inherited.
    pub fn attribute(&self, ctx: &TypeContext, name: &str) -> Option<Arc<Attribute>> {
        if let Some(frozen) = &self.frozen {
            return frozen
                .by_name
                .get(name)
                .map(|&i| frozen.all_attributes[i].clone());
        }
        if let Some(local) = self.lookup_local(name) {
            return Some(local);
        }
        find_inherited(ctx, self.super_id(ctx), name)
    }

    pub fn has_attribute(&self, ctx: &TypeContext, name: &str) -> bool {
        self.attribute(ctx, name).is_some()
    }

    /// Whether the named attribute is inherited (possibly overridden)
    /// rather than declared locally.
    pub fn is_inherited(&self, ctx: &TypeContext, name: &str) -> bool {
        !self.structure.attributes().contains(name) && self.has_attribute(ctx, name)
    }

    /// Proper-ancestor test: whether `other` sits strictly above this
    /// class in the superclass chain.
    pub fn inherits_from(&self, ctx: &TypeContext, other: TypeId) -> bool {
        if ctx.type_id(self.name()) == Some(other) {
            return false;
        }
        if let Some(frozen) = &self.frozen {
            return frozen.ancestors.contains(&other);
        }
        let mut seen = FxHashSet::default();
        let mut next = self.super_id(ctx);
        while let Some(id) = next {
            if id == other {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            next = ctx.node(id).as_class().and_then(|c| c.super_id(ctx));
        }
        false
    }

    /// The full attribute list: inherited attributes in superclass
    /// order, each replaced in place by the closest override, followed by
    /// the locally declared ones.
    pub fn attributes(&self, ctx: &TypeContext) -> Result<Vec<Arc<Attribute>>> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.all_attributes.clone());
        }
        self.merged_attributes(ctx)
    }

    /// The merged index list: inherited indexes with same-name local
    /// replacements applied, plus the local ones.
    pub fn indexes(&self, ctx: &TypeContext) -> Result<Vec<Index>> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.all_indices.clone());
        }
        self.merged_indexes(ctx)
    }

    /// The primary key: local if declared, else the nearest inherited
    /// one.
    pub fn primary_key(&self, ctx: &TypeContext) -> Result<Option<Index>> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.primary_key.clone());
        }
        if let Some(handle) = self.structure.primary_key_handle() {
            return handle.resolved().map(|i| Some(i.clone()));
        }
        let (chain, seed) = self.super_chain(ctx)?;
        for class in &chain {
            if let Some(handle) = class.structure.primary_key_handle() {
                return handle.resolved().map(|i| Some(i.clone()));
            }
        }
        Ok(seed.and_then(|f| f.primary_key.clone()))
    }

    /// Total cache slots including inherited attributes.
    pub fn cache_size(&self, ctx: &TypeContext) -> Result<u32> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.cache_size);
        }
        let (chain, seed) = self.super_chain(ctx)?;
        let mut total = seed.map(|f| f.cache_size).unwrap_or(0);
        for class in &chain {
            total += class.structure.cache_size();
        }
        Ok(total + self.structure.cache_size())
    }

    pub fn db_column_count(&self, ctx: &TypeContext) -> Result<u32> {
        if let Some(frozen) = &self.frozen {
            return Ok(frozen.db_column_count);
        }
        let (chain, seed) = self.super_chain(ctx)?;
        let mut total = seed.map(|f| f.db_column_count).unwrap_or(0);
        for class in &chain {
            total += class.structure.db_column_count();
        }
        Ok(total + self.structure.db_column_count())
    }

    // --- internals ---

    fn lookup_local(&self, name: &str) -> Option<Arc<Attribute>> {
        if let Some(attr) = self.structure.attributes().get(name) {
            return Some(attr.clone());
        }
        self.overrides.get(name).cloned()
    }

    fn super_id(&self, ctx: &TypeContext) -> Option<TypeId> {
        self.superclass.as_ref().and_then(|r| r.peek(ctx))
    }

    /// The unfrozen superclasses, nearest first, plus the frozen-class
    /// cache the chain ends in (if any). Frozen classes never sit below
    /// unfrozen ones, so one seed covers the rest of the chain.
    fn super_chain<'a>(
        &self,
        ctx: &'a TypeContext,
    ) -> Result<(Vec<&'a ClassType>, Option<&'a FrozenClass>)> {
        let mut chain: Vec<&'a ClassType> = Vec::new();
        let mut seen = FxHashSet::default();
        let mut next = self.super_id(ctx);
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(MetaError::CyclicHierarchy {
                    type_name: self.name().to_string(),
                });
            }
            let Some(class) = ctx.node(id).as_class() else {
                break;
            };
            if let Some(frozen) = &class.frozen {
                return Ok((chain, Some(frozen)));
            }
            chain.push(class);
            next = class.super_id(ctx);
        }
        Ok((chain, None))
    }

    fn apply_overrides(&self, merged: &mut [Arc<Attribute>]) {
        for slot in merged.iter_mut() {
            if let Some(replacement) = self.overrides.get(slot.name()) {
                *slot = replacement.clone();
            }
        }
    }

    fn merged_attributes(&self, ctx: &TypeContext) -> Result<Vec<Arc<Attribute>>> {
        let (chain, seed) = self.super_chain(ctx)?;
        let mut merged = seed.map(|f| f.all_attributes.clone()).unwrap_or_default();
        for class in chain.iter().rev() {
            class.apply_overrides(&mut merged);
            for attr in class.structure.attributes().iter() {
                merged.push(attr.clone());
            }
        }
        self.apply_overrides(&mut merged);
        for attr in self.structure.attributes().iter() {
            merged.push(attr.clone());
        }
        Ok(merged)
    }

    fn merged_indexes(&self, ctx: &TypeContext) -> Result<Vec<Index>> {
        let (chain, seed) = self.super_chain(ctx)?;
        let mut merged = seed.map(|f| f.all_indices.clone()).unwrap_or_default();
        for class in chain.iter().rev() {
            for handle in class.structure.index_handles() {
                merge_index(&mut merged, handle.resolved()?.clone());
            }
        }
        for handle in self.structure.index_handles() {
            merge_index(&mut merged, handle.resolved()?.clone());
        }
        Ok(merged)
    }

    pub(crate) fn resolve(&mut self, ctx: &mut TypeContext, self_id: TypeId) -> Result<()> {
        if !self.structure.header_mut().begin_resolve() {
            return Ok(());
        }
        if let Some(super_ref) = &mut self.superclass {
            let super_id = super_ref.resolve(ctx)?;
            self.check_superclass(ctx, self_id, super_id)?;
        }
        for attr in self.structure.attributes().iter() {
            attr.resolve(ctx)?;
        }
        for attr in self.overrides.values() {
            attr.resolve(ctx)?;
        }
        self.check_overrides(ctx)?;
        self.resolve_indexes(ctx)
    }

    /// Superclass validity: must be a non-final class, must not close a
    /// cycle, and must not already provide an attribute this class
    /// declares (as opposed to overrides).
    fn check_superclass(
        &self,
        ctx: &TypeContext,
        self_id: TypeId,
        super_id: TypeId,
    ) -> Result<()> {
        let Some(super_class) = ctx.node(super_id).as_class() else {
            return Err(MetaError::unknown_type(ctx.name_of(super_id)));
        };
        if super_class.is_final() {
            return Err(MetaError::FinalSuperclass {
                super_name: super_class.name().to_string(),
                type_name: self.name().to_string(),
            });
        }
        let mut seen = FxHashSet::default();
        let mut next = Some(super_id);
        while let Some(id) = next {
            if id == self_id || !seen.insert(id) {
                return Err(MetaError::CyclicHierarchy {
                    type_name: self.name().to_string(),
                });
            }
            next = ctx.node(id).as_class().and_then(|c| c.super_id(ctx));
        }
        for attr in self.structure.attributes().iter() {
            if find_inherited(ctx, Some(super_id), attr.name()).is_some() {
                return Err(MetaError::DuplicateAttribute {
                    type_name: self.name().to_string(),
                    attribute: attr.name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_overrides(&self, ctx: &TypeContext) -> Result<()> {
        if self.overrides.is_empty() {
            return Ok(());
        }
        let super_id = match self.super_id(ctx) {
            Some(id) if ctx.node(id).as_class().is_some() => id,
            _ => {
                return Err(self.override_error(
                    "attribute overrides require a superclass".to_string(),
                ))
            }
        };
        // Super's merged list in layout order, for the trailing-run
        // exemption below.
        let super_merged = match ctx.node(super_id).as_class() {
            Some(c) => c.attributes(ctx)?,
            None => Vec::new(),
        };
        for (name, replacement) in &self.overrides {
            let Some(original) = find_inherited(ctx, Some(super_id), name) else {
                return Err(self.override_error(format!(
                    "attribute '{name}' does not exist in any superclass"
                )));
            };
            self.check_override_pair(name, replacement, &original, &super_merged)?;
        }
        Ok(())
    }

    fn check_override_pair(
        &self,
        name: &str,
        replacement: &Attribute,
        original: &Attribute,
        super_merged: &[Arc<Attribute>],
    ) -> Result<()> {
        // Storage shape must match, because inherited layout positions
        // are kept. The exemption: if every attribute from the original's
        // position to the end of the inherited list is overridden here,
        // the tail is re-laid-out anyway and the sizes may differ.
        let same_shape = replacement.cache_size() == original.cache_size()
            && replacement.columns().len() == original.columns().len();
        if !same_shape && !self.overrides_trailing_run(name, super_merged) {
            return Err(self.override_error(format!(
                "attribute '{name}' changes the storage shape of the inherited attribute"
            )));
        }
        if original.is_mandatory() && !replacement.is_mandatory() {
            return Err(self.override_error(format!(
                "attribute '{name}' drops the mandatory constraint"
            )));
        }
        if original.is_initial() && !replacement.is_initial() {
            return Err(self.override_error(format!(
                "attribute '{name}' drops the initial constraint"
            )));
        }
        match (original.reference(), replacement.reference()) {
            (None, None) => {}
            (None, Some(_)) => {
                return Err(self.override_error(format!(
                    "attribute '{name}' overrides a plain attribute with a reference"
                )))
            }
            (Some(_), None) => {
                return Err(self.override_error(format!(
                    "attribute '{name}' overrides a reference with a plain attribute"
                )))
            }
            (Some(orig), Some(repl)) => {
                if orig.is_monomorphic() && !repl.is_monomorphic() {
                    return Err(self.override_error(format!(
                        "reference '{name}' widens a monomorphic reference"
                    )));
                }
                if orig.is_monomorphic()
                    && repl.is_monomorphic()
                    && orig.target_name() != repl.target_name()
                {
                    return Err(self.override_error(format!(
                        "monomorphic reference '{name}' changes its target type"
                    )));
                }
                if !orig.is_branch_global() && repl.is_branch_global() {
                    return Err(self.override_error(format!(
                        "reference '{name}' widens a branch-local reference to branch-global"
                    )));
                }
                match orig.history_type() {
                    HistoryType::Current if repl.history_type() != HistoryType::Current => {
                        return Err(self.override_error(format!(
                            "reference '{name}' changes the history type of a current reference"
                        )))
                    }
                    HistoryType::Historic if repl.history_type() != HistoryType::Historic => {
                        return Err(self.override_error(format!(
                            "reference '{name}' changes the history type of a historic reference"
                        )))
                    }
                    _ => {}
                }
                if orig.uses_default_index() && !repl.uses_default_index() {
                    return Err(self.override_error(format!(
                        "reference '{name}' drops the default index; declare an index \
                         with the same name instead"
                    )));
                }
            }
        }
        Ok(())
    }

    /// True if every inherited attribute from `name`'s position to the
    /// end of the inherited list is overridden by this class.
    fn overrides_trailing_run(&self, name: &str, super_merged: &[Arc<Attribute>]) -> bool {
        let Some(pos) = super_merged.iter().position(|a| a.name() == name) else {
            return false;
        };
        super_merged[pos..]
            .iter()
            .all(|a| self.overrides.contains_key(a.name()))
    }

    fn resolve_indexes(&mut self, ctx: &mut TypeContext) -> Result<()> {
        let overrides = &self.overrides;
        let superclass = self.superclass.clone();
        let (declared, indexes, primary_key) = self.structure.index_state();
        let ctx = &*ctx;
        // Index parts may name inherited attributes; the scope is the
        // whole visible attribute set.
        let find = |name: &str| -> Result<Option<Arc<Attribute>>> {
            if let Some(attr) = declared.get(name) {
                return Ok(Some(attr.clone()));
            }
            if let Some(attr) = overrides.get(name) {
                return Ok(Some(attr.clone()));
            }
            let start = superclass.as_ref().and_then(|r| r.peek(ctx));
            Ok(find_inherited(ctx, start, name))
        };
        resolve_index_list(declared, indexes, primary_key, &find)
    }

    /// Freeze the superclass first, then snapshot every derived cache:
    /// ancestors, merged attributes with the layout attached, merged
    /// indexes, primary key and totals.
    pub(crate) fn freeze_hook(&mut self, ctx: &mut TypeContext, self_id: TypeId) -> Result<()> {
        if let Some(super_id) = self.superclass_id() {
            ctx.freeze_type(super_id)?;
        }

        let mut ancestors = FxHashSet::default();
        ancestors.insert(self_id);
        let mut next = self.super_id(ctx);
        while let Some(id) = next {
            if !ancestors.insert(id) {
                return Err(MetaError::CyclicHierarchy {
                    type_name: self.name().to_string(),
                });
            }
            next = ctx.node(id).as_class().and_then(|c| c.super_id(ctx));
        }

        let (super_cache, super_columns) = match self.super_id(ctx) {
            Some(id) => match ctx.node(id).as_class().and_then(|c| c.frozen.as_ref()) {
                Some(frozen) => (frozen.cache_size, frozen.db_column_count),
                None => (0, 0),
            },
            None => (0, 0),
        };

        let all_attributes = self.merged_attributes(ctx)?;

        // Locally declared attributes extend the superclass layout.
        let (cache_size, db_column_count) = attach_layout(
            self.structure.attributes().as_slice(),
            self_id,
            super_cache,
            super_columns,
        )?;

        // Overrides take the position of the attribute they replace,
        // recomputed by walking the merged list.
        let mut cache = 0u32;
        let mut column = 0u32;
        for attr in &all_attributes {
            if attr.owner().is_none() {
                attr.attach(self_id, cache)?;
                let mut col = column;
                for db_column in attr.columns() {
                    db_column.init_index(col)?;
                    col += 1;
                }
            }
            cache += attr.cache_size();
            column += attr.columns().len() as u32;
        }

        let mut by_name = FxHashMap::default();
        for (i, attr) in all_attributes.iter().enumerate() {
            by_name.insert(Box::from(attr.name()), i);
        }

        let all_indices = self.merged_indexes(ctx)?;
        let primary_key = self.primary_key(ctx)?;

        self.frozen = Some(FrozenClass {
            ancestors,
            all_attributes,
            by_name,
            all_indices,
            primary_key,
            cache_size,
            db_column_count,
        });
        Ok(())
    }

    /// Structural clone: copied structure, symbolic superclass, copied
    /// overrides, shared annotation values, fresh lifecycle state.
    pub fn copy(&self, ctx: &TypeContext) -> ClassType {
        ClassType {
            structure: self.structure.copy(),
            superclass: self.superclass.as_ref().map(|r| r.symbolic(ctx)),
            is_abstract: self.is_abstract,
            is_final: self.is_final,
            versioned: self.versioned,
            association: self.association,
            annotations: self.annotations.clone(),
            overrides: self
                .overrides
                .iter()
                .map(|(name, attr)| (name.clone(), Arc::new(attr.copy())))
                .collect(),
            frozen: None,
        }
    }

    fn override_error(&self, message: String) -> MetaError {
        MetaError::InvalidOverride {
            type_name: self.name().to_string(),
            message,
        }
    }
}

// Annotation values are type-erased and not Debug; print their count.
impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassType")
            .field("structure", &self.structure)
            .field("superclass", &self.superclass)
            .field("is_abstract", &self.is_abstract)
            .field("is_final", &self.is_final)
            .field("versioned", &self.versioned)
            .field("association", &self.association)
            .field("annotations", &self.annotations.len())
            .field("overrides", &self.overrides)
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// Walk the class chain starting at `start` and return the first visible
/// attribute of the given name.
fn find_inherited(
    ctx: &TypeContext,
    start: Option<TypeId>,
    name: &str,
) -> Option<Arc<Attribute>> {
    let mut seen = FxHashSet::default();
    let mut next = start;
    while let Some(id) = next {
        if !seen.insert(id) {
            return None;
        }
        let class = ctx.node(id).as_class()?;
        if let Some(frozen) = &class.frozen {
            return frozen
                .by_name
                .get(name)
                .map(|&i| frozen.all_attributes[i].clone());
        }
        if let Some(attr) = class.lookup_local(name) {
            return Some(attr);
        }
        next = class.super_id(ctx);
    }
    None
}

/// Merge one index into an inherited list. A same-name index replaces
/// the inherited one in place. A differently-named index over an
/// identical ordered column set also replaces the earlier one in place
/// (logged, not an error) - legacy compatibility for re-declared schema
/// indexes.
fn merge_index(merged: &mut Vec<Index>, index: Index) {
    if let Some(pos) = merged.iter().position(|i| i.name() == index.name()) {
        merged[pos] = index;
        return;
    }
    if let Some(pos) = merged.iter().position(|i| i.columns() == index.columns()) {
        warn!(
            replaced = merged[pos].name(),
            index = index.name(),
            "replacing index with identical column set"
        );
        merged[pos] = index;
        return;
    }
    merged.push(index);
}
