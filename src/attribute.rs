// src/attribute.rs
//
// Attributes and their physical storage descriptors. An attribute owns
// zero or more DB columns and a cache-slot count; the owning type assigns
// cache-slot and column indexes when it freezes. Frozen attributes are
// shared across merged attribute lists as Arc<Attribute>, so all
// freeze-assigned state lives in OnceLock cells.

use std::sync::{Arc, OnceLock};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::context::TypeContext;
use crate::errors::{MetaError, Result};
use crate::ident::TypeId;

/// Cache-slot descriptor supplied by the persistence layer. The value
/// load/store routines themselves are out of scope here; the merge engine
/// only needs the slot count for layout computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSpec {
    cache_size: u32,
}

impl StorageSpec {
    pub fn new(cache_size: u32) -> Self {
        StorageSpec { cache_size }
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }
}

/// Which persisted column of a reference attribute an index part selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceAspect {
    /// Identifier of the referenced object.
    TargetId,
    /// Concrete type of the referenced object.
    TargetType,
    /// Branch the referenced object lives in.
    Branch,
    /// Revision of the referenced object.
    Revision,
}

impl ReferenceAspect {
    /// Branch and revision columns exist only under certain system
    /// configurations (multi-branch, versioned). An index part selecting
    /// a missing configurable column is dropped instead of failing.
    pub fn is_configurable(self) -> bool {
        matches!(self, ReferenceAspect::Branch | ReferenceAspect::Revision)
    }
}

/// Versioning dimension of a reference: does it point into the current
/// revision, a fixed historic one, or either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryType {
    Current,
    Historic,
    Mixed,
}

/// A physical storage column backing part or all of an attribute's value.
#[derive(Debug)]
pub struct DbColumn {
    name: Box<str>,
    not_null: bool,
    aspect: Option<ReferenceAspect>,
    index: OnceLock<u32>,
}

impl DbColumn {
    pub fn new(name: impl Into<Box<str>>, not_null: bool) -> Self {
        DbColumn {
            name: name.into(),
            not_null,
            aspect: None,
            index: OnceLock::new(),
        }
    }

    pub fn with_aspect(
        name: impl Into<Box<str>>,
        not_null: bool,
        aspect: ReferenceAspect,
    ) -> Self {
        DbColumn {
            name: name.into(),
            not_null,
            aspect: Some(aspect),
            index: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn not_null(&self) -> bool {
        self.not_null
    }

    pub fn aspect(&self) -> Option<ReferenceAspect> {
        self.aspect
    }

    /// Position of this column in the owning table, assigned on freeze.
    pub fn index(&self) -> Option<u32> {
        self.index.get().copied()
    }

    pub(crate) fn init_index(&self, index: u32) -> Result<()> {
        if self.index.set(index).is_err() {
            // Re-freeze after a diagnosed failure re-assigns the same
            // position; only a conflicting assignment is an error.
            if self.index.get() != Some(&index) {
                return Err(MetaError::AttributeAlreadyAttached {
                    attribute: self.name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn copy(&self) -> DbColumn {
        DbColumn {
            name: self.name.clone(),
            not_null: self.not_null,
            aspect: self.aspect,
            index: OnceLock::new(),
        }
    }
}

/// Reference payload of an attribute pointing at another item type. The
/// target is symbolic (name-only) until resolved against a context.
#[derive(Debug)]
pub struct Reference {
    target_name: Box<str>,
    target: OnceLock<TypeId>,
    monomorphic: bool,
    branch_global: bool,
    history: HistoryType,
    use_default_index: bool,
}

impl Reference {
    pub fn new(target_name: impl Into<Box<str>>) -> Self {
        Reference {
            target_name: target_name.into(),
            target: OnceLock::new(),
            monomorphic: false,
            branch_global: false,
            history: HistoryType::Current,
            use_default_index: false,
        }
    }

    pub fn monomorphic(mut self, monomorphic: bool) -> Self {
        self.monomorphic = monomorphic;
        self
    }

    pub fn branch_global(mut self, branch_global: bool) -> Self {
        self.branch_global = branch_global;
        self
    }

    pub fn history(mut self, history: HistoryType) -> Self {
        self.history = history;
        self
    }

    pub fn use_default_index(mut self, use_default_index: bool) -> Self {
        self.use_default_index = use_default_index;
        self
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// The resolved target type.
    pub fn target(&self) -> Result<TypeId> {
        self.target.get().copied().ok_or_else(|| {
            MetaError::unresolved(format!("reference target '{}'", self.target_name))
        })
    }

    pub fn is_monomorphic(&self) -> bool {
        self.monomorphic
    }

    pub fn is_branch_global(&self) -> bool {
        self.branch_global
    }

    pub fn history_type(&self) -> HistoryType {
        self.history
    }

    pub fn uses_default_index(&self) -> bool {
        self.use_default_index
    }

    pub(crate) fn resolve(&self, ctx: &mut TypeContext) -> Result<TypeId> {
        if let Some(id) = self.target.get() {
            return Ok(*id);
        }
        let id = ctx.lookup_or_synthesize(&self.target_name)?;
        let _ = self.target.set(id);
        Ok(id)
    }

    fn copy(&self) -> Reference {
        Reference {
            target_name: self.target_name.clone(),
            target: OnceLock::new(),
            monomorphic: self.monomorphic,
            branch_global: self.branch_global,
            history: self.history,
            use_default_index: self.use_default_index,
        }
    }
}

/// Layout data assigned when the owning type freezes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrLayout {
    pub owner: TypeId,
    pub cache_index: u32,
}

/// A named attribute of a structure or class.
#[derive(Debug)]
pub struct Attribute {
    name: Box<str>,
    mandatory: bool,
    initial: bool,
    immutable: bool,
    storage: StorageSpec,
    columns: SmallVec<[DbColumn; 2]>,
    reference: Option<Reference>,
    layout: OnceLock<AttrLayout>,
}

impl Attribute {
    pub fn new(name: impl Into<Box<str>>, storage: StorageSpec) -> Self {
        Attribute {
            name: name.into(),
            mandatory: false,
            initial: false,
            immutable: false,
            storage,
            columns: SmallVec::new(),
            reference: None,
            layout: OnceLock::new(),
        }
    }

    pub fn with_column(mut self, column: DbColumn) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    pub fn initial(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }

    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn storage(&self) -> StorageSpec {
        self.storage
    }

    pub fn cache_size(&self) -> u32 {
        self.storage.cache_size()
    }

    pub fn columns(&self) -> &[DbColumn] {
        &self.columns
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn reference(&self) -> Option<&Reference> {
        self.reference.as_ref()
    }

    pub fn column_for_aspect(&self, aspect: ReferenceAspect) -> Option<&DbColumn> {
        self.columns.iter().find(|c| c.aspect() == Some(aspect))
    }

    /// Owner type, known once the owning type froze.
    pub fn owner(&self) -> Option<TypeId> {
        self.layout.get().map(|l| l.owner)
    }

    /// First cache slot of this attribute, assigned on freeze.
    pub fn cache_index(&self) -> Option<u32> {
        self.layout.get().map(|l| l.cache_index)
    }

    pub(crate) fn attach(&self, owner: TypeId, cache_index: u32) -> Result<()> {
        let layout = AttrLayout { owner, cache_index };
        if self.layout.set(layout).is_err() {
            if self.layout.get() != Some(&layout) {
                return Err(MetaError::AttributeAlreadyAttached {
                    attribute: self.name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, ctx: &mut TypeContext) -> Result<()> {
        if let Some(reference) = &self.reference {
            reference.resolve(ctx)?;
        }
        Ok(())
    }

    /// Structural clone with a detached layout and an unresolved
    /// reference target, usable under a different owner or context.
    pub fn copy(&self) -> Attribute {
        Attribute {
            name: self.name.clone(),
            mandatory: self.mandatory,
            initial: self.initial,
            immutable: self.immutable,
            storage: self.storage,
            columns: self.columns.iter().map(DbColumn::copy).collect(),
            reference: self.reference.as_ref().map(Reference::copy),
            layout: OnceLock::new(),
        }
    }
}

/// Name-keyed, insertion-ordered attribute collection. Insertion order is
/// significant - it drives the column layout.
#[derive(Debug, Default, Clone)]
pub struct AttributeSeq {
    attrs: Vec<Arc<Attribute>>,
    by_name: FxHashMap<Box<str>, usize>,
}

impl AttributeSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attribute; fails by handing the attribute back if the
    /// name is already taken.
    pub fn push(&mut self, attr: Arc<Attribute>) -> std::result::Result<(), Arc<Attribute>> {
        if self.by_name.contains_key(attr.name()) {
            return Err(attr);
        }
        self.by_name
            .insert(attr.name().into(), self.attrs.len());
        self.attrs.push(attr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.by_name.get(name).map(|&i| &self.attrs[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Attribute>> {
        self.attrs.iter()
    }

    pub fn as_slice(&self) -> &[Arc<Attribute>] {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}
