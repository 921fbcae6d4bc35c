// src/context.rs
//
// The type context: an arena of MetaObject nodes addressed by TypeId,
// with a name registry on top. Nodes under resolution or freeze are
// checked out of the arena (an Invalid placeholder takes their slot) so
// they can mutate while walking the rest of the graph; the in_progress
// set stops re-entry on cyclic graphs.

use hashbrown::HashMap;
use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::errors::{MetaError, Result};
use crate::ident::TypeId;
use crate::object::{
    collection_name, parse_collection_name, CollectionKind, CollectionType, MetaObject,
    PrimitiveType,
};

/// Registry and arena for one closed set of type definitions.
#[derive(Debug)]
pub struct TypeContext {
    types: Vec<MetaObject>,
    by_name: HashMap<Box<str>, TypeId>,
    in_progress: FxHashSet<TypeId>,
    completed: bool,
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeContext {
    /// A fresh context holding only the three sentinel types.
    pub fn new() -> Self {
        let mut ctx = TypeContext {
            types: Vec::new(),
            by_name: HashMap::new(),
            in_progress: FxHashSet::default(),
            completed: false,
        };
        for node in [MetaObject::Any, MetaObject::Null, MetaObject::Invalid] {
            let id = TypeId::new(ctx.types.len() as u32);
            ctx.by_name.insert(node.name().into(), id);
            ctx.types.push(node);
        }
        debug_assert_eq!(ctx.by_name["ANY"], TypeId::ANY);
        debug_assert_eq!(ctx.by_name["NULL"], TypeId::NULL);
        debug_assert_eq!(ctx.by_name["INVALID"], TypeId::INVALID);
        ctx
    }

    /// Register a type node. Names are unique per context.
    pub fn add(&mut self, node: MetaObject) -> Result<TypeId> {
        let name: Box<str> = node.name().into();
        if self.by_name.contains_key(&name) {
            return Err(MetaError::DuplicateType {
                name: name.to_string(),
            });
        }
        let id = TypeId::new(self.types.len() as u32);
        trace!(name = &*name, id = id.index(), "register type");
        self.by_name.insert(name, id);
        self.types.push(node);
        Ok(id)
    }

    pub fn register_primitive(&mut self, name: impl Into<Box<str>>) -> Result<TypeId> {
        self.add(MetaObject::Primitive(PrimitiveType::new(name)))
    }

    /// The id registered under a name, if any.
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// The id registered under a name; unknown names are an error.
    pub fn get_type(&self, name: &str) -> Result<TypeId> {
        self.type_id(name)
            .ok_or_else(|| MetaError::unknown_type(name))
    }

    pub fn node(&self, id: TypeId) -> &MetaObject {
        &self.types[id.index() as usize]
    }

    pub fn node_named(&self, name: &str) -> Result<&MetaObject> {
        self.get_type(name).map(|id| self.node(id))
    }

    pub fn name_of(&self, id: TypeId) -> &str {
        self.node(id).name()
    }

    /// Number of registered types, sentinels included.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        (0..self.types.len() as u32).map(TypeId::new)
    }

    /// Whether resolve_references() ran successfully.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Resolve a name, synthesizing collection types on demand from the
    /// canonical `RAWKIND<Element>` grammar.
    pub(crate) fn lookup_or_synthesize(&mut self, name: &str) -> Result<TypeId> {
        if let Some(id) = self.type_id(name) {
            return Ok(id);
        }
        match parse_collection_name(name) {
            Some((raw, element)) => self.get_collection(raw, element),
            None => Err(MetaError::unknown_type(name)),
        }
    }

    /// The collection type over an element, creating it if the context
    /// has none yet. In a completed context the new node is resolved and
    /// frozen immediately.
    pub fn get_collection(&mut self, raw: CollectionKind, element_name: &str) -> Result<TypeId> {
        let name = collection_name(raw, element_name);
        if let Some(id) = self.type_id(&name) {
            return Ok(id);
        }
        // The element must exist (or be synthesizable) first.
        self.lookup_or_synthesize(element_name)?;
        trace!(name = &*name, "synthesize collection type");
        let id = self.add(MetaObject::Collection(CollectionType::new(
            raw,
            element_name,
        )))?;
        if self.completed {
            self.resolve_type(id)?;
            self.freeze_type(id)?;
        }
        Ok(id)
    }

    /// Resolve every registered type, then freeze every registered type,
    /// and mark the context completed. Resolution may synthesize
    /// collection types; they join the pass.
    pub fn resolve_references(&mut self) -> Result<()> {
        debug!(types = self.types.len(), "resolving type context");
        let mut i = 0;
        while i < self.types.len() {
            self.resolve_type(TypeId::new(i as u32))?;
            i += 1;
        }
        for i in 0..self.types.len() {
            self.freeze_type(TypeId::new(i as u32))?;
        }
        self.completed = true;
        debug!(types = self.types.len(), "type context completed");
        Ok(())
    }

    /// Resolve one node, checking it out of the arena for the duration.
    pub(crate) fn resolve_type(&mut self, id: TypeId) -> Result<()> {
        if id.is_sentinel() || !self.in_progress.insert(id) {
            return Ok(());
        }
        let slot = id.index() as usize;
        let mut node = std::mem::replace(&mut self.types[slot], MetaObject::Invalid);
        let result = node.resolve(self, id);
        self.types[slot] = node;
        self.in_progress.remove(&id);
        result
    }

    /// Freeze one node (and, through its hook, everything it depends
    /// on). Nodes already frozen are left alone.
    pub fn freeze_type(&mut self, id: TypeId) -> Result<()> {
        if id.is_sentinel() || !self.in_progress.insert(id) {
            return Ok(());
        }
        let slot = id.index() as usize;
        let mut node = std::mem::replace(&mut self.types[slot], MetaObject::Invalid);
        let result = node.freeze(self, id);
        self.types[slot] = node;
        self.in_progress.remove(&id);
        result
    }

    /// Kind-dispatched subtype test.
    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        crate::object::subtype_check(self, a, b)
    }
}
