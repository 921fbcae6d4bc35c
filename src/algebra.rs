// src/algebra.rs
//
// The type algebra over a completed context: union, intersection and the
// compatibility queries the expression layer asks. All operations are
// pure lookups; the heavy lifting happened at freeze time.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::context::TypeContext;
use crate::errors::{MetaError, Result};
use crate::ident::TypeId;
use crate::kind::Kind;
use crate::object::MetaObject;

/// Algebra facade over a completed, shareable context, anchored at one
/// root item type.
#[derive(Debug, Clone)]
pub struct TypeSystem {
    context: Arc<TypeContext>,
    root: TypeId,
    concrete: Vec<TypeId>,
    /// Per-ancestor concrete subtype lists, precomputed at construction.
    subtypes: FxHashMap<TypeId, Vec<TypeId>>,
}

impl TypeSystem {
    /// Validate and wrap a completed context.
    ///
    /// The context must have run resolve_references(), the root must be
    /// an item type, every ancestor of every class must be registered
    /// under its own name, and every concrete class must descend from
    /// the root.
    pub fn new(context: Arc<TypeContext>, root_name: &str) -> Result<TypeSystem> {
        if !context.is_completed() {
            return Err(MetaError::ContextNotCompleted);
        }
        let root = context.get_type(root_name)?;
        if !context.node(root).kind().is_item() {
            return Err(MetaError::unknown_type(root_name));
        }

        let mut concrete = Vec::new();
        let mut subtypes: FxHashMap<TypeId, Vec<TypeId>> = FxHashMap::default();
        for id in context.ids() {
            let Some(class) = context.node(id).as_class() else {
                continue;
            };
            if let Some(ancestors) = class.frozen_ancestors() {
                for &ancestor in ancestors {
                    let name = context.name_of(ancestor);
                    if context.type_id(name) != Some(ancestor) {
                        return Err(MetaError::UndeclaredAncestor {
                            type_name: class.name().to_string(),
                            ancestor: name.to_string(),
                        });
                    }
                }
            }
            if !class.is_abstract() {
                if !context.is_subtype(id, root) {
                    return Err(MetaError::NoCommonRoot {
                        first: root_name.to_string(),
                        second: class.name().to_string(),
                    });
                }
                concrete.push(id);
                if let Some(ancestors) = class.frozen_ancestors() {
                    for &ancestor in ancestors {
                        subtypes.entry(ancestor).or_default().push(id);
                    }
                }
            }
        }
        debug!(
            root = root_name,
            concrete = concrete.len(),
            "type system validated"
        );
        Ok(TypeSystem {
            context,
            root,
            concrete,
            subtypes,
        })
    }

    pub fn context(&self) -> &Arc<TypeContext> {
        &self.context
    }

    /// The root item type all concrete classes descend from.
    pub fn root_item(&self) -> TypeId {
        self.root
    }

    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        self.context.is_subtype(a, b)
    }

    /// All concrete (non-abstract) classes that are subtypes of the
    /// given type. Class targets hit the precomputed per-ancestor index;
    /// ANY, alternatives and other non-class targets fall back to a scan.
    pub fn concrete_subtypes(&self, of: TypeId) -> Vec<TypeId> {
        if let Some(subs) = self.subtypes.get(&of) {
            return subs.clone();
        }
        self.concrete
            .iter()
            .copied()
            .filter(|&c| self.context.is_subtype(c, of))
            .collect()
    }

    /// Least common supertype. INVALID absorbs, NULL is neutral, item
    /// types meet at their nearest common ancestor, unrelated kinds fall
    /// back to ANY.
    pub fn union(&self, a: TypeId, b: TypeId) -> TypeId {
        if a == b {
            return a;
        }
        if a.is_invalid() || b.is_invalid() {
            return TypeId::INVALID;
        }
        if a.is_any() || b.is_any() {
            return TypeId::ANY;
        }
        if a.is_null() {
            return b;
        }
        if b.is_null() {
            return a;
        }
        if self.is_subtype(a, b) {
            return b;
        }
        if self.is_subtype(b, a) {
            return a;
        }
        let (ka, kb) = (self.context.node(a).kind(), self.context.node(b).kind());
        if ka == Kind::Item && kb == Kind::Item {
            return self.common_ancestor(a, b);
        }
        TypeId::ANY
    }

    /// Greatest common subtype. The dual of union: ANY is neutral, NULL
    /// against anything else is empty, unrelated types have no common
    /// instances and meet at INVALID.
    pub fn intersection(&self, a: TypeId, b: TypeId) -> TypeId {
        if a == b {
            return a;
        }
        if a.is_invalid() || b.is_invalid() {
            return TypeId::INVALID;
        }
        if a.is_any() {
            return b;
        }
        if b.is_any() {
            return a;
        }
        if a.is_null() || b.is_null() {
            return TypeId::INVALID;
        }
        if self.is_subtype(a, b) {
            return a;
        }
        if self.is_subtype(b, a) {
            return b;
        }
        TypeId::INVALID
    }

    /// Whether any value can inhabit both types. Alternatives are taken
    /// apart into their members, collections meet through their element
    /// types, and item types consult the concrete class list, which
    /// catches classes that only meet below an abstract common ancestor.
    pub fn has_common_instances(&self, a: TypeId, b: TypeId) -> bool {
        if !self.intersection(a, b).is_invalid() {
            return true;
        }
        match (self.context.node(a), self.context.node(b)) {
            (MetaObject::Alternative(alt), _) => alt
                .flattened()
                .is_some_and(|members| members.iter().any(|&m| self.has_common_instances(m, b))),
            (_, MetaObject::Alternative(alt)) => alt
                .flattened()
                .is_some_and(|members| members.iter().any(|&m| self.has_common_instances(a, m))),
            (MetaObject::Collection(ca), MetaObject::Collection(cb)) => {
                ca.raw_kind().compatible(cb.raw_kind())
                    && match (ca.element().id(), cb.element().id()) {
                        (Ok(ea), Ok(eb)) => self.has_common_instances(ea, eb),
                        _ => false,
                    }
            }
            (na, nb) if na.kind() == Kind::Item && nb.kind() == Kind::Item => self
                .concrete
                .iter()
                .any(|&c| self.is_subtype(c, a) && self.is_subtype(c, b)),
            _ => false,
        }
    }

    /// Whether values of the two types admit ordering comparison: the
    /// identical type, of a comparable kind.
    pub fn is_comparable_to(&self, a: TypeId, b: TypeId) -> bool {
        a == b && self.context.node(a).kind().is_comparable()
    }

    /// Whether a value of `source` may be stored where `target` is
    /// expected. NULL stores anywhere; INVALID on either side is
    /// permissive so one failed type computation does not cascade.
    pub fn is_assignment_compatible(&self, target: TypeId, source: TypeId) -> bool {
        if target.is_invalid() || source.is_invalid() {
            return true;
        }
        if source.is_null() {
            return true;
        }
        self.is_subtype(source, target)
    }

    fn common_ancestor(&self, a: TypeId, b: TypeId) -> TypeId {
        let a_chain: FxHashSet<TypeId> = self.ancestor_chain(a).into_iter().collect();
        for id in self.ancestor_chain(b) {
            if a_chain.contains(&id) {
                return id;
            }
        }
        TypeId::ANY
    }

    fn ancestor_chain(&self, start: TypeId) -> Vec<TypeId> {
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = self
            .context
            .node(current)
            .as_class()
            .and_then(|c| c.superclass_id())
        {
            chain.push(next);
            current = next;
        }
        chain
    }
}
