// src/object.rs
//
// The MetaObject variant hierarchy and the symbolic/concrete type
// reference. Per-kind behavior lives here: copy (structural clone with
// name-only placeholders), resolve (placeholder -> TypeId lookup) and the
// kind-dispatched subtype test.

use std::fmt;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::class::ClassType;
use crate::context::TypeContext;
use crate::errors::{MetaError, Result};
use crate::freeze::{FreezeState, TypeHeader};
use crate::ident::TypeId;
use crate::kind::Kind;
use crate::structure::StructType;

/// A type reference: symbolic (name-only) until resolved against a
/// context, never implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(Box<str>),
    Id(TypeId),
}

impl TypeRef {
    pub fn named(name: impl Into<Box<str>>) -> Self {
        TypeRef::Named(name.into())
    }

    /// The resolved id; querying a symbolic reference is a usage error.
    pub fn id(&self) -> Result<TypeId> {
        match self {
            TypeRef::Id(id) => Ok(*id),
            TypeRef::Named(name) => Err(MetaError::unresolved(format!("type '{name}'"))),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, TypeRef::Id(_))
    }

    /// Non-mutating lookup: the id if resolved or registered under the
    /// symbolic name.
    pub(crate) fn peek(&self, ctx: &TypeContext) -> Option<TypeId> {
        match self {
            TypeRef::Id(id) => Some(*id),
            TypeRef::Named(name) => ctx.type_id(name),
        }
    }

    pub(crate) fn resolve(&mut self, ctx: &mut TypeContext) -> Result<TypeId> {
        match self {
            TypeRef::Id(id) => Ok(*id),
            TypeRef::Named(name) => {
                let id = ctx.lookup_or_synthesize(name)?;
                *self = TypeRef::Id(id);
                Ok(id)
            }
        }
    }

    /// The symbolic form of this reference, for structure clones.
    pub(crate) fn symbolic(&self, ctx: &TypeContext) -> TypeRef {
        match self {
            TypeRef::Named(name) => TypeRef::Named(name.clone()),
            TypeRef::Id(id) => TypeRef::Named(ctx.name_of(*id).into()),
        }
    }
}

/// Raw kind of a collection type. COLLECTION is the generic kind that
/// matches any raw kind in the subtype test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Collection,
    List,
    Set,
}

impl CollectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::Collection => "COLLECTION",
            CollectionKind::List => "LIST",
            CollectionKind::Set => "SET",
        }
    }

    /// Whether an element of raw kind `self` may stand where `other` is
    /// expected: exact match, or either side is the generic kind.
    pub fn compatible(self, other: CollectionKind) -> bool {
        self == other || self == CollectionKind::Collection || other == CollectionKind::Collection
    }
}

/// Canonical collection type name: `RAWKIND<ElementTypeName>`.
pub fn collection_name(raw: CollectionKind, element: &str) -> String {
    format!("{}<{}>", raw.as_str(), element)
}

/// Parse a canonical collection name via the fixed grammar
/// `(COLLECTION|LIST|SET)<...>`.
pub fn parse_collection_name(name: &str) -> Option<(CollectionKind, &str)> {
    let rest = name.strip_suffix('>')?;
    for raw in [
        CollectionKind::Collection,
        CollectionKind::List,
        CollectionKind::Set,
    ] {
        if let Some(element) = rest
            .strip_prefix(raw.as_str())
            .and_then(|r| r.strip_prefix('<'))
        {
            if element.is_empty() {
                return None;
            }
            return Some((raw, element));
        }
    }
    None
}

/// Atomic value type. Primitives are registered once per context and
/// copied by identity (an equal-by-name clone in the arena model).
#[derive(Debug, Clone)]
pub struct PrimitiveType {
    header: TypeHeader,
}

impl PrimitiveType {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        PrimitiveType {
            header: TypeHeader::new(name),
        }
    }

    pub fn name(&self) -> &str {
        self.header.name()
    }
}

/// Homogeneous collection of one element type.
#[derive(Debug)]
pub struct CollectionType {
    header: TypeHeader,
    raw: CollectionKind,
    element: TypeRef,
}

impl CollectionType {
    pub fn new(raw: CollectionKind, element_name: &str) -> Self {
        CollectionType {
            header: TypeHeader::new(collection_name(raw, element_name)),
            raw,
            element: TypeRef::named(element_name),
        }
    }

    pub fn raw_kind(&self) -> CollectionKind {
        self.raw
    }

    pub fn element(&self) -> &TypeRef {
        &self.element
    }
}

/// Fixed-arity heterogeneous product.
#[derive(Debug)]
pub struct TupleType {
    header: TypeHeader,
    entries: SmallVec<[TypeRef; 4]>,
}

impl TupleType {
    pub fn new(name: impl Into<Box<str>>, entries: Vec<TypeRef>) -> Self {
        TupleType {
            header: TypeHeader::new(name),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn entries(&self) -> &[TypeRef] {
        &self.entries
    }
}

/// Function signature type.
#[derive(Debug)]
pub struct FunctionType {
    header: TypeHeader,
    ret: TypeRef,
    args: SmallVec<[TypeRef; 4]>,
    varargs: bool,
}

impl FunctionType {
    pub fn new(
        name: impl Into<Box<str>>,
        ret: TypeRef,
        args: Vec<TypeRef>,
        varargs: bool,
    ) -> Self {
        FunctionType {
            header: TypeHeader::new(name),
            ret,
            args: args.into_iter().collect(),
            varargs,
        }
    }

    pub fn return_type(&self) -> &TypeRef {
        &self.ret
    }

    pub fn args(&self) -> &[TypeRef] {
        &self.args
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }
}

/// Union-like type defined by its specialisation set; the set is
/// transitively flattened when the node freezes.
#[derive(Debug)]
pub struct AlternativeType {
    header: TypeHeader,
    specialisations: Vec<TypeRef>,
    flattened: Option<Vec<TypeId>>,
}

impl AlternativeType {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        AlternativeType {
            header: TypeHeader::new(name),
            specialisations: Vec::new(),
            flattened: None,
        }
    }

    pub fn add_specialisation(&mut self, name: impl Into<Box<str>>) -> Result<()> {
        self.header.check_update()?;
        self.specialisations.push(TypeRef::named(name));
        Ok(())
    }

    pub fn specialisations(&self) -> &[TypeRef] {
        &self.specialisations
    }

    /// Transitively flattened member set, cached on freeze.
    pub fn flattened(&self) -> Option<&[TypeId]> {
        self.flattened.as_deref()
    }

    fn flatten(&self, ctx: &TypeContext) -> Result<Vec<TypeId>> {
        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<TypeId> = Vec::new();
        for spec in &self.specialisations {
            stack.push(spec.id()?);
        }
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            match ctx.node(id) {
                MetaObject::Alternative(nested) => {
                    for spec in &nested.specialisations {
                        stack.push(spec.id()?);
                    }
                }
                _ => out.push(id),
            }
        }
        Ok(out)
    }
}

/// A named type node. Name is unique within one TypeContext; equality of
/// types is TypeId equality.
#[derive(Debug)]
pub enum MetaObject {
    /// Supertype of every type.
    Any,
    /// Type of the null value.
    Null,
    /// Sentinel for failed type computations; also the placeholder while
    /// a node is checked out of the arena during resolution.
    Invalid,
    Primitive(PrimitiveType),
    Struct(StructType),
    Class(ClassType),
    Collection(CollectionType),
    Tuple(TupleType),
    Function(FunctionType),
    Alternative(AlternativeType),
}

impl MetaObject {
    pub fn kind(&self) -> Kind {
        match self {
            MetaObject::Any => Kind::Any,
            MetaObject::Null => Kind::Null,
            MetaObject::Invalid => Kind::Invalid,
            MetaObject::Primitive(_) => Kind::Primitive,
            MetaObject::Struct(_) => Kind::Struct,
            MetaObject::Class(_) => Kind::Item,
            MetaObject::Collection(_) => Kind::Collection,
            MetaObject::Tuple(_) => Kind::Tuple,
            MetaObject::Function(_) => Kind::Function,
            MetaObject::Alternative(_) => Kind::Alternative,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MetaObject::Any => "ANY",
            MetaObject::Null => "NULL",
            MetaObject::Invalid => "INVALID",
            _ => self.header().map(TypeHeader::name).unwrap_or("INVALID"),
        }
    }

    pub fn header(&self) -> Option<&TypeHeader> {
        match self {
            MetaObject::Any | MetaObject::Null | MetaObject::Invalid => None,
            MetaObject::Primitive(p) => Some(&p.header),
            MetaObject::Struct(s) => Some(s.header()),
            MetaObject::Class(c) => Some(c.header()),
            MetaObject::Collection(c) => Some(&c.header),
            MetaObject::Tuple(t) => Some(&t.header),
            MetaObject::Function(f) => Some(&f.header),
            MetaObject::Alternative(a) => Some(&a.header),
        }
    }

    fn header_mut(&mut self) -> Option<&mut TypeHeader> {
        match self {
            MetaObject::Any | MetaObject::Null | MetaObject::Invalid => None,
            MetaObject::Primitive(p) => Some(&mut p.header),
            MetaObject::Struct(s) => Some(s.header_mut()),
            MetaObject::Class(c) => Some(c.header_mut()),
            MetaObject::Collection(c) => Some(&mut c.header),
            MetaObject::Tuple(t) => Some(&mut t.header),
            MetaObject::Function(f) => Some(&mut f.header),
            MetaObject::Alternative(a) => Some(&mut a.header),
        }
    }

    /// Sentinels are always frozen; other nodes carry their state.
    pub fn state(&self) -> FreezeState {
        self.header()
            .map(TypeHeader::state)
            .unwrap_or(FreezeState::Frozen)
    }

    pub fn is_frozen(&self) -> bool {
        self.state().is_frozen()
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            MetaObject::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            MetaObject::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Structural clone with internal references replaced by name-only
    /// placeholders. The clone is modifiable and unresolved, ready to be
    /// added to a different context.
    pub fn copy(&self, ctx: &TypeContext) -> MetaObject {
        match self {
            MetaObject::Any => MetaObject::Any,
            MetaObject::Null => MetaObject::Null,
            MetaObject::Invalid => MetaObject::Invalid,
            // Primitives are copied by identity; an equal-by-name clone
            // re-unifies on resolution.
            MetaObject::Primitive(p) => {
                MetaObject::Primitive(PrimitiveType::new(p.name()))
            }
            MetaObject::Struct(s) => MetaObject::Struct(s.copy()),
            MetaObject::Class(c) => MetaObject::Class(c.copy(ctx)),
            MetaObject::Collection(c) => {
                let element = c.element.symbolic(ctx);
                let TypeRef::Named(element_name) = &element else {
                    unreachable!("symbolic() always yields a name")
                };
                MetaObject::Collection(CollectionType::new(c.raw, element_name))
            }
            MetaObject::Tuple(t) => MetaObject::Tuple(TupleType::new(
                t.header.name(),
                t.entries.iter().map(|e| e.symbolic(ctx)).collect(),
            )),
            MetaObject::Function(f) => MetaObject::Function(FunctionType::new(
                f.header.name(),
                f.ret.symbolic(ctx),
                f.args.iter().map(|a| a.symbolic(ctx)).collect(),
                f.varargs,
            )),
            MetaObject::Alternative(a) => {
                let mut copy = AlternativeType::new(a.header.name());
                copy.specialisations = a
                    .specialisations
                    .iter()
                    .map(|s| s.symbolic(ctx))
                    .collect();
                MetaObject::Alternative(copy)
            }
        }
    }

    /// Idempotent, recursive replacement of symbolic references with
    /// concrete ids looked up in the context.
    pub(crate) fn resolve(&mut self, ctx: &mut TypeContext, self_id: TypeId) -> Result<()> {
        match self {
            MetaObject::Any | MetaObject::Null | MetaObject::Invalid => Ok(()),
            MetaObject::Primitive(p) => {
                p.header.begin_resolve();
                Ok(())
            }
            MetaObject::Struct(s) => s.resolve(ctx, self_id),
            MetaObject::Class(c) => c.resolve(ctx, self_id),
            MetaObject::Collection(c) => {
                if c.header.begin_resolve() {
                    c.element.resolve(ctx)?;
                }
                Ok(())
            }
            MetaObject::Tuple(t) => {
                if t.header.begin_resolve() {
                    for entry in &mut t.entries {
                        entry.resolve(ctx)?;
                    }
                }
                Ok(())
            }
            MetaObject::Function(f) => {
                if f.header.begin_resolve() {
                    f.ret.resolve(ctx)?;
                    for arg in &mut f.args {
                        arg.resolve(ctx)?;
                    }
                }
                Ok(())
            }
            MetaObject::Alternative(a) => {
                if a.header.begin_resolve() {
                    for spec in &mut a.specialisations {
                        spec.resolve(ctx)?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Transactional freeze: enter Freezing, run the per-kind derived
    /// cache hook, commit to Frozen only on success.
    pub(crate) fn freeze(&mut self, ctx: &mut TypeContext, self_id: TypeId) -> Result<()> {
        let frozen_now = match self.header_mut() {
            None => return Ok(()),
            Some(header) => header.begin_freeze(),
        };
        if !frozen_now {
            return Ok(());
        }
        let result = self.freeze_hook(ctx, self_id);
        match self.header_mut() {
            Some(header) => match &result {
                Ok(()) => header.commit_freeze(),
                Err(_) => header.abort_freeze(),
            },
            None => {}
        }
        result
    }

    fn freeze_hook(&mut self, ctx: &mut TypeContext, self_id: TypeId) -> Result<()> {
        match self {
            MetaObject::Any | MetaObject::Null | MetaObject::Invalid => Ok(()),
            MetaObject::Primitive(_) => Ok(()),
            MetaObject::Struct(s) => s.freeze_hook(self_id),
            MetaObject::Class(c) => c.freeze_hook(ctx, self_id),
            MetaObject::Collection(c) => c.element.id().map(|_| ()),
            MetaObject::Tuple(t) => {
                for entry in &t.entries {
                    entry.id()?;
                }
                Ok(())
            }
            MetaObject::Function(f) => {
                f.ret.id()?;
                for arg in &f.args {
                    arg.id()?;
                }
                Ok(())
            }
            MetaObject::Alternative(a) => {
                a.flattened = Some(a.flatten(ctx)?);
                Ok(())
            }
        }
    }
}

impl fmt::Display for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Kind-dispatched subtype test over a context.
///
/// ANY is supertype of all; alternative membership is checked against the
/// (possibly dynamically recomputed) specialisation set; item types walk
/// the ancestor chain - O(1) once frozen via the cached ancestor set;
/// collections, tuples and functions apply structural covariance.
pub(crate) fn subtype_check(ctx: &TypeContext, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    if b.is_any() {
        return true;
    }
    // An alternative is a subtype only if all of its members are.
    if let MetaObject::Alternative(alt) = ctx.node(a) {
        return alt
            .specialisations()
            .iter()
            .all(|m| m.peek(ctx).is_some_and(|id| subtype_check(ctx, id, b)));
    }
    // Membership in the target alternative's specialisation set; nested
    // alternatives flatten through recursion.
    if let MetaObject::Alternative(alt) = ctx.node(b) {
        return alt
            .specialisations()
            .iter()
            .any(|m| m.peek(ctx).is_some_and(|id| subtype_check(ctx, a, id)));
    }
    match (ctx.node(a), ctx.node(b)) {
        (MetaObject::Class(class), MetaObject::Class(_)) => class_subtype(ctx, class, a, b),
        (MetaObject::Collection(x), MetaObject::Collection(y)) => {
            x.raw_kind().compatible(y.raw_kind()) && ref_subtype(ctx, &x.element, &y.element)
        }
        (MetaObject::Tuple(x), MetaObject::Tuple(y)) => {
            x.entries.len() == y.entries.len()
                && x.entries
                    .iter()
                    .zip(y.entries.iter())
                    .all(|(xe, ye)| ref_subtype(ctx, xe, ye))
        }
        (MetaObject::Function(x), MetaObject::Function(y)) => {
            x.args.len() == y.args.len()
                && x.varargs == y.varargs
                && ref_subtype(ctx, &x.ret, &y.ret)
                && x.args
                    .iter()
                    .zip(y.args.iter())
                    .all(|(xa, ya)| ref_subtype(ctx, xa, ya))
        }
        // Primitives, structs and sentinels relate by identity only.
        _ => false,
    }
}

fn class_subtype(ctx: &TypeContext, class: &ClassType, a: TypeId, b: TypeId) -> bool {
    if let Some(ancestors) = class.frozen_ancestors() {
        return ancestors.contains(&b);
    }
    // Pre-freeze: walk the superclass chain, guarded against cycles.
    let mut seen = FxHashSet::default();
    let mut current = a;
    loop {
        if current == b {
            return true;
        }
        if !seen.insert(current) {
            return false;
        }
        let next = match ctx.node(current) {
            MetaObject::Class(c) => c.superclass_ref().and_then(|s| s.peek(ctx)),
            _ => None,
        };
        match next {
            Some(id) => current = id,
            None => return false,
        }
    }
}

fn ref_subtype(ctx: &TypeContext, x: &TypeRef, y: &TypeRef) -> bool {
    match (x.peek(ctx), y.peek(ctx)) {
        (Some(a), Some(b)) => subtype_check(ctx, a, b),
        // Unresolved placeholders compare by name only.
        _ => match (x, y) {
            (TypeRef::Named(p), TypeRef::Named(q)) => p == q,
            _ => false,
        },
    }
}
