// src/freeze.rs
//
// The mutable-build -> immutable-frozen lifecycle shared by every type
// node. freeze() is transactional: the Freezing state is committed to
// Frozen only if the node's derived-cache hook succeeds, and reverted to
// Modifiable otherwise so the node stays usable for diagnosis.

use crate::errors::{MetaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeState {
    #[default]
    Modifiable,
    Freezing,
    Frozen,
}

impl FreezeState {
    #[inline]
    pub fn is_frozen(self) -> bool {
        self == FreezeState::Frozen
    }

    /// Fail fast unless the node is still modifiable. Every mutator calls
    /// this before touching node state.
    pub fn check_update(self, type_name: &str) -> Result<()> {
        match self {
            FreezeState::Modifiable => Ok(()),
            _ => Err(MetaError::Frozen {
                type_name: type_name.to_string(),
            }),
        }
    }
}

/// Common header of every named type node: name plus lifecycle state.
#[derive(Debug, Clone)]
pub struct TypeHeader {
    name: Box<str>,
    state: FreezeState,
    resolved: bool,
}

impl TypeHeader {
    pub fn new(name: impl Into<Box<str>>) -> Self {
        TypeHeader {
            name: name.into(),
            state: FreezeState::Modifiable,
            resolved: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> FreezeState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state.is_frozen()
    }

    pub fn check_update(&self) -> Result<()> {
        self.state.check_update(&self.name)
    }

    /// Mark resolution as started. Returns false if the node was resolved
    /// (or started resolving) before - resolve() is idempotent.
    pub fn begin_resolve(&mut self) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Enter the Freezing state. Returns false if the node is not
    /// Modifiable - freeze() is a no-op then.
    pub fn begin_freeze(&mut self) -> bool {
        if self.state != FreezeState::Modifiable {
            return false;
        }
        self.state = FreezeState::Freezing;
        true
    }

    /// Commit the Modifiable -> Frozen transition.
    pub fn commit_freeze(&mut self) {
        debug_assert_eq!(self.state, FreezeState::Freezing);
        self.state = FreezeState::Frozen;
    }

    /// Revert a failed freeze back to Modifiable.
    pub fn abort_freeze(&mut self) {
        debug_assert_eq!(self.state, FreezeState::Freezing);
        self.state = FreezeState::Modifiable;
    }
}
