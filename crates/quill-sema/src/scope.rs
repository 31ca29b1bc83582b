//! Lexical scopes.
//!
//! Scopes form a tree through parent links. A lookup walks from a scope up
//! its parent chain; this chain is purely lexical and independent of the
//! namespace parent chain. Every namespace owns one [`ScopeTree`].

use std::fmt;

use quill_common::Symbol;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{InternalError, SemaResult};
use crate::ty::TypeId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

/// Where a variable binding came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum VariableOrigin {
    Parameter,
    Local,
    /// The synthetic `return` slot of a function.
    Return,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub symbol: Symbol,
    pub ty: TypeId,
    pub origin: VariableOrigin,
    /// Bound by reference (a `&` parameter).
    pub reference: bool,
}

#[derive(Clone, Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    vars: Vec<Variable>,
}

/// All scopes of one namespace, addressed by [`ScopeId`].
#[derive(Clone, Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            vars: Vec::new(),
        });
        id
    }

    fn scope(&self, id: ScopeId) -> SemaResult<&Scope> {
        self.scopes
            .get(id.0 as usize)
            .ok_or(InternalError::UnknownScope(id.0))
    }

    pub fn new_root(&mut self) -> ScopeId {
        self.push(None)
    }

    pub fn new_child(&mut self, parent: ScopeId) -> SemaResult<ScopeId> {
        self.scope(parent)?;
        Ok(self.push(Some(parent)))
    }

    pub fn parent(&self, id: ScopeId) -> SemaResult<Option<ScopeId>> {
        Ok(self.scope(id)?.parent)
    }

    /// Look `symbol` up in `id` and then its ancestors.
    pub fn lookup(&self, id: ScopeId, symbol: Symbol) -> SemaResult<Option<&Variable>> {
        let mut current = Some(id);
        while let Some(scope_id) = current {
            let scope = self.scope(scope_id)?;
            if let Some(var) = scope.vars.iter().find(|v| v.symbol == symbol) {
                return Ok(Some(var));
            }
            current = scope.parent;
        }
        Ok(None)
    }

    /// Look `symbol` up in `id` only.
    pub fn lookup_local(&self, id: ScopeId, symbol: Symbol) -> SemaResult<Option<&Variable>> {
        Ok(self.scope(id)?.vars.iter().find(|v| v.symbol == symbol))
    }

    /// Add a binding without any shadow checks.
    pub fn insert(&mut self, id: ScopeId, var: Variable) -> SemaResult<()> {
        let scope = self
            .scopes
            .get_mut(id.0 as usize)
            .ok_or(InternalError::UnknownScope(id.0))?;
        scope.vars.push(var);
        Ok(())
    }

    pub fn variables(&self, id: ScopeId) -> SemaResult<&[Variable]> {
        Ok(&self.scope(id)?.vars)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ScopeId> {
        (0..self.scopes.len() as u32).map(ScopeId)
    }

    /// Copy the shape of the subtree rooted at `root` into `into`, without
    /// its variables. Returns the old-to-new id mapping; `root` maps to a
    /// fresh root of `into`.
    pub fn fork(
        &self,
        root: ScopeId,
        into: &mut ScopeTree,
    ) -> SemaResult<FxHashMap<ScopeId, ScopeId>> {
        self.scope(root)?;
        let mut mapping = FxHashMap::default();
        mapping.insert(root, into.new_root());
        // Children are always allocated after their parent.
        for index in (root.0 + 1)..self.scopes.len() as u32 {
            let id = ScopeId(index);
            if let Some(parent) = self.scopes[index as usize].parent {
                if let Some(&new_parent) = mapping.get(&parent) {
                    mapping.insert(id, into.push(Some(new_parent)));
                }
            }
        }
        Ok(mapping)
    }
}
