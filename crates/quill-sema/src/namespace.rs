//! Namespaces and the analysis session.
//!
//! A [`Namespace`] binds one type space, one function table and one scope
//! tree. Namespaces nest through a parent link; name lookups fall back to
//! the parent. The root namespace owns every type identity and every
//! function. Child namespaces are created for template instances and only
//! carry the instance's weak type bindings and its scopes.
//!
//! The [`Session`] owns all namespaces together with the interner, the
//! diagnostics sink and the configuration, and drives the passes.

use std::fmt;

use quill_common::{Interner, Symbol};
use rowan::TextRange;

use crate::code_block::{BlockEntry, CodeBlock};
use crate::config::SemaConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{InternalError, SemaResult, SemanticErrorKind, ShadowKind};
use crate::function::FunctionId;
use crate::function_table::FunctionTable;
use crate::scope::{ScopeId, ScopeTree, Variable};
use crate::ty::TypeId;
use crate::type_space::TypeSpace;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(u32);

impl NamespaceId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns{}", self.0)
    }
}

/// The namespace holding built-ins, user declarations and the main block.
pub const ROOT: NamespaceId = NamespaceId(0);

pub struct Namespace {
    pub id: NamespaceId,
    pub parent: Option<NamespaceId>,
    pub(crate) types: TypeSpace,
    pub(crate) functions: FunctionTable,
    pub(crate) scopes: ScopeTree,
    /// Top-level code. Only the root namespace has one.
    pub(crate) main: Option<CodeBlock>,
}

impl Namespace {
    fn new(id: NamespaceId, parent: Option<NamespaceId>) -> Namespace {
        Namespace {
            id,
            parent,
            types: TypeSpace::new(),
            functions: FunctionTable::new(),
            scopes: ScopeTree::new(),
            main: None,
        }
    }

    pub fn types(&self) -> &TypeSpace {
        &self.types
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn main(&self) -> Option<&CodeBlock> {
        self.main.as_ref()
    }
}

/// Where a node is analysed: its namespace, innermost lexical scope and
/// enclosing function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub ns: NamespaceId,
    pub scope: ScopeId,
    pub function: Option<FunctionId>,
}

impl Site {
    pub fn in_scope(self, scope: ScopeId) -> Site {
        Site { scope, ..self }
    }
}

/// One compilation unit under analysis.
pub struct Session {
    pub interner: Interner,
    pub(crate) namespaces: Vec<Namespace>,
    pub diagnostics: Diagnostics,
    pub config: SemaConfig,
    /// Current nesting of template instantiations.
    pub(crate) template_depth: u32,
    global: ScopeId,
    compile_time_done: bool,
    inference_done: Option<bool>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Self::with_config(SemaConfig::default())
    }

    pub fn with_config(config: SemaConfig) -> Session {
        let mut root = Namespace::new(ROOT, None);
        let global = root.scopes.new_root();
        root.main = Some(CodeBlock::new(global, TextRange::empty(0.into())));

        let mut sess = Session {
            interner: Interner::new(),
            namespaces: vec![root],
            diagnostics: Diagnostics::new(),
            config,
            template_depth: 0,
            global,
            compile_time_done: false,
            inference_done: None,
        };
        crate::builtins::install(&mut sess);
        sess
    }

    // ── Interning ──────────────────────────────────────────────────────

    pub fn intern(&mut self, text: &str) -> Symbol {
        self.interner.intern(text)
    }

    pub fn text(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    // ── Namespaces ─────────────────────────────────────────────────────

    pub fn ns(&self, id: NamespaceId) -> SemaResult<&Namespace> {
        self.namespaces
            .get(id.0 as usize)
            .ok_or(InternalError::UnknownNamespace(id.0))
    }

    pub(crate) fn ns_mut(&mut self, id: NamespaceId) -> SemaResult<&mut Namespace> {
        self.namespaces
            .get_mut(id.0 as usize)
            .ok_or(InternalError::UnknownNamespace(id.0))
    }

    pub fn root(&self) -> &Namespace {
        &self.namespaces[0]
    }

    pub(crate) fn root_mut(&mut self) -> &mut Namespace {
        &mut self.namespaces[0]
    }

    pub(crate) fn types(&self) -> &TypeSpace {
        &self.namespaces[0].types
    }

    pub(crate) fn types_mut(&mut self) -> &mut TypeSpace {
        &mut self.namespaces[0].types
    }

    pub(crate) fn table(&self) -> &FunctionTable {
        &self.namespaces[0].functions
    }

    pub(crate) fn table_mut(&mut self) -> &mut FunctionTable {
        &mut self.namespaces[0].functions
    }

    /// Create an isolated namespace whose lookups fall back to `parent`.
    pub fn new_namespace(&mut self, parent: NamespaceId) -> SemaResult<NamespaceId> {
        self.ns(parent)?;
        let id = NamespaceId(self.namespaces.len() as u32);
        self.namespaces.push(Namespace::new(id, Some(parent)));
        log::debug!("created namespace {} under {}", id, parent);
        Ok(id)
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    /// The namespace and its ancestors, innermost first.
    pub(crate) fn chain(&self, ns: NamespaceId) -> SemaResult<Vec<NamespaceId>> {
        let mut chain = Vec::new();
        let mut current = Some(ns);
        while let Some(id) = current {
            chain.push(id);
            current = self.ns(id)?.parent;
        }
        Ok(chain)
    }

    // ── Scopes and variables ───────────────────────────────────────────

    /// The scope of the main block.
    pub fn global_scope(&self) -> ScopeId {
        self.global
    }

    /// A new scope in the root namespace.
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> SemaResult<ScopeId> {
        let scopes = &mut self.root_mut().scopes;
        match parent {
            Some(p) => scopes.new_child(p),
            None => Ok(scopes.new_root()),
        }
    }

    /// An empty block with a fresh scope nested in `parent`.
    pub fn new_block(&mut self, parent: ScopeId) -> SemaResult<CodeBlock> {
        let scope = self.new_scope(Some(parent))?;
        Ok(CodeBlock::new(scope, TextRange::empty(0.into())))
    }

    /// The site of top-level code.
    pub fn main_site(&self) -> Site {
        Site {
            ns: ROOT,
            scope: self.global_scope(),
            function: None,
        }
    }

    pub fn push_main(&mut self, entry: BlockEntry) {
        if let Some(main) = self.root_mut().main.as_mut() {
            main.entries.push(entry);
        }
    }

    pub fn main(&self) -> Option<&CodeBlock> {
        self.root().main.as_ref()
    }

    pub fn lookup_variable(&self, site: Site, name: Symbol) -> SemaResult<Option<Variable>> {
        Ok(self.ns(site.ns)?.scopes.lookup(site.scope, name)?.cloned())
    }

    /// Whether `name` names a type visible from `ns`.
    pub fn is_type_name(&self, ns: NamespaceId, name: Symbol) -> SemaResult<bool> {
        for id in self.chain(ns)? {
            let types = &self.ns(id)?.types;
            if types.resolve(name).is_some() || types.template(name).is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `name` is the raw name of a function visible from `ns`.
    pub fn is_function_name(&self, ns: NamespaceId, name: Symbol) -> SemaResult<bool> {
        for id in self.chain(ns)? {
            if self.ns(id)?.functions.has_raw_name(name) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Declare a variable in `scope` of `ns`. Rejected with a diagnostic if
    /// the name is visible as a variable in the scope chain or as a type or
    /// function of the namespace.
    pub fn add_variable(
        &mut self,
        ns: NamespaceId,
        scope: ScopeId,
        var: Variable,
    ) -> SemaResult<bool> {
        let shadows = if self.ns(ns)?.scopes.lookup(scope, var.symbol)?.is_some() {
            Some(ShadowKind::Variable)
        } else if self.is_type_name(ns, var.symbol)? {
            Some(ShadowKind::Type)
        } else if self.is_function_name(ns, var.symbol)? {
            Some(ShadowKind::Function)
        } else {
            None
        };
        if let Some(shadows) = shadows {
            self.diagnostics.report(SemanticErrorKind::ShadowedName {
                name: var.name,
                shadows,
            });
            return Ok(false);
        }
        log::trace!("declare `{}` in {} of {}", var.name, scope, ns);
        self.ns_mut(ns)?.scopes.insert(scope, var)?;
        Ok(true)
    }

    // ── Type names ─────────────────────────────────────────────────────

    /// Resolve a bare type name as seen from `ns`.
    pub fn resolve_type_name(&self, ns: NamespaceId, name: Symbol) -> SemaResult<Option<TypeId>> {
        for id in self.chain(ns)? {
            if let Some(ty) = self.ns(id)?.types.resolve(name) {
                return Ok(Some(ty));
            }
        }
        Ok(None)
    }

    /// The registered name of a type identity.
    pub fn type_name(&self, ty: TypeId) -> SemaResult<String> {
        let sym = self.types().name_of(ty)?;
        Ok(self.text(sym).to_string())
    }

    pub fn type_names(&self, tys: &[TypeId]) -> SemaResult<Vec<String>> {
        tys.iter().map(|&t| self.type_name(t)).collect()
    }

    // ── Pipeline ───────────────────────────────────────────────────────

    /// Run every pass over the whole unit. `Ok(false)` means semantic
    /// errors were reported; `Err` is a compiler fault.
    pub fn check(&mut self) -> SemaResult<bool> {
        let before = self.diagnostics.len();
        self.run_compile_time_pass()?;
        self.run_type_inference()?;
        self.validate()?;
        Ok(self.diagnostics.len() == before)
    }

    /// Execute compile-time effects of every node, exactly once.
    pub fn run_compile_time_pass(&mut self) -> SemaResult<()> {
        if self.compile_time_done {
            return Ok(());
        }
        self.compile_time_done = true;
        log::debug!("compile-time pass: types");
        self.run_type_compile_time_pass()?;

        log::debug!("compile-time pass: functions");
        let count = self.table().len();
        for index in 0..count {
            let fid = FunctionId::new(ROOT, index as u32);
            self.function_compile_time_pass(fid)?;
        }

        log::debug!("compile-time pass: main block");
        let site = self.main_site();
        if let Some(mut main) = self.root_mut().main.take() {
            let result = main.run_compile_time_pass(self, site);
            self.root_mut().main = Some(main);
            result?;
        }

        self.detect_dynamic_patterns()?;
        Ok(())
    }

    /// Infer every function, the main block and all pending template
    /// instances. Idempotent.
    pub fn run_type_inference(&mut self) -> SemaResult<bool> {
        if let Some(ok) = self.inference_done {
            return Ok(ok);
        }
        self.run_compile_time_pass()?;
        log::debug!("type inference: functions");
        let mut ok = true;
        let count = self.table().len();
        for index in 0..count {
            let fid = FunctionId::new(ROOT, index as u32);
            if self.function(fid)?.instance_of.is_some() {
                continue;
            }
            ok &= self.infer_function(fid)?;
        }

        log::debug!("type inference: main block");
        let site = self.main_site();
        if let Some(mut main) = self.root_mut().main.take() {
            let result = main.run_type_inference(self, site);
            self.root_mut().main = Some(main);
            ok &= result?;
        }

        ok &= self.drain_pending_instances()?;
        ok &= self.check_unused_templates()?;
        self.inference_done = Some(ok);
        Ok(ok)
    }

    /// Check that every node reached a resolved state.
    pub fn validate(&mut self) -> SemaResult<bool> {
        let mut ok = self.validate_types()?;
        for index in 0..self.table().len() {
            let fid = FunctionId::new(ROOT, index as u32);
            ok &= self.validate_function(fid)?;
        }
        if let Some(main) = self.root_mut().main.take() {
            let result = main.validate(self);
            self.root_mut().main = Some(main);
            ok &= result?;
        }
        Ok(ok)
    }
}
