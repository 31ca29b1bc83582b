//! Code blocks: ordered entries bound to one lexical scope.

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::assignment::Assignment;
use crate::error::{InternalError, SemaResult};
use crate::expr::StatementContext;
use crate::function::Progress;
use crate::namespace::{Session, Site};
use crate::scope::ScopeId;
use crate::statement::Statement;
use crate::ty::TypeId;

/// Whether a step operator is applied before or after its operand is read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fixity {
    /// `++x`: the updated value is the result.
    Pre,
    /// `x++`: the value before the update is the result.
    Post,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockEntry {
    Assignment(Assignment),
    Statement(Statement),
    /// `++x` or `x--`, resolved as a one-parameter overload on the
    /// variable's type.
    Step { op: Statement, fixity: Fixity },
    Block(CodeBlock),
}

impl BlockEntry {
    pub fn pre(op: Statement) -> BlockEntry {
        BlockEntry::Step {
            op,
            fixity: Fixity::Pre,
        }
    }

    pub fn post(op: Statement) -> BlockEntry {
        BlockEntry::Step {
            op,
            fixity: Fixity::Post,
        }
    }

    /// Fixity of a step entry, `None` for every other entry.
    pub fn fixity(&self) -> Option<Fixity> {
        match self {
            BlockEntry::Step { fixity, .. } => Some(*fixity),
            _ => None,
        }
    }

    pub fn run_compile_time_pass(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        match self {
            BlockEntry::Assignment(a) => a.run_compile_time_pass(sess, site),
            BlockEntry::Statement(s) | BlockEntry::Step { op: s, .. } => {
                s.run_compile_time_pass(sess, site)
            }
            BlockEntry::Block(b) => b.run_compile_time_pass(sess, site),
        }
    }

    pub fn run_type_inference(&mut self, sess: &mut Session, site: Site) -> SemaResult<bool> {
        match self {
            BlockEntry::Assignment(a) => a.infer(sess, site),
            BlockEntry::Statement(s) | BlockEntry::Step { op: s, .. } => {
                s.infer(sess, site, StatementContext::Expression)
            }
            BlockEntry::Block(b) => b.run_type_inference(sess, site),
        }
    }

    pub fn validate(&self, sess: &Session) -> SemaResult<bool> {
        Ok(match self {
            BlockEntry::Assignment(a) => a.validate(),
            BlockEntry::Statement(s) | BlockEntry::Step { op: s, .. } => s.is_resolved(),
            BlockEntry::Block(b) => b.validate(sess)?,
        })
    }

    fn substitute(
        &self,
        bindings: &FxHashMap<Symbol, TypeId>,
        scopes: &FxHashMap<ScopeId, ScopeId>,
    ) -> SemaResult<BlockEntry> {
        Ok(match self {
            BlockEntry::Assignment(a) => BlockEntry::Assignment(a.substitute(bindings)),
            BlockEntry::Statement(s) => BlockEntry::Statement(s.substitute(bindings)),
            BlockEntry::Step { op, fixity } => BlockEntry::Step {
                op: op.substitute(bindings),
                fixity: *fixity,
            },
            BlockEntry::Block(b) => BlockEntry::Block(b.substitute(bindings, scopes)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    scope: ScopeId,
    pub entries: Vec<BlockEntry>,
    pub loc: TextRange,
    compile_time_done: bool,
    inference: Progress,
}

impl CodeBlock {
    pub fn new(scope: ScopeId, loc: TextRange) -> CodeBlock {
        CodeBlock {
            scope,
            entries: Vec::new(),
            loc,
            compile_time_done: false,
            inference: Progress::Pending,
        }
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: BlockEntry) {
        self.entries.push(entry);
    }

    /// Run every entry's compile-time effects in this block's scope, once.
    /// A scope missing from the namespace is an internal fault.
    pub fn run_compile_time_pass(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        if self.compile_time_done {
            return Ok(());
        }
        self.compile_time_done = true;
        sess.ns(site.ns)?.scopes.parent(self.scope)?;
        let site = site.in_scope(self.scope);
        for entry in &mut self.entries {
            entry.run_compile_time_pass(sess, site)?;
        }
        Ok(())
    }

    /// Infer every entry. Later entries are inferred even when earlier ones
    /// fail, to surface as many errors as possible.
    pub fn run_type_inference(&mut self, sess: &mut Session, site: Site) -> SemaResult<bool> {
        match self.inference {
            Progress::Done(ok) => return Ok(ok),
            Progress::InProgress => return Ok(true),
            Progress::Pending => {}
        }
        self.run_compile_time_pass(sess, site)?;
        self.inference = Progress::InProgress;
        let site = site.in_scope(self.scope);
        let mut ok = true;
        for entry in &mut self.entries {
            ok &= entry.run_type_inference(sess, site)?;
        }
        self.inference = Progress::Done(ok);
        Ok(ok)
    }

    pub fn validate(&self, sess: &Session) -> SemaResult<bool> {
        let mut ok = self.inference == Progress::Done(true);
        for entry in &self.entries {
            ok &= entry.validate(sess)?;
        }
        Ok(ok)
    }

    /// A fresh copy for a template instance, moved onto the forked scopes.
    pub(crate) fn substitute(
        &self,
        bindings: &FxHashMap<Symbol, TypeId>,
        scopes: &FxHashMap<ScopeId, ScopeId>,
    ) -> SemaResult<CodeBlock> {
        let scope = scopes
            .get(&self.scope)
            .copied()
            .ok_or(InternalError::UnknownScope(self.scope.index()))?;
        let mut block = CodeBlock::new(scope, self.loc);
        for entry in &self.entries {
            block.entries.push(entry.substitute(bindings, scopes)?);
        }
        Ok(block)
    }
}
