//! Assignments `lhs = rhs`.

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::error::{SemaResult, SemanticErrorKind};
use crate::expr::{Expression, StatementContext};
use crate::function::Progress;
use crate::namespace::{Session, Site};
use crate::ty::TypeId;

#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub lhs: Expression,
    pub rhs: Expression,
    pub loc: TextRange,
    pub(crate) state: Progress,
}

impl Assignment {
    pub fn new(lhs: Expression, rhs: Expression, loc: TextRange) -> Assignment {
        Assignment {
            lhs,
            rhs,
            loc,
            state: Progress::Pending,
        }
    }

    pub fn run_compile_time_pass(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        self.lhs.run_compile_time_pass(sess, site)?;
        self.rhs.run_compile_time_pass(sess, site)
    }

    /// Infer both sides, then fit the right-hand side to the target:
    /// equal types pass, literals demote and base values upcast into a
    /// sum-typed target.
    pub fn infer(&mut self, sess: &mut Session, site: Site) -> SemaResult<bool> {
        match self.state {
            Progress::Done(ok) => return Ok(ok),
            Progress::InProgress => return Ok(false),
            Progress::Pending => {}
        }
        self.state = Progress::InProgress;
        self.run_compile_time_pass(sess, site)?;

        let mut ok = self.lhs.infer_in(sess, site, StatementContext::Expression)?;
        ok &= self.rhs.infer_in(sess, site, StatementContext::Expression)?;

        if !self.lhs.is_lvalue() {
            sess.diagnostics
                .report_at(self.lhs.loc, SemanticErrorKind::NotAnLvalue);
            ok = false;
        } else if let (Some(target), Some(found)) = (self.lhs.ty(), self.rhs.ty()) {
            if !sess.coerce_to(&mut self.rhs, target) {
                let kind = SemanticErrorKind::TypeMismatch {
                    expected: sess.type_name(target)?,
                    found: sess.type_name(found)?,
                };
                sess.diagnostics.report_at(self.loc, kind);
                ok = false;
            }
        } else {
            ok = false;
        }

        self.state = Progress::Done(ok);
        Ok(ok)
    }

    pub fn validate(&self) -> bool {
        self.state == Progress::Done(true) && self.lhs.is_resolved() && self.rhs.is_resolved()
    }

    pub(crate) fn substitute(&self, bindings: &FxHashMap<Symbol, TypeId>) -> Assignment {
        Assignment::new(
            self.lhs.substitute(bindings),
            self.rhs.substitute(bindings),
            self.loc,
        )
    }
}
