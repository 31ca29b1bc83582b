//! Member-access coalescing.
//!
//! Each pass rewrites the first `operand . member` it finds into
//! `operand Accessor(member)`, with a bare variable operand turned into a
//! reference. A chain `a.b.c` takes one pass per link.

use crate::error::{InternalError, SemaResult, SemanticErrorKind};
use crate::namespace::{Session, Site};

use super::{Atom, ExprState, Expression, OperatorAtom, OperatorKind, StatementContext};

impl Expression {
    /// Flatten member-access chains. Idempotent; returns whether every
    /// link resolved.
    pub(crate) fn coalesce(&mut self, sess: &mut Session, site: Site) -> SemaResult<bool> {
        if self.state != ExprState::Uncoalesced {
            return Ok(self.coalesce_ok);
        }
        let mut ok = true;
        while let Some(pos) = self.atoms.iter().position(
            |a| matches!(a, Atom::Operator(op) if op.kind == OperatorKind::MemberAccess),
        ) {
            self.coalesce_passes += 1;
            if self.coalesce_passes > sess.config.max_coalesce_passes {
                return Err(InternalError::CoalesceLimit {
                    passes: self.coalesce_passes,
                });
            }
            if pos == 0 {
                return Err(InternalError::MalformedExpression(
                    "member access without operand",
                ));
            }
            let member = match self.atoms.get(pos + 1) {
                Some(Atom::Ident(id)) => id.clone(),
                _ => {
                    return Err(InternalError::MalformedExpression(
                        "member access without member name",
                    ))
                }
            };

            let left = self.operand_type(sess, site, pos - 1)?;
            let accessor = left.and_then(|ty| sess.types().accessor(ty, member.name).cloned());
            let mut link = OperatorAtom::new(member.name, member.loc);
            link.kind = OperatorKind::Accessor;
            match (left, accessor) {
                (Some(_), Some(info)) => {
                    log::trace!("coalesce `.{}` -> {}", sess.text(member.name), info.function);
                    link.resolved = Some(info.function);
                    link.ty = Some(info.ty);
                }
                (Some(ty), None) => {
                    let kind = SemanticErrorKind::UnknownMember {
                        ty: sess.type_name(ty)?,
                        member: sess.text(member.name).to_string(),
                    };
                    sess.diagnostics.report_at(member.loc, kind);
                    ok = false;
                }
                (None, _) => ok = false,
            }
            self.atoms.splice(pos..=pos + 1, [Atom::Operator(link)]);
        }
        self.state = ExprState::Coalesced;
        self.coalesce_ok = ok;
        Ok(ok)
    }

    /// Type of the atom left of a member access, inferring it if needed.
    fn operand_type(
        &mut self,
        sess: &mut Session,
        site: Site,
        index: usize,
    ) -> SemaResult<Option<crate::ty::TypeId>> {
        match &mut self.atoms[index] {
            Atom::Ident(id) | Atom::Reference(id) => {
                let Some(var) = sess.lookup_variable(site, id.name)? else {
                    let name = sess.text(id.name).to_string();
                    sess.diagnostics
                        .report_at(id.loc, SemanticErrorKind::UnresolvedIdentifier { name });
                    return Ok(None);
                };
                id.ty = Some(var.ty);
                let id = id.clone();
                self.atoms[index] = Atom::Reference(id);
                Ok(Some(var.ty))
            }
            Atom::Operator(op) if op.kind == OperatorKind::Accessor => Ok(op.ty),
            Atom::Statement(stmt) => {
                stmt.infer(sess, site, StatementContext::Expression)?;
                Ok(stmt.ty())
            }
            Atom::Paren(expr) => {
                expr.infer_in(sess, site, StatementContext::Expression)?;
                Ok(expr.ty())
            }
            Atom::Literal(lit) => Ok(Some(lit.ty)),
            Atom::StructCopy { ty, .. } | Atom::TypeAnnotation(ty) => Ok(Some(*ty)),
            Atom::Operator(_) => Err(InternalError::MalformedExpression(
                "member access after operator",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build;
    use crate::namespace::ROOT;
    use crate::ty;

    fn segment(sess: &mut Session) -> Site {
        let integer = build::ty(sess, "integer");
        build::structure(sess, "Vec2", &[("dx", integer.clone()), ("dy", integer)]);
        let vec2 = build::ty(sess, "Vec2");
        build::structure(sess, "Segment", &[("from", vec2.clone()), ("to", vec2)]);
        sess.run_compile_time_pass().unwrap();
        let site = sess.main_site();
        let segment = sess.interner.get("Segment").unwrap();
        let seg = sess.resolve_type_name(ROOT, segment).unwrap().unwrap();
        build::declare(sess, site, "seg", seg).unwrap();
        site
    }

    #[test]
    fn chains_take_one_pass_per_link() {
        let mut sess = Session::new();
        let site = segment(&mut sess);
        let mut e = build::expr(vec![
            build::ident(&mut sess, "seg"),
            build::dot(&mut sess),
            build::ident(&mut sess, "to"),
            build::dot(&mut sess),
            build::ident(&mut sess, "dx"),
        ]);
        assert!(e.coalesce(&mut sess, site).unwrap());
        assert_eq!(e.coalesce_passes(), 2);
        assert_eq!(e.atoms.len(), 3);
        assert!(matches!(e.atoms[0], Atom::Reference(_)));
        match &e.atoms[2] {
            Atom::Operator(op) => {
                assert_eq!(op.kind, OperatorKind::Accessor);
                assert_eq!(op.ty(), Some(ty::INTEGER));
            }
            other => panic!("expected accessor, got {:?}", other),
        }

        // converged: a second call changes nothing
        let before = e.clone();
        assert!(e.coalesce(&mut sess, site).unwrap());
        assert_eq!(e, before);
    }

    #[test]
    fn unknown_members_are_reported() {
        let mut sess = Session::new();
        let site = segment(&mut sess);
        let mut e = build::expr(vec![
            build::ident(&mut sess, "seg"),
            build::dot(&mut sess),
            build::ident(&mut sess, "middle"),
        ]);
        assert!(!e.coalesce(&mut sess, site).unwrap());
        assert_eq!(
            sess.diagnostics.errors()[0].kind,
            SemanticErrorKind::UnknownMember {
                ty: "Segment".into(),
                member: "middle".into()
            }
        );
    }

    #[test]
    fn pass_limit_is_an_internal_fault() {
        let mut sess = Session::new();
        let site = segment(&mut sess);
        sess.config.max_coalesce_passes = 1;
        let mut e = build::expr(vec![
            build::ident(&mut sess, "seg"),
            build::dot(&mut sess),
            build::ident(&mut sess, "to"),
            build::dot(&mut sess),
            build::ident(&mut sess, "dx"),
        ]);
        assert_eq!(
            e.coalesce(&mut sess, site).unwrap_err(),
            InternalError::CoalesceLimit { passes: 2 }
        );
    }
}
