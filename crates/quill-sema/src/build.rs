//! IR construction helpers.
//!
//! The parser normally builds the IR. These helpers build the same nodes
//! directly, for hosts without a parser and for tests. [`infix`] reads a
//! whitespace-separated atom sequence such as `a + b * c` or `p . x`.

use rowan::{TextRange, TextSize};

use crate::error::SemaResult;
use crate::expr::{Atom, Expression, IdentAtom, OperatorAtom};
use crate::function::Param;
use crate::literal::{Literal, LiteralValue};
use crate::namespace::{Session, Site};
use crate::scope::{Variable, VariableOrigin};
use crate::statement::Statement;
use crate::structure::{Member, Structure};
use crate::sum_type::SumType;
use crate::template::{TemplateParam, TemplateParamKind};
use crate::ty::{TypeId, TypeRef, TypeRefKind};

fn nowhere() -> TextRange {
    TextRange::empty(0.into())
}

// ── Types ──────────────────────────────────────────────────────────────

pub fn ty(sess: &mut Session, name: &str) -> TypeRef {
    TypeRef::named(sess.intern(name), nowhere())
}

/// `name<args...>`.
pub fn generic(sess: &mut Session, name: &str, args: Vec<TypeRef>) -> TypeRef {
    TypeRef {
        kind: TypeRefKind::Named {
            name: sess.intern(name),
            args,
        },
        loc: nowhere(),
    }
}

/// `(params) -> ret`.
pub fn fn_ty(params: Vec<TypeRef>, ret: TypeRef) -> TypeRef {
    TypeRef {
        kind: TypeRefKind::Function {
            params,
            ret: Box::new(ret),
        },
        loc: nowhere(),
    }
}

pub fn type_param(sess: &mut Session, name: &str) -> TemplateParam {
    TemplateParam {
        name: sess.intern(name),
        kind: TemplateParamKind::Type,
    }
}

/// A template parameter that only accepts sum types.
pub fn sum_param(sess: &mut Session, name: &str) -> TemplateParam {
    TemplateParam {
        name: sess.intern(name),
        kind: TemplateParamKind::Sum,
    }
}

/// Declare a structure with variable members.
pub fn structure(sess: &mut Session, name: &str, members: &[(&str, TypeRef)]) -> Option<TypeId> {
    let members = members
        .iter()
        .map(|(m, ty)| Member::Variable {
            name: sess.intern(m),
            ty: ty.clone(),
            loc: nowhere(),
        })
        .collect();
    let name = sess.intern(name);
    sess.declare_structure(Structure::new(name, members, nowhere()))
}

/// Declare a sum type over named bases.
pub fn sum(sess: &mut Session, name: &str, bases: &[&str]) -> Option<TypeId> {
    let bases = bases.iter().map(|b| ty(sess, b)).collect();
    let name = sess.intern(name);
    sess.declare_sum(SumType::new(name, bases, nowhere()))
}

// ── Parameters ─────────────────────────────────────────────────────────

pub fn param(sess: &mut Session, name: &str, ty_name: &str) -> Param {
    Param::Named {
        name: sess.intern(name),
        ty: ty(sess, ty_name),
        reference: false,
        loc: nowhere(),
    }
}

pub fn ref_param(sess: &mut Session, name: &str, ty_name: &str) -> Param {
    Param::Named {
        name: sess.intern(name),
        ty: ty(sess, ty_name),
        reference: true,
        loc: nowhere(),
    }
}

/// A higher-order parameter `name: (params) -> ret`.
pub fn fn_param(sess: &mut Session, name: &str, params: &[&str], ret: &str) -> Param {
    Param::Function {
        name: sess.intern(name),
        params: params.iter().map(|p| ty(sess, p)).collect(),
        ret: ty(sess, ret),
        loc: nowhere(),
    }
}

pub fn pattern_param(value: LiteralValue) -> Param {
    Param::Pattern {
        value,
        loc: nowhere(),
    }
}

// ── Atoms and expressions ──────────────────────────────────────────────

pub fn expr(atoms: Vec<Atom>) -> Expression {
    Expression::new(atoms, nowhere())
}

pub fn int(value: i64) -> Atom {
    Atom::Literal(Literal::new(LiteralValue::Integer(value), nowhere()))
}

pub fn real(value: f64) -> Atom {
    Atom::Literal(Literal::new(LiteralValue::Real(value), nowhere()))
}

pub fn boolean(value: bool) -> Atom {
    Atom::Literal(Literal::new(LiteralValue::Boolean(value), nowhere()))
}

pub fn string(value: &str) -> Atom {
    Atom::Literal(Literal::new(LiteralValue::Str(value.to_string()), nowhere()))
}

pub fn ident(sess: &mut Session, name: &str) -> Atom {
    Atom::Ident(IdentAtom::new(sess.intern(name), nowhere()))
}

pub fn op(sess: &mut Session, name: &str) -> Atom {
    Atom::Operator(OperatorAtom::new(sess.intern(name), nowhere()))
}

/// The member-access operator.
pub fn dot(sess: &mut Session) -> Atom {
    Atom::Operator(OperatorAtom::member_access(sess.intern("."), nowhere()))
}

pub fn paren(inner: Expression) -> Atom {
    Atom::Paren(Box::new(inner))
}

pub fn stmt(sess: &mut Session, name: &str, args: Vec<Expression>) -> Statement {
    Statement::new(sess.intern(name), args, nowhere())
}

/// A nested statement atom, `name(args...)`.
pub fn call(sess: &mut Session, name: &str, args: Vec<Expression>) -> Atom {
    Atom::Statement(Box::new(stmt(sess, name, args)))
}

/// Build an expression from whitespace-separated atoms. Numbers become
/// literals (a `.` makes a real), `true`/`false` booleans, names
/// identifiers, `.` and `a.b` member access, anything else an operator.
/// Atoms carry their byte range in `src`.
pub fn infix(sess: &mut Session, src: &str) -> Expression {
    let mut atoms = Vec::new();
    for token in src.split_whitespace() {
        let start = token.as_ptr() as usize - src.as_ptr() as usize;
        let range = TextRange::at(TextSize::from(start as u32), TextSize::of(token));
        if let Some(atom) = literal_atom(token, range) {
            atoms.push(atom);
        } else if token == "." {
            atoms.push(Atom::Operator(OperatorAtom::member_access(sess.intern("."), range)));
        } else if is_name(token) {
            let mut offset = start;
            for (i, part) in token.split('.').enumerate() {
                if i > 0 {
                    let at = TextRange::at(TextSize::from(offset as u32 - 1), 1.into());
                    atoms.push(Atom::Operator(OperatorAtom::member_access(sess.intern("."), at)));
                }
                let at = TextRange::at(TextSize::from(offset as u32), TextSize::of(part));
                atoms.push(Atom::Ident(IdentAtom::new(sess.intern(part), at)));
                offset += part.len() + 1;
            }
        } else {
            atoms.push(Atom::Operator(OperatorAtom::new(sess.intern(token), range)));
        }
    }
    let whole = TextRange::at(0.into(), TextSize::of(src));
    Expression::new(atoms, whole)
}

fn literal_atom(token: &str, range: TextRange) -> Option<Atom> {
    let value = if let Ok(v) = token.parse::<i64>() {
        LiteralValue::Integer(v)
    } else if token.contains('.') && token.starts_with(|c: char| c.is_ascii_digit()) {
        LiteralValue::Real(token.parse().ok()?)
    } else if token == "true" || token == "false" {
        LiteralValue::Boolean(token == "true")
    } else {
        return None;
    };
    Some(Atom::Literal(Literal::new(value, range)))
}

fn is_name(token: &str) -> bool {
    token.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && token
            .split('.')
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

// ── Variables ──────────────────────────────────────────────────────────

/// Declare a local variable at `site`.
pub fn declare(sess: &mut Session, site: Site, name: &str, ty: TypeId) -> SemaResult<bool> {
    let var = Variable {
        name: name.to_string(),
        symbol: sess.intern(name),
        ty,
        origin: VariableOrigin::Local,
        reference: false,
    };
    sess.add_variable(site.ns, site.scope, var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infix_splits_member_chains() {
        let mut sess = Session::new();
        let e = infix(&mut sess, "p.x + 2.5");
        assert_eq!(e.atoms.len(), 5);
        assert!(matches!(&e.atoms[1], Atom::Operator(op) if sess.text(op.name) == "."));
        assert!(matches!(&e.atoms[4], Atom::Literal(l) if l.value == LiteralValue::Real(2.5)));
        assert_eq!(e.atoms[2].loc(), Some(TextRange::new(2.into(), 3.into())));
    }
}
