//! Literal atoms and width demotion.

use std::fmt;

use rowan::TextRange;

use crate::ty::{self, TypeId};

/// The compile-time value of a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Str(String),
}

impl LiteralValue {
    /// The type a fresh literal of this value gets before any demotion.
    pub fn default_type(&self) -> TypeId {
        match self {
            LiteralValue::Integer(v) => {
                if i32::try_from(*v).is_ok() {
                    ty::INTEGER
                } else {
                    ty::LONG
                }
            }
            LiteralValue::Real(_) => ty::REAL,
            LiteralValue::Boolean(_) => ty::BOOLEAN,
            LiteralValue::Str(_) => ty::STRING,
        }
    }

    /// Whether the value is representable in `target`.
    pub fn fits(&self, target: TypeId) -> bool {
        match self {
            LiteralValue::Integer(v) => match ty::integer_range(target) {
                Some((lo, hi)) => (lo..=hi).contains(v),
                None => false,
            },
            LiteralValue::Real(v) => match target {
                ty::REAL => true,
                ty::SINGLE => (*v as f32).is_finite() || !v.is_finite(),
                _ => false,
            },
            LiteralValue::Boolean(_) => target == ty::BOOLEAN,
            LiteralValue::Str(_) => target == ty::STRING,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Integer(v) => write!(f, "{}", v),
            LiteralValue::Real(v) => write!(f, "{:?}", v),
            LiteralValue::Boolean(v) => write!(f, "{}", v),
            LiteralValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// A literal atom of an expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub value: LiteralValue,
    pub ty: TypeId,
    /// A committed literal keeps its type; demotion is refused.
    pub committed: bool,
    pub demoted: bool,
    pub loc: TextRange,
}

impl Literal {
    pub fn new(value: LiteralValue, loc: TextRange) -> Literal {
        let ty = value.default_type();
        Literal {
            value,
            ty,
            committed: false,
            demoted: false,
            loc,
        }
    }

    /// A literal whose type was fixed in source, e.g. by a suffix.
    pub fn committed(value: LiteralValue, ty: TypeId, loc: TextRange) -> Literal {
        Literal {
            value,
            ty,
            committed: true,
            demoted: false,
            loc,
        }
    }

    /// Whether `demote(target)` would succeed, without changing anything.
    pub fn can_demote(&self, target: TypeId) -> bool {
        if self.ty == target {
            return true;
        }
        if self.committed {
            return false;
        }
        let same_class = (ty::is_integer(self.ty) && ty::is_integer(target))
            || (ty::is_real(self.ty) && ty::is_real(target));
        same_class && self.value.fits(target)
    }

    /// Narrow (or widen) the literal to `target` if its value fits.
    /// Failure leaves the literal untouched.
    pub fn demote(&mut self, target: TypeId) -> bool {
        if self.ty == target {
            return true;
        }
        if !self.can_demote(target) {
            return false;
        }
        log::trace!("demote literal {} to {}", self.value, target);
        self.ty = target;
        self.committed = true;
        self.demoted = true;
        true
    }

    /// Static pattern equality: same kind and value, integers compared by
    /// value regardless of width.
    pub fn matches_pattern(&self, pattern: &LiteralValue) -> bool {
        match (&self.value, pattern) {
            (LiteralValue::Integer(a), LiteralValue::Integer(b)) => a == b,
            (LiteralValue::Real(a), LiteralValue::Real(b)) => a == b,
            (LiteralValue::Boolean(a), LiteralValue::Boolean(b)) => a == b,
            (LiteralValue::Str(a), LiteralValue::Str(b)) => a == b,
            _ => false,
        }
    }
}
