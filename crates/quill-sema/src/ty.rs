//! Type identities and unresolved type references.
//!
//! A [`TypeId`] packs a [`TypeFamily`] tag into its high byte and a
//! family-local ordinal into the low 24 bits. The family decides which
//! sub-table of the type space defines the type. A [`TypeRef`] is the
//! parser's view of a type: a name with optional template arguments,
//! resolved against a namespace later.

use std::fmt;

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;
use serde::Serialize;

const FAMILY_SHIFT: u32 = 24;
const ORDINAL_MASK: u32 = (1 << FAMILY_SHIFT) - 1;

/// Which sub-table of the type space owns a type identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeFamily {
    /// Primitive types known to the compiler (`integer`, `identifier`, ...).
    Magic,
    /// User-declared record types.
    Structure,
    /// Strong aliases: nominally distinct, same representation.
    Unit,
    /// Algebraic sum types.
    Sum,
    /// Concrete instances of structure or sum templates.
    Instance,
    /// Higher-order function signatures.
    Function,
    /// Garbage-collected built-ins (`string`).
    Gc,
}

impl TypeFamily {
    const ALL: [TypeFamily; 7] = [
        TypeFamily::Magic,
        TypeFamily::Structure,
        TypeFamily::Unit,
        TypeFamily::Sum,
        TypeFamily::Instance,
        TypeFamily::Function,
        TypeFamily::Gc,
    ];

    const fn tag(self) -> u32 {
        match self {
            TypeFamily::Magic => 0,
            TypeFamily::Structure => 1,
            TypeFamily::Unit => 2,
            TypeFamily::Sum => 3,
            TypeFamily::Instance => 4,
            TypeFamily::Function => 5,
            TypeFamily::Gc => 6,
        }
    }
}

/// An opaque type identity. Equality is identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const fn new(family: TypeFamily, ordinal: u32) -> TypeId {
        TypeId((family.tag() << FAMILY_SHIFT) | (ordinal & ORDINAL_MASK))
    }

    pub fn family(self) -> TypeFamily {
        let tag = self.0 >> FAMILY_SHIFT;
        TypeFamily::ALL[tag as usize]
    }

    pub fn ordinal(self) -> u32 {
        self.0 & ORDINAL_MASK
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.family(), self.ordinal())
    }
}

// ── Primitive identities ───────────────────────────────────────────────

pub const VOID: TypeId = TypeId::new(TypeFamily::Magic, 0);
/// Parameter type of constructor slots that name a variable to declare.
pub const IDENTIFIER: TypeId = TypeId::new(TypeFamily::Magic, 1);
pub const BOOLEAN: TypeId = TypeId::new(TypeFamily::Magic, 2);
pub const BYTE: TypeId = TypeId::new(TypeFamily::Magic, 3);
pub const SHORT: TypeId = TypeId::new(TypeFamily::Magic, 4);
pub const INTEGER: TypeId = TypeId::new(TypeFamily::Magic, 5);
pub const LONG: TypeId = TypeId::new(TypeFamily::Magic, 6);
pub const SINGLE: TypeId = TypeId::new(TypeFamily::Magic, 7);
pub const REAL: TypeId = TypeId::new(TypeFamily::Magic, 8);
pub const STRING: TypeId = TypeId::new(TypeFamily::Gc, 0);

/// Names of the primitive identities, in registration order.
pub const PRIMITIVES: [(&str, TypeId); 10] = [
    ("void", VOID),
    ("identifier", IDENTIFIER),
    ("boolean", BOOLEAN),
    ("byte", BYTE),
    ("short", SHORT),
    ("integer", INTEGER),
    ("long", LONG),
    ("single", SINGLE),
    ("real", REAL),
    ("string", STRING),
];

pub const INTEGER_TYPES: [TypeId; 4] = [BYTE, SHORT, INTEGER, LONG];
pub const REAL_TYPES: [TypeId; 2] = [SINGLE, REAL];

/// Inclusive value range of an integer primitive.
pub fn integer_range(ty: TypeId) -> Option<(i64, i64)> {
    match ty {
        BYTE => Some((i8::MIN as i64, i8::MAX as i64)),
        SHORT => Some((i16::MIN as i64, i16::MAX as i64)),
        INTEGER => Some((i32::MIN as i64, i32::MAX as i64)),
        LONG => Some((i64::MIN, i64::MAX)),
        _ => None,
    }
}

pub fn is_integer(ty: TypeId) -> bool {
    INTEGER_TYPES.contains(&ty)
}

pub fn is_real(ty: TypeId) -> bool {
    REAL_TYPES.contains(&ty)
}

pub fn is_numeric(ty: TypeId) -> bool {
    is_integer(ty) || is_real(ty)
}

// ── Type references ────────────────────────────────────────────────────

/// A type as written in source, not yet resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRef {
    pub kind: TypeRefKind,
    pub loc: TextRange,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypeRefKind {
    /// `name` or `name<args...>`.
    Named { name: Symbol, args: Vec<TypeRef> },
    /// `(params) -> ret`.
    Function {
        params: Vec<TypeRef>,
        ret: Box<TypeRef>,
    },
    /// Already bound to an identity (template substitution output).
    Resolved(TypeId),
}

impl TypeRef {
    pub fn named(name: Symbol, loc: TextRange) -> TypeRef {
        TypeRef {
            kind: TypeRefKind::Named {
                name,
                args: Vec::new(),
            },
            loc,
        }
    }

    pub fn resolved(ty: TypeId, loc: TextRange) -> TypeRef {
        TypeRef {
            kind: TypeRefKind::Resolved(ty),
            loc,
        }
    }

    /// The head name, if this is a named reference.
    pub fn name(&self) -> Option<Symbol> {
        match &self.kind {
            TypeRefKind::Named { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Replace every bare reference to a key of `bindings` with the bound
    /// identity, recursing into template arguments and signatures.
    pub fn substitute(&self, bindings: &FxHashMap<Symbol, TypeId>) -> TypeRef {
        let kind = match &self.kind {
            TypeRefKind::Named { name, args } if args.is_empty() => match bindings.get(name) {
                Some(&ty) => TypeRefKind::Resolved(ty),
                None => self.kind.clone(),
            },
            TypeRefKind::Named { name, args } => TypeRefKind::Named {
                name: *name,
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            TypeRefKind::Function { params, ret } => TypeRefKind::Function {
                params: params.iter().map(|p| p.substitute(bindings)).collect(),
                ret: Box::new(ret.substitute(bindings)),
            },
            TypeRefKind::Resolved(ty) => TypeRefKind::Resolved(*ty),
        };
        TypeRef {
            kind,
            loc: self.loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_common::Interner;

    #[test]
    fn family_round_trips_through_identity() {
        let id = TypeId::new(TypeFamily::Sum, 42);
        assert_eq!(id.family(), TypeFamily::Sum);
        assert_eq!(id.ordinal(), 42);
        assert_ne!(id, TypeId::new(TypeFamily::Structure, 42));
    }

    #[test]
    fn primitive_families() {
        assert_eq!(INTEGER.family(), TypeFamily::Magic);
        assert_eq!(STRING.family(), TypeFamily::Gc);
        assert!(is_integer(SHORT));
        assert!(is_real(SINGLE));
        assert!(!is_numeric(BOOLEAN));
    }

    #[test]
    fn integer_ranges_nest() {
        let (lo, hi) = integer_range(SHORT).unwrap();
        assert_eq!((lo, hi), (-32768, 32767));
        assert!(integer_range(REAL).is_none());
    }

    #[test]
    fn substitute_replaces_bare_parameters_only() {
        let mut interner = Interner::new();
        let t = interner.intern("T");
        let pair = interner.intern("Pair");
        let loc = TextRange::empty(0.into());
        let mut bindings = FxHashMap::default();
        bindings.insert(t, INTEGER);

        let nested = TypeRef {
            kind: TypeRefKind::Named {
                name: pair,
                args: vec![TypeRef::named(t, loc)],
            },
            loc,
        };
        let out = nested.substitute(&bindings);
        match out.kind {
            TypeRefKind::Named { name, args } => {
                assert_eq!(name, pair);
                assert_eq!(args[0].kind, TypeRefKind::Resolved(INTEGER));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
