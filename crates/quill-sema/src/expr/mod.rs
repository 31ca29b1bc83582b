//! Expressions as atom sequences.
//!
//! The parser hands over atoms in source order. The engine coalesces
//! member-access chains into accessor operators, infers a type for every
//! operand and operator, binds operators to overloads and finally reorders
//! the atoms into evaluation (postfix) order.
//!
//! State moves `Uncoalesced -> Coalesced -> InferenceInProgress ->
//! InferenceDone` and never backwards.

mod coalesce;
mod infer;
pub mod precedence;

pub(crate) use infer::concrete_overloads;

use quill_common::Symbol;
use rowan::TextRange;
use rustc_hash::FxHashMap;

use crate::error::SemaResult;
use crate::literal::Literal;
use crate::namespace::{Session, Site};
use crate::statement::Statement;
use crate::ty::{self, TypeId};

/// A name in an expression: a variable, or a function used as a value.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentAtom {
    pub name: Symbol,
    pub loc: TextRange,
    pub(crate) ty: Option<TypeId>,
    /// Mangled name when the identifier denotes a function.
    pub(crate) function: Option<String>,
}

impl IdentAtom {
    pub fn new(name: Symbol, loc: TextRange) -> IdentAtom {
        IdentAtom {
            name,
            loc,
            ty: None,
            function: None,
        }
    }

    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    /// Not yet classified; arity comes from position.
    Pending,
    Binary,
    Unary,
    /// `.` as written; removed by coalescing.
    MemberAccess,
    /// A resolved member accessor applied to the operand before it.
    Accessor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OperatorAtom {
    pub name: Symbol,
    pub loc: TextRange,
    pub kind: OperatorKind,
    pub(crate) resolved: Option<String>,
    pub(crate) ty: Option<TypeId>,
}

impl OperatorAtom {
    pub fn new(name: Symbol, loc: TextRange) -> OperatorAtom {
        OperatorAtom {
            name,
            loc,
            kind: OperatorKind::Pending,
            resolved: None,
            ty: None,
        }
    }

    pub fn member_access(name: Symbol, loc: TextRange) -> OperatorAtom {
        OperatorAtom {
            kind: OperatorKind::MemberAccess,
            ..OperatorAtom::new(name, loc)
        }
    }

    /// Mangled name of the bound overload or accessor.
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Atom {
    Ident(IdentAtom),
    Operator(OperatorAtom),
    Literal(Literal),
    Statement(Box<Statement>),
    Paren(Box<Expression>),
    /// The operand is passed by reference. Engine-generated.
    Reference(IdentAtom),
    /// Tags the value with its runtime type. Engine-generated.
    TypeAnnotation(TypeId),
    /// Body of a synthesized accessor. Engine-generated.
    StructCopy {
        structure: TypeId,
        member: Symbol,
        ty: TypeId,
    },
}

impl Atom {
    pub fn loc(&self) -> Option<TextRange> {
        match self {
            Atom::Ident(id) | Atom::Reference(id) => Some(id.loc),
            Atom::Operator(op) => Some(op.loc),
            Atom::Literal(lit) => Some(lit.loc),
            Atom::Statement(stmt) => Some(stmt.loc),
            Atom::Paren(expr) => Some(expr.loc),
            Atom::TypeAnnotation(_) | Atom::StructCopy { .. } => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExprState {
    Uncoalesced,
    Coalesced,
    InferenceInProgress,
    InferenceDone,
}

/// Where a statement or expression is being inferred.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatementContext {
    /// The return expression of a function.
    Return,
    Expression,
    /// An argument of an enclosing statement.
    Parameter,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub atoms: Vec<Atom>,
    pub loc: TextRange,
    pub(crate) state: ExprState,
    pub(crate) recursion_detected: bool,
    pub(crate) ty: Option<TypeId>,
    pub(crate) ok: bool,
    /// Mangled name when the whole expression denotes one function.
    pub(crate) function_ref: Option<String>,
    pub(crate) coalesce_passes: u32,
    pub(crate) coalesce_ok: bool,
    pub(crate) compile_time_done: bool,
}

impl Expression {
    pub fn new(atoms: Vec<Atom>, loc: TextRange) -> Expression {
        Expression {
            atoms,
            loc,
            state: ExprState::Uncoalesced,
            recursion_detected: false,
            ty: None,
            ok: false,
            function_ref: None,
            coalesce_passes: 0,
            coalesce_ok: true,
            compile_time_done: false,
        }
    }

    /// An already inferred single-atom expression.
    pub(crate) fn marker(atom: Atom, ty: TypeId, loc: TextRange) -> Expression {
        Expression {
            state: ExprState::InferenceDone,
            ty: Some(ty),
            ok: true,
            compile_time_done: true,
            ..Expression::new(vec![atom], loc)
        }
    }

    pub fn ty(&self) -> Option<TypeId> {
        self.ty
    }

    pub fn state(&self) -> ExprState {
        self.state
    }

    pub fn recursion_detected(&self) -> bool {
        self.recursion_detected
    }

    pub fn function_ref(&self) -> Option<&str> {
        self.function_ref.as_deref()
    }

    pub fn coalesce_passes(&self) -> u32 {
        self.coalesce_passes
    }

    pub(crate) fn single_literal_mut(&mut self) -> Option<&mut Literal> {
        match self.atoms.as_mut_slice() {
            [Atom::Literal(lit)] => Some(lit),
            _ => None,
        }
    }

    pub fn bare_literal(&self) -> Option<&Literal> {
        match self.atoms.as_slice() {
            [Atom::Literal(lit)] => Some(lit),
            _ => None,
        }
    }

    pub fn bare_ident(&self) -> Option<&IdentAtom> {
        match self.atoms.as_slice() {
            [Atom::Ident(id)] | [Atom::Reference(id)] => Some(id),
            _ => None,
        }
    }

    /// Treat a bare identifier as the name of a variable being declared.
    pub(crate) fn mark_identifier(&mut self) {
        if let [Atom::Ident(id)] = self.atoms.as_mut_slice() {
            id.ty = Some(ty::IDENTIFIER);
        }
        self.ty = Some(ty::IDENTIFIER);
        self.ok = true;
        self.state = ExprState::InferenceDone;
    }

    /// Bind this expression to a function value.
    pub(crate) fn bind_function(&mut self, mangled: String, signature: TypeId) {
        if let [Atom::Ident(id)] = self.atoms.as_mut_slice() {
            id.function = Some(mangled.clone());
            id.ty = Some(signature);
        }
        self.function_ref = Some(mangled);
        self.ty = Some(signature);
        self.ok = true;
    }

    /// A variable, optionally followed by accessor links.
    pub fn is_lvalue(&self) -> bool {
        let mut atoms = self.atoms.iter();
        let head = match atoms.next() {
            Some(Atom::Ident(id)) | Some(Atom::Reference(id)) => id.function.is_none(),
            _ => false,
        };
        head && atoms.all(|a| {
            matches!(a, Atom::Operator(op) if op.kind == OperatorKind::Accessor)
                || matches!(a, Atom::TypeAnnotation(_))
        })
    }

    /// Turn the head variable into a reference marker. Fails on
    /// non-lvalues.
    pub(crate) fn bind_reference(&mut self) -> bool {
        if !self.is_lvalue() {
            return false;
        }
        if let Some(Atom::Ident(id)) = self.atoms.first() {
            let id = id.clone();
            self.atoms[0] = Atom::Reference(id);
        }
        true
    }

    /// Whether inference finished and every atom is bound.
    pub fn is_resolved(&self) -> bool {
        if self.state != ExprState::InferenceDone || !self.ok || self.ty.is_none() {
            return false;
        }
        self.atoms.iter().all(|a| match a {
            Atom::Operator(op) => op.kind != OperatorKind::MemberAccess && op.resolved.is_some(),
            Atom::Statement(stmt) => stmt.is_resolved(),
            Atom::Paren(expr) => expr.is_resolved(),
            Atom::Ident(id) | Atom::Reference(id) => id.ty.is_some(),
            _ => true,
        })
    }

    /// Run compile-time effects of nested statements, once.
    pub fn run_compile_time_pass(&mut self, sess: &mut Session, site: Site) -> SemaResult<()> {
        if self.compile_time_done {
            return Ok(());
        }
        self.compile_time_done = true;
        for atom in &mut self.atoms {
            match atom {
                Atom::Statement(stmt) => stmt.run_compile_time_pass(sess, site)?,
                Atom::Paren(expr) => expr.run_compile_time_pass(sess, site)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// A fresh copy with template parameters bound in nested statements.
    pub(crate) fn substitute(&self, bindings: &FxHashMap<Symbol, TypeId>) -> Expression {
        let atoms = self
            .atoms
            .iter()
            .map(|a| match a {
                Atom::Statement(stmt) => Atom::Statement(Box::new(stmt.substitute(bindings))),
                Atom::Paren(expr) => Atom::Paren(Box::new(expr.substitute(bindings))),
                other => other.clone(),
            })
            .collect();
        Expression::new(atoms, self.loc)
    }
}
