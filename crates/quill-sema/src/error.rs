//! Semantic errors and internal faults.
//!
//! Two disjoint classes. A [`SemanticError`] is attributable to the user's
//! program: it is reported through the diagnostics sink, accumulates, and
//! lets the pass continue. An [`InternalError`] means an earlier phase
//! (naming, mangling, registration) produced an inconsistent IR; it is
//! propagated as `Err` and aborts the compilation.

use std::fmt;

use rowan::TextRange;

use crate::ty::TypeId;

/// What a rejected variable name collided with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadowKind {
    Variable,
    Type,
    Function,
}

impl fmt::Display for ShadowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowKind::Variable => write!(f, "variable"),
            ShadowKind::Type => write!(f, "type"),
            ShadowKind::Function => write!(f, "function"),
        }
    }
}

/// The specific kind of a user-facing semantic error.
#[derive(Clone, Debug, PartialEq)]
pub enum SemanticErrorKind {
    /// A type, member or parameter name is declared twice.
    DuplicateName { name: String, what: &'static str },
    /// A name is not bound to any variable, function or type.
    UnresolvedIdentifier { name: String },
    /// A type reference does not resolve.
    UnknownType { name: String },
    /// A member access names a member the structure does not have.
    UnknownMember { ty: String, member: String },
    /// No overload of `name` accepts the argument types.
    NoMatchingOverload { name: String, args: Vec<String> },
    /// More than one overload of `name` is equally good.
    AmbiguousOverload { name: String, candidates: Vec<String> },
    TypeMismatch { expected: String, found: String },
    /// A sum-typed argument cannot be dispatched: some base-type
    /// permutations have no overload.
    MissingSumDecomposition { name: String, missing: Vec<String> },
    /// A type template was declared but never instantiated.
    TemplateNeverInstantiated { name: String },
    TemplateArity {
        name: String,
        expected: usize,
        found: usize,
    },
    /// A template argument does not satisfy the parameter's kind.
    TemplateArgumentKind {
        name: String,
        param: String,
        found: String,
    },
    /// Template arguments were supplied to something that is not a template.
    NotATemplate { name: String },
    /// A template was used as a type without arguments.
    MissingTemplateArguments { name: String },
    TemplateDepthExceeded { name: String, depth: u32 },
    /// A variable declaration collides with a visible name.
    ShadowedName { name: String, shadows: ShadowKind },
    /// A recursive call needs a return type that is still being inferred.
    RecursiveInference { name: String },
    /// The target of an assignment or increment is not assignable.
    NotAnLvalue,
    /// An operator has no overload of the arity its position requires.
    InvalidOperator { name: String, arity: usize },
    /// A value that is not a function is invoked.
    NotCallable { name: String, ty: String },
}

impl fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticErrorKind::DuplicateName { name, what } => {
                write!(f, "duplicate {} `{}`", what, name)
            }
            SemanticErrorKind::UnresolvedIdentifier { name } => {
                write!(f, "unresolved identifier `{}`", name)
            }
            SemanticErrorKind::UnknownType { name } => write!(f, "unknown type `{}`", name),
            SemanticErrorKind::UnknownMember { ty, member } => {
                write!(f, "type `{}` has no member `{}`", ty, member)
            }
            SemanticErrorKind::NoMatchingOverload { name, args } => {
                write!(
                    f,
                    "no matching overload for `{}({})`",
                    name,
                    args.join(", ")
                )
            }
            SemanticErrorKind::AmbiguousOverload { name, candidates } => {
                write!(
                    f,
                    "ambiguous overload for `{}`: candidates [{}]",
                    name,
                    candidates.join(", ")
                )
            }
            SemanticErrorKind::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected `{}`, found `{}`", expected, found)
            }
            SemanticErrorKind::MissingSumDecomposition { name, missing } => {
                write!(
                    f,
                    "missing overload for sum type decomposition of `{}`: [{}]",
                    name,
                    missing.join(", ")
                )
            }
            SemanticErrorKind::TemplateNeverInstantiated { name } => {
                write!(f, "template `{}` is never instantiated", name)
            }
            SemanticErrorKind::TemplateArity {
                name,
                expected,
                found,
            } => write!(
                f,
                "template `{}` expects {} argument(s), found {}",
                name, expected, found
            ),
            SemanticErrorKind::TemplateArgumentKind { name, param, found } => write!(
                f,
                "template argument `{}` for parameter `{}` of `{}` must be a sum type",
                found, param, name
            ),
            SemanticErrorKind::NotATemplate { name } => {
                write!(f, "`{}` is not a template", name)
            }
            SemanticErrorKind::MissingTemplateArguments { name } => {
                write!(f, "template `{}` used without arguments", name)
            }
            SemanticErrorKind::TemplateDepthExceeded { name, depth } => write!(
                f,
                "instantiating `{}` exceeds the template depth limit of {}",
                name, depth
            ),
            SemanticErrorKind::ShadowedName { name, shadows } => {
                write!(f, "`{}` shadows a visible {}", name, shadows)
            }
            SemanticErrorKind::RecursiveInference { name } => write!(
                f,
                "cannot infer the return type of `{}` from a recursive call",
                name
            ),
            SemanticErrorKind::NotAnLvalue => write!(f, "expression is not assignable"),
            SemanticErrorKind::InvalidOperator { name, arity } => write!(
                f,
                "operator `{}` has no overload taking {} operand(s)",
                name, arity
            ),
            SemanticErrorKind::NotCallable { name, ty } => {
                write!(f, "`{}` of type `{}` is not callable", name, ty)
            }
        }
    }
}

/// A user-facing semantic error with its source context.
#[derive(Clone, Debug, PartialEq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    /// The diagnostics context active when the error was reported.
    pub loc: Option<TextRange>,
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for SemanticError {}

/// A compiler-internal consistency fault. Never caused by user input.
#[derive(Clone, Debug, PartialEq)]
pub enum InternalError {
    /// A function handle or mangled name has no backing definition.
    UnknownFunction { name: String },
    /// A type identity has no registered name.
    UnnamedType(TypeId),
    /// A structure member that was resolved earlier has disappeared.
    MissingMember { structure: String, member: String },
    /// Two registrations produced the same mangled name.
    DuplicateMangledName { name: String },
    UnknownScope(u32),
    UnknownNamespace(u32),
    /// The atom sequence handed over by the parser is not well formed.
    MalformedExpression(&'static str),
    /// Member-access coalescing did not converge.
    CoalesceLimit { passes: u32 },
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalError::UnknownFunction { name } => {
                write!(f, "internal error: no definition for function `{}`", name)
            }
            InternalError::UnnamedType(id) => {
                write!(f, "internal error: type {} has no registered name", id)
            }
            InternalError::MissingMember { structure, member } => write!(
                f,
                "internal error: structure `{}` lost member `{}`",
                structure, member
            ),
            InternalError::DuplicateMangledName { name } => {
                write!(f, "internal error: mangled name `{}` registered twice", name)
            }
            InternalError::UnknownScope(id) => write!(f, "internal error: unknown scope {}", id),
            InternalError::UnknownNamespace(id) => {
                write!(f, "internal error: unknown namespace {}", id)
            }
            InternalError::MalformedExpression(reason) => {
                write!(f, "internal error: malformed expression: {}", reason)
            }
            InternalError::CoalesceLimit { passes } => write!(
                f,
                "internal error: member access coalescing did not converge after {} passes",
                passes
            ),
        }
    }
}

impl std::error::Error for InternalError {}

/// Result of any pass: `Err` only for internal faults.
pub type SemaResult<T> = Result<T, InternalError>;
