//! Quill semantic analysis: name and overload resolution, type inference,
//! structural and sum-type reasoning and template instantiation.
//!
//! The parser builds the IR (functions, type declarations and the main
//! block) into a [`Session`]. [`Session::check`] then runs the three passes
//! over the whole unit:
//!
//! 1. the compile-time pass, which synthesizes constructors and accessors,
//!    declares variables named by constructor calls and instantiates
//!    templates requested with explicit arguments;
//! 2. type inference, which resolves every expression and statement and
//!    drains the queue of pending template instances;
//! 3. validation, which checks that every node reached a resolved state.
//!
//! Semantic errors accumulate in [`Session::diagnostics`]; internal faults
//! abort with an [`InternalError`].
//!
//! # Architecture
//!
//! - [`ty`], [`type_space`]: type identities and the registry of named types
//! - [`structure`], [`sum_type`], [`template`]: declarations and what they
//!   synthesize
//! - [`function`], [`function_table`]: overloads, their passes and the
//!   generated dispatchers
//! - [`expr`], [`statement`], [`assignment`], [`code_block`]: the IR nodes
//!   and their inference
//! - [`namespace`], [`scope`]: lookup contexts
//! - [`export`]: the view handed to code generation

pub mod assignment;
pub mod build;
mod builtins;
pub mod code_block;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod expr;
pub mod function;
pub mod function_table;
pub mod literal;
pub mod namespace;
pub mod scope;
pub mod statement;
pub mod structure;
pub mod sum_type;
pub mod template;
pub mod ty;
pub mod type_space;

pub use code_block::{BlockEntry, CodeBlock, Fixity};
pub use config::SemaConfig;
pub use error::{InternalError, SemaResult, SemanticError, SemanticErrorKind};
pub use expr::{Atom, Expression};
pub use function::{Function, FunctionId};
pub use namespace::{NamespaceId, Session, Site, ROOT};
pub use statement::Statement;
pub use ty::{TypeId, TypeRef};
