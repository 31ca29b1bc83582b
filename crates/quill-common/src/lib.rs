//! Shared leaf types for the Quill compiler.
//!
//! Everything above the parser refers to names through [`Symbol`] handles
//! handed out by an [`Interner`] rather than through owned strings.

pub mod intern;

pub use intern::{Interner, Symbol};
