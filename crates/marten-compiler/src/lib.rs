//! # Marten Compiler
//!
//! Lowers shape descriptions into opcode graphs and caches the compiled
//! plans per shape. Compilation happens at most logically once per shape;
//! the published [`marten_opcode::OpcodeSet`] is immutable and shared for
//! the registry's lifetime.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod cache;
pub mod compiler;
pub mod error;

pub use cache::ProgramCache;
pub use compiler::compile;
pub use error::CompileError;
