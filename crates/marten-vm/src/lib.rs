//! # Marten VM
//!
//! Execution engine for compiled Marten JSON plans. One shared interpreter
//! walks the opcode graph; four interchangeable emission strategies (plain,
//! indented, colorized, colorized+indented) turn tokens into bytes.
//!
//! ## Design Principles
//!
//! - **Compile once, run many**: all layout decisions live in the plan; the
//!   run loop only reads words and appends bytes
//! - **Iterative**: a register file replaces native recursion, so deeply
//!   nested and self-referential shapes execute without growing the stack
//! - **Faults are values**: internal invariant violations travel as tagged
//!   errors through the ordinary result channel, never as panics

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod color;
pub mod context;
pub mod debug;
pub mod error;
pub mod heap;
pub mod option;

mod emit;
mod interp;
mod strategy;

pub use color::{ColorFormat, ColorScheme};
pub use context::RuntimeContext;
pub use debug::debug_run;
pub use error::{EncodeError, EncodeResult, InvariantFault};
pub use heap::{Addr, Converter, MapIter, SliceRep, ValueHeap};
pub use interp::execute;
pub use option::EncodeOption;
