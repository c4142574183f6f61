//! Compile errors

use marten_opcode::ShapeId;
use thiserror::Error;

/// Errors raised while lowering a shape to a plan
#[derive(Debug, Error)]
pub enum CompileError {
    /// The shape's value category has no JSON representation
    #[error("unsupported shape: {0}")]
    Unsupported(String),

    /// Map keys must be strings
    #[error("unsupported map key shape: {0}")]
    UnsupportedMapKey(String),

    /// A struct references itself without a pointer or slice in between, so
    /// it has no finite layout
    #[error("recursive shape {0} has no finite layout")]
    InfiniteLayout(String),

    /// Pointer chains beyond the folding limit
    #[error("pointer chain too deep for shape {0}")]
    PointerChainTooDeep(String),

    /// The shape id was declared but never defined
    #[error("shape #{} is declared but never defined", .0.0)]
    Undefined(ShapeId),
}

/// Result type for compilation
pub type CompileResult<T> = std::result::Result<T, CompileError>;
