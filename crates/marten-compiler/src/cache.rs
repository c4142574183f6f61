//! Per-shape program cache
//!
//! Append-only: an entry, once published, lives for the cache's lifetime
//! and is never mutated. Concurrent callers may each build and publish for
//! the same shape; publication is last-writer-wins, which is sound because
//! every build for a shape is equivalent and immutable.

use std::sync::Arc;

use dashmap::DashMap;
use rustc_hash::FxBuildHasher;

use marten_opcode::{OpcodeSet, ShapeId, ShapeRegistry};

use crate::compiler::compile;
use crate::error::CompileResult;

/// Maps shape identity to its compiled plan, building lazily
#[derive(Debug, Default)]
pub struct ProgramCache {
    sets: DashMap<ShapeId, Arc<OpcodeSet>, FxBuildHasher>,
}

impl ProgramCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the published plan for `shape`, compiling and publishing it
    /// on first observation.
    ///
    /// Compilation happens outside any lock; a racing builder's publish may
    /// be overwritten, and each racer returns its own (equivalent) build.
    pub fn get_or_build(
        &self,
        registry: &ShapeRegistry,
        shape: ShapeId,
    ) -> CompileResult<Arc<OpcodeSet>> {
        if let Some(set) = self.sets.get(&shape) {
            return Ok(set.clone());
        }
        let set = Arc::new(compile(registry, shape)?);
        self.sets.insert(shape, set.clone());
        Ok(set)
    }

    /// Number of published plans
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Whether nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
