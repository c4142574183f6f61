//! # Marten Engine
//!
//! Public surface of the Marten JSON engine. The engine owns the shape
//! registry and the program cache; callers describe a value's layout once,
//! then encode values of that layout repeatedly against the compiled plan.
//!
//! ```ignore
//! let engine = Engine::new();
//! let bytes = engine.encode_value(&JsonValue::Float(0.1), EncodeOption::new())?;
//! assert_eq!(bytes, b"0.1");
//! ```

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod stream;
pub mod value;

use std::sync::Arc;

use parking_lot::RwLock;

use marten_compiler::ProgramCache;
use marten_vm::{debug_run, execute};

// Plan and VM types re-exported for convenience
pub use marten_opcode::{
    Field, OpId, OpKind, Opcode, OpcodeGraph, OpcodeSet, Shape, ShapeId, ShapeRegistry,
};
pub use marten_vm::{
    Addr, ColorFormat, ColorScheme, Converter, EncodeError, EncodeOption, EncodeResult,
    InvariantFault, RuntimeContext, SliceRep, ValueHeap,
};
pub use stream::Encoder;
pub use value::JsonValue;

/// The engine: shape registry plus program cache.
///
/// Encode calls are independent and may run concurrently; the only shared
/// state is the append-only cache and the interning registry.
#[derive(Debug, Default)]
pub struct Engine {
    registry: RwLock<ShapeRegistry>,
    cache: ProgramCache,
}

impl Engine {
    /// Create an engine with an empty registry and cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a shape description
    pub fn shape(&self, shape: Shape) -> ShapeId {
        self.registry.write().intern(shape)
    }

    /// Reserve an id for a self-referential shape
    pub fn declare(&self) -> ShapeId {
        self.registry.write().declare()
    }

    /// Define a previously declared shape
    pub fn define(&self, id: ShapeId, shape: Shape) {
        self.registry.write().define(id, shape);
    }

    /// Descriptive name of a shape
    pub fn describe(&self, id: ShapeId) -> String {
        self.registry.read().describe(id)
    }

    /// The compiled plan for a shape, building and publishing on first use
    pub fn plan(&self, shape: ShapeId) -> EncodeResult<Arc<OpcodeSet>> {
        let registry = self.registry.read();
        self.cache
            .get_or_build(&registry, shape)
            .map_err(|err| EncodeError::unsupported(registry.describe(shape), err.to_string()))
    }

    /// Encode the value at `base` in `heap`, laid out as `shape`
    pub fn encode(
        &self,
        heap: &ValueHeap,
        base: Addr,
        shape: ShapeId,
        option: EncodeOption,
    ) -> EncodeResult<Vec<u8>> {
        let set = self.plan(shape)?;
        let mut ctx = RuntimeContext::new(base, option);
        execute(&mut ctx, heap, &set)
    }

    /// Encode through the diagnostic wrapper, honoring the option's sinks
    pub fn debug_encode(
        &self,
        heap: &ValueHeap,
        base: Addr,
        shape: ShapeId,
        option: EncodeOption,
    ) -> EncodeResult<Vec<u8>> {
        let set = self.plan(shape)?;
        let mut ctx = RuntimeContext::new(base, option);
        debug_run(&mut ctx, heap, &set)
    }

    /// Encode a dynamic value: infer its shape, lower it into a fresh heap,
    /// then run the (cached) plan for that shape
    pub fn encode_value(
        &self,
        value: &JsonValue,
        option: EncodeOption,
    ) -> EncodeResult<Vec<u8>> {
        let shape = {
            let mut registry = self.registry.write();
            value::shape_of(value, &mut registry)?
        };
        let mut heap = ValueHeap::new();
        let base = heap.alloc(1);
        value::lower_into(value, &mut heap, base);
        self.encode(&heap, base, shape, option)
    }
}
