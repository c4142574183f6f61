//! Dynamic value model
//!
//! A convenience carrier for values whose layout is not described ahead of
//! time: the engine infers a shape from the value's structure and lowers it
//! into a fresh heap. Structurally identical values share one shape id, so
//! repeated encodes of the same structure reuse the compiled plan.

use indexmap::IndexMap;

use marten_opcode::{Shape, ShapeId, ShapeRegistry};
use marten_vm::{Addr, EncodeError, EncodeResult, ValueHeap};

/// A dynamic JSON value.
///
/// Objects keep insertion order — encoding delivers keys exactly in the
/// order they were inserted.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// The `null` literal
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// 64-bit float
    Float(f64),
    /// String
    Str(String),
    /// Binary data, encoded as a base64 string token
    Bytes(Vec<u8>),
    /// Array of values sharing one shape
    Array(Vec<JsonValue>),
    /// Object with insertion-ordered keys
    Object(IndexMap<String, JsonValue>),
}

impl From<bool> for JsonValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for JsonValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for JsonValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for JsonValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl JsonValue {
    /// Build an object from key/value pairs, preserving their order
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, JsonValue)>,
    {
        Self::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build an array
    pub fn array<I: IntoIterator<Item = JsonValue>>(items: I) -> Self {
        Self::Array(items.into_iter().collect())
    }
}

/// Infer and intern the shape of a dynamic value.
///
/// Containers must be homogeneous: an array (or object value set) mixing
/// shapes has no single element plan and is rejected as an unsupported
/// value. Empty containers fall back to the null element shape.
pub(crate) fn shape_of(
    value: &JsonValue,
    registry: &mut ShapeRegistry,
) -> EncodeResult<ShapeId> {
    Ok(match value {
        JsonValue::Null => registry.intern(Shape::Null),
        JsonValue::Bool(_) => registry.intern(Shape::Bool),
        JsonValue::Int(_) => registry.intern(Shape::Int { bits: 64 }),
        JsonValue::Uint(_) => registry.intern(Shape::Uint { bits: 64 }),
        JsonValue::Float(_) => registry.intern(Shape::Float64),
        JsonValue::Str(_) => registry.intern(Shape::String),
        JsonValue::Bytes(_) => registry.intern(Shape::Bytes),
        JsonValue::Array(items) => {
            let elem = unify(items.iter(), registry, "array")?;
            registry.intern(Shape::Slice { elem })
        }
        JsonValue::Object(entries) => {
            let value = unify(entries.values(), registry, "object")?;
            let key = registry.intern(Shape::String);
            registry.intern(Shape::Map { key, value })
        }
    })
}

fn unify<'v>(
    items: impl Iterator<Item = &'v JsonValue>,
    registry: &mut ShapeRegistry,
    what: &str,
) -> EncodeResult<ShapeId> {
    let mut elem = None;
    for item in items {
        let sh = shape_of(item, registry)?;
        match elem {
            None => elem = Some(sh),
            Some(prev) if prev == sh => {}
            Some(_) => {
                return Err(EncodeError::unsupported(
                    what,
                    "elements of mixed shapes have no single plan",
                ));
            }
        }
    }
    Ok(elem.unwrap_or_else(|| registry.intern(Shape::Null)))
}

/// Lower a dynamic value into its one-word representation at `addr`.
///
/// Every dynamic value occupies exactly one word: scalars inline, the rest
/// as handles. Arrays lower into contiguous element words.
pub(crate) fn lower_into(value: &JsonValue, heap: &mut ValueHeap, addr: Addr) {
    match value {
        JsonValue::Null => heap.set_word(addr, 0),
        JsonValue::Bool(v) => heap.put_bool(addr, *v),
        JsonValue::Int(v) => heap.put_int(addr, *v),
        JsonValue::Uint(v) => heap.put_uint(addr, *v),
        JsonValue::Float(v) => heap.put_f64(addr, *v),
        JsonValue::Str(v) => heap.put_str(addr, v.as_str()),
        JsonValue::Bytes(v) => heap.put_bytes(addr, v.clone()),
        JsonValue::Array(items) => {
            let base = heap.alloc(items.len() as u32);
            for (i, item) in items.iter().enumerate() {
                lower_into(item, heap, base.offset(i as u32));
            }
            heap.put_slice(addr, base, items.len() as u32);
        }
        JsonValue::Object(entries) => {
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let kv = heap.alloc(2);
                heap.put_str(kv, key.as_str());
                lower_into(value, heap, kv.offset(1));
                pairs.push((kv, kv.offset(1)));
            }
            heap.put_map(addr, pairs);
        }
    }
}
