//! Shape descriptions and the shape registry
//!
//! A shape is the compiler's input: a structural description of one data
//! layout. The registry interns shapes and hands out the stable [`ShapeId`]s
//! that key the program cache.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::operand::ShapeId;

/// One struct field: name, fixed word offset, value shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// JSON key (unused for embedded fields)
    pub name: Box<str>,
    /// Word offset of the field value inside the struct
    pub offset: u32,
    /// Shape of the field value
    pub shape: ShapeId,
    /// Skip the field when its value is the shape's empty value
    pub omit_empty: bool,
    /// Embedded by-value struct whose fields flatten into the parent's
    /// key space
    pub embedded: bool,
}

impl Field {
    /// Create a field with `omit_empty` off
    pub fn new(name: impl Into<Box<str>>, offset: u32, shape: ShapeId) -> Self {
        Self {
            name: name.into(),
            offset,
            shape,
            omit_empty: false,
            embedded: false,
        }
    }

    /// Create a field that is skipped when empty
    pub fn omit_empty(name: impl Into<Box<str>>, offset: u32, shape: ShapeId) -> Self {
        Self {
            name: name.into(),
            offset,
            shape,
            omit_empty: true,
            embedded: false,
        }
    }

    /// Create an embedded field: the struct at `offset` contributes its
    /// fields directly to the enclosing object
    pub fn embedded(offset: u32, shape: ShapeId) -> Self {
        Self {
            name: "".into(),
            offset,
            shape,
            omit_empty: false,
            embedded: true,
        }
    }
}

/// Structural description of one data layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Signed integer with the given bit width (8/16/32/64)
    Int {
        /// Bit width
        bits: u8,
    },
    /// Unsigned integer with the given bit width (8/16/32/64)
    Uint {
        /// Bit width
        bits: u8,
    },
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Boolean
    Bool,
    /// UTF-8 string (one word holding a string handle)
    String,
    /// Byte slice, emitted as a base64 string token
    Bytes,
    /// Always the `null` literal (the dynamic model's typed null)
    Null,
    /// Pointer to a value of another shape (word 0 is null)
    Ptr {
        /// Pointee shape
        elem: ShapeId,
    },
    /// Struct with a fixed field layout
    Struct {
        /// Type name, used for diagnostics and error context
        name: Box<str>,
        /// Fields in declaration order
        fields: Vec<Field>,
    },
    /// Growable sequence of one element shape
    Slice {
        /// Element shape
        elem: ShapeId,
    },
    /// Associative container iterated in delivery order
    Map {
        /// Key shape (must be `String`)
        key: ShapeId,
        /// Value shape
        value: ShapeId,
    },
    /// Caller-supplied value-to-JSON converter
    MarshalJson {
        /// Type name for error context
        name: Box<str>,
    },
    /// Caller-supplied value-to-text converter, emitted as a string token
    MarshalText {
        /// Type name for error context
        name: Box<str>,
    },
    /// Host value category with no JSON representation
    Opaque {
        /// Type name for error context
        name: Box<str>,
    },
}

/// Interns shapes and assigns stable identifiers.
///
/// Structurally identical shapes intern to the same id. Recursive shapes are
/// built in two steps: [`ShapeRegistry::declare`] reserves an id the shape
/// may reference, [`ShapeRegistry::define`] fills it in.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: Vec<Option<Shape>>,
    interned: FxHashMap<Shape, ShapeId>,
}

impl ShapeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a shape, returning the id of the structurally identical shape
    /// if one was interned before
    pub fn intern(&mut self, shape: Shape) -> ShapeId {
        if let Some(&id) = self.interned.get(&shape) {
            return id;
        }
        let id = ShapeId::new(self.shapes.len() as u32);
        self.shapes.push(Some(shape.clone()));
        self.interned.insert(shape, id);
        id
    }

    /// Reserve an id for a shape that will reference itself
    pub fn declare(&mut self) -> ShapeId {
        let id = ShapeId::new(self.shapes.len() as u32);
        self.shapes.push(None);
        id
    }

    /// Define a previously declared shape.
    ///
    /// Declared shapes are not structurally interned; their identity is the
    /// declared id.
    pub fn define(&mut self, id: ShapeId, shape: Shape) {
        if let Some(entry) = self.shapes.get_mut(id.index()) {
            *entry = Some(shape);
        }
    }

    /// Look up a shape by id (`None` for unknown or declared-but-undefined)
    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.index()).and_then(|s| s.as_ref())
    }

    /// Number of registered shapes
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Descriptive name of a shape, for diagnostics and error context
    pub fn describe(&self, id: ShapeId) -> String {
        self.describe_depth(id, 0)
    }

    fn describe_depth(&self, id: ShapeId, depth: u32) -> String {
        if depth > 8 {
            return "…".to_string();
        }
        let Some(shape) = self.get(id) else {
            return format!("<undefined #{}>", id.0);
        };
        match shape {
            Shape::Int { bits } => format!("i{bits}"),
            Shape::Uint { bits } => format!("u{bits}"),
            Shape::Float32 => "f32".to_string(),
            Shape::Float64 => "f64".to_string(),
            Shape::Bool => "bool".to_string(),
            Shape::String => "String".to_string(),
            Shape::Bytes => "Vec<u8>".to_string(),
            Shape::Null => "null".to_string(),
            Shape::Ptr { elem } => format!("*{}", self.describe_depth(*elem, depth + 1)),
            Shape::Struct { name, .. } => name.to_string(),
            Shape::Slice { elem } => format!("Vec<{}>", self.describe_depth(*elem, depth + 1)),
            Shape::Map { key, value } => format!(
                "Map<{}, {}>",
                self.describe_depth(*key, depth + 1),
                self.describe_depth(*value, depth + 1)
            ),
            Shape::MarshalJson { name } | Shape::MarshalText { name } | Shape::Opaque { name } => {
                name.to_string()
            }
        }
    }

    /// Size of a value of this shape in words, or `None` for undefined
    /// shapes and by-value self-references (which have no finite layout)
    pub fn word_size(&self, id: ShapeId) -> Option<u32> {
        self.word_size_inner(id, &mut Vec::new())
    }

    fn word_size_inner(&self, id: ShapeId, visiting: &mut Vec<ShapeId>) -> Option<u32> {
        if visiting.contains(&id) {
            return None;
        }
        match self.get(id)? {
            Shape::Struct { fields, .. } => {
                visiting.push(id);
                let mut size = 0;
                for field in fields {
                    let fsize = self.word_size_inner(field.shape, visiting)?;
                    size = size.max(field.offset + fsize);
                }
                visiting.pop();
                Some(size)
            }
            // Everything else is one word: a scalar or a handle
            _ => Some(1),
        }
    }
}
