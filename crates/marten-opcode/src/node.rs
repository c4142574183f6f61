//! Opcode nodes
//!
//! One node is one execution step of a compiled plan. Nodes live in the
//! graph arena and point at each other through `next` (normal continuation)
//! and `alt` (nil/empty/loop-exit branch).

use serde::{Deserialize, Serialize};

use crate::operand::{OpId, ShapeId, SlotId, WordOffset};

/// Opcode kinds
///
/// Scalar emitters read `base + offset` and append one token. Container
/// kinds drive the begin/loop/end control flow; `Recurse`/`RecurseEnd`
/// replace a native call stack with register-file frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// Designated end marker of a plan
    End,
    /// Emit a signed integer read at `base + offset`
    EmitInt,
    /// Emit an unsigned integer read at `base + offset`
    EmitUint,
    /// Emit a 32-bit float read at `base + offset`
    EmitFloat32,
    /// Emit a 64-bit float read at `base + offset`
    EmitFloat64,
    /// Emit a boolean read at `base + offset`
    EmitBool,
    /// Emit a string read at `base + offset`
    EmitString,
    /// Emit a byte slice read at `base + offset` as a base64 string token
    EmitBytes,
    /// Emit the `null` literal
    EmitNull,
    /// Invoke a caller-supplied value-to-JSON converter and splice its output
    EmitMarshalJson,
    /// Invoke a caller-supplied value-to-text converter and emit a string token
    EmitMarshalText,
    /// Dereference a pointer chain; null anywhere takes `alt`
    NilCheck,
    /// Open an object for a struct value
    StructHead,
    /// Emit one struct field key; `alt` skips the field when `omit_empty`
    StructField,
    /// Close a struct object
    StructEnd,
    /// Open an array; nil/empty collections exit through `alt`
    SliceHead,
    /// Advance the element loop; exhausted exits through `alt`
    SliceElem,
    /// Close an array
    SliceEnd,
    /// Acquire a map iteration handle; nil/empty maps exit through `alt`
    MapHead,
    /// Position on the next map key; exhausted exits through `alt`
    MapKey,
    /// Position on the current map value and advance the iterator
    MapValue,
    /// Close a map object
    MapEnd,
    /// Descend into a nested plan for a self-referential shape (`alt` is the
    /// nested entry; caller state is saved in a fresh register-file frame)
    Recurse,
    /// Return from a nested plan to the saved opcode
    RecurseEnd,
}

impl OpKind {
    /// Get the name of this opcode kind
    pub const fn name(self) -> &'static str {
        match self {
            Self::End => "End",
            Self::EmitInt => "EmitInt",
            Self::EmitUint => "EmitUint",
            Self::EmitFloat32 => "EmitFloat32",
            Self::EmitFloat64 => "EmitFloat64",
            Self::EmitBool => "EmitBool",
            Self::EmitString => "EmitString",
            Self::EmitBytes => "EmitBytes",
            Self::EmitNull => "EmitNull",
            Self::EmitMarshalJson => "EmitMarshalJson",
            Self::EmitMarshalText => "EmitMarshalText",
            Self::NilCheck => "NilCheck",
            Self::StructHead => "StructHead",
            Self::StructField => "StructField",
            Self::StructEnd => "StructEnd",
            Self::SliceHead => "SliceHead",
            Self::SliceElem => "SliceElem",
            Self::SliceEnd => "SliceEnd",
            Self::MapHead => "MapHead",
            Self::MapKey => "MapKey",
            Self::MapValue => "MapValue",
            Self::MapEnd => "MapEnd",
            Self::Recurse => "Recurse",
            Self::RecurseEnd => "RecurseEnd",
        }
    }
}

/// Emptiness classification of an `omit_empty` struct field, fixed at
/// compile time so the interpreter never inspects the shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyCheck {
    /// Field is never skipped
    #[default]
    None,
    /// Empty when the word is zero (integers, bools, pointers, handles)
    Word,
    /// Empty when the word decodes to `0.0f32`
    Float32,
    /// Empty when the word decodes to `0.0f64`
    Float64,
    /// Empty when the string is empty
    Str,
    /// Empty when the byte slice is nil or empty
    Bytes,
    /// Empty when the slice is nil or has length zero
    Slice,
    /// Empty when the map is nil or has length zero
    Map,
}

/// One execution step of a compiled plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opcode {
    /// Operation kind
    pub kind: OpKind,
    /// Normal continuation
    pub next: OpId,
    /// Branch target for nil/empty/loop-exit (or the nested entry, for
    /// `Recurse`)
    pub alt: OpId,
    /// Register slot holding this level's base address
    pub base: SlotId,
    /// Word offset from the base address, fixed at compile time
    pub offset: WordOffset,
    /// Assigned register slot for loop/iterator/frame state
    pub slot: SlotId,
    /// Static nesting depth, drives indentation
    pub depth: u32,
    /// Declared scalar bit width (8/16/32/64)
    pub bits: u8,
    /// Pointer dereference count for `NilCheck`
    pub deref: u8,
    /// Element stride in words (`SliceElem`) or callee frame size (`Recurse`)
    pub size: u32,
    /// Skip this field when its value is empty (`StructField`)
    pub omit_empty: bool,
    /// How to decide emptiness for `omit_empty`
    pub empty: EmptyCheck,
    /// Pre-rendered quoted key token (`StructField`), or the shape name for
    /// diagnostics (`Recurse`, `EmitMarshal*`)
    pub key: Option<Box<str>>,
    /// Shape this opcode belongs to, for diagnostics
    pub shape: ShapeId,
}

impl Opcode {
    /// Create a node of the given kind with no edges and default fields
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            next: OpId::NONE,
            alt: OpId::NONE,
            base: SlotId::NONE,
            offset: WordOffset::ZERO,
            slot: SlotId::NONE,
            depth: 0,
            bits: 0,
            deref: 0,
            size: 0,
            omit_empty: false,
            empty: EmptyCheck::None,
            key: None,
            shape: ShapeId::NONE,
        }
    }
}
