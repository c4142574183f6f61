//! Emission strategies
//!
//! Four interchangeable token-append backends behind one trait. The
//! interpreter is generic over the strategy and never knows which is
//! active; selection happens once per call from the option flags.
//!
//! All four share one separator discipline: every completed value leaves a
//! trailing element separator ("," compact, ",\n" indented) in the buffer.
//! Closers rewind past it before the bracket, key separators rewrite it
//! into a colon, and the entry point strips the final one. The rewind
//! methods return `false` when the expected tail is missing, which the
//! interpreter reports as an invariant fault.

use marten_opcode::{Opcode, token};

use crate::color::{ColorFormat, ColorScheme};
use crate::context::RuntimeContext;
use crate::emit;
use crate::error::EncodeResult;

/// Token-append function set one interpreter run is parameterized with
pub(crate) trait Emitter {
    /// Element separator after a completed value
    fn append_separator(ctx: &mut RuntimeContext);
    /// Signed integer token
    fn append_int(ctx: &mut RuntimeContext, v: i64);
    /// Unsigned integer token
    fn append_uint(ctx: &mut RuntimeContext, v: u64);
    /// 32-bit float token
    fn append_float32(ctx: &mut RuntimeContext, v: f32) -> EncodeResult<()>;
    /// 64-bit float token
    fn append_float64(ctx: &mut RuntimeContext, v: f64) -> EncodeResult<()>;
    /// String token
    fn append_string(ctx: &mut RuntimeContext, s: &str);
    /// Base64 binary token
    fn append_bytes(ctx: &mut RuntimeContext, b: &[u8]);
    /// Boolean token
    fn append_bool(ctx: &mut RuntimeContext, v: bool);
    /// The `null` literal
    fn append_null(ctx: &mut RuntimeContext);
    /// Rewind the key's trailing separator into a key/value colon
    fn append_key_separator(ctx: &mut RuntimeContext) -> bool;
    /// Pre-rendered struct field key plus colon
    fn append_struct_key(ctx: &mut RuntimeContext, op: &Opcode);
    /// Opening brace for structs and maps
    fn append_object_head(ctx: &mut RuntimeContext);
    /// Closing brace for a struct; collapses `{}` when nothing was emitted
    fn append_struct_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool;
    /// Opening bracket for a non-empty array
    fn append_array_head(ctx: &mut RuntimeContext, op: &Opcode);
    /// Whitespace before the next array element
    fn append_elem_indent(ctx: &mut RuntimeContext, op: &Opcode);
    /// Closing bracket for a non-empty array
    fn append_array_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool;
    /// The `[]` literal
    fn append_empty_array(ctx: &mut RuntimeContext);
    /// The `{}` literal
    fn append_empty_object(ctx: &mut RuntimeContext);
    /// Whitespace before the next map key
    fn append_map_key_indent(ctx: &mut RuntimeContext, op: &Opcode);
    /// Closing brace for a non-empty map
    fn append_object_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool;
}

// ==================== Shared structure helpers ====================

fn push_indent(ctx: &mut RuntimeContext, depth: u32) {
    let RuntimeContext {
        buf,
        option,
        base_indent,
        ..
    } = ctx;
    buf.extend_from_slice(option.indent_prefix.as_bytes());
    for _ in 0..(*base_indent + depth) {
        buf.extend_from_slice(option.indent_unit.as_bytes());
    }
}

fn compact_key_separator(ctx: &mut RuntimeContext) -> bool {
    match ctx.buf.last_mut() {
        Some(c) if *c == b',' => {
            *c = b':';
            true
        }
        _ => false,
    }
}

fn compact_close(ctx: &mut RuntimeContext, close: u8) -> bool {
    match ctx.buf.last_mut() {
        Some(c) if *c == b',' => {
            *c = close;
            true
        }
        _ => false,
    }
}

fn compact_struct_end(ctx: &mut RuntimeContext) -> bool {
    // a head immediately followed by the end collapses to "{}"
    if ctx.buf.last() == Some(&b'{') {
        ctx.buf.push(b'}');
        return true;
    }
    compact_close(ctx, b'}')
}

fn pretty_key_separator(ctx: &mut RuntimeContext) -> bool {
    if !ctx.buf.ends_with(b",\n") {
        return false;
    }
    let cut = ctx.buf.len() - 2;
    ctx.buf.truncate(cut);
    ctx.buf.extend_from_slice(b": ");
    true
}

fn pretty_close(ctx: &mut RuntimeContext, depth: u32, close: u8) -> bool {
    if !ctx.buf.ends_with(b",\n") {
        return false;
    }
    let cut = ctx.buf.len() - 2;
    ctx.buf.truncate(cut);
    ctx.buf.push(b'\n');
    push_indent(ctx, depth);
    ctx.buf.push(close);
    true
}

fn pretty_struct_end(ctx: &mut RuntimeContext, depth: u32) -> bool {
    if ctx.buf.ends_with(b"{\n") {
        let cut = ctx.buf.len() - 1;
        ctx.buf.truncate(cut);
        ctx.buf.push(b'}');
        return true;
    }
    pretty_close(ctx, depth, b'}')
}

// ==================== Token decoration ====================

fn colored(
    ctx: &mut RuntimeContext,
    pick: fn(&ColorScheme) -> &ColorFormat,
    emit: impl FnOnce(&mut Vec<u8>),
) {
    let RuntimeContext { buf, option, .. } = ctx;
    match option.color.as_ref() {
        Some(scheme) => {
            let format = pick(scheme);
            buf.extend_from_slice(&format.header);
            emit(buf);
            buf.extend_from_slice(&format.footer);
        }
        None => emit(buf),
    }
}

fn colored_try(
    ctx: &mut RuntimeContext,
    pick: fn(&ColorScheme) -> &ColorFormat,
    emit: impl FnOnce(&mut Vec<u8>) -> EncodeResult<()>,
) -> EncodeResult<()> {
    let RuntimeContext { buf, option, .. } = ctx;
    match option.color.as_ref() {
        Some(scheme) => {
            let format = pick(scheme);
            buf.extend_from_slice(&format.header);
            emit(buf)?;
            buf.extend_from_slice(&format.footer);
            Ok(())
        }
        None => emit(buf),
    }
}

fn plain_string(ctx: &mut RuntimeContext, s: &str) {
    let RuntimeContext { buf, option, .. } = ctx;
    token::append_quoted(buf, s, option.html_escape);
}

fn colored_string(ctx: &mut RuntimeContext, s: &str) {
    let RuntimeContext { buf, option, .. } = ctx;
    match option.color.as_ref() {
        Some(scheme) => {
            buf.extend_from_slice(&scheme.string.header);
            token::append_quoted(buf, s, option.html_escape);
            buf.extend_from_slice(&scheme.string.footer);
        }
        None => token::append_quoted(buf, s, option.html_escape),
    }
}

fn key_token(op: &Opcode) -> &str {
    op.key.as_deref().unwrap_or("\"\"")
}

// ==================== Plain ====================

/// Minimal bytes, comma separators, no whitespace, no decoration
pub(crate) struct Plain;

impl Emitter for Plain {
    fn append_separator(ctx: &mut RuntimeContext) {
        ctx.buf.push(b',');
    }
    fn append_int(ctx: &mut RuntimeContext, v: i64) {
        emit::append_int(&mut ctx.buf, v);
    }
    fn append_uint(ctx: &mut RuntimeContext, v: u64) {
        emit::append_uint(&mut ctx.buf, v);
    }
    fn append_float32(ctx: &mut RuntimeContext, v: f32) -> EncodeResult<()> {
        emit::append_float32(&mut ctx.buf, v)
    }
    fn append_float64(ctx: &mut RuntimeContext, v: f64) -> EncodeResult<()> {
        emit::append_float64(&mut ctx.buf, v)
    }
    fn append_string(ctx: &mut RuntimeContext, s: &str) {
        plain_string(ctx, s);
    }
    fn append_bytes(ctx: &mut RuntimeContext, b: &[u8]) {
        emit::append_bytes(&mut ctx.buf, b);
    }
    fn append_bool(ctx: &mut RuntimeContext, v: bool) {
        emit::append_bool(&mut ctx.buf, v);
    }
    fn append_null(ctx: &mut RuntimeContext) {
        emit::append_null(&mut ctx.buf);
    }
    fn append_key_separator(ctx: &mut RuntimeContext) -> bool {
        compact_key_separator(ctx)
    }
    fn append_struct_key(ctx: &mut RuntimeContext, op: &Opcode) {
        ctx.buf.extend_from_slice(key_token(op).as_bytes());
        ctx.buf.push(b':');
    }
    fn append_object_head(ctx: &mut RuntimeContext) {
        ctx.buf.push(b'{');
    }
    fn append_struct_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_struct_end(ctx)
    }
    fn append_array_head(ctx: &mut RuntimeContext, _op: &Opcode) {
        ctx.buf.push(b'[');
    }
    fn append_elem_indent(_ctx: &mut RuntimeContext, _op: &Opcode) {}
    fn append_array_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_close(ctx, b']')
    }
    fn append_empty_array(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"[]");
    }
    fn append_empty_object(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{}");
    }
    fn append_map_key_indent(_ctx: &mut RuntimeContext, _op: &Opcode) {}
    fn append_object_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_close(ctx, b'}')
    }
}

// ==================== Indent ====================

/// Newline + prefix + unit×depth before every element and key; closers
/// rewind the trailing separator before the bracket
pub(crate) struct Indent;

impl Emitter for Indent {
    fn append_separator(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b",\n");
    }
    fn append_int(ctx: &mut RuntimeContext, v: i64) {
        emit::append_int(&mut ctx.buf, v);
    }
    fn append_uint(ctx: &mut RuntimeContext, v: u64) {
        emit::append_uint(&mut ctx.buf, v);
    }
    fn append_float32(ctx: &mut RuntimeContext, v: f32) -> EncodeResult<()> {
        emit::append_float32(&mut ctx.buf, v)
    }
    fn append_float64(ctx: &mut RuntimeContext, v: f64) -> EncodeResult<()> {
        emit::append_float64(&mut ctx.buf, v)
    }
    fn append_string(ctx: &mut RuntimeContext, s: &str) {
        plain_string(ctx, s);
    }
    fn append_bytes(ctx: &mut RuntimeContext, b: &[u8]) {
        emit::append_bytes(&mut ctx.buf, b);
    }
    fn append_bool(ctx: &mut RuntimeContext, v: bool) {
        emit::append_bool(&mut ctx.buf, v);
    }
    fn append_null(ctx: &mut RuntimeContext) {
        emit::append_null(&mut ctx.buf);
    }
    fn append_key_separator(ctx: &mut RuntimeContext) -> bool {
        pretty_key_separator(ctx)
    }
    fn append_struct_key(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
        ctx.buf.extend_from_slice(key_token(op).as_bytes());
        ctx.buf.extend_from_slice(b": ");
    }
    fn append_object_head(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{\n");
    }
    fn append_struct_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_struct_end(ctx, op.depth)
    }
    fn append_array_head(ctx: &mut RuntimeContext, op: &Opcode) {
        ctx.buf.extend_from_slice(b"[\n");
        push_indent(ctx, op.depth + 1);
    }
    fn append_elem_indent(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
    }
    fn append_array_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_close(ctx, op.depth, b']')
    }
    fn append_empty_array(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"[]");
    }
    fn append_empty_object(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{}");
    }
    fn append_map_key_indent(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
    }
    fn append_object_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_close(ctx, op.depth, b'}')
    }
}

// ==================== Color ====================

/// Plain structure with every token wrapped in the scheme's decoration
pub(crate) struct Color;

impl Emitter for Color {
    fn append_separator(ctx: &mut RuntimeContext) {
        ctx.buf.push(b',');
    }
    fn append_int(ctx: &mut RuntimeContext, v: i64) {
        colored(ctx, |s| &s.int, |buf| emit::append_int(buf, v));
    }
    fn append_uint(ctx: &mut RuntimeContext, v: u64) {
        colored(ctx, |s| &s.uint, |buf| emit::append_uint(buf, v));
    }
    fn append_float32(ctx: &mut RuntimeContext, v: f32) -> EncodeResult<()> {
        colored_try(ctx, |s| &s.float, |buf| emit::append_float32(buf, v))
    }
    fn append_float64(ctx: &mut RuntimeContext, v: f64) -> EncodeResult<()> {
        colored_try(ctx, |s| &s.float, |buf| emit::append_float64(buf, v))
    }
    fn append_string(ctx: &mut RuntimeContext, s: &str) {
        colored_string(ctx, s);
    }
    fn append_bytes(ctx: &mut RuntimeContext, b: &[u8]) {
        colored(ctx, |s| &s.binary, |buf| emit::append_bytes(buf, b));
    }
    fn append_bool(ctx: &mut RuntimeContext, v: bool) {
        colored(ctx, |s| &s.boolean, |buf| emit::append_bool(buf, v));
    }
    fn append_null(ctx: &mut RuntimeContext) {
        colored(ctx, |s| &s.null, emit::append_null);
    }
    fn append_key_separator(ctx: &mut RuntimeContext) -> bool {
        compact_key_separator(ctx)
    }
    fn append_struct_key(ctx: &mut RuntimeContext, op: &Opcode) {
        colored(ctx, |s| &s.object_key, |buf| {
            buf.extend_from_slice(key_token(op).as_bytes())
        });
        ctx.buf.push(b':');
    }
    fn append_object_head(ctx: &mut RuntimeContext) {
        ctx.buf.push(b'{');
    }
    fn append_struct_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_struct_end(ctx)
    }
    fn append_array_head(ctx: &mut RuntimeContext, _op: &Opcode) {
        ctx.buf.push(b'[');
    }
    fn append_elem_indent(_ctx: &mut RuntimeContext, _op: &Opcode) {}
    fn append_array_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_close(ctx, b']')
    }
    fn append_empty_array(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"[]");
    }
    fn append_empty_object(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{}");
    }
    fn append_map_key_indent(_ctx: &mut RuntimeContext, _op: &Opcode) {}
    fn append_object_end(ctx: &mut RuntimeContext, _op: &Opcode) -> bool {
        compact_close(ctx, b'}')
    }
}

// ==================== Color + Indent ====================

/// Indent's whitespace with Color's token wrapping; indentation always
/// precedes the colored token
pub(crate) struct ColorIndent;

impl Emitter for ColorIndent {
    fn append_separator(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b",\n");
    }
    fn append_int(ctx: &mut RuntimeContext, v: i64) {
        colored(ctx, |s| &s.int, |buf| emit::append_int(buf, v));
    }
    fn append_uint(ctx: &mut RuntimeContext, v: u64) {
        colored(ctx, |s| &s.uint, |buf| emit::append_uint(buf, v));
    }
    fn append_float32(ctx: &mut RuntimeContext, v: f32) -> EncodeResult<()> {
        colored_try(ctx, |s| &s.float, |buf| emit::append_float32(buf, v))
    }
    fn append_float64(ctx: &mut RuntimeContext, v: f64) -> EncodeResult<()> {
        colored_try(ctx, |s| &s.float, |buf| emit::append_float64(buf, v))
    }
    fn append_string(ctx: &mut RuntimeContext, s: &str) {
        colored_string(ctx, s);
    }
    fn append_bytes(ctx: &mut RuntimeContext, b: &[u8]) {
        colored(ctx, |s| &s.binary, |buf| emit::append_bytes(buf, b));
    }
    fn append_bool(ctx: &mut RuntimeContext, v: bool) {
        colored(ctx, |s| &s.boolean, |buf| emit::append_bool(buf, v));
    }
    fn append_null(ctx: &mut RuntimeContext) {
        colored(ctx, |s| &s.null, emit::append_null);
    }
    fn append_key_separator(ctx: &mut RuntimeContext) -> bool {
        pretty_key_separator(ctx)
    }
    fn append_struct_key(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
        colored(ctx, |s| &s.object_key, |buf| {
            buf.extend_from_slice(key_token(op).as_bytes())
        });
        ctx.buf.extend_from_slice(b": ");
    }
    fn append_object_head(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{\n");
    }
    fn append_struct_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_struct_end(ctx, op.depth)
    }
    fn append_array_head(ctx: &mut RuntimeContext, op: &Opcode) {
        ctx.buf.extend_from_slice(b"[\n");
        push_indent(ctx, op.depth + 1);
    }
    fn append_elem_indent(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
    }
    fn append_array_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_close(ctx, op.depth, b']')
    }
    fn append_empty_array(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"[]");
    }
    fn append_empty_object(ctx: &mut RuntimeContext) {
        ctx.buf.extend_from_slice(b"{}");
    }
    fn append_map_key_indent(ctx: &mut RuntimeContext, op: &Opcode) {
        push_indent(ctx, op.depth);
    }
    fn append_object_end(ctx: &mut RuntimeContext, op: &Opcode) -> bool {
        pretty_close(ctx, op.depth, b'}')
    }
}
