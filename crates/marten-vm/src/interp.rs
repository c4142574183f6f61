//! Interpreter core
//!
//! One shared control-flow loop, generic over the emission strategy. The
//! graph for a call is walked exactly once from its entry opcode to the end
//! marker; the only loops are bounded by collection length, iteration
//! exhaustion, or the seen-address cycle check.

use marten_opcode::{EmptyCheck, OpId, OpKind, Opcode, OpcodeSet};

use crate::context::RuntimeContext;
use crate::error::{EncodeError, EncodeResult};
use crate::heap::{Addr, MapIter, ValueHeap};
use crate::strategy::{Color, ColorIndent, Emitter, Indent, Plain};

/// Execute a compiled plan against the context's base value.
///
/// The emission strategy is selected once from the option flags; the run
/// itself is monomorphic. Returns the finished bytes with the trailing
/// element separator already stripped; on any error the partial buffer is
/// discarded.
pub fn execute(
    ctx: &mut RuntimeContext,
    heap: &ValueHeap,
    set: &OpcodeSet,
) -> EncodeResult<Vec<u8>> {
    let entry = set.entry(ctx.option.html_escape);
    match (ctx.option.indent_enabled(), ctx.option.color_enabled()) {
        (false, false) => run::<Plain>(ctx, heap, set, entry),
        (true, false) => run::<Indent>(ctx, heap, set, entry),
        (false, true) => run::<Color>(ctx, heap, set, entry),
        (true, true) => run::<ColorIndent>(ctx, heap, set, entry),
    }?;
    finish(ctx)
}

/// Strip the final element separator and hand the buffer out
fn finish(ctx: &mut RuntimeContext) -> EncodeResult<Vec<u8>> {
    let tail: &[u8] = if ctx.option.indent_enabled() {
        b",\n"
    } else {
        b","
    };
    if !ctx.buf.ends_with(tail) {
        return Err(EncodeError::invariant(
            "finished plan left no trailing separator",
        ));
    }
    let cut = ctx.buf.len() - tail.len();
    ctx.buf.truncate(cut);
    Ok(std::mem::take(&mut ctx.buf))
}

fn fault(id: OpId, op: &Opcode, message: &str) -> EncodeError {
    EncodeError::invariant(format!("opcode #{} {}: {}", id.0, op.kind.name(), message))
}

fn run<E: Emitter>(
    ctx: &mut RuntimeContext,
    heap: &ValueHeap,
    set: &OpcodeSet,
    entry: OpId,
) -> EncodeResult<()> {
    let graph = &set.graph;

    ctx.buf.clear();
    ctx.slots.clear();
    ctx.slots.resize(set.slot_count.max(1) as usize, 0);
    ctx.frame = 0;
    ctx.base_indent = 0;
    ctx.seen.clear();
    ctx.slots[0] = ctx.base.0 as u64;

    let mut id = entry;
    loop {
        let Some(op) = graph.get(id) else {
            return Err(EncodeError::invariant(format!(
                "edge to #{} leaves the graph",
                id.0
            )));
        };
        match op.kind {
            OpKind::End => return Ok(()),

            // ==================== Scalars ====================
            OpKind::EmitInt => {
                let w = read_word(ctx, heap, id, op)?;
                E::append_int(ctx, sign_extend(w, op.bits));
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitUint => {
                let w = read_word(ctx, heap, id, op)?;
                E::append_uint(ctx, mask_uint(w, op.bits));
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitFloat32 => {
                let w = read_word(ctx, heap, id, op)?;
                E::append_float32(ctx, f32::from_bits(w as u32))?;
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitFloat64 => {
                let w = read_word(ctx, heap, id, op)?;
                E::append_float64(ctx, f64::from_bits(w))?;
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitBool => {
                let w = read_word(ctx, heap, id, op)?;
                E::append_bool(ctx, w != 0);
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitString => {
                let w = read_word(ctx, heap, id, op)?;
                let s = heap
                    .string(w)
                    .ok_or_else(|| fault(id, op, "string handle out of range"))?;
                E::append_string(ctx, s);
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitBytes => {
                let w = read_word(ctx, heap, id, op)?;
                if w == 0 {
                    E::append_null(ctx);
                } else {
                    let b = heap
                        .blob(w)
                        .ok_or_else(|| fault(id, op, "blob handle out of range"))?;
                    E::append_bytes(ctx, b);
                }
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitNull => {
                E::append_null(ctx);
                E::append_separator(ctx);
                id = op.next;
            }

            // ==================== Converters ====================
            OpKind::EmitMarshalJson => {
                let w = read_word(ctx, heap, id, op)?;
                if w == 0 {
                    E::append_null(ctx);
                } else {
                    let out = call_converter(heap, id, op, w)?;
                    ctx.buf.extend_from_slice(out.trim_ascii());
                }
                E::append_separator(ctx);
                id = op.next;
            }
            OpKind::EmitMarshalText => {
                let w = read_word(ctx, heap, id, op)?;
                if w == 0 {
                    E::append_null(ctx);
                } else {
                    let out = call_converter(heap, id, op, w)?;
                    let text = String::from_utf8(out).map_err(|_| {
                        EncodeError::converter(converter_name(op), "converter returned invalid UTF-8")
                    })?;
                    E::append_string(ctx, &text);
                }
                E::append_separator(ctx);
                id = op.next;
            }

            // ==================== Pointers ====================
            OpKind::NilCheck => {
                let mut p = read_word(ctx, heap, id, op)? as u32;
                for _ in 1..op.deref {
                    if p == 0 {
                        break;
                    }
                    p = heap
                        .word(Addr(p))
                        .ok_or_else(|| fault(id, op, "pointer leaves the heap"))? as u32;
                }
                if p == 0 {
                    E::append_null(ctx);
                    E::append_separator(ctx);
                    id = op.alt;
                } else {
                    if !ctx.store(op.slot, p as u64) {
                        return Err(fault(id, op, "slot out of range"));
                    }
                    id = op.next;
                }
            }

            // ==================== Structs ====================
            OpKind::StructHead => {
                E::append_object_head(ctx);
                id = op.next;
            }
            OpKind::StructField => {
                if op.omit_empty && field_is_empty(ctx, heap, id, op)? {
                    id = op.alt;
                } else {
                    E::append_struct_key(ctx, op);
                    id = op.next;
                }
            }
            OpKind::StructEnd => {
                if !E::append_struct_end(ctx, op) {
                    return Err(fault(id, op, "output buffer underflow"));
                }
                E::append_separator(ctx);
                id = op.next;
            }

            // ==================== Slices ====================
            OpKind::SliceHead => {
                let w = read_word(ctx, heap, id, op)?;
                match heap.slice(w) {
                    None if w == 0 => {
                        E::append_null(ctx);
                        E::append_separator(ctx);
                        id = past_end(graph, id, op)?;
                    }
                    None => return Err(fault(id, op, "slice handle out of range")),
                    Some(rep) if rep.len == 0 => {
                        E::append_empty_array(ctx);
                        E::append_separator(ctx);
                        id = past_end(graph, id, op)?;
                    }
                    Some(rep) => {
                        E::append_array_head(ctx, op);
                        let ok = ctx.store(op.slot, rep.base.0 as u64)
                            && ctx.store(op.slot.offset(1), 0)
                            && ctx.store(op.slot.offset(2), rep.len as u64);
                        if !ok {
                            return Err(fault(id, op, "slot out of range"));
                        }
                        id = op.next;
                    }
                }
            }
            OpKind::SliceElem => {
                let idx = load(ctx, id, op, 1)? + 1;
                let len = load(ctx, id, op, 2)?;
                if idx < len {
                    let cur = load(ctx, id, op, 0)? + op.size as u64;
                    let ok = ctx.store(op.slot, cur) && ctx.store(op.slot.offset(1), idx);
                    if !ok {
                        return Err(fault(id, op, "slot out of range"));
                    }
                    E::append_elem_indent(ctx, op);
                    id = op.next;
                } else {
                    id = op.alt;
                }
            }
            OpKind::SliceEnd => {
                if !E::append_array_end(ctx, op) {
                    return Err(fault(id, op, "output buffer underflow"));
                }
                E::append_separator(ctx);
                id = op.next;
            }

            // ==================== Maps ====================
            OpKind::MapHead => {
                let w = read_word(ctx, heap, id, op)?;
                if w == 0 {
                    E::append_null(ctx);
                    E::append_separator(ctx);
                    id = past_end(graph, id, op)?;
                } else {
                    match heap.map_len(w) {
                        None => return Err(fault(id, op, "map handle out of range")),
                        Some(0) => {
                            E::append_empty_object(ctx);
                            E::append_separator(ctx);
                            id = past_end(graph, id, op)?;
                        }
                        Some(_) => {
                            E::append_object_head(ctx);
                            if !ctx.store(op.slot, MapIter::init(w as u32).pack()) {
                                return Err(fault(id, op, "slot out of range"));
                            }
                            id = op.next;
                        }
                    }
                }
            }
            OpKind::MapKey => {
                let it = MapIter::unpack(load(ctx, id, op, 0)?);
                if it.pos() < it.len(heap) {
                    E::append_map_key_indent(ctx, op);
                    let key = it
                        .key(heap)
                        .ok_or_else(|| fault(id, op, "map entry out of range"))?;
                    if !ctx.store(op.slot.offset(1), key.0 as u64) {
                        return Err(fault(id, op, "slot out of range"));
                    }
                    id = op.next;
                } else {
                    id = op.alt;
                }
            }
            OpKind::MapValue => {
                let mut it = MapIter::unpack(load(ctx, id, op, 0)?);
                let value = it
                    .value(heap)
                    .ok_or_else(|| fault(id, op, "map entry out of range"))?;
                if !E::append_key_separator(ctx) {
                    return Err(fault(id, op, "output buffer underflow"));
                }
                it.advance();
                let ok =
                    ctx.store(op.slot.offset(1), value.0 as u64) && ctx.store(op.slot, it.pack());
                if !ok {
                    return Err(fault(id, op, "slot out of range"));
                }
                id = op.next;
            }
            OpKind::MapEnd => {
                if !E::append_object_end(ctx, op) {
                    return Err(fault(id, op, "output buffer underflow"));
                }
                E::append_separator(ctx);
                id = op.next;
            }

            // ==================== Recursion ====================
            OpKind::Recurse => {
                let base = ctx
                    .load(op.base)
                    .ok_or_else(|| fault(id, op, "slot out of range"))?;
                let child = Addr(base as u32 + op.offset.words());
                if ctx.seen.contains(&child) {
                    let name = op.key.as_deref().unwrap_or(&set.type_name);
                    return Err(EncodeError::unsupported(
                        name,
                        format!("encountered a cycle via {name}"),
                    ));
                }
                ctx.seen.push(child);
                let save_at = ctx.slots.len();
                ctx.slots.push(op.next.0 as u64);
                ctx.slots.push(ctx.frame as u64);
                ctx.slots.push(ctx.base_indent as u64);
                ctx.slots
                    .resize(save_at + 3 + op.size.max(1) as usize, 0);
                ctx.frame = save_at + 3;
                ctx.slots[ctx.frame] = child.0 as u64;
                ctx.base_indent += op.depth;
                id = op.alt;
            }
            OpKind::RecurseEnd => {
                if ctx.frame < 3 {
                    return Err(fault(id, op, "recursion frame underflow"));
                }
                let save_at = ctx.frame - 3;
                let ret = ctx.slots[save_at] as u32;
                let old_frame = ctx.slots[save_at + 1] as usize;
                let old_indent = ctx.slots[save_at + 2] as u32;
                ctx.slots.truncate(save_at);
                ctx.frame = old_frame;
                ctx.base_indent = old_indent;
                ctx.seen.pop();
                id = OpId::new(ret);
            }
        }
    }
}

/// Read the word at the opcode's `base + offset`
fn read_word(
    ctx: &RuntimeContext,
    heap: &ValueHeap,
    id: OpId,
    op: &Opcode,
) -> EncodeResult<u64> {
    let base = ctx
        .load(op.base)
        .ok_or_else(|| fault(id, op, "slot out of range"))?;
    let addr = Addr(base as u32 + op.offset.words());
    heap.word(addr)
        .ok_or_else(|| fault(id, op, "read leaves the heap"))
}

/// Read the opcode's state slot at `slot + n`
fn load(ctx: &RuntimeContext, id: OpId, op: &Opcode, n: u32) -> EncodeResult<u64> {
    ctx.load(op.slot.offset(n))
        .ok_or_else(|| fault(id, op, "slot out of range"))
}

/// Empty/nil collections continue after the container's end opcode
fn past_end(
    graph: &marten_opcode::OpcodeGraph,
    id: OpId,
    op: &Opcode,
) -> EncodeResult<OpId> {
    graph
        .get(op.alt)
        .map(|end| end.next)
        .ok_or_else(|| fault(id, op, "end edge leaves the graph"))
}

fn call_converter(
    heap: &ValueHeap,
    id: OpId,
    op: &Opcode,
    handle: u64,
) -> EncodeResult<Vec<u8>> {
    let conv = heap
        .converter(handle)
        .ok_or_else(|| fault(id, op, "converter handle out of range"))?;
    match conv() {
        Ok(out) if out.iter().all(|b| b.is_ascii_whitespace()) => Err(EncodeError::converter(
            converter_name(op),
            "converter returned no output",
        )),
        Ok(out) => Ok(out),
        Err(err) => Err(EncodeError::converter(converter_name(op), err)),
    }
}

fn converter_name(op: &Opcode) -> &str {
    op.key.as_deref().unwrap_or("<unknown>")
}

fn field_is_empty(
    ctx: &RuntimeContext,
    heap: &ValueHeap,
    id: OpId,
    op: &Opcode,
) -> EncodeResult<bool> {
    let w = read_word(ctx, heap, id, op)?;
    Ok(match op.empty {
        EmptyCheck::None => false,
        EmptyCheck::Word => w == 0,
        EmptyCheck::Float32 => f32::from_bits(w as u32) == 0.0,
        EmptyCheck::Float64 => f64::from_bits(w) == 0.0,
        EmptyCheck::Str => heap.string(w).is_none_or(str::is_empty),
        EmptyCheck::Bytes => heap.blob(w).is_none_or(|b| b.is_empty()),
        EmptyCheck::Slice => heap.slice(w).is_none_or(|r| r.len == 0),
        EmptyCheck::Map => w == 0 || heap.map_len(w).is_none_or(|l| l == 0),
    })
}

fn sign_extend(w: u64, bits: u8) -> i64 {
    match bits {
        8 => w as u8 as i8 as i64,
        16 => w as u16 as i16 as i64,
        32 => w as u32 as i32 as i64,
        _ => w as i64,
    }
}

fn mask_uint(w: u64, bits: u8) -> u64 {
    match bits {
        8 => w as u8 as u64,
        16 => w as u16 as u64,
        32 => w as u32 as u64,
        _ => w,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xff, 8), -1);
        assert_eq!(sign_extend(0xff, 16), 255);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn test_mask_uint() {
        assert_eq!(mask_uint(0x1ff, 8), 0xff);
        assert_eq!(mask_uint(u64::MAX, 64), u64::MAX);
    }
}
