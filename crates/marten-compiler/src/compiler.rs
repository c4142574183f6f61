//! Shape-to-plan lowering
//!
//! Walks a shape description and appends opcode nodes to one arena, linking
//! `next`/`alt` edges as it goes. Struct fields — including nested by-value
//! structs — flatten into one linear chain with cumulative offsets, so no
//! per-field dispatch survives to run time. A shape reached again on the
//! current compile path becomes a `Recurse` node whose `alt` edge enters a
//! standalone sub-plan, closing the cycle inside the graph instead of
//! recursing forever here.

use rustc_hash::FxHashMap;

use marten_opcode::{
    EmptyCheck, OpId, OpKind, Opcode, OpcodeGraph, OpcodeSet, Shape, ShapeId, ShapeRegistry,
    SlotId, WordOffset, token,
};

use crate::error::{CompileError, CompileResult};

const MAX_PTR_CHAIN: u8 = 16;

/// Compile the plan for one shape.
///
/// Both entry points — HTML-escaped keys and plain keys — are lowered into
/// the same arena. Compilation is deterministic: racing builders for the
/// same shape produce equivalent sets.
pub fn compile(registry: &ShapeRegistry, shape: ShapeId) -> CompileResult<OpcodeSet> {
    let mut c = Compiler::new(registry);

    let (escape_entry, escape_slots) = c.program(shape, OpKind::End, true)?;
    let (noescape_entry, noescape_slots) = c.program(shape, OpKind::End, false)?;

    // Sub-plans for recursive shapes, discovered while lowering. Each ends
    // with `RecurseEnd` instead of `End` and owns its own slot space.
    while let Some((sh, escape)) = c.pending.pop() {
        if c.entries.contains_key(&(sh, escape)) {
            continue;
        }
        let (entry, slots) = c.program(sh, OpKind::RecurseEnd, escape)?;
        c.entries.insert((sh, escape), entry);
        c.sub_slots.insert((sh, escape), slots);
    }

    // Now every sub-plan entry is known; close the cycles.
    let sites = std::mem::take(&mut c.recurse_sites);
    for (id, sh, escape) in sites {
        let entry = *c
            .entries
            .get(&(sh, escape))
            .ok_or(CompileError::Undefined(sh))?;
        let size = *c
            .sub_slots
            .get(&(sh, escape))
            .ok_or(CompileError::Undefined(sh))?;
        if let Some(op) = c.graph.get_mut(id) {
            op.alt = entry;
            op.size = size;
        }
    }

    Ok(OpcodeSet {
        shape,
        type_name: registry.describe(shape).into(),
        slot_count: escape_slots.max(noescape_slots),
        graph: c.graph,
        escape_entry,
        noescape_entry,
    })
}

/// Edge of an existing node still waiting for its continuation
#[derive(Debug, Clone, Copy)]
enum Hook {
    Next(OpId),
    Alt(OpId),
}

/// A lowered value: its first opcode plus every dangling edge that must be
/// linked to whatever runs after the value completes
struct Chain {
    head: OpId,
    exits: Vec<Hook>,
}

struct Compiler<'r> {
    registry: &'r ShapeRegistry,
    graph: OpcodeGraph,
    /// Slot counter of the program currently being lowered
    slots: u32,
    /// Shapes on the current lowering path, with the indirection level at
    /// which each was entered
    active: FxHashMap<ShapeId, u32>,
    /// Pointer/slice/map levels crossed on the current path
    indirection: u32,
    /// Entry opcodes of finished sub-plans
    entries: FxHashMap<(ShapeId, bool), OpId>,
    /// Frame sizes of finished sub-plans
    sub_slots: FxHashMap<(ShapeId, bool), u32>,
    /// Sub-plans still to lower
    pending: Vec<(ShapeId, bool)>,
    /// `Recurse` nodes awaiting their entry edge and frame size
    recurse_sites: Vec<(OpId, ShapeId, bool)>,
}

impl<'r> Compiler<'r> {
    fn new(registry: &'r ShapeRegistry) -> Self {
        Self {
            registry,
            graph: OpcodeGraph::new(),
            slots: 1,
            active: FxHashMap::default(),
            indirection: 0,
            entries: FxHashMap::default(),
            sub_slots: FxHashMap::default(),
            pending: Vec::new(),
            recurse_sites: Vec::new(),
        }
    }

    /// Lower one complete program: slot 0 holds the base address, and every
    /// dangling exit funnels into a single terminal opcode.
    fn program(
        &mut self,
        shape: ShapeId,
        terminal: OpKind,
        escape: bool,
    ) -> CompileResult<(OpId, u32)> {
        self.slots = 1;
        self.active.clear();
        self.indirection = 0;
        let chain = self.value(shape, SlotId::new(0), WordOffset::ZERO, 0, escape)?;
        let end = self.graph.push(Opcode::new(terminal));
        self.connect(&chain.exits, end);
        Ok((chain.head, self.slots))
    }

    fn value(
        &mut self,
        sh: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        if let Some(&entered_at) = self.active.get(&sh) {
            if entered_at == self.indirection {
                return Err(CompileError::InfiniteLayout(self.registry.describe(sh)));
            }
            return Ok(self.recurse(sh, base, offset, depth, escape));
        }

        let shape = self
            .registry
            .get(sh)
            .ok_or(CompileError::Undefined(sh))?
            .clone();
        self.active.insert(sh, self.indirection);
        let result = self.lower(&shape, sh, base, offset, depth, escape);
        self.active.remove(&sh);
        result
    }

    fn lower(
        &mut self,
        shape: &Shape,
        sh: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        match shape {
            Shape::Int { bits } => Ok(self.scalar(OpKind::EmitInt, *bits, base, offset, depth)),
            Shape::Uint { bits } => Ok(self.scalar(OpKind::EmitUint, *bits, base, offset, depth)),
            Shape::Float32 => Ok(self.scalar(OpKind::EmitFloat32, 32, base, offset, depth)),
            Shape::Float64 => Ok(self.scalar(OpKind::EmitFloat64, 64, base, offset, depth)),
            Shape::Bool => Ok(self.scalar(OpKind::EmitBool, 0, base, offset, depth)),
            Shape::String => Ok(self.scalar(OpKind::EmitString, 0, base, offset, depth)),
            Shape::Bytes => Ok(self.scalar(OpKind::EmitBytes, 0, base, offset, depth)),
            Shape::Null => Ok(self.scalar(OpKind::EmitNull, 0, base, offset, depth)),
            Shape::MarshalJson { name } => {
                Ok(self.converter(OpKind::EmitMarshalJson, name, base, offset, depth))
            }
            Shape::MarshalText { name } => {
                Ok(self.converter(OpKind::EmitMarshalText, name, base, offset, depth))
            }
            Shape::Opaque { name } => Err(CompileError::Unsupported(name.to_string())),
            Shape::Ptr { elem } => self.pointer(sh, *elem, base, offset, depth, escape),
            Shape::Struct { fields, .. } => {
                self.structure(fields, base, offset, depth, escape)
            }
            Shape::Slice { elem } => self.slice(*elem, base, offset, depth, escape),
            Shape::Map { key, value } => self.map(*key, *value, base, offset, depth, escape),
        }
    }

    fn scalar(
        &mut self,
        kind: OpKind,
        bits: u8,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
    ) -> Chain {
        let mut op = Opcode::new(kind);
        op.base = base;
        op.offset = offset;
        op.depth = depth;
        op.bits = bits;
        let id = self.graph.push(op);
        Chain {
            head: id,
            exits: vec![Hook::Next(id)],
        }
    }

    fn converter(
        &mut self,
        kind: OpKind,
        name: &str,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
    ) -> Chain {
        let mut op = Opcode::new(kind);
        op.base = base;
        op.offset = offset;
        op.depth = depth;
        op.key = Some(name.into());
        let id = self.graph.push(op);
        Chain {
            head: id,
            exits: vec![Hook::Next(id)],
        }
    }

    fn recurse(
        &mut self,
        sh: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> Chain {
        let mut op = Opcode::new(OpKind::Recurse);
        op.base = base;
        op.offset = offset;
        op.depth = depth;
        op.shape = sh;
        op.key = Some(self.registry.describe(sh).into());
        let id = self.graph.push(op);
        self.recurse_sites.push((id, sh, escape));
        if !self.pending.contains(&(sh, escape)) && !self.entries.contains_key(&(sh, escape)) {
            self.pending.push((sh, escape));
        }
        Chain {
            head: id,
            exits: vec![Hook::Next(id)],
        }
    }

    fn pointer(
        &mut self,
        sh: ShapeId,
        elem: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        // Fold pointer chains into one dereference count
        let mut deref = 1u8;
        let mut target = elem;
        while let Some(Shape::Ptr { elem: e }) = self.registry.get(target) {
            deref += 1;
            if deref >= MAX_PTR_CHAIN {
                return Err(CompileError::PointerChainTooDeep(self.registry.describe(sh)));
            }
            target = *e;
        }

        let slot = self.alloc_slots(1);
        let mut op = Opcode::new(OpKind::NilCheck);
        op.base = base;
        op.offset = offset;
        op.slot = slot;
        op.depth = depth;
        op.deref = deref;
        let nil = self.graph.push(op);

        self.indirection += 1;
        let inner = self.value(target, slot, WordOffset::ZERO, depth, escape)?;
        self.indirection -= 1;

        self.link_next(nil, inner.head);
        let mut exits = inner.exits;
        exits.push(Hook::Alt(nil));
        Ok(Chain { head: nil, exits })
    }

    /// Flatten embedded by-value structs into one field list with
    /// cumulative offsets, in declaration order.
    fn flatten_fields(
        &self,
        fields: &[marten_opcode::Field],
        offset: WordOffset,
        level: u32,
        out: &mut Vec<marten_opcode::Field>,
    ) -> CompileResult<()> {
        if level > 16 {
            return Err(CompileError::InfiniteLayout("<embedded chain>".to_string()));
        }
        for field in fields {
            if !field.embedded {
                let mut flat = field.clone();
                flat.offset = offset.add(field.offset).words();
                out.push(flat);
                continue;
            }
            match self.registry.get(field.shape) {
                Some(Shape::Struct { fields: inner, .. }) => {
                    let inner = inner.clone();
                    self.flatten_fields(&inner, offset.add(field.offset), level + 1, out)?;
                }
                _ => {
                    return Err(CompileError::Unsupported(format!(
                        "embedded field must be a by-value struct, not {}",
                        self.registry.describe(field.shape)
                    )));
                }
            }
        }
        Ok(())
    }

    fn structure(
        &mut self,
        fields: &[marten_opcode::Field],
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        let mut flat = Vec::with_capacity(fields.len());
        self.flatten_fields(fields, offset, 0, &mut flat)?;

        let mut head_op = Opcode::new(OpKind::StructHead);
        head_op.depth = depth;
        let head = self.graph.push(head_op);

        let mut dangling = vec![Hook::Next(head)];
        for field in &flat {
            let field_offset = WordOffset::new(field.offset);
            let mut key_op = Opcode::new(OpKind::StructField);
            key_op.base = base;
            key_op.offset = field_offset;
            key_op.depth = depth + 1;
            key_op.key = Some(token::quoted(&field.name, escape).into());
            key_op.omit_empty = field.omit_empty;
            key_op.empty = if field.omit_empty {
                self.empty_check(field.shape)
            } else {
                EmptyCheck::None
            };
            let key = self.graph.push(key_op);
            self.connect(&dangling, key);

            let val = self.value(field.shape, base, field_offset, depth + 1, escape)?;
            self.link_next(key, val.head);
            dangling = val.exits;
            if field.omit_empty {
                dangling.push(Hook::Alt(key));
            }
        }

        let mut end_op = Opcode::new(OpKind::StructEnd);
        end_op.depth = depth;
        let end = self.graph.push(end_op);
        self.connect(&dangling, end);
        Ok(Chain {
            head,
            exits: vec![Hook::Next(end)],
        })
    }

    fn slice(
        &mut self,
        elem: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        let stride = self
            .registry
            .word_size(elem)
            .ok_or_else(|| CompileError::InfiniteLayout(self.registry.describe(elem)))?;

        let slot = self.alloc_slots(3);
        let mut head_op = Opcode::new(OpKind::SliceHead);
        head_op.base = base;
        head_op.offset = offset;
        head_op.slot = slot;
        head_op.depth = depth;
        let head = self.graph.push(head_op);

        self.indirection += 1;
        let elem_chain = self.value(elem, slot, WordOffset::ZERO, depth + 1, escape)?;
        self.indirection -= 1;

        let mut elem_op = Opcode::new(OpKind::SliceElem);
        elem_op.slot = slot;
        elem_op.depth = depth + 1;
        elem_op.size = stride;
        let elem_id = self.graph.push(elem_op);

        let mut end_op = Opcode::new(OpKind::SliceEnd);
        end_op.depth = depth;
        let end = self.graph.push(end_op);

        self.link_next(head, elem_chain.head);
        self.link_alt(head, end);
        self.connect(&elem_chain.exits, elem_id);
        self.link_next(elem_id, elem_chain.head); // loop back
        self.link_alt(elem_id, end);
        Ok(Chain {
            head,
            exits: vec![Hook::Next(end)],
        })
    }

    fn map(
        &mut self,
        key: ShapeId,
        value: ShapeId,
        base: SlotId,
        offset: WordOffset,
        depth: u32,
        escape: bool,
    ) -> CompileResult<Chain> {
        if !matches!(self.registry.get(key), Some(Shape::String)) {
            return Err(CompileError::UnsupportedMapKey(self.registry.describe(key)));
        }

        let slot = self.alloc_slots(2);
        let mut head_op = Opcode::new(OpKind::MapHead);
        head_op.base = base;
        head_op.offset = offset;
        head_op.slot = slot;
        head_op.depth = depth;
        let head = self.graph.push(head_op);

        let mut key_op = Opcode::new(OpKind::MapKey);
        key_op.slot = slot;
        key_op.depth = depth + 1;
        let mkey = self.graph.push(key_op);

        self.indirection += 1;
        let kchain = self.value(key, slot.offset(1), WordOffset::ZERO, depth + 1, escape)?;

        let mut val_op = Opcode::new(OpKind::MapValue);
        val_op.slot = slot;
        val_op.depth = depth + 1;
        let mval = self.graph.push(val_op);

        let vchain = self.value(value, slot.offset(1), WordOffset::ZERO, depth + 1, escape)?;
        self.indirection -= 1;

        let mut end_op = Opcode::new(OpKind::MapEnd);
        end_op.depth = depth;
        let end = self.graph.push(end_op);

        self.link_next(head, mkey);
        self.link_alt(head, end);
        self.link_next(mkey, kchain.head);
        self.link_alt(mkey, end);
        self.connect(&kchain.exits, mval);
        self.link_next(mval, vchain.head);
        self.connect(&vchain.exits, mkey); // loop back: the graph cycles
        Ok(Chain {
            head,
            exits: vec![Hook::Next(end)],
        })
    }

    fn empty_check(&self, sh: ShapeId) -> EmptyCheck {
        match self.registry.get(sh) {
            Some(Shape::Int { .. } | Shape::Uint { .. } | Shape::Bool | Shape::Ptr { .. }) => {
                EmptyCheck::Word
            }
            Some(Shape::Float32) => EmptyCheck::Float32,
            Some(Shape::Float64) => EmptyCheck::Float64,
            Some(Shape::String) => EmptyCheck::Str,
            Some(Shape::Bytes) => EmptyCheck::Bytes,
            Some(Shape::Slice { .. }) => EmptyCheck::Slice,
            Some(Shape::Map { .. }) => EmptyCheck::Map,
            _ => EmptyCheck::None,
        }
    }

    fn alloc_slots(&mut self, n: u32) -> SlotId {
        let slot = SlotId::new(self.slots);
        self.slots += n;
        slot
    }

    fn connect(&mut self, hooks: &[Hook], target: OpId) {
        for hook in hooks {
            match *hook {
                Hook::Next(id) => self.link_next(id, target),
                Hook::Alt(id) => self.link_alt(id, target),
            }
        }
    }

    fn link_next(&mut self, id: OpId, target: OpId) {
        if let Some(op) = self.graph.get_mut(id) {
            op.next = target;
        }
    }

    fn link_alt(&mut self, id: OpId, target: OpId) {
        if let Some(op) = self.graph.get_mut(id) {
            op.alt = target;
        }
    }
}
