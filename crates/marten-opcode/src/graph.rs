//! Opcode graph arena and the compiled plan
//!
//! The graph is a flat arena of nodes; edges are arena indices. Cycles —
//! map loops, self-referential shapes — are plain back-references and the
//! whole structure stays trivially shareable once built.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::node::Opcode;
use crate::operand::{OpId, ShapeId, SlotId};

/// Arena of opcode nodes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpcodeGraph {
    nodes: Vec<Opcode>,
}

impl OpcodeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, returning its id
    pub fn push(&mut self, op: Opcode) -> OpId {
        let id = OpId::new(self.nodes.len() as u32);
        self.nodes.push(op);
        id
    }

    /// Look up a node
    #[inline]
    pub fn get(&self, id: OpId) -> Option<&Opcode> {
        self.nodes.get(id.index())
    }

    /// Look up a node for edge patching during compilation
    pub fn get_mut(&mut self, id: OpId) -> Option<&mut Opcode> {
        self.nodes.get_mut(id.index())
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in arena order
    pub fn iter(&self) -> impl Iterator<Item = (OpId, &Opcode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, op)| (OpId::new(i as u32), op))
    }

    /// Linear textual dump of every node, one line each
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (id, op) in self.iter() {
            let _ = write!(
                &mut out,
                "#{:03} {:<16} next={} alt={}",
                id.0,
                op.kind.name(),
                fmt_id(op.next),
                fmt_id(op.alt),
            );
            if op.base != SlotId::NONE {
                let _ = write!(&mut out, " base=r{}", op.base.0);
            }
            if op.offset.words() != 0 || op.base != SlotId::NONE {
                let _ = write!(&mut out, " offset=+{}", op.offset.words());
            }
            if op.slot != SlotId::NONE {
                let _ = write!(&mut out, " slot=r{}", op.slot.0);
            }
            let _ = write!(&mut out, " depth={}", op.depth);
            if op.bits != 0 {
                let _ = write!(&mut out, " bits={}", op.bits);
            }
            if op.deref != 0 {
                let _ = write!(&mut out, " deref={}", op.deref);
            }
            if op.size != 0 {
                let _ = write!(&mut out, " size={}", op.size);
            }
            if op.omit_empty {
                let _ = write!(&mut out, " omitempty({:?})", op.empty);
            }
            if let Some(key) = &op.key {
                let _ = write!(&mut out, " key={key}");
            }
            if op.shape != ShapeId::NONE {
                let _ = write!(&mut out, " shape=#{}", op.shape.0);
            }
            out.push('\n');
        }
        out
    }

    /// Directed-graph rendering of the nodes reachable from `entry`, in DOT
    /// form: solid edges are `next`, dashed edges are `alt`.
    pub fn dump_dot(&self, entry: OpId) -> String {
        let mut out = String::from("digraph opcodes {\n");
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![entry];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            let Some(op) = self.get(id) else { continue };
            if seen[id.index()] {
                continue;
            }
            seen[id.index()] = true;
            order.push(id);
            if !op.alt.is_none() {
                stack.push(op.alt);
            }
            if !op.next.is_none() {
                stack.push(op.next);
            }
        }
        order.sort_by_key(|id| id.0);
        for id in &order {
            let op = &self.nodes[id.index()];
            let _ = writeln!(&mut out, "  n{} [label=\"#{} {}\"];", id.0, id.0, op.kind.name());
        }
        for id in &order {
            let op = &self.nodes[id.index()];
            if !op.next.is_none() {
                let _ = writeln!(&mut out, "  n{} -> n{};", id.0, op.next.0);
            }
            if !op.alt.is_none() {
                let _ = writeln!(&mut out, "  n{} -> n{} [style=dashed];", id.0, op.alt.0);
            }
        }
        out.push_str("}\n");
        out
    }
}

fn fmt_id(id: OpId) -> String {
    if id.is_none() {
        "----".to_string()
    } else {
        format!("#{:03}", id.0)
    }
}

/// Compiled plan for one shape.
///
/// Carries two entry points: `escape_entry` has struct field keys rendered
/// with HTML escaping, `noescape_entry` without. Immutable after
/// construction and safe for unbounded concurrent reads; published sets
/// live for the registry's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcodeSet {
    /// Shape this plan was compiled for
    pub shape: ShapeId,
    /// Descriptive shape name, used in diagnostics
    pub type_name: Box<str>,
    /// Register slots one frame of this plan needs
    pub slot_count: u32,
    /// The node arena, shared by both entries
    pub graph: OpcodeGraph,
    /// Entry opcode for HTML-escaped key output
    pub escape_entry: OpId,
    /// Entry opcode for non-escaped key output
    pub noescape_entry: OpId,
}

impl OpcodeSet {
    /// Entry opcode for the given escaping mode
    #[inline]
    pub fn entry(&self, html_escape: bool) -> OpId {
        if html_escape {
            self.escape_entry
        } else {
            self.noescape_entry
        }
    }
}
