//! Per-call execution context
//!
//! The context holds everything one encode call mutates: the option
//! snapshot, the output buffer, the register file and the cycle-detection
//! stack. It is exclusively owned by the call that created it and never
//! retained past its return.

use std::fmt::Write;

use marten_opcode::SlotId;

use crate::heap::Addr;
use crate::option::EncodeOption;

/// Per-call execution state.
///
/// The register file is an indexed array of machine words, grown on demand.
/// `frame` is the base of the current window: opcode slot indices are
/// frame-relative, and a `Recurse` descent pushes a fresh window so slot
/// assignments stay valid at any recursion depth.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Active option snapshot (sinks included; cleared on first use)
    pub option: EncodeOption,
    /// Base address of the value being encoded
    pub base: Addr,
    pub(crate) buf: Vec<u8>,
    pub(crate) slots: Vec<u64>,
    pub(crate) frame: usize,
    pub(crate) base_indent: u32,
    pub(crate) seen: Vec<Addr>,
}

impl RuntimeContext {
    /// Create a context for one encode call
    pub fn new(base: Addr, option: EncodeOption) -> Self {
        Self {
            option,
            base,
            buf: Vec::new(),
            slots: Vec::new(),
            frame: 0,
            base_indent: 0,
            seen: Vec::new(),
        }
    }

    /// Read a frame-relative register slot
    #[inline]
    pub(crate) fn load(&self, slot: SlotId) -> Option<u64> {
        self.slots.get(self.frame + slot.index()).copied()
    }

    /// Write a frame-relative register slot; `false` when out of range
    #[inline]
    pub(crate) fn store(&mut self, slot: SlotId, value: u64) -> bool {
        match self.slots.get_mut(self.frame + slot.index()) {
            Some(w) => {
                *w = value;
                true
            }
            None => false,
        }
    }

    /// Bytes of output produced so far
    pub fn output_len(&self) -> usize {
        self.buf.len()
    }

    /// Formatted context state for the diagnostic report
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(&mut out, "Context State:");
        let _ = writeln!(&mut out, "  Base Address: {}", self.base.0);
        let _ = writeln!(&mut out, "  Output: {} bytes", self.buf.len());
        let _ = writeln!(&mut out, "  Frame Base: {}", self.frame);
        let _ = writeln!(&mut out, "  Base Indent: {}", self.base_indent);
        let _ = writeln!(&mut out, "  Seen Stack Depth: {}", self.seen.len());
        let shown = self.slots.len().min(32);
        let _ = write!(&mut out, "  Registers ({}):", self.slots.len());
        for (i, w) in self.slots[..shown].iter().enumerate() {
            let _ = write!(&mut out, " r{i}={w}");
        }
        if shown < self.slots.len() {
            let _ = write!(&mut out, " …");
        }
        out.push('\n');
        let _ = writeln!(&mut out, "  Options: {:?}", self.option);
        out
    }
}
