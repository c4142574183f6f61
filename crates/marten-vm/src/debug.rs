//! Diagnostic wrapper
//!
//! Wraps one interpreter run with fault capture. Data errors pass through
//! untouched; internal invariant faults additionally produce a structured
//! report on the configured text sink before being re-signaled. The report
//! is strictly observational — it never changes the outcome of the call.

use std::fmt::Write;
use std::io::Write as _;

use marten_opcode::OpcodeSet;

use crate::context::RuntimeContext;
use crate::error::{EncodeError, EncodeResult};
use crate::heap::ValueHeap;
use crate::interp::execute;

/// Run a plan with diagnostics.
///
/// After the run — success or fault — a configured graph sink receives the
/// active entry's DOT rendering exactly once; the sink reference is cleared
/// so a reused context cannot re-render. On an internal invariant fault the
/// text sink receives the four-section dump, and the original fault is
/// returned unchanged.
pub fn debug_run(
    ctx: &mut RuntimeContext,
    heap: &ValueHeap,
    set: &OpcodeSet,
) -> EncodeResult<Vec<u8>> {
    let entry = set.entry(ctx.option.html_escape);
    let result = execute(ctx, heap, set);

    if let Some(mut sink) = ctx.option.debug_graph_sink.take() {
        let _ = sink.write_all(set.graph.dump_dot(entry).as_bytes());
    }

    match result {
        Err(err) if err.is_fault() => {
            if let Some(mut sink) = ctx.option.debug_text_sink.take() {
                let _ = sink.write_all(render_report(set, ctx).as_bytes());
            }
            Err(err)
        }
        other => other,
    }
}

/// The four-section textual dump: shape name, linear opcode dump, a blank
/// line, then the formatted context state, delimited by fixed banners.
fn render_report(set: &OpcodeSet, ctx: &RuntimeContext) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "=============[DEBUG]===============");
    let _ = writeln!(&mut out, "* [TYPE]");
    let _ = writeln!(&mut out, "{}", set.type_name);
    let _ = writeln!(&mut out);
    let _ = writeln!(&mut out, "* [ALL OPCODE]");
    let _ = write!(&mut out, "{}", set.graph.dump());
    let _ = writeln!(&mut out);
    let _ = writeln!(&mut out, "* [CONTEXT]");
    let _ = write!(&mut out, "{}", ctx.dump());
    let _ = writeln!(&mut out, "===================================");
    out
}
