//! Per-call encode configuration

use std::fmt;
use std::io;

use crate::color::ColorScheme;

/// Immutable per-call configuration.
///
/// Constructed fresh for every encode call; the context takes a snapshot.
/// The two sinks are write-once side channels — the context clears each
/// after its first use, so a reused context never reports twice.
pub struct EncodeOption {
    /// Escape `<`, `>`, `&`, U+2028 and U+2029 in strings and keys
    pub html_escape: bool,
    /// Emitted once at the start of every indented line
    pub indent_prefix: String,
    /// Emitted once per nesting level; both strings empty disables
    /// indentation entirely
    pub indent_unit: String,
    /// Token decoration, or `None` for undecorated output
    pub color: Option<ColorScheme>,
    /// Target for the diagnostic textual dump (written on internal faults)
    pub debug_text_sink: Option<Box<dyn io::Write + Send>>,
    /// Target for the graph-description dump (written once per call)
    pub debug_graph_sink: Option<Box<dyn io::Write + Send>>,
}

impl Default for EncodeOption {
    fn default() -> Self {
        Self {
            html_escape: true,
            indent_prefix: String::new(),
            indent_unit: String::new(),
            color: None,
            debug_text_sink: None,
            debug_graph_sink: None,
        }
    }
}

impl EncodeOption {
    /// Defaults: HTML escaping on, no indentation, no color, no sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether indented output is active
    #[inline]
    pub fn indent_enabled(&self) -> bool {
        !self.indent_prefix.is_empty() || !self.indent_unit.is_empty()
    }

    /// Whether colorized output is active
    #[inline]
    pub fn color_enabled(&self) -> bool {
        self.color.is_some()
    }
}

impl fmt::Debug for EncodeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeOption")
            .field("html_escape", &self.html_escape)
            .field("indent_prefix", &self.indent_prefix)
            .field("indent_unit", &self.indent_unit)
            .field("color", &self.color.is_some())
            .field("debug_text_sink", &self.debug_text_sink.is_some())
            .field("debug_graph_sink", &self.debug_graph_sink.is_some())
            .finish()
    }
}
