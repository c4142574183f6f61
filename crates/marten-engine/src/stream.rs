//! Streaming encoder
//!
//! Writes one encoded value per line to an underlying writer, mirroring the
//! usual newline-delimited JSON stream convention. Indentation and HTML
//! escaping are sticky settings; resetting the indent strings to empty
//! fully reverts to compact output.

use std::io::Write;

use marten_vm::{EncodeOption, EncodeResult};

use crate::value::JsonValue;
use crate::Engine;

/// Streaming wrapper around an engine and a writer
pub struct Encoder<'e, W: Write> {
    engine: &'e Engine,
    writer: W,
    indent_prefix: String,
    indent_unit: String,
    escape_html: bool,
}

impl<'e, W: Write> Encoder<'e, W> {
    /// Create an encoder with HTML escaping on and indentation off
    pub fn new(engine: &'e Engine, writer: W) -> Self {
        Self {
            engine,
            writer,
            indent_prefix: String::new(),
            indent_unit: String::new(),
            escape_html: true,
        }
    }

    /// Set the per-line prefix and per-level unit for subsequent values.
    /// Two empty strings disable indentation.
    pub fn set_indent(&mut self, prefix: impl Into<String>, unit: impl Into<String>) {
        self.indent_prefix = prefix.into();
        self.indent_unit = unit.into();
    }

    /// Enable or disable HTML escaping for subsequent values
    pub fn set_escape_html(&mut self, on: bool) {
        self.escape_html = on;
    }

    /// Encode one value followed by a newline
    pub fn encode(&mut self, value: &JsonValue) -> EncodeResult<()> {
        let mut option = EncodeOption::new();
        option.html_escape = self.escape_html;
        option.indent_prefix = self.indent_prefix.clone();
        option.indent_unit = self.indent_unit.clone();
        let mut out = self.engine.encode_value(value, option)?;
        out.push(b'\n');
        self.writer.write_all(&out)?;
        Ok(())
    }

    /// Consume the encoder, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}
