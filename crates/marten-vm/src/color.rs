//! Color schemes
//!
//! Pure formatting data: each token category maps to a header/footer byte
//! pair wrapped around the token. Structural punctuation (commas, colons,
//! brackets) is never decorated.

/// Decoration bytes wrapped around one token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorFormat {
    /// Bytes emitted before the token
    pub header: Vec<u8>,
    /// Bytes emitted after the token
    pub footer: Vec<u8>,
}

impl ColorFormat {
    /// An ANSI SGR format: `ESC[<code>m … ESC[0m`
    pub fn ansi(code: &str) -> Self {
        Self {
            header: format!("\x1b[{code}m").into_bytes(),
            footer: b"\x1b[0m".to_vec(),
        }
    }

    /// No decoration
    pub fn none() -> Self {
        Self::default()
    }
}

/// Token category to decoration mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorScheme {
    /// Signed integers
    pub int: ColorFormat,
    /// Unsigned integers
    pub uint: ColorFormat,
    /// Floats
    pub float: ColorFormat,
    /// Strings
    pub string: ColorFormat,
    /// Booleans
    pub boolean: ColorFormat,
    /// The `null` literal
    pub null: ColorFormat,
    /// Struct object keys
    pub object_key: ColorFormat,
    /// Base64 binary tokens
    pub binary: ColorFormat,
}

impl ColorScheme {
    /// The default ANSI scheme: bright magenta numbers, bright green
    /// strings, bright yellow booleans, blue null, bright cyan keys,
    /// bright red binary.
    pub fn ansi() -> Self {
        Self {
            int: ColorFormat::ansi("95"),
            uint: ColorFormat::ansi("95"),
            float: ColorFormat::ansi("95"),
            string: ColorFormat::ansi("92"),
            boolean: ColorFormat::ansi("93"),
            null: ColorFormat::ansi("34"),
            object_key: ColorFormat::ansi("96"),
            binary: ColorFormat::ansi("91"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ansi_format() {
        let f = ColorFormat::ansi("92");
        assert_eq!(f.header, b"\x1b[92m");
        assert_eq!(f.footer, b"\x1b[0m");
    }

    #[test]
    fn test_none_is_empty() {
        let f = ColorFormat::none();
        assert!(f.header.is_empty() && f.footer.is_empty());
    }
}
