//! Encode error taxonomy
//!
//! Three data-error kinds return normally to the caller with identifying
//! context. [`InvariantFault`] is different: it signals a defect in the
//! compiled plan or the interpreter, is always routed through the
//! diagnostic wrapper, and must never be swallowed or retried.

use thiserror::Error;

/// Errors an encode call can produce
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value category cannot be represented in JSON, or a live
    /// unbounded cycle was detected at encode time
    #[error("unsupported value of type {type_name}: {reason}")]
    UnsupportedValue {
        /// Shape the offending value belongs to
        type_name: String,
        /// What made the value unrepresentable
        reason: String,
    },

    /// NaN or infinite floating-point value
    #[error("unsupported float value: {0}")]
    UnsupportedFloat(f64),

    /// A caller-supplied value-to-JSON or value-to-text converter failed
    #[error("error calling converter for type {type_name}: {source}")]
    Converter {
        /// Shape the converter was registered for
        type_name: String,
        /// The converter's own error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// IO error while writing encoded output to a stream
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant fault — a defect, not a data problem
    #[error(transparent)]
    Invariant(#[from] InvariantFault),
}

/// Defect-class failure: the interpreter reached an opcode or context state
/// it cannot handle
#[derive(Debug, Error)]
#[error("internal invariant fault: {0}")]
pub struct InvariantFault(pub String);

impl EncodeError {
    /// Unsupported-value data error
    pub fn unsupported(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Converter data error wrapping the offending shape's name
    pub fn converter(
        type_name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Converter {
            type_name: type_name.into(),
            source: source.into(),
        }
    }

    /// Internal invariant fault
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(InvariantFault(message.into()))
    }

    /// Whether this is a defect-class fault rather than a data error
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Result type for encode operations
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classification() {
        assert!(EncodeError::invariant("boom").is_fault());
        assert!(!EncodeError::UnsupportedFloat(f64::NAN).is_fault());
        assert!(!EncodeError::unsupported("Node", "encountered a cycle via Node").is_fault());
    }

    #[test]
    fn test_messages() {
        let err = EncodeError::unsupported("Chan", "no JSON representation");
        assert_eq!(
            err.to_string(),
            "unsupported value of type Chan: no JSON representation"
        );
        let err = EncodeError::invariant("opcode #9 End: dangling edge");
        assert_eq!(
            err.to_string(),
            "internal invariant fault: opcode #9 End: dangling edge"
        );
    }
}
