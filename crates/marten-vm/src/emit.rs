//! Raw token byte appenders shared by all emission strategies

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{EncodeError, EncodeResult};

pub(crate) fn append_int(buf: &mut Vec<u8>, v: i64) {
    let mut fmt = itoa::Buffer::new();
    buf.extend_from_slice(fmt.format(v).as_bytes());
}

pub(crate) fn append_uint(buf: &mut Vec<u8>, v: u64) {
    let mut fmt = itoa::Buffer::new();
    buf.extend_from_slice(fmt.format(v).as_bytes());
}

pub(crate) fn append_float32(buf: &mut Vec<u8>, v: f32) -> EncodeResult<()> {
    if !v.is_finite() {
        return Err(EncodeError::UnsupportedFloat(v as f64));
    }
    let mut fmt = ryu::Buffer::new();
    buf.extend_from_slice(fmt.format_finite(v).as_bytes());
    Ok(())
}

pub(crate) fn append_float64(buf: &mut Vec<u8>, v: f64) -> EncodeResult<()> {
    if !v.is_finite() {
        return Err(EncodeError::UnsupportedFloat(v));
    }
    let mut fmt = ryu::Buffer::new();
    buf.extend_from_slice(fmt.format_finite(v).as_bytes());
    Ok(())
}

pub(crate) fn append_bool(buf: &mut Vec<u8>, v: bool) {
    buf.extend_from_slice(if v { b"true" } else { b"false" });
}

pub(crate) fn append_null(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"null");
}

/// Byte slices become quoted base64 string tokens, standard alphabet with
/// padding.
pub(crate) fn append_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    buf.push(b'"');
    buf.extend_from_slice(STANDARD.encode(b).as_bytes());
    buf.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_ints() {
        assert_eq!(collect(|b| append_int(b, -42)), "-42");
        assert_eq!(collect(|b| append_uint(b, u64::MAX)), "18446744073709551615");
    }

    #[test]
    fn test_float_shortest_form() {
        assert_eq!(collect(|b| append_float64(b, 0.1).unwrap()), "0.1");
        assert_eq!(collect(|b| append_float64(b, 3.14).unwrap()), "3.14");
    }

    #[test]
    fn test_nonfinite_floats_rejected() {
        let mut buf = Vec::new();
        assert!(matches!(
            append_float64(&mut buf, f64::NAN),
            Err(EncodeError::UnsupportedFloat(_))
        ));
        assert!(matches!(
            append_float32(&mut buf, f32::INFINITY),
            Err(EncodeError::UnsupportedFloat(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_base64_token() {
        assert_eq!(collect(|b| append_bytes(b, b"hi")), "\"aGk=\"");
        assert_eq!(collect(|b| append_bytes(b, b"")), "\"\"");
    }
}
