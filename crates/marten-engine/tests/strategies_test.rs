//! Cross-strategy properties: the four output modes must agree on token
//! content and order, differing only in whitespace and decoration bytes.

use marten_engine::{
    Addr, ColorScheme, EncodeOption, Engine, Field, JsonValue, Shape, ShapeId, ValueHeap,
};

/// Remove ANSI escape sequences and whitespace outside string tokens.
///
/// Only valid for whitespace-only indent settings; string token content is
/// preserved byte-for-byte.
fn strip_decoration(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;
    while i < s.len() {
        let b = s[i];
        if b == 0x1b {
            while i < s.len() && s[i] != b'm' {
                i += 1;
            }
            i += 1;
            continue;
        }
        if in_string {
            out.push(b);
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
            out.push(b);
        } else if !b.is_ascii_whitespace() {
            out.push(b);
        }
        i += 1;
    }
    out
}

/// A struct mixing every token category, including an empty nested array
/// and a null pointer field.
fn fixture(engine: &Engine) -> (ValueHeap, Addr, ShapeId) {
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let f64sh = engine.shape(Shape::Float64);
    let boolean = engine.shape(Shape::Bool);
    let string = engine.shape(Shape::String);
    let tags = engine.shape(Shape::Slice { elem: string });
    let ptr = engine.shape(Shape::Ptr { elem: int64 });
    let inner = engine.shape(Shape::Struct {
        name: "Inner".into(),
        fields: vec![Field::new("empty", 0, tags)],
    });
    let fixture = engine.shape(Shape::Struct {
        name: "Fixture".into(),
        fields: vec![
            Field::new("id", 0, int64),
            Field::new("pi", 1, f64sh),
            Field::new("ok", 2, boolean),
            Field::new("note", 3, string),
            Field::new("tags", 4, tags),
            Field::new("none", 5, ptr),
            Field::new("nested", 6, inner),
        ],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(7);
    heap.put_int(base, 123);
    heap.put_f64(base.offset(1), 3.14);
    heap.put_bool(base.offset(2), true);
    heap.put_str(base.offset(3), "space inside, and a \"quote\"");
    let elems = heap.alloc(3);
    heap.put_str(elems, "x");
    heap.put_str(elems.offset(1), "y z");
    heap.put_str(elems.offset(2), "w");
    heap.put_slice(base.offset(4), elems, 3);
    // none stays null; nested.empty is an empty (non-nil) slice
    let none = heap.alloc(0);
    heap.put_slice(base.offset(6), none, 0);

    (heap, base, fixture)
}

fn encode_with(
    engine: &Engine,
    heap: &ValueHeap,
    base: Addr,
    shape: ShapeId,
    indent: bool,
    color: bool,
) -> Vec<u8> {
    let mut opt = EncodeOption::new();
    if indent {
        opt.indent_unit = "  ".to_string();
    }
    if color {
        opt.color = Some(ColorScheme::ansi());
    }
    engine.encode(heap, base, shape, opt).unwrap()
}

#[test]
fn test_four_modes_agree_on_tokens() {
    let engine = Engine::new();
    let (heap, base, shape) = fixture(&engine);

    let plain = encode_with(&engine, &heap, base, shape, false, false);
    let indent = encode_with(&engine, &heap, base, shape, true, false);
    let color = encode_with(&engine, &heap, base, shape, false, true);
    let color_indent = encode_with(&engine, &heap, base, shape, true, true);

    assert_eq!(strip_decoration(&indent), plain);
    assert_eq!(strip_decoration(&color), plain);
    assert_eq!(strip_decoration(&color_indent), plain);
    // plain output strips to itself
    assert_eq!(strip_decoration(&plain), plain);
}

#[test]
fn test_plain_fixture_bytes() {
    let engine = Engine::new();
    let (heap, base, shape) = fixture(&engine);
    let out = encode_with(&engine, &heap, base, shape, false, false);
    assert_eq!(
        String::from_utf8(out).unwrap(),
        r#"{"id":123,"pi":3.14,"ok":true,"note":"space inside, and a \"quote\"","tags":["x","y z","w"],"none":null,"nested":{"empty":[]}}"#
    );
}

#[test]
fn test_no_trailing_separator_before_closers() {
    let engine = Engine::new();
    let (heap, base, shape) = fixture(&engine);
    for (indent, color) in [(false, false), (true, false), (false, true), (true, true)] {
        let out = encode_with(&engine, &heap, base, shape, indent, color);
        let text = String::from_utf8(out).unwrap();
        for closer in ["]", "}"] {
            for (i, _) in text.match_indices(closer) {
                let tail = text[..i].trim_end();
                assert!(
                    !tail.ends_with(','),
                    "trailing separator before {closer} in {text}"
                );
            }
        }
    }
}

#[test]
fn test_selection_is_per_call_not_sticky() {
    let engine = Engine::new();
    let value = JsonValue::array(["a".into(), "b".into()]);

    let mut pretty_opt = EncodeOption::new();
    pretty_opt.indent_unit = "  ".to_string();
    let pretty = engine.encode_value(&value, pretty_opt).unwrap();
    let compact = engine.encode_value(&value, EncodeOption::new()).unwrap();
    assert_eq!(compact, br#"["a","b"]"#);
    assert!(pretty.len() > compact.len());

    // same plan cache, same shape, back to compact: identical output again
    assert_eq!(
        engine.encode_value(&value, EncodeOption::new()).unwrap(),
        compact
    );
}

#[test]
fn test_indented_output_shape() {
    let engine = Engine::new();
    let value = JsonValue::array(["a".into(), "b".into(), "c".into()]);
    let mut opt = EncodeOption::new();
    opt.indent_prefix = ">".to_string();
    opt.indent_unit = ".".to_string();
    let out = engine.encode_value(&value, opt).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "[\n>.\"a\",\n>.\"b\",\n>.\"c\"\n>]"
    );
}

#[test]
fn test_unicode_separators_escape_only_when_html_escaping() {
    let engine = Engine::new();
    let value = JsonValue::Str("a\u{2028}b\u{2029}c".into());

    let escaped = engine.encode_value(&value, EncodeOption::new()).unwrap();
    assert_eq!(escaped, "\"a\\u2028b\\u2029c\"".as_bytes());

    let mut opt = EncodeOption::new();
    opt.html_escape = false;
    let raw = engine.encode_value(&value, opt).unwrap();
    assert_eq!(raw, "\"a\u{2028}b\u{2029}c\"".as_bytes());
}
