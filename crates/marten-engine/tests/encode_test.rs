//! Encoding tests against explicitly described shapes: structs, pointers,
//! self-referential layouts, converters, and the error taxonomy.

use marten_engine::{
    Addr, ColorScheme, EncodeError, EncodeOption, Engine, Field, Shape, ValueHeap,
};

fn encode(engine: &Engine, heap: &ValueHeap, base: Addr, shape: marten_engine::ShapeId) -> String {
    let out = engine
        .encode(heap, base, shape, EncodeOption::new())
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_struct_fields_in_declaration_order() {
    let engine = Engine::new();
    let string = engine.shape(Shape::String);
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let person = engine.shape(Shape::Struct {
        name: "Person".into(),
        fields: vec![
            Field::new("name", 0, string),
            Field::new("age", 1, int64),
        ],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(2);
    heap.put_str(base, "Ada");
    heap.put_int(base.offset(1), 36);

    assert_eq!(
        encode(&engine, &heap, base, person),
        r#"{"name":"Ada","age":36}"#
    );
}

#[test]
fn test_nested_struct_flattens_offsets() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let point = engine.shape(Shape::Struct {
        name: "Point".into(),
        fields: vec![Field::new("x", 0, int64), Field::new("y", 1, int64)],
    });
    let line = engine.shape(Shape::Struct {
        name: "Line".into(),
        fields: vec![Field::new("a", 0, point), Field::new("b", 2, point)],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(4);
    for (i, v) in [1i64, 2, 3, 4].into_iter().enumerate() {
        heap.put_int(base.offset(i as u32), v);
    }

    assert_eq!(
        encode(&engine, &heap, base, line),
        r#"{"a":{"x":1,"y":2},"b":{"x":3,"y":4}}"#
    );
}

#[test]
fn test_embedded_fields_share_the_parent_object() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let string = engine.shape(Shape::String);
    let meta = engine.shape(Shape::Struct {
        name: "Meta".into(),
        fields: vec![
            Field::new("version", 0, int64),
            Field::new("author", 1, string),
        ],
    });
    let doc = engine.shape(Shape::Struct {
        name: "Doc".into(),
        fields: vec![Field::new("id", 0, int64), Field::embedded(1, meta)],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(3);
    heap.put_int(base, 7);
    heap.put_int(base.offset(1), 2);
    heap.put_str(base.offset(2), "bea");

    assert_eq!(
        encode(&engine, &heap, base, doc),
        r#"{"id":7,"version":2,"author":"bea"}"#
    );
}

#[test]
fn test_empty_struct_collapses() {
    let engine = Engine::new();
    let unit = engine.shape(Shape::Struct {
        name: "Unit".into(),
        fields: vec![],
    });
    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);

    assert_eq!(encode(&engine, &heap, base, unit), "{}");

    let mut opt = EncodeOption::new();
    opt.indent_prefix = ">".to_string();
    opt.indent_unit = ".".to_string();
    let out = engine.encode(&heap, base, unit, opt).unwrap();
    assert_eq!(out, b"{}");
}

#[test]
fn test_omit_empty_fields() {
    let engine = Engine::new();
    let string = engine.shape(Shape::String);
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let rec = engine.shape(Shape::Struct {
        name: "Record".into(),
        fields: vec![
            Field::new("id", 0, int64),
            Field::omit_empty("label", 1, string),
            Field::omit_empty("count", 2, int64),
        ],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(3);
    heap.put_int(base, 7);

    // empty string and zero count are skipped
    assert_eq!(encode(&engine, &heap, base, rec), r#"{"id":7}"#);

    heap.put_str(base.offset(1), "tag");
    heap.put_int(base.offset(2), 1);
    assert_eq!(
        encode(&engine, &heap, base, rec),
        r#"{"id":7,"label":"tag","count":1}"#
    );
}

#[test]
fn test_pointer_null_and_deref() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let ptr = engine.shape(Shape::Ptr { elem: int64 });
    let holder = engine.shape(Shape::Struct {
        name: "Holder".into(),
        fields: vec![Field::new("p", 0, ptr)],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);
    assert_eq!(encode(&engine, &heap, base, holder), r#"{"p":null}"#);

    let target = heap.alloc(1);
    heap.put_int(target, 42);
    heap.put_ptr(base, target);
    assert_eq!(encode(&engine, &heap, base, holder), r#"{"p":42}"#);
}

#[test]
fn test_slice_of_structs() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let pair = engine.shape(Shape::Struct {
        name: "Pair".into(),
        fields: vec![Field::new("a", 0, int64), Field::new("b", 1, int64)],
    });
    let list = engine.shape(Shape::Slice { elem: pair });

    let mut heap = ValueHeap::new();
    let elems = heap.alloc(4); // two Pairs, stride 2
    for (i, v) in [1i64, 2, 3, 4].into_iter().enumerate() {
        heap.put_int(elems.offset(i as u32), v);
    }
    let base = heap.alloc(1);
    heap.put_slice(base, elems, 2);

    assert_eq!(
        encode(&engine, &heap, base, list),
        r#"[{"a":1,"b":2},{"a":3,"b":4}]"#
    );
}

#[test]
fn test_nil_slice_and_empty_slice() {
    let engine = Engine::new();
    let string = engine.shape(Shape::String);
    let list = engine.shape(Shape::Slice { elem: string });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1); // word 0 = nil slice
    assert_eq!(encode(&engine, &heap, base, list), "null");

    let empty = heap.alloc(1);
    let elems = heap.alloc(0);
    heap.put_slice(empty, elems, 0);
    assert_eq!(encode(&engine, &heap, empty, list), "[]");
}

#[test]
fn test_bytes_nil_empty_and_data() {
    let engine = Engine::new();
    let bytes = engine.shape(Shape::Bytes);

    let mut heap = ValueHeap::new();
    let nil = heap.alloc(1);
    assert_eq!(encode(&engine, &heap, nil, bytes), "null");

    let empty = heap.alloc(1);
    heap.put_bytes(empty, Vec::new());
    assert_eq!(encode(&engine, &heap, empty, bytes), "\"\"");

    let data = heap.alloc(1);
    heap.put_bytes(data, b"hi".to_vec());
    assert_eq!(encode(&engine, &heap, data, bytes), "\"aGk=\"");
}

#[test]
fn test_linked_list_recursion() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let node = engine.declare();
    let next = engine.shape(Shape::Ptr { elem: node });
    engine.define(
        node,
        Shape::Struct {
            name: "Node".into(),
            fields: vec![Field::new("value", 0, int64), Field::new("next", 1, next)],
        },
    );

    let mut heap = ValueHeap::new();
    let n2 = heap.alloc(2);
    heap.put_int(n2, 2);
    let n1 = heap.alloc(2);
    heap.put_int(n1, 1);
    heap.put_ptr(n1.offset(1), n2);

    assert_eq!(
        encode(&engine, &heap, n1, node),
        r#"{"value":1,"next":{"value":2,"next":null}}"#
    );
}

#[test]
fn test_recursion_indents_by_live_depth() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let node = engine.declare();
    let next = engine.shape(Shape::Ptr { elem: node });
    engine.define(
        node,
        Shape::Struct {
            name: "Node".into(),
            fields: vec![Field::new("v", 0, int64), Field::new("next", 1, next)],
        },
    );

    let mut heap = ValueHeap::new();
    let n2 = heap.alloc(2);
    heap.put_int(n2, 2);
    let n1 = heap.alloc(2);
    heap.put_int(n1, 1);
    heap.put_ptr(n1.offset(1), n2);

    let mut opt = EncodeOption::new();
    opt.indent_unit = "  ".to_string();
    let out = String::from_utf8(engine.encode(&heap, n1, node, opt).unwrap()).unwrap();
    assert_eq!(
        out,
        "{\n  \"v\": 1,\n  \"next\": {\n    \"v\": 2,\n    \"next\": null\n  }\n}"
    );
}

#[test]
fn test_live_cycle_is_unsupported_value() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let node = engine.declare();
    let next = engine.shape(Shape::Ptr { elem: node });
    engine.define(
        node,
        Shape::Struct {
            name: "Node".into(),
            fields: vec![Field::new("value", 0, int64), Field::new("next", 1, next)],
        },
    );

    let mut heap = ValueHeap::new();
    let n1 = heap.alloc(2);
    heap.put_int(n1, 1);
    heap.put_ptr(n1.offset(1), n1); // points back at itself

    let err = engine
        .encode(&heap, n1, node, EncodeOption::new())
        .unwrap_err();
    match err {
        EncodeError::UnsupportedValue { type_name, reason } => {
            assert_eq!(type_name, "Node");
            assert!(reason.contains("cycle"));
        }
        other => panic!("expected UnsupportedValue, got {other}"),
    }
}

#[test]
fn test_shared_target_is_not_a_cycle() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let node = engine.declare();
    let next = engine.shape(Shape::Ptr { elem: node });
    engine.define(
        node,
        Shape::Struct {
            name: "Node".into(),
            fields: vec![Field::new("value", 0, int64), Field::new("next", 1, next)],
        },
    );
    let pair = engine.shape(Shape::Struct {
        name: "Pair".into(),
        fields: vec![Field::new("left", 0, next), Field::new("right", 1, next)],
    });

    let mut heap = ValueHeap::new();
    let shared = heap.alloc(2);
    heap.put_int(shared, 5);
    let base = heap.alloc(2);
    heap.put_ptr(base, shared);
    heap.put_ptr(base.offset(1), shared);

    // the same address reached twice on separate descents is a DAG, not a
    // cycle
    assert_eq!(
        encode(&engine, &heap, base, pair),
        r#"{"left":{"value":5,"next":null},"right":{"value":5,"next":null}}"#
    );
}

#[test]
fn test_nan_and_infinity_fail() {
    let engine = Engine::new();
    let f = engine.shape(Shape::Float64);
    let mut heap = ValueHeap::new();

    for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let base = heap.alloc(1);
        heap.put_f64(base, v);
        let err = engine
            .encode(&heap, base, f, EncodeOption::new())
            .unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFloat(_)));
    }
}

#[test]
fn test_converter_splices_json() {
    let engine = Engine::new();
    let custom = engine.shape(Shape::MarshalJson {
        name: "Custom".into(),
    });
    let holder = engine.shape(Shape::Struct {
        name: "Holder".into(),
        fields: vec![Field::new("c", 0, custom)],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);
    heap.put_converter(base, Box::new(|| Ok(br#"{"x":1}"#.to_vec())));

    assert_eq!(encode(&engine, &heap, base, holder), r#"{"c":{"x":1}}"#);
}

#[test]
fn test_converter_failure_names_the_shape() {
    let engine = Engine::new();
    let custom = engine.shape(Shape::MarshalJson {
        name: "Custom".into(),
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);
    heap.put_converter(base, Box::new(|| Err("boom".into())));

    let err = engine
        .encode(&heap, base, custom, EncodeOption::new())
        .unwrap_err();
    match err {
        EncodeError::Converter { type_name, source } => {
            assert_eq!(type_name, "Custom");
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("expected Converter, got {other}"),
    }
}

#[test]
fn test_text_converter_emits_string_token() {
    let engine = Engine::new();
    let custom = engine.shape(Shape::MarshalText {
        name: "Stamp".into(),
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);
    heap.put_converter(base, Box::new(|| Ok(b"2009-11-10 <UTC>".to_vec())));

    assert_eq!(
        encode(&engine, &heap, base, custom),
        "\"2009-11-10 \\u003cUTC\\u003e\""
    );
}

#[test]
fn test_struct_key_escaping_per_entry() {
    let engine = Engine::new();
    let int64 = engine.shape(Shape::Int { bits: 64 });
    let tagged = engine.shape(Shape::Struct {
        name: "Tagged".into(),
        fields: vec![Field::new("<>&#! ", 0, int64)],
    });

    let mut heap = ValueHeap::new();
    let base = heap.alloc(1);

    // default options escape the key through the escape entry point
    assert_eq!(
        encode(&engine, &heap, base, tagged),
        "{\"\\u003c\\u003e\\u0026#! \":0}"
    );

    let mut opt = EncodeOption::new();
    opt.html_escape = false;
    let out = engine.encode(&heap, base, tagged, opt).unwrap();
    assert_eq!(out, br#"{"<>&#! ":0}"#);
}

#[test]
fn test_map_key_order_is_delivery_order() {
    let engine = Engine::new();
    let string = engine.shape(Shape::String);
    let m = engine.shape(Shape::Map {
        key: string,
        value: string,
    });

    let mut heap = ValueHeap::new();
    let kv = heap.alloc(4);
    heap.put_str(kv, "zz");
    heap.put_str(kv.offset(1), "1");
    heap.put_str(kv.offset(2), "aa");
    heap.put_str(kv.offset(3), "2");
    let base = heap.alloc(1);
    heap.put_map(base, vec![(kv, kv.offset(1)), (kv.offset(2), kv.offset(3))]);

    // not sorted: zz stays first, and re-encoding is stable
    let first = encode(&engine, &heap, base, m);
    assert_eq!(first, r#"{"zz":"1","aa":"2"}"#);
    assert_eq!(encode(&engine, &heap, base, m), first);
}

#[test]
fn test_nil_and_empty_map() {
    let engine = Engine::new();
    let string = engine.shape(Shape::String);
    let m = engine.shape(Shape::Map {
        key: string,
        value: string,
    });

    let mut heap = ValueHeap::new();
    let nil = heap.alloc(1);
    assert_eq!(encode(&engine, &heap, nil, m), "null");

    let empty = heap.alloc(1);
    heap.put_map(empty, vec![]);
    assert_eq!(encode(&engine, &heap, empty, m), "{}");
}

#[test]
fn test_unsigned_and_narrow_ints() {
    let engine = Engine::new();
    let u8sh = engine.shape(Shape::Uint { bits: 8 });
    let i8sh = engine.shape(Shape::Int { bits: 8 });

    let mut heap = ValueHeap::new();
    let a = heap.alloc(1);
    heap.put_uint(a, 0xff);
    assert_eq!(encode(&engine, &heap, a, u8sh), "255");

    let b = heap.alloc(1);
    heap.put_int(b, -1);
    assert_eq!(encode(&engine, &heap, b, i8sh), "-1");
}

#[test]
fn test_color_scheme_wraps_tokens_only() {
    let engine = Engine::new();
    let value = marten_engine::JsonValue::array([1i64.into(), 2i64.into()]);

    let mut opt = EncodeOption::new();
    opt.color = Some(ColorScheme::ansi());
    let out = engine.encode_value(&value, opt).unwrap();

    // brackets and commas stay bare; numbers are wrapped
    assert_eq!(
        out,
        b"[\x1b[95m1\x1b[0m,\x1b[95m2\x1b[0m]"
    );
}
