//! JSON round-trips and streaming decode scenarios.

use std::io::Read;

use lite3::tree::validate_tree;
use lite3::{arr, decode_from_reader, from_json, map, to_json, Message, TypedValue};

/// A reader that yields at most `chunk` bytes per read, forcing the decoder
/// through its suspension paths.
struct Trickle<'a> {
    data: &'a [u8],
    at: usize,
    chunk: usize,
}

impl Read for Trickle<'_> {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let n = self.chunk.min(out.len()).min(self.data.len() - self.at);
        out[..n].copy_from_slice(&self.data[self.at..self.at + n]);
        self.at += n;
        Ok(n)
    }
}

fn assert_roundtrip(json: &str) {
    let msg = from_json(json).unwrap();
    validate_tree(msg.as_bytes(), 0).unwrap();
    let encoded = msg.to_json().unwrap();
    let expected: serde_json::Value = serde_json::from_str(json).unwrap();
    let actual: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(expected, actual, "round trip changed {json}");
}

#[test]
fn test_roundtrip_documents() {
    assert_roundtrip("{}");
    assert_roundtrip("[]");
    assert_roundtrip(r#"{"name":"alice","age":30}"#);
    assert_roundtrip(r#"{"name":"alice","scores":[10,20,30]}"#);
    assert_roundtrip(r#"[1,2,3,null,"hello",true]"#);
    assert_roundtrip(r#"{"a":{"b":{"c":{"d":[[[1]]]}}}}"#);
    assert_roundtrip(r#"{"mixed":[{"k":null},2.75,"s",[false]]}"#);
    assert_roundtrip(r#"{"big":9223372036854775807,"small":-9223372036854775808}"#);
    assert_roundtrip(r#"{"escaped":"line\nbreak é 😀 tab\t"}"#);
}

#[test]
fn test_chunked_decode_matches_one_shot() {
    let json = r#"{"alpha": [1, 2.5, {"deep": "value with spaces"}], "beta": null,
                   "gamma": "trailing", "delta": true}"#;
    let one_shot = from_json(json).unwrap();
    for chunk in [1, 2, 3, 7, 16] {
        let streamed = decode_from_reader(Trickle {
            data: json.as_bytes(),
            at: 0,
            chunk,
        })
        .unwrap();
        let a: serde_json::Value = serde_json::from_str(&one_shot.to_json().unwrap()).unwrap();
        let b: serde_json::Value = serde_json::from_str(&streamed.to_json().unwrap()).unwrap();
        assert_eq!(a, b, "chunk size {chunk}");
    }
}

/// Synthesize a periodic-table-like document large enough to force several
/// output growths from the 1 KiB minimum.
fn periodic_table_json() -> String {
    // A few real (name, density kg/m³) anchors; Osmium is the densest.
    let anchors: &[(&str, Option<f64>)] = &[
        ("Hydrogen", Some(0.0899)),
        ("Helium", Some(0.1785)),
        ("Iron", Some(7874.0)),
        ("Gold", Some(19300.0)),
        ("Iridium", Some(22560.0)),
        ("Osmium", Some(22590.0)),
        ("Oganesson", None),
    ];
    let filler = "x".repeat(2048);
    let mut json = String::from(r#"{"elements":["#);
    for i in 0..120 {
        if i > 0 {
            json.push(',');
        }
        let (name, density) = anchors
            .get(i % anchors.len())
            .map_or(("", None), |&(n, d)| (n, d));
        let name = if name.is_empty() || i >= anchors.len() {
            format!("element_{i:03}")
        } else {
            name.to_string()
        };
        let density = if i < anchors.len() {
            density
        } else {
            Some(1000.0 + i as f64)
        };
        let density_json = match density {
            Some(d) => format!("{d}"),
            None => "null".to_string(),
        };
        json.push_str(&format!(
            r#"{{"number":{},"name":"{name}","density_kg_per_m3":{density_json},"notes":"{filler}"}}"#,
            i + 1,
        ));
    }
    json.push_str("]}");
    json
}

#[test]
fn test_streaming_decode_with_output_growth() {
    let json = periodic_table_json();
    assert!(json.len() > 250_000);

    let msg = decode_from_reader(Trickle {
        data: json.as_bytes(),
        at: 0,
        chunk: 1024,
    })
    .unwrap();
    assert!(msg.capacity() > 1024);
    validate_tree(msg.as_bytes(), 0).unwrap();

    // Find the element with the greatest non-null density.
    let live = msg.as_bytes();
    let elements = map::get_array(live, 0, "elements").unwrap();
    let n = msg.count(elements).unwrap();
    assert_eq!(n, 120);
    let mut best: Option<(f64, String)> = None;
    for i in 0..n {
        let element = arr::get_object(live, elements, i).unwrap();
        let density = match map::get(live, element, "density_kg_per_m3")
            .unwrap()
            .typed()
            .unwrap()
        {
            TypedValue::F64(d) => d,
            TypedValue::I64(d) => d as f64,
            TypedValue::Null => continue,
            other => panic!("unexpected density {other:?}"),
        };
        let name = map::get_string(live, element, "name")
            .unwrap()
            .resolve(live)
            .unwrap()
            .to_string();
        if best.as_ref().is_none_or(|(b, _)| density > *b) {
            best = Some((density, name));
        }
    }
    let (density, name) = best.unwrap();
    assert_eq!(name, "Osmium");
    assert!((density - 22590.0).abs() < 1e-9);

    // The subtree still encodes and round-trips.
    let densest = arr::get_object(live, elements, 5).unwrap();
    let sub = lite3::json::subtree_to_json(live, densest).unwrap();
    let value: serde_json::Value = serde_json::from_str(&sub).unwrap();
    assert_eq!(value["name"], "Osmium");
    let again = from_json(&sub).unwrap();
    let re: serde_json::Value = serde_json::from_str(&again.to_json().unwrap()).unwrap();
    assert_eq!(value, re);
}

#[test]
fn test_bytes_encode_then_reparse_as_string() {
    // The Base64 extension is one-way: bytes become strings in JSON.
    let mut msg = Message::object().unwrap();
    msg.set_bytes(0, "blob", &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    let json = msg.to_json().unwrap();
    assert_eq!(json, r#"{"blob":"3q2+7w=="}"#);
    let re = from_json(&json).unwrap();
    assert_eq!(re.kind_of(0, "blob").unwrap(), lite3::ValueKind::Str);
}

#[test]
fn test_encode_after_mutation_reflects_current_state() {
    let msg = from_json(r#"{"status": "old", "n": 1}"#).unwrap();
    let mut msg = msg;
    msg.set_string(0, "status", "new").unwrap();
    msg.set_i64(0, "n", 2).unwrap();
    let value: serde_json::Value = serde_json::from_str(&to_json(msg.as_bytes()).unwrap()).unwrap();
    assert_eq!(value, serde_json::json!({"status": "new", "n": 2}));
}
