//! The `serialize`/`unserialize` wire format from the external-interfaces
//! section of the specification: a length-prefixed text encoding distinct
//! from JSON, so this module is a hand-rolled codec rather than a consumer
//! of `serde_json` (the workspace's JSON dependency has no role here; see
//! `DESIGN.md`).
//!
//! Grounded on the teacher's own small hand-rolled codecs (e.g. the numeric
//! literal scanner in `lexer.rs`): a cursor over a byte slice, one read
//! function per tag byte, propagating a `String` error rather than a
//! throwable — `unserialize` failing is reported by its caller, not the
//! codec itself.
//!
//! `__sleep`/`__wakeup` are out of reach here: builtins (and this module,
//! which backs one) never hold an `Evaluator` handle to call a method
//! through, so object (de)serialization always walks every own property in
//! insertion order. Documented as a known simplification in `DESIGN.md`.

use crate::array::{ArrayKey, PhpArray};
use crate::class::Object;
use crate::value::{format_float, Value};
use std::cell::RefCell;
use std::rc::Rc;

pub fn serialize(v: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(v, &mut out);
    out
}

fn write_value(v: &Value, out: &mut Vec<u8>) {
    match v {
        Value::Null => out.extend_from_slice(b"N;"),
        Value::Bool(b) => out.extend_from_slice(format!("b:{};", u8::from(*b)).as_bytes()),
        Value::Int(n) => out.extend_from_slice(format!("i:{n};").as_bytes()),
        Value::Float(f) => out.extend_from_slice(format!("d:{};", format_float(*f)).as_bytes()),
        Value::String(s) => {
            out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
            out.extend_from_slice(s);
            out.extend_from_slice(b"\";");
        }
        Value::Array(a) => {
            out.extend_from_slice(format!("a:{}:{{", a.len()).as_bytes());
            for (k, val) in a.iter() {
                write_value(&k.to_value(), out);
                write_value(val, out);
            }
            out.push(b'}');
        }
        Value::Object(o) => {
            let obj = o.borrow();
            out.extend_from_slice(format!("O:{}:\"{}\":{}:{{", obj.class.len(), obj.class, obj.props.len()).as_bytes());
            for (k, val) in obj.props.iter() {
                write_value(&Value::string(k.clone()), out);
                write_value(val, out);
            }
            out.push(b'}');
        }
        // Not representable in the wire format; serializes as null rather
        // than failing the whole structure.
        Value::Closure(_) | Value::Resource(_) | Value::Generator(_) => out.extend_from_slice(b"N;"),
    }
}

pub fn unserialize(bytes: &[u8]) -> Result<Value, String> {
    let mut pos = 0;
    let v = read_value(bytes, &mut pos)?;
    Ok(v)
}

fn peek(b: &[u8], pos: usize) -> Result<u8, String> {
    b.get(pos).copied().ok_or_else(|| "unexpected end of input".to_string())
}

fn expect_byte(b: &[u8], pos: &mut usize, expected: u8) -> Result<(), String> {
    let got = peek(b, *pos)?;
    if got != expected {
        return Err(format!("expected '{}' at offset {}, found '{}'", expected as char, pos, got as char));
    }
    *pos += 1;
    Ok(())
}

/// Reads bytes up to (not including) the next occurrence of `until`,
/// advancing past the delimiter.
fn read_until(b: &[u8], pos: &mut usize, until: u8) -> Result<Vec<u8>, String> {
    let start = *pos;
    while peek(b, *pos)? != until {
        *pos += 1;
    }
    let slice = b[start..*pos].to_vec();
    *pos += 1;
    Ok(slice)
}

fn read_usize(b: &[u8], pos: &mut usize) -> Result<usize, String> {
    let digits = read_until(b, pos, b':')?;
    std::str::from_utf8(&digits).ok().and_then(|s| s.parse().ok()).ok_or_else(|| "expected a length".to_string())
}

fn read_exact(b: &[u8], pos: &mut usize, n: usize) -> Result<Vec<u8>, String> {
    if *pos + n > b.len() {
        return Err("string length runs past end of input".to_string());
    }
    let slice = b[*pos..*pos + n].to_vec();
    *pos += n;
    Ok(slice)
}

fn read_value(b: &[u8], pos: &mut usize) -> Result<Value, String> {
    match peek(b, *pos)? {
        b'N' => {
            *pos += 1;
            expect_byte(b, pos, b';')?;
            Ok(Value::Null)
        }
        b'b' => {
            *pos += 2; // "b:"
            let flag = read_until(b, pos, b';')?;
            match flag.as_slice() {
                b"0" => Ok(Value::Bool(false)),
                b"1" => Ok(Value::Bool(true)),
                _ => Err("invalid boolean literal".to_string()),
            }
        }
        b'i' => {
            *pos += 2; // "i:"
            let digits = read_until(b, pos, b';')?;
            let n = std::str::from_utf8(&digits).ok().and_then(|s| s.parse().ok()).ok_or("invalid integer literal")?;
            Ok(Value::Int(n))
        }
        b'd' => {
            *pos += 2; // "d:"
            let digits = read_until(b, pos, b';')?;
            let f = std::str::from_utf8(&digits).ok().and_then(|s| s.parse().ok()).ok_or("invalid double literal")?;
            Ok(Value::Float(f))
        }
        b's' => {
            *pos += 2; // "s:"
            let len = read_usize(b, pos)?;
            expect_byte(b, pos, b'"')?;
            let bytes = read_exact(b, pos, len)?;
            expect_byte(b, pos, b'"')?;
            expect_byte(b, pos, b';')?;
            Ok(Value::string(bytes))
        }
        b'a' => {
            *pos += 2; // "a:"
            let count = read_usize(b, pos)?;
            expect_byte(b, pos, b'{')?;
            let mut arr = PhpArray::new();
            for _ in 0..count {
                let k = read_value(b, pos)?;
                let v = read_value(b, pos)?;
                arr.insert(ArrayKey::from_value(&k), v);
            }
            expect_byte(b, pos, b'}')?;
            Ok(Value::array(arr))
        }
        b'O' => {
            *pos += 2; // "O:"
            let name_len = read_usize(b, pos)?;
            expect_byte(b, pos, b'"')?;
            let name = String::from_utf8(read_exact(b, pos, name_len)?).map_err(|e| e.to_string())?;
            expect_byte(b, pos, b'"')?;
            expect_byte(b, pos, b':')?;
            let count = read_usize(b, pos)?;
            expect_byte(b, pos, b'{')?;
            let mut props = indexmap::IndexMap::new();
            for _ in 0..count {
                let k = read_value(b, pos)?;
                let v = read_value(b, pos)?;
                props.insert(String::from_utf8_lossy(&k.to_bytes()).into_owned(), v);
            }
            expect_byte(b, pos, b'}')?;
            Ok(Value::Object(Rc::new(RefCell::new(Object { class: name, props }))))
        }
        other => Err(format!("unrecognized type tag '{}'", other as char)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: Value) {
        let bytes = serialize(&v);
        assert_eq!(unserialize(&bytes).unwrap(), v);
    }

    #[test]
    fn roundtrips_scalars() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Int(-42));
        roundtrip(Value::string("hello world"));
    }

    #[test]
    fn roundtrips_nested_arrays() {
        let mut inner = PhpArray::new();
        inner.push(Value::Int(1));
        inner.insert(ArrayKey::Str("k".into()), Value::string("v"));
        let mut outer = PhpArray::new();
        outer.push(Value::array(inner));
        outer.push(Value::Bool(false));
        roundtrip(Value::array(outer));
    }

    #[test]
    fn encodes_strings_with_byte_length_not_char_count() {
        let bytes = serialize(&Value::string("hi"));
        assert_eq!(bytes, b"s:2:\"hi\";");
    }

    #[test]
    fn round_trips_object_properties() {
        let mut props = indexmap::IndexMap::new();
        props.insert("name".to_string(), Value::string("Alice"));
        let obj = Value::Object(Rc::new(RefCell::new(Object { class: "User".to_string(), props })));
        let bytes = serialize(&obj);
        let Value::Object(back) = unserialize(&bytes).unwrap() else { panic!("expected object") };
        assert_eq!(back.borrow().class, "User");
        assert_eq!(back.borrow().props.get("name"), Some(&Value::string("Alice")));
    }
}
