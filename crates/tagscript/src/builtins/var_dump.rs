use crate::exception::RunResult;
use crate::value::Value;

/// `var_dump(mixed ...$values): void` — writes each argument's type and
/// value to the output sink in the source language's familiar dump format.
/// Objects are rendered generically (own properties, insertion order): a
/// builtin has no evaluator handle to consult `__toString` or a `__debugInfo`
/// hook, so nested objects print their raw property set rather than any
/// class-customized representation.
pub fn var_dump(args: &[Value], echo: &mut dyn FnMut(&[u8])) -> RunResult<Value> {
    for v in args {
        let mut out = Vec::new();
        dump(v, 0, &mut out);
        echo(&out);
    }
    Ok(Value::Null)
}

fn indent(depth: usize, out: &mut Vec<u8>) {
    out.extend(std::iter::repeat(b' ').take(depth * 2));
}

fn dump(v: &Value, depth: usize, out: &mut Vec<u8>) {
    indent(depth, out);
    match v {
        Value::Null => out.extend_from_slice(b"NULL\n"),
        Value::Bool(b) => out.extend_from_slice(format!("bool({b})\n").as_bytes()),
        Value::Int(n) => out.extend_from_slice(format!("int({n})\n").as_bytes()),
        Value::Float(f) => out.extend_from_slice(format!("float({})\n", crate::value::format_float(*f)).as_bytes()),
        Value::String(s) => {
            out.extend_from_slice(format!("string({}) \"", s.len()).as_bytes());
            out.extend_from_slice(s);
            out.extend_from_slice(b"\"\n");
        }
        Value::Array(a) => {
            out.extend_from_slice(format!("array({}) {{\n", a.len()).as_bytes());
            for (k, val) in a.iter() {
                indent(depth + 1, out);
                out.extend_from_slice(format!("[{k}]=>\n").as_bytes());
                dump(val, depth + 1, out);
            }
            indent(depth, out);
            out.extend_from_slice(b"}\n");
        }
        Value::Object(o) => {
            let obj = o.borrow();
            out.extend_from_slice(format!("object({})#0 ({}) {{\n", obj.class, obj.props.len()).as_bytes());
            for (k, val) in obj.props.iter() {
                indent(depth + 1, out);
                out.extend_from_slice(format!("[\"{k}\"]=>\n").as_bytes());
                dump(val, depth + 1, out);
            }
            indent(depth, out);
            out.extend_from_slice(b"}\n");
        }
        Value::Closure(_) => out.extend_from_slice(b"object(Closure)#0 (0) {\n}\n"),
        Value::Generator(_) => out.extend_from_slice(b"object(Generator)#0 (0) {\n}\n"),
        Value::Resource(r) => out.extend_from_slice(format!("resource({}) of type ({})\n", r.id, r.kind).as_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_scalars() {
        let mut out = Vec::new();
        var_dump(&[Value::Int(5)], &mut |b| out.extend_from_slice(b)).unwrap();
        assert_eq!(out, b"int(5)\n");
    }

    #[test]
    fn dumps_nested_arrays_with_indentation() {
        let mut a = crate::array::PhpArray::new();
        a.push(Value::Int(1));
        let mut out = Vec::new();
        var_dump(&[Value::array(a)], &mut |b| out.extend_from_slice(b)).unwrap();
        assert_eq!(out, b"array(1) {\n  [0]=>\n  int(1)\n}\n");
    }
}
