use crate::exception::{throw, RunResult};
use crate::value::Value;

/// `count(mixed $value): int` — element count for an array, `0` for `null`,
/// `1` for any other scalar/object (matching the modern language's
/// non-countable-argument behavior rather than raising).
pub fn count(args: &[Value]) -> RunResult<Value> {
    let Some(v) = args.first() else {
        return Err(throw("ArgumentCountError", "count() expects exactly 1 argument, 0 given"));
    };
    let n = match v {
        Value::Array(a) => a.len() as i64,
        Value::Null => 0,
        _ => 1,
    };
    Ok(Value::Int(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArrayKey, PhpArray};

    #[test]
    fn counts_array_elements() {
        let mut a = PhpArray::new();
        a.insert(ArrayKey::Int(0), Value::Int(1));
        a.insert(ArrayKey::Int(1), Value::Int(2));
        assert_eq!(count(&[Value::array(a)]).unwrap(), Value::Int(2));
    }

    #[test]
    fn scalars_count_as_one() {
        assert_eq!(count(&[Value::Int(5)]).unwrap(), Value::Int(1));
        assert_eq!(count(&[Value::Null]).unwrap(), Value::Int(0));
    }
}
