use crate::array::PhpArray;
use crate::exception::{throw, RunResult};
use crate::value::Value;

/// `array_keys(array $array): array` — keys reindexed from `0`, in
/// insertion order.
pub fn array_keys(args: &[Value]) -> RunResult<Value> {
    let Some(Value::Array(arr)) = args.first() else {
        return Err(throw("TypeError", "array_keys(): Argument #1 ($array) must be of type array"));
    };
    Ok(Value::array(PhpArray::from_values(arr.keys().map(|k| k.to_value()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayKey;

    #[test]
    fn collects_keys_in_order() {
        let mut a = PhpArray::new();
        a.insert(ArrayKey::Str("b".into()), Value::Int(1));
        a.insert(ArrayKey::Int(0), Value::Int(2));
        let Value::Array(out) = array_keys(&[Value::array(a)]).unwrap() else { panic!() };
        let got: Vec<Value> = out.values().cloned().collect();
        assert_eq!(got, vec![Value::string("b"), Value::Int(0)]);
    }
}
