use crate::array::PhpArray;
use crate::exception::{throw, RunResult};
use crate::value::Value;

/// `array_values(array $array): array` — values reindexed from `0`,
/// discarding the original keys.
pub fn array_values(args: &[Value]) -> RunResult<Value> {
    let Some(Value::Array(arr)) = args.first() else {
        return Err(throw("TypeError", "array_values(): Argument #1 ($array) must be of type array"));
    };
    Ok(Value::array(PhpArray::from_values(arr.values().cloned())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayKey;

    #[test]
    fn reindexes_from_zero() {
        let mut a = PhpArray::new();
        a.insert(ArrayKey::Str("a".into()), Value::Int(10));
        a.insert(ArrayKey::Str("b".into()), Value::Int(20));
        let Value::Array(out) = array_values(&[Value::array(a)]).unwrap() else { panic!() };
        assert!(out.is_list());
        assert_eq!(out.get(&ArrayKey::Int(0)), Some(&Value::Int(10)));
    }
}
