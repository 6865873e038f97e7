use crate::exception::{throw, RunResult};
use crate::value::Value;

/// `strlen(string $string): int` — byte length, not a codepoint count.
pub fn strlen(args: &[Value]) -> RunResult<Value> {
    let Some(v) = args.first() else {
        return Err(throw("ArgumentCountError", "strlen() expects exactly 1 argument, 0 given"));
    };
    Ok(Value::Int(v.to_bytes().len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bytes_not_chars() {
        assert_eq!(strlen(&[Value::string("hello")]).unwrap(), Value::Int(5));
        assert_eq!(strlen(&[Value::Int(12345)]).unwrap(), Value::Int(5));
    }
}
