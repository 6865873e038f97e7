use crate::exception::{throw, RunResult};
use crate::value::Value;

/// `gettype(mixed $value): string` — the same names `Value::type_name`
/// already uses for this language's type-juggling diagnostics, so this
/// builtin is a thin wrapper rather than its own mapping table.
pub fn gettype(args: &[Value]) -> RunResult<Value> {
    let Some(v) = args.first() else {
        return Err(throw("ArgumentCountError", "gettype() expects exactly 1 argument, 0 given"));
    };
    Ok(Value::string(v.type_name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_the_source_language() {
        assert_eq!(gettype(&[Value::Int(1)]).unwrap(), Value::string("integer"));
        assert_eq!(gettype(&[Value::Null]).unwrap(), Value::string("NULL"));
        assert_eq!(gettype(&[Value::Bool(true)]).unwrap(), Value::string("boolean"));
    }
}
