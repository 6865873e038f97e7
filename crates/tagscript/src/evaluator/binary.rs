//! Arithmetic, concatenation, and bitwise operator semantics for `Binary`
//! expressions — split out from `expr.rs` the way the teacher keeps
//! `expressions.rs`'s opcode dispatch separate from numeric coercion.

use crate::exception::{throw, RunResult};
use crate::value::Value;

enum Arith {
    Int(i64),
    Float(f64),
}

fn numeric(v: &Value) -> RunResult<Arith> {
    match v {
        Value::Int(n) => Ok(Arith::Int(*n)),
        Value::Float(f) => Ok(Arith::Float(*f)),
        Value::Bool(b) => Ok(Arith::Int(*b as i64)),
        Value::Null => Ok(Arith::Int(0)),
        Value::String(_) if v.is_numeric_string() => {
            let text = String::from_utf8_lossy(&v.to_bytes()).trim().to_string();
            if text.contains('.') || text.to_ascii_lowercase().contains('e') {
                Ok(Arith::Float(v.to_float()))
            } else {
                Ok(Arith::Int(v.to_int()))
            }
        }
        Value::String(_) => Ok(Arith::Int(v.to_int())),
        _ => Err(throw("TypeError", format!("Unsupported operand type: {}", v.type_name()))),
    }
}

/// `+`, `-`, `*`, `/`, `%`, `**` — mixed int/float promotes to float;
/// overflowing int arithmetic silently promotes to float rather than
/// wrapping or panicking.
pub fn add(a: &Value, b: &Value) -> RunResult<Value> {
    if let (Value::Array(x), Value::Array(y)) = (a, b) {
        let mut out = (**x).clone();
        for (k, v) in y.iter() {
            if !out.contains_key(k) {
                out.insert(k.clone(), v.clone());
            }
        }
        return Ok(Value::array(out));
    }
    arith(a, b, |x, y| x.checked_add(y), |x, y| x + y)
}

pub fn sub(a: &Value, b: &Value) -> RunResult<Value> {
    arith(a, b, |x, y| x.checked_sub(y), |x, y| x - y)
}

pub fn mul(a: &Value, b: &Value) -> RunResult<Value> {
    arith(a, b, |x, y| x.checked_mul(y), |x, y| x * y)
}

pub fn div(a: &Value, b: &Value) -> RunResult<Value> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    let (fa, fb) = (to_f64(&na), to_f64(&nb));
    if fb == 0.0 {
        return Err(throw("DivisionByZeroError", "Division by zero"));
    }
    if let (Arith::Int(x), Arith::Int(y)) = (&na, &nb) {
        if y != &0 && x % y == 0 {
            return Ok(Value::Int(x / y));
        }
    }
    Ok(Value::Float(fa / fb))
}

pub fn modulo(a: &Value, b: &Value) -> RunResult<Value> {
    let y = b.to_int();
    if y == 0 {
        return Err(throw("DivisionByZeroError", "Modulo by zero"));
    }
    Ok(Value::Int(a.to_int() % y))
}

pub fn pow(a: &Value, b: &Value) -> RunResult<Value> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    if let (Arith::Int(x), Arith::Int(y)) = (&na, &nb) {
        if *y >= 0 {
            if let Some(r) = checked_ipow(*x, *y as u32) {
                return Ok(Value::Int(r));
            }
        }
    }
    Ok(Value::Float(to_f64(&na).powf(to_f64(&nb))))
}

fn checked_ipow(base: i64, exp: u32) -> Option<i64> {
    let mut result: i64 = 1;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result.checked_mul(b)?;
        }
        e >>= 1;
        if e > 0 {
            b = b.checked_mul(b)?;
        }
    }
    Some(result)
}

fn to_f64(a: &Arith) -> f64 {
    match a {
        Arith::Int(n) => *n as f64,
        Arith::Float(f) => *f,
    }
}

fn arith(a: &Value, b: &Value, int_op: impl Fn(i64, i64) -> Option<i64>, float_op: impl Fn(f64, f64) -> f64) -> RunResult<Value> {
    let (na, nb) = (numeric(a)?, numeric(b)?);
    match (na, nb) {
        (Arith::Int(x), Arith::Int(y)) => match int_op(x, y) {
            Some(r) => Ok(Value::Int(r)),
            None => Ok(Value::Float(float_op(x as f64, y as f64))),
        },
        (x, y) => Ok(Value::Float(float_op(to_f64(&x), to_f64(&y)))),
    }
}

/// `.` — both operands coerce to their string representation.
pub fn concat(a: &Value, b: &Value) -> Value {
    let mut bytes = a.to_bytes();
    bytes.extend(b.to_bytes());
    Value::string(bytes)
}

pub fn bit_and(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() & b.to_int())
}
pub fn bit_or(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() | b.to_int())
}
pub fn bit_xor(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int() ^ b.to_int())
}
pub fn shl(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int().wrapping_shl(b.to_int() as u32))
}
pub fn shr(a: &Value, b: &Value) -> Value {
    Value::Int(a.to_int().wrapping_shr(b.to_int() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_overflow_promotes_to_float() {
        let r = add(&Value::Int(i64::MAX), &Value::Int(1)).unwrap();
        assert!(matches!(r, Value::Float(_)));
    }

    #[test]
    fn division_prefers_exact_int_result() {
        assert_eq!(div(&Value::Int(10), &Value::Int(2)).unwrap(), Value::Int(5));
        assert!(matches!(div(&Value::Int(10), &Value::Int(3)).unwrap(), Value::Float(_)));
    }

    #[test]
    fn division_by_zero_throws() {
        assert!(div(&Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn array_plus_keeps_left_side_keys() {
        use crate::array::{ArrayKey, PhpArray};
        let mut x = PhpArray::new();
        x.insert(ArrayKey::Int(0), Value::Int(1));
        let mut y = PhpArray::new();
        y.insert(ArrayKey::Int(0), Value::Int(99));
        y.insert(ArrayKey::Int(1), Value::Int(2));
        let r = add(&Value::array(x), &Value::array(y)).unwrap();
        let arr = r.as_array().unwrap();
        assert_eq!(arr.get(&ArrayKey::Int(0)), Some(&Value::Int(1)));
        assert_eq!(arr.get(&ArrayKey::Int(1)), Some(&Value::Int(2)));
    }
}
