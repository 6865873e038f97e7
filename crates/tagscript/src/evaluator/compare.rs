//! Loose/strict equality and the spaceship three-way comparison.
//!
//! Grounded on the teacher's `py_hash.rs`/comparison helpers in spirit (a
//! dedicated module for the coercion rules a dynamically typed language
//! needs for `==`/`<=>`), adapted to this language's specific loose-equality
//! table (string/number coercion, array comparison by same keys/values,
//! object comparison by identity).

use crate::value::Value;
use std::cmp::Ordering;
use std::rc::Rc;

/// `==` — cross-type coercion per the language's loose comparison table.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Int(x), Float(y)) | (Float(y), Int(x)) => *x as f64 == *y,
        (String(x), String(y)) => {
            if let (Some(nx), Some(ny)) = (numeric_of(a), numeric_of(b)) {
                let _ = (x, y);
                nx == ny
            } else {
                x == y
            }
        }
        (Array(x), Array(y)) => {
            x.len() == y.len() && x.iter().all(|(k, v)| y.get(k).is_some_and(|ov| loose_eq(v, ov)))
        }
        (Object(x), Object(y)) => Rc::ptr_eq(x, y) || (x.borrow().class == y.borrow().class && x.borrow().props == y.borrow().props),
        (Closure(x), Closure(y)) => Rc::ptr_eq(x, y),
        (Resource(x), Resource(y)) => Rc::ptr_eq(x, y),
        (Generator(x), Generator(y)) => Rc::ptr_eq(x, y),
        (Null, Bool(b)) | (Bool(b), Null) => !b,
        (Null, _) | (_, Null) => !b_is_truthy(a, b),
        // Remaining scalar-to-scalar combinations: coerce both to the
        // "richer" of the two types (bool > number > string) and compare.
        (Bool(_), _) | (_, Bool(_)) => a.is_truthy() == b.is_truthy(),
        (Int(_) | Float(_), String(_)) | (String(_), Int(_) | Float(_)) => a.to_float() == b.to_float(),
        _ => false,
    }
}

fn b_is_truthy(a: &Value, b: &Value) -> bool {
    if matches!(a, Value::Null) { b.is_truthy() } else { a.is_truthy() }
}

fn numeric_of(v: &Value) -> Option<f64> {
    match v {
        Value::String(_) if v.is_numeric_string() => Some(v.to_float()),
        _ => None,
    }
}

/// `===` — identical type and value; arrays compare key-order-sensitively
/// with strictly-equal elements, objects by identity.
pub fn strict_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Null, Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Array(x), Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|((k1, v1), (k2, v2))| k1 == k2 && strict_eq(v1, v2))
        }
        (Object(x), Object(y)) => Rc::ptr_eq(x, y),
        (Closure(x), Closure(y)) => Rc::ptr_eq(x, y),
        (Resource(x), Resource(y)) => Rc::ptr_eq(x, y),
        (Generator(x), Generator(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `<=>` — returns `Less`/`Equal`/`Greater`, matching the language's mixed
/// numeric/string/array ordering rules (no attempt at ordering objects
/// beyond identity).
pub fn spaceship(a: &Value, b: &Value) -> Ordering {
    use Value::*;
    match (a, b) {
        (Array(x), Array(y)) => x.len().cmp(&y.len()).then_with(|| {
            for (k, v) in x.iter() {
                match y.get(k) {
                    Some(ov) => {
                        let c = spaceship(v, ov);
                        if c != Ordering::Equal {
                            return c;
                        }
                    }
                    None => return Ordering::Greater,
                }
            }
            Ordering::Equal
        }),
        (String(x), String(y)) if !a.is_numeric_string() || !b.is_numeric_string() => x.cmp(y),
        (Bool(_), _) | (_, Bool(_)) | (Null, _) | (_, Null) => a.is_truthy().cmp(&b.is_truthy()),
        _ => a.to_float().partial_cmp(&b.to_float()).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{ArrayKey, PhpArray};

    #[test]
    fn loose_eq_coerces_numeric_strings() {
        assert!(loose_eq(&Value::Int(1), &Value::string("1")));
        assert!(!strict_eq(&Value::Int(1), &Value::string("1")));
    }

    #[test]
    fn loose_eq_treats_zero_string_as_falsy_equal_to_false() {
        assert!(loose_eq(&Value::Bool(false), &Value::string("0")));
    }

    #[test]
    fn spaceship_is_antisymmetric() {
        let a = Value::Int(3);
        let b = Value::Int(5);
        assert_eq!(spaceship(&a, &b), Ordering::Less);
        assert_eq!(spaceship(&b, &a), Ordering::Greater);
    }

    #[test]
    fn array_strict_eq_requires_same_key_order() {
        let mut x = PhpArray::new();
        x.insert(ArrayKey::Str("a".into()), Value::Int(1));
        x.insert(ArrayKey::Str("b".into()), Value::Int(2));
        let mut y = PhpArray::new();
        y.insert(ArrayKey::Str("b".into()), Value::Int(2));
        y.insert(ArrayKey::Str("a".into()), Value::Int(1));
        assert!(loose_eq(&Value::array(x.clone()), &Value::array(y.clone())));
        assert!(!strict_eq(&Value::array(x), &Value::array(y)));
    }
}
