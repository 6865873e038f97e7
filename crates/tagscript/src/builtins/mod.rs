//! The built-in function registry: a plain `name -> (args) -> Value` lookup
//! consulted by `call_function` once a user-defined function of the same
//! name isn't found (spec's "built-in library contract").
//!
//! Grounded on the teacher's `builtins/mod.rs` one-submodule-per-function
//! layout, with `call()` playing the role of the teacher's own dispatch
//! `match` on the function name. The registry here is deliberately small —
//! a worked example of the contract, not an attempt at the hundreds of
//! string/array/math wrappers a real standard library would carry.
//!
//! Builtins never see the `Evaluator`: they take already-flattened argument
//! values and an output callback, matching the external-collaborator framing
//! in the external-interfaces section of the specification. That also means
//! a builtin cannot invoke a magic method on an object argument (there is no
//! evaluator handle to call through); `var_dump` falls back to a generic
//! rendering for objects rather than consulting `__toString`.

mod array_keys;
mod array_values;
mod count;
mod gettype;
mod strlen;
mod var_dump;

use crate::exception::RunResult;
use crate::value::Value;

/// Looks up and invokes a built-in by name (case-insensitive, matching the
/// rest of the language's function-name resolution). Returns `None` when no
/// built-in of that name exists, so the caller can report "undefined
/// function" itself.
pub fn call(name: &str, args: &[Value], echo: &mut dyn FnMut(&[u8])) -> Option<RunResult<Value>> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "strlen" => Some(strlen::strlen(args)),
        "count" | "sizeof" => Some(count::count(args)),
        "gettype" => Some(gettype::gettype(args)),
        "var_dump" => Some(var_dump::var_dump(args, echo)),
        "array_keys" => Some(array_keys::array_keys(args)),
        "array_values" => Some(array_values::array_values(args)),
        _ => None,
    }
}
