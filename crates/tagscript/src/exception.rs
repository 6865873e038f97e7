//! Error handling: the catchable/uncatchable split the evaluator propagates
//! with `?`, plus the catalog of built-in throwable classes seeded into the
//! class registry at startup.
//!
//! Grounded on `examples/parcadei-ouros/crates/ouros/src/exception_private.rs`:
//! same `RunResult<T>` alias and the same `strum`-derived enum-of-kinds
//! idea, but the hierarchy itself lives in the ordinary `ClassRegistry`
//! (built-in throwables are just classes with a `parent`) instead of a
//! bespoke `is_subclass_of` match on the enum — one dispatch path serves
//! both user and built-in exceptions.

use crate::ast::{ClassDecl, Modifiers};
use crate::class::{ClassDef, ClassRegistry};
use crate::token::Position;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;
use strum::{Display, EnumString, IntoStaticStr};

pub type RunResult<T> = Result<T, RunError>;

/// A single entry of the call stack, captured when an exception is thrown so
/// `getTraceAsString()` and the uncaught-exception report can print it.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function: String,
    pub pos: Position,
}

/// What propagates out of evaluator calls on failure.
///
/// `Throw` carries a live `Exception`/`Error` object and is what `try`/
/// `catch` intercepts. `Fatal` is reserved for conditions the language
/// itself treats as uncatchable (resource-limit exhaustion, a parse error
/// surfacing at eval-time) and always terminates the run.
#[derive(Debug)]
pub enum RunError {
    Throw(Value),
    Fatal(String),
    /// A bug in the interpreter itself (an invariant the parser/evaluator
    /// was supposed to uphold didn't hold) — kept distinct from `Fatal` so
    /// it is never mistaken for a language-level fatal error in output.
    Internal(String),
    /// `exit`/`die` — successful early termination, not a language error.
    /// `run()` reports it as a normal finish after flushing any string
    /// argument to output.
    Exit(Option<Value>),
}

impl RunError {
    pub fn fatal(msg: impl Into<String>) -> RunError {
        RunError::Fatal(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> RunError {
        RunError::Internal(msg.into())
    }
}

impl From<crate::resource::ResourceError> for RunError {
    fn from(e: crate::resource::ResourceError) -> RunError {
        use crate::resource::ResourceError;
        match e {
            ResourceError::Recursion { .. } => RunError::Throw(make_exception("Error", e.to_string())),
            ResourceError::Operation { .. } | ResourceError::Time { .. } => RunError::Fatal(e.to_string()),
        }
    }
}

/// The catalog of throwable kinds this interpreter ships with. Used only to
/// seed `ClassRegistry` and as a typed shorthand for constructing common
/// errors from within the evaluator (`ExcType::TypeError.with("...")`);
/// matching a `catch` clause against a thrown value never inspects this
/// enum — it walks the class registry the seeded classes live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum ExcType {
    Exception,
    Error,
    TypeError,
    ValueError,
    ArithmeticError,
    DivisionByZeroError,
    ArgumentCountError,
    UnhandledMatchError,
    RuntimeException,
    LogicException,
    InvalidArgumentException,
    OutOfRangeException,
    OutOfBoundsException,
    RangeException,
    DomainException,
    LengthException,
    UnexpectedValueException,
    JsonException,
}

impl ExcType {
    fn parent(self) -> Option<&'static str> {
        use ExcType::*;
        match self {
            Exception | Error => None,
            TypeError | ValueError | ArithmeticError | UnhandledMatchError => Some("Error"),
            DivisionByZeroError => Some("ArithmeticError"),
            ArgumentCountError => Some("TypeError"),
            RuntimeException | LogicException => Some("Exception"),
            InvalidArgumentException | OutOfRangeException | DomainException | LengthException => Some("LogicException"),
            OutOfBoundsException | RangeException | UnexpectedValueException => Some("RuntimeException"),
            JsonException => Some("Exception"),
        }
    }

    pub fn all() -> &'static [ExcType] {
        use ExcType::*;
        &[
            Exception,
            Error,
            TypeError,
            ValueError,
            ArithmeticError,
            DivisionByZeroError,
            ArgumentCountError,
            UnhandledMatchError,
            RuntimeException,
            LogicException,
            InvalidArgumentException,
            OutOfRangeException,
            OutOfBoundsException,
            RangeException,
            DomainException,
            LengthException,
            UnexpectedValueException,
            JsonException,
        ]
    }
}

/// Registers the built-in throwable hierarchy into `classes`, each as a
/// plain class definition with a `message`/`code`/`file`/`line` property set
/// and a trivial `__construct`, so they participate in ordinary method
/// dispatch and `instanceof` the same as user classes.
pub fn seed_builtin_exceptions(classes: &mut ClassRegistry) {
    for kind in ExcType::all() {
        let name: &'static str = (*kind).into();
        if classes.contains(name) {
            continue;
        }
        let mut decl = ClassDecl { name: name.to_string(), ..Default::default() };
        decl.extends = kind.parent().map(|p| p.to_string());
        classes.define(ClassDef::from_decl(&decl));
    }
}

/// Builds a throwable `Object` value with the given class and message,
/// ready to be wrapped in `RunError::Throw`.
pub fn make_exception(class: &str, message: impl Into<Vec<u8>>) -> Value {
    let mut props = IndexMap::new();
    props.insert("message".to_string(), Value::string(message.into()));
    props.insert("code".to_string(), Value::Int(0));
    props.insert("file".to_string(), Value::string(Vec::new()));
    props.insert("line".to_string(), Value::Int(0));
    props.insert("trace".to_string(), Value::array(crate::array::PhpArray::new()));
    Value::Object(Rc::new(RefCell::new(crate::class::Object { class: class.to_string(), props })))
}

pub fn throw(class: &str, message: impl Into<Vec<u8>>) -> RunError {
    RunError::Throw(make_exception(class, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_hierarchy_so_type_error_is_an_error() {
        let mut reg = ClassRegistry::new();
        seed_builtin_exceptions(&mut reg);
        assert!(reg.is_subclass_of("TypeError", "Error"));
        assert!(reg.is_subclass_of("DivisionByZeroError", "ArithmeticError"));
        assert!(reg.is_subclass_of("DivisionByZeroError", "Error"));
        assert!(!reg.is_subclass_of("ValueError", "Exception"));
    }

    #[test]
    fn make_exception_carries_message_property() {
        let v = make_exception("ValueError", "bad input");
        let Value::Object(o) = v else { panic!() };
        let obj = o.borrow();
        assert_eq!(obj.class, "ValueError");
        assert_eq!(obj.props.get("message"), Some(&Value::string("bad input")));
    }
}
