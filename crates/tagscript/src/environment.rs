//! Variable scoping: a single flat map of named slots per function/method
//! invocation, plus a global root holding functions, classes and constants.
//!
//! The teacher resolves names through slot-indexed `Namespace`/`NamespaceId`
//! tables built during a bytecode-compilation pass
//! (`examples/parcadei-ouros/crates/ouros/src/compiler/`); a tree-walking
//! evaluator has no compilation pass to precompute slots in, so lookups here
//! go through a name-keyed `RefCell<HashMap>` instead — slower, but the
//! natural fit for interpreting the AST directly. Unlike the teacher's
//! language, this one has function-level (not block-level) scoping: `if`,
//! `while` and `for` bodies share their enclosing function's `Env` rather
//! than nesting a child scope, so there is no parent chain to walk. Each
//! variable is a `Rc<RefCell<Value>>` slot rather than a bare `Value` so that
//! `use (&$x)` closures, `foreach ($a as &$v)`, and `global $x` can alias a
//! name in one scope to a name in another by sharing the slot.

use crate::class::ClassRegistry;
use crate::value::{FunctionTable, Value};
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type Slot = Rc<RefCell<Value>>;

#[derive(Debug, Default)]
struct Scope {
    vars: RefCell<AHashMap<String, Slot>>,
}

/// A function/method invocation's local variables, cheaply cloneable (`Rc`)
/// so closures can hold on to the slots they captured after the defining
/// call returns.
#[derive(Debug, Clone)]
pub struct Env(Rc<Scope>);

impl Env {
    /// A fresh scope for a new function/method call — no dynamic scoping, so
    /// it never sees the caller's locals unless `global` or an explicit
    /// capture puts a slot in it.
    pub fn new() -> Env {
        Env(Rc::new(Scope::default()))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.vars.borrow().get(name).map(|slot| slot.borrow().clone())
    }

    pub fn slot(&self, name: &str) -> Option<Slot> {
        self.0.vars.borrow().get(name).cloned()
    }

    /// Returns the slot for `name`, creating an empty-`Null` one if absent —
    /// used wherever a name must exist to be aliased (`&$x`, `foreach (&$v)`)
    /// even if it has never been assigned.
    pub fn slot_or_create(&self, name: &str) -> Slot {
        self.0
            .vars
            .borrow_mut()
            .entry(name.to_string())
            .or_insert_with(|| Rc::new(RefCell::new(Value::Null)))
            .clone()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let mut vars = self.0.vars.borrow_mut();
        match vars.get(&name) {
            Some(slot) => *slot.borrow_mut() = value,
            None => {
                vars.insert(name, Rc::new(RefCell::new(value)));
            }
        }
    }

    /// Binds `name` to an existing slot, aliasing it to whatever other name
    /// (in this or another scope) already owns that slot.
    pub fn bind_slot(&self, name: impl Into<String>, slot: Slot) {
        self.0.vars.borrow_mut().insert(name.into(), slot);
    }

    pub fn unset(&self, name: &str) {
        self.0.vars.borrow_mut().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.0.vars.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

/// Program-wide tables that are not lexically scoped: functions, classes,
/// interfaces/traits (folded into the same `ClassRegistry`), and constants
/// defined via `define()`/top-level `const`.
#[derive(Debug, Default)]
pub struct GlobalTables {
    pub functions: RefCell<FunctionTable>,
    pub classes: RefCell<ClassRegistry>,
    pub constants: RefCell<AHashMap<String, Value>>,
    /// The single top-level `Env`, shared by `global $x` statements anywhere
    /// in the program.
    pub globals: Env,
    /// Canonical paths already pulled in by `include_once`/`require_once`.
    pub included: RefCell<std::collections::HashSet<String>>,
}

impl GlobalTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_function(&self, name: &str, decl: Rc<crate::ast::FunctionDecl>) {
        self.functions.borrow_mut().insert(name.to_ascii_lowercase(), decl);
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<crate::ast::FunctionDecl>> {
        self.functions.borrow().get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn define_class(&self, def: crate::class::ClassDef) {
        self.classes.borrow_mut().define_class(def);
    }

    pub fn define_constant(&self, name: &str, value: Value) -> bool {
        let mut constants = self.constants.borrow_mut();
        if constants.contains_key(name) {
            return false;
        }
        constants.insert(name.to_string(), value);
        true
    }

    pub fn get_constant(&self, name: &str) -> Option<Value> {
        self.constants.borrow().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliased_slots_share_mutations() {
        let env = Env::new();
        env.set("x", Value::Int(1));
        let slot = env.slot("x").unwrap();
        env.bind_slot("y", slot);
        env.set("y", Value::Int(2));
        assert_eq!(env.get("x"), Some(Value::Int(2)));
    }

    #[test]
    fn plain_assignment_does_not_alias() {
        let env = Env::new();
        env.set("x", Value::Int(1));
        env.set("y", env.get("x").unwrap());
        env.set("y", Value::Int(9));
        assert_eq!(env.get("x"), Some(Value::Int(1)));
    }
}
