//! `foreach` over arrays, `Iterator`/`IteratorAggregate` objects, plain
//! objects (public properties, insertion order), and generators.
//!
//! Grounded on the teacher's iteration protocol dispatch in
//! `expressions.rs` (try the native iterator slot, fall back to a generic
//! attribute walk) adapted to this language's three concrete surfaces
//! instead of Python's single `__iter__` hook.

use super::{loop_step, Evaluator, Frame, Signal};
use crate::array::ArrayKey;
use crate::ast::{Expr, ExprKind, Stmt};
use crate::environment::Slot;
use crate::exception::{RunError, RunResult};
use crate::output::OutputSink;
use crate::token::Position;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

fn array_key_to_value(k: &ArrayKey) -> Value {
    match k {
        ArrayKey::Int(n) => Value::Int(*n),
        ArrayKey::Str(s) => Value::string(s.clone()),
    }
}

impl<S: OutputSink> Evaluator<S> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn exec_foreach(
        &self,
        expr: &Expr,
        key: Option<&Expr>,
        value: &Expr,
        by_ref: bool,
        body: &[Stmt],
        frame: &Frame,
    ) -> RunResult<Signal> {
        if by_ref {
            if let ExprKind::Variable(name) = &expr.kind {
                return self.exec_foreach_array_by_ref(name, key, value, body, frame);
            }
        }
        let subject = self.eval_expr(expr, frame)?;
        self.exec_foreach_value(subject, key, value, body, frame)
    }

    /// `foreach ($arr as &$v)` — aliases `$v` to a fresh slot seeded with
    /// each element in turn and writes the slot's (possibly mutated) value
    /// back into the array after the body runs. Covers the overwhelmingly
    /// common "mutate in place" idiom; it does not make the alias observable
    /// from outside the loop the way a true reference would.
    fn exec_foreach_array_by_ref(&self, name: &str, key: Option<&Expr>, value: &Expr, body: &[Stmt], frame: &Frame) -> RunResult<Signal> {
        let ExprKind::Variable(value_name) = &value.kind else {
            return Err(RunError::fatal("foreach by reference requires a plain variable"));
        };
        let slot = frame.env.slot_or_create(name);
        let keys: Vec<ArrayKey> = match &*slot.borrow() {
            Value::Array(a) => a.keys().cloned().collect(),
            _ => return Ok(Signal::Normal),
        };
        for k in keys {
            let current = match &*slot.borrow() {
                Value::Array(a) => a.get(&k).cloned(),
                _ => None,
            };
            let Some(current) = current else { continue };
            let item_slot: Slot = Rc::new(RefCell::new(current));
            frame.env.bind_slot(value_name.clone(), item_slot.clone());
            if let Some(k_expr) = key {
                self.assign_to(k_expr, array_key_to_value(&k), frame)?;
            }
            let sig = self.exec_stmts(body, frame)?;
            if let Value::Array(a) = &mut *slot.borrow_mut() {
                a.insert(k.clone(), item_slot.borrow().clone());
            }
            match loop_step(sig) {
                Ok(true) => break,
                Ok(false) => {}
                Err(sig) => return Ok(sig),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_foreach_value(&self, subject: Value, key: Option<&Expr>, value: &Expr, body: &[Stmt], frame: &Frame) -> RunResult<Signal> {
        match subject {
            Value::Array(arr) => {
                let pairs: Vec<(ArrayKey, Value)> = arr.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                for (k, v) in pairs {
                    if let Some(k_expr) = key {
                        self.assign_to(k_expr, array_key_to_value(&k), frame)?;
                    }
                    self.assign_to(value, v, frame)?;
                    match loop_step(self.exec_stmts(body, frame)?) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(sig) => return Ok(sig),
                    }
                }
                Ok(Signal::Normal)
            }
            Value::Generator(gen) => {
                for (k, v) in gen.remaining().cloned().collect::<Vec<_>>() {
                    if let Some(k_expr) = key {
                        self.assign_to(k_expr, k, frame)?;
                    }
                    self.assign_to(value, v, frame)?;
                    gen.advance();
                    match loop_step(self.exec_stmts(body, frame)?) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(sig) => return Ok(sig),
                    }
                }
                Ok(Signal::Normal)
            }
            Value::Object(obj) => {
                let class = obj.borrow().class.clone();
                if self.classes().is_subclass_of(&class, "Iterator") {
                    self.invoke_method(obj.clone(), "rewind", vec![], Position::default())?;
                    loop {
                        let valid = self.invoke_method(obj.clone(), "valid", vec![], Position::default())?;
                        if !valid.is_truthy() {
                            break;
                        }
                        let cur = self.invoke_method(obj.clone(), "current", vec![], Position::default())?;
                        if let Some(k_expr) = key {
                            let k = self.invoke_method(obj.clone(), "key", vec![], Position::default())?;
                            self.assign_to(k_expr, k, frame)?;
                        }
                        self.assign_to(value, cur, frame)?;
                        match loop_step(self.exec_stmts(body, frame)?) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(sig) => return Ok(sig),
                        }
                        self.invoke_method(obj.clone(), "next", vec![], Position::default())?;
                    }
                    Ok(Signal::Normal)
                } else if self.classes().is_subclass_of(&class, "IteratorAggregate") {
                    let inner = self.invoke_method(obj, "getIterator", vec![], Position::default())?;
                    self.exec_foreach_value(inner, key, value, body, frame)
                } else {
                    let props: Vec<(String, Value)> = obj.borrow().props.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    for (k, v) in props {
                        if let Some(k_expr) = key {
                            self.assign_to(k_expr, Value::string(k), frame)?;
                        }
                        self.assign_to(value, v, frame)?;
                        match loop_step(self.exec_stmts(body, frame)?) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(sig) => return Ok(sig),
                        }
                    }
                    Ok(Signal::Normal)
                }
            }
            _ => Ok(Signal::Normal),
        }
    }
}
