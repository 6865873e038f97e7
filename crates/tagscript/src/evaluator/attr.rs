//! Property and static-property access, with `__get`/`__set`/`__isset`/
//! `__unset` magic-method fallback and the array/string subscript rules
//! `[]` shares with `ArrayAccess`-implementing objects.
//!
//! Grounded on the teacher's attribute lookup in `object.rs` (miss on the
//! own dict, fall through to a dunder hook) adapted to this language's
//! explicit magic-method names instead of Python's uniform `__getattr__`.

use super::{Evaluator, Frame};
use crate::array::ArrayKey;
use crate::class::ClassDef;
use crate::exception::{throw, RunResult};
use crate::output::OutputSink;
use crate::value::Value;
use std::rc::Rc;

impl<S: OutputSink> Evaluator<S> {
    pub(super) fn read_object_property(&self, obj_val: &Value, name: &str, frame: &Frame) -> RunResult<Value> {
        let Value::Object(obj) = obj_val else {
            return Err(throw("Error", format!("Attempt to read property \"{name}\" on {}", obj_val.type_name())));
        };
        if let Some(v) = obj.borrow().props.get(name).cloned() {
            return Ok(v);
        }
        let class = obj.borrow().class.clone();
        if let Some((_, info)) = self.classes().resolve_method(&class, "__get") {
            return self.call_method_info(&info, obj.clone(), vec![Value::string(name)], frame);
        }
        Ok(Value::Null)
    }

    pub(super) fn set_object_property(&self, obj_val: &Value, name: &str, value: Value, frame: &Frame) -> RunResult<()> {
        let Value::Object(obj) = obj_val else {
            return Err(throw("Error", format!("Attempt to assign property \"{name}\" on {}", obj_val.type_name())));
        };
        let has = obj.borrow().props.contains_key(name);
        if !has {
            let class = obj.borrow().class.clone();
            if let Some((_, info)) = self.classes().resolve_method(&class, "__set") {
                self.call_method_info(&info, obj.clone(), vec![Value::string(name), value], frame)?;
                return Ok(());
            }
        }
        obj.borrow_mut().props.insert(name.to_string(), value);
        Ok(())
    }

    pub(super) fn isset_object_property(&self, obj_val: &Value, name: &str, frame: &Frame) -> RunResult<bool> {
        let Value::Object(obj) = obj_val else { return Ok(false) };
        if let Some(v) = obj.borrow().props.get(name) {
            return Ok(!matches!(v, Value::Null));
        }
        let class = obj.borrow().class.clone();
        if let Some((_, info)) = self.classes().resolve_method(&class, "__isset") {
            let r = self.call_method_info(&info, obj.clone(), vec![Value::string(name)], frame)?;
            return Ok(r.is_truthy());
        }
        Ok(false)
    }

    pub(super) fn unset_object_property(&self, obj_val: &Value, name: &str, frame: &Frame) -> RunResult<()> {
        let Value::Object(obj) = obj_val else { return Ok(()) };
        let has = obj.borrow().props.contains_key(name);
        if has {
            obj.borrow_mut().props.shift_remove(name);
            return Ok(());
        }
        let class = obj.borrow().class.clone();
        if let Some((_, info)) = self.classes().resolve_method(&class, "__unset") {
            self.call_method_info(&info, obj.clone(), vec![Value::string(name)], frame)?;
        }
        Ok(())
    }

    /// `$x[...]` reads: arrays by key, strings by byte offset, objects
    /// through `offsetGet`.
    pub(super) fn array_offset_get(&self, target: &Value, index: Option<Value>, frame: &Frame) -> RunResult<Value> {
        match target {
            Value::Array(arr) => match index {
                Some(i) => Ok(arr.get(&ArrayKey::from_value(&i)).cloned().unwrap_or(Value::Null)),
                None => Err(throw("Error", "Cannot use [] for reading")),
            },
            Value::String(s) => {
                let Some(i) = index else { return Err(throw("Error", "Cannot use [] for reading")) };
                let idx = i.to_int();
                Ok(byte_at(s, idx))
            }
            Value::Object(obj) => {
                let class = obj.borrow().class.clone();
                if let Some((_, info)) = self.classes().resolve_method(&class, "offsetget") {
                    let args = vec![index.unwrap_or(Value::Null)];
                    return self.call_method_info(&info, obj.clone(), args, frame);
                }
                Ok(Value::Null)
            }
            Value::Null => Ok(Value::Null),
            _ => Ok(Value::Null),
        }
    }

    pub(super) fn array_offset_isset(&self, target: &Value, index: Value, frame: &Frame) -> RunResult<bool> {
        match target {
            Value::Array(arr) => Ok(arr.get(&ArrayKey::from_value(&index)).is_some_and(|v| !matches!(v, Value::Null))),
            Value::String(s) => Ok((index.to_int() as usize) < s.len()),
            Value::Object(obj) => {
                let class = obj.borrow().class.clone();
                if let Some((_, info)) = self.classes().resolve_method(&class, "offsetexists") {
                    let r = self.call_method_info(&info, obj.clone(), vec![index], frame)?;
                    return Ok(r.is_truthy());
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn resolve_static_owner(&self, class: &str, name: &str) -> Option<Rc<ClassDef>> {
        let mut cur = self.classes().get(class)?;
        loop {
            if cur.properties.iter().any(|p| p.name == name && p.modifiers.is_static) {
                return Some(cur);
            }
            let parent = cur.parent.clone()?;
            cur = self.classes().get(&parent)?;
        }
    }

    pub(super) fn get_static_prop(&self, class: &str, name: &str) -> RunResult<Value> {
        let owner = match self.resolve_static_owner(class, name) {
            Some(o) => o,
            None => self.classes().get(class).ok_or_else(|| throw("Error", format!("Class \"{class}\" not found")))?,
        };
        if let Some(v) = owner.static_props.borrow().get(name) {
            return Ok(v.clone());
        }
        let default = owner.properties.iter().find(|p| p.name == name).and_then(|p| p.default.clone());
        let v = match default {
            Some(e) => self.eval_expr(&e, &self.global_frame())?,
            None => Value::Null,
        };
        owner.static_props.borrow_mut().insert(name.to_string(), v.clone());
        Ok(v)
    }

    pub(super) fn set_static_prop(&self, class: &str, name: &str, value: Value) {
        let owner = self.resolve_static_owner(class, name).or_else(|| self.classes().get(class));
        if let Some(owner) = owner {
            owner.static_props.borrow_mut().insert(name.to_string(), value);
        }
    }
}

fn byte_at(s: &[u8], idx: i64) -> Value {
    let idx = if idx < 0 { s.len() as i64 + idx } else { idx };
    if idx < 0 {
        return Value::string(Vec::new());
    }
    match s.get(idx as usize) {
        Some(b) => Value::string(vec![*b]),
        None => Value::string(Vec::new()),
    }
}
