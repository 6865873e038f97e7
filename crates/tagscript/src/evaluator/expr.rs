//! Expression evaluation and lvalue assignment — the other half of the
//! tree-walking evaluator, split from `mod.rs`'s statement dispatch the way
//! the teacher keeps opcode *decoding* (`bytecode/vm/mod.rs`) separate from
//! opcode *execution*; here the split is expression-kind vs. statement-kind
//! rather than decode-vs-execute, since there is no bytecode stage.

use super::{binary, compare, Evaluator, Frame};
use crate::array::{ArrayKey, PhpArray};
use crate::ast::{BinOp, Expr, ExprKind, IncDecOp, Stmt, StmtKind, UnOp};
use crate::class::Object;
use crate::exception::{throw, RunError, RunResult};
use crate::output::OutputSink;
use crate::token::CastKind;
use crate::value::{ClosureData, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

fn array_key_to_value(k: &ArrayKey) -> Value {
    match k {
        ArrayKey::Int(n) => Value::Int(*n),
        ArrayKey::Str(s) => Value::string(s.clone()),
    }
}

impl<S: OutputSink> Evaluator<S> {
    pub(super) fn eval_expr(&self, expr: &Expr, frame: &Frame) -> RunResult<Value> {
        match &expr.kind {
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::String(s) => Ok(Value::string(s.clone())),
            ExprKind::Encapsed(parts) => {
                let mut bytes = Vec::new();
                for part in parts {
                    match part {
                        crate::ast::StringPart::Literal(b) => bytes.extend_from_slice(b),
                        crate::ast::StringPart::Expr(e) => {
                            let v = self.eval_expr(e, frame)?;
                            bytes.extend(self.to_bytes(&v, frame)?);
                        }
                    }
                }
                Ok(Value::string(bytes))
            }
            ExprKind::Variable(name) => {
                if name == "this" {
                    return Ok(frame.this.clone().map(Value::Object).unwrap_or(Value::Null));
                }
                Ok(frame.env.get(name).unwrap_or(Value::Null))
            }
            ExprKind::VariableVariable(inner) => {
                let v = self.eval_expr(inner, frame)?;
                let name = String::from_utf8_lossy(&v.to_bytes()).into_owned();
                Ok(frame.env.get(&name).unwrap_or(Value::Null))
            }
            ExprKind::ArrayLiteral(items) => {
                let mut arr = PhpArray::new();
                for item in items {
                    if item.unpack {
                        let v = self.eval_expr(&item.value, frame)?;
                        if let Value::Array(inner) = v {
                            for (k, val) in inner.iter() {
                                match k {
                                    ArrayKey::Str(_) => arr.insert(k.clone(), val.clone()),
                                    ArrayKey::Int(_) => {
                                        arr.push(val.clone());
                                    }
                                }
                            }
                        }
                        continue;
                    }
                    let v = self.eval_expr(&item.value, frame)?;
                    match &item.key {
                        Some(k) => {
                            let kv = self.eval_expr(k, frame)?;
                            arr.insert(ArrayKey::from_value(&kv), v);
                        }
                        None => {
                            arr.push(v);
                        }
                    }
                }
                Ok(Value::array(arr))
            }
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs, frame),
            ExprKind::Unary { op, expr: inner } => {
                let v = self.eval_expr(inner, frame)?;
                Ok(match op {
                    UnOp::Not => Value::Bool(!v.is_truthy()),
                    UnOp::BitNot => Value::Int(!v.to_int()),
                    UnOp::Pos => match v {
                        Value::Float(f) => Value::Float(f),
                        Value::Int(n) => Value::Int(n),
                        other if other.is_numeric_string() && other.to_bytes().contains(&b'.') => Value::Float(other.to_float()),
                        other => Value::Int(other.to_int()),
                    },
                    UnOp::Neg => match v {
                        Value::Float(f) => Value::Float(-f),
                        Value::Int(n) => n.checked_neg().map(Value::Int).unwrap_or(Value::Float(-(n as f64))),
                        other => Value::Float(-other.to_float()),
                    },
                })
            }
            ExprKind::IncDec { op, target } => self.eval_incdec(*op, target, frame),
            ExprKind::Assign { target, op, value } => {
                let v = match op {
                    None => self.eval_expr(value, frame)?,
                    Some(bop) => {
                        let cur = self.eval_expr(target, frame)?;
                        let rhs = self.eval_expr(value, frame)?;
                        self.apply_binop(*bop, &cur, &rhs, frame)?
                    }
                };
                self.assign_to(target, v, frame)
            }
            ExprKind::AssignRef { target, value } => {
                let slot = match &value.kind {
                    ExprKind::Variable(name) => frame.env.slot_or_create(name),
                    _ => {
                        let v = self.eval_expr(value, frame)?;
                        Rc::new(RefCell::new(v))
                    }
                };
                if let ExprKind::Variable(name) = &target.kind {
                    frame.env.bind_slot(name.clone(), slot.clone());
                    Ok(slot.borrow().clone())
                } else {
                    let v = slot.borrow().clone();
                    self.assign_to(target, v, frame)
                }
            }
            ExprKind::Coalesce { lhs, rhs } => {
                if self.check_isset(lhs, frame).unwrap_or(false) {
                    self.eval_expr(lhs, frame)
                } else {
                    self.eval_expr(rhs, frame)
                }
            }
            ExprKind::CoalesceAssign { target, value } => {
                if self.check_isset(target, frame).unwrap_or(false) {
                    return self.eval_expr(target, frame);
                }
                let v = self.eval_expr(value, frame)?;
                self.assign_to(target, v, frame)
            }
            ExprKind::Ternary { cond, then, else_ } => {
                let c = self.eval_expr(cond, frame)?;
                if c.is_truthy() {
                    match then {
                        Some(t) => self.eval_expr(t, frame),
                        None => Ok(c),
                    }
                } else {
                    self.eval_expr(else_, frame)
                }
            }
            ExprKind::Call { callee, args } => {
                let argv = self.eval_args(args, frame)?;
                match &callee.kind {
                    ExprKind::Name(name) => self.call_function(name, argv, expr.pos),
                    _ => {
                        let v = self.eval_expr(callee, frame)?;
                        self.call_callable(v, argv, frame, expr.pos)
                    }
                }
            }
            ExprKind::MethodCall { object, nullsafe, method, args } => {
                let obj_val = self.eval_expr(object, frame)?;
                if *nullsafe && matches!(obj_val, Value::Null) {
                    return Ok(Value::Null);
                }
                let name = self.member_name(method, frame)?;
                let argv = self.eval_args(args, frame)?;
                match obj_val {
                    Value::Object(o) => self.invoke_method(o, &name, argv, expr.pos),
                    other => Err(throw("Error", format!("Call to a member function {name}() on {}", other.type_name()))),
                }
            }
            ExprKind::StaticCall { class, method, args } => {
                let class_name = self.resolve_class_name(class, frame)?;
                let argv = self.eval_args(args, frame)?;
                self.invoke_static(&class_name, method, argv, frame, expr.pos)
            }
            ExprKind::PropertyFetch { object, nullsafe, property } => {
                let obj_val = self.eval_expr(object, frame)?;
                if *nullsafe && matches!(obj_val, Value::Null) {
                    return Ok(Value::Null);
                }
                let name = self.member_name(property, frame)?;
                self.read_object_property(&obj_val, &name, frame)
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                let class_name = self.resolve_class_name(class, frame)?;
                self.get_static_prop(&class_name, property)
            }
            ExprKind::ClassConstFetch { class, constant } => {
                if constant == "class" {
                    return Ok(Value::string(self.resolve_class_name(class, frame)?));
                }
                let class_name = self.resolve_class_name(class, frame)?;
                self.resolve_class_constant(&class_name, constant)
            }
            ExprKind::ArrayAccess { array, index } => {
                let target = self.eval_expr(array, frame)?;
                let index = match index {
                    Some(e) => Some(self.eval_expr(e, frame)?),
                    None => None,
                };
                self.array_offset_get(&target, index, frame)
            }
            ExprKind::New { class, args } => {
                let class_name = self.resolve_class_name(class, frame)?;
                let argv = self.eval_args(args, frame)?;
                self.instantiate(&class_name, argv, expr.pos)
            }
            ExprKind::Clone(e) => {
                let v = self.eval_expr(e, frame)?;
                match v {
                    Value::Object(o) => {
                        let cloned = Rc::new(RefCell::new(Object { class: o.borrow().class.clone(), props: o.borrow().props.clone() }));
                        let class = cloned.borrow().class.clone();
                        if let Some((_, info)) = self.classes().resolve_method(&class, "__clone") {
                            self.call_method_info(&info, cloned.clone(), Vec::new(), frame)?;
                        }
                        Ok(Value::Object(cloned))
                    }
                    other => Ok(other),
                }
            }
            ExprKind::Instanceof { expr: e, class } => {
                let v = self.eval_expr(e, frame)?;
                let class_name = self.resolve_class_name(class, frame)?;
                let is = match &v {
                    Value::Object(o) => self.classes().is_subclass_of(&o.borrow().class, &class_name),
                    Value::Closure(_) => class_name.eq_ignore_ascii_case("Closure"),
                    Value::Generator(_) => {
                        class_name.eq_ignore_ascii_case("Generator")
                            || class_name.eq_ignore_ascii_case("Iterator")
                            || class_name.eq_ignore_ascii_case("Traversable")
                    }
                    _ => false,
                };
                Ok(Value::Bool(is))
            }
            ExprKind::Closure { params, uses, is_static, body, is_generator, .. } => {
                let env = crate::environment::Env::new();
                for u in uses {
                    if u.by_ref {
                        let slot = frame.env.slot_or_create(&u.name);
                        env.bind_slot(u.name.clone(), slot);
                    } else {
                        let v = frame.env.get(&u.name).unwrap_or(Value::Null);
                        env.set(u.name.clone(), v.deep_clone());
                    }
                }
                let bound_this = if *is_static { None } else { frame.this.clone() };
                Ok(Value::Closure(Rc::new(ClosureData {
                    params: params.clone(),
                    body: body.clone(),
                    captured: env,
                    bound_this,
                    bound_class: frame.class.clone(),
                    is_generator: *is_generator,
                    name: String::new(),
                })))
            }
            ExprKind::ArrowFunc { params, is_static, body } => {
                let bound_this = if *is_static { None } else { frame.this.clone() };
                let wrapped = vec![Stmt { kind: StmtKind::Return(Some((**body).clone())), pos: expr.pos }];
                Ok(Value::Closure(Rc::new(ClosureData {
                    params: params.clone(),
                    body: wrapped,
                    captured: frame.env.clone(),
                    bound_this,
                    bound_class: frame.class.clone(),
                    is_generator: false,
                    name: String::new(),
                })))
            }
            ExprKind::Match { subject, arms } => {
                let subj = self.eval_expr(subject, frame)?;
                for arm in arms {
                    match &arm.conds {
                        Some(conds) => {
                            for c in conds {
                                let cv = self.eval_expr(c, frame)?;
                                if compare::strict_eq(&subj, &cv) {
                                    return self.eval_expr(&arm.body, frame);
                                }
                            }
                        }
                        None => return self.eval_expr(&arm.body, frame),
                    }
                }
                Err(throw("UnhandledMatchError", format!("Unhandled match case {}", String::from_utf8_lossy(&subj.to_bytes()))))
            }
            ExprKind::Yield { key, value } => {
                let k = match key {
                    Some(e) => Some(self.eval_expr(e, frame)?),
                    None => None,
                };
                let v = match value {
                    Some(e) => self.eval_expr(e, frame)?,
                    None => Value::Null,
                };
                self.record_yield(k, v);
                Ok(Value::Null)
            }
            ExprKind::YieldFrom(e) => {
                let v = self.eval_expr(e, frame)?;
                match v {
                    Value::Array(arr) => {
                        for (k, val) in arr.iter() {
                            self.record_yield(Some(array_key_to_value(k)), val.clone());
                        }
                        Ok(Value::Null)
                    }
                    Value::Generator(g) => {
                        for (k, val) in g.remaining() {
                            self.record_yield(Some(k.clone()), val.clone());
                        }
                        Ok(g.return_value())
                    }
                    _ => Ok(Value::Null),
                }
            }
            ExprKind::Throw(e) => {
                let v = self.eval_expr(e, frame)?;
                Err(RunError::Throw(v))
            }
            ExprKind::Include { .. } => Err(RunError::fatal("file inclusion is not supported")),
            ExprKind::Isset(exprs) => {
                for e in exprs {
                    if !self.check_isset(e, frame)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            ExprKind::Empty(e) => {
                if !self.check_isset(e, frame)? {
                    return Ok(Value::Bool(true));
                }
                let v = self.eval_expr(e, frame)?;
                Ok(Value::Bool(!v.is_truthy()))
            }
            ExprKind::Eval(_) => Err(RunError::fatal("dynamic code evaluation is not supported")),
            ExprKind::Exit(e) => {
                let v = match e {
                    Some(inner) => Some(self.eval_expr(inner, frame)?),
                    None => None,
                };
                Err(RunError::Exit(v))
            }
            ExprKind::List(_) => Err(RunError::internal("list() used outside of an assignment target")),
            ExprKind::Name(name) => self.resolve_constant_name(name),
            ExprKind::MagicConst(name) => Ok(self.eval_magic_const(name, expr, frame)),
            ExprKind::ErrorSuppress(e) => self.eval_expr(e, frame),
            ExprKind::Cast { kind, expr: inner } => self.eval_cast(*kind, inner, frame),
            ExprKind::Print(e) => {
                let v = self.eval_expr(e, frame)?;
                let bytes = self.to_bytes(&v, frame)?;
                self.echo(&bytes);
                Ok(Value::Int(1))
            }
        }
    }

    fn eval_binary(&self, op: BinOp, lhs: &Expr, rhs: &Expr, frame: &Frame) -> RunResult<Value> {
        match op {
            BinOp::And => Ok(Value::Bool(self.eval_expr(lhs, frame)?.is_truthy() && self.eval_expr(rhs, frame)?.is_truthy())),
            BinOp::Or => Ok(Value::Bool(self.eval_expr(lhs, frame)?.is_truthy() || self.eval_expr(rhs, frame)?.is_truthy())),
            _ => {
                let a = self.eval_expr(lhs, frame)?;
                let b = self.eval_expr(rhs, frame)?;
                self.apply_binop(op, &a, &b, frame)
            }
        }
    }

    fn apply_binop(&self, op: BinOp, a: &Value, b: &Value, frame: &Frame) -> RunResult<Value> {
        use BinOp::*;
        Ok(match op {
            Add => binary::add(a, b)?,
            Sub => binary::sub(a, b)?,
            Mul => binary::mul(a, b)?,
            Div => binary::div(a, b)?,
            Mod => binary::modulo(a, b)?,
            Pow => binary::pow(a, b)?,
            Concat => {
                let mut bytes = self.to_bytes(a, frame)?;
                bytes.extend(self.to_bytes(b, frame)?);
                Value::string(bytes)
            }
            Eq => Value::Bool(compare::loose_eq(a, b)),
            NotEq => Value::Bool(!compare::loose_eq(a, b)),
            Identical => Value::Bool(compare::strict_eq(a, b)),
            NotIdentical => Value::Bool(!compare::strict_eq(a, b)),
            Lt => Value::Bool(compare::spaceship(a, b) == Ordering::Less),
            Le => Value::Bool(compare::spaceship(a, b) != Ordering::Greater),
            Gt => Value::Bool(compare::spaceship(a, b) == Ordering::Greater),
            Ge => Value::Bool(compare::spaceship(a, b) != Ordering::Less),
            Spaceship => Value::Int(match compare::spaceship(a, b) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }),
            And => Value::Bool(a.is_truthy() && b.is_truthy()),
            Or => Value::Bool(a.is_truthy() || b.is_truthy()),
            Xor => Value::Bool(a.is_truthy() ^ b.is_truthy()),
            BitAnd => binary::bit_and(a, b),
            BitOr => binary::bit_or(a, b),
            BitXor => binary::bit_xor(a, b),
            Shl => binary::shl(a, b),
            Shr => binary::shr(a, b),
        })
    }

    fn eval_incdec(&self, op: IncDecOp, target: &Expr, frame: &Frame) -> RunResult<Value> {
        let old = self.eval_expr(target, frame)?;
        let new = match op {
            IncDecOp::PreInc | IncDecOp::PostInc => binary::add(&old, &Value::Int(1))?,
            IncDecOp::PreDec | IncDecOp::PostDec if matches!(old, Value::Null) => Value::Null,
            IncDecOp::PreDec | IncDecOp::PostDec => binary::sub(&old, &Value::Int(1))?,
        };
        self.assign_to(target, new.clone(), frame)?;
        Ok(match op {
            IncDecOp::PreInc | IncDecOp::PreDec => new,
            IncDecOp::PostInc | IncDecOp::PostDec => old,
        })
    }

    /// Recursive lvalue assignment. Compound targets (`$a['x']['y']`) clone
    /// the container, mutate the clone, then recurse on the inner expression
    /// to write the mutated container back — the same strategy `unset()`'s
    /// `with_array_mut` uses, so the two compose for nested cases.
    pub(super) fn assign_to(&self, target: &Expr, value: Value, frame: &Frame) -> RunResult<Value> {
        match &target.kind {
            ExprKind::Variable(name) => {
                frame.env.set(name.clone(), value.clone());
                Ok(value)
            }
            ExprKind::VariableVariable(inner) => {
                let nv = self.eval_expr(inner, frame)?;
                let name = String::from_utf8_lossy(&nv.to_bytes()).into_owned();
                frame.env.set(name, value.clone());
                Ok(value)
            }
            ExprKind::ArrayAccess { array, index } => {
                let mut container = self.eval_expr(array, frame)?;
                match &mut container {
                    Value::Array(arr) => match index {
                        Some(idx_expr) => {
                            let k = self.eval_expr(idx_expr, frame)?;
                            arr.insert(ArrayKey::from_value(&k), value.clone());
                        }
                        None => {
                            arr.push(value.clone());
                        }
                    },
                    Value::Object(obj) => {
                        let idx_val = match index {
                            Some(e) => self.eval_expr(e, frame)?,
                            None => Value::Null,
                        };
                        let class = obj.borrow().class.clone();
                        if let Some((_, info)) = self.classes().resolve_method(&class, "offsetset") {
                            self.call_method_info(&info, obj.clone(), vec![idx_val, value.clone()], frame)?;
                            return Ok(value);
                        }
                        return Err(throw("Error", "Cannot use object as array"));
                    }
                    Value::Null => {
                        let mut arr = PhpArray::new();
                        match index {
                            Some(idx_expr) => {
                                let k = self.eval_expr(idx_expr, frame)?;
                                arr.insert(ArrayKey::from_value(&k), value.clone());
                            }
                            None => {
                                arr.push(value.clone());
                            }
                        }
                        container = Value::array(arr);
                    }
                    Value::String(s) => {
                        if let Some(idx_expr) = index {
                            let idx = self.eval_expr(idx_expr, frame)?.to_int();
                            let byte = value.to_bytes().first().copied().unwrap_or(b' ');
                            let mut bytes = (**s).clone();
                            let i = if idx < 0 { (bytes.len() as i64 + idx).max(0) as usize } else { idx as usize };
                            while bytes.len() <= i {
                                bytes.push(b' ');
                            }
                            bytes[i] = byte;
                            container = Value::string(bytes);
                        }
                    }
                    _ => return Err(throw("Error", "Cannot use a scalar value as an array")),
                }
                self.assign_to(array, container, frame)?;
                Ok(value)
            }
            ExprKind::PropertyFetch { object, property, .. } => {
                let obj_val = self.eval_expr(object, frame)?;
                let name = self.member_name(property, frame)?;
                self.set_object_property(&obj_val, &name, value.clone(), frame)?;
                Ok(value)
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                let class_name = self.resolve_class_name(class, frame)?;
                self.set_static_prop(&class_name, property, value.clone());
                Ok(value)
            }
            ExprKind::List(items) => {
                if let Value::Array(arr) = &value {
                    let mut auto_idx = 0i64;
                    for item in items {
                        match item {
                            None => auto_idx += 1,
                            Some(ai) => {
                                let key = match &ai.key {
                                    Some(ke) => ArrayKey::from_value(&self.eval_expr(ke, frame)?),
                                    None => {
                                        let k = ArrayKey::Int(auto_idx);
                                        auto_idx += 1;
                                        k
                                    }
                                };
                                let v = arr.get(&key).cloned().unwrap_or(Value::Null);
                                self.assign_to(&ai.value, v, frame)?;
                            }
                        }
                    }
                }
                Ok(value)
            }
            _ => Err(RunError::internal("invalid assignment target")),
        }
    }

    fn check_isset(&self, expr: &Expr, frame: &Frame) -> RunResult<bool> {
        match &expr.kind {
            ExprKind::Variable(name) => Ok(frame.env.get(name).is_some_and(|v| !matches!(v, Value::Null))),
            ExprKind::ArrayAccess { array, index: Some(idx) } => {
                let base = self.eval_expr(array, frame)?;
                let key = self.eval_expr(idx, frame)?;
                self.array_offset_isset(&base, key, frame)
            }
            ExprKind::PropertyFetch { object, property, .. } => {
                let obj = self.eval_expr(object, frame)?;
                let name = self.member_name(property, frame)?;
                self.isset_object_property(&obj, &name, frame)
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                let class_name = self.resolve_class_name(class, frame)?;
                let v = self.get_static_prop(&class_name, property)?;
                Ok(!matches!(v, Value::Null))
            }
            _ => Ok(!matches!(self.eval_expr(expr, frame)?, Value::Null)),
        }
    }

    /// Resolves `self`/`parent`/`static`/a literal class name/an object or
    /// string expression into a concrete class name, for every `ExprKind`
    /// that names a class (`new`, `Foo::bar()`, `Foo::$x`, `Foo::CONST`,
    /// `instanceof`).
    pub(super) fn resolve_class_name(&self, expr: &Expr, frame: &Frame) -> RunResult<String> {
        match &expr.kind {
            ExprKind::Name(n) if n.eq_ignore_ascii_case("self") => {
                frame.class.clone().ok_or_else(|| RunError::fatal("Cannot access self:: when no class scope is active"))
            }
            ExprKind::Name(n) if n.eq_ignore_ascii_case("parent") => {
                let class = frame.class.clone().ok_or_else(|| RunError::fatal("Cannot access parent:: when no class scope is active"))?;
                self.classes().get(&class).and_then(|d| d.parent.clone()).ok_or_else(|| RunError::fatal(format!("{class} does not have a parent class")))
            }
            ExprKind::Name(n) if n.eq_ignore_ascii_case("static") => frame
                .static_class
                .clone()
                .or_else(|| frame.class.clone())
                .ok_or_else(|| RunError::fatal("Cannot access static:: when no class scope is active")),
            ExprKind::Name(n) => Ok(n.clone()),
            _ => match self.eval_expr(expr, frame)? {
                Value::Object(o) => Ok(o.borrow().class.clone()),
                Value::String(s) => Ok(String::from_utf8_lossy(&s).into_owned()),
                other => Err(throw("TypeError", format!("Class name must be a valid object or string, {} given", other.type_name()))),
            },
        }
    }

    fn resolve_class_constant(&self, class: &str, name: &str) -> RunResult<Value> {
        let mut cur_name = class.to_string();
        loop {
            let def = { self.classes().get(&cur_name) }.ok_or_else(|| throw("Error", format!("Class \"{cur_name}\" not found")))?;
            if let Some(v) = def.constants.borrow().get(name).cloned() {
                return Ok(v);
            }
            if let Some(e) = def.const_exprs.get(name).cloned() {
                let v = self.eval_expr(&e, &self.global_frame())?;
                def.constants.borrow_mut().insert(name.to_string(), v.clone());
                return Ok(v);
            }
            match def.parent.clone() {
                Some(p) => cur_name = p,
                None => break,
            }
        }
        Err(throw("Error", format!("Undefined constant {class}::{name}")))
    }

    /// Looks up a bareword (`FOO`, `PHP_EOL`) as a constant: the handful of
    /// predefined ones first, then anything `define()`d at runtime.
    fn resolve_constant_name(&self, name: &str) -> RunResult<Value> {
        match name {
            "PHP_EOL" => return Ok(Value::string("\n")),
            "PHP_INT_MAX" => return Ok(Value::Int(i64::MAX)),
            "PHP_INT_MIN" => return Ok(Value::Int(i64::MIN)),
            "PHP_INT_SIZE" => return Ok(Value::Int(8)),
            "PHP_FLOAT_EPSILON" => return Ok(Value::Float(f64::EPSILON)),
            "NAN" => return Ok(Value::Float(f64::NAN)),
            "INF" => return Ok(Value::Float(f64::INFINITY)),
            "M_PI" => return Ok(Value::Float(std::f64::consts::PI)),
            "M_E" => return Ok(Value::Float(std::f64::consts::E)),
            _ => {}
        }
        if let Some(v) = self.globals.get_constant(name) {
            return Ok(v);
        }
        Err(throw("Error", format!("Undefined constant \"{name}\"")))
    }

    fn eval_magic_const(&self, name: &str, expr: &Expr, frame: &Frame) -> Value {
        match name {
            "__LINE__" => Value::Int(expr.pos.line as i64),
            "__CLASS__" => Value::string(frame.class.clone().unwrap_or_default()),
            "__FUNCTION__" => {
                let label = self.current_function_label();
                Value::string(label.rsplit("::").next().unwrap_or("").to_string())
            }
            "__METHOD__" => Value::string(self.current_function_label()),
            _ => Value::string(Vec::new()),
        }
    }

    fn eval_cast(&self, kind: CastKind, inner: &Expr, frame: &Frame) -> RunResult<Value> {
        let v = self.eval_expr(inner, frame)?;
        Ok(match kind {
            CastKind::Int => Value::Int(v.to_int()),
            CastKind::Float => Value::Float(v.to_float()),
            CastKind::Bool => Value::Bool(v.is_truthy()),
            CastKind::String => Value::string(self.to_bytes(&v, frame)?),
            CastKind::Unset => Value::Null,
            CastKind::Array => match v {
                Value::Array(_) => v,
                Value::Null => Value::array(PhpArray::new()),
                Value::Object(o) => {
                    let mut arr = PhpArray::new();
                    for (k, val) in o.borrow().props.iter() {
                        arr.insert(ArrayKey::from_str_key(k), val.clone());
                    }
                    Value::array(arr)
                }
                other => {
                    let mut arr = PhpArray::new();
                    arr.push(other);
                    Value::array(arr)
                }
            },
            CastKind::Object => match v {
                Value::Object(_) => v,
                Value::Array(arr) => {
                    let obj = Rc::new(RefCell::new(Object::new("stdClass")));
                    for (k, val) in arr.iter() {
                        obj.borrow_mut().props.insert(k.to_string(), val.clone());
                    }
                    Value::Object(obj)
                }
                other => {
                    let obj = Rc::new(RefCell::new(Object::new("stdClass")));
                    obj.borrow_mut().props.insert("scalar".to_string(), other);
                    Value::Object(obj)
                }
            },
        })
    }
}
