//! Tree-walking evaluator: statement execution, control-flow signals, and
//! the `Evaluator` that owns the program-wide tables, output sink, and
//! resource tracker for one run.
//!
//! The teacher compiles to bytecode and runs a `VM` over `Code`
//! (`examples/parcadei-ouros/crates/ouros/src/bytecode/vm`); this language
//! has no compilation pass (spec explicitly excludes bytecode/JIT), so
//! statements and expressions are interpreted directly off the AST, the way
//! `run.rs`'s `Executor` drives evaluation but without a separate compile
//! step in front of it.

mod attr;
mod binary;
mod call;
mod collections;
pub mod compare;
mod expr;

use crate::array::{ArrayKey, PhpArray};
use crate::ast::{CatchClause, File, Stmt, StmtKind, SwitchCase};
use crate::class::{ClassDef, ClassRegistry, Object, ObjectRef};
use crate::environment::{Env, GlobalTables, Slot};
use crate::exception::{make_exception, seed_builtin_exceptions, throw, RunError, RunResult, StackFrame};
use crate::output::{OutputBuffer, OutputSink};
use crate::resource::{NoLimitTracker, ResourceTracker};
use crate::token::Position;
use crate::value::Value;
use ahash::AHashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub use call::Callable;

/// What falls out of executing a statement, absent a thrown exception
/// (which instead propagates through `RunResult`'s `Err` arm).
#[derive(Debug, Clone)]
pub enum Signal {
    Normal,
    Return(Value),
    Break(u32),
    Continue(u32),
}

/// Everything an expression or statement needs to know about where it's
/// executing: which variables it can see, and — inside a method — which
/// object and class it's running against.
#[derive(Clone)]
pub struct Frame {
    pub env: Env,
    pub this: Option<ObjectRef>,
    /// The class a method body was defined in (`self::`, private/protected
    /// visibility checks).
    pub class: Option<String>,
    /// The class the call was actually made through (late static binding,
    /// `static::`). Equal to `class` outside of inherited static calls.
    pub static_class: Option<String>,
}

impl Frame {
    pub fn top_level(env: Env) -> Frame {
        Frame { env, this: None, class: None, static_class: None }
    }

    pub fn for_call(env: Env, this: Option<ObjectRef>, class: Option<String>, static_class: Option<String>) -> Frame {
        Frame { env, this, class, static_class }
    }
}

/// After a `break`/`continue` is executed inside a loop or switch, decides
/// whether this construct absorbs it (and how to keep iterating) or must
/// hand it to its own enclosing loop with the level decremented.
fn loop_step(sig: Signal) -> Result<bool, Signal> {
    match sig {
        Signal::Normal => Ok(false),
        Signal::Return(v) => Err(Signal::Return(v)),
        Signal::Break(n) => {
            if n <= 1 {
                Ok(true)
            } else {
                Err(Signal::Break(n - 1))
            }
        }
        Signal::Continue(n) => {
            if n <= 1 {
                Ok(false)
            } else {
                Err(Signal::Continue(n - 1))
            }
        }
    }
}

/// Accumulates `yield`/`yield from` output for one in-flight generator-body
/// run. Generators execute eagerly to completion (see `generator.rs`), so
/// `eval_expr` just appends to whichever collector is on top of the
/// evaluator's stack instead of truly suspending.
#[derive(Default)]
pub(super) struct YieldCollector {
    pub items: RefCell<Vec<(Value, Value)>>,
    pub auto_key: RefCell<i64>,
}

pub struct Evaluator<S: OutputSink> {
    pub globals: Rc<GlobalTables>,
    output: RefCell<OutputBuffer<S>>,
    resource: RefCell<Box<dyn ResourceTracker>>,
    call_stack: RefCell<Vec<StackFrame>>,
    /// `static $x = ...` storage, keyed by the AST node's address — stable
    /// for the process lifetime since function/method bodies live in `Rc`s
    /// that are never reallocated once parsed.
    statics: RefCell<AHashMap<usize, Slot>>,
    generator_stack: RefCell<Vec<Rc<YieldCollector>>>,
}

impl<S: OutputSink> Evaluator<S> {
    pub fn new(sink: S) -> Self {
        Self::with_resource_tracker(sink, NoLimitTracker)
    }

    pub fn with_resource_tracker(sink: S, tracker: impl ResourceTracker + 'static) -> Self {
        let globals = Rc::new(GlobalTables::new());
        seed_builtin_exceptions(&mut globals.classes.borrow_mut());
        Evaluator {
            globals,
            output: RefCell::new(OutputBuffer::new(sink)),
            resource: RefCell::new(Box::new(tracker)),
            call_stack: RefCell::new(Vec::new()),
            statics: RefCell::new(AHashMap::default()),
            generator_stack: RefCell::new(Vec::new()),
        }
    }

    pub fn into_output(self) -> S {
        self.output.into_inner().into_sink()
    }

    fn echo(&self, bytes: &[u8]) {
        self.output.borrow_mut().write(bytes);
    }

    pub fn ob_start(&self) {
        self.output.borrow_mut().start();
    }
    pub fn ob_get_clean(&self) -> Option<Vec<u8>> {
        self.output.borrow_mut().get_clean()
    }
    pub fn ob_get_contents(&self) -> Option<Vec<u8>> {
        self.output.borrow().get_contents()
    }
    pub fn ob_end_clean(&self) -> bool {
        self.output.borrow_mut().end_clean()
    }
    pub fn ob_end_flush(&self) -> bool {
        self.output.borrow_mut().end_flush()
    }
    pub fn ob_flush(&self) -> bool {
        self.output.borrow_mut().flush()
    }
    pub fn ob_clean(&self) -> bool {
        self.output.borrow_mut().clean()
    }
    pub fn ob_level(&self) -> usize {
        self.output.borrow().level()
    }

    /// Runs a parsed program to completion. An uncaught throwable is
    /// reported to `err` in the `Fatal error: <kind>: <message>` form and
    /// returned as the error value; any other propagating `RunError` is
    /// returned as-is.
    pub fn run(&self, file: &File, err: &mut impl std::io::Write) -> RunResult<()> {
        self.hoist(&file.stmts)?;
        let frame = Frame::top_level(self.globals.globals.clone());
        let result = self.exec_stmts(&file.stmts, &frame);
        let result = match result {
            Err(RunError::Exit(msg)) => {
                if let Some(v @ Value::String(_)) = &msg {
                    self.echo(&v.to_bytes());
                }
                Ok(Signal::Normal)
            }
            other => other,
        };
        while self.output.borrow().level() > 0 {
            self.output.borrow_mut().end_flush();
        }
        match result {
            Ok(_) => Ok(()),
            Err(RunError::Throw(v)) => {
                let (kind, message) = describe_throwable(&v);
                let _ = writeln!(err, "Fatal error: Uncaught {kind}: {message}");
                for frame in self.call_stack.borrow().iter().rev() {
                    let _ = writeln!(err, "  at {} ({})", frame.function, frame.pos);
                }
                Err(RunError::Throw(v))
            }
            Err(e) => Err(e),
        }
    }

    /// Pre-registers every top-level function/class/interface/trait/enum
    /// declaration before executing statements in order, so forward
    /// references (`f()` called above `function f() {}`) resolve the way
    /// ordinary top-level scripts expect. Statements are still executed
    /// normally afterward, which re-declares the same names harmlessly and
    /// declares any conditional (non-top-level) ones in place.
    fn hoist(&self, stmts: &[Stmt]) -> RunResult<()> {
        let frame = Frame::top_level(self.globals.globals.clone());
        for stmt in stmts {
            match &stmt.kind {
                StmtKind::Function(decl) => self.globals.define_function(&decl.name, Rc::new((**decl).clone())),
                StmtKind::Class(decl) => self.declare_class(decl, &frame)?,
                StmtKind::Interface(decl) => self.globals.classes.borrow_mut().define(ClassDef::from_interface(decl)),
                StmtKind::Trait(decl) => self.globals.classes.borrow_mut().define(ClassDef::from_trait(decl)),
                StmtKind::EnumDecl(decl) => self.declare_enum(decl, &frame)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn declare_class(&self, decl: &crate::ast::ClassDecl, _frame: &Frame) -> RunResult<()> {
        self.globals.classes.borrow_mut().define_class(ClassDef::from_decl(decl));
        Ok(())
    }

    fn declare_enum(&self, decl: &crate::ast::EnumDecl, frame: &Frame) -> RunResult<()> {
        let def = ClassDef::from_enum(decl);
        let cases = def.enum_cases.clone();
        let name = def.name.clone();
        self.globals.classes.borrow_mut().define_class(def);
        let rc = self.globals.classes.borrow().get(&name).expect("just defined");
        for (case_name, value_expr) in cases {
            let mut props = indexmap::IndexMap::new();
            props.insert("name".to_string(), Value::string(case_name.clone()));
            if let Some(expr) = &value_expr {
                props.insert("value".to_string(), self.eval_expr(expr, frame)?);
            }
            let obj = Value::Object(Rc::new(RefCell::new(Object { class: name.clone(), props })));
            rc.constants.borrow_mut().insert(case_name, obj);
        }
        Ok(())
    }

    pub fn exec_stmts(&self, stmts: &[Stmt], frame: &Frame) -> RunResult<Signal> {
        for stmt in stmts {
            match self.exec_stmt(stmt, frame)? {
                Signal::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_stmt(&self, stmt: &Stmt, frame: &Frame) -> RunResult<Signal> {
        self.resource.borrow_mut().tick()?;
        match &stmt.kind {
            StmtKind::InlineHtml(bytes) => {
                self.echo(bytes);
                Ok(Signal::Normal)
            }
            StmtKind::Block(body) => self.exec_stmts(body, frame),
            StmtKind::If { cond, body, elseifs, else_body } => {
                if self.eval_expr(cond, frame)?.is_truthy() {
                    return self.exec_stmts(body, frame);
                }
                for (c, b) in elseifs {
                    if self.eval_expr(c, frame)?.is_truthy() {
                        return self.exec_stmts(b, frame);
                    }
                }
                match else_body {
                    Some(b) => self.exec_stmts(b, frame),
                    None => Ok(Signal::Normal),
                }
            }
            StmtKind::While { cond, body } => {
                while self.eval_expr(cond, frame)?.is_truthy() {
                    match loop_step(self.exec_stmts(body, frame)?) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(sig) => return Ok(sig),
                    }
                }
                Ok(Signal::Normal)
            }
            StmtKind::DoWhile { body, cond } => {
                loop {
                    match loop_step(self.exec_stmts(body, frame)?) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(sig) => return Ok(sig),
                    }
                    if !self.eval_expr(cond, frame)?.is_truthy() {
                        break;
                    }
                }
                Ok(Signal::Normal)
            }
            StmtKind::For { init, cond, step, body } => {
                for e in init {
                    self.eval_expr(e, frame)?;
                }
                loop {
                    let mut keep_going = true;
                    for c in cond {
                        keep_going = self.eval_expr(c, frame)?.is_truthy();
                    }
                    if !keep_going {
                        break;
                    }
                    match loop_step(self.exec_stmts(body, frame)?) {
                        Ok(true) => break,
                        Ok(false) => {}
                        Err(sig) => return Ok(sig),
                    }
                    for e in step {
                        self.eval_expr(e, frame)?;
                    }
                }
                Ok(Signal::Normal)
            }
            StmtKind::Foreach { expr, key, value, by_ref, body } => self.exec_foreach(expr, key.as_ref(), value, *by_ref, body, frame),
            StmtKind::Switch { cond, cases } => self.exec_switch(cond, cases, frame),
            StmtKind::Try { body, catches, finally } => self.exec_try(body, catches, finally.as_deref(), frame),
            StmtKind::Throw(e) => {
                let v = self.eval_expr(e, frame)?;
                Err(RunError::Throw(v))
            }
            StmtKind::Return(e) => {
                let v = match e {
                    Some(e) => self.eval_expr(e, frame)?,
                    None => Value::Null,
                };
                Ok(Signal::Return(v))
            }
            StmtKind::Break(n) => Ok(Signal::Break(n.unwrap_or(1))),
            StmtKind::Continue(n) => Ok(Signal::Continue(n.unwrap_or(1))),
            StmtKind::Echo(exprs) => {
                for e in exprs {
                    let v = self.eval_expr(e, frame)?;
                    let bytes = self.to_bytes(&v, frame)?;
                    self.echo(&bytes);
                }
                Ok(Signal::Normal)
            }
            StmtKind::Global(names) => {
                for name in names {
                    let slot = self.globals.globals.slot_or_create(name);
                    frame.env.bind_slot(name.clone(), slot);
                }
                Ok(Signal::Normal)
            }
            StmtKind::StaticVar(vars) => {
                for (name, default) in vars {
                    let key = vars as *const _ as usize ^ name.as_ptr() as usize;
                    let slot = self.statics.borrow().get(&key).cloned();
                    let slot = match slot {
                        Some(s) => s,
                        None => {
                            let init = match default {
                                Some(e) => self.eval_expr(e, frame)?,
                                None => Value::Null,
                            };
                            let s: Slot = Rc::new(RefCell::new(init));
                            self.statics.borrow_mut().insert(key, s.clone());
                            s
                        }
                    };
                    frame.env.bind_slot(name.clone(), slot);
                }
                Ok(Signal::Normal)
            }
            StmtKind::Unset(exprs) => {
                for e in exprs {
                    self.unset(e, frame)?;
                }
                Ok(Signal::Normal)
            }
            StmtKind::Declare { body, .. } => match body {
                Some(b) => self.exec_stmts(b, frame),
                None => Ok(Signal::Normal),
            },
            StmtKind::Namespace { body, .. } => match body {
                Some(b) => self.exec_stmts(b, frame),
                None => Ok(Signal::Normal),
            },
            StmtKind::Use(_) => Ok(Signal::Normal),
            StmtKind::Function(decl) => {
                self.globals.define_function(&decl.name, Rc::new((**decl).clone()));
                Ok(Signal::Normal)
            }
            StmtKind::Class(decl) => {
                self.declare_class(decl, frame)?;
                Ok(Signal::Normal)
            }
            StmtKind::Interface(decl) => {
                self.globals.classes.borrow_mut().define(ClassDef::from_interface(decl));
                Ok(Signal::Normal)
            }
            StmtKind::Trait(decl) => {
                self.globals.classes.borrow_mut().define(ClassDef::from_trait(decl));
                Ok(Signal::Normal)
            }
            StmtKind::EnumDecl(decl) => {
                self.declare_enum(decl, frame)?;
                Ok(Signal::Normal)
            }
            StmtKind::Goto(_) => Err(RunError::fatal("'goto' is not supported")),
            StmtKind::Label(_) => Ok(Signal::Normal),
            StmtKind::ExprStmt(e) => {
                self.eval_expr(e, frame)?;
                Ok(Signal::Normal)
            }
        }
    }

    fn exec_switch(&self, cond: &crate::ast::Expr, cases: &[SwitchCase], frame: &Frame) -> RunResult<Signal> {
        let subject = self.eval_expr(cond, frame)?;
        let mut matched = false;
        let default_idx = cases.iter().position(|c| c.cond.is_none());
        let start = 'find: {
            for (i, case) in cases.iter().enumerate() {
                if let Some(c) = &case.cond {
                    if compare::loose_eq(&subject, &self.eval_expr(c, frame)?) {
                        break 'find Some(i);
                    }
                }
            }
            default_idx
        };
        let Some(start) = start else { return Ok(Signal::Normal) };
        matched = true;
        let _ = matched;
        for case in &cases[start..] {
            match self.exec_stmts(&case.body, frame)? {
                Signal::Normal => {}
                Signal::Break(n) | Signal::Continue(n) if n <= 1 => return Ok(Signal::Normal),
                Signal::Break(n) => return Ok(Signal::Break(n - 1)),
                Signal::Continue(n) => return Ok(Signal::Continue(n - 1)),
                other => return Ok(other),
            }
        }
        Ok(Signal::Normal)
    }

    fn exec_try(&self, body: &[Stmt], catches: &[CatchClause], finally: Option<&[Stmt]>, frame: &Frame) -> RunResult<Signal> {
        let result = self.exec_stmts(body, frame);
        let result = match result {
            Err(RunError::Throw(v)) => self.dispatch_catch(v, catches, frame),
            other => other,
        };
        match finally {
            None => result,
            Some(f) => match self.exec_stmts(f, frame)? {
                Signal::Normal => result,
                // A `finally` that itself transfers control (return/break/
                // continue/throw-via-later-statement) overrides whatever
                // the `try`/`catch` was about to do.
                other => Ok(other),
            },
        }
    }

    fn dispatch_catch(&self, thrown: Value, catches: &[CatchClause], frame: &Frame) -> RunResult<Signal> {
        let class_name = thrown.class_name().unwrap_or_default();
        for catch in catches {
            let classes = self.globals.classes.borrow();
            if catch.types.iter().any(|t| classes.is_subclass_of(&class_name, t)) {
                drop(classes);
                if let Some(var) = &catch.var {
                    frame.env.set(var.clone(), thrown.clone());
                }
                return self.exec_stmts(&catch.body, frame);
            }
        }
        Err(RunError::Throw(thrown))
    }

    fn unset(&self, expr: &crate::ast::Expr, frame: &Frame) -> RunResult<()> {
        use crate::ast::ExprKind;
        match &expr.kind {
            ExprKind::Variable(name) => {
                frame.env.unset(name);
                Ok(())
            }
            ExprKind::ArrayAccess { array, index: Some(index) } => {
                let key = self.eval_expr(index, frame)?;
                let key = ArrayKey::from_value(&key);
                self.with_array_mut(array, frame, |arr| {
                    arr.remove(&key);
                })
            }
            ExprKind::PropertyFetch { object, property, .. } => {
                let obj = self.eval_expr(object, frame)?;
                let name = self.member_name(property, frame)?;
                if let Value::Object(o) = obj {
                    o.borrow_mut().props.shift_remove(&name);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn with_array_mut(&self, target: &crate::ast::Expr, frame: &Frame, f: impl FnOnce(&mut PhpArray)) -> RunResult<()> {
        use crate::ast::ExprKind;
        if let ExprKind::Variable(name) = &target.kind {
            let slot = frame.env.slot_or_create(name);
            let mut v = slot.borrow_mut();
            if !matches!(&*v, Value::Array(_)) {
                *v = Value::array(PhpArray::new());
            }
            if let Value::Array(arr) = &mut *v {
                f(arr);
            }
            return Ok(());
        }
        let mut v = self.eval_expr(target, frame)?;
        if let Value::Array(arr) = &mut v {
            f(arr);
        }
        self.assign_to(target, v, frame)?;
        Ok(())
    }

    pub(super) fn member_name(&self, expr: &crate::ast::Expr, frame: &Frame) -> RunResult<String> {
        use crate::ast::ExprKind;
        match &expr.kind {
            ExprKind::String(s) => Ok(String::from_utf8_lossy(s).into_owned()),
            _ => {
                let v = self.eval_expr(expr, frame)?;
                Ok(String::from_utf8_lossy(&v.to_bytes()).into_owned())
            }
        }
    }

    pub(super) fn to_bytes(&self, v: &Value, frame: &Frame) -> RunResult<Vec<u8>> {
        if let Value::Object(o) = v {
            let class = o.borrow().class.clone();
            if let Some((owner, method)) = self.globals.classes.borrow().resolve_method(&class, "__tostring") {
                let _ = &owner;
                let result = self.call_method_info(&method, o.clone(), Vec::new(), frame)?;
                return Ok(result.to_bytes());
            }
            return Err(throw("Error", format!("Object of class {class} could not be converted to string")));
        }
        Ok(v.to_bytes())
    }

    pub(super) fn push_frame_trace(&self, function: impl Into<String>, pos: Position) {
        self.call_stack.borrow_mut().push(StackFrame { function: function.into(), pos });
    }

    pub(super) fn pop_frame_trace(&self) {
        self.call_stack.borrow_mut().pop();
    }

    /// Innermost call-stack label (`"foo"` for a function, `"Class::bar"` for
    /// a method), empty at top level — backs `__FUNCTION__`/`__METHOD__`.
    pub(super) fn current_function_label(&self) -> String {
        self.call_stack.borrow().last().map(|f| f.function.clone()).unwrap_or_default()
    }

    pub(super) fn resource_tracker(&self) -> &RefCell<Box<dyn ResourceTracker>> {
        &self.resource
    }

    pub(super) fn classes(&self) -> std::cell::Ref<'_, ClassRegistry> {
        self.globals.classes.borrow()
    }

    pub(super) fn push_generator_collector(&self) {
        self.generator_stack.borrow_mut().push(Rc::new(YieldCollector::default()));
    }

    pub(super) fn pop_generator_collector(&self) -> Rc<YieldCollector> {
        self.generator_stack.borrow_mut().pop().expect("generator collector stack underflow")
    }

    /// Appends a yielded pair to the innermost active generator body. Called
    /// from `eval_expr`'s `Yield`/`YieldFrom` handling; a bare `yield $v`
    /// without an explicit key claims the next integer key the way an
    /// ordinary array auto-increments.
    pub(super) fn record_yield(&self, key: Option<Value>, value: Value) {
        let stack = self.generator_stack.borrow();
        let Some(collector) = stack.last() else { return };
        let key = match key {
            Some(k) => k,
            None => {
                let mut auto = collector.auto_key.borrow_mut();
                let k = *auto;
                *auto += 1;
                Value::Int(k)
            }
        };
        collector.items.borrow_mut().push((key, value));
    }
}

fn describe_throwable(v: &Value) -> (String, String) {
    let class = v.class_name().unwrap_or_else(|| "Exception".to_string());
    let message = match v {
        Value::Object(o) => o.borrow().props.get("message").map(|m| String::from_utf8_lossy(&m.to_bytes()).into_owned()).unwrap_or_default(),
        _ => String::new(),
    };
    (class, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::output::CollectOutput;
    use crate::parser::Parser;

    fn run_src(src: &str) -> String {
        let full = format!("<?php {src}");
        let (tokens, lex_errs) = Lexer::new(full.as_bytes()).tokenize();
        assert!(lex_errs.is_empty(), "{lex_errs:?}");
        let (file, errs) = Parser::new(tokens).parse_file();
        assert!(errs.is_empty(), "{errs:?}");
        let eval = Evaluator::new(CollectOutput::new());
        let mut err = Vec::new();
        eval.run(&file, &mut err).unwrap();
        String::from_utf8(eval.into_output().into_bytes()).unwrap()
    }

    #[test]
    fn echoes_arithmetic() {
        assert_eq!(run_src("echo 1 + 2 * 3;"), "7");
    }

    #[test]
    fn if_else_branches() {
        assert_eq!(run_src("if (false) { echo 'a'; } elseif (true) { echo 'b'; } else { echo 'c'; }"), "b");
    }

    #[test]
    fn while_loop_accumulates() {
        assert_eq!(run_src("$i = 0; $s = 0; while ($i < 5) { $s += $i; $i++; } echo $s;"), "10");
    }

    #[test]
    fn break_and_continue_respect_levels() {
        let out = run_src(
            "for ($i = 0; $i < 3; $i++) { for ($j = 0; $j < 3; $j++) { if ($j == 1) continue 2; echo \"$i$j\"; } }",
        );
        assert_eq!(out, "001020");
    }

    #[test]
    fn try_finally_runs_once_on_exception() {
        let out = run_src(
            "try { try { throw new Exception('x'); } finally { echo 'A'; } } catch (Exception $e) { echo 'B'; echo $e->getMessage(); }",
        );
        assert_eq!(out, "ABx");
    }

    #[test]
    fn array_assignment_has_value_semantics() {
        let out = run_src("$a = [1,2,3]; $b = $a; $b[] = 4; echo count($a) . ' ' . count($b);");
        assert_eq!(out, "3 4");
    }

    #[test]
    fn static_var_persists_across_calls() {
        let out = run_src("function counter() { static $n = 0; $n++; return $n; } echo counter() . counter() . counter();");
        assert_eq!(out, "123");
    }
}
