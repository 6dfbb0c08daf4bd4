//! Tree-walking evaluator and method dispatch

use super::{Frame, Interp};
use crate::jump::{self, Unwound};
use crate::object::{HeapObject, Method, ProcBody, RProc};
use crate::parser::ast::{Begin, Call, Expr, MethodDef, RescueClause};
use crate::parser::parse;
use crate::value::{ObjRef, Value};
use std::panic;
use std::rc::Rc;

impl Interp {
    /// Call `name` on `recv`
    pub fn funcall(&mut self, recv: Value, name: &str, args: &[Value]) -> Value {
        self.dispatch(recv, name, args, false)
    }

    fn dispatch(&mut self, recv: Value, name: &str, args: &[Value], vcall: bool) -> Value {
        let class = self.class_of(recv);
        match self.find_method(class, name) {
            Some(method) => self.invoke(method, recv, args),
            None => self.method_missing(recv, name, vcall),
        }
    }

    fn invoke(&mut self, method: Method, recv: Value, args: &[Value]) -> Value {
        self.check_call_depth();
        let def_target = self.frame().def_target;
        match method {
            Method::Func(func) => {
                let mut frame = Frame::new(recv, def_target);
                frame.args = args.to_vec();
                self.with_frame(frame, |interp| func(interp, recv, args))
            }
            Method::Proc(p) => {
                let body = match self.gc.heap.get(p) {
                    Some(HeapObject::Proc(rp)) => rp.body.clone(),
                    _ => {
                        let type_error = self.classes.type_error;
                        self.raise(type_error, "method body is not a proc")
                    }
                };
                match body {
                    ProcBody::Native(func) => {
                        let mut frame = Frame::new(recv, def_target);
                        frame.args = args.to_vec();
                        frame.proc_ = Some(p);
                        self.with_frame(frame, |interp| func(interp, recv, args))
                    }
                    ProcBody::Script(def) => self.invoke_script(&def, p, recv, args),
                }
            }
        }
    }

    fn invoke_script(&mut self, def: &MethodDef, p: ObjRef, recv: Value, args: &[Value]) -> Value {
        self.check_arity(args, def.params.len());

        let target = if self.is_class(recv) {
            recv.as_obj().unwrap_or(self.classes.object)
        } else {
            self.class_of(recv)
        };
        let mut frame = Frame::new(recv, target);
        frame.args = args.to_vec();
        frame.proc_ = Some(p);
        frame.locals = def
            .params
            .iter()
            .cloned()
            .zip(args.iter().copied())
            .collect();

        self.with_frame(frame, |interp| interp.eval_body(&def.body))
    }

    /// Raise `SystemStackError` once the frame stack reaches its limit
    fn check_call_depth(&mut self) {
        if self.frames.len() > self.options.limits.max_call_depth {
            let system_stack_error = self.classes.system_stack_error;
            self.raise(system_stack_error, "stack level too deep")
        }
    }

    /// Evaluate statements, keeping the arena flat between them
    ///
    /// The value of the last statement is re-registered in the arena.
    pub(crate) fn eval_body(&mut self, body: &[Expr]) -> Value {
        let mark = self.gc.arena.save();
        let mut last = Value::Nil;
        for expr in body {
            self.gc.arena.restore(mark);
            last = self.eval(expr);
        }
        self.gc.arena.restore(mark);
        self.gc_protect(last);
        last
    }

    fn eval(&mut self, expr: &Expr) -> Value {
        match expr {
            Expr::Nil => Value::Nil,
            Expr::True => Value::Bool(true),
            Expr::False => Value::Bool(false),
            Expr::SelfRef => self.frame().self_val,
            Expr::Int(n) => Value::Int(*n),
            Expr::Str(s) => self.str_new(s),
            Expr::Local(name) => self.frame().local(name),
            Expr::Ivar(name) => {
                let self_val = self.frame().self_val;
                match self_val.as_obj().and_then(|r| self.gc.heap.get(r)) {
                    Some(HeapObject::Object(o)) => o.ivar(name).unwrap_or_default(),
                    _ => Value::Nil,
                }
            }
            Expr::Const(name) => Value::Obj(self.const_get(name)),
            Expr::AssignLocal(name, value) => {
                let value = self.eval(value);
                self.frame_mut().set_local(name, value);
                value
            }
            Expr::AssignIvar(name, value) => {
                let value = self.eval(value);
                let self_val = self.frame().self_val;
                match self_val.as_obj().and_then(|r| self.gc.heap.get_mut(r)) {
                    Some(HeapObject::Object(o)) => o.set_ivar(name, value),
                    _ => {
                        let message =
                            format!("can't set instance variable on {}", self.describe(self_val));
                        let runtime_error = self.classes.runtime_error;
                        self.raise(runtime_error, &message);
                    }
                }
                value
            }
            Expr::Call(call) => self.eval_call(call),
            Expr::Not(operand) => Value::Bool(!self.eval(operand).truthy()),
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs);
                if lhs.truthy() {
                    self.eval(rhs)
                } else {
                    lhs
                }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs);
                if lhs.truthy() {
                    lhs
                } else {
                    self.eval(rhs)
                }
            }
            Expr::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval(cond).truthy() {
                    self.eval_body(then_body)
                } else {
                    self.eval_body(else_body)
                }
            }
            Expr::Def(def) => {
                let target = self.frame().def_target;
                let p = self.alloc(HeapObject::Proc(RProc {
                    body: ProcBody::Script(Rc::clone(def)),
                    env: Vec::new(),
                }));
                self.define_method_raw(target, &def.name, Method::Proc(p));
                Value::Nil
            }
            Expr::Class {
                name,
                superclass,
                body,
            } => {
                let superclass = match superclass {
                    Some(expr) => {
                        let value = self.eval(expr);
                        match value.as_obj().filter(|r| self.rclass(*r).is_some()) {
                            Some(r) => Some(r),
                            None => {
                                let type_error = self.classes.type_error;
                                self.raise(type_error, "superclass must be a Class")
                            }
                        }
                    }
                    None => None,
                };
                let class = self.define_class(name, superclass);
                self.with_frame(Frame::new(Value::Obj(class), class), |interp| {
                    interp.eval_body(body)
                })
            }
            Expr::Begin(begin) => self.eval_begin(begin),
        }
    }

    fn eval_call(&mut self, call: &Call) -> Value {
        let recv = match &call.recv {
            Some(expr) => self.eval(expr),
            None => self.frame().self_val,
        };
        let args: Vec<Value> = call.args.iter().map(|arg| self.eval(arg)).collect();
        self.dispatch(recv, &call.name, &args, call.vcall)
    }

    fn eval_begin(&mut self, begin: &Begin) -> Value {
        let Some(ensure) = &begin.ensure else {
            return self.eval_rescue(begin);
        };

        let mark = self.gc.arena.save();
        match jump::protect(self, |interp| interp.eval_rescue(begin)) {
            Ok(value) => {
                self.eval_body(ensure);
                value
            }
            Err(Unwound::Landed) => {
                self.gc.arena.restore(mark);
                let pending = self.exc;
                if let Some(exc) = pending {
                    self.gc.arena.push_forced(exc);
                }
                self.eval_body(ensure);
                self.exc = pending;
                self.throw()
            }
            Err(Unwound::Foreign(payload)) => panic::resume_unwind(payload),
        }
    }

    fn eval_rescue(&mut self, begin: &Begin) -> Value {
        if begin.rescues.is_empty() {
            let value = self.eval_body(&begin.body);
            return match &begin.else_body {
                Some(else_body) => self.eval_body(else_body),
                None => value,
            };
        }

        let mark = self.gc.arena.save();
        match jump::protect(self, |interp| interp.eval_body(&begin.body)) {
            Ok(value) => match &begin.else_body {
                Some(else_body) => self.eval_body(else_body),
                None => value,
            },
            Err(Unwound::Landed) => {
                self.gc.arena.restore(mark);
                let Some(exc) = self.exc else {
                    let runtime_error = self.classes.runtime_error;
                    self.raise(runtime_error, "jump without a pending exception")
                };
                self.gc.arena.push_forced(exc);

                for clause in &begin.rescues {
                    if self.rescue_matches(clause, exc) {
                        self.exc = None;
                        if let Some(var) = &clause.var {
                            self.frame_mut().set_local(var, Value::Obj(exc));
                        }
                        return self.eval_body(&clause.body);
                    }
                }

                self.exc = Some(exc);
                self.throw()
            }
            Err(Unwound::Foreign(payload)) => panic::resume_unwind(payload),
        }
    }

    /// Ancestry test of the pending exception against a clause's classes
    fn rescue_matches(&mut self, clause: &RescueClause, exc: ObjRef) -> bool {
        if clause.classes.is_empty() {
            let standard_error = self.classes.standard_error;
            return self.is_kind_of(Value::Obj(exc), standard_error);
        }
        for expr in &clause.classes {
            let class = self.eval(expr);
            let Some(class) = class.as_obj().filter(|r| self.rclass(*r).is_some()) else {
                let type_error = self.classes.type_error;
                self.raise(type_error, "class or module required for rescue clause")
            };
            if self.is_kind_of(Value::Obj(exc), class) {
                return true;
            }
        }
        false
    }

    /// Parse and run `src` at top level
    ///
    /// Errors are not raised to the caller: the exception (a `SyntaxError`
    /// for bad source) is left in the ambient slot and `nil` is returned.
    /// Running out of memory while reporting the error still raises.
    pub fn load_nstring(&mut self, src: &[u8]) -> Value {
        let source = match std::str::from_utf8(src) {
            Ok(source) => source,
            Err(e) => {
                let message = format!("invalid byte sequence at offset {}", e.valid_up_to());
                self.set_syntax_error(&message);
                return Value::Nil;
            }
        };

        let program = match parse(source) {
            Ok(program) => program,
            Err(e) => {
                self.set_syntax_error(&e.to_string());
                return Value::Nil;
            }
        };

        let top = Frame::new(Value::Obj(self.top_self), self.classes.object);
        let outcome = jump::protect(self, |interp| {
            interp.with_frame(top, |interp| interp.eval_body(&program))
        });
        match outcome {
            Ok(value) => value,
            Err(Unwound::Landed) => Value::Nil,
            Err(Unwound::Foreign(payload)) => panic::resume_unwind(payload),
        }
    }

    /// Dynamic `inspect`: calls the receiver's `inspect` method
    pub fn inspect(&mut self, value: Value) -> Value {
        self.funcall(value, "inspect", &[])
    }

    /// Default `#<ClassName:0x..>` rendering, as a new string
    pub fn any_to_s(&mut self, value: Value) -> Value {
        let text = self.any_to_s_text(value);
        self.str_new(&text)
    }

    pub(crate) fn any_to_s_text(&self, value: Value) -> String {
        let class = self.class_display_name(self.class_of(value));
        let id = match value {
            Value::Obj(r) => u64::from(r.index()),
            Value::Int(n) => n as u64,
            Value::Bool(true) => 2,
            Value::Bool(false) | Value::Nil => 0,
        };
        format!("#<{}:0x{:x}>", class, id)
    }
}
