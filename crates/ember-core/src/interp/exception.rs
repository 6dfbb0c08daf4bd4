//! Raising

use super::Interp;
use crate::object::{HeapObject, RObject};
use crate::value::{ObjRef, Value};

impl Interp {
    /// Raise a new instance of `class` with `message`
    pub fn raise(&mut self, class: ObjRef, message: &str) -> ! {
        let exc = self.exc_new(class, message);
        self.raise_exc(exc)
    }

    /// Raise an existing object
    ///
    /// No check is made that `exc` descends from `Exception`; anything can
    /// be thrown this way, including objects no `rescue` clause matches.
    pub fn raise_exc(&mut self, exc: ObjRef) -> ! {
        self.exc = Some(exc);
        self.throw()
    }

    /// Raise the preallocated `NoMemoryError`
    pub(crate) fn raise_nomem(&mut self) -> ! {
        let exc = self.nomem_err;
        self.raise_exc(exc)
    }

    /// New exception object without running `initialize`
    pub fn exc_new(&mut self, class: ObjRef, message: &str) -> ObjRef {
        let message = self.str_new(message);
        self.alloc(HeapObject::Object(RObject {
            class,
            ivars: vec![("@message".to_string(), message)],
        }))
    }

    /// `@message` of an exception object, if it is a string
    pub fn exception_message(&self, exc: ObjRef) -> Option<&str> {
        match self.gc.heap.get(exc) {
            Some(HeapObject::Object(o)) => o.ivar("@message").and_then(|m| self.string_value(m)),
            _ => None,
        }
    }

    /// Receiver description used in error messages
    pub(crate) fn describe(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Obj(r) if r == self.top_self => "main".to_string(),
            Value::Obj(r) if self.rclass(r).is_some() => {
                format!("class {}", self.class_display_name(r))
            }
            _ => format!(
                "an instance of {}",
                self.class_display_name(self.class_of(value))
            ),
        }
    }

    /// Raise the error for a call that found no method
    pub(crate) fn method_missing(&mut self, recv: Value, name: &str, vcall: bool) -> ! {
        let message = if vcall {
            format!(
                "undefined local variable or method '{}' for {}",
                name,
                self.describe(recv)
            )
        } else {
            format!("undefined method '{}' for {}", name, self.describe(recv))
        };
        let class = if vcall {
            self.classes.name_error
        } else {
            self.classes.no_method_error
        };
        self.raise(class, &message)
    }

    /// Raise `ArgumentError` unless `args` has `expected` entries
    pub(crate) fn check_arity(&mut self, args: &[Value], expected: usize) {
        if args.len() != expected {
            let argument_error = self.classes.argument_error;
            self.raise(
                argument_error,
                &format!(
                    "wrong number of arguments (given {}, expected {})",
                    args.len(),
                    expected
                ),
            );
        }
    }

    /// `SyntaxError` placed in the ambient slot without jumping
    pub(crate) fn set_syntax_error(&mut self, message: &str) {
        let syntax_error = self.classes.syntax_error;
        let exc = self.exc_new(syntax_error, message);
        self.exc = Some(exc);
    }
}
