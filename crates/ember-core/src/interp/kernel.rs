//! Built-in methods

use super::Interp;
use crate::object::{HeapObject, Method, NativeFn};
use crate::value::{ObjRef, Value};

pub(super) fn install(interp: &mut Interp) {
    let c = interp.classes.clone();

    let table: &[(ObjRef, &[(&str, NativeFn)])] = &[
        (
            c.basic_object,
            &[
                ("initialize", basic_initialize),
                ("==", basic_eq),
                ("!", basic_not),
                ("!=", basic_ne),
            ],
        ),
        (
            c.object,
            &[
                ("inspect", object_inspect),
                ("to_s", object_inspect),
                ("class", object_class),
                ("is_a?", object_is_a),
                ("kind_of?", object_is_a),
                ("nil?", object_nil_p),
                ("raise", object_raise),
            ],
        ),
        (
            c.class,
            &[
                ("new", class_new),
                ("name", class_name),
                ("superclass", class_superclass),
                ("inspect", class_inspect),
                ("to_s", class_inspect),
            ],
        ),
        (
            c.exception,
            &[
                ("initialize", exception_initialize),
                ("message", exception_message),
                ("to_s", exception_message),
                ("inspect", exception_inspect),
            ],
        ),
        (
            c.string,
            &[
                ("initialize", string_initialize),
                ("inspect", string_inspect),
                ("to_s", string_to_s),
                ("+", string_plus),
                ("*", string_times),
                ("==", string_eq),
                ("length", string_length),
                ("size", string_length),
            ],
        ),
        (
            c.integer,
            &[
                ("+", int_add),
                ("-", int_sub),
                ("*", int_mul),
                ("-@", int_neg),
                ("<", int_lt),
                (">", int_gt),
                ("<=", int_le),
                (">=", int_ge),
                ("to_s", int_to_s),
                ("inspect", int_to_s),
            ],
        ),
        (
            c.nil,
            &[
                ("to_s", nil_to_s),
                ("inspect", nil_inspect),
                ("nil?", nil_nil_p),
            ],
        ),
        (c.true_, &[("to_s", bool_to_s), ("inspect", bool_to_s)]),
        (c.false_, &[("to_s", bool_to_s), ("inspect", bool_to_s)]),
    ];

    for (class, methods) in table {
        if let Some(HeapObject::Class(rclass)) = interp.gc.heap.get_mut(*class) {
            for (name, func) in methods.iter() {
                rclass.methods.insert(name.to_string(), Method::Func(*func));
            }
        }
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).copied().unwrap_or_default()
}

// ----------------------------------------------------------------------
// BasicObject
// ----------------------------------------------------------------------

fn basic_initialize(_interp: &mut Interp, _self: Value, _args: &[Value]) -> Value {
    Value::Nil
}

fn basic_eq(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    Value::Bool(this == args[0])
}

fn basic_not(_interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    Value::Bool(!this.truthy())
}

fn basic_ne(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    Value::Bool(!interp.funcall(this, "==", args).truthy())
}

// ----------------------------------------------------------------------
// Object
// ----------------------------------------------------------------------

fn object_inspect(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    interp.any_to_s(this)
}

fn object_class(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    Value::Obj(interp.class_of(this))
}

fn object_is_a(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    match args[0].as_obj().filter(|r| interp.rclass(*r).is_some()) {
        Some(class) => Value::Bool(interp.is_kind_of(this, class)),
        None => {
            let type_error = interp.classes.type_error;
            interp.raise(type_error, "class or module required")
        }
    }
}

fn object_nil_p(_interp: &mut Interp, _this: Value, _args: &[Value]) -> Value {
    Value::Bool(false)
}

/// `raise`, `raise "msg"`, `raise Class`, `raise Class, "msg"`, `raise exc`
fn object_raise(interp: &mut Interp, _this: Value, args: &[Value]) -> Value {
    let runtime_error = interp.classes.runtime_error;
    if args.is_empty() {
        interp.raise(runtime_error, "unhandled exception");
    }
    if args.len() > 2 {
        let argument_error = interp.classes.argument_error;
        interp.raise(
            argument_error,
            &format!("wrong number of arguments (given {}, expected 0..2)", args.len()),
        );
    }

    let first = args[0];
    if let Some(message) = interp.string_value(first).map(str::to_string) {
        interp.raise(runtime_error, &message);
    }

    let exc = if interp.is_class(first) {
        interp.funcall(first, "new", &args[1..])
    } else {
        first
    };

    let exception = interp.classes.exception;
    match exc.as_obj() {
        Some(r) if interp.is_kind_of(exc, exception) => interp.raise_exc(r),
        _ => {
            let type_error = interp.classes.type_error;
            interp.raise(type_error, "exception class/object expected")
        }
    }
}

// ----------------------------------------------------------------------
// Class
// ----------------------------------------------------------------------

fn self_class(interp: &mut Interp, this: Value) -> ObjRef {
    match this.as_obj().filter(|r| interp.rclass(*r).is_some()) {
        Some(r) => r,
        None => {
            let type_error = interp.classes.type_error;
            interp.raise(type_error, "receiver is not a class")
        }
    }
}

fn class_new(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let class = self_class(interp, this);
    Value::Obj(interp.obj_new(class, args))
}

fn class_name(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let class = self_class(interp, this);
    match interp.class_name(class).map(str::to_string) {
        Some(name) => interp.str_new(&name),
        None => Value::Nil,
    }
}

fn class_superclass(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let class = self_class(interp, this);
    interp.superclass(class).map(Value::Obj).unwrap_or_default()
}

fn class_inspect(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let class = self_class(interp, this);
    let name = interp.class_display_name(class);
    interp.str_new(&name)
}

// ----------------------------------------------------------------------
// Exception
// ----------------------------------------------------------------------

fn exception_initialize(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    if args.len() > 1 {
        let argument_error = interp.classes.argument_error;
        interp.raise(
            argument_error,
            &format!("wrong number of arguments (given {}, expected 0..1)", args.len()),
        );
    }
    let message = arg(args, 0);
    if let Some(HeapObject::Object(o)) = this.as_obj().and_then(|r| interp.gc.heap.get_mut(r)) {
        o.set_ivar("@message", message);
    }
    Value::Nil
}

fn exception_message_text(interp: &Interp, this: Value) -> String {
    match this.as_obj().and_then(|r| interp.exception_message(r)) {
        Some(message) => message.to_string(),
        None => interp.class_display_name(interp.class_of(this)),
    }
}

fn exception_message(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let message = exception_message_text(interp, this);
    interp.str_new(&message)
}

/// `message (ClassName)`, or just the class name without a message
fn exception_inspect(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let class = interp.class_display_name(interp.class_of(this));
    let text = match this.as_obj().and_then(|r| interp.exception_message(r)) {
        Some(message) if !message.is_empty() => format!("{} ({})", message, class),
        _ => class,
    };
    interp.str_new(&text)
}

// ----------------------------------------------------------------------
// String
// ----------------------------------------------------------------------

fn string_of(interp: &mut Interp, value: Value) -> String {
    match interp.string_value(value) {
        Some(s) => s.to_string(),
        None => {
            let type_error = interp.classes.type_error;
            let class = interp.class_display_name(interp.class_of(value));
            interp.raise(
                type_error,
                &format!("no implicit conversion of {} into String", class),
            )
        }
    }
}

fn string_initialize(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    if let Some(initial) = args.first() {
        let initial = string_of(interp, *initial);
        if let Some(HeapObject::String { value, .. }) =
            this.as_obj().and_then(|r| interp.gc.heap.get_mut(r))
        {
            *value = initial;
        }
    }
    Value::Nil
}

fn string_inspect(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let s = string_of(interp, this);
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\x1b' => out.push_str("\\e"),
            c if c.is_control() => out.push_str(&format!("\\x{:02X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    interp.str_new(&out)
}

fn string_to_s(_interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    this
}

fn string_plus(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    let mut s = string_of(interp, this);
    s.push_str(&string_of(interp, args[0]));
    interp.str_new(&s)
}

fn string_times(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    let s = string_of(interp, this);
    match args[0].as_int() {
        Some(n) if n >= 0 => {
            let n = n as usize;
            if s.len().checked_mul(n).is_none() {
                let argument_error = interp.classes.argument_error;
                interp.raise(argument_error, "argument too big");
            }
            interp.str_new(&s.repeat(n))
        }
        Some(_) => {
            let argument_error = interp.classes.argument_error;
            interp.raise(argument_error, "negative argument")
        }
        None => {
            let type_error = interp.classes.type_error;
            interp.raise(type_error, "no implicit conversion into Integer")
        }
    }
}

fn string_eq(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    interp.check_arity(args, 1);
    let equal = match (interp.string_value(this), interp.string_value(args[0])) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    };
    Value::Bool(equal)
}

fn string_length(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let s = string_of(interp, this);
    Value::Int(s.chars().count() as i64)
}

// ----------------------------------------------------------------------
// Integer
// ----------------------------------------------------------------------

fn int_operands(interp: &mut Interp, this: Value, args: &[Value]) -> (i64, i64) {
    interp.check_arity(args, 1);
    match (this.as_int(), args[0].as_int()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            let type_error = interp.classes.type_error;
            let class = interp.class_display_name(interp.class_of(args[0]));
            interp.raise(
                type_error,
                &format!("{} can't be coerced into Integer", class),
            )
        }
    }
}

fn int_result(interp: &mut Interp, result: Option<i64>) -> Value {
    match result {
        Some(n) => Value::Int(n),
        None => {
            let range_error = interp.classes.range_error;
            interp.raise(range_error, "integer overflow")
        }
    }
}

fn int_add(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_operands(interp, this, args);
    int_result(interp, a.checked_add(b))
}

fn int_sub(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_operands(interp, this, args);
    int_result(interp, a.checked_sub(b))
}

fn int_mul(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_operands(interp, this, args);
    int_result(interp, a.checked_mul(b))
}

fn int_neg(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let result = this.as_int().and_then(i64::checked_neg);
    int_result(interp, result)
}

fn int_compare(interp: &mut Interp, this: Value, args: &[Value]) -> (i64, i64) {
    interp.check_arity(args, 1);
    match (this.as_int(), args[0].as_int()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            let argument_error = interp.classes.argument_error;
            let class = interp.class_display_name(interp.class_of(args[0]));
            interp.raise(
                argument_error,
                &format!("comparison of Integer with {} failed", class),
            )
        }
    }
}

fn int_lt(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_compare(interp, this, args);
    Value::Bool(a < b)
}

fn int_gt(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_compare(interp, this, args);
    Value::Bool(a > b)
}

fn int_le(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_compare(interp, this, args);
    Value::Bool(a <= b)
}

fn int_ge(interp: &mut Interp, this: Value, args: &[Value]) -> Value {
    let (a, b) = int_compare(interp, this, args);
    Value::Bool(a >= b)
}

fn int_to_s(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let text = this.as_int().unwrap_or_default().to_string();
    interp.str_new(&text)
}

// ----------------------------------------------------------------------
// nil, true, false
// ----------------------------------------------------------------------

fn nil_to_s(interp: &mut Interp, _this: Value, _args: &[Value]) -> Value {
    interp.str_new("")
}

fn nil_inspect(interp: &mut Interp, _this: Value, _args: &[Value]) -> Value {
    interp.str_new("nil")
}

fn nil_nil_p(_interp: &mut Interp, _this: Value, _args: &[Value]) -> Value {
    Value::Bool(true)
}

fn bool_to_s(interp: &mut Interp, this: Value, _args: &[Value]) -> Value {
    let text = if this.truthy() { "true" } else { "false" };
    interp.str_new(text)
}
