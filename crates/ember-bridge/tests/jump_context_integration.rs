//! Jump context restoration
//!
//! Every operation must leave the installed jump context exactly as it found
//! it, whether it returned a value or captured an exception.

mod common;

use common::open;
use ember_bridge::{CallbackError, Runtime, Value};

fn assert_restored<R>(rt: &mut Runtime, op: impl FnOnce(&mut Runtime) -> R) -> R {
    let before = rt.jump_context();
    let result = op(rt);
    assert_eq!(rt.jump_context(), before);
    result
}

#[test]
fn test_define_class() {
    let mut rt = open();
    let object = rt.object_class();

    let ok = assert_restored(&mut rt, |rt| rt.define_class("Widget", object));
    assert!(ok.is_ok());

    let bad_name = assert_restored(&mut rt, |rt| rt.define_class("widget", object));
    assert_eq!(bad_name.unwrap_err().class_name(), "NameError");
}

#[test]
fn test_class_get() {
    let mut rt = open();
    assert!(assert_restored(&mut rt, |rt| rt.class_get("String")).is_ok());

    let missing = assert_restored(&mut rt, |rt| rt.class_get("Missing"));
    assert_eq!(
        missing.unwrap_err().to_string(),
        "uninitialized constant Missing (NameError)"
    );
}

#[test]
fn test_load() {
    let mut rt = open();
    assert!(assert_restored(&mut rt, |rt| rt.load("1 + 1")).is_ok());
    assert!(!assert_restored(&mut rt, |rt| rt.load("raise 'x'")).is_ok());
    assert!(!assert_restored(&mut rt, |rt| rt.load("end end")).is_ok());
}

#[test]
fn test_funcall() {
    let mut rt = open();
    let ok = assert_restored(&mut rt, |rt| rt.funcall(Value::Int(2), "+", &[Value::Int(3)]));
    assert_eq!(ok.unwrap(), Value::Int(5));

    let err = assert_restored(&mut rt, |rt| rt.funcall(Value::Int(2), "frobnicate", &[]));
    assert_eq!(err.unwrap_err().class_name(), "NoMethodError");
}

#[test]
fn test_inspect() {
    let mut rt = open();
    let text = assert_restored(&mut rt, |rt| rt.inspect(Value::Int(7)));
    assert_eq!(text, "7");

    rt.load_string("class Broken\n  def inspect\n    raise 'broken'\n  end\nend")
        .unwrap();
    let broken = rt.load_string("Broken.new").unwrap();
    let text = assert_restored(&mut rt, |rt| rt.inspect(broken));
    assert!(text.starts_with("#<Broken:0x"), "{}", text);
}

#[test]
fn test_callback_registration_under_memory_pressure() {
    let mut rt = open();
    let object = rt.object_class();

    let ok = assert_restored(&mut rt, |rt| {
        rt.define_method(object, "noop", |_ctx, _recv, _args| Ok(Value::Nil))
    });
    assert!(ok.is_ok());

    rt.full_gc();
    let live = rt.live_objects();
    rt.set_max_objects(Some(live));
    let err = assert_restored(&mut rt, |rt| {
        rt.make_native_callback(|_ctx, _recv, _args| Ok(Value::Nil))
    });
    rt.set_max_objects(None);

    assert_eq!(err.unwrap_err().class_name(), "NoMemoryError");
}

#[test]
fn test_inside_callback() {
    let mut rt = open();
    let object = rt.object_class();

    rt.define_method(object, "peek_jump", |ctx, _recv, _args| {
        let installed = ctx.jump_context();
        assert!(installed.is_some());

        let clean = ctx.load("40 + 2");
        assert_eq!(ctx.jump_context(), installed);

        let failed = ctx.load("raise 'nested'");
        assert_eq!(ctx.jump_context(), installed);
        assert_eq!(failed.exception.unwrap().message(), "nested");

        let missing = ctx.funcall(Value::Nil, "nope", &[]);
        assert_eq!(ctx.jump_context(), installed);
        assert!(missing.is_err());

        Ok(clean.value)
    })
    .unwrap();

    let value = assert_restored(&mut rt, |rt| rt.load_string("peek_jump"));
    assert_eq!(value.unwrap(), Value::Int(42));
}

#[test]
fn test_callback_error_propagation() {
    let mut rt = open();
    let object = rt.object_class();
    rt.define_method(object, "relay", |ctx, recv, _args| {
        ctx.funcall(recv, "nonexistent", &[])?;
        Err(CallbackError::from("unreachable"))
    })
    .unwrap();

    let outcome = assert_restored(&mut rt, |rt| rt.load("relay"));
    let exc = outcome.exception.unwrap();
    assert_eq!(exc.class_name(), "NoMethodError");
    assert!(exc.message().starts_with("undefined method 'nonexistent'"));
}

#[test]
fn test_runaway_recursion_is_captured() {
    let mut rt = open();
    let outcome = assert_restored(&mut rt, |rt| rt.load("def f\n  f\nend\nf"));
    let exc = outcome.exception.unwrap();
    assert_eq!(exc.class_name(), "SystemStackError");
    assert_eq!(exc.message(), "stack level too deep");

    assert_eq!(rt.load_string("1 + 1").unwrap(), Value::Int(2));
}
