//! Diagnostic strings
//!
//! `inspect` must produce a non-empty string for any value without raising,
//! falling back to the default rendering and finally to a fixed placeholder.

mod common;

use common::{open, settle};
use ember_bridge::{Value, INSPECT_PLACEHOLDER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const LOUD: &str = "class Loud\n  def inspect\n    raise 'inspect failed'\n  end\nend";

#[test]
fn test_builtin_values() {
    let mut rt = open();
    assert_eq!(rt.inspect(Value::Nil), "nil");
    assert_eq!(rt.inspect(Value::Bool(false)), "false");
    assert_eq!(rt.inspect(Value::Int(-3)), "-3");

    let s = rt.load_string("'a\"b'").unwrap();
    assert_eq!(rt.inspect(s), "\"a\\\"b\"");
}

#[test]
fn test_user_inspect_is_used() {
    let mut rt = open();
    rt.load_string("class Named\n  def inspect\n    'named!'\n  end\nend")
        .unwrap();
    let obj = rt.load_string("Named.new").unwrap();
    assert_eq!(rt.inspect(obj), "named!");
}

#[test]
fn test_raising_inspect_uses_default_rendering() {
    let mut rt = open();
    rt.load_string(LOUD).unwrap();
    let obj = rt.load_string("Loud.new").unwrap();

    let text = rt.inspect(obj);
    assert!(text.starts_with("#<Loud:0x"), "{}", text);
    assert!(text.ends_with('>'));
}

#[test]
fn test_non_string_inspect_uses_default_rendering() {
    let mut rt = open();
    rt.load_string("class Numeric7\n  def inspect\n    7\n  end\nend")
        .unwrap();
    let obj = rt.load_string("Numeric7.new").unwrap();
    assert!(rt.inspect(obj).starts_with("#<Numeric7:0x"));
}

#[test]
fn test_placeholder_when_both_strategies_fail() {
    let mut rt = open();
    rt.load_string(LOUD).unwrap();
    let obj = rt.load_string("Loud.new").unwrap();

    let live = settle(&mut rt);
    rt.set_max_objects(Some(live));
    let text = rt.inspect(obj);
    rt.set_max_objects(None);

    assert_eq!(text, INSPECT_PLACEHOLDER);
    assert_eq!(rt.jump_context(), None);
    assert_eq!(rt.inspect(obj).get(..9), Some("#<Loud:0x"));
}

#[test]
fn test_exception_display() {
    let mut rt = open();
    let exc = rt.load("raise ArgumentError, 'bad arg'").exception.unwrap();
    assert_eq!(exc.to_string(), "bad arg (ArgumentError)");
    assert_eq!(format!("{:?}", exc), "bad arg (ArgumentError)");
    assert_eq!(exc.message(), "bad arg");
}

#[test]
fn test_exception_without_message() {
    let mut rt = open();
    let exc = rt.load("raise TypeError.new").exception.unwrap();
    assert_eq!(exc.to_string(), "TypeError");
}

#[test]
fn test_capture_runs_no_script_code() {
    let mut rt = open();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let object = rt.object_class();
    rt.define_method(object, "count_inspect", move |_ctx, _recv, _args| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Nil)
    })
    .unwrap();
    rt.load_string(
        "class Noisy < StandardError\n  def inspect\n    count_inspect\n    'noisy'\n  end\nend",
    )
    .unwrap();

    let exc = rt.load("raise Noisy, 'x'").exception.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(exc.to_string(), "x (Noisy)");

    assert_eq!(rt.inspect(exc.value().unwrap()), "noisy");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
