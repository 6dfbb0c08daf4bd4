//! Integration tests for the GC arena and collector
//!
//! Tests cover:
//! - Arena save/restore releasing exactly the later registrations
//! - Permanent roots
//! - Object limit raising NoMemoryError
//! - Foreign data finalizers

use ember_core::jump::{self, Unwound};
use ember_core::object::DataType;
use ember_core::{Interp, InterpOptions, ResourceLimits, Value};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

fn open() -> Interp {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    Interp::open(InterpOptions::default()).unwrap()
}

#[test]
fn test_arena_restore_releases_later_allocations_only() {
    let mut interp = open();
    let baseline = interp.live_objects();

    let (kept, dropped) = jump::protect(&mut interp, |interp| {
        let kept = interp.str_new("before mark");
        let mark = interp.gc_arena_save();
        let dropped: Vec<Value> = (0..10).map(|i| interp.str_new(&i.to_string())).collect();
        interp.gc_arena_restore(mark);
        (kept, dropped)
    })
    .unwrap();

    assert_eq!(interp.live_objects(), baseline + 11);
    interp.full_gc();

    assert_eq!(interp.live_objects(), baseline + 1);
    assert!(interp.is_live(kept));
    assert!(dropped.iter().all(|v| !interp.is_live(*v)));
}

#[test]
fn test_unbracketed_allocations_are_retained() {
    let mut interp = open();
    let baseline = interp.live_objects();

    jump::protect(&mut interp, |interp| {
        for i in 0..50 {
            interp.str_new(&i.to_string());
        }
    })
    .unwrap();

    interp.full_gc();
    assert_eq!(interp.live_objects(), baseline + 50);
    assert_eq!(interp.heap_stats().arena_depth, 50);
}

#[test]
fn test_register_survives_arena_restore() {
    let mut interp = open();

    let value = jump::protect(&mut interp, |interp| {
        let mark = interp.gc_arena_save();
        let value = interp.str_new("pinned");
        interp.gc_register(value);
        interp.gc_arena_restore(mark);
        value
    })
    .unwrap();

    interp.full_gc();
    assert_eq!(interp.string_value(value), Some("pinned"));

    interp.gc_unregister(value);
    interp.full_gc();
    assert!(!interp.is_live(value));
}

#[test]
fn test_object_limit_raises_no_memory_error() {
    let mut interp = Interp::open(InterpOptions {
        limits: ResourceLimits::with_object_limit(1_000),
        ..Default::default()
    })
    .unwrap();
    interp.set_max_objects(Some(interp.live_objects()));

    let outcome = jump::protect(&mut interp, |interp| interp.str_new("too much"));
    assert!(matches!(outcome, Err(Unwound::Landed)));

    let exc = interp.take_exc().unwrap();
    let no_memory_error = interp.classes().no_memory_error;
    assert!(interp.is_kind_of(Value::Obj(exc), no_memory_error));
}

#[test]
fn test_arena_overflow_raises() {
    let mut interp = Interp::open(InterpOptions {
        limits: ResourceLimits {
            arena_capacity: Some(4),
            ..Default::default()
        },
        ..Default::default()
    })
    .unwrap();

    let outcome = jump::protect(&mut interp, |interp| {
        for _ in 0..5 {
            interp.str_new("x");
        }
    });
    assert!(matches!(outcome, Err(Unwound::Landed)));
    assert!(interp.take_exc().is_some());
}

static SWEPT: AtomicUsize = AtomicUsize::new(0);
static LOST: AtomicUsize = AtomicUsize::new(0);

fn count_swept(payload: Box<dyn Any>) {
    assert!(payload.downcast_ref::<String>().is_some());
    SWEPT.fetch_add(1, Ordering::SeqCst);
}

fn count_lost(_payload: Box<dyn Any>) {
    LOST.fetch_add(1, Ordering::SeqCst);
}

static COUNTED: DataType = DataType {
    struct_name: "test::Counted",
    free: count_swept,
};

static OTHER: DataType = DataType {
    struct_name: "test::Other",
    free: count_swept,
};

static FAILING: DataType = DataType {
    struct_name: "test::Failing",
    free: count_lost,
};

#[test]
fn test_data_objects() {
    let mut interp = open();

    let obj = jump::protect(&mut interp, |interp| {
        let mark = interp.gc_arena_save();
        let obj = interp.data_object_alloc(None, Box::new("payload".to_string()), &COUNTED);
        interp.gc_arena_restore(mark);
        obj
    })
    .unwrap();

    let payload = interp.data_get(Value::Obj(obj), &COUNTED);
    assert_eq!(
        payload.and_then(|p| p.downcast_ref::<String>()).map(String::as_str),
        Some("payload")
    );
    assert!(interp.data_get(Value::Obj(obj), &OTHER).is_none());

    interp.full_gc();
    assert!(!interp.is_live(Value::Obj(obj)));
    assert_eq!(SWEPT.load(Ordering::SeqCst), 1);
}

#[test]
fn test_data_payload_freed_when_allocation_fails() {
    let mut interp = open();
    interp.set_max_objects(Some(interp.live_objects()));

    let outcome = jump::protect(&mut interp, |interp| {
        interp.data_object_alloc(None, Box::new("lost".to_string()), &FAILING)
    });

    assert!(outcome.is_err());
    assert_eq!(LOST.load(Ordering::SeqCst), 1);
}
