//! Shared helpers for the integration suites

#![allow(dead_code)]

use ember_bridge::Runtime;

/// Install a test subscriber once; filter with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Open a runtime with default options
pub fn open() -> Runtime {
    init_tracing();
    Runtime::open().unwrap()
}

/// Evaluate `source` and return the resulting string
pub fn load_str(rt: &mut Runtime, source: &str) -> String {
    let value = rt.load_string(source).unwrap();
    rt.context(|ctx| ctx.string_value(value).map(str::to_string))
        .unwrap_or_else(|| panic!("{} did not return a string", source))
}

/// Collect garbage and return the live-object count
pub fn settle(rt: &mut Runtime) -> usize {
    rt.full_gc();
    rt.live_objects()
}
