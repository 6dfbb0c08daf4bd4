//! Ember host boundary
//!
//! The Ember runtime reports errors with non-local jumps that must never
//! reach host frames. This crate is the layer in between: every operation
//! runs inside its own jump context and comes back as a `Result`, objects
//! handed out stay rooted in the GC arena, and host callbacks registered as
//! methods have their failures turned back into runtime raises.
//!
//! # Example
//!
//! ```
//! use ember_bridge::{Runtime, Value};
//!
//! let mut rt = Runtime::open().unwrap();
//! let object = rt.object_class();
//! rt.define_method(object, "twice", |_ctx, _recv, args| match args {
//!     [Value::Int(n)] => Ok(Value::Int(n * 2)),
//!     _ => Err("expected an integer".into()),
//! })
//! .unwrap();
//!
//! assert_eq!(rt.load_string("twice(21)").unwrap(), Value::Int(42));
//!
//! let outcome = rt.load("twice('x')");
//! assert_eq!(
//!     outcome.exception.unwrap().to_string(),
//!     "expected an integer (RuntimeError)"
//! );
//! ```

#![warn(rust_2018_idioms)]

mod boundary;
mod context;
pub mod error;
mod inspect;
mod load;
mod method;
pub mod object;
mod runtime;
pub mod state;

pub use context::Context;
pub use error::{BridgeError, BridgeResult, CallbackError, OpenError};
pub use object::{ArenaMark, ClassRef, Exception, LoadOutcome, ProcRef, INSPECT_PLACEHOLDER};
pub use runtime::Runtime;
pub use state::{OpenOptions, UserDataLedger};

pub use ember_core::{HeapStats, InterpOptions, JmpBuf, ObjRef, ResourceLimits, Value};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
