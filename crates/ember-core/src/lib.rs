//! Ember embedded runtime
//!
//! A small embeddable interpreter whose error signalling works like a C
//! runtime built on `setjmp`/`longjmp`:
//! - raising stores the exception in an ambient slot and jumps to the
//!   innermost installed jump context ([`jump`])
//! - every allocation is registered in a GC arena until the arena is restored
//!   ([`gc`])
//! - host code can attach foreign data with finalizers and native procs with
//!   captured environments ([`object`])
//!
//! Embedders must wrap every raising call in a jump context; see the
//! `ember-bridge` crate for the safe surface.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod gc;
pub mod interp;
pub mod jump;
pub mod object;
pub mod parser;
pub mod value;

pub use error::{CoreError, CoreResult};
pub use gc::{ArenaIndex, HeapStats};
pub use interp::{CoreClasses, Interp, InterpOptions, ResourceLimits, DEFAULT_MAX_CALL_DEPTH};
pub use jump::{JmpBuf, Unwound};
pub use object::{DataType, Method, NativeFn};
pub use value::{ObjRef, Value};
