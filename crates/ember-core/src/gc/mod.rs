//! Garbage collection system
//!
//! This module provides a mark-sweep garbage collector for the Ember runtime.
//!
//! # Architecture
//!
//! - **Heap**: slot storage with generation-checked references
//! - **Arena**: stack of temporary roots; every fresh allocation lands here
//! - **RootSet**: permanent roots that outlive any arena bracket
//! - **GarbageCollector**: mark-sweep over all of the above plus interpreter roots
//!
//! # Arena discipline
//!
//! ```text
//! let ai = interp.gc_arena_save();
//! ... allocate temporaries ...
//! interp.gc_arena_restore(ai);   // temporaries become collectable
//! interp.gc_protect(result);     // keep the one object that must survive
//! ```
//!
//! Forgetting the restore does not corrupt anything, but every temporary stays
//! rooted and the live-object count grows without bound.

mod arena;
mod collector;
mod heap;
mod roots;

pub use arena::{Arena, ArenaIndex, ArenaOverflow};
pub use collector::{GarbageCollector, GcStats, HeapStats};
pub use heap::Heap;
pub use roots::RootSet;
