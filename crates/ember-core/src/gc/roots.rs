//! Permanent GC roots
//!
//! Objects registered here stay alive until they are unregistered, no matter
//! what happens to the arena. The interpreter uses this for objects that must
//! live as long as the interpreter itself (the preallocated out-of-memory
//! error, the top-level `self`, values pinned by the embedder).

use crate::value::ObjRef;

/// Root set for garbage collection
pub struct RootSet {
    global_roots: Vec<ObjRef>,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self {
            global_roots: Vec::new(),
        }
    }

    /// Register a permanent root
    pub fn register(&mut self, r: ObjRef) {
        self.global_roots.push(r);
    }

    /// Remove one registration of `r`; returns whether it was registered
    pub fn unregister(&mut self, r: ObjRef) -> bool {
        match self.global_roots.iter().rposition(|&g| g == r) {
            Some(pos) => {
                self.global_roots.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Iterate over all roots
    pub fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.global_roots.iter().copied()
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.global_roots.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.global_roots.is_empty()
    }
}

impl Default for RootSet {
    fn default() -> Self {
        Self::new()
    }
}
