//! GC arena
//!
//! The arena is a stack of temporary roots. Every fresh allocation is pushed
//! onto it, so an object survives collection at least until the arena is
//! restored below its position. Native code brackets allocating sequences
//! with [`Arena::save`] / [`Arena::restore`] and re-protects whatever must
//! outlive the bracket.

use crate::value::ObjRef;

/// Arena checkpoint returned by [`Arena::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaIndex(usize);

impl ArenaIndex {
    /// Raw stack depth
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Rebuild from a raw stack depth
    pub const fn from_usize(depth: usize) -> Self {
        Self(depth)
    }
}

/// Arena overflow: the push was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaOverflow;

/// Stack of temporary GC roots
pub struct Arena {
    entries: Vec<ObjRef>,
    capacity: Option<usize>,
}

impl Arena {
    /// Create an arena; `None` means unbounded
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Current checkpoint
    #[inline]
    pub fn save(&self) -> ArenaIndex {
        ArenaIndex(self.entries.len())
    }

    /// Drop every entry registered after `index`
    ///
    /// Restoring to a checkpoint above the current depth is a nesting error;
    /// it leaves the arena unchanged.
    pub fn restore(&mut self, index: ArenaIndex) {
        if index.0 > self.entries.len() {
            tracing::warn!(
                requested = index.0,
                depth = self.entries.len(),
                "arena restored out of order"
            );
            return;
        }
        self.entries.truncate(index.0);
    }

    /// Register a temporary root
    pub fn push(&mut self, r: ObjRef) -> Result<(), ArenaOverflow> {
        if let Some(cap) = self.capacity {
            if self.entries.len() >= cap {
                return Err(ArenaOverflow);
            }
        }
        self.entries.push(r);
        Ok(())
    }

    /// Register a temporary root ignoring the capacity
    ///
    /// Used on paths that run outside any jump context, where an overflow
    /// error could not be raised.
    pub fn push_forced(&mut self, r: ObjRef) {
        self.entries.push(r);
    }

    /// Current depth
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the arena holds no roots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over registered roots
    pub fn iter(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.entries.iter().copied()
    }
}
