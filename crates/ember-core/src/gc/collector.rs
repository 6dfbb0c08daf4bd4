//! Mark-sweep garbage collector
//!
//! Roots come from three places: the arena, the permanent root set, and the
//! interpreter state (frames, constants, the pending exception) which the
//! interpreter passes in at collection time.

use super::arena::Arena;
use super::heap::Heap;
use super::roots::RootSet;
use crate::object::HeapObject;
use crate::value::ObjRef;
use std::time::{Duration, Instant};

/// Garbage collector statistics
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Total number of collections
    pub collections: usize,

    /// Total objects freed
    pub objects_freed: usize,

    /// Total pause time
    pub total_pause_time: Duration,

    /// Last collection duration
    pub last_pause_time: Duration,
}

/// Heap statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Objects currently alive (reachable or not yet collected)
    pub live_objects: usize,

    /// Allocations since the heap was created
    pub total_allocations: u64,

    /// Current arena depth
    pub arena_depth: usize,

    /// Live-object count that triggers the next collection
    pub threshold: usize,
}

/// Mark-sweep garbage collector
pub struct GarbageCollector {
    /// Heap allocator
    pub(crate) heap: Heap,

    /// Temporary roots
    pub(crate) arena: Arena,

    /// Permanent roots
    pub(crate) roots: RootSet,

    /// Collection threshold (live objects)
    threshold: usize,

    /// Lower bound for the adaptive threshold
    base_threshold: usize,

    /// Hard limit on live objects
    max_objects: Option<usize>,

    /// Statistics
    stats: GcStats,
}

impl GarbageCollector {
    /// Create a collector
    pub fn new(
        threshold: usize,
        max_objects: Option<usize>,
        arena_capacity: Option<usize>,
    ) -> Self {
        Self {
            heap: Heap::new(),
            arena: Arena::new(arena_capacity),
            roots: RootSet::new(),
            threshold,
            base_threshold: threshold,
            max_objects,
            stats: GcStats::default(),
        }
    }

    /// Whether the live count has crossed the threshold
    pub fn should_collect(&self) -> bool {
        self.heap.live_objects() >= self.threshold
    }

    /// Whether one more allocation would exceed the hard limit
    pub fn at_limit(&self) -> bool {
        self.max_objects
            .is_some_and(|max| self.heap.live_objects() >= max)
    }

    /// Change the hard limit on live objects
    pub fn set_max_objects(&mut self, max: Option<usize>) {
        self.max_objects = max;
    }

    /// Run a full collection with `extra_roots` in addition to the arena and root set
    pub fn collect(&mut self, extra_roots: Vec<ObjRef>) -> usize {
        let start = Instant::now();

        self.mark(extra_roots);
        let freed = self.heap.sweep();

        let duration = start.elapsed();
        self.stats.collections += 1;
        self.stats.objects_freed += freed;
        self.stats.last_pause_time = duration;
        self.stats.total_pause_time += duration;

        // Grow to twice the survivors so steady-state programs don't thrash
        self.threshold = (self.heap.live_objects() * 2).max(self.base_threshold);

        tracing::trace!(freed, live = self.heap.live_objects(), "gc cycle");
        freed
    }

    fn mark(&mut self, extra_roots: Vec<ObjRef>) {
        self.heap.clear_marks();

        let mut worklist = extra_roots;
        worklist.extend(self.arena.iter());
        worklist.extend(self.roots.iter());

        let mut children = Vec::new();
        while let Some(r) = worklist.pop() {
            if !self.heap.mark(r) {
                continue;
            }
            if let Some(object) = self.heap.get(r) {
                children.clear();
                object.trace(&mut children);
                worklist.extend(children.iter().copied());
            }
        }
    }

    /// Allocate without any collection or limit check
    pub(crate) fn allocate_raw(&mut self, object: HeapObject) -> ObjRef {
        self.heap.allocate(object)
    }

    /// Get GC statistics
    pub fn stats(&self) -> &GcStats {
        &self.stats
    }

    /// Get heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        HeapStats {
            live_objects: self.heap.live_objects(),
            total_allocations: self.heap.total_allocations(),
            arena_depth: self.arena.len(),
            threshold: self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(gc: &mut GarbageCollector, s: &str) -> ObjRef {
        gc.allocate_raw(HeapObject::String {
            class: ObjRef::new(u32::MAX, 0),
            value: s.to_string(),
        })
    }

    #[test]
    fn test_gc_creation() {
        let gc = GarbageCollector::new(64, None, None);
        let stats = gc.heap_stats();

        assert_eq!(stats.live_objects, 0);
        assert_eq!(stats.threshold, 64);
    }

    #[test]
    fn test_unrooted_objects_are_collected() {
        let mut gc = GarbageCollector::new(64, None, None);
        string(&mut gc, "a");
        string(&mut gc, "b");

        assert_eq!(gc.collect(Vec::new()), 2);
        assert_eq!(gc.heap_stats().live_objects, 0);
        assert_eq!(gc.stats().collections, 1);
    }

    #[test]
    fn test_arena_and_root_set_keep_objects() {
        let mut gc = GarbageCollector::new(64, None, None);
        let a = string(&mut gc, "a");
        let b = string(&mut gc, "b");
        let _c = string(&mut gc, "c");

        gc.arena.push(a).unwrap();
        gc.roots.register(b);
        gc.collect(Vec::new());

        assert_eq!(gc.heap_stats().live_objects, 2);
        assert!(gc.heap.is_live(a));
        assert!(gc.heap.is_live(b));
    }

    #[test]
    fn test_limit() {
        let mut gc = GarbageCollector::new(64, Some(1), None);
        assert!(!gc.at_limit());
        string(&mut gc, "a");
        assert!(gc.at_limit());
        gc.set_max_objects(None);
        assert!(!gc.at_limit());
    }
}
