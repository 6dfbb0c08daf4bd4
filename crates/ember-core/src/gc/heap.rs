//! Slot heap for GC-managed objects
//!
//! Objects live in a vector of slots. Freed slots go on a free list and get
//! their generation bumped so stale [`ObjRef`]s are detected on lookup.

use crate::object::HeapObject;
use crate::value::ObjRef;

struct Slot {
    generation: u32,
    marked: bool,
    object: Option<HeapObject>,
}

/// Heap allocator for GC-managed objects
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
    total_allocations: u64,
}

impl Heap {
    /// Create an empty heap
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            total_allocations: 0,
        }
    }

    /// Store an object and return a reference to it
    pub fn allocate(&mut self, object: HeapObject) -> ObjRef {
        self.live += 1;
        self.total_allocations += 1;

        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            slot.marked = false;
            return ObjRef::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            marked: false,
            object: Some(object),
        });
        ObjRef::new(index, 0)
    }

    fn slot(&self, r: ObjRef) -> Option<&Slot> {
        self.slots
            .get(r.index() as usize)
            .filter(|s| s.generation == r.generation() && s.object.is_some())
    }

    /// Look up a live object
    pub fn get(&self, r: ObjRef) -> Option<&HeapObject> {
        self.slot(r).and_then(|s| s.object.as_ref())
    }

    /// Look up a live object mutably
    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut HeapObject> {
        self.slots
            .get_mut(r.index() as usize)
            .filter(|s| s.generation == r.generation())
            .and_then(|s| s.object.as_mut())
    }

    /// Whether `r` still refers to the object it was issued for
    pub fn is_live(&self, r: ObjRef) -> bool {
        self.slot(r).is_some()
    }

    /// Number of live objects
    pub fn live_objects(&self) -> usize {
        self.live
    }

    /// Number of allocations since creation
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    pub(crate) fn clear_marks(&mut self) {
        for slot in &mut self.slots {
            slot.marked = false;
        }
    }

    /// Set the mark bit; returns false if it was already set or `r` is dead
    pub(crate) fn mark(&mut self, r: ObjRef) -> bool {
        match self.slots.get_mut(r.index() as usize) {
            Some(slot)
                if slot.generation == r.generation() && slot.object.is_some() && !slot.marked =>
            {
                slot.marked = true;
                true
            }
            _ => false,
        }
    }

    /// Free every live object whose mark bit is clear; returns how many were freed
    pub(crate) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if slot.object.is_some() && !slot.marked {
                self.release(index as u32);
                freed += 1;
            }
        }
        freed
    }

    /// Free every object regardless of reachability
    pub fn free_all(&mut self) -> usize {
        let mut freed = 0;
        for index in 0..self.slots.len() {
            if self.slots[index].object.is_some() {
                self.release(index as u32);
                freed += 1;
            }
        }
        freed
    }

    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let object = slot.object.take();
        slot.generation = slot.generation.wrapping_add(1);
        slot.marked = false;
        self.free_list.push(index);
        self.live -= 1;

        if let Some(HeapObject::Data(mut data)) = object {
            if let Some(payload) = data.payload.take() {
                (data.data_type.free)(payload);
            }
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        // Finalizers of foreign data must run even if nobody called free_all
        self.free_all();
    }
}
