//! Interpreter state
//!
//! An [`Interp`] owns one heap, its class table, the call frames of the
//! script being evaluated, the installed jump context and the ambient
//! exception slot. Operations that can fail raise: they store an exception
//! object in the slot and jump to the innermost installed jump context (see
//! [`crate::jump`]). Calling a raising operation with no jump context
//! installed aborts the process, so embedders wrap every such call.

mod classes;
mod eval;
mod exception;
mod kernel;
mod options;

pub use classes::CoreClasses;
pub use options::{InterpOptions, ResourceLimits, DEFAULT_MAX_CALL_DEPTH};

use crate::error::{CoreError, CoreResult};
use crate::gc::{ArenaIndex, GarbageCollector, HeapStats};
use crate::jump::{self, JmpBuf};
use crate::object::{DataType, HeapObject, Method, NativeFn, ProcBody, RData, RProc};
use crate::value::{ObjRef, Value};
use rustc_hash::FxHashMap;
use std::any::Any;

/// One activation record
#[derive(Debug)]
pub(crate) struct Frame {
    /// Receiver
    pub(crate) self_val: Value,
    /// Local variables
    pub(crate) locals: Vec<(String, Value)>,
    /// Arguments the method was called with
    pub(crate) args: Vec<Value>,
    /// Proc being run, for access to its captured environment
    pub(crate) proc_: Option<ObjRef>,
    /// Class that `def` adds methods to
    pub(crate) def_target: ObjRef,
}

impl Frame {
    pub(crate) fn new(self_val: Value, def_target: ObjRef) -> Self {
        Self {
            self_val,
            locals: Vec::new(),
            args: Vec::new(),
            proc_: None,
            def_target,
        }
    }

    pub(crate) fn local(&self, name: &str) -> Value {
        self.locals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .unwrap_or_default()
    }

    pub(crate) fn set_local(&mut self, name: &str, value: Value) {
        match self.locals.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.locals.push((name.to_string(), value)),
        }
    }
}

/// Embedded interpreter instance
pub struct Interp {
    pub(crate) gc: GarbageCollector,
    pub(crate) classes: CoreClasses,
    pub(crate) consts: FxHashMap<String, ObjRef>,
    pub(crate) frames: Vec<Frame>,
    jmp: Option<JmpBuf>,
    next_jmp: u64,
    exc: Option<ObjRef>,
    nomem_err: ObjRef,
    pub(crate) top_self: ObjRef,
    ud: Option<Box<dyn Any>>,
    options: InterpOptions,
    bootstrap_objects: usize,
}

impl Interp {
    /// Create an interpreter with its core classes
    ///
    /// Fails if the options are unusable or the core classes do not fit in
    /// the configured object limit.
    pub fn open(options: InterpOptions) -> CoreResult<Self> {
        if options.gc_threshold == 0 {
            return Err(CoreError::InvalidOptions(
                "gc_threshold must be positive".to_string(),
            ));
        }
        if options.limits.max_call_depth == 0 {
            return Err(CoreError::InvalidOptions(
                "max_call_depth must be positive".to_string(),
            ));
        }
        if options.limits.arena_capacity == Some(0) {
            return Err(CoreError::InvalidOptions(
                "arena_capacity must be positive".to_string(),
            ));
        }

        let mut gc = GarbageCollector::new(
            options.gc_threshold,
            options.limits.max_objects,
            options.limits.arena_capacity,
        );
        let mut consts = FxHashMap::default();
        let classes = CoreClasses::boot(&mut gc, &mut consts)?;

        let message = classes::boot_alloc(
            &mut gc,
            HeapObject::String {
                class: classes.string,
                value: "failed to allocate memory".to_string(),
            },
        )?;
        let nomem_err = classes::boot_alloc(
            &mut gc,
            HeapObject::Object(crate::object::RObject {
                class: classes.no_memory_error,
                ivars: vec![("@message".to_string(), Value::Obj(message))],
            }),
        )?;
        let top_self = classes::boot_alloc(
            &mut gc,
            HeapObject::Object(crate::object::RObject {
                class: classes.object,
                ivars: Vec::new(),
            }),
        )?;

        let bootstrap_objects = gc.heap.live_objects();
        let mut interp = Self {
            gc,
            classes,
            consts,
            frames: Vec::new(),
            jmp: None,
            next_jmp: 0,
            exc: None,
            nomem_err,
            top_self,
            ud: None,
            options,
            bootstrap_objects,
        };
        kernel::install(&mut interp);
        interp
            .frames
            .push(Frame::new(Value::Obj(top_self), interp.classes.object));

        tracing::debug!(objects = bootstrap_objects, "interpreter opened");
        Ok(interp)
    }

    /// Tear the interpreter down
    ///
    /// User data is dropped first, then every heap object is released and
    /// foreign data finalizers run.
    pub fn close(self) {
        drop(self);
    }

    /// Options this interpreter was opened with
    pub fn options(&self) -> &InterpOptions {
        &self.options
    }

    /// Core classes
    pub fn classes(&self) -> &CoreClasses {
        &self.classes
    }

    /// Number of heap objects created by [`Interp::open`]
    pub fn bootstrap_objects(&self) -> usize {
        self.bootstrap_objects
    }

    /// The top-level `self`
    pub fn top_self(&self) -> Value {
        Value::Obj(self.top_self)
    }

    // ------------------------------------------------------------------
    // Allocation and GC
    // ------------------------------------------------------------------

    /// Allocate a heap object and register it in the arena
    ///
    /// Raises `NoMemoryError` when the object limit is reached after a full
    /// collection or the arena is full. A data payload that could not be
    /// stored is handed to its finalizer before raising.
    pub(crate) fn alloc(&mut self, object: HeapObject) -> ObjRef {
        if self.gc.at_limit() || self.gc.should_collect() {
            self.full_gc();
        }
        if self.gc.at_limit() {
            if let HeapObject::Data(mut data) = object {
                if let Some(payload) = data.payload.take() {
                    (data.data_type.free)(payload);
                }
            }
            self.raise_nomem();
        }

        let r = self.gc.allocate_raw(object);
        if self.gc.arena.push(r).is_err() {
            self.raise_nomem();
        }
        r
    }

    /// Run a full mark-sweep collection; returns the number of objects freed
    pub fn full_gc(&mut self) -> usize {
        let mut roots = Vec::with_capacity(self.frames.len() * 4 + self.consts.len() + 2);
        roots.push(self.nomem_err);
        roots.push(self.top_self);
        roots.extend(self.exc);
        roots.extend(self.consts.values().copied());
        for frame in &self.frames {
            roots.extend(frame.self_val.as_obj());
            roots.extend(frame.locals.iter().filter_map(|(_, v)| v.as_obj()));
            roots.extend(frame.args.iter().filter_map(Value::as_obj));
            roots.extend(frame.proc_);
            roots.push(frame.def_target);
        }
        self.gc.collect(roots)
    }

    /// Current arena checkpoint
    pub fn gc_arena_save(&self) -> ArenaIndex {
        self.gc.arena.save()
    }

    /// Release arena registrations made after `index`
    pub fn gc_arena_restore(&mut self, index: ArenaIndex) {
        tracing::trace!(
            from = self.gc.arena.len(),
            to = index.as_usize(),
            "arena restore"
        );
        self.gc.arena.restore(index);
    }

    /// Register `value` in the arena; raises `NoMemoryError` if the arena is full
    pub fn gc_protect(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            if self.gc.arena.push(r).is_err() {
                self.raise_nomem();
            }
        }
    }

    /// Register `value` in the arena ignoring its capacity
    pub fn gc_protect_forced(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.gc.arena.push_forced(r);
        }
    }

    /// Keep `value` alive until [`Interp::gc_unregister`]
    pub fn gc_register(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.gc.roots.register(r);
        }
    }

    /// Drop a permanent root added by [`Interp::gc_register`]
    pub fn gc_unregister(&mut self, value: Value) {
        if let Value::Obj(r) = value {
            self.gc.roots.unregister(r);
        }
    }

    /// Number of live heap objects
    pub fn live_objects(&self) -> usize {
        self.gc.heap.live_objects()
    }

    /// Heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.gc.heap_stats()
    }

    /// Whether `value` is an immediate or refers to a live object
    pub fn is_live(&self, value: Value) -> bool {
        match value {
            Value::Obj(r) => self.gc.heap.is_live(r),
            _ => true,
        }
    }

    /// Change the live-object limit
    pub fn set_max_objects(&mut self, max: Option<usize>) {
        self.gc.set_max_objects(max);
    }

    // ------------------------------------------------------------------
    // Frames and jump contexts
    // ------------------------------------------------------------------

    /// Call depth
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
    }

    pub(crate) fn frame(&self) -> &Frame {
        // Frame 0 (top level) is pushed by open() and never popped
        &self.frames[self.frames.len() - 1]
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Run `f` in a new frame, popping it on normal return
    ///
    /// On a jump the frame is discarded by whoever catches it.
    pub(crate) fn with_frame<R>(&mut self, frame: Frame, f: impl FnOnce(&mut Self) -> R) -> R {
        self.frames.push(frame);
        let result = f(self);
        self.frames.pop();
        result
    }

    /// Installed jump context
    pub fn jmp(&self) -> Option<JmpBuf> {
        self.jmp
    }

    /// Install a jump context (or none)
    pub fn set_jmp(&mut self, jmp: Option<JmpBuf>) {
        self.jmp = jmp;
    }

    /// Mint a jump context identity
    pub fn new_jmpbuf(&mut self) -> JmpBuf {
        self.next_jmp += 1;
        JmpBuf::new(self.next_jmp)
    }

    /// Jump to the installed jump context
    ///
    /// With none installed there is nowhere to go and the process aborts.
    pub(crate) fn throw(&mut self) -> ! {
        match self.jmp {
            Some(target) => {
                tracing::trace!(target = target.id(), "jump");
                jump::throw_to(target)
            }
            None => {
                tracing::error!("exception raised with no jump context installed");
                std::process::abort()
            }
        }
    }

    // ------------------------------------------------------------------
    // Ambient exception slot
    // ------------------------------------------------------------------

    /// Pending exception
    pub fn exc(&self) -> Option<ObjRef> {
        self.exc
    }

    /// Take the pending exception, leaving the slot empty
    pub fn take_exc(&mut self) -> Option<ObjRef> {
        self.exc.take()
    }

    /// Overwrite the pending exception
    pub fn set_exc(&mut self, exc: Option<ObjRef>) {
        self.exc = exc;
    }

    /// Empty the slot
    pub fn clear_exc(&mut self) {
        self.exc = None;
    }

    // ------------------------------------------------------------------
    // User data
    // ------------------------------------------------------------------

    /// Attach embedder data, returning what was attached before
    pub fn set_ud(&mut self, ud: Box<dyn Any>) -> Option<Box<dyn Any>> {
        self.ud.replace(ud)
    }

    /// Borrow embedder data as `T`
    pub fn ud_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.ud.as_mut().and_then(|ud| ud.downcast_mut::<T>())
    }

    /// Detach embedder data
    pub fn take_ud(&mut self) -> Option<Box<dyn Any>> {
        self.ud.take()
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    /// New string object
    pub fn str_new(&mut self, s: &str) -> Value {
        let class = self.classes.string;
        Value::Obj(self.alloc(HeapObject::String {
            class,
            value: s.to_string(),
        }))
    }

    /// Contents of a string object
    pub fn string_value(&self, value: Value) -> Option<&str> {
        match value.as_obj().and_then(|r| self.gc.heap.get(r)) {
            Some(HeapObject::String { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Native proc whose body can read `env` through [`Interp::cfunc_env_get`]
    pub fn proc_new_native_with_env(&mut self, func: NativeFn, env: &[Value]) -> ObjRef {
        self.alloc(HeapObject::Proc(RProc {
            body: ProcBody::Native(func),
            env: env.to_vec(),
        }))
    }

    /// Captured environment entry of the running native proc
    pub fn cfunc_env_get(&self, index: usize) -> Option<Value> {
        let proc_ = self.frame().proc_?;
        match self.gc.heap.get(proc_) {
            Some(HeapObject::Proc(p)) => p.env.get(index).copied(),
            _ => None,
        }
    }

    /// Arguments of the running method
    pub fn arguments(&self) -> &[Value] {
        &self.frame().args
    }

    /// Receiver of the running method
    pub fn current_self(&self) -> Value {
        self.frame().self_val
    }

    /// Wrap a host payload in a data object
    ///
    /// `class` defaults to `Data`. If allocation fails the payload is passed
    /// to `data_type.free` before the error is raised.
    pub fn data_object_alloc(
        &mut self,
        class: Option<ObjRef>,
        payload: Box<dyn Any>,
        data_type: &'static DataType,
    ) -> ObjRef {
        let class = class.unwrap_or(self.classes.data);
        self.alloc(HeapObject::Data(RData {
            class,
            data_type,
            payload: Some(payload),
        }))
    }

    /// Payload of a data object, if it was created with `data_type`
    pub fn data_get(&self, value: Value, data_type: &'static DataType) -> Option<&dyn Any> {
        match value.as_obj().and_then(|r| self.gc.heap.get(r)) {
            Some(HeapObject::Data(d)) if std::ptr::eq(d.data_type, data_type) => {
                d.payload.as_deref()
            }
            _ => None,
        }
    }

    /// Add a method to a class; raises `TypeError` if `class` is not a class
    pub fn define_method_raw(&mut self, class: ObjRef, name: &str, method: Method) {
        match self.gc.heap.get_mut(class) {
            Some(HeapObject::Class(c)) => {
                c.methods.insert(name.to_string(), method);
            }
            _ => {
                let type_error = self.classes.type_error;
                self.raise(type_error, "method target is not a class")
            }
        }
    }
}

impl Drop for Interp {
    fn drop(&mut self) {
        drop(self.ud.take());
        let freed = self.gc.heap.free_all();
        tracing::debug!(freed, "interpreter closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_bad_options() {
        let options = InterpOptions {
            gc_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(Interp::open(options), Err(CoreError::InvalidOptions(_))));

        let options = InterpOptions {
            limits: ResourceLimits {
                arena_capacity: Some(0),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(Interp::open(options), Err(CoreError::InvalidOptions(_))));

        let options = InterpOptions {
            limits: ResourceLimits {
                max_call_depth: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(Interp::open(options), Err(CoreError::InvalidOptions(_))));
    }

    #[test]
    fn test_open_fails_when_core_classes_do_not_fit() {
        let options = InterpOptions {
            limits: ResourceLimits::with_object_limit(3),
            ..Default::default()
        };
        assert!(matches!(Interp::open(options), Err(CoreError::Bootstrap(_))));
    }

    #[test]
    fn test_bootstrap_leaves_arena_empty() {
        let interp = Interp::open(InterpOptions::default()).unwrap();
        let stats = interp.heap_stats();
        assert_eq!(stats.arena_depth, 0);
        assert_eq!(stats.live_objects, interp.bootstrap_objects());
    }

    #[test]
    fn test_full_gc_keeps_bootstrap_objects() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        interp.full_gc();
        assert_eq!(interp.live_objects(), interp.bootstrap_objects());
    }

    #[test]
    fn test_user_data() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        assert!(interp.set_ud(Box::new(7u32)).is_none());
        *interp.ud_mut::<u32>().unwrap() += 1;
        assert!(interp.ud_mut::<String>().is_none());
        let ud = interp.take_ud().unwrap();
        assert_eq!(*ud.downcast::<u32>().unwrap(), 8);
    }

    #[test]
    fn test_jmpbufs_are_distinct() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        let a = interp.new_jmpbuf();
        let b = interp.new_jmpbuf();
        assert_ne!(a, b);
        assert_eq!(interp.jmp(), None);
    }
}
