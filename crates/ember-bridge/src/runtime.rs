//! Runtime handle lifecycle

use crate::boundary;
use crate::context::Context;
use crate::error::{BridgeError, BridgeResult, CallbackError, OpenError};
use crate::object::{ArenaMark, ClassRef, LoadOutcome, ProcRef};
use crate::state::{BridgeUserData, OpenOptions};
use ember_core::{HeapStats, Interp, JmpBuf, ObjRef, Value};

/// One embedded interpreter plus the bridge state attached to it
///
/// Every operation that can raise inside the runtime returns a `Result`
/// instead; no runtime jump ever reaches the caller. Dropping the handle
/// closes it.
pub struct Runtime {
    interp: Interp,
}

impl Runtime {
    /// Open a runtime with default options
    pub fn open() -> Result<Self, OpenError> {
        Self::open_with(OpenOptions::default())
    }

    /// Open a runtime
    ///
    /// Either the handle is fully set up or everything allocated on the way
    /// has been released again.
    pub fn open_with(options: OpenOptions) -> Result<Self, OpenError> {
        let ud = BridgeUserData::allocate(options.ledger).ok_or(OpenError::UserDataAlloc)?;

        let interp = match Interp::open(options.interp) {
            Ok(interp) => interp,
            Err(e) => {
                drop(ud);
                return Err(OpenError::InterpreterInit(e.to_string()));
            }
        };

        let mut runtime = Runtime { interp };
        runtime.interp.set_ud(Box::new(ud));

        let mark = runtime.interp.gc_arena_save();
        match boundary::protect(&mut runtime.interp, create_panic_carrier) {
            Ok(carrier) => {
                runtime.interp.gc_arena_restore(mark);
                if let Some(ud) = runtime.interp.ud_mut::<BridgeUserData>() {
                    ud.panic_carrier = Some(carrier);
                }
            }
            Err(exc) => {
                let message = exc.to_string();
                tracing::debug!(%message, "panic carrier setup failed");
                drop(runtime);
                return Err(OpenError::PanicCarrier(message));
            }
        }

        tracing::debug!(
            live_objects = runtime.interp.live_objects(),
            "runtime opened"
        );
        Ok(runtime)
    }

    /// Close the runtime, finalizing every remaining object
    pub fn close(self) {
        drop(self);
    }

    /// Run `f` with a scoped context
    ///
    /// Allocations made through the context are released when `f` returns.
    pub fn context<R>(&mut self, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let mut ctx = Context::scoped(&mut self.interp);
        f(&mut ctx)
    }

    /// [`Runtime::context`] for code that wants an owned error
    pub fn try_context<R>(
        &mut self,
        f: impl FnOnce(&mut Context<'_>) -> BridgeResult<R>,
    ) -> Result<R, BridgeError> {
        self.context(|ctx| f(ctx).map_err(BridgeError::from))
    }

    fn unscoped(&mut self) -> Context<'_> {
        Context::unscoped(&mut self.interp)
    }

    /// Current arena checkpoint
    pub fn arena_save(&self) -> ArenaMark {
        ArenaMark(self.interp.gc_arena_save())
    }

    /// Release arena registrations made after `mark`
    pub fn arena_restore(&mut self, mark: ArenaMark) {
        self.interp.gc_arena_restore(mark.0);
    }

    /// `Object`
    pub fn object_class(&self) -> ClassRef {
        ClassRef(self.interp.classes().object)
    }

    /// Look up a class by constant name
    pub fn class_get(&mut self, name: &str) -> BridgeResult<ClassRef> {
        self.unscoped().class_get(name)
    }

    /// Define a class, or fetch the existing one with the same superclass
    pub fn define_class(&mut self, name: &str, superclass: ClassRef) -> BridgeResult<ClassRef> {
        self.unscoped().define_class(name, superclass)
    }

    /// Diagnostic string for `value`; never fails, never empty
    pub fn inspect(&mut self, value: Value) -> String {
        self.unscoped().inspect(value)
    }

    /// Wrap a host function as a callable runtime object
    pub fn make_native_callback<F>(&mut self, func: F) -> BridgeResult<ProcRef>
    where
        F: Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError> + 'static,
    {
        self.unscoped().make_native_callback(func)
    }

    /// Install a callable as method `name` of `class`
    pub fn define_method_proc(
        &mut self,
        class: ClassRef,
        name: &str,
        proc_: ProcRef,
    ) -> BridgeResult<()> {
        self.unscoped().define_method_proc(class, name, proc_)
    }

    /// Define method `name` of `class` backed by a host function
    pub fn define_method<F>(&mut self, class: ClassRef, name: &str, func: F) -> BridgeResult<()>
    where
        F: Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError> + 'static,
    {
        self.unscoped().define_method(class, name, func)
    }

    /// Evaluate source code
    pub fn load(&mut self, source: impl AsRef<[u8]>) -> LoadOutcome {
        self.unscoped().load(source)
    }

    /// Evaluate source code, returning the exception as `Err`
    pub fn load_string(&mut self, source: &str) -> BridgeResult<Value> {
        self.unscoped().load_string(source)
    }

    /// Call a method
    pub fn funcall(&mut self, recv: Value, name: &str, args: &[Value]) -> BridgeResult<Value> {
        self.unscoped().funcall(recv, name, args)
    }

    /// Whether `value` still refers to a live object
    pub fn is_live(&self, value: Value) -> bool {
        self.interp.is_live(value)
    }

    /// Installed jump context; `None` whenever control is back with the host
    pub fn jump_context(&self) -> Option<JmpBuf> {
        self.interp.jmp()
    }

    /// Number of live heap objects
    pub fn live_objects(&self) -> usize {
        self.interp.live_objects()
    }

    /// Heap statistics
    pub fn heap_stats(&self) -> HeapStats {
        self.interp.heap_stats()
    }

    /// Run a full collection; returns the number of objects freed
    pub fn full_gc(&mut self) -> usize {
        self.interp.full_gc()
    }

    /// Change the live-object limit
    pub fn set_max_objects(&mut self, max: Option<usize>) {
        self.interp.set_max_objects(max);
    }

    /// `value` as a class handle, if it is a class
    pub fn class_ref(&self, value: Value) -> Option<ClassRef> {
        match value {
            Value::Obj(r) if self.interp.is_class(value) => Some(ClassRef(r)),
            _ => None,
        }
    }

    /// `value` as a callable handle, if it is a proc
    pub fn proc_ref(&self, value: Value) -> Option<ProcRef> {
        let proc_class = self.interp.classes().proc_;
        match value {
            Value::Obj(r)
                if self.interp.is_live(value) && self.interp.is_kind_of(value, proc_class) =>
            {
                Some(ProcRef(r))
            }
            _ => None,
        }
    }

    /// The panic carrier, for diagnostics
    pub fn panic_carrier(&mut self) -> Option<Value> {
        self.interp
            .ud_mut::<BridgeUserData>()
            .and_then(|ud| ud.panic_carrier)
            .map(Value::Obj)
    }

    #[cfg(test)]
    pub(crate) fn interp(&self) -> &Interp {
        &self.interp
    }
}

/// Instance of an anonymous copy of `BasicObject`
///
/// The copy has no superclass, so no `rescue` clause can match an instance
/// of it. The instance is registered as a permanent root; the user-data slot
/// that refers to it is not traced.
fn create_panic_carrier(interp: &mut Interp) -> ObjRef {
    let basic_object = interp.class_get("BasicObject");
    let sealed = interp.obj_dup(Value::Obj(basic_object));
    interp.gc_protect(Value::Obj(sealed));
    let carrier = interp.obj_new(sealed, &[]);
    interp.gc_protect(Value::Obj(carrier));
    interp.gc_register(Value::Obj(carrier));
    tracing::debug!(carrier = ?carrier, "panic carrier created");
    carrier
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // User data goes first; the interpreter is released when the field drops.
        drop(self.interp.take_ud());
        tracing::debug!("runtime closed");
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("live_objects", &self.interp.live_objects())
            .field("jump_context", &self.interp.jmp())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UserDataLedger;
    use std::sync::Arc;

    #[test]
    fn test_open_close() {
        let rt = Runtime::open().unwrap();
        assert!(rt.jump_context().is_none());
        rt.close();
    }

    #[test]
    fn test_carrier_is_rooted() {
        let mut rt = Runtime::open().unwrap();
        let carrier = rt.panic_carrier().unwrap();
        rt.full_gc();
        assert!(rt.is_live(carrier));
        assert_eq!(rt.heap_stats().arena_depth, 0);
    }

    #[test]
    fn test_carrier_outside_hierarchy() {
        let mut rt = Runtime::open().unwrap();
        let carrier = rt.panic_carrier().unwrap();
        let basic_object = rt.interp().classes().basic_object;
        assert!(!rt.interp().is_kind_of(carrier, basic_object));
    }

    #[test]
    fn test_handle_conversions() {
        let mut rt = Runtime::open().unwrap();
        let object = rt.object_class();
        assert_eq!(rt.class_ref(object.as_value()), Some(object));
        assert_eq!(rt.class_ref(Value::Int(1)), None);

        let proc_ = rt
            .make_native_callback(|_ctx, _recv, _args| Ok(Value::Nil))
            .unwrap();
        assert_eq!(rt.proc_ref(proc_.as_value()), Some(proc_));
        assert_eq!(rt.proc_ref(object.as_value()), None);
    }

    #[test]
    fn test_ledger_balanced_after_close() {
        let ledger = Arc::new(UserDataLedger::new());
        let rt = Runtime::open_with(OpenOptions {
            ledger: Some(ledger.clone()),
            ..OpenOptions::default()
        })
        .unwrap();
        assert_eq!(ledger.outstanding(), 1);
        rt.close();
        assert_eq!(ledger.outstanding(), 0);
    }

    #[test]
    fn test_user_data_alloc_failure() {
        let ledger = Arc::new(UserDataLedger::with_budget(0));
        let err = Runtime::open_with(OpenOptions {
            ledger: Some(ledger.clone()),
            ..OpenOptions::default()
        })
        .unwrap_err();
        assert_eq!(err, OpenError::UserDataAlloc);
        assert_eq!(ledger.allocated(), 0);
    }
}
