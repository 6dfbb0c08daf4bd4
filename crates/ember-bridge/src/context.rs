//! Scoped access to a runtime

use crate::boundary;
use crate::error::{BridgeResult, CallbackError};
use crate::method;
use crate::object::{ArenaMark, ClassRef, LoadOutcome, ProcRef};
use ember_core::{Interp, JmpBuf, Value};

/// Working scope over one runtime
///
/// A scoped context saves the arena when it is created and restores it when
/// dropped, so every object returned inside the scope stays rooted exactly
/// as long as the scope. Callbacks receive a scoped context.
pub struct Context<'rt> {
    interp: &'rt mut Interp,
    mark: Option<ArenaMark>,
}

impl<'rt> Context<'rt> {
    /// Context that restores the arena on drop
    pub(crate) fn scoped(interp: &'rt mut Interp) -> Self {
        let mark = ArenaMark(interp.gc_arena_save());
        Self {
            interp,
            mark: Some(mark),
        }
    }

    /// Context that leaves arena management to the caller
    pub(crate) fn unscoped(interp: &'rt mut Interp) -> Self {
        Self { interp, mark: None }
    }

    /// `Object`
    pub fn object_class(&self) -> ClassRef {
        ClassRef(self.interp.classes().object)
    }

    /// Look up a class by constant name
    pub fn class_get(&mut self, name: &str) -> BridgeResult<ClassRef> {
        boundary::protect(self.interp, |interp| ClassRef(interp.class_get(name)))
    }

    /// Define a class, or fetch the existing one with the same superclass
    ///
    /// An existing class with a different superclass raises `TypeError`.
    pub fn define_class(&mut self, name: &str, superclass: ClassRef) -> BridgeResult<ClassRef> {
        boundary::protect(self.interp, |interp| {
            ClassRef(interp.define_class(name, Some(superclass.0)))
        })
    }

    /// Diagnostic string for `value`; never fails, never empty
    pub fn inspect(&mut self, value: Value) -> String {
        crate::inspect::inspect(self.interp, value)
    }

    /// Wrap a host function as a callable runtime object
    pub fn make_native_callback<F>(&mut self, func: F) -> BridgeResult<ProcRef>
    where
        F: Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError> + 'static,
    {
        method::make_native_callback(self.interp, func)
    }

    /// Install a callable as method `name` of `class`
    pub fn define_method_proc(
        &mut self,
        class: ClassRef,
        name: &str,
        proc_: ProcRef,
    ) -> BridgeResult<()> {
        method::define_method_proc(self.interp, class, name, proc_)
    }

    /// Define method `name` of `class` backed by a host function
    pub fn define_method<F>(&mut self, class: ClassRef, name: &str, func: F) -> BridgeResult<()>
    where
        F: Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError> + 'static,
    {
        let proc_ = self.make_native_callback(func)?;
        self.define_method_proc(class, name, proc_)
    }

    /// Evaluate source code
    pub fn load(&mut self, source: impl AsRef<[u8]>) -> LoadOutcome {
        crate::load::load(self.interp, source.as_ref())
    }

    /// Evaluate source code, returning the exception as `Err`
    pub fn load_string(&mut self, source: &str) -> BridgeResult<Value> {
        self.load(source).into_result()
    }

    /// Call a method
    pub fn funcall(&mut self, recv: Value, name: &str, args: &[Value]) -> BridgeResult<Value> {
        boundary::protect(self.interp, |interp| interp.funcall(recv, name, args))
    }

    /// New string object
    pub fn str_new(&mut self, s: &str) -> BridgeResult<Value> {
        boundary::protect(self.interp, |interp| interp.str_new(s))
    }

    /// Contents of a string object
    pub fn string_value(&self, value: Value) -> Option<&str> {
        self.interp.string_value(value)
    }

    /// Arguments of the running callback
    pub fn arguments(&self) -> &[Value] {
        self.interp.arguments()
    }

    /// Current arena checkpoint
    pub fn arena_save(&mut self) -> ArenaMark {
        ArenaMark(self.interp.gc_arena_save())
    }

    /// Release arena registrations made after `mark`
    pub fn arena_restore(&mut self, mark: ArenaMark) {
        self.interp.gc_arena_restore(mark.0);
    }

    /// Whether `value` still refers to a live object
    pub fn is_live(&self, value: Value) -> bool {
        self.interp.is_live(value)
    }

    /// Installed jump context
    pub fn jump_context(&self) -> Option<JmpBuf> {
        self.interp.jmp()
    }

    /// Number of live heap objects
    pub fn live_objects(&self) -> usize {
        self.interp.live_objects()
    }

    /// Run a full collection
    pub fn full_gc(&mut self) -> usize {
        self.interp.full_gc()
    }

    /// Protect `value` in the arena; reports arena overflow as an exception
    pub fn gc_protect(&mut self, value: Value) -> BridgeResult<()> {
        boundary::protect(self.interp, |interp| interp.gc_protect(value))
    }

    /// `value.is_a?(class)`
    pub fn is_kind_of(&self, value: Value, class: ClassRef) -> bool {
        self.interp.is_kind_of(value, class.0)
    }

    /// Run `f` in a nested scope with its own arena bracket
    pub fn scope<R>(&mut self, f: impl FnOnce(&mut Context<'_>) -> R) -> R {
        let mut inner = Context::scoped(self.interp);
        f(&mut inner)
    }
}

impl Drop for Context<'_> {
    fn drop(&mut self) {
        if let Some(mark) = self.mark {
            self.interp.gc_arena_restore(mark.0);
        }
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("arena_mark", &self.mark)
            .field("jump_context", &self.interp.jmp())
            .finish()
    }
}

