//! Host functions as runtime methods
//!
//! A host closure is boxed into a foreign-data object tagged with
//! [`BOXED_FUNC_TYPE`] and captured as the only environment slot of a native
//! proc whose body is the fixed trampoline [`dispatch_boxed_func`]. The
//! collector owns the data object from then on and runs the finalizer when
//! it is reclaimed, including when the runtime is closed.

use crate::boundary;
use crate::context::Context;
use crate::error::{BridgeResult, CallbackError};
use crate::object::{ClassRef, ProcRef};
use crate::state::BridgeUserData;
use ember_core::jump::JumpSignal;
use ember_core::{DataType, Interp, Method, Value};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// Signature of a host callback
pub(crate) type BoxedFunc =
    dyn Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError>;

/// Type descriptor of boxed callback payloads
pub(crate) static BOXED_FUNC_TYPE: DataType = DataType {
    struct_name: "ember_bridge::method::BoxedFunc",
    free: free_boxed_func,
};

fn free_boxed_func(payload: Box<dyn Any>) {
    // May run while the interpreter is being torn down; nothing can be
    // raised from here.
    if panic::catch_unwind(AssertUnwindSafe(move || drop(payload))).is_err() {
        tracing::error!("native callback finalizer panicked");
    }
}

/// Wrap `func` as a native proc
pub(crate) fn make_native_callback<F>(interp: &mut Interp, func: F) -> BridgeResult<ProcRef>
where
    F: Fn(&mut Context<'_>, Value, &[Value]) -> Result<Value, CallbackError> + 'static,
{
    let func: Rc<BoxedFunc> = Rc::new(func);
    boundary::protect(interp, move |interp| {
        let data = interp.data_object_alloc(None, Box::new(func), &BOXED_FUNC_TYPE);
        ProcRef(interp.proc_new_native_with_env(dispatch_boxed_func, &[Value::Obj(data)]))
    })
}

/// Install `proc_` as method `name` of `class`
pub(crate) fn define_method_proc(
    interp: &mut Interp,
    class: ClassRef,
    name: &str,
    proc_: ProcRef,
) -> BridgeResult<()> {
    boundary::protect(interp, |interp| {
        interp.define_method_raw(class.0, name, Method::Proc(proc_.0))
    })
}

fn boxed_func(interp: &Interp) -> Option<Rc<BoxedFunc>> {
    let env = interp.cfunc_env_get(0)?;
    interp
        .data_get(env, &BOXED_FUNC_TYPE)?
        .downcast_ref::<Rc<BoxedFunc>>()
        .cloned()
}

/// Body of every proc made by [`make_native_callback`]
///
/// Runs the host closure in a scoped [`Context`] and turns its outcome back
/// into runtime terms: a value is returned, a [`CallbackError`] is raised,
/// and a host panic is parked in the bridge user data while the panic
/// carrier is raised in its place.
fn dispatch_boxed_func(interp: &mut Interp, recv: Value, args: &[Value]) -> Value {
    let Some(func) = boxed_func(interp) else {
        let type_error = interp.classes().type_error;
        interp.raise(type_error, "native callback payload missing")
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = Context::scoped(&mut *interp);
        func(&mut ctx, recv, args)
    }));

    match outcome {
        Ok(Ok(value)) => {
            interp.gc_protect(value);
            value
        }
        Ok(Err(CallbackError::Exception(exc))) => {
            match exc.obj_ref().filter(|r| interp.is_live(Value::Obj(*r))) {
                Some(obj) => interp.raise_exc(obj),
                None => {
                    let runtime_error = interp.classes().runtime_error;
                    interp.raise(runtime_error, &exc.to_string())
                }
            }
        }
        Ok(Err(CallbackError::Message(message))) => {
            let runtime_error = interp.classes().runtime_error;
            interp.raise(runtime_error, &message)
        }
        Ok(Err(CallbackError::Raise(value))) => {
            let exception = interp.classes().exception;
            match value.as_obj() {
                Some(obj) if interp.is_live(value) && interp.is_kind_of(value, exception) => {
                    interp.raise_exc(obj)
                }
                _ => {
                    let type_error = interp.classes().type_error;
                    interp.raise(type_error, "exception object expected")
                }
            }
        }
        Err(payload) if payload.is::<JumpSignal>() => panic::resume_unwind(payload),
        Err(payload) => {
            let carrier = match interp.ud_mut::<BridgeUserData>() {
                Some(BridgeUserData {
                    panic_carrier: Some(carrier),
                    panic_info,
                    ..
                }) => {
                    *panic_info = Some(payload);
                    *carrier
                }
                _ => panic::resume_unwind(payload),
            };
            tracing::debug!("host panic parked, raising panic carrier");
            interp.raise_exc(carrier)
        }
    }
}
