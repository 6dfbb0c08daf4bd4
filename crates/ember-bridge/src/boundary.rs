//! Jump-to-result conversion
//!
//! Every runtime operation the bridge exposes goes through [`catch_jump`]:
//! a fresh jump context is installed, the operation runs, and the previous
//! context is put back on every exit path. A raise becomes `Err` carrying the
//! exception object; nothing unwinds past this point as a live jump.
//!
//! Host panics travel the other way. The callback trampoline parks them in
//! the bridge user data and raises the panic carrier; when the carrier lands
//! here the parked panic is resumed as an ordinary Rust panic.

use crate::object::Exception;
use crate::state::BridgeUserData;
use ember_core::jump::{self, Unwound};
use ember_core::{Interp, ObjRef, Value};
use std::panic;

/// Values that are re-registered in the arena on their way out of a jump scope
pub(crate) trait Root {
    fn root(&self, interp: &mut Interp);
}

impl Root for () {
    fn root(&self, _interp: &mut Interp) {}
}

impl Root for String {
    fn root(&self, _interp: &mut Interp) {}
}

impl Root for Value {
    fn root(&self, interp: &mut Interp) {
        interp.gc_protect(*self);
    }
}

impl Root for ObjRef {
    fn root(&self, interp: &mut Interp) {
        interp.gc_protect(Value::Obj(*self));
    }
}

impl<T: Root> Root for Option<T> {
    fn root(&self, interp: &mut Interp) {
        if let Some(inner) = self {
            inner.root(interp);
        }
    }
}

/// Run `op` in its own jump context
///
/// Everything `op` registers in the arena is released on both exit paths.
/// On success only the result is re-registered; on a raise the pending
/// exception is taken out of the ambient slot, rooted, and returned.
pub(crate) fn catch_jump<R: Root>(
    interp: &mut Interp,
    op: impl FnOnce(&mut Interp) -> R,
) -> Result<R, Option<ObjRef>> {
    let outer = interp.jmp();
    let mark = interp.gc_arena_save();
    tracing::trace!(
        outer = ?outer.map(|j| j.id()),
        arena = mark.as_usize(),
        "enter jump scope"
    );

    let outcome = jump::protect(interp, |interp| {
        let result = op(interp);
        interp.gc_arena_restore(mark);
        result.root(interp);
        result
    });

    debug_assert_eq!(interp.jmp(), outer);
    if outcome.is_err() {
        interp.gc_arena_restore(mark);
    }
    resume_parked_panic(interp);

    match outcome {
        Ok(result) => Ok(result),
        Err(Unwound::Landed) => {
            let exc = interp.take_exc();
            if let Some(exc) = exc {
                interp.gc_protect_forced(Value::Obj(exc));
            }
            tracing::trace!("jump landed at boundary");
            Err(exc)
        }
        Err(Unwound::Foreign(payload)) => panic::resume_unwind(payload),
    }
}

/// [`catch_jump`] with the exception captured for the caller
pub(crate) fn protect<R: Root>(
    interp: &mut Interp,
    op: impl FnOnce(&mut Interp) -> R,
) -> Result<R, Exception> {
    catch_jump(interp, op).map_err(|exc| Exception::capture(interp, exc))
}

/// Resume a host panic parked by the callback trampoline
fn resume_parked_panic(interp: &mut Interp) {
    let parked = interp
        .ud_mut::<BridgeUserData>()
        .and_then(|ud| ud.panic_info.take());

    if let Some(payload) = parked {
        interp.clear_exc();
        tracing::debug!("resuming host panic at the runtime boundary");
        panic::resume_unwind(payload);
    }
}
