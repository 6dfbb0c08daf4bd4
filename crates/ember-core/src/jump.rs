//! Non-local jumps
//!
//! The runtime signals errors the way an embedded C interpreter does with
//! `setjmp`/`longjmp`: raising stores the exception in the interpreter's
//! ambient slot and transfers control straight to the innermost installed
//! jump context, skipping every frame in between. Here the transfer is an
//! unwind carrying a [`JumpSignal`] addressed to a specific [`JmpBuf`].
//!
//! Jump contexts nest strictly. Whoever installs one must record the previous
//! context and put it back on every exit path:
//!
//! ```text
//! let prev = interp.jmp();
//! let buf = interp.new_jmpbuf();
//! interp.set_jmp(Some(buf));
//! let outcome = jump::catch(interp, buf, |interp| op(interp));
//! interp.set_jmp(prev);
//! ```
//!
//! [`protect`] packages exactly that sequence.

use crate::interp::Interp;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Identity of an installed jump context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JmpBuf(u64);

impl JmpBuf {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Numeric id (diagnostics only)
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Unwind payload of a runtime jump
#[derive(Debug)]
pub struct JumpSignal {
    target: JmpBuf,
}

impl JumpSignal {
    pub(crate) fn new(target: JmpBuf) -> Self {
        Self { target }
    }

    /// Jump context this signal is addressed to
    pub fn target(&self) -> JmpBuf {
        self.target
    }
}

/// How a caught scope ended abnormally
pub enum Unwound {
    /// A runtime jump addressed to this scope landed here; the exception is
    /// in the interpreter's ambient slot
    Landed,
    /// Something else unwound through the scope: a jump addressed to another
    /// context, or a host panic. The caller must restore its state and resume
    /// it with [`std::panic::resume_unwind`].
    Foreign(Box<dyn Any + Send>),
}

impl std::fmt::Debug for Unwound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unwound::Landed => write!(f, "Landed"),
            Unwound::Foreign(_) => write!(f, "Foreign(..)"),
        }
    }
}

/// Run `op` as the landing site for jumps addressed to `buf`
///
/// Does not touch the installed jump context; see [`protect`]. Frames pushed
/// by `op` are discarded on every abnormal exit.
pub fn catch<R>(
    interp: &mut Interp,
    buf: JmpBuf,
    op: impl FnOnce(&mut Interp) -> R,
) -> Result<R, Unwound> {
    let depth = interp.frame_depth();

    let result = panic::catch_unwind(AssertUnwindSafe(|| op(&mut *interp)));

    match result {
        Ok(value) => Ok(value),
        Err(payload) => {
            interp.truncate_frames(depth);
            match payload.downcast::<JumpSignal>() {
                Ok(signal) if signal.target == buf => Err(Unwound::Landed),
                Ok(signal) => Err(Unwound::Foreign(signal)),
                Err(other) => Err(Unwound::Foreign(other)),
            }
        }
    }
}

/// Install a fresh jump context around `op` and restore the previous one afterwards
pub fn protect<R>(interp: &mut Interp, op: impl FnOnce(&mut Interp) -> R) -> Result<R, Unwound> {
    let prev = interp.jmp();
    let buf = interp.new_jmpbuf();
    interp.set_jmp(Some(buf));

    let outcome = catch(interp, buf, op);

    interp.set_jmp(prev);
    outcome
}

/// Unwind to `target`
pub(crate) fn throw_to(target: JmpBuf) -> ! {
    panic::resume_unwind(Box::new(JumpSignal::new(target)))
}
