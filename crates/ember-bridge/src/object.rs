//! Handles to runtime objects returned across the boundary
//!
//! Handles are plain copies of generation-checked references. A handle that
//! outlives the arena bracket it was returned in may point at a reclaimed
//! object; every use then fails cleanly instead of aliasing a newer object.

use crate::boundary::Root;
use ember_core::{ArenaIndex, Interp, ObjRef, Value};
use std::fmt;

/// Arena checkpoint returned by `arena_save`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaMark(pub(crate) ArenaIndex);

impl ArenaMark {
    /// Raw arena depth
    pub fn depth(self) -> usize {
        self.0.as_usize()
    }

    /// Mark for a raw depth previously returned by [`ArenaMark::depth`]
    pub fn from_depth(depth: usize) -> Self {
        Self(ArenaIndex::from_usize(depth))
    }
}

/// A class object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassRef(pub(crate) ObjRef);

impl ClassRef {
    /// The class as a value
    pub fn as_value(self) -> Value {
        Value::Obj(self.0)
    }

    /// Underlying reference
    pub fn obj_ref(self) -> ObjRef {
        self.0
    }
}

/// A callable (native proc) object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcRef(pub(crate) ObjRef);

impl ProcRef {
    /// The proc as a value
    pub fn as_value(self) -> Value {
        Value::Obj(self.0)
    }

    /// Underlying reference
    pub fn obj_ref(self) -> ObjRef {
        self.0
    }
}

impl Root for ClassRef {
    fn root(&self, interp: &mut Interp) {
        interp.gc_protect(self.as_value());
    }
}

impl Root for ProcRef {
    fn root(&self, interp: &mut Interp) {
        interp.gc_protect(self.as_value());
    }
}

/// Text used when no diagnostic string can be produced
pub const INSPECT_PLACEHOLDER: &str = "#<???>";

/// A runtime exception captured at the boundary
///
/// Capturing reads the class name and `@message` only; no script code runs.
/// The object itself stays registered in the arena of the scope it was
/// captured in, so the caller can still hand it to
/// [`crate::Runtime::inspect`] or re-raise it from a callback.
#[derive(Clone, PartialEq, Eq)]
pub struct Exception {
    obj: Option<ObjRef>,
    class_name: String,
    message: String,
}

impl Exception {
    /// Capture `exc` (already rooted by the caller)
    pub(crate) fn capture(interp: &Interp, exc: Option<ObjRef>) -> Self {
        let Some(obj) = exc else {
            return Self {
                obj: None,
                class_name: String::new(),
                message: String::new(),
            };
        };

        Self {
            obj: Some(obj),
            class_name: interp.class_display_name(interp.class_of(Value::Obj(obj))),
            message: interp
                .exception_message(obj)
                .map(str::to_string)
                .unwrap_or_default(),
        }
    }

    /// The exception object, if one was raised
    pub fn value(&self) -> Option<Value> {
        self.obj.map(Value::Obj)
    }

    pub(crate) fn obj_ref(&self) -> Option<ObjRef> {
        self.obj
    }

    /// Class name of the exception object
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// `@message`, empty if none was set
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `message (ClassName)`, `ClassName` without a message, the placeholder
/// without an object
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.obj, self.message.is_empty()) {
            (None, _) => f.write_str(INSPECT_PLACEHOLDER),
            (Some(_), true) => f.write_str(&self.class_name),
            (Some(_), false) => write!(f, "{} ({})", self.message, self.class_name),
        }
    }
}

impl fmt::Debug for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for Exception {}

/// Result of evaluating source
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// Value of the last statement; `nil` if evaluation raised
    pub value: Value,

    /// Exception that ended evaluation, if any
    pub exception: Option<Exception>,
}

impl LoadOutcome {
    /// Whether evaluation finished without raising
    pub fn is_ok(&self) -> bool {
        self.exception.is_none()
    }

    /// Value, or the exception that ended evaluation
    pub fn into_result(self) -> Result<Value, Exception> {
        match self.exception {
            Some(exc) => Err(exc),
            None => Ok(self.value),
        }
    }
}
