//! C FFI bindings for the Ember runtime boundary
//!
//! This module provides a C-compatible API for embedding the Ember runtime in
//! other languages. The API follows these principles:
//! - ABI-stable (uses only C-compatible types)
//! - No runtime jump or Rust panic ever crosses into C: every entry point
//!   catches unwinds and reports them as `EMBER_PANICKED`
//! - Runtime exceptions via `EmberException*` out-parameters
//! - Opaque pointers for runtimes, exceptions and errors
//! - Manual memory management
//!
//! A runtime handle is single-threaded: callers must serialize every call on
//! one handle.

use ember_bridge::{CallbackError, Context, Exception, ObjRef, Runtime, Value};
use std::ffi::{c_void, CStr, CString};
use std::fmt::Display;
use std::os::raw::{c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

// ============================================================================
// Status Codes and Values
// ============================================================================

/// The call succeeded
pub const EMBER_OK: c_int = 0;

/// The runtime raised; see the exception out-parameter
pub const EMBER_RAISED: c_int = 1;

/// A null pointer or malformed argument was rejected
pub const EMBER_INVALID_ARGUMENT: c_int = -1;

/// A Rust panic was stopped at the C boundary
pub const EMBER_PANICKED: c_int = -2;

/// `nil`
pub const EMBER_VALUE_NIL: u32 = 0;

/// `true`/`false`; `bits` is 1 or 0
pub const EMBER_VALUE_BOOL: u32 = 1;

/// Integer; `bits` holds the two's complement value
pub const EMBER_VALUE_INT: u32 = 2;

/// Heap object reference
pub const EMBER_VALUE_OBJECT: u32 = 3;

/// A runtime value passed by copy
///
/// Object values are references into the runtime heap. They stay valid while
/// the object is rooted, which for results means until the arena is
/// restored below the point where they were returned.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmberValue {
    pub kind: u32,
    pub bits: u64,
}

impl EmberValue {
    const NIL: EmberValue = EmberValue {
        kind: EMBER_VALUE_NIL,
        bits: 0,
    };

    fn from_value(value: Value) -> Self {
        match value {
            Value::Nil => Self::NIL,
            Value::Bool(b) => EmberValue {
                kind: EMBER_VALUE_BOOL,
                bits: u64::from(b),
            },
            Value::Int(n) => EmberValue {
                kind: EMBER_VALUE_INT,
                bits: n as u64,
            },
            Value::Obj(r) => EmberValue {
                kind: EMBER_VALUE_OBJECT,
                bits: r.to_bits(),
            },
        }
    }

    fn to_value(self) -> Option<Value> {
        match (self.kind, self.bits) {
            (EMBER_VALUE_NIL, _) => Some(Value::Nil),
            (EMBER_VALUE_BOOL, 0) => Some(Value::Bool(false)),
            (EMBER_VALUE_BOOL, 1) => Some(Value::Bool(true)),
            (EMBER_VALUE_INT, bits) => Some(Value::Int(bits as i64)),
            (EMBER_VALUE_OBJECT, bits) => Some(Value::Obj(ObjRef::from_bits(bits))),
            _ => None,
        }
    }
}

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to an Ember runtime
#[repr(C)]
pub struct EmberRuntime {
    _private: [u8; 0],
}

/// Opaque handle to a captured runtime exception
#[repr(C)]
pub struct EmberException {
    _private: [u8; 0],
}

/// Error information for failures outside the runtime
#[repr(C)]
pub struct EmberError {
    message: *mut c_char,
}

/// Host function called when the method it backs is invoked
///
/// Writes the return value to `result` and returns `EMBER_OK`. Returning
/// `EMBER_RAISED` raises the exception object written to `result` as is
/// (e.g. one obtained from `ember_exception_value`); any other status raises
/// a `RuntimeError` in the calling script.
pub type EmberNativeFn = unsafe extern "C" fn(
    data: *mut c_void,
    recv: EmberValue,
    argc: usize,
    argv: *const EmberValue,
    result: *mut EmberValue,
) -> c_int;

/// Releases the `data` pointer given to `ember_make_native_callback`
pub type EmberFreeFn = unsafe extern "C" fn(data: *mut c_void);

// Internal representation of a runtime (not exposed to C)
struct RuntimeHandle {
    runtime: Runtime,
}

// Internal representation of an exception (not exposed to C)
struct ExceptionHandle {
    value: EmberValue,
    summary: CString,
}

// C callback plus its user data; the data is released when the runtime
// finalizes the callback
struct ForeignCallback {
    func: EmberNativeFn,
    data: *mut c_void,
    free: Option<EmberFreeFn>,
}

impl ForeignCallback {
    fn call(
        &self,
        ctx: &mut Context<'_>,
        recv: Value,
        args: &[Value],
    ) -> Result<Value, CallbackError> {
        let argv: Vec<EmberValue> = args.iter().copied().map(EmberValue::from_value).collect();
        let mut result = EmberValue::NIL;

        let status = unsafe {
            (self.func)(
                self.data,
                EmberValue::from_value(recv),
                argv.len(),
                argv.as_ptr(),
                &mut result,
            )
        };
        let value = result.to_value().filter(|v| ctx.is_live(*v));
        match (status, value) {
            (EMBER_OK, Some(value)) => Ok(value),
            (EMBER_OK, None) => Err("native callback returned an invalid value".into()),
            (EMBER_RAISED, Some(exc)) => Err(CallbackError::Raise(exc)),
            (EMBER_RAISED, None) => Err("native callback raised an invalid value".into()),
            (status, _) => Err(CallbackError::Message(format!(
                "native callback failed with status {}",
                status
            ))),
        }
    }
}

impl Drop for ForeignCallback {
    fn drop(&mut self) {
        if let Some(free) = self.free {
            unsafe { free(self.data) }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert Rust string to C string; interior NULs are escaped
fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "\\0")).unwrap_or_default()
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut EmberError, error: &dyn Display) {
    if !error_out.is_null() {
        let message = c_string(&error.to_string()).into_raw();
        *error_out = Box::into_raw(Box::new(EmberError { message }));
    }
}

/// Set exception out-parameter
unsafe fn set_exception(exception_out: *mut *mut EmberException, exception: &Exception) {
    if !exception_out.is_null() {
        let handle = Box::new(ExceptionHandle {
            value: exception
                .value()
                .map_or(EmberValue::NIL, EmberValue::from_value),
            summary: c_string(&exception.to_string()),
        });
        *exception_out = Box::into_raw(handle) as *mut EmberException;
    }
}

unsafe fn runtime_mut<'a>(rt: *mut EmberRuntime) -> Option<&'a mut Runtime> {
    (rt as *mut RuntimeHandle).as_mut().map(|handle| &mut handle.runtime)
}

unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

fn live_value(runtime: &Runtime, value: EmberValue) -> Option<Value> {
    value.to_value().filter(|v| runtime.is_live(*v))
}

/// Run an entry point body, turning a Rust panic into `fallback`
fn guard<T>(function: &'static str, fallback: T, body: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("non-string panic payload");
            tracing::error!(function, panic = message, "panic stopped at the C boundary");
            fallback
        }
    }
}

fn invalid(function: &'static str) -> c_int {
    tracing::warn!(function, "invalid argument rejected");
    EMBER_INVALID_ARGUMENT
}

unsafe fn finish<T>(
    result: Result<T, Exception>,
    on_ok: impl FnOnce(T),
    exception: *mut *mut EmberException,
) -> c_int {
    match result {
        Ok(value) => {
            on_ok(value);
            EMBER_OK
        }
        Err(exc) => {
            set_exception(exception, &exc);
            EMBER_RAISED
        }
    }
}

unsafe fn write_value(out: *mut EmberValue, value: Value) {
    if !out.is_null() {
        *out = EmberValue::from_value(value);
    }
}

// ============================================================================
// Runtime Lifecycle Functions
// ============================================================================

/// Create a new Ember runtime
///
/// # Arguments
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to EmberRuntime on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// The returned runtime must be freed with `ember_close()`
///
/// # Example (C)
/// ```c
/// EmberError* error = NULL;
/// EmberRuntime* rt = ember_open(&error);
/// if (rt == NULL) {
///     fprintf(stderr, "Failed to open runtime: %s\n", ember_error_message(error));
///     ember_error_free(error);
///     return 1;
/// }
/// // Use runtime...
/// ember_close(rt);
/// ```
#[no_mangle]
pub unsafe extern "C" fn ember_open(error: *mut *mut EmberError) -> *mut EmberRuntime {
    guard("ember_open", ptr::null_mut(), || match Runtime::open() {
        Ok(runtime) => Box::into_raw(Box::new(RuntimeHandle { runtime })) as *mut EmberRuntime,
        Err(e) => {
            set_error(error, &e);
            ptr::null_mut()
        }
    })
}

/// Close a runtime, finalizing every object and native callback
///
/// # Safety
/// - `rt` must come from `ember_open()` (NULL is ignored)
/// - The runtime must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn ember_close(rt: *mut EmberRuntime) {
    guard("ember_close", (), || {
        if rt.is_null() {
            return;
        }

        let handle = Box::from_raw(rt as *mut RuntimeHandle);
        handle.runtime.close();
    })
}

// ============================================================================
// GC Arena
// ============================================================================

/// Current arena checkpoint (0 for a NULL runtime)
///
/// # Safety
/// `rt` must be NULL or a live runtime
#[no_mangle]
pub unsafe extern "C" fn ember_arena_save(rt: *mut EmberRuntime) -> usize {
    guard("ember_arena_save", 0, || match runtime_mut(rt) {
        Some(runtime) => runtime.arena_save().depth(),
        None => 0,
    })
}

/// Release every value returned since `mark`
///
/// # Safety
/// `rt` must be NULL or a live runtime
#[no_mangle]
pub unsafe extern "C" fn ember_arena_restore(rt: *mut EmberRuntime, mark: usize) {
    guard("ember_arena_restore", (), || {
        if let Some(runtime) = runtime_mut(rt) {
            runtime.arena_restore(ember_bridge::ArenaMark::from_depth(mark));
        }
    })
}

// ============================================================================
// Classes and Methods
// ============================================================================

/// The `Object` class (`nil` for a NULL runtime)
///
/// # Safety
/// `rt` must be NULL or a live runtime
#[no_mangle]
pub unsafe extern "C" fn ember_object_class(rt: *mut EmberRuntime) -> EmberValue {
    guard("ember_object_class", EmberValue::NIL, || match runtime_mut(rt) {
        Some(runtime) => EmberValue::from_value(runtime.object_class().as_value()),
        None => EmberValue::NIL,
    })
}

/// Define a class, or fetch the existing one with the same superclass
///
/// # Returns
/// * `EMBER_OK` with the class in `out`
/// * `EMBER_RAISED` with the exception in `exception` (e.g. superclass mismatch)
/// * `EMBER_INVALID_ARGUMENT` for NULL pointers, bad UTF-8 or a non-class superclass
///
/// # Safety
/// - `rt` must be a live runtime
/// - `name` must be a null-terminated string
#[no_mangle]
pub unsafe extern "C" fn ember_define_class(
    rt: *mut EmberRuntime,
    name: *const c_char,
    superclass: EmberValue,
    out: *mut EmberValue,
    exception: *mut *mut EmberException,
) -> c_int {
    guard("ember_define_class", EMBER_PANICKED, || {
        let (Some(runtime), Some(name)) = (runtime_mut(rt), str_arg(name)) else {
            return invalid("ember_define_class");
        };
        let Some(superclass) = live_value(runtime, superclass).and_then(|v| runtime.class_ref(v))
        else {
            return invalid("ember_define_class");
        };

        let result = runtime.define_class(name, superclass);
        finish(result, |class| write_value(out, class.as_value()), exception)
    })
}

/// Diagnostic string for `value`; never NULL for a live runtime
///
/// # Safety
/// - `rt` must be NULL or a live runtime
/// - The returned string must be freed with `ember_string_free()`
#[no_mangle]
pub unsafe extern "C" fn ember_inspect(rt: *mut EmberRuntime, value: EmberValue) -> *mut c_char {
    guard("ember_inspect", ptr::null_mut(), || {
        let Some(runtime) = runtime_mut(rt) else {
            return ptr::null_mut();
        };
        let text = match live_value(runtime, value) {
            Some(value) => runtime.inspect(value),
            None => ember_bridge::INSPECT_PLACEHOLDER.to_string(),
        };
        c_string(&text).into_raw()
    })
}

/// Free a string returned by `ember_inspect()`
///
/// # Safety
/// `s` must be NULL or a string from `ember_inspect()`
#[no_mangle]
pub unsafe extern "C" fn ember_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Wrap a C function as a callable runtime object
///
/// On success or on `EMBER_RAISED` the runtime owns `data` and calls `free`
/// (if given) once the callable is reclaimed or the runtime is closed. On
/// `EMBER_INVALID_ARGUMENT` ownership stays with the caller.
///
/// # Safety
/// - `rt` must be a live runtime
/// - `func` must be safe to call with `data` until `free` has run
#[no_mangle]
pub unsafe extern "C" fn ember_make_native_callback(
    rt: *mut EmberRuntime,
    func: Option<EmberNativeFn>,
    data: *mut c_void,
    free: Option<EmberFreeFn>,
    out: *mut EmberValue,
    exception: *mut *mut EmberException,
) -> c_int {
    guard("ember_make_native_callback", EMBER_PANICKED, || {
        let (Some(runtime), Some(func)) = (runtime_mut(rt), func) else {
            return invalid("ember_make_native_callback");
        };

        let callback = ForeignCallback { func, data, free };
        let result =
            runtime.make_native_callback(move |ctx, recv, args| callback.call(ctx, recv, args));
        finish(result, |proc_| write_value(out, proc_.as_value()), exception)
    })
}

/// Install a callable as method `name` of `class`
///
/// # Safety
/// - `rt` must be a live runtime
/// - `name` must be a null-terminated string
#[no_mangle]
pub unsafe extern "C" fn ember_define_method(
    rt: *mut EmberRuntime,
    class: EmberValue,
    name: *const c_char,
    callable: EmberValue,
    exception: *mut *mut EmberException,
) -> c_int {
    guard("ember_define_method", EMBER_PANICKED, || {
        let (Some(runtime), Some(name)) = (runtime_mut(rt), str_arg(name)) else {
            return invalid("ember_define_method");
        };
        let class = live_value(runtime, class).and_then(|v| runtime.class_ref(v));
        let callable = live_value(runtime, callable).and_then(|v| runtime.proc_ref(v));
        let (Some(class), Some(callable)) = (class, callable) else {
            return invalid("ember_define_method");
        };

        let result = runtime.define_method_proc(class, name, callable);
        finish(result, |()| {}, exception)
    })
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate `length` bytes of source code
///
/// # Returns
/// * `EMBER_OK` with the value of the last statement in `out`
/// * `EMBER_RAISED` with `nil` in `out` and the exception in `exception`
/// * `EMBER_INVALID_ARGUMENT` for NULL pointers
///
/// # Safety
/// - `rt` must be a live runtime
/// - `source` must be valid for `length` bytes
#[no_mangle]
pub unsafe extern "C" fn ember_load(
    rt: *mut EmberRuntime,
    source: *const u8,
    length: usize,
    out: *mut EmberValue,
    exception: *mut *mut EmberException,
) -> c_int {
    guard("ember_load", EMBER_PANICKED, || {
        let Some(runtime) = runtime_mut(rt) else {
            return invalid("ember_load");
        };
        if source.is_null() {
            return invalid("ember_load");
        }

        let source = std::slice::from_raw_parts(source, length);
        let outcome = runtime.load(source);
        write_value(out, outcome.value);
        match outcome.exception {
            Some(exc) => {
                set_exception(exception, &exc);
                EMBER_RAISED
            }
            None => EMBER_OK,
        }
    })
}

// ============================================================================
// Exceptions and Errors
// ============================================================================

/// `message (ClassName)` of a captured exception
///
/// Built from the class name and message alone; no script code runs. Pass
/// `ember_exception_value()` to `ember_inspect()` for the object's own
/// `inspect`.
///
/// # Safety
/// - `exception` must be NULL or come from an `EmberException*` out-parameter
/// - The string is owned by the exception; do not free it
#[no_mangle]
pub unsafe extern "C" fn ember_exception_inspect(
    exception: *const EmberException,
) -> *const c_char {
    match (exception as *const ExceptionHandle).as_ref() {
        Some(handle) => handle.summary.as_ptr(),
        None => ptr::null(),
    }
}

/// The exception object itself (`nil` for NULL)
///
/// The object stays rooted until the arena is restored below the point where
/// the exception was captured, independently of `ember_exception_free()`.
/// A native callback can raise it again by writing it to `result` and
/// returning `EMBER_RAISED`.
///
/// # Safety
/// `exception` must be NULL or come from an `EmberException*` out-parameter
#[no_mangle]
pub unsafe extern "C" fn ember_exception_value(exception: *const EmberException) -> EmberValue {
    match (exception as *const ExceptionHandle).as_ref() {
        Some(handle) => handle.value,
        None => EmberValue::NIL,
    }
}

/// Free a captured exception
///
/// # Safety
/// `exception` must be NULL or come from an `EmberException*` out-parameter
#[no_mangle]
pub unsafe extern "C" fn ember_exception_free(exception: *mut EmberException) {
    if !exception.is_null() {
        drop(Box::from_raw(exception as *mut ExceptionHandle));
    }
}

/// Error message
///
/// # Safety
/// - `error` must be NULL or come from an `EmberError*` out-parameter
/// - The string is owned by the error; do not free it
#[no_mangle]
pub unsafe extern "C" fn ember_error_message(error: *const EmberError) -> *const c_char {
    match error.as_ref() {
        Some(error) => error.message,
        None => ptr::null(),
    }
}

/// Free an error
///
/// # Safety
/// `error` must be NULL or come from an `EmberError*` out-parameter
#[no_mangle]
pub unsafe extern "C" fn ember_error_free(error: *mut EmberError) {
    if error.is_null() {
        return;
    }

    let error = Box::from_raw(error);
    if !error.message.is_null() {
        drop(CString::from_raw(error.message));
    }
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Ember version string
///
/// # Safety
/// - The returned string is a static string and must not be freed
#[no_mangle]
pub unsafe extern "C" fn ember_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static OFFSETS_FREED: AtomicUsize = AtomicUsize::new(0);

    fn cstr(bytes: &'static [u8]) -> *const c_char {
        bytes.as_ptr() as *const c_char
    }

    unsafe fn load(
        rt: *mut EmberRuntime,
        source: &str,
    ) -> (c_int, EmberValue, *mut EmberException) {
        let mut out = EmberValue::NIL;
        let mut exception: *mut EmberException = ptr::null_mut();
        let status = ember_load(rt, source.as_ptr(), source.len(), &mut out, &mut exception);
        (status, out, exception)
    }

    unsafe fn exception_text(exception: *mut EmberException) -> String {
        let text = CStr::from_ptr(ember_exception_inspect(exception))
            .to_str()
            .unwrap()
            .to_string();
        ember_exception_free(exception);
        text
    }

    unsafe extern "C" fn add_offset(
        data: *mut c_void,
        _recv: EmberValue,
        argc: usize,
        argv: *const EmberValue,
        result: *mut EmberValue,
    ) -> c_int {
        if argc != 1 || (*argv).kind != EMBER_VALUE_INT {
            return 2;
        }
        let offset = *(data as *const i64);
        *result = EmberValue {
            kind: EMBER_VALUE_INT,
            bits: ((*argv).bits as i64 + offset) as u64,
        };
        EMBER_OK
    }

    unsafe extern "C" fn free_offset(data: *mut c_void) {
        drop(Box::from_raw(data as *mut i64));
        OFFSETS_FREED.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn raise_stored(
        data: *mut c_void,
        _recv: EmberValue,
        _argc: usize,
        _argv: *const EmberValue,
        result: *mut EmberValue,
    ) -> c_int {
        *result = *(data as *const EmberValue);
        EMBER_RAISED
    }

    unsafe extern "C" fn free_stored(data: *mut c_void) {
        drop(Box::from_raw(data as *mut EmberValue));
    }

    unsafe extern "C" fn always_fails(
        _data: *mut c_void,
        _recv: EmberValue,
        _argc: usize,
        _argv: *const EmberValue,
        _result: *mut EmberValue,
    ) -> c_int {
        7
    }

    #[test]
    fn test_runtime_lifecycle() {
        unsafe {
            let mut error: *mut EmberError = ptr::null_mut();

            let rt = ember_open(&mut error as *mut *mut EmberError);
            assert!(!rt.is_null());
            assert!(error.is_null());

            ember_close(rt);
            ember_close(ptr::null_mut());
        }
    }

    #[test]
    fn test_load() {
        unsafe {
            let rt = ember_open(ptr::null_mut());

            let (status, value, exception) = load(rt, "1 + 2");
            assert_eq!(status, EMBER_OK);
            assert_eq!(value, EmberValue { kind: EMBER_VALUE_INT, bits: 3 });
            assert!(exception.is_null());

            let (status, value, exception) = load(rt, "raise 'boom'");
            assert_eq!(status, EMBER_RAISED);
            assert_eq!(value, EmberValue::NIL);
            assert_eq!(exception_text(exception), "boom (RuntimeError)");

            ember_close(rt);
        }
    }

    #[test]
    fn test_null_arguments_rejected() {
        unsafe {
            let rt = ember_open(ptr::null_mut());
            let mut out = EmberValue::NIL;
            let mut exception: *mut EmberException = ptr::null_mut();

            let status = ember_load(ptr::null_mut(), b"1".as_ptr(), 1, &mut out, &mut exception);
            assert_eq!(status, EMBER_INVALID_ARGUMENT);
            assert_eq!(
                ember_load(rt, ptr::null(), 0, &mut out, &mut exception),
                EMBER_INVALID_ARGUMENT
            );

            let object = ember_object_class(rt);
            let status = ember_define_class(rt, ptr::null(), object, &mut out, &mut exception);
            assert_eq!(status, EMBER_INVALID_ARGUMENT);

            let status = ember_make_native_callback(
                rt,
                None,
                ptr::null_mut(),
                None,
                &mut out,
                &mut exception,
            );
            assert_eq!(status, EMBER_INVALID_ARGUMENT);
            assert!(exception.is_null());

            assert!(ember_inspect(ptr::null_mut(), object).is_null());
            assert_eq!(ember_object_class(ptr::null_mut()), EmberValue::NIL);
            assert!(ember_exception_inspect(ptr::null()).is_null());
            assert!(ember_error_message(ptr::null()).is_null());

            ember_close(rt);
        }
    }

    #[test]
    fn test_define_class() {
        unsafe {
            let rt = ember_open(ptr::null_mut());
            let object = ember_object_class(rt);
            let mut class = EmberValue::NIL;
            let mut exception: *mut EmberException = ptr::null_mut();

            let gadget = cstr(b"Gadget\0");
            let status = ember_define_class(rt, gadget, object, &mut class, &mut exception);
            assert_eq!(status, EMBER_OK);
            assert_eq!(class.kind, EMBER_VALUE_OBJECT);

            let status = ember_define_class(rt, gadget, class, &mut class, &mut exception);
            assert_eq!(status, EMBER_RAISED);
            assert_eq!(
                exception_text(exception),
                "superclass mismatch for Class Gadget (Object not Gadget) (TypeError)"
            );

            let not_a_class = EmberValue { kind: EMBER_VALUE_INT, bits: 5 };
            let other = cstr(b"Other\0");
            let status = ember_define_class(rt, other, not_a_class, &mut class, ptr::null_mut());
            assert_eq!(status, EMBER_INVALID_ARGUMENT);

            ember_close(rt);
        }
    }

    #[test]
    fn test_inspect() {
        unsafe {
            let rt = ember_open(ptr::null_mut());

            let text = ember_inspect(rt, EmberValue { kind: EMBER_VALUE_INT, bits: 42 });
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "42");
            ember_string_free(text);

            let bogus = EmberValue { kind: 99, bits: 0 };
            let text = ember_inspect(rt, bogus);
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "#<???>");
            ember_string_free(text);

            ember_close(rt);
        }
    }

    #[test]
    fn test_native_callback() {
        unsafe {
            let rt = ember_open(ptr::null_mut());
            let object = ember_object_class(rt);
            let mut callable = EmberValue::NIL;
            let mut exception: *mut EmberException = ptr::null_mut();

            let data = Box::into_raw(Box::new(100i64)) as *mut c_void;
            let status = ember_make_native_callback(
                rt,
                Some(add_offset),
                data,
                Some(free_offset),
                &mut callable,
                &mut exception,
            );
            assert_eq!(status, EMBER_OK);

            let name = cstr(b"add_offset\0");
            let status = ember_define_method(rt, object, name, callable, &mut exception);
            assert_eq!(status, EMBER_OK);

            let (status, value, _) = load(rt, "add_offset(23)");
            assert_eq!(status, EMBER_OK);
            assert_eq!(value, EmberValue { kind: EMBER_VALUE_INT, bits: 123 });

            let (status, _, exception) = load(rt, "add_offset('x')");
            assert_eq!(status, EMBER_RAISED);
            assert_eq!(
                exception_text(exception),
                "native callback failed with status 2 (RuntimeError)"
            );

            assert_eq!(OFFSETS_FREED.load(Ordering::SeqCst), 0);
            ember_close(rt);
            assert_eq!(OFFSETS_FREED.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_failing_callback_is_rescuable() {
        unsafe {
            let rt = ember_open(ptr::null_mut());
            let object = ember_object_class(rt);
            let mut callable = EmberValue::NIL;

            ember_make_native_callback(
                rt,
                Some(always_fails),
                ptr::null_mut(),
                None,
                &mut callable,
                ptr::null_mut(),
            );
            let name = cstr(b"fails\0");
            let status = ember_define_method(rt, object, name, callable, ptr::null_mut());
            assert_eq!(status, EMBER_OK);

            let mark = ember_arena_save(rt);
            let source = "begin\n  fails\nrescue => e\n  e.message.length\nend";
            let (status, value, _) = load(rt, source);
            assert_eq!(status, EMBER_OK);
            let expected = "native callback failed with status 7".len() as u64;
            assert_eq!(value, EmberValue { kind: EMBER_VALUE_INT, bits: expected });
            ember_arena_restore(rt, mark);
            assert_eq!(ember_arena_save(rt), mark);

            ember_close(rt);
        }
    }

    #[test]
    fn test_captured_exception_raised_again_from_callback() {
        unsafe {
            let rt = ember_open(ptr::null_mut());
            let object = ember_object_class(rt);

            let (status, _, first) = load(rt, "raise ArgumentError, 'original'");
            assert_eq!(status, EMBER_RAISED);
            let captured = ember_exception_value(first);
            assert_eq!(captured.kind, EMBER_VALUE_OBJECT);
            ember_exception_free(first);

            let text = ember_inspect(rt, captured);
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "original (ArgumentError)");
            ember_string_free(text);

            let mut callable = EmberValue::NIL;
            let data = Box::into_raw(Box::new(captured)) as *mut c_void;
            let status = ember_make_native_callback(
                rt,
                Some(raise_stored),
                data,
                Some(free_stored),
                &mut callable,
                ptr::null_mut(),
            );
            assert_eq!(status, EMBER_OK);
            let name = cstr(b"raise_stored\0");
            assert_eq!(ember_define_method(rt, object, name, callable, ptr::null_mut()), EMBER_OK);

            let (status, _, second) = load(rt, "raise_stored");
            assert_eq!(status, EMBER_RAISED);
            assert_eq!(ember_exception_value(second), captured);
            assert_eq!(exception_text(second), "original (ArgumentError)");

            let source = "begin\n  raise_stored\nrescue ArgumentError => e\n  e.message\nend";
            let (status, value, _) = load(rt, source);
            assert_eq!(status, EMBER_OK);
            let text = ember_inspect(rt, value);
            assert_eq!(CStr::from_ptr(text).to_str().unwrap(), "\"original\"");
            ember_string_free(text);

            assert_eq!(ember_exception_value(ptr::null()), EmberValue::NIL);
            ember_close(rt);
        }
    }

    #[test]
    fn test_panic_stops_at_boundary() {
        let status = guard("test", EMBER_PANICKED, || -> c_int { panic!("inside entry point") });
        assert_eq!(status, EMBER_PANICKED);
        assert_eq!(guard("test", EMBER_PANICKED, || EMBER_OK), EMBER_OK);
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = ember_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
