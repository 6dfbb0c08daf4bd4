//! Source evaluation
//!
//! The runtime does not raise out of `load_nstring`: a script exception
//! (or a syntax error) ends evaluation, is left in the interpreter's ambient
//! exception slot, and `nil` comes back. The slot is cleared before every
//! evaluation and read-and-cleared after it, whatever happened.

use crate::boundary::catch_jump;
use crate::object::{Exception, LoadOutcome};
use ember_core::{Interp, Value};

pub(crate) fn load(interp: &mut Interp, source: &[u8]) -> LoadOutcome {
    interp.clear_exc();

    match catch_jump(interp, |interp| interp.load_nstring(source)) {
        Ok(value) => {
            let exception = interp.take_exc().map(|exc| {
                interp.gc_protect_forced(Value::Obj(exc));
                Exception::capture(interp, Some(exc))
            });
            LoadOutcome { value, exception }
        }
        Err(exc) => LoadOutcome {
            value: Value::Nil,
            exception: Some(Exception::capture(interp, exc)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::InterpOptions;

    #[test]
    fn test_clean_load() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        let outcome = load(&mut interp, b"1 + 2");
        assert!(outcome.is_ok());
        assert_eq!(outcome.value, Value::Int(3));
        assert!(interp.exc().is_none());
    }

    #[test]
    fn test_raising_load_reports_exception() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        let outcome = load(&mut interp, b"x = 1\nraise TypeError, 'bad'\nx");
        assert_eq!(outcome.value, Value::Nil);
        let exc = outcome.exception.unwrap();
        assert_eq!(exc.to_string(), "bad (TypeError)");
        assert!(interp.exc().is_none());
    }

    #[test]
    fn test_stale_exception_is_cleared_first() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        let runtime_error = interp.classes().runtime_error;
        let stale = interp.exc_new(runtime_error, "stale");
        interp.set_exc(Some(stale));

        let outcome = load(&mut interp, b"nil");
        assert!(outcome.is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        let outcome = load(&mut interp, b"def (");
        let exc = outcome.exception.unwrap();
        assert_eq!(exc.class_name(), "SyntaxError");
        assert!(!exc.message().is_empty());
    }
}
