//! Diagnostic strings that cannot fail
//!
//! Three attempts, in order:
//! 1. the value's own `inspect` method
//! 2. the runtime's default `#<ClassName:0x..>` rendering
//! 3. the fixed placeholder `#<???>`
//!
//! An attempt fails if it raises or does not produce a non-empty string.

use crate::boundary::catch_jump;
use crate::object::INSPECT_PLACEHOLDER;
use ember_core::{Interp, Value};

fn text_of(interp: &Interp, value: Value) -> Option<String> {
    interp
        .string_value(value)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Diagnostic string for `value`; never empty, never raises
pub(crate) fn inspect(interp: &mut Interp, value: Value) -> String {
    let mark = interp.gc_arena_save();

    let primary = catch_jump(interp, |interp| {
        let s = interp.inspect(value);
        text_of(interp, s)
    });

    let text = match primary {
        Ok(Some(text)) => text,
        _ => {
            tracing::warn!("inspect failed, falling back to default rendering");
            let secondary = catch_jump(interp, |interp| {
                let s = interp.any_to_s(value);
                text_of(interp, s)
            });
            match secondary {
                Ok(Some(text)) => text,
                _ => {
                    tracing::warn!("default rendering failed, using placeholder");
                    INSPECT_PLACEHOLDER.to_string()
                }
            }
        }
    };

    interp.gc_arena_restore(mark);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::InterpOptions;

    #[test]
    fn test_builtin_inspect() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        assert_eq!(inspect(&mut interp, Value::Nil), "nil");
        assert_eq!(inspect(&mut interp, Value::Int(42)), "42");
        assert_eq!(interp.heap_stats().arena_depth, 0);
    }

    #[test]
    fn test_raising_inspect_falls_back() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        interp.load_nstring(b"class Loud\n  def inspect\n    raise 'no'\n  end\nend");
        assert!(interp.take_exc().is_none());

        let obj = catch_jump(&mut interp, |interp| {
            let class = interp.class_get("Loud");
            interp.obj_new(class, &[])
        })
        .unwrap();

        let text = inspect(&mut interp, Value::Obj(obj));
        assert!(text.starts_with("#<Loud:0x"), "{}", text);
    }

    #[test]
    fn test_empty_inspect_counts_as_failure() {
        let mut interp = Interp::open(InterpOptions::default()).unwrap();
        interp.load_nstring(b"class Quiet\n  def inspect\n    ''\n  end\nend");

        let obj = catch_jump(&mut interp, |interp| {
            let class = interp.class_get("Quiet");
            interp.obj_new(class, &[])
        })
        .unwrap();

        assert!(inspect(&mut interp, Value::Obj(obj)).starts_with("#<Quiet:0x"));
    }
}
