//! Object model
//!
//! Every heap allocation is a [`HeapObject`]. Classes are heap objects too, so
//! a class can be duplicated, referenced from instances and reclaimed like any
//! other object once nothing points at it.

use crate::interp::Interp;
use crate::parser::ast::MethodDef;
use crate::value::{ObjRef, Value};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Native method implementation: `(interp, self, args) -> result`
///
/// Raising is done through [`Interp::raise`] and friends, which never return.
pub type NativeFn = fn(&mut Interp, Value, &[Value]) -> Value;

/// Entry in a class method table
#[derive(Clone)]
pub enum Method {
    /// Built-in function with no heap presence
    Func(NativeFn),
    /// A proc object (script-defined or native with captured environment)
    Proc(ObjRef),
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Func(_) => write!(f, "Method::Func"),
            Method::Proc(r) => write!(f, "Method::Proc({:?})", r),
        }
    }
}

/// Plain object instance
#[derive(Debug)]
pub struct RObject {
    /// Class of this instance
    pub class: ObjRef,
    /// Instance variables, in definition order
    pub ivars: Vec<(String, Value)>,
}

impl RObject {
    /// Look up an instance variable
    pub fn ivar(&self, name: &str) -> Option<Value> {
        self.ivars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Set an instance variable
    pub fn set_ivar(&mut self, name: &str, value: Value) {
        match self.ivars.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.ivars.push((name.to_string(), value)),
        }
    }
}

/// Class object
#[derive(Debug, Clone)]
pub struct RClass {
    /// Constant name; `None` for anonymous classes
    pub name: Option<String>,
    /// Superclass; `None` for hierarchy roots
    pub superclass: Option<ObjRef>,
    /// Method table
    pub methods: FxHashMap<String, Method>,
}

/// Proc body
#[derive(Clone)]
pub enum ProcBody {
    /// Script method
    Script(Rc<MethodDef>),
    /// Native function; reads its captured environment via [`Interp::cfunc_env_get`]
    Native(NativeFn),
}

/// Callable object
pub struct RProc {
    /// What runs when the proc is called
    pub body: ProcBody,
    /// Captured environment
    pub env: Vec<Value>,
}

/// Type descriptor for foreign data objects
///
/// `free` is the finalizer. The collector hands it the payload when the data
/// object is reclaimed, or when the allocation of the data object itself fails.
pub struct DataType {
    /// Name used in diagnostics
    pub struct_name: &'static str,
    /// Finalizer
    pub free: fn(Box<dyn Any>),
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("struct_name", &self.struct_name)
            .finish()
    }
}

/// Foreign data object wrapping a host payload
pub struct RData {
    /// Class of the data object
    pub class: ObjRef,
    /// Type descriptor (compared by address)
    pub data_type: &'static DataType,
    /// Host payload; taken by the finalizer
    pub payload: Option<Box<dyn Any>>,
}

/// Heap object kinds
pub enum HeapObject {
    /// Plain instance (exceptions included)
    Object(RObject),
    /// String
    String {
        /// Class (always `String`)
        class: ObjRef,
        /// Contents
        value: String,
    },
    /// Class
    Class(RClass),
    /// Proc
    Proc(RProc),
    /// Foreign data
    Data(RData),
}

impl HeapObject {
    /// Push every reference held by this object into `out`
    pub(crate) fn trace(&self, out: &mut Vec<ObjRef>) {
        let mut push = |v: &Value| {
            if let Value::Obj(r) = v {
                out.push(*r);
            }
        };
        match self {
            HeapObject::Object(o) => {
                push(&Value::Obj(o.class));
                o.ivars.iter().for_each(|(_, v)| push(v));
            }
            HeapObject::String { class, .. } => push(&Value::Obj(*class)),
            HeapObject::Class(c) => {
                if let Some(sup) = c.superclass {
                    push(&Value::Obj(sup));
                }
                for m in c.methods.values() {
                    if let Method::Proc(p) = m {
                        push(&Value::Obj(*p));
                    }
                }
            }
            HeapObject::Proc(p) => p.env.iter().for_each(push),
            HeapObject::Data(d) => push(&Value::Obj(d.class)),
        }
    }

    /// Short kind name for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeapObject::Object(_) => "object",
            HeapObject::String { .. } => "string",
            HeapObject::Class(_) => "class",
            HeapObject::Proc(_) => "proc",
            HeapObject::Data(_) => "data",
        }
    }
}

impl fmt::Debug for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapObject::Object(o) => write!(f, "Object({:?})", o.class),
            HeapObject::String { value, .. } => write!(f, "String({:?})", value),
            HeapObject::Class(c) => write!(f, "Class({:?})", c.name),
            HeapObject::Proc(_) => write!(f, "Proc"),
            HeapObject::Data(d) => write!(f, "Data({})", d.data_type.struct_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ivars_keep_definition_order() {
        let mut obj = RObject {
            class: ObjRef::new(0, 0),
            ivars: Vec::new(),
        };
        obj.set_ivar("@b", Value::Int(1));
        obj.set_ivar("@a", Value::Int(2));
        obj.set_ivar("@b", Value::Int(3));

        assert_eq!(obj.ivar("@b"), Some(Value::Int(3)));
        assert_eq!(obj.ivars[0].0, "@b");
        assert_eq!(obj.ivar("@missing"), None);
    }

    #[test]
    fn test_trace_class() {
        let mut methods = FxHashMap::default();
        methods.insert("m".to_string(), Method::Proc(ObjRef::new(4, 0)));
        let class = HeapObject::Class(RClass {
            name: Some("Foo".into()),
            superclass: Some(ObjRef::new(1, 0)),
            methods,
        });

        let mut out = Vec::new();
        class.trace(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out.contains(&ObjRef::new(1, 0)));
        assert!(out.contains(&ObjRef::new(4, 0)));
    }
}
