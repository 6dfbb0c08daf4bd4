//! Class table: core classes, constant lookup, method resolution

use super::Interp;
use crate::error::{CoreError, CoreResult};
use crate::gc::GarbageCollector;
use crate::object::{HeapObject, Method, RClass, RObject};
use crate::value::{ObjRef, Value};
use rustc_hash::FxHashMap;

/// Classes created by [`Interp::open`]
#[derive(Debug, Clone)]
pub struct CoreClasses {
    pub basic_object: ObjRef,
    pub object: ObjRef,
    pub class: ObjRef,
    pub string: ObjRef,
    pub integer: ObjRef,
    pub nil: ObjRef,
    pub true_: ObjRef,
    pub false_: ObjRef,
    pub proc_: ObjRef,
    pub data: ObjRef,
    pub exception: ObjRef,
    pub standard_error: ObjRef,
    pub runtime_error: ObjRef,
    pub type_error: ObjRef,
    pub argument_error: ObjRef,
    pub name_error: ObjRef,
    pub no_method_error: ObjRef,
    pub range_error: ObjRef,
    pub system_stack_error: ObjRef,
    pub script_error: ObjRef,
    pub syntax_error: ObjRef,
    pub no_memory_error: ObjRef,
}

/// Allocate during bootstrap: no arena, permanent root, limit reported as an error
pub(super) fn boot_alloc(gc: &mut GarbageCollector, object: HeapObject) -> CoreResult<ObjRef> {
    if gc.at_limit() {
        return Err(CoreError::Bootstrap(format!(
            "object limit reached after {} core objects",
            gc.heap.live_objects()
        )));
    }
    let r = gc.allocate_raw(object);
    gc.roots.register(r);
    Ok(r)
}

impl CoreClasses {
    pub(super) fn boot(
        gc: &mut GarbageCollector,
        consts: &mut FxHashMap<String, ObjRef>,
    ) -> CoreResult<Self> {
        let mut class = |name: &str, superclass: Option<ObjRef>| -> CoreResult<ObjRef> {
            let r = boot_alloc(
                gc,
                HeapObject::Class(RClass {
                    name: Some(name.to_string()),
                    superclass,
                    methods: FxHashMap::default(),
                }),
            )?;
            consts.insert(name.to_string(), r);
            Ok(r)
        };

        let basic_object = class("BasicObject", None)?;
        let object = class("Object", Some(basic_object))?;
        let exception = class("Exception", Some(object))?;
        let standard_error = class("StandardError", Some(exception))?;
        let name_error = class("NameError", Some(standard_error))?;
        let script_error = class("ScriptError", Some(exception))?;

        Ok(Self {
            basic_object,
            object,
            class: class("Class", Some(object))?,
            string: class("String", Some(object))?,
            integer: class("Integer", Some(object))?,
            nil: class("NilClass", Some(object))?,
            true_: class("TrueClass", Some(object))?,
            false_: class("FalseClass", Some(object))?,
            proc_: class("Proc", Some(object))?,
            data: class("Data", Some(object))?,
            exception,
            standard_error,
            runtime_error: class("RuntimeError", Some(standard_error))?,
            type_error: class("TypeError", Some(standard_error))?,
            argument_error: class("ArgumentError", Some(standard_error))?,
            name_error,
            no_method_error: class("NoMethodError", Some(name_error))?,
            range_error: class("RangeError", Some(standard_error))?,
            system_stack_error: class("SystemStackError", Some(standard_error))?,
            script_error,
            syntax_error: class("SyntaxError", Some(script_error))?,
            no_memory_error: class("NoMemoryError", Some(exception))?,
        })
    }
}

fn is_constant_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Interp {
    /// Class of any value
    pub fn class_of(&self, value: Value) -> ObjRef {
        match value {
            Value::Nil => self.classes.nil,
            Value::Bool(true) => self.classes.true_,
            Value::Bool(false) => self.classes.false_,
            Value::Int(_) => self.classes.integer,
            Value::Obj(r) => match self.gc.heap.get(r) {
                Some(HeapObject::Object(o)) => o.class,
                Some(HeapObject::String { class, .. }) => *class,
                Some(HeapObject::Class(_)) => self.classes.class,
                Some(HeapObject::Proc(_)) => self.classes.proc_,
                Some(HeapObject::Data(d)) => d.class,
                None => self.classes.basic_object,
            },
        }
    }

    pub(crate) fn rclass(&self, class: ObjRef) -> Option<&RClass> {
        match self.gc.heap.get(class) {
            Some(HeapObject::Class(c)) => Some(c),
            _ => None,
        }
    }

    /// Whether `value` is a class object
    pub fn is_class(&self, value: Value) -> bool {
        value.as_obj().and_then(|r| self.rclass(r)).is_some()
    }

    /// Superclass of `class`
    pub fn superclass(&self, class: ObjRef) -> Option<ObjRef> {
        self.rclass(class).and_then(|c| c.superclass)
    }

    /// Constant name of `class`, `None` if anonymous
    pub fn class_name(&self, class: ObjRef) -> Option<&str> {
        self.rclass(class).and_then(|c| c.name.as_deref())
    }

    /// Name for diagnostics: the constant name or `#<Class:0x..>`
    pub fn class_display_name(&self, class: ObjRef) -> String {
        match self.class_name(class) {
            Some(name) => name.to_string(),
            None => format!("#<Class:0x{:x}>", class.index()),
        }
    }

    /// Resolve `name` along the superclass chain of `class`
    pub(crate) fn find_method(&self, class: ObjRef, name: &str) -> Option<Method> {
        let mut current = Some(class);
        while let Some(c) = current {
            let rclass = self.rclass(c)?;
            if let Some(m) = rclass.methods.get(name) {
                return Some(m.clone());
            }
            current = rclass.superclass;
        }
        None
    }

    /// Whether `class` is `ancestor` or inherits from it
    pub fn class_inherits(&self, class: ObjRef, ancestor: ObjRef) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.superclass(c);
        }
        false
    }

    /// `value.is_a?(class)`
    pub fn is_kind_of(&self, value: Value, class: ObjRef) -> bool {
        self.class_inherits(self.class_of(value), class)
    }

    /// Look up a constant; raises `NameError` if missing
    pub fn const_get(&mut self, name: &str) -> ObjRef {
        match self.consts.get(name) {
            Some(r) => *r,
            None => {
                let name_error = self.classes.name_error;
                self.raise(name_error, &format!("uninitialized constant {}", name))
            }
        }
    }

    /// Look up a class by constant name
    ///
    /// Raises `NameError` if the constant is missing and `TypeError` if it
    /// is not a class.
    pub fn class_get(&mut self, name: &str) -> ObjRef {
        let r = self.const_get(name);
        if self.rclass(r).is_none() {
            let type_error = self.classes.type_error;
            self.raise(type_error, &format!("{} is not a class", name));
        }
        r
    }

    /// Define a named class, or return the existing one
    ///
    /// With `superclass` given, an existing class must have exactly that
    /// superclass (`TypeError` otherwise). `None` means `Object` for a new
    /// class and "don't check" for an existing one.
    pub fn define_class(&mut self, name: &str, superclass: Option<ObjRef>) -> ObjRef {
        if !is_constant_name(name) {
            let name_error = self.classes.name_error;
            self.raise(name_error, &format!("wrong constant name {}", name));
        }
        if let Some(sup) = superclass {
            if self.rclass(sup).is_none() {
                let type_error = self.classes.type_error;
                self.raise(type_error, "superclass must be a Class");
            }
        }

        if let Some(&existing) = self.consts.get(name) {
            let Some(rclass) = self.rclass(existing) else {
                let type_error = self.classes.type_error;
                self.raise(type_error, &format!("{} is not a class", name))
            };
            if let Some(sup) = superclass {
                if rclass.superclass != Some(sup) {
                    let existing_super = rclass
                        .superclass
                        .map(|s| self.class_display_name(s))
                        .unwrap_or_else(|| "nil".to_string());
                    let message = format!(
                        "superclass mismatch for Class {} ({} not {})",
                        name,
                        existing_super,
                        self.class_display_name(sup)
                    );
                    let type_error = self.classes.type_error;
                    self.raise(type_error, &message);
                }
            }
            return existing;
        }

        let superclass = superclass.unwrap_or(self.classes.object);
        let class = self.alloc(HeapObject::Class(RClass {
            name: Some(name.to_string()),
            superclass: Some(superclass),
            methods: FxHashMap::default(),
        }));
        self.consts.insert(name.to_string(), class);
        tracing::trace!(name, "class defined");
        class
    }

    /// Shallow copy of an object
    ///
    /// A duplicated class is anonymous and shares the original's superclass
    /// and method table entries. Immediates and procs can't be duplicated.
    pub fn obj_dup(&mut self, value: Value) -> ObjRef {
        let copy = match value.as_obj().and_then(|r| self.gc.heap.get(r)) {
            Some(HeapObject::Class(c)) => HeapObject::Class(RClass {
                name: None,
                ..c.clone()
            }),
            Some(HeapObject::Object(o)) => HeapObject::Object(RObject {
                class: o.class,
                ivars: o.ivars.clone(),
            }),
            Some(HeapObject::String { class, value }) => HeapObject::String {
                class: *class,
                value: value.clone(),
            },
            _ => {
                let type_error = self.classes.type_error;
                let message = format!("can't dup {}", self.describe(value));
                self.raise(type_error, &message)
            }
        };
        self.alloc(copy)
    }

    /// Allocate an instance of `class` and run its `initialize`
    pub fn obj_new(&mut self, class: ObjRef, args: &[Value]) -> ObjRef {
        if self.rclass(class).is_none() {
            let type_error = self.classes.type_error;
            self.raise(type_error, "can't instantiate a non-class");
        }
        for (builtin, name) in [
            (self.classes.integer, "Integer"),
            (self.classes.nil, "NilClass"),
            (self.classes.true_, "TrueClass"),
            (self.classes.false_, "FalseClass"),
            (self.classes.class, "Class"),
        ] {
            if self.class_inherits(class, builtin) {
                let no_method_error = self.classes.no_method_error;
                self.raise(
                    no_method_error,
                    &format!("undefined method 'new' for class {}", name),
                );
            }
        }

        let object = if self.class_inherits(class, self.classes.string) {
            HeapObject::String {
                class,
                value: String::new(),
            }
        } else {
            HeapObject::Object(RObject {
                class,
                ivars: Vec::new(),
            })
        };
        let obj = self.alloc(object);
        self.funcall(Value::Obj(obj), "initialize", args);
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::super::InterpOptions;
    use super::*;

    #[test]
    fn test_hierarchy() {
        let interp = Interp::open(InterpOptions::default()).unwrap();
        let c = interp.classes().clone();
        assert!(interp.class_inherits(c.no_method_error, c.name_error));
        assert!(interp.class_inherits(c.syntax_error, c.exception));
        assert!(!interp.class_inherits(c.no_memory_error, c.standard_error));
        assert!(interp.is_kind_of(Value::Int(1), c.object));
        assert_eq!(interp.class_name(c.runtime_error), Some("RuntimeError"));
    }

    #[test]
    fn test_constant_names() {
        assert!(is_constant_name("MyClass"));
        assert!(is_constant_name("A_1"));
        assert!(!is_constant_name("lower"));
        assert!(!is_constant_name("Has Space"));
        assert!(!is_constant_name(""));
    }
}
