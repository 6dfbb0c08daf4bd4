//! Value representation
//!
//! Immediate values (`nil`, booleans, integers) are stored inline. Everything
//! else lives on the heap and is referenced through an [`ObjRef`], a slot index
//! paired with the generation the slot had when the object was allocated. A
//! reference whose generation no longer matches its slot points at a reclaimed
//! object and every heap lookup through it fails instead of aliasing whatever
//! was allocated into the slot afterwards.

use std::fmt;

/// Generation-checked reference to a heap object
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index in the heap
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Slot generation this reference was issued for
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into 64 bits (generation in the high half)
    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack from [`ObjRef::to_bits`]
    ///
    /// Any bit pattern is accepted; stale or forged references are rejected by
    /// the heap at lookup time.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({}@{})", self.index, self.generation)
    }
}

/// A runtime value
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum Value {
    /// `nil`
    #[default]
    Nil,
    /// `true` / `false`
    Bool(bool),
    /// Integer
    Int(i64),
    /// Heap object
    Obj(ObjRef),
}

impl Value {
    /// The `nil` value
    #[inline]
    pub const fn nil() -> Self {
        Value::Nil
    }

    /// Check for `nil`
    #[inline]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Truthiness: everything except `nil` and `false` is true
    #[inline]
    pub const fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Extract a heap reference
    #[inline]
    pub const fn as_obj(&self) -> Option<ObjRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }

    /// Extract an integer
    #[inline]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<ObjRef> for Value {
    fn from(r: ObjRef) -> Self {
        Value::Obj(r)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Obj(r) => write!(f, "{:?}", r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(Value::Bool(true).truthy());
        assert!(Value::Int(0).truthy());
    }

    #[test]
    fn test_obj_ref_bits() {
        let r = ObjRef::new(7, 3);
        let packed = r.to_bits();
        assert_eq!(packed >> 32, 3);
        assert_eq!(ObjRef::from_bits(packed), r);
    }

    #[test]
    fn test_default_is_nil() {
        assert!(Value::default().is_nil());
        assert_eq!(Value::from(5i64).as_int(), Some(5));
    }
}
