//! Interpreter configuration

/// Resource limits for one interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum number of live heap objects (None = unlimited)
    pub max_objects: Option<usize>,

    /// Maximum GC arena depth (None = unlimited)
    pub arena_capacity: Option<usize>,

    /// Maximum nesting of method calls before `SystemStackError`
    pub max_call_depth: usize,
}

/// Default for [`ResourceLimits::max_call_depth`]
pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_objects: None,
            arena_capacity: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl ResourceLimits {
    /// No object or arena limit, default call depth
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Create resource limits with a specific object limit
    pub fn with_object_limit(max_objects: usize) -> Self {
        Self {
            max_objects: Some(max_objects),
            ..Self::default()
        }
    }
}

/// Interpreter options
#[derive(Debug, Clone)]
pub struct InterpOptions {
    /// Resource limits
    pub limits: ResourceLimits,

    /// Initial GC threshold in live objects
    pub gc_threshold: usize,
}

impl Default for InterpOptions {
    fn default() -> Self {
        Self {
            limits: ResourceLimits::default(),
            gc_threshold: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_unlimited() {
        let options = InterpOptions::default();
        assert_eq!(options.limits, ResourceLimits::unlimited());
        assert!(options.gc_threshold > 0);
        assert_eq!(ResourceLimits::with_object_limit(8).max_objects, Some(8));
        assert_eq!(options.limits.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }
}
