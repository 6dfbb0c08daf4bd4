//! Bridge user data and open options

use ember_core::{InterpOptions, ObjRef};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Allocation accounting for bridge user data
///
/// Every successful allocation is paired with exactly one free, whatever
/// path the runtime handle takes (normal close, or any failure during open).
/// A budget makes allocation fail once that many blocks have been handed
/// out, which is how tests force the earliest open failure.
#[derive(Debug, Default)]
pub struct UserDataLedger {
    allocated: AtomicUsize,
    freed: AtomicUsize,
    budget: Option<usize>,
}

impl UserDataLedger {
    /// Ledger without a budget
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that refuses allocations after `budget` of them
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget: Some(budget),
            ..Self::default()
        }
    }

    fn try_allocate(&self) -> bool {
        if let Some(budget) = self.budget {
            if self.allocated.load(Ordering::SeqCst) >= budget {
                return false;
            }
        }
        self.allocated.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn record_free(&self) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }

    /// Blocks allocated so far
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Blocks freed so far
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    /// Blocks allocated and not yet freed
    pub fn outstanding(&self) -> usize {
        self.allocated() - self.freed()
    }
}

/// Options for [`crate::Runtime::open_with`]
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Interpreter options
    pub interp: InterpOptions,

    /// User-data accounting hook
    pub ledger: Option<Arc<UserDataLedger>>,
}

/// State the bridge attaches to the interpreter for the handle's lifetime
pub(crate) struct BridgeUserData {
    /// Uncatchable object raised to carry a host panic out of script frames
    pub(crate) panic_carrier: Option<ObjRef>,

    /// Host panic waiting to be resumed at the boundary
    pub(crate) panic_info: Option<Box<dyn Any + Send>>,

    ledger: Option<Arc<UserDataLedger>>,
}

impl BridgeUserData {
    /// Allocate, or `None` if the ledger's budget is exhausted
    pub(crate) fn allocate(ledger: Option<Arc<UserDataLedger>>) -> Option<Self> {
        if let Some(ledger) = &ledger {
            if !ledger.try_allocate() {
                return None;
            }
        }
        Some(Self {
            panic_carrier: None,
            panic_info: None,
            ledger,
        })
    }
}

impl Drop for BridgeUserData {
    fn drop(&mut self) {
        if let Some(ledger) = &self.ledger {
            ledger.record_free();
        }
    }
}
