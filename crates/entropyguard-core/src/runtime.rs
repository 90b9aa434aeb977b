//! Explicit runtime context threaded through the orchestrator.
//!
//! Replaces module-level globals: capabilities, cancellation, and the
//! wall-clock deadline travel together as one handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capability::CapabilityRegistry;

/// Cooperative cancellation flag, checked at batch boundaries only so
/// in-batch audit and index invariants stay consistent.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Wall-clock budget for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.started.elapsed() > self.budget
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn budget_secs(&self) -> u64 {
        self.budget.as_secs()
    }
}

/// Everything a run needs beyond its config: optional backends,
/// cancellation, deadline.
#[derive(Debug, Clone, Default)]
pub struct RuntimeContext {
    pub capabilities: CapabilityRegistry,
    pub cancel: CancellationFlag,
    pub deadline: Option<Deadline>,
}

impl RuntimeContext {
    pub fn new(capabilities: CapabilityRegistry) -> Self {
        Self {
            capabilities,
            cancel: CancellationFlag::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, budget: Duration) -> Self {
        self.deadline = Some(Deadline::after(budget));
        self
    }

    /// True when either the caller cancelled or the budget ran out.
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| d.exceeded())
    }
}
