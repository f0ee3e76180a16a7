//! Status - コンテキストごとのカウンタ

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::ExecutionContext;

/// Counters for one execution context.
///
/// - `submitted`: accepted submissions (absent tasks and dropped postings are not counted)
/// - `completed`: tasks that ran to completion
/// - `failed`: tasks that panicked or whose owner was gone
/// - `cancelled`: main-thread postings withdrawn before they ran
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextCounts {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}

impl ContextCounts {
    /// Submitted but not finished or cancelled yet.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed + self.failed + self.cancelled)
    }
}

/// Snapshot of all contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub cpu: ContextCounts,
    pub io: ContextCounts,
    pub db: ContextCounts,
    pub main: ContextCounts,
}

impl DispatcherStats {
    pub fn context(&self, context: ExecutionContext) -> &ContextCounts {
        match context {
            ExecutionContext::CpuBound => &self.cpu,
            ExecutionContext::IoBound => &self.io,
            ExecutionContext::DbSerial => &self.db,
            ExecutionContext::MainThread => &self.main,
        }
    }
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> ContextCounts {
        ContextCounts {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Live counters shared between the dispatcher and its jobs.
#[derive(Default)]
pub(crate) struct StatsRecorder {
    contexts: [Counters; 4],
}

impl StatsRecorder {
    pub(crate) fn submitted(&self, context: ExecutionContext) {
        self.contexts[context.index()]
            .submitted
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Take back a submission that was never accepted.
    pub(crate) fn withdrawn(&self, context: ExecutionContext) {
        self.contexts[context.index()]
            .submitted
            .fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn finished(&self, context: ExecutionContext, ok: bool) {
        let counters = &self.contexts[context.index()];
        if ok {
            counters.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn cancelled(&self, context: ExecutionContext) {
        self.contexts[context.index()]
            .cancelled
            .fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            cpu: self.contexts[ExecutionContext::CpuBound.index()].snapshot(),
            io: self.contexts[ExecutionContext::IoBound.index()].snapshot(),
            db: self.contexts[ExecutionContext::DbSerial.index()].snapshot(),
            main: self.contexts[ExecutionContext::MainThread.index()].snapshot(),
        }
    }
}
