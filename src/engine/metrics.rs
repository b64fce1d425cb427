//! Engine run metrics.
//!
//! Small structs used to observe one `execute()` call:
//!
//! - `Typographer::execute` collects nothing beyond what logging needs.
//! - `Typographer::execute_verbose` returns a [`RunMetrics`] record and the
//!   per-rule [`RuleStep`] trace.
//!
//! Metrics are opt-in: the trace clones the text before and after every
//! applied rule, so it is only collected when asked for.

use std::time::Duration;

use crate::Queue;

// --- Metrics -----------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time of the run.
    pub total: Duration,
    /// One entry per queue that was executed, in execution order.
    pub queues: Vec<QueueMetrics>,
    /// Spans hidden by the protector (reserved-code-point escapes included).
    pub protected_spans: usize,
    pub html_likely: bool,
}

impl RunMetrics {
    /// Rules applied across all queues.
    pub fn rules_applied(&self) -> usize {
        self.queues.iter().map(|q| q.rules_applied).sum()
    }

    pub fn queue(&self, queue: Queue) -> Option<&QueueMetrics> {
        self.queues.iter().find(|q| q.queue == queue)
    }
}

/// Timing and counters for one queue.
#[derive(Debug, Clone)]
pub struct QueueMetrics {
    pub queue: Queue,
    pub duration: Duration,
    /// Rules (inner and main) that passed the filters and ran.
    pub rules_applied: usize,
    /// Rules whose output differed from their input.
    pub changed: usize,
}

/// One applied rule, as recorded by a verbose run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStep {
    pub queue: Queue,
    pub rule: String,
    pub inner: bool,
    pub input: String,
    pub output: String,
}

impl RuleStep {
    pub fn changed(&self) -> bool {
        self.input != self.output
    }
}
