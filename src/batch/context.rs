// src/batch/context.rs

//! Per-invocation batch bookkeeping.

use uuid::Uuid;

use crate::batch::{BatchResult, CIRCUIT_BREAKER_THRESHOLD};

/// Mutable state of one running batch, discarded on completion.
#[derive(Debug)]
pub struct BatchContext {
    pub batch_id: Uuid,
    pub total: usize,
    consecutive_failures: u32,
    success_count: usize,
    failure_count: usize,
    timeout_count: usize,
    skipped_count: usize,
    cancelled: bool,
}

impl BatchContext {
    pub fn new(batch_id: Uuid, total: usize) -> Self {
        Self {
            batch_id,
            total,
            consecutive_failures: 0,
            success_count: 0,
            failure_count: 0,
            timeout_count: 0,
            skipped_count: 0,
            cancelled: false,
        }
    }

    /// A success resets the consecutive-failure streak.
    pub fn record_success(&mut self) {
        self.success_count += 1;
        self.consecutive_failures = 0;
    }

    /// Timeouts count toward the breaker like any failure but are tallied
    /// separately.
    pub fn record_failure(&mut self, timed_out: bool) {
        self.failure_count += 1;
        if timed_out {
            self.timeout_count += 1;
        }
        self.consecutive_failures += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_count += 1;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the circuit breaker has tripped.
    pub fn breaker_tripped(&self) -> bool {
        self.consecutive_failures >= CIRCUIT_BREAKER_THRESHOLD
    }

    /// Mark the batch cancelled; the chaining step declines further
    /// enqueues once this is set.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn into_result(self) -> BatchResult {
        BatchResult {
            success: self.success_count,
            failure: self.failure_count,
            timeouts: self.timeout_count,
            skipped: self.skipped_count,
            total: self.total,
            halted_by_circuit_breaker: self.consecutive_failures
                >= CIRCUIT_BREAKER_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_trips_on_third_consecutive_failure() {
        let mut ctx = BatchContext::new(Uuid::new_v4(), 5);
        ctx.record_failure(false);
        ctx.record_failure(true);
        assert!(!ctx.breaker_tripped());
        ctx.record_failure(false);
        assert!(ctx.breaker_tripped());
    }

    #[test]
    fn success_resets_the_streak() {
        let mut ctx = BatchContext::new(Uuid::new_v4(), 5);
        ctx.record_failure(false);
        ctx.record_failure(false);
        ctx.record_success();
        ctx.record_failure(false);
        assert!(!ctx.breaker_tripped());
        assert_eq!(ctx.consecutive_failures(), 1);
    }

    #[test]
    fn result_aggregates_counts() {
        let mut ctx = BatchContext::new(Uuid::new_v4(), 4);
        ctx.record_success();
        ctx.record_failure(true);
        ctx.record_failure(false);
        ctx.record_skipped();

        let result = ctx.into_result();
        assert_eq!(result.success, 1);
        assert_eq!(result.failure, 2);
        assert_eq!(result.timeouts, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.total, 4);
        assert!(!result.halted_by_circuit_breaker);
    }
}
