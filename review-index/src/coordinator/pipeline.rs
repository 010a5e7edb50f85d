//! Per-request write pipeline state.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::ReviewIndexError;

/// Stage a write request has reached.
///
/// Requests move forward through `Received → Validated → Indexed → Aggregated →
/// Committed`. `Failed` can be reached from any stage before `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WriteStage {
    Received,
    Validated,
    Indexed,
    Aggregated,
    Committed,
    Failed,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WriteStage::Received => "received",
            WriteStage::Validated => "validated",
            WriteStage::Indexed => "indexed",
            WriteStage::Aggregated => "aggregated",
            WriteStage::Committed => "committed",
            WriteStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Tracks one write request through its stages.
#[derive(Debug)]
pub struct WritePipeline {
    operation: &'static str,
    target: String,
    stage: WriteStage,
    started: Instant,
}

impl WritePipeline {
    pub fn start(operation: &'static str, target: impl Into<String>) -> Self {
        let pipeline = Self {
            operation,
            target: target.into(),
            stage: WriteStage::Received,
            started: Instant::now(),
        };
        debug!(
            operation = pipeline.operation,
            target = %pipeline.target,
            "Write request received"
        );
        pipeline
    }

    pub fn stage(&self) -> WriteStage {
        self.stage
    }

    /// Move to `next`. Skipping stages is allowed; moving backwards is not.
    pub fn advance(&mut self, next: WriteStage) {
        debug_assert!(
            next > self.stage && self.stage < WriteStage::Committed,
            "illegal transition {} -> {}",
            self.stage,
            next
        );
        debug!(
            operation = self.operation,
            target = %self.target,
            from = %self.stage,
            to = %next,
            "Write stage advanced"
        );
        self.stage = next;
    }

    /// Record the request as committed.
    pub fn committed(&mut self) {
        self.advance(WriteStage::Committed);
        info!(
            operation = self.operation,
            target = %self.target,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Write committed"
        );
    }

    /// Record the request as failed and hand the error back.
    pub fn fail(&mut self, err: ReviewIndexError) -> ReviewIndexError {
        warn!(
            operation = self.operation,
            target = %self.target,
            stage = %self.stage,
            error = %err,
            "Write failed"
        );
        self.stage = WriteStage::Failed;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut pipeline = WritePipeline::start("create_review", "R1");
        assert_eq!(pipeline.stage(), WriteStage::Received);

        pipeline.advance(WriteStage::Validated);
        pipeline.advance(WriteStage::Aggregated);
        pipeline.committed();
        assert_eq!(pipeline.stage(), WriteStage::Committed);
    }

    #[test]
    fn test_fail_from_any_stage() {
        let mut pipeline = WritePipeline::start("delete_landlord", "L1");
        pipeline.advance(WriteStage::Validated);

        let err = pipeline.fail(ReviewIndexError::validation("nope"));
        assert_eq!(pipeline.stage(), WriteStage::Failed);
        assert!(matches!(err, ReviewIndexError::ValidationError(_)));
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    #[cfg(debug_assertions)]
    fn test_backwards_transition_panics_in_debug() {
        let mut pipeline = WritePipeline::start("update_review", "R1");
        pipeline.advance(WriteStage::Aggregated);
        pipeline.advance(WriteStage::Indexed);
    }
}
