//! Search pipeline metrics.

use metrics::{counter, histogram};
use std::time::Instant;

/// Search pipeline metrics recorder
pub struct RagMetrics;

impl RagMetrics {
    /// Record how long one pipeline stage took
    pub fn record_stage(stage: &'static str, duration_secs: f64) {
        histogram!("rag_stage_duration_seconds", "stage" => stage).record(duration_secs);
    }

    /// Record a finished search by query modality and outcome (`ok` or an error code)
    pub fn record_search(modality: &'static str, outcome: &str) {
        counter!(
            "rag_searches_total",
            "modality" => modality,
            "outcome" => outcome.to_string()
        )
        .increment(1);

        tracing::debug!(modality = modality, outcome = outcome, "Search finished");
    }

    /// Record how many items a retrieval returned
    pub fn record_retrieved(count: usize) {
        histogram!("rag_retrieved_items").record(count as f64);
    }
}

/// Timer guard for a pipeline stage.
///
/// Records the duration when `stop()` is called or when dropped, so a stage
/// that fails with `?` is still measured.
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
    stopped: bool,
}

impl StageTimer {
    /// Start timing a stage
    pub fn start(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
            stopped: false,
        }
    }

    /// Stop the timer and record the duration. Returns duration in milliseconds.
    pub fn stop(&mut self) -> u64 {
        if self.stopped {
            return 0;
        }
        self.stopped = true;

        let duration = self.start.elapsed();
        RagMetrics::record_stage(self.stage, duration.as_secs_f64());

        duration.as_millis() as u64
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        RagMetrics::record_stage("embed", 0.1);
        RagMetrics::record_search("text", "ok");
        RagMetrics::record_retrieved(3);
    }

    #[test]
    fn test_stage_timer_stops_once() {
        let mut timer = StageTimer::start("retrieve");
        timer.stop();
        assert_eq!(timer.stop(), 0);
    }
}
