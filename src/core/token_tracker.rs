//! Batch-wide token usage accounting

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::core::models::{TokenUsage, UsageReport};

/// Shared token counters, updated from concurrently running requests
#[derive(Debug, Clone, Default)]
pub struct TokenTracker {
    translation_input: Arc<AtomicU64>,
    translation_output: Arc<AtomicU64>,
    evaluation_input: Arc<AtomicU64>,
    evaluation_output: Arc<AtomicU64>,
    requests: Arc<AtomicU64>,
}

impl TokenTracker {
    /// Create a new token tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the usage of one finished request
    pub fn record(&self, usage: &UsageReport) {
        self.translation_input
            .fetch_add(usage.translation.input_tokens, Ordering::Relaxed);
        self.translation_output
            .fetch_add(usage.translation.output_tokens, Ordering::Relaxed);
        self.evaluation_input
            .fetch_add(usage.evaluation.input_tokens, Ordering::Relaxed);
        self.evaluation_output
            .fetch_add(usage.evaluation.output_tokens, Ordering::Relaxed);
        let requests = self.requests.fetch_add(1, Ordering::Relaxed) + 1;

        debug!("Recorded {} tokens, {} requests so far", usage.total_tokens(), requests);
    }

    /// Snapshot of the accumulated usage
    pub fn snapshot(&self) -> UsageReport {
        let mut report = UsageReport::default();
        report.record_translation(TokenUsage::new(
            self.translation_input.load(Ordering::Relaxed),
            self.translation_output.load(Ordering::Relaxed),
        ));
        report.record_evaluation(TokenUsage::new(
            self.evaluation_input.load(Ordering::Relaxed),
            self.evaluation_output.load(Ordering::Relaxed),
        ));
        report
    }

    /// Number of requests recorded
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
