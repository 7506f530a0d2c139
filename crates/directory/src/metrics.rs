//! Directory metrics via the `metrics` facade.
//!
//! All metrics follow the pattern `reldir_directory_{name}_{unit}`. No
//! recorder is installed here; without one every call is a no-op.

use metrics::{counter, histogram};

const WRITES_TOTAL: &str = "reldir_directory_writes_total";
const CHECKS_TOTAL: &str = "reldir_directory_checks_total";
const CHECK_BATCH_LATENCY: &str = "reldir_directory_check_batch_latency_seconds";
const MODEL_RELOADS_TOTAL: &str = "reldir_directory_model_reloads_total";

/// Outcome label of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Content changed and was stored.
    Written,
    /// Content matched the stored etag.
    Unchanged,
    /// Entry removed.
    Deleted,
    /// Write rejected or failed.
    Error,
}

impl WriteOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Unchanged => "unchanged",
            Self::Deleted => "deleted",
            Self::Error => "error",
        }
    }

    /// Outcome of a set that may have been a no-op.
    pub fn for_set(written: bool) -> Self {
        if written { Self::Written } else { Self::Unchanged }
    }
}

/// `reldir_directory_writes_total{kind, outcome}`.
#[inline]
pub fn record_write(kind: &'static str, outcome: WriteOutcome) {
    counter!(WRITES_TOTAL, "kind" => kind, "outcome" => outcome.as_str()).increment(1);
}

/// Records a batch of checks and how long it took.
#[inline]
pub fn record_checks(count: usize, latency_secs: f64) {
    counter!(CHECKS_TOTAL).increment(count as u64);
    histogram!(CHECK_BATCH_LATENCY).record(latency_secs);
}

/// Records a model swap.
#[inline]
pub fn record_model_reload(changed: bool) {
    let outcome = if changed { "reloaded" } else { "unchanged" };
    counter!(MODEL_RELOADS_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_dont_panic() {
        record_write("object", WriteOutcome::for_set(true));
        record_write("relation", WriteOutcome::Deleted);
        record_checks(4, 0.002);
        record_model_reload(false);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(WriteOutcome::for_set(false).as_str(), "unchanged");
        assert_eq!(WriteOutcome::Error.as_str(), "error");
    }
}
