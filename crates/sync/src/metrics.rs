//! Sync metrics via the `metrics` facade.
//!
//! Names follow `reldir_sync_{name}_{unit}`. Entry counters carry a `kind`
//! label of `object` or `relation`.

use metrics::{counter, histogram};

const RECEIVED_TOTAL: &str = "reldir_sync_received_total";
const WRITTEN_TOTAL: &str = "reldir_sync_written_total";
const SKIPPED_TOTAL: &str = "reldir_sync_skipped_total";
const FAILED_TOTAL: &str = "reldir_sync_failed_total";
const DELETED_TOTAL: &str = "reldir_sync_deleted_total";
const RUNS_TOTAL: &str = "reldir_sync_runs_total";
const RUN_DURATION: &str = "reldir_sync_run_duration_seconds";

/// Records the entry counters of one kind after a run.
pub fn record_entries(kind: &'static str, counters: &crate::EntryCounters) {
    counter!(RECEIVED_TOTAL, "kind" => kind).increment(counters.received);
    counter!(WRITTEN_TOTAL, "kind" => kind).increment(counters.written);
    counter!(SKIPPED_TOTAL, "kind" => kind).increment(counters.unchanged);
    counter!(FAILED_TOTAL, "kind" => kind).increment(counters.errors);
    counter!(DELETED_TOTAL, "kind" => kind).increment(counters.deleted);
}

/// Records a finished run and its duration.
pub fn record_run(success: bool, duration_secs: f64) {
    let outcome = if success { "success" } else { "error" };
    counter!(RUNS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(RUN_DURATION, "outcome" => outcome).record(duration_secs);
}
