use std::time::Duration;

pub(crate) const METRIC_HOOK_START: &str = "lifecycle_hook_start_total";
pub(crate) const METRIC_HOOK_STOP_DURATION: &str = "lifecycle_hook_stop_duration_seconds";
pub(crate) const METRIC_SHUTDOWN_COMPLETED: &str = "lifecycle_shutdown_completed_total";

pub(crate) fn emit_hook_start(hook: &str, result: &str) {
    metrics::counter!(
        METRIC_HOOK_START,
        "hook" => hook.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_hook_stop(hook: &str, result: &str, duration: Duration) {
    metrics::histogram!(
        METRIC_HOOK_STOP_DURATION,
        "hook" => hook.to_string(),
        "result" => result.to_string()
    )
    .record(duration.as_secs_f64());
}

pub(crate) fn emit_shutdown_completed(clean: bool) {
    metrics::counter!(
        METRIC_SHUTDOWN_COMPLETED,
        "clean" => clean.to_string()
    )
    .increment(1);
}
