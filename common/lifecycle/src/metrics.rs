pub(crate) const METRIC_SHUTDOWN_INITIATED: &str = "lifecycle_shutdown_initiated_total";
pub(crate) const METRIC_SHUTDOWN_COMPLETED: &str = "lifecycle_shutdown_completed_total";
pub(crate) const METRIC_SERVICE_SHUTDOWN_DURATION: &str =
    "lifecycle_service_shutdown_duration_seconds";
pub(crate) const METRIC_SERVICE_SHUTDOWN_RESULT: &str = "lifecycle_service_shutdown_result_total";
pub(crate) const METRIC_SERVICE_INIT_FAILED: &str = "lifecycle_service_init_failed_total";

pub(crate) fn emit_shutdown_initiated(manager: &str, trigger: &str) {
    metrics::counter!(
        METRIC_SHUTDOWN_INITIATED,
        "manager" => manager.to_string(),
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_shutdown_completed(manager: &str, clean: bool) {
    metrics::counter!(
        METRIC_SHUTDOWN_COMPLETED,
        "manager" => manager.to_string(),
        "clean" => clean.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_service_init_failed(manager: &str, service: &str) {
    metrics::counter!(
        METRIC_SERVICE_INIT_FAILED,
        "manager" => manager.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
}

pub(crate) fn emit_service_shutdown_duration(service: &str, result: &str, duration_secs: f64) {
    metrics::histogram!(
        METRIC_SERVICE_SHUTDOWN_DURATION,
        "service" => service.to_string(),
        "result" => result.to_string()
    )
    .record(duration_secs);
}

pub(crate) fn emit_service_shutdown_result(service: &str, result: &str) {
    metrics::counter!(
        METRIC_SERVICE_SHUTDOWN_RESULT,
        "service" => service.to_string(),
        "result" => result.to_string()
    )
    .increment(1);
}
