//! Report -> log line.

use moar_metrics_core::{MetricStore, Report};

/// `msg` followed by the report as compact JSON.
pub fn report_line(msg: &str, report: &Report) -> String {
    match serde_json::to_string(report) {
        Ok(json) => format!("{msg}{json}"),
        Err(e) => format!("{msg}<unserializable report: {e}>"),
    }
}

/// Write the current report to the log as one `info` event.
///
/// Returns the report so callers can also ship it without reporting twice.
pub fn log_report(store: &MetricStore, msg: &str, stop_running: bool) -> Report {
    let report = store.report(stop_running);
    tracing::info!("{}", report_line(msg, &report));
    report
}
