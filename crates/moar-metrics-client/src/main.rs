//! moar-metricd-send
//!
//! Loads `metricd.yaml` (or the file named by `MOAR_METRICS_CONFIG`),
//! increments one counter per command-line argument, logs the report and
//! ships it to metricd. Handy for checking that a daemon is reachable.

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use moar_metrics_client::{config, log_report, MetricdClient};
use moar_metrics_core::{method_path, MetricStore};

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("MOAR_METRICS_CONFIG").unwrap_or_else(|_| "metricd.yaml".into());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, kind = e.kind(), error = %e, "config load failed");
            return ExitCode::from(2);
        }
    };

    let store = MetricStore::new();
    {
        let _t = store.time_method(method_path!(), Some("args"), None);
        for name in std::env::args().skip(1) {
            store.increment(&name);
        }
    }

    let report = log_report(&store, "metrics: ", true);
    let client = MetricdClient::from_config(&cfg.metricd);
    tracing::info!(dest = %client.destination(), app = %cfg.metricd.app, "sending report");

    match client.try_send(&report, None).await {
        Ok(bytes) => {
            tracing::info!(bytes, "report sent");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "report not sent");
            ExitCode::FAILURE
        }
    }
}
