use serde::Deserialize;
use moar_metrics_core::error::{MetricsError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub version: u32,

    #[serde(default)]
    pub metricd: MetricdSection,
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::UnsupportedVersion(self.version));
        }

        self.metricd.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricdSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application name sent as `meta.app`.
    #[serde(default)]
    pub app: String,

    /// Overrides the detected local hostname sent as `meta.host`.
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for MetricdSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app: String::new(),
            hostname: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl MetricdSection {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MetricsError::BadConfig("metricd.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(MetricsError::BadConfig("metricd.port must not be 0".into()));
        }
        if self.app.trim().is_empty() {
            return Err(MetricsError::BadConfig("metricd.app must not be empty".into()));
        }
        if !(1..=10_000).contains(&self.timeout_ms) {
            return Err(MetricsError::BadConfig(
                "metricd.timeout_ms must be between 1 and 10000".into(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8125
}
fn default_timeout_ms() -> u64 {
    250
}
