use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub profiles_path: Option<PathBuf>,
    pub diagnostics_dir: PathBuf,
    pub consent_timeout_secs: u64,
    pub consent_settle_ms: u64,
    pub readiness_timeout_secs: u64,
    pub inter_target_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
}

impl AppConfig {
    #[must_use]
    pub fn consent_timeout(&self) -> Duration {
        Duration::from_secs(self.consent_timeout_secs)
    }

    #[must_use]
    pub fn consent_settle(&self) -> Duration {
        Duration::from_millis(self.consent_settle_ms)
    }

    #[must_use]
    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    #[must_use]
    pub fn inter_target_delay(&self) -> Duration {
        Duration::from_millis(self.inter_target_delay_ms)
    }
}
