//! Typed configuration for the idempotency, webhook and reconciliation core.

use crate::{ConfigError, ConfigManager, ConfigValidator, Result, Validate};
use serde::Serialize;
use std::time::Duration;

/// Poll non-terminal shipments every 15 minutes.
pub const DEFAULT_POLL_SCHEDULE: &str = "0 */15 * * * *";

/// Full reconciliation sweep at 02:00 every day.
pub const DEFAULT_DAILY_SCHEDULE: &str = "0 0 2 * * *";

/// Resolved core configuration.
///
/// Keys map one-to-one to `TILLKEEP_<KEY>` environment variables or
/// top-level keys in a config file.
#[derive(Debug, Clone, Serialize)]
pub struct CoreConfig {
    /// Shared secret for inbound delivery webhooks. `None` means every
    /// webhook is rejected.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,

    pub provider_base_url: Option<String>,

    #[serde(skip_serializing)]
    pub provider_api_key: Option<String>,

    pub provider_timeout_secs: u64,

    /// Attempts per status query, including the first.
    pub provider_max_attempts: u32,

    pub poll_schedule: String,

    pub daily_schedule: String,

    /// Provider queries in flight at once during a reconciliation pass.
    pub reconcile_concurrency: usize,

    /// A non-terminal shipment without a transition for this long is
    /// reported as stalled by the daily sweep.
    pub stall_threshold_hours: u64,

    pub idempotency_retention_hours: u64,

    pub redis_url: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            provider_base_url: None,
            provider_api_key: None,
            provider_timeout_secs: 10,
            provider_max_attempts: 3,
            poll_schedule: DEFAULT_POLL_SCHEDULE.to_string(),
            daily_schedule: DEFAULT_DAILY_SCHEDULE.to_string(),
            reconcile_concurrency: 8,
            stall_threshold_hours: 72,
            idempotency_retention_hours: 720,
            redis_url: None,
        }
    }
}

impl CoreConfig {
    /// Resolve from a manager, falling back to defaults, then validate.
    pub fn from_manager(manager: &ConfigManager) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            webhook_secret: manager.get_opt_string("webhook_secret"),
            provider_base_url: manager.get_opt_string("provider_base_url"),
            provider_api_key: manager.get_opt_string("provider_api_key"),
            provider_timeout_secs: manager
                .get_parsed("provider_timeout_secs")?
                .unwrap_or(defaults.provider_timeout_secs),
            provider_max_attempts: manager
                .get_parsed("provider_max_attempts")?
                .unwrap_or(defaults.provider_max_attempts),
            poll_schedule: manager
                .get_opt_string("poll_schedule")
                .unwrap_or(defaults.poll_schedule),
            daily_schedule: manager
                .get_opt_string("daily_schedule")
                .unwrap_or(defaults.daily_schedule),
            reconcile_concurrency: manager
                .get_parsed("reconcile_concurrency")?
                .unwrap_or(defaults.reconcile_concurrency),
            stall_threshold_hours: manager
                .get_parsed("stall_threshold_hours")?
                .unwrap_or(defaults.stall_threshold_hours),
            idempotency_retention_hours: manager
                .get_parsed("idempotency_retention_hours")?
                .unwrap_or(defaults.idempotency_retention_hours),
            redis_url: manager.get_opt_string("redis_url"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs(self.stall_threshold_hours * 3600)
    }

    pub fn idempotency_retention(&self) -> Duration {
        Duration::from_secs(self.idempotency_retention_hours * 3600)
    }

    /// Whether a delivery provider endpoint is configured.
    pub fn has_provider(&self) -> bool {
        self.provider_base_url.is_some()
    }
}

impl Validate for CoreConfig {
    fn validate(&self) -> Result<()> {
        if let Some(url) = &self.provider_base_url {
            ConfigValidator::is_url(url, "provider_base_url")?;
            if self.provider_api_key.is_none() {
                return Err(ConfigError::ValidationError(
                    "provider_api_key is required when provider_base_url is set".to_string(),
                ));
            }
        }
        ConfigValidator::in_range(self.provider_timeout_secs, 1, 300, "provider_timeout_secs")?;
        ConfigValidator::in_range(self.provider_max_attempts, 1, 10, "provider_max_attempts")?;
        ConfigValidator::is_cron(&self.poll_schedule, "poll_schedule")?;
        ConfigValidator::is_cron(&self.daily_schedule, "daily_schedule")?;
        ConfigValidator::in_range(self.reconcile_concurrency, 1, 64, "reconcile_concurrency")?;
        ConfigValidator::in_range(self.stall_threshold_hours, 1, 24 * 90, "stall_threshold_hours")?;
        ConfigValidator::in_range(
            self.idempotency_retention_hours,
            1,
            24 * 365,
            "idempotency_retention_hours",
        )?;
        Ok(())
    }
}
