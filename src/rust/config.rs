use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const SERVICE_URL_VAR: &str = "TEXTCLF_SERVICE_URL";
pub const OPERATION_TIMEOUT_VAR: &str = "TEXTCLF_OPERATION_TIMEOUT_SECS";
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8080";

/// Offsets, measured from the `show` call, at which a notification moves
/// through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTimings {
    pub appear_after: Duration,
    pub disappear_after: Duration,
    pub teardown_after: Duration,
}

impl Default for NotificationTimings {
    fn default() -> Self {
        Self {
            appear_after: Duration::from_millis(200),
            disappear_after: Duration::from_millis(2000),
            teardown_after: Duration::from_millis(2500),
        }
    }
}

impl NotificationTimings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appear_after < self.disappear_after && self.disappear_after < self.teardown_after {
            Ok(())
        } else {
            Err(ConfigError::InvalidTimings(format!(
                "appear {:?}, disappear {:?}, teardown {:?}",
                self.appear_after, self.disappear_after, self.teardown_after
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Base URL of the remote classification service
    pub service_url: String,
    pub notification: NotificationTimings,
    /// `None` waits for the service indefinitely
    pub operation_timeout: Option<Duration>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            notification: NotificationTimings::default(),
            operation_timeout: None,
        }
    }
}

impl ConsoleConfig {
    /// Builds a configuration from the defaults, overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var(SERVICE_URL_VAR) {
            config.service_url = url;
        }

        if let Ok(raw) = env::var(OPERATION_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.operation_timeout = None,
                Ok(secs) => config.operation_timeout = Some(Duration::from_secs(secs)),
                Err(_) => log::warn!("Ignoring unparsable {}='{}'", OPERATION_TIMEOUT_VAR, raw),
            }
        }

        config
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_notification_timings(mut self, timings: NotificationTimings) -> Self {
        self.notification = timings;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        self.notification.validate()
    }

    /// Parsed service URL, with a trailing slash so endpoint paths join under it
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.service_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let url = Url::parse(&normalized)
            .map_err(|_| ConfigError::InvalidServiceUrl(self.service_url.clone()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(ConfigError::InvalidServiceUrl(self.service_url.clone())),
        }
    }
}
