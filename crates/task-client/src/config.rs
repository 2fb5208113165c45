use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
/// 180 attempts at one per second is roughly three minutes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 180;
pub const DEFAULT_RISK_TOP_N: u32 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Status polling policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl PollSettings {
    /// Worst-case wall time spent waiting between attempts
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub api_url: String,
    pub http_timeout: Duration,
    pub poll: PollSettings,
    pub risk_top_n: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            poll: PollSettings::default(),
            risk_top_n: DEFAULT_RISK_TOP_N,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                var,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn positive(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl DashboardConfig {
    /// Load from process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("DASHBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(ConfigError::Invalid {
                var: "DASHBOARD_API_URL",
                value: api_url,
                reason: "must not be empty".to_string(),
            });
        }

        let timeout_secs = positive(
            "DASHBOARD_HTTP_TIMEOUT_SECS",
            parse_var(&lookup, "DASHBOARD_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
        )?;
        let interval_ms = positive(
            "DASHBOARD_POLL_INTERVAL_MS",
            parse_var(&lookup, "DASHBOARD_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL.as_millis() as u64)?,
        )?;
        let max_attempts = positive(
            "DASHBOARD_POLL_MAX_ATTEMPTS",
            parse_var(&lookup, "DASHBOARD_POLL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS as u64)?,
        )?;
        let risk_top_n = positive(
            "DASHBOARD_RISK_TOP_N",
            parse_var(&lookup, "DASHBOARD_RISK_TOP_N", DEFAULT_RISK_TOP_N as u64)?,
        )?;

        let config = Self {
            api_url,
            http_timeout: Duration::from_secs(timeout_secs),
            poll: PollSettings {
                interval: Duration::from_millis(interval_ms),
                max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
            },
            risk_top_n: u32::try_from(risk_top_n).unwrap_or(u32::MAX),
        };

        tracing::debug!(
            "Dashboard config: api={} poll={}ms x{} top_n={}",
            config.api_url,
            interval_ms,
            config.poll.max_attempts,
            config.risk_top_n
        );
        Ok(config)
    }
}
