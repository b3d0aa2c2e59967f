use std::env;
use std::time::Duration;

use tracing::warn;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::retry::RetryPolicy;
use crate::ValidationError;

/// Longest trailing window a single fetch may request.
pub const MAX_WINDOW_DAYS: u32 = 366;

/// Orchestrator tuning.
///
/// # Environment Variables
///
/// | Setting | Primary Env Var | Fallback Env Var |
/// |---------|-----------------|------------------|
/// | Bearer credential | `HYDROCAST_EDL_TOKEN` | `EDL_TOKEN` |
/// | HTTP timeout (s) | `HYDROCAST_HTTP_TIMEOUT_SECS` | - |
/// | Cache TTL (s) | `HYDROCAST_CACHE_TTL_SECS` | - |
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub cache_ttl: Duration,
    pub breaker: CircuitBreakerConfig,
    pub primary_retry: RetryPolicy,
    pub secondary_retry: RetryPolicy,
    pub tertiary_retry: RetryPolicy,
    pub gap_fill_retry: RetryPolicy,
    /// Most recent days re-checked against the archive provider.
    pub gap_fill_days: u32,
    pub http_timeout: Duration,
    pub user_agent: String,
    pub credential: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let tertiary_retry = RetryPolicy::new(2, Duration::from_secs(1));
        Self {
            cache_ttl: Duration::from_secs(15 * 60),
            breaker: CircuitBreakerConfig::default(),
            primary_retry: RetryPolicy::new(2, Duration::from_millis(800)),
            secondary_retry: RetryPolicy::new(3, Duration::from_secs(1)),
            tertiary_retry,
            gap_fill_retry: tertiary_retry,
            gap_fill_days: 3,
            http_timeout: Duration::from_secs(30),
            user_agent: String::from(concat!("hydrocast/", env!("CARGO_PKG_VERSION"))),
            credential: None,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with whatever the environment provides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.credential = env::var("HYDROCAST_EDL_TOKEN")
            .or_else(|_| env::var("EDL_TOKEN"))
            .ok()
            .filter(|token| !token.trim().is_empty());

        if let Some(secs) = env_secs("HYDROCAST_HTTP_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("HYDROCAST_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }

        config
    }

    /// Drops jitter from every retry policy. Used where waits must be exact.
    pub fn without_jitter(mut self) -> Self {
        self.primary_retry = self.primary_retry.without_jitter();
        self.secondary_retry = self.secondary_retry.without_jitter();
        self.tertiary_retry = self.tertiary_retry.without_jitter();
        self.gap_fill_retry = self.gap_fill_retry.without_jitter();
        self
    }
}

fn env_secs(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!(variable = name, value = %raw, "ignoring invalid duration override");
            None
        }
    }
}

pub fn validate_window(days: u32) -> Result<u32, ValidationError> {
    if days == 0 {
        return Err(ValidationError::EmptyWindow);
    }
    if days > MAX_WINDOW_DAYS {
        return Err(ValidationError::WindowTooLong {
            days,
            max: MAX_WINDOW_DAYS,
        });
    }
    Ok(days)
}
