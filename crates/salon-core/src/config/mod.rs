//! Runtime configuration for the mirror and the hosted backend.
//!
//! Values are read from the environment (`SalonConfig::from_env`) or from any
//! lookup function, which keeps parsing testable without touching process
//! state.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_ECHO_TIMEOUT_MS: u64 = 3_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How acknowledged writes reach the local collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// Wait for the change feed to echo the write, with a direct fallback.
    Feed,
    /// Fold the acknowledged row in as soon as the store answers.
    #[default]
    Direct,
}

impl FromStr for ApplyPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "feed" => Ok(Self::Feed),
            "direct" => Ok(Self::Direct),
            other => Err(ConfigError::Invalid(format!(
                "SALON_APPLY_POLICY must be 'feed' or 'direct' (got '{other}')"
            ))),
        }
    }
}

/// What happens to appointments when their client or service disappears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Keep the appointment; views show a placeholder name.
    #[default]
    Keep,
    /// Drop dependent appointments from the mirror as well.
    Cascade,
}

impl FromStr for OrphanPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "cascade" => Ok(Self::Cascade),
            other => Err(ConfigError::Invalid(format!(
                "SALON_ORPHAN_POLICY must be 'keep' or 'cascade' (got '{other}')"
            ))),
        }
    }
}

/// Backoff schedule for feed resubscription.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of retries (None = infinite).
    pub max_retries: Option<u32>,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier for each retry.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number (zero-based).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_possible_wrap
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(64) as i32;
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.clamp(0.0, max_ms) as u64)
    }

    /// Check if we should retry after the given number of attempts.
    ///
    /// The first retry is always allowed.
    #[must_use]
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts == 0 || self.max_retries.map_or(true, |max| attempts < max)
    }
}

/// Behaviour knobs of the local mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorConfig {
    pub apply_policy: ApplyPolicy,
    pub orphan_policy: OrphanPolicy,
    /// How long a feed-mode write waits for its echo before folding in directly.
    pub echo_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            apply_policy: ApplyPolicy::default(),
            orphan_policy: OrphanPolicy::default(),
            echo_timeout: Duration::from_millis(DEFAULT_ECHO_TIMEOUT_MS),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl MirrorConfig {
    #[must_use]
    pub fn with_apply_policy(mut self, apply_policy: ApplyPolicy) -> Self {
        self.apply_policy = apply_policy;
        self
    }

    #[must_use]
    pub fn with_orphan_policy(mut self, orphan_policy: OrphanPolicy) -> Self {
        self.orphan_policy = orphan_policy;
        self
    }

    #[must_use]
    pub fn with_echo_timeout(mut self, echo_timeout: Duration) -> Self {
        self.echo_timeout = echo_timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// Connection details of the hosted backend.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub access_token: Option<String>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BackendConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Everything the front end needs to open a mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct SalonConfig {
    /// `None` when no backend variables are set (offline use only).
    pub backend: Option<BackendConfig>,
    pub mirror: MirrorConfig,
}

impl SalonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = parse_backend_config(&lookup)?;

        let apply_policy = value_or_default(&lookup, "SALON_APPLY_POLICY", "direct").parse()?;
        let orphan_policy = value_or_default(&lookup, "SALON_ORPHAN_POLICY", "keep").parse()?;

        let echo_timeout_ms = value_or_default(
            &lookup,
            "SALON_ECHO_TIMEOUT_MS",
            &DEFAULT_ECHO_TIMEOUT_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|_| {
            ConfigError::Invalid(
                "SALON_ECHO_TIMEOUT_MS must be an integer in [100, 60000]".to_string(),
            )
        })?;
        if !(100..=60_000).contains(&echo_timeout_ms) {
            return Err(ConfigError::Invalid(
                "SALON_ECHO_TIMEOUT_MS must be in [100, 60000]".to_string(),
            ));
        }

        let max_retries = optional_trimmed(&lookup, "SALON_FEED_MAX_RETRIES")
            .map(|value| {
                value.parse::<u32>().map_err(|_| {
                    ConfigError::Invalid(
                        "SALON_FEED_MAX_RETRIES must be a non-negative integer".to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            backend,
            mirror: MirrorConfig {
                apply_policy,
                orphan_policy,
                echo_timeout: Duration::from_millis(echo_timeout_ms),
                reconnect: ReconnectConfig {
                    max_retries,
                    ..ReconnectConfig::default()
                },
            },
        })
    }

    /// Backend settings, or an error naming the first missing variable.
    pub fn require_backend(&self) -> Result<&BackendConfig, ConfigError> {
        self.backend
            .as_ref()
            .ok_or(ConfigError::MissingVar("SUPABASE_URL"))
    }
}

fn parse_backend_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<BackendConfig>, ConfigError> {
    let supabase_url = optional_trimmed(&lookup, "SUPABASE_URL");
    let supabase_anon_key = optional_trimmed(&lookup, "SUPABASE_ANON_KEY");
    let access_token = optional_trimmed(&lookup, "SUPABASE_ACCESS_TOKEN");

    if supabase_url.is_none() && supabase_anon_key.is_none() {
        return Ok(None);
    }

    let supabase_url = supabase_url.ok_or(ConfigError::MissingVar("SUPABASE_URL"))?;
    let supabase_anon_key = supabase_anon_key.ok_or(ConfigError::MissingVar("SUPABASE_ANON_KEY"))?;
    if !is_http_url(&supabase_url) {
        return Err(ConfigError::Invalid(
            "SUPABASE_URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(Some(BackendConfig {
        supabase_url: supabase_url.trim_end_matches('/').to_string(),
        supabase_anon_key,
        access_token,
    }))
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
