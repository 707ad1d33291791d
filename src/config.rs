//! Operator configuration, read from the environment

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Requeue delay for errors classified as ignorable
pub const DEFAULT_IGNORED_ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Attempts per finalizer patch before a conflict is reported
pub const DEFAULT_FINALIZER_PATCH_ATTEMPTS: u32 = 5;

const METRICS_PORT_ENV: &str = "KIT_METRICS_PORT";
const IGNORED_ERROR_REQUEUE_ENV: &str = "KIT_IGNORED_ERROR_REQUEUE_SECS";
const FINALIZER_PATCH_ATTEMPTS_ENV: &str = "KIT_FINALIZER_PATCH_ATTEMPTS";

/// Reconciliation engine settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Requeue delay returned when an ignorable error is swallowed
    pub ignored_error_requeue: Duration,
    /// Bounded retries for finalizer patches hitting a conflict
    pub finalizer_patch_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ignored_error_requeue: DEFAULT_IGNORED_ERROR_REQUEUE,
            finalizer_patch_attempts: DEFAULT_FINALIZER_PATCH_ATTEMPTS,
        }
    }
}

/// Process-wide settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    pub metrics_port: u16,
    pub engine: EngineConfig,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            engine: EngineConfig::default(),
        }
    }
}

impl OperatorConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup, unset variables keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let metrics_port = parse_var(&lookup, METRICS_PORT_ENV)?.unwrap_or(defaults.metrics_port);

        let ignored_error_requeue = parse_var::<u64, _>(&lookup, IGNORED_ERROR_REQUEUE_ENV)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.engine.ignored_error_requeue);

        let finalizer_patch_attempts = parse_var(&lookup, FINALIZER_PATCH_ATTEMPTS_ENV)?
            .unwrap_or(defaults.engine.finalizer_patch_attempts);
        if finalizer_patch_attempts == 0 {
            return Err(Error::config(format!(
                "{} must be at least 1",
                FINALIZER_PATCH_ATTEMPTS_ENV
            )));
        }

        Ok(Self {
            metrics_port,
            engine: EngineConfig {
                ignored_error_requeue,
                finalizer_patch_attempts,
            },
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config(format!("Invalid {} '{}': {}", key, raw, e))),
    }
}
