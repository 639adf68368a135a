//! Execution context configuration.
//!
//! Values are resolved in this order (highest priority first):
//!
//! 1. **Programmatic** — fields set on [`ContextConfig`] directly
//! 2. **Environment variables** — `UNILOOP_*` overrides via
//!    [`ContextConfig::from_env`]
//! 3. **Defaults** — [`ContextConfig::default`]
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `UNILOOP_POOL_THREADS` | `usize` | `pool_threads` |
//! | `UNILOOP_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |

use std::env;

/// Environment variable for the CPU pool worker count.
pub const ENV_POOL_THREADS: &str = "UNILOOP_POOL_THREADS";
/// Environment variable for the service thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "UNILOOP_THREAD_NAME_PREFIX";

/// Error produced when an environment override cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The variable was set but did not parse as the expected type.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// The environment variable name.
        name: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Configuration for an [`ExecutionContext`](super::ExecutionContext).
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// CPU pool worker count; `0` selects available hardware parallelism.
    pub pool_threads: usize,
    /// Name prefix for service threads (timer worker, pool workers).
    pub thread_name_prefix: String,
}

impl ContextConfig {
    /// Normalizes values to safe defaults.
    pub fn normalize(&mut self) {
        if self.thread_name_prefix.is_empty() {
            self.thread_name_prefix = "uniloop".to_string();
        }
    }

    /// Default configuration with `UNILOOP_*` environment overrides applied.
    ///
    /// Only variables that are set are applied; an unparseable value is an
    /// error rather than a silent fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = read_env(ENV_POOL_THREADS) {
            config.pool_threads =
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: ENV_POOL_THREADS,
                        value,
                    })?;
        }
        if let Some(value) = read_env(ENV_THREAD_NAME_PREFIX) {
            config.thread_name_prefix = value;
        }
        config.normalize();
        Ok(config)
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            pool_threads: 0,
            thread_name_prefix: "uniloop".to_string(),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
