//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and either a pretty
//! (development) or JSON (production) formatter.
//!
//! # Example
//!
//! ```rust,ignore
//! use docgate::logging::{LogConfig, init_logging};
//!
//! init_logging(&LogConfig::default())?;
//! tracing::info!(collection = "users", "Processing request");
//! ```

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::StartupError;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive (e.g. "info", "docgate=debug,tower_http=info").
    pub level: String,

    /// Whether to output JSON format.
    pub json_format: bool,

    /// Whether to include target (module path).
    pub include_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_target: true,
        }
    }
}

/// Initializes the global subscriber.
///
/// # Errors
///
/// Returns [`StartupError::LogFilter`] for an unparsable filter directive and
/// [`StartupError::LogInit`] if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), StartupError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| StartupError::LogFilter(e.to_string()))?;

    if config.json_format {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| StartupError::LogInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(config.include_target)
            .with_filter(filter);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .try_init()
            .map_err(|e| StartupError::LogInit(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_reported() {
        let config = LogConfig { level: "docgate=notalevel".into(), ..LogConfig::default() };
        assert!(matches!(init_logging(&config), Err(StartupError::LogFilter(_))));
    }
}
