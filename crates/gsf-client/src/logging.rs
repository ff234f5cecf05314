//! Logging — `tracing` subscriber setup for applications built on the client.
//!
//! The library itself only emits events; nothing is printed until an
//! application installs a subscriber, either its own or this one.

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// Sets up:
/// - Environment-based log filtering (RUST_LOG wins over `config.filter`)
/// - Human-readable output, or structured JSON when `config.json` is set
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    build_subscriber(config, rust_log.as_deref())?.try_init()?;
    Ok(())
}

/// A valid RUST_LOG wins; otherwise the configured filter must parse.
fn env_filter(config: &LoggingConfig, rust_log: Option<&str>) -> anyhow::Result<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|directives| EnvFilter::try_new(directives).ok()) {
        return Ok(filter);
    }
    Ok(EnvFilter::try_new(&config.filter)?)
}

fn build_subscriber(
    config: &LoggingConfig,
    rust_log: Option<&str>,
) -> anyhow::Result<Box<dyn Subscriber + Send + Sync>> {
    let env_filter = env_filter(config, rust_log)?;

    if config.json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);
        Ok(Box::new(tracing_subscriber::registry().with(env_filter).with(fmt_layer)))
    } else {
        Ok(Box::new(
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_target(true)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig {
            filter: "gsf_client=loud".into(),
            ..LoggingConfig::default()
        };
        assert!(build_subscriber(&config, None).is_err());
        // A usable RUST_LOG still wins over a broken file setting.
        assert!(build_subscriber(&config, Some("warn")).is_ok());
    }

    #[test]
    fn test_configured_filter_applies() {
        let subscriber = build_subscriber(&LoggingConfig::default(), None).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::DEBUG));
            assert!(!tracing::enabled!(Level::TRACE));
        });
    }

    #[test]
    fn test_rust_log_overrides_config() {
        let config = LoggingConfig {
            json: true,
            ..LoggingConfig::default()
        };
        let subscriber = build_subscriber(&config, Some("warn")).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::WARN));
            assert!(!tracing::enabled!(Level::INFO));
        });

        // Unparseable RUST_LOG falls back to the configured filter.
        let subscriber = build_subscriber(&config, Some("gsf_client=loud")).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(Level::DEBUG));
        });
    }
}
