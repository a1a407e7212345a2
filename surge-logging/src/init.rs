use anyhow::Result;
use surge_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match config.level {
        Some(level) => build_env_filter(level.as_str()),
        None => default_env_filter(),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    // Use try_init to avoid panic if global subscriber already set
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = build_env_filter(log_level);

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Filter from a level or directive string
///
/// `RUST_LOG` is used when the directive does not parse, `info` when
/// neither does.
pub fn build_env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| default_env_filter())
}

/// Filter from `RUST_LOG`, `info` without it
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_directives() {
        let filter = build_env_filter("surge_http=debug,warn");
        assert!(filter.to_string().contains("surge_http=debug"));
    }

    #[test]
    fn test_rust_log_applies_without_level() {
        temp_env::with_var("RUST_LOG", Some("surge_runner=trace"), || {
            assert!(default_env_filter().to_string().contains("surge_runner=trace"));
            assert!(!build_env_filter("warn").to_string().contains("surge_runner"));
        });
        temp_env::with_var_unset("RUST_LOG", || {
            assert!(default_env_filter().to_string().contains("info"));
        });
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        assert!(init_simple_tracing("debug").is_ok());
        assert!(init_simple_tracing("info").is_ok());
    }
}
