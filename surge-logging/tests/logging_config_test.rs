use surge_config::{LogFormat, LogLevel, LoggingConfig};
use surge_logging::init_logging_from_config;

#[test]
fn test_init_from_config_every_format() {
    for format in [
        LogFormat::Json,
        LogFormat::Text,
        LogFormat::Compact,
        LogFormat::Pretty,
    ] {
        let config = LoggingConfig {
            level: Some(LogLevel::Debug),
            format,
            include_location: true,
        };
        // Only the first call installs a subscriber, the rest must not fail.
        assert!(init_logging_from_config(&config).is_ok());
    }

    tracing::info!(phase = "logging", "subscriber installed");
}
