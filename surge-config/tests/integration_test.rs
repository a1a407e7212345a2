//! Integration tests for surge-config

use std::io::Write;
use std::time::Duration;
use surge_config::*;
use temp_env::with_vars;

#[test]
fn test_default_config_validation() {
    let config = SurgeConfig::default();
    assert!(config.validate_all().is_ok());
    assert_eq!(config.session.login.max_attempts, 100);
    assert_eq!(config.session.login.retry_delay, Duration::from_secs(1));
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("SURGE_DOMAIN", Some("openslides.example:443")),
        ("SURGE_USERNAME", Some("admin")),
        ("SURGE_PASSWORD", Some("secret")),
        ("SURGE_HTTP", Some("true")),
        ("SURGE_IPV4", Some("true")),
        ("SURGE_LOGIN_ATTEMPTS", Some("7")),
        ("SURGE_LOG_LEVEL", Some("debug")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.session.addr(), "http://openslides.example:443");
        assert_eq!(config.session.username, "admin");
        assert_eq!(config.session.password, "secret");
        assert!(config.session.force_ipv4);
        assert_eq!(config.session.login.max_attempts, 7);
        assert_eq!(config.logging.level, Some(LogLevel::Debug));
    });
}

#[test]
fn test_invalid_env_value_is_reported() {
    with_vars(vec![("SURGE_LOGIN_ATTEMPTS", Some("many"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    });
}

#[test]
fn test_zero_login_attempts_rejected() {
    with_vars(vec![("SURGE_LOGIN_ATTEMPTS", Some("0"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::DomainError { .. }));
    });
}

#[test]
fn test_yaml_file_with_overrides() {
    let yaml = r#"
session:
  domain: "localhost:9000"
  username: "admin"
  password: "admin"
  protocol: http2
  connect_timeout: 3s
  login:
    max_attempts: 5
    retry_delay: 250ms
    max_delay: 2s
    backoff:
      type: exponential
      base: 2.0
logging:
  level: warn
  format: json
"#;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    with_vars(vec![("SURGE_PASSWORD", Some("from-env"))], || {
        let config = ConfigLoader::new().from_file(file.path()).unwrap();

        assert_eq!(config.session.domain, "localhost:9000");
        assert_eq!(config.session.password, "from-env");
        assert_eq!(config.session.protocol, Protocol::Http2);
        assert_eq!(config.session.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.session.login.max_attempts, 5);
        assert_eq!(config.session.login.retry_delay, Duration::from_millis(250));
        assert_eq!(
            config.session.login.backoff,
            BackoffKind::Exponential { base: 2.0 }
        );
        assert_eq!(config.logging.level, Some(LogLevel::Warn));
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_sample_config_parses_back() {
    let sample = SurgeConfig::generate_sample();
    let parsed: SurgeConfig = serde_yaml::from_str(&sample).unwrap();
    assert!(parsed.validate_all().is_ok());
}

#[test]
fn test_load_without_level_leaves_it_open() {
    with_vars(vec![("SURGE_LOG_LEVEL", None::<&str>)], || {
        let config = ConfigLoader::new().load(None::<&str>).unwrap();
        assert_eq!(config.logging.level, None);
    });
}

#[test]
fn test_load_prefers_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"session:\n  domain: \"bench.example\"\n  login:\n    backoff:\n      type: fibonacci\n")
        .unwrap();

    with_vars(vec![("SURGE_DOMAIN", None::<&str>)], || {
        let config = ConfigLoader::new().load(Some(file.path())).unwrap();
        assert_eq!(config.session.domain, "bench.example");
        assert_eq!(config.session.login.backoff, BackoffKind::Fibonacci);
    });
}
