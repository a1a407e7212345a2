//! Session configuration: where to connect and as whom

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection parameters for one load-test session
///
/// Immutable once a client has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Server domain, optionally with an `http://` or `https://` prefix
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Username for logged-in requests
    #[serde(default = "default_credential")]
    pub username: String,

    /// Password for logged-in requests
    #[serde(default = "default_credential")]
    pub password: String,

    /// Use plain http instead of https
    #[serde(default = "crate::domains::utils::default_false")]
    pub use_http: bool,

    /// Only connect over IPv4
    #[serde(default = "crate::domains::utils::default_false")]
    pub force_ipv4: bool,

    /// Accept invalid or self-signed TLS certificates
    #[serde(default = "crate::domains::utils::default_true")]
    pub insecure_tls: bool,

    /// HTTP protocol variant
    #[serde(default)]
    pub protocol: Protocol,

    /// Do not log in, assume user id 1
    #[serde(default = "crate::domains::utils::default_false")]
    pub fake_auth: bool,

    /// Timeout for establishing a connection
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Login retry pacing
    #[serde(default)]
    pub login: LoginConfig,
}

/// HTTP protocol variant used by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Negotiate via ALPN
    #[default]
    Auto,
    /// HTTP/1.1 only
    Http1,
    /// HTTP/2 with prior knowledge
    Http2,
}

/// How the pause between login attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Linear,
    Exponential {
        base: f64,
    },
    Fibonacci,
}

/// Login retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Attempts before the login is given up, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause before the first retry
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Upper bound for the pause between attempts
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Growth of the pause
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Spread retries of many clients by +-20%
    #[serde(default = "crate::domains::utils::default_false")]
    pub jitter: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            username: default_credential(),
            password: default_credential(),
            use_http: false,
            force_ipv4: false,
            insecure_tls: true,
            protocol: Protocol::default(),
            fake_auth: false,
            connect_timeout: default_connect_timeout(),
            login: LoginConfig::default(),
        }
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            max_delay: default_max_delay(),
            backoff: BackoffKind::default(),
            jitter: false,
        }
    }
}

impl SessionConfig {
    /// Session against `domain` with the given credentials and default options
    pub fn new(
        domain: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Base address with scheme
    ///
    /// A domain that already carries a scheme is returned unchanged.
    pub fn addr(&self) -> String {
        if self.domain.starts_with("http") {
            return self.domain.clone();
        }

        let scheme = if self.use_http { "http" } else { "https" };
        format!("{}://{}", scheme, self.domain)
    }
}

impl Validatable for SessionConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.domain, "domain", self.domain_name())?;
        validate_url(&self.addr(), "domain", self.domain_name())?;

        if !self.fake_auth {
            validate_required_string(&self.username, "username", self.domain_name())?;
            validate_required_string(&self.password, "password", self.domain_name())?;
        }

        validate_positive(
            self.connect_timeout.as_millis(),
            "connect_timeout",
            self.domain_name(),
        )?;

        self.login.validate()
    }

    fn domain_name(&self) -> &'static str {
        "session"
    }
}

impl Validatable for LoginConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.max_attempts, "max_attempts", self.domain_name())?;

        if self.max_delay < self.retry_delay {
            return Err(self.validation_error(format!(
                "max_delay ({:?}) must not be shorter than retry_delay ({:?})",
                self.max_delay, self.retry_delay
            )));
        }

        if let BackoffKind::Exponential { base } = self.backoff {
            if !(base >= 1.0 && base.is_finite()) {
                return Err(self.validation_error(format!(
                    "exponential backoff base must be >= 1.0, got {}",
                    base
                )));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "session.login"
    }
}

// Default value functions
fn default_domain() -> String {
    "localhost:8000".to_string()
}

fn default_credential() -> String {
    "superadmin".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    100
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(1)
}
