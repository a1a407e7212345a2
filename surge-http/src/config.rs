//! Client configuration

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use surge_config::{BackoffKind, LoginConfig, Protocol, SessionConfig};
use surge_resilience::{BackoffStrategy, RetryPolicy};
use tracing::debug;
use url::Url;

use crate::errors::{HttpError, HttpResult};

/// Settings a [`Client`](crate::Client) is built from
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Address relative request targets are resolved against
    pub base_url: Url,

    pub username: String,
    pub password: String,

    /// Only connect over IPv4
    pub force_ipv4: bool,

    /// Accept invalid or self-signed TLS certificates
    pub insecure_tls: bool,

    pub protocol: Protocol,

    pub connect_timeout: Duration,

    /// Skip login and act as user 1
    pub fake_auth: bool,

    /// Pacing and bound of login attempts
    pub login_retry: RetryPolicy,
}

impl TryFrom<&SessionConfig> for ClientOptions {
    type Error = HttpError;

    fn try_from(config: &SessionConfig) -> Result<Self, Self::Error> {
        let addr = config.addr();
        let base_url =
            Url::parse(&addr).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", addr, e)))?;

        Ok(Self {
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            force_ipv4: config.force_ipv4,
            insecure_tls: config.insecure_tls,
            protocol: config.protocol,
            connect_timeout: config.connect_timeout,
            fake_auth: config.fake_auth,
            login_retry: login_retry_policy(&config.login),
        })
    }
}

/// Retry policy for the login loop
pub fn login_retry_policy(login: &LoginConfig) -> RetryPolicy {
    let backoff_strategy = match login.backoff {
        BackoffKind::Fixed => BackoffStrategy::Fixed,
        BackoffKind::Linear => BackoffStrategy::Linear,
        BackoffKind::Exponential { base } => BackoffStrategy::Exponential { base },
        BackoffKind::Fibonacci => BackoffStrategy::Fibonacci,
    };

    RetryPolicy {
        max_attempts: login.max_attempts,
        initial_delay: login.retry_delay,
        max_delay: login.max_delay,
        backoff_strategy,
        jitter: login.jitter,
    }
}

impl ClientOptions {
    /// Build the underlying transport
    pub(crate) fn build_transport(&self) -> HttpResult<reqwest::Client> {
        debug!(
            "Creating transport for {} (protocol: {:?}, ipv4 only: {})",
            self.base_url, self.protocol, self.force_ipv4
        );

        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(self.insecure_tls)
            .user_agent(concat!("surge/", env!("CARGO_PKG_VERSION")));

        if self.force_ipv4 {
            builder = builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        }

        builder = match self.protocol {
            Protocol::Auto => builder,
            Protocol::Http1 => builder.http1_only(),
            Protocol::Http2 => builder.http2_prior_knowledge(),
        };

        Ok(builder.build()?)
    }
}
