//! Configuration for Surge
//!
//! Connection parameters of a load-test session, login retry pacing and
//! logging output, split into domains with defaults, validation and
//! environment variable overrides.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    logging::{LogFormat, LogLevel, LoggingConfig},
    session::{BackoffKind, LoginConfig, Protocol, SessionConfig},
    SurgeConfig,
};
