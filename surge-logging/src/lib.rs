//! Logging setup for Surge
//!
//! All crates emit `tracing` events; this crate installs the global
//! subscriber that renders them on stderr, so stdout stays free for
//! test results.

pub mod init;

pub use init::{
    build_env_filter, default_env_filter, init_logging_from_config, init_simple_tracing,
};
