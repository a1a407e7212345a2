//! HTTP client functionality for Surge
//!
//! An authenticated [`Client`] for the target server, the [`Task`] handle
//! for actions the server finishes asynchronously, and the newline-delimited
//! JSON [`ChangeStream`] both of them read from the autoupdate endpoint.

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod stream;
pub mod subscription;
pub mod task;
pub mod types;

// Re-export main types for convenience
pub use auth::decode_user_id;
pub use client::{Client, AUTOUPDATE_PATH, LOGIN_PATH};
pub use config::{login_retry_policy, ClientOptions};
pub use errors::{HttpError, HttpResult, StreamError, TaskError};
pub use stream::{fqfield, ChangeSet, ChangeStream, MAX_LINE_BYTES};
pub use subscription::Subscription;
pub use task::{action_worker_id, ActionWorkerKeys, Task};
pub use types::{ActionRequest, HttpMethod, HttpMethodError, Request, Response};
