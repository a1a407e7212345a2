//! Authenticated client for the target server

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::{Arc, OnceLock};
use surge_config::SessionConfig;
use surge_resilience::{RetryError, RetryExecutor, RetrySignal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::auth::{decode_user_id, AuthState, AUTH_HEADER, REFRESH_COOKIE};
use crate::config::ClientOptions;
use crate::errors::{HttpError, HttpResult};
use crate::stream::ChangeStream;
use crate::subscription::Subscription;
use crate::task::{self, action_worker_id, ActionWorkerKeys, Task};
use crate::types::{Request, Response};

pub const LOGIN_PATH: &str = "/system/auth/login";
pub const AUTOUPDATE_PATH: &str = "/system/autoupdate";

const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// User id assumed when authentication is faked
const FAKE_USER_ID: u64 = 1;

/// Client of one simulated user
///
/// Log in once before sharing the client between tasks; a second login on
/// the same client is rejected. Every blocking call takes the cancellation
/// token it gives up on.
#[derive(Debug)]
pub struct Client {
    options: ClientOptions,
    http: reqwest::Client,
    login_retry: RetryExecutor,
    auth: OnceLock<AuthState>,
}

impl Client {
    /// Build a client for the session, logins paced by its login settings
    pub fn new(session: &SessionConfig) -> HttpResult<Self> {
        Self::with_options(ClientOptions::try_from(session)?)
    }

    pub fn with_options(options: ClientOptions) -> HttpResult<Self> {
        let http = options.build_transport()?;
        let login_retry = RetryExecutor::from_policy(&options.login_retry);

        Ok(Self {
            options,
            http,
            login_retry,
            auth: OnceLock::new(),
        })
    }

    /// Replace the pause between login attempts
    pub fn with_retry_signal(mut self, signal: Arc<dyn RetrySignal>) -> Self {
        self.login_retry = RetryExecutor::new(self.login_retry.max_attempts(), signal);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.options.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.get().is_some()
    }

    /// Id of the logged in user
    pub fn user_id(&self) -> Option<u64> {
        self.auth.get().map(|auth| auth.user_id)
    }

    /// Log in with the credentials of the session
    pub async fn login(&self, cancel: &CancellationToken) -> HttpResult<()> {
        let (username, password) = (&self.options.username, &self.options.password);
        self.login_with_credentials(username, password, cancel).await
    }

    /// Log in as `username`
    ///
    /// Failed attempts are retried after the retry signal fired, up to the
    /// configured number of attempts. Rejected credentials end the loop at
    /// once.
    pub async fn login_with_credentials(
        &self,
        username: &str,
        password: &str,
        cancel: &CancellationToken,
    ) -> HttpResult<()> {
        if self.is_authenticated() {
            return Err(HttpError::AlreadyAuthenticated);
        }

        if self.options.fake_auth {
            debug!("Fake auth, acting as user {}", FAKE_USER_ID);
            return self.set_auth(AuthState::anonymous(FAKE_USER_ID));
        }

        let url = self.resolve(LOGIN_PATH)?;
        let payload = json!({"username": username, "password": password});

        let response = self
            .login_retry
            .execute(cancel, |attempt| {
                debug!(attempt, username, "Sending login request");
                let request = self.http.post(url.clone()).json(&payload);
                async move { check_status(request.send().await?).await }
            })
            .await
            .map_err(|e| match e {
                RetryError::Cancelled => HttpError::Cancelled,
                RetryError::MaxAttemptsExceeded { last_error, .. } => {
                    HttpError::Auth(Box::new(last_error))
                }
                RetryError::NonRetryableError(error) => HttpError::Auth(Box::new(error)),
            })?;

        let token = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let cookie = response
            .cookies()
            .find(|cookie| cookie.name() == REFRESH_COOKIE)
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()));

        let user_id = decode_user_id(&token)?;
        self.set_auth(AuthState {
            token,
            cookie,
            user_id,
        })?;

        info!(user_id, "Logged in as {}", username);
        Ok(())
    }

    fn set_auth(&self, state: AuthState) -> HttpResult<()> {
        self.auth
            .set(state)
            .map_err(|_| HttpError::AlreadyAuthenticated)
    }

    /// Send a request with credentials and return the unread response
    ///
    /// Any status outside 2xx is an error carrying the response body.
    pub async fn send_raw(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> HttpResult<reqwest::Response> {
        let url = self.resolve(&request.target)?;
        debug!("Sending {} {}", request.method, url);

        let mut builder = self.http.request(request.method.into(), url);

        if let Some(auth) = self.auth.get() {
            builder = builder.header(AUTH_HEADER, auth.token.as_str());
            if let Some(cookie) = &auth.cookie {
                builder = builder.header(COOKIE, cookie.as_str());
            }
        }

        let content_type = request
            .content_type
            .as_deref()
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        builder = builder.header(CONTENT_TYPE, content_type);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            response = async { check_status(builder.send().await?).await } => response,
        }
    }

    /// Send a request and return a [`Task`] for its result
    ///
    /// A `202` response starts following the action worker it names; any
    /// other success is a task that is already done.
    pub async fn send_task(&self, request: Request, cancel: &CancellationToken) -> HttpResult<Task> {
        let response = self.send_raw(request, cancel).await?;
        let accepted = response.status() == StatusCode::ACCEPTED;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            read = Response::read(response) => read?,
        };

        if !accepted {
            return Ok(Task::completed(response));
        }

        let worker_id = action_worker_id(&response.body)?;
        debug!(worker = worker_id, "Action accepted, following action worker");
        self.follow_action_worker(worker_id, cancel).await
    }

    async fn follow_action_worker(&self, id: u64, cancel: &CancellationToken) -> HttpResult<Task> {
        let keys = ActionWorkerKeys::new(id);
        let request = Request::get(AUTOUPDATE_PATH).json(&keys.subscription_body())?;
        let response = self.send_raw(request, cancel).await?;

        Ok(task::follow_action_worker(
            ChangeStream::from_response(response),
            keys,
        ))
    }

    /// Send a request and wait for its result
    ///
    /// Returns as soon as `cancel` fires. The task is dropped then, which
    /// closes its autoupdate connection.
    pub async fn send(&self, request: Request, cancel: &CancellationToken) -> HttpResult<Response> {
        let task = self.send_task(request, cancel).await?;
        Ok(task.wait_cancellable(cancel).await?)
    }

    /// Open a long-poll request and return its change stream
    pub async fn keep_open(
        &self,
        path: &str,
        body: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> HttpResult<ChangeStream> {
        let request = Request::get(path).body(body);
        let response = self.send_raw(request, cancel).await?;
        Ok(ChangeStream::from_response(response))
    }

    /// Open a long-poll request and count its changes in the background
    pub async fn subscribe(
        &self,
        path: &str,
        body: impl Into<Bytes>,
        cancel: &CancellationToken,
    ) -> HttpResult<Subscription> {
        let changes = self.keep_open(path, body, cancel).await?;
        Ok(Subscription::start(changes, cancel))
    }

    /// Absolute targets are kept, everything else is relative to the base
    fn resolve(&self, target: &str) -> HttpResult<Url> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .options
                .base_url
                .join(target)
                .map_err(|e| HttpError::InvalidUrl(format!("{}: {}", target, e))),
            Err(e) => Err(HttpError::InvalidUrl(format!("{}: {}", target, e))),
        }
    }
}

/// Turn a non-2xx response into [`HttpError::Status`]
async fn check_status(response: reqwest::Response) -> HttpResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "[can not read body]".to_string());
    Err(HttpError::Status {
        code: status.as_u16(),
        body,
    })
}
