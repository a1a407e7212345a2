//! One simulated user of the target server

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use surge_http::{Client, HttpError, HttpResult, Request, Subscription, AUTOUPDATE_PATH};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::ops::{Connect, Dispatch, Listen, Login};

#[derive(Debug, Clone, Default)]
enum Connection {
    #[default]
    Pending,
    Open(Arc<Subscription>),
    Failed(String),
}

/// A [`Client`] plus the change stream it keeps open
///
/// Listeners may start before the connection exists; they wait until
/// [`Connect::connect`] opened or failed it.
pub struct SimulatedClient {
    client: Client,
    credentials: Option<(String, String)>,
    body: Bytes,
    connection: watch::Sender<Connection>,
}

impl SimulatedClient {
    /// A user listening on the autoupdate stream with `body` as its request
    pub fn new(client: Client, body: impl Into<Bytes>) -> Self {
        Self {
            client,
            credentials: None,
            body: body.into(),
            connection: watch::Sender::new(Connection::Pending),
        }
    }

    /// Log in as someone other than the configured user
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn subscription(&self) -> Option<Arc<Subscription>> {
        match &*self.connection.borrow() {
            Connection::Open(subscription) => Some(subscription.clone()),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(&*self.connection.borrow(), Connection::Open(_))
    }

    async fn open_subscription(&self, cancel: &CancellationToken) -> HttpResult<Arc<Subscription>> {
        let mut connection = self.connection.subscribe();
        let ready = async move {
            connection
                .wait_for(|c| !matches!(c, Connection::Pending))
                .await
                .map(|c| (*c).clone())
                .ok()
        };

        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            state = ready => state,
        };

        match state {
            Some(Connection::Open(subscription)) => Ok(subscription),
            Some(Connection::Failed(reason)) => Err(HttpError::NotConnected(reason)),
            _ => Err(HttpError::NotConnected("connection state dropped".to_string())),
        }
    }
}

#[async_trait]
impl Login for SimulatedClient {
    async fn login(&self, cancel: &CancellationToken) -> HttpResult<()> {
        match &self.credentials {
            Some((username, password)) => {
                self.client
                    .login_with_credentials(username, password, cancel)
                    .await
            }
            None => self.client.login(cancel).await,
        }
    }
}

#[async_trait]
impl Connect for SimulatedClient {
    async fn connect(&self, cancel: &CancellationToken) -> HttpResult<()> {
        match self.client.subscribe(AUTOUPDATE_PATH, self.body.clone(), cancel).await {
            Ok(subscription) => {
                debug!("Connected to {}", AUTOUPDATE_PATH);
                self.connection
                    .send_replace(Connection::Open(Arc::new(subscription)));
                Ok(())
            }
            Err(error) => {
                self.connection
                    .send_replace(Connection::Failed(error.to_string()));
                Err(error)
            }
        }
    }
}

#[async_trait]
impl Dispatch for SimulatedClient {
    async fn dispatch(&self, request: Request, cancel: &CancellationToken) -> HttpResult<()> {
        self.client.send(request, cancel).await.map(|_| ())
    }
}

#[async_trait]
impl Listen for SimulatedClient {
    fn received(&self) -> u64 {
        self.subscription().map_or(0, |s| s.received())
    }

    fn connected_at(&self) -> Option<Instant> {
        self.subscription().map(|s| s.connected_at())
    }

    async fn wait_for_changes(&self, total: u64, cancel: &CancellationToken) -> HttpResult<()> {
        let subscription = self.open_subscription(cancel).await?;
        subscription.expect_changes(total, cancel).await
    }
}
