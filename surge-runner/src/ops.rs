//! Fan-out of the client operations a load test is made of

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use surge_http::{HttpError, HttpResult, Request};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::WorkError;
use crate::pool::{Outcome, WorkerPool};

/// Something that can log in
#[async_trait]
pub trait Login: Send + Sync {
    async fn login(&self, cancel: &CancellationToken) -> HttpResult<()>;
}

/// Something that can open its change stream
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(&self, cancel: &CancellationToken) -> HttpResult<()>;
}

/// Something that can send a write request
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: Request, cancel: &CancellationToken) -> HttpResult<()>;
}

/// Something whose received changes can be awaited
#[async_trait]
pub trait Listen: Send + Sync {
    /// Changes received so far
    fn received(&self) -> u64;

    /// When the change stream was opened
    fn connected_at(&self) -> Option<Instant>;

    /// Wait until `total` changes have been received in all
    async fn wait_for_changes(&self, total: u64, cancel: &CancellationToken) -> HttpResult<()>;
}

/// Log in every client, `parallel` at a time
pub fn login_clients<C>(
    clients: &[Arc<C>],
    parallel: usize,
    cancel: &CancellationToken,
) -> mpsc::UnboundedReceiver<Outcome<HttpError>>
where
    C: Login + ?Sized + 'static,
{
    let token = cancel.clone();
    WorkerPool::new(parallel).run(clients.to_vec(), cancel, move |client: Arc<C>| {
        let cancel = token.clone();
        async move { client.login(&cancel).await }
    })
}

/// Open the change stream of every client, `parallel` at a time
pub fn connect_clients<C>(
    clients: &[Arc<C>],
    parallel: usize,
    cancel: &CancellationToken,
) -> mpsc::UnboundedReceiver<Outcome<HttpError>>
where
    C: Connect + ?Sized + 'static,
{
    let token = cancel.clone();
    WorkerPool::new(parallel).run(clients.to_vec(), cancel, move |client: Arc<C>| {
        let cancel = token.clone();
        async move { client.connect(&cancel).await }
    })
}

/// Send `request` from every client, `parallel` at a time
pub fn send_clients<C>(
    clients: &[Arc<C>],
    request: &Request,
    parallel: usize,
    cancel: &CancellationToken,
) -> mpsc::UnboundedReceiver<Outcome<HttpError>>
where
    C: Dispatch + ?Sized + 'static,
{
    let token = cancel.clone();
    let request = request.clone();
    WorkerPool::new(parallel).run(clients.to_vec(), cancel, move |client: Arc<C>| {
        let cancel = token.clone();
        let request = request.clone();
        async move { client.dispatch(request, &cancel).await }
    })
}

/// Wait on every client for `count` changes
///
/// With `since_connect` the changes are counted from the moment the stream
/// was opened, otherwise from now on. The reported duration starts now, or
/// at the connection if that happens later.
pub fn listen_to_clients<C>(
    clients: &[Arc<C>],
    count: u64,
    since_connect: bool,
    cancel: &CancellationToken,
) -> mpsc::UnboundedReceiver<Outcome<HttpError>>
where
    C: Listen + ?Sized + 'static,
{
    let start = Instant::now();

    // Baselines are taken before anything runs, so changes caused by a
    // concurrent write are not missed
    let targets: Vec<(Arc<C>, u64)> = clients
        .iter()
        .map(|client| {
            let total = if since_connect {
                count
            } else {
                client.received() + count
            };
            (client.clone(), total)
        })
        .collect();

    // Every client waits at once, no bound applies here
    let (tx, rx) = mpsc::unbounded_channel();
    for (index, (client, total)) in targets.into_iter().enumerate() {
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WorkError::Cancelled),
                waited = client.wait_for_changes(total, &cancel) => match waited {
                    Ok(()) => Ok(since(start, client.connected_at())),
                    Err(error) if error.is_cancelled() => Err(WorkError::Cancelled),
                    Err(error) => Err(WorkError::Failed(error)),
                },
            };
            let _ = tx.send(Outcome { index, result });
        });
    }

    rx
}

/// Time elapsed since `start`, or since `connected_at` if that is later
fn since(start: Instant, connected_at: Option<Instant>) -> Duration {
    match connected_at {
        Some(connected) if connected > start => connected.elapsed(),
        _ => start.elapsed(),
    }
}
