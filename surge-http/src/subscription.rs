//! Long-lived change stream counted in the background

use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::errors::{HttpError, HttpResult, StreamError};
use crate::stream::ChangeStream;

#[derive(Debug, Clone, Default)]
struct Progress {
    received: u64,
    error: Option<StreamError>,
}

/// An open autoupdate connection whose changes are counted by a background
/// reader
///
/// Dropping the subscription stops the reader and closes the connection.
#[derive(Debug)]
pub struct Subscription {
    progress: watch::Receiver<Progress>,
    connected_at: Instant,
    _reader: DropGuard,
}

impl Subscription {
    /// Start counting the changes of an open stream
    ///
    /// The reader also stops when `cancel` fires.
    pub fn start(changes: ChangeStream, cancel: &CancellationToken) -> Self {
        let stop = cancel.child_token();
        let (tx, progress) = watch::channel(Progress::default());

        tokio::spawn(read_changes(changes, tx, stop.clone()));

        Self {
            progress,
            connected_at: Instant::now(),
            _reader: stop.drop_guard(),
        }
    }

    /// When the response headers arrived
    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Changes received so far
    pub fn received(&self) -> u64 {
        self.progress.borrow().received
    }

    /// Wait until `total` changes have been received since connecting
    ///
    /// Fails when the stream breaks or ends first.
    pub async fn expect_changes(&self, total: u64, cancel: &CancellationToken) -> HttpResult<()> {
        let mut progress = self.progress.clone();

        let reached = async move {
            let progress = progress
                .wait_for(|p| p.received >= total || p.error.is_some())
                .await
                .map_err(|_| StreamError::Closed)?;

            match &progress.error {
                _ if progress.received >= total => Ok(()),
                Some(error) => Err(error.clone()),
                None => Err(StreamError::Closed),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HttpError::Cancelled),
            reached = reached => reached.map_err(HttpError::from),
        }
    }
}

async fn read_changes(
    mut changes: ChangeStream,
    progress: watch::Sender<Progress>,
    stop: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!("Subscription stopped");
                return;
            }
            next = changes.next() => next,
        };

        match next {
            Some(Ok(_)) => progress.send_modify(|p| p.received += 1),
            Some(Err(error)) => {
                warn!("Subscription failed: {}", error);
                progress.send_modify(|p| p.error = Some(error));
                return;
            }
            None => {
                debug!("Subscription ended by server");
                progress.send_modify(|p| p.error = Some(StreamError::Closed));
                return;
            }
        }
    }
}
