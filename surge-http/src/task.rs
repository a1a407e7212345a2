//! Asynchronous action results
//!
//! When the server accepts an action with `202`, the work runs in an
//! `action_worker` object. The client follows that object on the autoupdate
//! stream until its state becomes `end` or `aborted`.

use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{HttpError, HttpResult, TaskError};
use crate::stream::{fqfield, ChangeStream};
use crate::types::Response;

const ACTION_WORKER: &str = "action_worker";
const STATE_END: &str = "end";
const STATE_ABORTED: &str = "aborted";

type Outcome = Option<Result<Response, TaskError>>;

/// Handle to the result of an action
///
/// Resolves exactly once, to either a response or an error, and keeps that
/// outcome forever. Clones share the same outcome.
#[derive(Debug, Clone)]
pub struct Task {
    outcome: watch::Receiver<Outcome>,
}

impl Task {
    /// Task that finished with the immediate response
    pub fn completed(response: Response) -> Self {
        let (_, outcome) = watch::channel(Some(Ok(response)));
        Self { outcome }
    }

    pub(crate) fn pending() -> (Self, TaskCompleter) {
        let (tx, outcome) = watch::channel(None);
        (Self { outcome }, TaskCompleter { tx })
    }

    pub fn is_done(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// The outcome, if the task is done
    pub fn try_result(&self) -> Option<Result<Response, TaskError>> {
        self.outcome.borrow().clone()
    }

    /// Wait for the outcome
    ///
    /// A task whose poller vanished without an outcome counts as broken.
    pub async fn wait(&self) -> Result<Response, TaskError> {
        let mut outcome = self.outcome.clone();
        let done = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TaskError::StreamBroken)?;
        done.clone().unwrap_or(Err(TaskError::StreamBroken))
    }

    /// Wait for the outcome unless `cancel` fires first
    ///
    /// Giving up does not touch the task; other holders still see its outcome.
    pub async fn wait_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Response, TaskError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TaskError::Cancelled),
            outcome = self.wait() => outcome,
        }
    }
}

/// Write side of a pending [`Task`]
#[derive(Debug)]
pub(crate) struct TaskCompleter {
    tx: watch::Sender<Outcome>,
}

impl TaskCompleter {
    /// Store the outcome unless one is already stored
    pub fn complete(&self, result: Result<Response, TaskError>) -> bool {
        self.tx.send_if_modified(|outcome| {
            if outcome.is_some() {
                return false;
            }
            *outcome = Some(result);
            true
        })
    }

    /// Resolves once every [`Task`] handle is gone
    pub async fn abandoned(&self) {
        self.tx.closed().await
    }
}

/// Keys of the two fields followed for an action worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionWorkerKeys {
    pub id: u64,
    pub state: String,
    pub result: String,
}

impl ActionWorkerKeys {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: fqfield(ACTION_WORKER, id, "state"),
            result: fqfield(ACTION_WORKER, id, "result"),
        }
    }

    /// Body for the autoupdate request following this worker
    pub fn subscription_body(&self) -> serde_json::Value {
        serde_json::json!([{
            "collection": ACTION_WORKER,
            "ids": [self.id],
            "fields": {"state": null, "result": null},
        }])
    }
}

#[derive(Deserialize)]
struct Accepted {
    results: Vec<Vec<AcceptedEntry>>,
}

#[derive(Deserialize)]
struct AcceptedEntry {
    fqid: String,
}

/// Id of the action worker named in a `202` response body
pub fn action_worker_id(body: &[u8]) -> HttpResult<u64> {
    let accepted: Accepted = serde_json::from_slice(body)?;

    let outer = accepted
        .results
        .first()
        .ok_or_else(|| HttpError::InvalidResponse("no outer result list".to_string()))?;
    let entry = outer
        .first()
        .ok_or_else(|| HttpError::InvalidResponse("no inner result list".to_string()))?;

    match entry.fqid.split_once('/') {
        Some((ACTION_WORKER, id)) => id
            .parse()
            .map_err(|_| HttpError::InvalidResponse(format!("wrong action worker id {}", id))),
        _ => Err(HttpError::InvalidResponse(format!(
            "wrong fqid {}",
            entry.fqid
        ))),
    }
}

/// Follow an action worker on `changes` in the background
///
/// The poller stops when the worker reaches a terminal state, the stream
/// ends or every handle of the task is dropped. In the last case nobody is
/// left to read the outcome and the connection is closed. A caller giving up
/// on its wait does not stop the poller while other handles remain.
pub(crate) fn follow_action_worker(changes: ChangeStream, keys: ActionWorkerKeys) -> Task {
    let (task, completer) = Task::pending();

    tokio::spawn(async move {
        let outcome = tokio::select! {
            biased;
            _ = completer.abandoned() => {
                debug!(worker = keys.id, "task dropped, closing autoupdate connection");
                return;
            }
            outcome = watch_worker(changes, &keys) => outcome,
        };

        if let Err(error) = &outcome {
            warn!(worker = keys.id, "action worker failed: {}", error);
        }
        completer.complete(outcome);
    });

    task
}

/// Read changes until the worker reaches a terminal state
///
/// The result may arrive before the final state, so the latest one is kept.
pub(crate) async fn watch_worker(
    mut changes: ChangeStream,
    keys: &ActionWorkerKeys,
) -> Result<Response, TaskError> {
    let mut result = Bytes::new();

    while let Some(change) = changes.next().await {
        let change = change?;

        if let Some(raw) = change.raw(&keys.result) {
            result = Bytes::copy_from_slice(raw.get().as_bytes());
        }

        // A state that is not a string is not terminal
        let state = change.get::<String>(&keys.state).ok().flatten();
        match state.as_deref() {
            Some(STATE_END) => return Ok(Response::ok(result)),
            Some(STATE_ABORTED) => return Err(TaskError::Aborted),
            Some(other) => debug!(worker = keys.id, state = other, "action worker running"),
            None => {}
        }
    }

    Err(TaskError::StreamBroken)
}
