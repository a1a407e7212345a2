//! Measurements run one after another over the same clients

use async_trait::async_trait;
use std::sync::Arc;
use surge_http::{HttpError, Request};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ops::{
    connect_clients, listen_to_clients, login_clients, send_clients, Connect, Dispatch, Listen,
    Login,
};
use crate::pool::Outcome;
use crate::report::TestResult;

/// One measurement over a set of clients, rendered as text
#[async_trait]
pub trait Phase<C>: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, clients: &[Arc<C>], cancel: &CancellationToken) -> String;
}

/// Run `phases` in order and join their reports
///
/// Stops after the phase during which `cancel` fired.
pub async fn run_phases<C>(
    clients: &[Arc<C>],
    phases: &[Box<dyn Phase<C>>],
    cancel: &CancellationToken,
) -> String {
    let mut reports = Vec::with_capacity(phases.len());
    for phase in phases {
        info!("Start {}", phase.name());
        let start = Instant::now();
        reports.push(phase.run(clients, cancel).await);
        info!("{} took {}ms", phase.name(), start.elapsed().as_millis());

        if cancel.is_cancelled() {
            warn!("Cancelled after {}", phase.name());
            break;
        }
    }
    reports.join("\n")
}

/// Feed outcomes into `result` until all arrived or `cancel` fires
pub async fn collect(
    mut outcomes: mpsc::UnboundedReceiver<Outcome<HttpError>>,
    mut result: TestResult,
    cancel: &CancellationToken,
) -> TestResult {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return result,
            outcome = outcomes.recv() => match outcome {
                Some(outcome) => result.record(outcome.result),
                None => return result,
            },
        }
    }
}

/// Logs every client in
#[derive(Debug, Clone, Default)]
pub struct LoginPhase {
    pub parallel: usize,
    pub show_all_errors: bool,
}

#[async_trait]
impl<C> Phase<C> for LoginPhase
where
    C: Login + 'static,
{
    fn name(&self) -> &str {
        "login phase"
    }

    async fn run(&self, clients: &[Arc<C>], cancel: &CancellationToken) -> String {
        let outcomes = login_clients(clients, self.parallel, cancel);
        let result = TestResult::new("Time to log in", self.show_all_errors);
        collect(outcomes, result, cancel).await.render()
    }
}

/// Opens the change stream of every client and waits for its first data
#[derive(Debug, Clone, Default)]
pub struct ConnectPhase {
    pub parallel: usize,
    pub show_all_errors: bool,
}

#[async_trait]
impl<C> Phase<C> for ConnectPhase
where
    C: Connect + Listen + 'static,
{
    fn name(&self) -> &str {
        "connect phase"
    }

    async fn run(&self, clients: &[Arc<C>], cancel: &CancellationToken) -> String {
        let connected = connect_clients(clients, self.parallel, cancel);
        let received = listen_to_clients(clients, 1, true, cancel);

        let (connected, received) = tokio::join!(
            collect(
                connected,
                TestResult::new("Time to establish connection", self.show_all_errors),
                cancel,
            ),
            collect(
                received,
                TestResult::new(
                    "Time until data has been received since the connection",
                    self.show_all_errors,
                ),
                cancel,
            ),
        );
        format!("{}\n{}", connected, received)
    }
}

/// The first `writers` clients send `request`; every client waits for one
/// change per writer
///
/// Expects the clients to be connected.
#[derive(Debug, Clone)]
pub struct WritePhase {
    pub parallel: usize,
    pub show_all_errors: bool,
    pub writers: usize,
    pub request: Request,
}

#[async_trait]
impl<C> Phase<C> for WritePhase
where
    C: Dispatch + Listen + 'static,
{
    fn name(&self) -> &str {
        "write phase"
    }

    async fn run(&self, clients: &[Arc<C>], cancel: &CancellationToken) -> String {
        let mut sent = TestResult::new("Time until all requests have been sent", self.show_all_errors);
        let received = TestResult::new(
            "Time until all responses have been received",
            self.show_all_errors,
        );

        let writers = self.writers.min(clients.len());
        if writers == 0 {
            sent.add_error("no client to send from");
            return format!("{}\n{}", sent, received);
        }

        // Listen first so the baselines predate the first write
        let listening = listen_to_clients(clients, writers as u64, false, cancel);
        let sending = send_clients(&clients[..writers], &self.request, self.parallel, cancel);

        let (sent, received) = tokio::join!(
            collect(sending, sent, cancel),
            collect(listening, received, cancel),
        );
        format!("{}\n{}", sent, received)
    }
}

/// Every client sends `request` once
///
/// Measures until the responses arrived; nobody listens for changes.
#[derive(Debug, Clone)]
pub struct SendPhase {
    pub description: String,
    pub parallel: usize,
    pub show_all_errors: bool,
    pub request: Request,
}

#[async_trait]
impl<C> Phase<C> for SendPhase
where
    C: Dispatch + 'static,
{
    fn name(&self) -> &str {
        "send phase"
    }

    async fn run(&self, clients: &[Arc<C>], cancel: &CancellationToken) -> String {
        let outcomes = send_clients(clients, &self.request, self.parallel, cancel);
        let result = TestResult::new(self.description.clone(), self.show_all_errors);
        collect(outcomes, result, cancel).await.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use surge_http::HttpResult;
    use tokio::sync::watch;

    /// Stand-in for a user; every write on the shared counter is one change
    /// for every connected fake
    struct FakeUser {
        writes: Arc<watch::Sender<u64>>,
        connection: watch::Sender<Option<(Instant, u64)>>,
        broken: bool,
    }

    impl FakeUser {
        fn group(working: usize, broken: usize) -> Vec<Arc<FakeUser>> {
            let writes = Arc::new(watch::Sender::new(0));
            (0..working + broken)
                .map(|i| {
                    Arc::new(FakeUser {
                        writes: writes.clone(),
                        connection: watch::Sender::new(None),
                        broken: i >= working,
                    })
                })
                .collect()
        }

        fn down() -> HttpError {
            HttpError::Status {
                code: 503,
                body: "down".to_string(),
            }
        }
    }

    #[async_trait]
    impl Login for FakeUser {
        async fn login(&self, _cancel: &CancellationToken) -> HttpResult<()> {
            tokio::time::sleep(Duration::from_millis(3)).await;
            if self.broken {
                return Err(Self::down());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Connect for FakeUser {
        async fn connect(&self, _cancel: &CancellationToken) -> HttpResult<()> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.broken {
                return Err(Self::down());
            }
            let base = *self.writes.borrow();
            self.connection.send_replace(Some((Instant::now(), base)));
            Ok(())
        }
    }

    #[async_trait]
    impl Dispatch for FakeUser {
        async fn dispatch(&self, _request: Request, _cancel: &CancellationToken) -> HttpResult<()> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.writes.send_modify(|w| *w += 1);
            Ok(())
        }
    }

    #[async_trait]
    impl Listen for FakeUser {
        fn received(&self) -> u64 {
            match *self.connection.borrow() {
                Some((_, base)) => 1 + *self.writes.borrow() - base,
                None => 0,
            }
        }

        fn connected_at(&self) -> Option<Instant> {
            (*self.connection.borrow()).map(|(at, _)| at)
        }

        async fn wait_for_changes(&self, total: u64, _cancel: &CancellationToken) -> HttpResult<()> {
            if self.broken {
                return Err(HttpError::NotConnected("down".to_string()));
            }
            let mut connection = self.connection.subscribe();
            let base = connection
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|c| *c)
                .map(|(_, base)| base)
                .unwrap_or_default();

            let mut writes = self.writes.subscribe();
            let _ = writes.wait_for(|w| 1 + w - base >= total).await;
            Ok(())
        }
    }

    fn section<'a>(report: &'a str, title: &str) -> &'a str {
        let start = report.find(title).unwrap();
        let rest = &report[start..];
        match rest[1..].find("Time ") {
            Some(end) => &rest[..end + 1],
            None => rest,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_phase() {
        let clients = FakeUser::group(3, 1);
        let phase = LoginPhase {
            parallel: 2,
            show_all_errors: false,
        };

        let report = phase.run(&clients, &CancellationToken::new()).await;
        assert!(report.starts_with("Time to log in\ncount: 3\n"));
        assert!(report.ends_with("error count: 1\nfirst error: got status 503: down\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_phase() {
        let clients = FakeUser::group(3, 1);
        let phase = ConnectPhase {
            parallel: 0,
            show_all_errors: true,
        };

        let report = phase.run(&clients, &CancellationToken::new()).await;

        let connected = section(&report, "Time to establish connection");
        assert!(connected.contains("count: 3\nmin: 10ms\nmax: 10ms\n"));
        assert!(connected.contains("error count: 1\n  1 error: got status 503: down\n"));

        let received = section(&report, "Time until data has been received");
        assert!(received.contains("count: 3\nmin: 0ms\nmax: 0ms\n"));
        assert!(received.contains("error count: 1\n"));
        assert!(clients[..3].iter().all(|c| c.received() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_phase_waits_for_every_write() {
        let clients = FakeUser::group(4, 0);
        let cancel = CancellationToken::new();
        ConnectPhase::default().run(&clients, &cancel).await;

        let phase = WritePhase {
            parallel: 1,
            show_all_errors: false,
            writers: 2,
            request: Request::post("/system/action/handle_request"),
        };
        let report = phase.run(&clients, &cancel).await;

        let sent = section(&report, "Time until all requests have been sent");
        assert!(sent.contains("count: 2\nmin: 5ms\nmax: 5ms\n"));

        let received = section(&report, "Time until all responses have been received");
        assert!(received.contains("count: 4\nmin: 10ms\nmax: 10ms\n"));
        assert!(!received.contains("error"));
        assert!(clients.iter().all(|c| c.received() == 3));
    }

    #[tokio::test]
    async fn test_write_phase_without_writers() {
        let clients = FakeUser::group(2, 0);
        let phase = WritePhase {
            parallel: 1,
            show_all_errors: false,
            writers: 0,
            request: Request::post("/system/action/handle_request"),
        };

        let report = phase.run(&clients, &CancellationToken::new()).await;
        assert!(report.contains("first error: no client to send from"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_phase_sends_from_everyone() {
        let clients = FakeUser::group(5, 0);
        let phase = SendPhase {
            description: "Time until all votes have been sent".to_string(),
            parallel: 2,
            show_all_errors: false,
            request: Request::post("/system/vote?id=1"),
        };

        let report = phase.run(&clients, &CancellationToken::new()).await;
        assert!(report.starts_with("Time until all votes have been sent
count: 5
min: 5ms
"));
        assert_eq!(*clients[0].writes.borrow(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_phases_joins_reports() {
        let clients = FakeUser::group(2, 0);
        let phases: Vec<Box<dyn Phase<FakeUser>>> = vec![
            Box::new(LoginPhase::default()),
            Box::new(ConnectPhase::default()),
        ];

        let report = run_phases(&clients, &phases, &CancellationToken::new()).await;
        assert!(report.starts_with("Time to log in\n"));
        assert!(report.contains("mean: 3ms\n\nTime to establish connection\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_phases_stops_when_cancelled() {
        let clients = FakeUser::group(2, 0);
        let phases: Vec<Box<dyn Phase<FakeUser>>> = vec![
            Box::new(LoginPhase::default()),
            Box::new(ConnectPhase::default()),
        ];

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = run_phases(&clients, &phases, &cancel).await;

        assert!(report.starts_with("Time to log in\ncount: 0\n"));
        assert!(!report.contains("Time to establish connection"));
        assert!(clients.iter().all(|c| c.connected_at().is_none()));
    }
}
