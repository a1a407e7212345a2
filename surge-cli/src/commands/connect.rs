use anyhow::{Context, Result};
use futures::future::join_all;
use std::time::Duration;
use surge_config::SessionConfig;
use surge_http::{Client, Subscription, AUTOUPDATE_PATH};
use surge_resilience::{RetryError, RetryExecutor, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CONNECT_ATTEMPTS: u32 = 100;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

pub async fn run(
    session: &SessionConfig,
    amount: usize,
    body: String,
    skip_first: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = Client::new(session).context("creating client")?;
    client.login(cancel).await.context("login client")?;

    let path = if skip_first {
        format!("{}?skip_first=1", AUTOUPDATE_PATH)
    } else {
        AUTOUPDATE_PATH.to_string()
    };

    let retry = RetryExecutor::from_policy(&RetryPolicy::fixed(CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY));
    let opened =
        join_all((0..amount).map(|i| open(&client, &retry, i, &path, &body, cancel))).await;
    let subscriptions: Vec<Subscription> = opened.into_iter().flatten().collect();
    info!("{} of {} connections open", subscriptions.len(), amount);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last = Vec::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let counts = per_change(&subscriptions);
        for (i, count) in counts.iter().enumerate() {
            if last.get(i) != Some(count) {
                println!("change {}: {}/{}", i + 1, count, amount);
            }
        }
        last = counts;
    }
}

/// Open one connection, retrying every second
async fn open(
    client: &Client,
    retry: &RetryExecutor,
    index: usize,
    path: &str,
    body: &str,
    cancel: &CancellationToken,
) -> Option<Subscription> {
    let opened = retry
        .execute(cancel, move |attempt| {
            debug!(attempt, "Opening connection {}", index);
            client.subscribe(path, body.to_string(), cancel)
        })
        .await;

    match opened {
        Ok(subscription) => Some(subscription),
        Err(RetryError::Cancelled) => None,
        Err(error) => {
            warn!("Can not open connection {}: {}", index, error);
            None
        }
    }
}

/// For the n-th change, how many connections have received it
fn per_change(subscriptions: &[Subscription]) -> Vec<usize> {
    let received: Vec<u64> = subscriptions.iter().map(Subscription::received).collect();
    let most = received.iter().copied().max().unwrap_or(0);
    (0..most)
        .map(|change| received.iter().filter(|&&r| r > change).count())
        .collect()
}
