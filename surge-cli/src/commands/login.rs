use anyhow::{Context, Result};
use std::sync::Arc;
use surge_config::SessionConfig;
use surge_http::Client;
use surge_runner::{LoginPhase, Phase, SimulatedClient};
use tokio_util::sync::CancellationToken;

pub async fn run(
    session: &SessionConfig,
    amount: usize,
    parallel: usize,
    basename: &str,
    password: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let users = (1..=amount)
        .map(|i| {
            let client = Client::new(session).context("creating client")?;
            let user = SimulatedClient::new(client, "[]")
                .with_credentials(format!("{}{}", basename, i), password);
            Ok(Arc::new(user))
        })
        .collect::<Result<Vec<_>>>()?;

    let phase = LoginPhase {
        parallel,
        show_all_errors: false,
    };
    println!("{}", phase.run(&users, cancel).await);
    Ok(())
}
