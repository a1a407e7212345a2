use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use surge_config::SessionConfig;
use surge_http::{ActionRequest, Client, Request};
use surge_runner::{run_phases, ConnectPhase, LoginPhase, Phase, SimulatedClient, WritePhase};
use tokio_util::sync::CancellationToken;

pub struct TestOptions {
    pub clients: usize,
    pub parallel: usize,
    pub writers: usize,
    pub action: Option<String>,
    pub body: String,
    pub show_all_errors: bool,
}

/// Renames the organization; the name is unique per run so the write is a
/// change
fn default_action() -> Result<Request> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();

    Ok(ActionRequest::new("organization.update")
        .with_data(json!({"id": 1, "name": format!("surge {}", stamp)}))
        .into_request()?)
}

pub async fn run(session: &SessionConfig, options: TestOptions, cancel: &CancellationToken) -> Result<()> {
    let request = match options.action {
        Some(action) => Request::post(ActionRequest::PATH).body(action),
        None => default_action()?,
    };

    let users = (0..options.clients)
        .map(|_| {
            let client = Client::new(session).context("creating client")?;
            Ok(Arc::new(SimulatedClient::new(client, options.body.clone())))
        })
        .collect::<Result<Vec<_>>>()?;

    let phases: Vec<Box<dyn Phase<SimulatedClient>>> = vec![
        Box::new(LoginPhase {
            parallel: options.parallel,
            show_all_errors: options.show_all_errors,
        }),
        Box::new(ConnectPhase {
            parallel: options.parallel,
            show_all_errors: options.show_all_errors,
        }),
        Box::new(WritePhase {
            parallel: options.parallel,
            show_all_errors: options.show_all_errors,
            writers: options.writers,
            request,
        }),
    ];

    println!("{}", run_phases(&users, &phases, cancel).await);
    Ok(())
}
