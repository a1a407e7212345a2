use anyhow::{Context, Result};
use surge_config::SessionConfig;
use surge_http::{Client, HttpMethod, Request};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run(
    session: &SessionConfig,
    path: &str,
    body: Option<String>,
    method: Option<&str>,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = Client::new(session).context("creating client")?;
    client.login(cancel).await.context("login client")?;

    let method = match method {
        Some(method) => method.parse::<HttpMethod>()?,
        None if body.is_some() => HttpMethod::Post,
        None => HttpMethod::Get,
    };
    let mut request = Request::new(method, path);
    if let Some(body) = body {
        request = request.body(body);
    }

    let start = Instant::now();
    let response = match client.send(request, cancel).await {
        Ok(response) => response,
        Err(error) if error.is_cancelled() => return Ok(()),
        Err(error) => return Err(error).context("sending request"),
    };

    info!(
        "{} {} answered {} after {}ms",
        method,
        path,
        response.status,
        start.elapsed().as_millis()
    );
    println!("{}", response.text());
    Ok(())
}
