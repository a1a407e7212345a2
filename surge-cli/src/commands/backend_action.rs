use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use surge_config::SessionConfig;
use surge_http::{ActionRequest, Client};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Content read from stdin instead of the flag
const FROM_STDIN: &str = "-";

pub async fn run(
    session: &SessionConfig,
    amount: usize,
    name: &str,
    content: String,
    cancel: &CancellationToken,
) -> Result<()> {
    let content = if content == FROM_STDIN {
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("reading content from stdin")?;
        input
    } else {
        content
    };

    let mut action = ActionRequest::new(name);
    for payload in expand_payloads(&content, amount)? {
        action = action.with_data(payload);
    }
    let request = action.into_request()?;

    let client = Client::new(session).context("creating client")?;
    client.login(cancel).await.context("login client")?;

    let start = Instant::now();
    match client.send(request, cancel).await {
        Ok(_) => {}
        Err(error) if error.is_cancelled() => return Ok(()),
        Err(error) => return Err(error).context("sending request"),
    }

    info!(
        "{} with {} payloads done after {}ms",
        name,
        amount,
        start.elapsed().as_millis()
    );
    Ok(())
}

/// One payload per number from 1 to `amount`
///
/// In `template`, `\i` becomes the number and `\u` a fresh random uuid.
fn expand_payloads(template: &str, amount: usize) -> Result<Vec<JsonValue>> {
    (1..=amount)
        .map(|i| {
            let content = template
                .replace(r"\i", &i.to_string())
                .replace(r"\u", &Uuid::new_v4().to_string());
            serde_json::from_str(&content)
                .with_context(|| format!("content {} is not valid json", content))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::DEFAULT_ACTION_CONTENT;
    use serde_json::json;

    #[test]
    fn test_number_is_substituted() {
        let payloads = expand_payloads(r#"{"meeting_id":\i,"title":"t\i"}"#, 3).unwrap();
        assert_eq!(
            payloads,
            vec![
                json!({"meeting_id": 1, "title": "t1"}),
                json!({"meeting_id": 2, "title": "t2"}),
                json!({"meeting_id": 3, "title": "t3"}),
            ]
        );
    }

    #[test]
    fn test_every_payload_gets_its_own_uuid() {
        let payloads = expand_payloads(DEFAULT_ACTION_CONTENT, 2).unwrap();
        let titles: Vec<&str> = payloads
            .iter()
            .map(|payload| payload["title"].as_str().unwrap())
            .collect();

        assert!(titles.iter().all(|title| title.len() == "motion".len() + 36));
        assert_ne!(titles[0], titles[1]);
    }

    #[test]
    fn test_invalid_content() {
        assert!(expand_payloads("{not json", 1).is_err());
        assert!(expand_payloads("{not json", 0).unwrap().is_empty());
    }
}
