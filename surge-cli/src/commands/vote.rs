use anyhow::{bail, Context, Result};
use serde_json::json;
use std::sync::Arc;
use surge_config::SessionConfig;
use surge_http::{fqfield, ChangeSet, Client, Request};
use surge_runner::{LoginPhase, Phase, SendPhase, SimulatedClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

const VOTE_PATH: &str = "/system/vote";

pub struct VoteOptions {
    pub amount: usize,
    pub poll_id: u64,
    pub basename: String,
    pub users_password: String,
    pub interrupt: bool,
    pub repeat: bool,
}

/// What a vote on a poll needs to know about it
#[derive(Debug, PartialEq, Eq)]
struct Poll {
    meeting_id: u64,
    option_id: u64,
}

pub async fn run(session: &SessionConfig, options: VoteOptions, cancel: &CancellationToken) -> Result<()> {
    let admin = Client::new(session).context("creating admin client")?;
    admin.login(cancel).await.context("login admin")?;

    let poll = fetch_poll(&admin, options.poll_id, cancel)
        .await
        .context("getting poll data")?;
    info!(
        "Poll {} in meeting {}, voting for option {}",
        options.poll_id, poll.meeting_id, poll.option_id
    );

    let users = (1..=options.amount)
        .map(|i| {
            let client = Client::new(session).context("creating client")?;
            let username = voter_name(&options.basename, poll.meeting_id, i);
            Ok(Arc::new(
                SimulatedClient::new(client, "[]").with_credentials(username, options.users_password.clone()),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    let login = LoginPhase {
        parallel: 0,
        show_all_errors: false,
    };
    println!("{}", login.run(&users, cancel).await);

    let votes = SendPhase {
        description: "Time until all votes have been sent".to_string(),
        parallel: 0,
        show_all_errors: false,
        request: vote_request(options.poll_id, poll.option_id)?,
    };

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        if (options.interrupt || options.repeat) && !wait_for_enter(cancel).await? {
            return Ok(());
        }

        println!("{}", votes.run(&users, cancel).await);
        if !options.repeat {
            return Ok(());
        }
    }
}

/// Meeting and the single option of the poll
///
/// Encrypted polls are refused; their votes would have to be encrypted
/// with the poll key.
async fn fetch_poll(client: &Client, poll_id: u64, cancel: &CancellationToken) -> Result<Poll> {
    let request = Request::get("/system/autoupdate?single=1").json(&json!([{
        "collection": "poll",
        "ids": [poll_id],
        "fields": {"meeting_id": null, "option_ids": null, "crypt_key": null},
    }]))?;
    let response = client.send(request, cancel).await?;
    let data: ChangeSet = response.json().context("decoding poll data")?;
    parse_poll(&data, poll_id)
}

fn parse_poll(data: &ChangeSet, poll_id: u64) -> Result<Poll> {
    let field = |name: &str| fqfield("poll", poll_id, name);
    let present = || data.keys().collect::<Vec<_>>().join(", ");

    let meeting_id: u64 = data
        .get(&field("meeting_id"))?
        .with_context(|| format!("meeting_id not in response, got [{}]", present()))?;
    let option_ids: Vec<u64> = data
        .get(&field("option_ids"))?
        .with_context(|| format!("option_ids not in response, got [{}]", present()))?;

    let option_id = match option_ids.as_slice() {
        [option_id] => *option_id,
        _ => bail!("poll {} has options {:?}, expected exactly one", poll_id, option_ids),
    };

    let encrypted = data
        .raw(&field("crypt_key"))
        .is_some_and(|key| key.get() != "null");
    if encrypted {
        bail!("poll {} is encrypted, only plain votes are supported", poll_id);
    }

    Ok(Poll {
        meeting_id,
        option_id,
    })
}

/// Generated users of a meeting carry its id as prefix, `m<meeting><basename><n>`
fn voter_name(basename: &str, meeting_id: u64, index: usize) -> String {
    if meeting_id > 0 {
        format!("m{}{}{}", meeting_id, basename, index)
    } else {
        format!("{}{}", basename, index)
    }
}

fn vote_request(poll_id: u64, option_id: u64) -> Result<Request> {
    let mut value = serde_json::Map::new();
    value.insert(option_id.to_string(), json!("Y"));
    Ok(Request::post(format!("{}?id={}", VOTE_PATH, poll_id)).json(&json!({ "value": value }))?)
}

/// False when cancelled or stdin closed
async fn wait_for_enter(cancel: &CancellationToken) -> Result<bool> {
    println!("Hit enter to continue");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        _ = cancel.cancelled() => Ok(false),
        read = stdin.read_line(&mut line) => Ok(read.context("reading stdin")? > 0),
    }
}
