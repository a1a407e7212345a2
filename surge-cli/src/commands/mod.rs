//! CLI command implementations

mod backend_action;
mod connect;
mod login;
mod request;
mod test;
mod vote;

use anyhow::Result;
use surge_config::SessionConfig;
use tokio_util::sync::CancellationToken;

use crate::cli::{Commands, DEFAULT_CONNECT_BODY};

pub async fn run(command: Commands, session: &SessionConfig, cancel: &CancellationToken) -> Result<()> {
    match command {
        Commands::Request { path, body, method } => {
            request::run(session, &path, body, method.as_deref(), cancel).await
        }
        Commands::Connect {
            amount,
            body,
            skip_first,
        } => {
            let body = body.unwrap_or_else(|| DEFAULT_CONNECT_BODY.to_string());
            connect::run(session, amount, body, skip_first, cancel).await
        }
        Commands::Login {
            amount,
            parallel,
            basename,
            users_password,
        } => login::run(session, amount, parallel, &basename, &users_password, cancel).await,
        Commands::BackendAction {
            amount,
            name,
            content,
        } => backend_action::run(session, amount, &name, content, cancel).await,
        Commands::Vote {
            amount,
            poll_id,
            basename,
            users_password,
            interrupt,
            repeat,
        } => {
            let options = vote::VoteOptions {
                amount,
                poll_id,
                basename,
                users_password,
                interrupt,
                repeat,
            };
            vote::run(session, options, cancel).await
        }
        Commands::Test {
            clients,
            parallel,
            writers,
            action,
            body,
            show_all_errors,
        } => {
            let options = test::TestOptions {
                clients,
                parallel,
                writers,
                action,
                body: body.unwrap_or_else(|| DEFAULT_CONNECT_BODY.to_string()),
                show_all_errors,
            };
            test::run(session, options, cancel).await
        }
    }
}
