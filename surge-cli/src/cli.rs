//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default request of `connect`: the committee names of the organization
pub const DEFAULT_CONNECT_BODY: &str = r#"[{"collection":"organization","ids":[1],"fields":{"committee_ids":{"type":"relation-list","collection":"committee","fields":{"name":null}}}}]"#;

/// Default payload of `backend-action`, one motion per payload
pub const DEFAULT_ACTION_CONTENT: &str = r#"{"meeting_id":2,"text":"hello world","title":"motion\u"}"#;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load testing for autoupdate servers", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one logged in request and print the response
    Request {
        /// Path or URL of the request
        path: String,

        /// Request body; switches the default method to POST
        #[arg(long, short, value_name = "JSON")]
        body: Option<String>,

        /// HTTP method
        #[arg(long, short, value_name = "METHOD")]
        method: Option<String>,
    },

    /// Keep autoupdate connections open and count their changes
    Connect {
        /// Number of connections
        #[arg(long, short, default_value_t = 10)]
        amount: usize,

        /// Autoupdate request body
        #[arg(long, short, value_name = "JSON")]
        body: Option<String>,

        /// Ask the server not to send the current data first
        #[arg(long)]
        skip_first: bool,
    },

    /// Log in many generated users at once
    Login {
        /// Number of users
        #[arg(long, short, default_value_t = 10)]
        amount: usize,

        /// Logins in flight at the same time, 0 for all
        #[arg(long, short, default_value_t = 0)]
        parallel: usize,

        /// Users are named <basename><n>, starting with 1
        #[arg(long, default_value = "dummy")]
        basename: String,

        /// Password of every generated user
        #[arg(long, value_name = "PASSWORD", default_value = "pass")]
        users_password: String,
    },

    /// Call one backend action with many payloads
    ///
    /// In the content `\i` becomes the number of the payload, starting with
    /// 1, and `\u` a random uuid. A content of "-" is read from stdin.
    BackendAction {
        /// Number of payloads
        #[arg(long, short = 'n', default_value_t = 10)]
        amount: usize,

        /// Name of the action
        #[arg(long, short = 'a', default_value = "motion.create")]
        name: String,

        /// Payload template
        #[arg(long, short, value_name = "JSON", default_value = DEFAULT_ACTION_CONTENT)]
        content: String,
    },

    /// Send a vote from many generated users at once
    ///
    /// The users must exist; the poll must be unencrypted and have one option.
    Vote {
        /// Number of users
        #[arg(long, short = 'n', default_value_t = 10)]
        amount: usize,

        /// Poll to vote on
        #[arg(long, short = 'i', default_value_t = 1)]
        poll_id: u64,

        /// Users are named m<meeting><basename><n>
        #[arg(long, default_value = "dummy")]
        basename: String,

        /// Password of every generated user
        #[arg(long, value_name = "PASSWORD", default_value = "pass")]
        users_password: String,

        /// Wait for enter after the login
        #[arg(long)]
        interrupt: bool,

        /// Vote again after every enter, with the same users
        #[arg(long = "loop")]
        repeat: bool,
    },

    /// Measure connecting and writing with many clients
    Test {
        /// Number of clients
        #[arg(long, short, default_value_t = 10)]
        clients: usize,

        /// Operations in flight at the same time, 0 for all
        #[arg(long, short, default_value_t = 0)]
        parallel: usize,

        /// Clients that send the write request
        #[arg(long, default_value_t = 1)]
        writers: usize,

        /// Action sent by every writer
        #[arg(long, value_name = "JSON")]
        action: Option<String>,

        /// Autoupdate request body of every client
        #[arg(long, short, value_name = "JSON")]
        body: Option<String>,

        /// Print every error instead of the first one
        #[arg(long)]
        show_all_errors: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "surge",
            "login",
            "--amount",
            "3",
            "--log-level",
            "debug",
            "--config",
            "surge.yaml",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("surge.yaml")));
        match cli.command {
            Commands::Login {
                amount,
                parallel,
                basename,
                ..
            } => {
                assert_eq!(amount, 3);
                assert_eq!(parallel, 0);
                assert_eq!(basename, "dummy");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_backend_action_defaults() {
        let cli = Cli::try_parse_from(["surge", "backend-action", "-n", "3"]).unwrap();
        match cli.command {
            Commands::BackendAction {
                amount,
                name,
                content,
            } => {
                assert_eq!(amount, 3);
                assert_eq!(name, "motion.create");
                assert_eq!(content, DEFAULT_ACTION_CONTENT);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_vote_flags() {
        let cli = Cli::try_parse_from(["surge", "vote", "-n", "100", "-i", "42", "--loop"]).unwrap();
        match cli.command {
            Commands::Vote {
                amount,
                poll_id,
                repeat,
                interrupt,
                ..
            } => {
                assert_eq!(amount, 100);
                assert_eq!(poll_id, 42);
                assert!(repeat);
                assert!(!interrupt);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_request_requires_path() {
        assert!(Cli::try_parse_from(["surge", "request"]).is_err());

        let cli = Cli::try_parse_from(["surge", "request", "/system/presenter/handle_request", "-b", "[]"])
            .unwrap();
        match cli.command {
            Commands::Request { path, body, method } => {
                assert_eq!(path, "/system/presenter/handle_request");
                assert_eq!(body.as_deref(), Some("[]"));
                assert_eq!(method, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
