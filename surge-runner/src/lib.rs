//! Surge load runner
//!
//! Fans one operation out over many simulated clients with bounded
//! concurrency, streams a duration or an error per client back, and turns
//! those into summary reports. Phases combine the fan-outs into the
//! connect and write measurements.

pub mod error;
pub mod ops;
pub mod phase;
pub mod pool;
pub mod report;
pub mod user;

// Re-export main types
pub use error::WorkError;
pub use ops::{
    connect_clients, listen_to_clients, login_clients, send_clients, Connect, Dispatch, Listen,
    Login,
};
pub use phase::{
    collect, run_phases, ConnectPhase, LoginPhase, Phase, SendPhase, WritePhase,
};
pub use pool::{Outcome, WorkerPool};
pub use report::TestResult;
pub use user::SimulatedClient;
