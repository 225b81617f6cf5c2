//! Forecast refresh service: config, scheduler and status API.

pub mod config;
pub mod scheduler;
pub mod server;

pub use config::RefresherConfig;
pub use scheduler::{Scheduler, SourceStatus, TickOutcome};
pub use server::ServerState;
