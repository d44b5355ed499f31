//! Individual services which can be launched from the command line

pub mod dispatcher;
pub mod listener;
pub mod publish;
pub mod run;
pub mod tasks;

mod context;
mod options;

pub use context::Context;
pub use options::{ConfigError, SharedOptions, TransportKind, DEFAULT_STATUS_PORT};
