//! Logging utilities.
//!
//! Centralizes logger initialization. The engine itself only talks to the
//! `log` facade; `env_logger` is installed by the host.

mod init;

pub use init::{DEFAULT_FILTER, LoggingConfig, init_logging};
