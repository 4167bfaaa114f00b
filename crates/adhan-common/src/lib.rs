//! # Adhan Common
//!
//! Logging configuration shared by the offline worker, the reminder
//! scheduler and the harness binary.

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogConfig, LogFormat, LoggingError};
