//! System-level modules: logging setup and process signals.

pub mod logging;
pub mod signal;

pub use logging::init_logging;
