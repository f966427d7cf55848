//! Execution modes
//!
//! Only the HTTP server runs long-lived; `generate-config` is handled
//! directly in `main`.

pub mod server;

pub use server::run_server;
