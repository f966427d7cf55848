//! SmartLinker - SmartLink service for music releases
//!
//! This library provides the core functionality for the SmartLinker service:
//! artist and SmartLink management, short links, click tracking with UTM
//! attribution and the analytics built on top of it.
//!
//! # Architecture
//! - `storage`: SeaORM data access (SQLite, PostgreSQL, MySQL)
//! - `cache`: Short-code resolution cache (moka) with a negative cache
//! - `analytics`: Buffered counters flushed in batches
//! - `services`: Business logic
//! - `api`: HTTP services and middleware
//! - `config`: Configuration management
//! - `runtime`: Application lifecycle and execution modes
//! - `system`: Logging and process signals

pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
