//! HTTP layer: middleware, route scopes and handlers

pub mod middleware;
pub mod services;
