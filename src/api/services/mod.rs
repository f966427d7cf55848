pub mod admin;
pub mod health;
pub mod public;
pub mod redirect;

pub use health::{AppStartTime, HealthService, health_routes};
pub use public::public_v1_routes;
pub use redirect::{RedirectService, redirect_routes};
