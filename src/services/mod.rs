//! Service layer for business logic
//!
//! Services own validation and orchestration; handlers only translate
//! between HTTP and these calls.

mod analytics_service;
mod artist_service;
mod platform_links;
mod short_link_service;
mod smart_link_service;
mod tracking_service;

pub use analytics_service::*;
pub use artist_service::*;
pub use platform_links::*;
pub use short_link_service::*;
pub use smart_link_service::*;
pub use tracking_service::*;
