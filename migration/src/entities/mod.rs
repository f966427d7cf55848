pub mod artist;
pub mod short_link;
pub mod short_link_access_stat;
pub mod smart_link;
pub mod smart_link_platform_click;
pub mod url_tracking;

pub use artist::Entity as ArtistEntity;
pub use short_link::Entity as ShortLinkEntity;
pub use short_link_access_stat::Entity as ShortLinkAccessStatEntity;
pub use smart_link::Entity as SmartLinkEntity;
pub use smart_link_platform_click::Entity as SmartLinkPlatformClickEntity;
pub use url_tracking::Entity as UrlTrackingEntity;
