// Services module - business logic layer

pub mod location_service;
pub mod member_service;

pub use location_service::{CurrentLocationService, LocationService};
pub use member_service::{MemberService, MemberStateService};
