// Repositories module - data access layer

mod attributes;
pub mod location_repository;
pub mod member_repository;
pub mod memory;
pub mod table_manager;

pub use location_repository::{DynamoDbLocationRepository, LocationRepository};
pub use member_repository::{DynamoDbMemberRepository, MemberRepository};
pub use memory::{InMemoryLocationRepository, InMemoryMemberRepository};
pub use table_manager::TableManager;
