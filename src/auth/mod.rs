// Auth module - member identity extraction

pub mod middleware;
pub mod token;

pub use middleware::auth_middleware;
pub use token::{MemberClaims, TokenError, TokenVerifier};

use crate::models::MemberId;

/// Identity of the member making the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedMember {
    pub member_id: MemberId,
}
