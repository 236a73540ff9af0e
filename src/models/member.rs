use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MovingState;

/// Identifier of a member account
pub type MemberId = i64;

/// The subset of a member account this service reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub family_code: String,
    pub moving_state: MovingState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn new(id: MemberId, name: impl Into<String>, family_code: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            family_code: family_code.into(),
            moving_state: MovingState::Stopped,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this member may read `other`'s location.
    ///
    /// Members can always read their own location; otherwise both must belong to the
    /// same, non-empty family.
    pub fn can_view_location_of(&self, other: &Member) -> bool {
        if self.id == other.id {
            return true;
        }
        !self.family_code.is_empty() && self.family_code == other.family_code
    }

    pub fn set_moving_state(&mut self, state: MovingState) {
        self.moving_state = state;
        self.updated_at = Utc::now();
    }
}
