use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{LocationRepository, MemberRepository};
use crate::models::{
    Coordinates, CurrentLocation, Member, MemberId, MovingState, RepositoryError,
    RepositoryResult,
};

/// Process-local location store used for local runs and tests
#[derive(Default)]
pub struct InMemoryLocationRepository {
    locations: RwLock<HashMap<MemberId, CurrentLocation>>,
}

impl InMemoryLocationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.locations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locations.read().await.is_empty()
    }
}

#[async_trait]
impl LocationRepository for InMemoryLocationRepository {
    #[instrument(skip(self))]
    async fn find_by_member(
        &self,
        member_id: MemberId,
    ) -> RepositoryResult<Option<CurrentLocation>> {
        Ok(self.locations.read().await.get(&member_id).cloned())
    }

    #[instrument(skip(self, location), fields(member_id = location.member_id))]
    async fn create(&self, location: CurrentLocation) -> RepositoryResult<CurrentLocation> {
        let mut locations = self.locations.write().await;

        if locations.contains_key(&location.member_id) {
            return Err(RepositoryError::ConstraintViolation {
                message: format!("Location already exists for member {}", location.member_id),
            });
        }

        locations.insert(location.member_id, location.clone());
        debug!("Stored current location");
        Ok(location)
    }

    #[instrument(skip(self, coordinates))]
    async fn update(
        &self,
        member_id: MemberId,
        coordinates: Coordinates,
    ) -> RepositoryResult<CurrentLocation> {
        let mut locations = self.locations.write().await;

        let location = locations
            .get_mut(&member_id)
            .ok_or(RepositoryError::NotFound)?;
        location.relocate(coordinates);

        debug!("Relocated current location");
        Ok(location.clone())
    }
}

/// Process-local member store used for local runs and tests
#[derive(Default)]
pub struct InMemoryMemberRepository {
    members: RwLock<HashMap<MemberId, Member>>,
}

impl InMemoryMemberRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with members
    pub fn with_members(members: impl IntoIterator<Item = Member>) -> Self {
        let members = members
            .into_iter()
            .map(|member| (member.id, member))
            .collect();
        Self {
            members: RwLock::new(members),
        }
    }
}

#[async_trait]
impl MemberRepository for InMemoryMemberRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, member_id: MemberId) -> RepositoryResult<Option<Member>> {
        Ok(self.members.read().await.get(&member_id).cloned())
    }

    #[instrument(skip(self))]
    async fn update_moving_state(
        &self,
        member_id: MemberId,
        state: MovingState,
    ) -> RepositoryResult<()> {
        let mut members = self.members.write().await;

        let member = members
            .get_mut(&member_id)
            .ok_or(RepositoryError::NotFound)?;
        member.set_moving_state(state);

        debug!("Updated moving state");
        Ok(())
    }

    #[instrument(skip(self, member), fields(member_id = member.id))]
    async fn save(&self, member: Member) -> RepositoryResult<Member> {
        self.members.write().await.insert(member.id, member.clone());
        Ok(member)
    }
}
