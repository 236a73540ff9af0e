use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    validate_member_id, Coordinates, CurrentLocation, CurrentLocationResponse, Member, MemberId,
    RepositoryError, ServiceError, ServiceResult, Validate,
};
use crate::repositories::{LocationRepository, MemberRepository};

/// Operations on the current-location resource
#[async_trait]
pub trait LocationService: Send + Sync {
    /// Record the first known position of a member
    async fn create(&self, member_id: MemberId, latitude: f64, longitude: f64)
        -> ServiceResult<()>;

    /// Move a member's existing record
    async fn update(&self, member_id: MemberId, latitude: f64, longitude: f64)
        -> ServiceResult<()>;

    /// Read `child_id`'s position on behalf of `member_id`
    async fn read(
        &self,
        member_id: MemberId,
        child_id: MemberId,
    ) -> ServiceResult<CurrentLocationResponse>;
}

/// Repository-backed location service
pub struct CurrentLocationService {
    locations: Arc<dyn LocationRepository>,
    members: Arc<dyn MemberRepository>,
}

impl CurrentLocationService {
    pub fn new(locations: Arc<dyn LocationRepository>, members: Arc<dyn MemberRepository>) -> Self {
        Self { locations, members }
    }

    fn coordinates(latitude: f64, longitude: f64) -> ServiceResult<Coordinates> {
        let coordinates = Coordinates::new(latitude, longitude);
        coordinates.validate()?;
        Ok(coordinates)
    }

    async fn require_member(&self, member_id: MemberId) -> ServiceResult<Member> {
        self.members
            .find_by_id(member_id)
            .await?
            .ok_or(ServiceError::MemberNotFound { member_id })
    }
}

#[async_trait]
impl LocationService for CurrentLocationService {
    #[instrument(skip(self))]
    async fn create(
        &self,
        member_id: MemberId,
        latitude: f64,
        longitude: f64,
    ) -> ServiceResult<()> {
        crate::info_with_trace!("Creating current location");

        validate_member_id(member_id)?;
        let coordinates = Self::coordinates(latitude, longitude)?;
        self.require_member(member_id).await?;

        match self
            .locations
            .create(CurrentLocation::new(member_id, coordinates))
            .await
        {
            Ok(_) => {
                crate::info_with_trace!("Current location created");
                Ok(())
            }
            Err(RepositoryError::ConstraintViolation { .. }) => {
                crate::warn_with_trace!("Current location already exists");
                Err(ServiceError::LocationAlreadyExists { member_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn update(
        &self,
        member_id: MemberId,
        latitude: f64,
        longitude: f64,
    ) -> ServiceResult<()> {
        crate::info_with_trace!("Updating current location");

        validate_member_id(member_id)?;
        let coordinates = Self::coordinates(latitude, longitude)?;

        match self.locations.update(member_id, coordinates).await {
            Ok(_) => {
                crate::info_with_trace!("Current location updated");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ServiceError::LocationNotFound { member_id }),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn read(
        &self,
        member_id: MemberId,
        child_id: MemberId,
    ) -> ServiceResult<CurrentLocationResponse> {
        crate::info_with_trace!("Reading current location");

        validate_member_id(child_id)?;
        let requester = self.require_member(member_id).await?;
        let child = self.require_member(child_id).await?;

        if !requester.can_view_location_of(&child) {
            crate::warn_with_trace!("Location read denied");
            return Err(ServiceError::AccessDenied {
                member_id,
                child_id,
            });
        }

        let location = self
            .locations
            .find_by_member(child_id)
            .await?
            .ok_or(ServiceError::LocationNotFound {
                member_id: child_id,
            })?;

        Ok(location.to_response())
    }
}
