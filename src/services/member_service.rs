use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::models::{MemberId, MovingState, RepositoryError, ServiceError, ServiceResult};
use crate::repositories::MemberRepository;

/// Operations on member state owned by this service
#[async_trait]
pub trait MemberService: Send + Sync {
    async fn update_moving_state(&self, member_id: MemberId, state: MovingState)
        -> ServiceResult<()>;
}

/// Repository-backed member service
pub struct MemberStateService {
    members: Arc<dyn MemberRepository>,
}

impl MemberStateService {
    pub fn new(members: Arc<dyn MemberRepository>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl MemberService for MemberStateService {
    #[instrument(skip(self), fields(flag = state.as_flag()))]
    async fn update_moving_state(
        &self,
        member_id: MemberId,
        state: MovingState,
    ) -> ServiceResult<()> {
        match self.members.update_moving_state(member_id, state).await {
            Ok(()) => {
                crate::info_with_trace!(state = %state, "Moving state updated");
                Ok(())
            }
            Err(RepositoryError::NotFound) => Err(ServiceError::MemberNotFound { member_id }),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Member, RepositoryResult};
    use mockall::{mock, predicate::*};

    mock! {
        MemberRepo {}

        #[async_trait]
        impl MemberRepository for MemberRepo {
            async fn find_by_id(&self, member_id: MemberId) -> RepositoryResult<Option<Member>>;
            async fn update_moving_state(&self, member_id: MemberId, state: MovingState) -> RepositoryResult<()>;
            async fn save(&self, member: Member) -> RepositoryResult<Member>;
        }
    }

    #[tokio::test]
    async fn test_update_moving_state() {
        let mut repo = MockMemberRepo::new();
        repo.expect_update_moving_state()
            .with(eq(4), eq(MovingState::Moving))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = MemberStateService::new(Arc::new(repo));

        assert!(service
            .update_moving_state(4, MovingState::Moving)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_update_moving_state_unknown_member() {
        let mut repo = MockMemberRepo::new();
        repo.expect_update_moving_state()
            .returning(|_, _| Err(RepositoryError::NotFound));

        let service = MemberStateService::new(Arc::new(repo));
        let result = service.update_moving_state(4, MovingState::Moving).await;

        assert!(matches!(
            result,
            Err(ServiceError::MemberNotFound { member_id: 4 })
        ));
    }

    #[tokio::test]
    async fn test_update_moving_state_throttled() {
        let mut repo = MockMemberRepo::new();
        repo.expect_update_moving_state()
            .returning(|_, _| Err(RepositoryError::RateLimitExceeded));

        let service = MemberStateService::new(Arc::new(repo));
        let result = service.update_moving_state(4, MovingState::Stopped).await;

        assert!(matches!(
            result,
            Err(ServiceError::Repository {
                source: RepositoryError::RateLimitExceeded
            })
        ));
    }
}
