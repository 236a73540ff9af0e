use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

use super::attributes::{number_attribute, timestamp_attribute};
use crate::models::{Member, MemberId, MovingState, RepositoryError, RepositoryResult};

/// Trait defining the interface for member data access operations
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find a member by ID
    async fn find_by_id(&self, member_id: MemberId) -> RepositoryResult<Option<Member>>;

    /// Set the moving-state flag; fails with `NotFound` if the member does not exist
    async fn update_moving_state(
        &self,
        member_id: MemberId,
        state: MovingState,
    ) -> RepositoryResult<()>;

    /// Save a member (create or replace)
    async fn save(&self, member: Member) -> RepositoryResult<Member>;
}

/// DynamoDB implementation of the MemberRepository trait
pub struct DynamoDbMemberRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbMemberRepository {
    /// Create a new DynamoDB member repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "aws.remote.service" = "AWS::DynamoDB",
            "aws.remote.operation" = operation,
            "aws.remote.resource.type" = "AWS::DynamoDB::Table",
            "aws.remote.resource.identifier" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
        )
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a Member to DynamoDB attribute values
    pub fn member_to_item(&self, member: &Member) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert(
            "member_id".to_string(),
            AttributeValue::N(member.id.to_string()),
        );
        item.insert("name".to_string(), AttributeValue::S(member.name.clone()));
        item.insert(
            "family_code".to_string(),
            AttributeValue::S(member.family_code.clone()),
        );
        item.insert(
            "moving_state".to_string(),
            AttributeValue::N(member.moving_state.as_flag().to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(member.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(member.updated_at.to_rfc3339()),
        );

        item
    }

    /// Convert a DynamoDB item to a Member
    pub fn item_to_member(&self, item: &HashMap<String, AttributeValue>) -> RepositoryResult<Member> {
        let id = number_attribute::<MemberId>(item, "member_id")?;

        let name = item
            .get("name")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        // Members that never joined a family have no family_code attribute
        let family_code = item
            .get("family_code")
            .and_then(|v| v.as_s().ok())
            .cloned()
            .unwrap_or_default();

        let moving_state = match item.get("moving_state") {
            Some(_) => {
                let flag = number_attribute::<i32>(item, "moving_state")?;
                MovingState::try_from(flag)
                    .map_err(|message| RepositoryError::InvalidItem { message })?
            }
            None => MovingState::Stopped,
        };

        let created_at = timestamp_attribute(item, "created_at").unwrap_or_else(Utc::now);
        let updated_at = timestamp_attribute(item, "updated_at").unwrap_or(created_at);

        Ok(Member {
            id,
            name,
            family_code,
            moving_state,
            created_at,
            updated_at,
        })
    }

    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
                table_name: self.table_name.clone(),
            },
            DynamoDbError::ConditionalCheckFailedException(_) => {
                RepositoryError::ConstraintViolation {
                    message: "Conditional check failed".to_string(),
                }
            }
            DynamoDbError::ProvisionedThroughputExceededException(_)
            | DynamoDbError::RequestLimitExceeded(_) => RepositoryError::RateLimitExceeded,
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl MemberRepository for DynamoDbMemberRepository {
    #[instrument(skip(self), fields(table = %self.table_name, member_id = member_id))]
    async fn find_by_id(&self, member_id: MemberId) -> RepositoryResult<Option<Member>> {
        info!("Finding member");

        let get_span = self.create_dynamodb_span("GetItem");

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("member_id", AttributeValue::N(member_id.to_string()))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => Ok(Some(self.item_to_member(&item)?)),
            None => {
                info!("Member not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, member_id = member_id, state = %state))]
    async fn update_moving_state(
        &self,
        member_id: MemberId,
        state: MovingState,
    ) -> RepositoryResult<()> {
        info!("Updating moving state");

        let update_span = self.create_dynamodb_span("UpdateItem");

        async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("member_id", AttributeValue::N(member_id.to_string()))
                .update_expression("SET moving_state = :moving_state, updated_at = :updated_at")
                .condition_expression("attribute_exists(member_id)")
                .expression_attribute_values(
                    ":moving_state",
                    AttributeValue::N(state.as_flag().to_string()),
                )
                .expression_attribute_values(
                    ":updated_at",
                    AttributeValue::S(Utc::now().to_rfc3339()),
                )
                .send()
                .await
                .map_err(|e| match self.map_dynamodb_error(e.into()) {
                    RepositoryError::ConstraintViolation { .. } => RepositoryError::NotFound,
                    other => other,
                })
        }
        .instrument(update_span)
        .await?;

        info!("Moving state updated successfully");
        Ok(())
    }

    #[instrument(skip(self, member), fields(table = %self.table_name, member_id = member.id))]
    async fn save(&self, member: Member) -> RepositoryResult<Member> {
        info!("Saving member");

        let item = self.member_to_item(&member);

        let put_span = self.create_dynamodb_span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!("Member saved successfully");
        Ok(member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_repository() -> DynamoDbMemberRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("ap-northeast-2"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        DynamoDbMemberRepository::new(
            client,
            "test-members".to_string(),
            "ap-northeast-2".to_string(),
        )
    }

    #[test]
    fn test_member_to_item_conversion() {
        let repo = create_test_repository();
        let mut member = Member::new(5, "minji", "FAM-A");
        member.set_moving_state(MovingState::Moving);

        let item = repo.member_to_item(&member);

        assert_eq!(
            item.get("member_id"),
            Some(&AttributeValue::N("5".to_string()))
        );
        assert_eq!(
            item.get("family_code"),
            Some(&AttributeValue::S("FAM-A".to_string()))
        );
        assert_eq!(
            item.get("moving_state"),
            Some(&AttributeValue::N("1".to_string()))
        );
    }

    #[test]
    fn test_item_to_member_conversion() {
        let repo = create_test_repository();
        let member = Member::new(5, "minji", "FAM-A");

        let item = repo.member_to_item(&member);
        let converted = repo.item_to_member(&item).unwrap();

        assert_eq!(converted.id, 5);
        assert_eq!(converted.name, "minji");
        assert_eq!(converted.family_code, "FAM-A");
        assert_eq!(converted.moving_state, MovingState::Stopped);
    }

    #[test]
    fn test_item_to_member_defaults() {
        let repo = create_test_repository();
        let mut item = HashMap::new();
        item.insert("member_id".to_string(), AttributeValue::N("9".to_string()));

        let member = repo.item_to_member(&item).unwrap();

        assert_eq!(member.id, 9);
        assert!(member.family_code.is_empty());
        assert_eq!(member.moving_state, MovingState::Stopped);
    }

    #[test]
    fn test_item_to_member_invalid_moving_state() {
        let repo = create_test_repository();
        let mut item = HashMap::new();
        item.insert("member_id".to_string(), AttributeValue::N("9".to_string()));
        item.insert("moving_state".to_string(), AttributeValue::N("7".to_string()));

        match repo.item_to_member(&item).unwrap_err() {
            RepositoryError::InvalidItem { message } => {
                assert!(message.contains("Invalid moving state flag"));
            }
            other => panic!("Expected InvalidItem error, got {:?}", other),
        }
    }

    #[test]
    fn test_repository_creation() {
        let repo = create_test_repository();
        assert_eq!(repo.table_name(), "test-members");
    }
}
