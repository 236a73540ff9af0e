use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, Instrument};

use super::attributes::{number_attribute, timestamp_attribute};
use crate::models::{Coordinates, CurrentLocation, MemberId, RepositoryError, RepositoryResult};

/// Trait defining the interface for current-location data access operations
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Find the location record owned by a member
    async fn find_by_member(&self, member_id: MemberId)
        -> RepositoryResult<Option<CurrentLocation>>;

    /// Store a new record; fails with `ConstraintViolation` if one already exists
    async fn create(&self, location: CurrentLocation) -> RepositoryResult<CurrentLocation>;

    /// Move an existing record; fails with `NotFound` if the member has none
    async fn update(
        &self,
        member_id: MemberId,
        coordinates: Coordinates,
    ) -> RepositoryResult<CurrentLocation>;
}

/// DynamoDB implementation of the LocationRepository trait
pub struct DynamoDbLocationRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbLocationRepository {
    /// Create a new DynamoDB location repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Create a DynamoDB client span with X-Ray compatible attributes
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

    /// Convert a CurrentLocation to DynamoDB attribute values
    pub fn location_to_item(&self, location: &CurrentLocation) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert(
            "member_id".to_string(),
            AttributeValue::N(location.member_id.to_string()),
        );
        item.insert(
            "latitude".to_string(),
            AttributeValue::N(location.latitude.to_string()),
        );
        item.insert(
            "longitude".to_string(),
            AttributeValue::N(location.longitude.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(location.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(location.updated_at.to_rfc3339()),
        );

        item
    }

    /// Convert a DynamoDB item to a CurrentLocation
    pub fn item_to_location(
        &self,
        item: &HashMap<String, AttributeValue>,
    ) -> RepositoryResult<CurrentLocation> {
        let member_id = number_attribute::<MemberId>(item, "member_id")?;
        let latitude = number_attribute::<f64>(item, "latitude")?;
        let longitude = number_attribute::<f64>(item, "longitude")?;

        let created_at =
            timestamp_attribute(item, "created_at").ok_or_else(|| RepositoryError::InvalidItem {
                message: "Invalid created_at".to_string(),
            })?;

        // Records written before updated_at existed fall back to created_at
        let updated_at = timestamp_attribute(item, "updated_at").unwrap_or(created_at);

        Ok(CurrentLocation {
            member_id,
            latitude,
            longitude,
            created_at,
            updated_at,
        })
    }

    /// Convert DynamoDB error to RepositoryError
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
impl LocationRepository for DynamoDbLocationRepository {
    #[instrument(skip(self), fields(table = %self.table_name, member_id = member_id))]
    async fn find_by_member(
        &self,
        member_id: MemberId,
    ) -> RepositoryResult<Option<CurrentLocation>> {
        info!("Finding current location");

        let get_span = self.create_dynamodb_span("GetItem");

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("member_id", AttributeValue::N(member_id.to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => Ok(Some(self.item_to_location(&item)?)),
            None => {
                info!("Current location not found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, location), fields(table = %self.table_name, member_id = location.member_id))]
    async fn create(&self, location: CurrentLocation) -> RepositoryResult<CurrentLocation> {
        info!("Creating current location");

        let item = self.location_to_item(&location);

        let put_span = self.create_dynamodb_span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(member_id)")
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!("Current location created successfully");
        Ok(location)
    }

    #[instrument(skip(self, coordinates), fields(table = %self.table_name, member_id = member_id))]
    async fn update(
        &self,
        member_id: MemberId,
        coordinates: Coordinates,
    ) -> RepositoryResult<CurrentLocation> {
        info!("Updating current location");

        let update_span = self.create_dynamodb_span("UpdateItem");

        let response = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("member_id", AttributeValue::N(member_id.to_string()))
                .update_expression(
                    "SET latitude = :latitude, longitude = :longitude, updated_at = :updated_at",
                )
                .condition_expression("attribute_exists(member_id)")
                .expression_attribute_values(
                    ":latitude",
                    AttributeValue::N(coordinates.latitude.to_string()),
                )
                .expression_attribute_values(
                    ":longitude",
                    AttributeValue::N(coordinates.longitude.to_string()),
                )
                .expression_attribute_values(
                    ":updated_at",
                    AttributeValue::S(Utc::now().to_rfc3339()),
                )
                .return_values(ReturnValue::AllNew)
                .send()
                .await
                .map_err(|e| match self.map_dynamodb_error(e.into()) {
                    RepositoryError::ConstraintViolation { .. } => RepositoryError::NotFound,
                    other => other,
                })
        }
        .instrument(update_span)
        .await?;

        let attributes = response.attributes.ok_or_else(|| RepositoryError::InvalidItem {
            message: "UpdateItem returned no attributes".to_string(),
        })?;

        info!("Current location updated successfully");
        self.item_to_location(&attributes)
    }
}
