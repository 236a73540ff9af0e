use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::models::{RepositoryError, RepositoryResult};

/// Both tables are keyed by the numeric member identifier
const KEY_ATTRIBUTE: &str = "member_id";

const MAX_ACTIVE_CHECKS: u32 = 30;
const ACTIVE_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Manages DynamoDB table creation for local and first-run deployments
pub struct TableManager {
    client: Arc<DynamoDbClient>,
}

impl TableManager {
    /// Create a new table manager
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Create the current-location table
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_locations_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_member_keyed_table(table_name).await
    }

    /// Create the members table
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_members_table(&self, table_name: &str) -> RepositoryResult<()> {
        self.create_member_keyed_table(table_name).await
    }

    /// Create both tables concurrently
    #[instrument(skip(self))]
    pub async fn create_all_tables(
        &self,
        locations_table: &str,
        members_table: &str,
    ) -> RepositoryResult<()> {
        info!("Creating all tables");

        let (locations_result, members_result) = tokio::join!(
            self.create_locations_table(locations_table),
            self.create_members_table(members_table)
        );

        locations_result?;
        members_result?;

        info!("All tables ready");
        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => Ok(true),
            Err(e) => match DynamoDbError::from(e) {
                DynamoDbError::ResourceNotFoundException(_) => {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                }
                other => {
                    error!("Error checking table existence: {}", other);
                    Err(RepositoryError::ConnectionFailed)
                }
            },
        }
    }

    async fn create_member_keyed_table(&self, table_name: &str) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        info!("Creating table {}", table_name);

        let attribute_definition = AttributeDefinition::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .attribute_type(ScalarAttributeType::N)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build attribute definition: {}", e),
            })?;

        let key_schema = KeySchemaElement::builder()
            .attribute_name(KEY_ATTRIBUTE)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build key schema: {}", e),
            })?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(attribute_definition)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| self.map_dynamodb_error(e.into()))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(table_name).await?;
        info!("Table {} created successfully", table_name);

        Ok(())
    }

    #[instrument(skip(self), fields(table_name = %table_name))]
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for _ in 0..MAX_ACTIVE_CHECKS {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(ACTIVE_CHECK_INTERVAL).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }

    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);
        RepositoryError::AwsSdk {
            message: error.to_string(),
        }
    }
}
