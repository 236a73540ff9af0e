use thiserror::Error;

use super::MemberId;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Member not found: {member_id}")]
    MemberNotFound { member_id: MemberId },

    #[error("Current location not found for member: {member_id}")]
    LocationNotFound { member_id: MemberId },

    #[error("Current location already exists for member: {member_id}")]
    LocationAlreadyExists { member_id: MemberId },

    #[error("Access denied: member={member_id} cannot read location of member={child_id}")]
    AccessDenied {
        member_id: MemberId,
        child_id: MemberId,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid item: {message}")]
    InvalidItem { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors for input data
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Invalid field value: {field}={value}, reason={reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Value out of range: {field}, min={min}, max={max}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
