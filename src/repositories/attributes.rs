use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{RepositoryError, RepositoryResult};

/// Read a numeric attribute, failing with `InvalidItem` if absent or unparsable
pub(crate) fn number_attribute<T: std::str::FromStr>(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> RepositoryResult<T> {
    item.get(name)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| RepositoryError::InvalidItem {
            message: format!("Missing or invalid {}", name),
        })
}

/// Read an RFC 3339 timestamp attribute
pub(crate) fn timestamp_attribute(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Option<DateTime<Utc>> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
