use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MemberId;

/// A validated latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Latest known position of a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub member_id: MemberId,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CurrentLocation {
    /// Create a new location record stamped with the current time
    pub fn new(member_id: MemberId, coordinates: Coordinates) -> Self {
        let now = Utc::now();
        Self {
            member_id,
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the record to new coordinates
    pub fn relocate(&mut self, coordinates: Coordinates) {
        self.latitude = coordinates.latitude;
        self.longitude = coordinates.longitude;
        self.updated_at = Utc::now();
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Convert to the payload returned to a reader of this member's location
    pub fn to_response(&self) -> CurrentLocationResponse {
        CurrentLocationResponse {
            child_id: self.member_id,
            current_latitude: self.latitude,
            current_longitude: self.longitude,
            updated_at: self.updated_at,
        }
    }
}

/// Body of POST and PATCH `/api/currentLocation`.
///
/// Fields are optional at the serde layer so a missing coordinate surfaces as a
/// validation error naming the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLocationRequest {
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
}

impl CurrentLocationRequest {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            current_latitude: Some(latitude),
            current_longitude: Some(longitude),
        }
    }

    /// Coordinates carried by the request, if both are present
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.current_latitude, self.current_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }
}

/// Payload of GET `/api/currentLocation/{childId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLocationResponse {
    pub child_id: MemberId,
    pub current_latitude: f64,
    pub current_longitude: f64,
    pub updated_at: DateTime<Utc>,
}
