use super::{Coordinates, CurrentLocationRequest, MemberId, ValidationError, ValidationResult};

/// Trait for validating input models
pub trait Validate {
    fn validate(&self) -> ValidationResult<()>;
}

/// Validation constants
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;
pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;

pub const LATITUDE_FIELD: &str = "currentLatitude";
pub const LONGITUDE_FIELD: &str = "currentLongitude";

impl Validate for CurrentLocationRequest {
    fn validate(&self) -> ValidationResult<()> {
        let latitude = self
            .current_latitude
            .ok_or_else(|| ValidationError::RequiredField {
                field: LATITUDE_FIELD.to_string(),
            })?;
        let longitude = self
            .current_longitude
            .ok_or_else(|| ValidationError::RequiredField {
                field: LONGITUDE_FIELD.to_string(),
            })?;

        validate_latitude(latitude)?;
        validate_longitude(longitude)?;
        Ok(())
    }
}

impl Validate for Coordinates {
    fn validate(&self) -> ValidationResult<()> {
        validate_latitude(self.latitude)?;
        validate_longitude(self.longitude)?;
        Ok(())
    }
}

/// Validate a latitude in degrees
pub fn validate_latitude(latitude: f64) -> ValidationResult<()> {
    validate_degrees(LATITUDE_FIELD, latitude, MIN_LATITUDE, MAX_LATITUDE)
}

/// Validate a longitude in degrees
pub fn validate_longitude(longitude: f64) -> ValidationResult<()> {
    validate_degrees(LONGITUDE_FIELD, longitude, MIN_LONGITUDE, MAX_LONGITUDE)
}

fn validate_degrees(field: &str, value: f64, min: f64, max: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Must be a finite number".to_string(),
        });
    }

    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Validate a member identifier taken from a path or a token
pub fn validate_member_id(member_id: MemberId) -> ValidationResult<()> {
    if member_id <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "memberId".to_string(),
            value: member_id.to_string(),
            reason: "Must be a positive integer".to_string(),
        });
    }

    Ok(())
}
