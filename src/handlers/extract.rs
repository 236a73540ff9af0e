use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::models::{Validate, ValidationError};

/// JSON body extractor that runs [`Validate`] before the handler sees the value
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

/// Path parameter extractor whose rejection carries the JSON error body
#[derive(Debug, Clone, Copy)]
pub struct ValidatedPath<T>(pub T);

/// Why a request was refused before reaching a handler
#[derive(Debug)]
pub enum RequestRejection {
    Json(JsonRejection),
    Path(PathRejection),
    Invalid(ValidationError),
}

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = RequestRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(RequestRejection::Json)?;

        value.validate().map_err(RequestRejection::Invalid)?;
        Ok(ValidatedJson(value))
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = RequestRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(RequestRejection::Path)?;

        Ok(ValidatedPath(value))
    }
}

impl IntoResponse for RequestRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RequestRejection::Json(rejection) => {
                let status = match rejection {
                    JsonRejection::MissingJsonContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, rejection.body_text())
            }
            RequestRejection::Path(rejection) => (rejection.status(), rejection.body_text()),
            RequestRejection::Invalid(error) => (StatusCode::BAD_REQUEST, error.to_string()),
        };

        crate::warn_with_trace!(status = status.as_u16(), reason = %message, "Rejected request");

        (
            status,
            Json(json!({
                "error": message,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })),
        )
            .into_response()
    }
}
