use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use super::{request_validation_middleware, ValidatedJson, ValidatedPath};
use crate::auth::{auth_middleware, AuthenticatedMember, TokenVerifier};
use crate::models::{
    CurrentLocationRequest, CurrentLocationResponse, MemberId, MovingState, RepositoryError,
    ServiceError,
};
use crate::observability::BusinessTracingMiddleware;
use crate::services::{LocationService, MemberService};

/// Collaborators of the current-location endpoints
#[derive(Clone)]
pub struct LocationApiState {
    pub location_service: Arc<dyn LocationService>,
    pub member_service: Arc<dyn MemberService>,
    pub tracing: Arc<BusinessTracingMiddleware>,
}

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

/// Routes under `/api/currentLocation`, all behind token authentication.
///
/// Authentication runs before body validation, so an anonymous request is
/// answered with 401 whatever its content type.
pub fn create_location_router(
    state: LocationApiState,
    verifier: Arc<TokenVerifier>,
    max_request_size: usize,
) -> Router {
    Router::new()
        .route(
            "/api/currentLocation",
            post(create_current_location).patch(update_current_location),
        )
        .route("/api/currentLocation/:child_id", get(read_current_location))
        .route_layer(from_fn(move |req, next| {
            request_validation_middleware(max_request_size, req, next)
        }))
        .route_layer(from_fn_with_state(verifier, auth_middleware))
        .with_state(state)
}

/// Record the caller's first position and mark them as moving
#[instrument(name = "create_current_location", skip_all, fields(member_id = member.member_id))]
pub async fn create_current_location(
    State(state): State<LocationApiState>,
    Extension(member): Extension<AuthenticatedMember>,
    ValidatedJson(request): ValidatedJson<CurrentLocationRequest>,
) -> ApiResult<StatusCode> {
    let member_id = member.member_id;
    let (latitude, longitude) = coordinates_of(&request)?;

    state
        .tracing
        .trace_location_operation(
            "create",
            member_id,
            state.location_service.create(member_id, latitude, longitude),
        )
        .await
        .map_err(service_error_to_response)?;

    // The location stays stored if this second write fails
    state
        .tracing
        .trace_moving_state_update(
            member_id,
            MovingState::Moving,
            state
                .member_service
                .update_moving_state(member_id, MovingState::Moving),
        )
        .await
        .map_err(|e| {
            crate::warn_with_trace!(error = %e, "Location created but moving state was not updated");
            service_error_to_response(e)
        })?;

    Ok(StatusCode::OK)
}

/// Move the caller's stored position
#[instrument(name = "update_current_location", skip_all, fields(member_id = member.member_id))]
pub async fn update_current_location(
    State(state): State<LocationApiState>,
    Extension(member): Extension<AuthenticatedMember>,
    ValidatedJson(request): ValidatedJson<CurrentLocationRequest>,
) -> ApiResult<StatusCode> {
    let member_id = member.member_id;
    let (latitude, longitude) = coordinates_of(&request)?;

    state
        .tracing
        .trace_location_operation(
            "update",
            member_id,
            state.location_service.update(member_id, latitude, longitude),
        )
        .await
        .map_err(service_error_to_response)?;

    Ok(StatusCode::OK)
}

/// Read a family member's position
#[instrument(name = "read_current_location", skip_all, fields(member_id = member.member_id, child_id = child_id))]
pub async fn read_current_location(
    State(state): State<LocationApiState>,
    Extension(member): Extension<AuthenticatedMember>,
    ValidatedPath(child_id): ValidatedPath<MemberId>,
) -> ApiResult<Json<CurrentLocationResponse>> {
    let response = state
        .tracing
        .trace_location_operation(
            "read",
            member.member_id,
            state.location_service.read(member.member_id, child_id),
        )
        .await
        .map_err(service_error_to_response)?;

    Ok(Json(response))
}

/// `ValidatedJson` already enforced presence; this only unpacks the pair.
fn coordinates_of(request: &CurrentLocationRequest) -> ApiResult<(f64, f64)> {
    request
        .coordinates()
        .map(|c| (c.latitude, c.longitude))
        .ok_or_else(|| {
            service_error_to_response(ServiceError::ValidationError {
                message: "currentLatitude and currentLongitude are required".to_string(),
            })
        })
}

/// Convert service errors to HTTP responses
pub fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        ServiceError::MemberNotFound { .. } | ServiceError::LocationNotFound { .. } => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        ServiceError::AccessDenied { .. } => (StatusCode::FORBIDDEN, err.to_string()),
        ServiceError::LocationAlreadyExists { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::ValidationError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::Repository { source } => match source {
            RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
            RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            RepositoryError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "Request timeout".to_string())
            }
            RepositoryError::RateLimitExceeded => (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
        ServiceError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration error".to_string(),
        ),
    };

    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceResult;
    use crate::observability::Metrics;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use chrono::{Duration, Utc};
    use mockall::{mock, predicate::*};
    use tower::ServiceExt;

    mock! {
        Locations {}

        #[async_trait]
        impl LocationService for Locations {
            async fn create(&self, member_id: MemberId, latitude: f64, longitude: f64) -> ServiceResult<()>;
            async fn update(&self, member_id: MemberId, latitude: f64, longitude: f64) -> ServiceResult<()>;
            async fn read(&self, member_id: MemberId, child_id: MemberId) -> ServiceResult<CurrentLocationResponse>;
        }
    }

    mock! {
        Members {}

        #[async_trait]
        impl MemberService for Members {
            async fn update_moving_state(&self, member_id: MemberId, state: MovingState) -> ServiceResult<()>;
        }
    }

    const SECRET: &[u8] = b"handler-test-secret";

    fn router(locations: MockLocations, members: MockMembers) -> Router {
        let state = LocationApiState {
            location_service: Arc::new(locations),
            member_service: Arc::new(members),
            tracing: Arc::new(BusinessTracingMiddleware::new(Arc::new(
                Metrics::new().unwrap(),
            ))),
        };
        create_location_router(state, Arc::new(TokenVerifier::new(SECRET, 0)), 64 * 1024)
    }

    fn bearer(member_id: MemberId) -> String {
        let token = TokenVerifier::new(SECRET, 0)
            .issue(member_id, Duration::minutes(5))
            .unwrap();
        format!("Bearer {}", token)
    }

    fn json_request(method: &str, member_id: MemberId, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri("/api/currentLocation")
            .header(header::AUTHORIZATION, bearer(member_id))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> axum::body::Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_calls_location_then_moving_state() {
        let mut seq = mockall::Sequence::new();
        let mut locations = MockLocations::new();
        locations
            .expect_create()
            .with(eq(7), eq(37.5), eq(127.0))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(()));

        let mut members = MockMembers::new();
        members
            .expect_update_moving_state()
            .with(eq(7), eq(MovingState::Moving))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let response = router(locations, members)
            .oneshot(json_request(
                "POST",
                7,
                r#"{"currentLatitude":37.5,"currentLongitude":127.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_skips_moving_state() {
        let mut locations = MockLocations::new();
        locations
            .expect_create()
            .times(1)
            .returning(|member_id, _, _| Err(ServiceError::LocationAlreadyExists { member_id }));

        let mut members = MockMembers::new();
        members.expect_update_moving_state().times(0);

        let response = router(locations, members)
            .oneshot(json_request(
                "POST",
                7,
                r#"{"currentLatitude":37.5,"currentLongitude":127.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_create_moving_state_failure_is_reported() {
        let mut locations = MockLocations::new();
        locations.expect_create().times(1).returning(|_, _, _| Ok(()));

        let mut members = MockMembers::new();
        members
            .expect_update_moving_state()
            .times(1)
            .returning(|_, _| Err(RepositoryError::ConnectionFailed.into()));

        let response = router(locations, members)
            .oneshot(json_request(
                "POST",
                7,
                r#"{"currentLatitude":37.5,"currentLongitude":127.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_update_makes_no_member_calls() {
        let mut locations = MockLocations::new();
        locations
            .expect_update()
            .with(eq(7), eq(35.1), eq(129.0))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut members = MockMembers::new();
        members.expect_update_moving_state().times(0);

        let response = router(locations, members)
            .oneshot(json_request(
                "PATCH",
                7,
                r#"{"currentLatitude":35.1,"currentLongitude":129.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_body_never_reaches_service() {
        let mut locations = MockLocations::new();
        locations.expect_create().times(0);
        let mut members = MockMembers::new();
        members.expect_update_moving_state().times(0);

        let response = router(locations, members)
            .oneshot(json_request(
                "POST",
                7,
                r#"{"currentLatitude":37.5,"currentLongitude":-181.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_read_returns_payload() {
        let mut locations = MockLocations::new();
        locations
            .expect_read()
            .with(eq(1), eq(2))
            .times(1)
            .returning(|_, child_id| {
                Ok(CurrentLocationResponse {
                    child_id,
                    current_latitude: 37.5,
                    current_longitude: 127.0,
                    updated_at: Utc::now(),
                })
            });

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .uri("/api/currentLocation/2")
                    .header(header::AUTHORIZATION, bearer(1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["childId"], 2);
        assert_eq!(json["currentLatitude"], 37.5);
        assert_eq!(json["currentLongitude"], 127.0);
    }

    #[tokio::test]
    async fn test_read_unrelated_member_leaks_nothing() {
        let mut locations = MockLocations::new();
        locations.expect_read().returning(|member_id, child_id| {
            Err(ServiceError::AccessDenied {
                member_id,
                child_id,
            })
        });

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .uri("/api/currentLocation/42")
                    .header(header::AUTHORIZATION, bearer(3))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json.get("currentLatitude").is_none());
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_missing_token_never_reaches_service() {
        let mut locations = MockLocations::new();
        locations.expect_read().times(0);

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .uri("/api/currentLocation/2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_numeric_child_id_is_json_error() {
        let mut locations = MockLocations::new();
        locations.expect_read().times(0);

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .uri("/api/currentLocation/abc")
                    .header(header::AUTHORIZATION, bearer(1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json["error"].as_str().unwrap().contains("abc"));
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_anonymous_request_without_content_type_is_unauthorized() {
        let mut locations = MockLocations::new();
        locations.expect_create().times(0);

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/currentLocation")
                    .body(Body::from("latitude=37.5"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_authenticated_request_without_content_type_is_unsupported() {
        let mut locations = MockLocations::new();
        locations.expect_create().times(0);

        let response = router(locations, MockMembers::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/currentLocation")
                    .header(header::AUTHORIZATION, bearer(7))
                    .body(Body::from("latitude=37.5"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert!(json["error"].is_string());
    }

    #[test]
    fn test_service_error_to_response() {
        let cases = vec![
            (ServiceError::MemberNotFound { member_id: 1 }, StatusCode::NOT_FOUND),
            (ServiceError::LocationNotFound { member_id: 1 }, StatusCode::NOT_FOUND),
            (
                ServiceError::AccessDenied {
                    member_id: 1,
                    child_id: 2,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::LocationAlreadyExists { member_id: 1 },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::ValidationError {
                    message: "bad".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (RepositoryError::Timeout.into(), StatusCode::REQUEST_TIMEOUT),
            (
                RepositoryError::RateLimitExceeded.into(),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                RepositoryError::TableNotFound {
                    table_name: "CurrentLocations".to_string(),
                }
                .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let (status, body) = service_error_to_response(error);
            assert_eq!(status, expected);
            assert!(body.0["timestamp"].is_string());
        }
    }

    #[test]
    fn test_internal_errors_are_not_detailed() {
        let (_, body) = service_error_to_response(
            RepositoryError::TableNotFound {
                table_name: "CurrentLocations".to_string(),
            }
            .into(),
        );

        assert_eq!(body.0["error"], "Internal server error");
    }
}
