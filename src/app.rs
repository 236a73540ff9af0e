use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::auth::TokenVerifier;
use crate::handlers::{
    cors_middleware, create_location_router, health_check, metrics_handler,
    security_headers_middleware, LocationApiState,
};
use crate::observability::{observability_middleware, BusinessTracingMiddleware, Metrics};
use crate::repositories::{LocationRepository, MemberRepository};
use crate::services::{CurrentLocationService, MemberStateService};

/// HTTP limits applied to every route
#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub max_request_size: usize,
}

/// Wire the services over a pair of repositories
pub fn location_state(
    locations: Arc<dyn LocationRepository>,
    members: Arc<dyn MemberRepository>,
    metrics: Arc<Metrics>,
) -> LocationApiState {
    LocationApiState {
        location_service: Arc::new(CurrentLocationService::new(locations, members.clone())),
        member_service: Arc::new(MemberStateService::new(members)),
        tracing: Arc::new(BusinessTracingMiddleware::new(metrics)),
    }
}

/// Build the full application router
pub fn create_app(
    metrics: Arc<Metrics>,
    state: LocationApiState,
    verifier: Arc<TokenVerifier>,
    limits: HttpLimits,
) -> Router {
    let metrics_for_middleware = metrics.clone();
    let max_request_size = limits.max_request_size;

    Router::new()
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        .merge(create_location_router(state, verifier, max_request_size))
        // Outermost layer is listed last
        .layer(DefaultBodyLimit::max(max_request_size))
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;
    use crate::repositories::{InMemoryLocationRepository, InMemoryMemberRepository};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn app() -> Router {
        let metrics = Arc::new(Metrics::new().unwrap());
        let state = location_state(
            Arc::new(InMemoryLocationRepository::new()),
            Arc::new(InMemoryMemberRepository::with_members([Member::new(
                1, "parent", "FAM-A",
            )])),
            metrics.clone(),
        );
        create_app(
            metrics,
            state,
            Arc::new(TokenVerifier::new(b"app-secret", 0)),
            HttpLimits {
                request_timeout: Duration::from_secs(5),
                max_request_size: 1024,
            },
        )
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
    }

    #[tokio::test]
    async fn test_location_routes_require_token() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/currentLocation")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"currentLatitude":1.0,"currentLongitude":2.0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let state = location_state(
            Arc::new(InMemoryLocationRepository::new()),
            Arc::new(InMemoryMemberRepository::new()),
            metrics.clone(),
        );
        let app = create_app(
            metrics.clone(),
            state,
            Arc::new(TokenVerifier::new(b"app-secret", 0)),
            HttpLimits {
                request_timeout: Duration::from_secs(5),
                max_request_size: 1024,
            },
        );

        app.oneshot(
            Request::builder()
                .uri("/health/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

        assert!(metrics
            .encode()
            .unwrap()
            .contains("endpoint=\"/health/status\""));
    }
}
