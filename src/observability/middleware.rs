use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use opentelemetry::trace::TraceContextExt;
use std::{future::Future, sync::Arc, time::Instant};
use tracing::{error, info, instrument, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Metrics;
use crate::models::{MemberId, MovingState};

/// Middleware for automatic request tracing and metrics collection
pub async fn observability_middleware(
    metrics: Arc<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let uri = request.uri().to_string();

    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|value| value.to_str().ok())
        })
        .unwrap_or("unknown")
        .trim()
        .to_string();

    // Group by route template so child ids do not explode label cardinality
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched_path| matched_path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let span_name = format!("{} {}", method, endpoint);

    let span = tracing::info_span!(
        target: "current_location_rs::http",
        "{}", span_name,
        otel.name = %span_name,
        otel.kind = "server",
        http.method = %method,
        http.route = %endpoint,
        http.url = %uri,
        http.user_agent = %user_agent,
        client.address = %client_ip,
        enduser.id = tracing::field::Empty,
        http.response.status_code = tracing::field::Empty,
        http.response_time_ms = tracing::field::Empty,
    );

    async {
        metrics.increment_in_flight(&method, &endpoint);

        let trace_id = tracing::Span::current()
            .context()
            .span()
            .span_context()
            .trace_id()
            .to_string();

        info!(trace_id = %trace_id, method = %method, path = %endpoint, "Processing request");

        let response = next.run(request).await;

        let duration = start_time.elapsed();
        let duration_ms = duration.as_millis();
        let status_code = response.status().as_u16();

        let current_span = tracing::Span::current();
        current_span.record("http.response.status_code", status_code);
        current_span.record("http.response_time_ms", duration_ms);

        let otel_context = current_span.context();
        let otel_span = otel_context.span();
        if status_code >= 500 {
            otel_span.set_status(opentelemetry::trace::Status::error("HTTP server error"));
        } else {
            otel_span.set_status(opentelemetry::trace::Status::Ok);
        }

        metrics.record_http_request(&method, &endpoint, status_code, duration.as_secs_f64());
        metrics.decrement_in_flight(&method, &endpoint);

        if status_code >= 500 {
            error!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                "Request failed"
            );
        } else {
            info!(
                trace_id = %trace_id,
                method = %method,
                path = %endpoint,
                status_code = status_code,
                duration_ms = duration_ms,
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Wraps service calls made by the location handlers with spans and business metrics
pub struct BusinessTracingMiddleware {
    metrics: Arc<Metrics>,
}

impl BusinessTracingMiddleware {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self { metrics }
    }

    /// Trace a current-location operation (`create`, `update` or `read`)
    #[instrument(skip_all, fields(operation = %operation, member_id = member_id))]
    pub async fn trace_location_operation<F, T, E>(
        &self,
        operation: &str,
        member_id: MemberId,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let start_time = Instant::now();

        let result = future.await;
        let duration = start_time.elapsed();

        self.metrics
            .record_location_operation(operation, result.is_ok(), duration.as_secs_f64());

        match &result {
            Ok(_) => info!(
                duration_ms = duration.as_millis(),
                "Location operation completed"
            ),
            Err(error) => error!(
                error = %error,
                duration_ms = duration.as_millis(),
                "Location operation failed"
            ),
        }

        result
    }

    /// Trace a moving-state transition
    #[instrument(skip_all, fields(member_id = member_id, state = %state))]
    pub async fn trace_moving_state_update<F, T, E>(
        &self,
        member_id: MemberId,
        state: MovingState,
        future: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let result = future.await;

        self.metrics.record_member_state_update(state, result.is_ok());

        if let Err(error) = &result {
            error!(error = %error, "Moving state update failed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app(metrics: Arc<Metrics>) -> Router {
        Router::new()
            .route("/ok/:id", get(|| async { "ok" }))
            .route(
                "/boom",
                get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
            )
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics.clone(), req, next)
            }))
    }

    #[tokio::test]
    async fn test_observability_middleware_uses_route_template() {
        let metrics = Arc::new(Metrics::new().unwrap());

        let request = Request::builder()
            .method(Method::GET)
            .uri("/ok/42")
            .header("user-agent", "test-client/1.0")
            .body(Body::empty())
            .unwrap();

        let response = app(metrics.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("endpoint=\"/ok/:id\""));
        assert!(!encoded.contains("/ok/42"));
    }

    #[tokio::test]
    async fn test_observability_middleware_error() {
        let metrics = Arc::new(Metrics::new().unwrap());

        let request = Request::builder()
            .method(Method::GET)
            .uri("/boom")
            .body(Body::empty())
            .unwrap();

        let response = app(metrics.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("status_code=\"500\""));
    }

    #[tokio::test]
    async fn test_business_tracing_records_outcomes() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let tracing = BusinessTracingMiddleware::new(metrics.clone());

        let ok = tracing
            .trace_location_operation("create", 1, async { Ok::<_, String>(()) })
            .await;
        assert!(ok.is_ok());

        let failed = tracing
            .trace_location_operation("read", 1, async { Err::<(), _>("denied") })
            .await;
        assert!(failed.is_err());

        let state = tracing
            .trace_moving_state_update(1, MovingState::Moving, async { Ok::<_, String>(()) })
            .await;
        assert!(state.is_ok());

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("location_operations_total{operation=\"create\",status=\"success\"} 1"));
        assert!(encoded.contains("location_operations_total{operation=\"read\",status=\"error\"} 1"));
        assert!(encoded.contains("member_state_updates_total{state=\"moving\",status=\"success\"} 1"));
    }
}
