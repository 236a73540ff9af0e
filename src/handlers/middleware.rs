use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::warn;

/// Rejects bodies with the wrong media type or an oversized declared length
pub async fn request_validation_middleware(
    max_request_size: usize,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<Value>)> {
    validate_content_type(&request)?;
    validate_request_size(&request, max_request_size)?;

    Ok(next.run(request).await)
}

fn rejection(status: StatusCode, message: String) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

fn validate_content_type(request: &Request<Body>) -> Result<(), (StatusCode, Json<Value>)> {
    let method = request.method();
    if method != Method::POST && method != Method::PUT && method != Method::PATCH {
        return Ok(());
    }

    match request.headers().get(header::CONTENT_TYPE) {
        Some(content_type) => {
            let content_type = content_type.to_str().unwrap_or("");
            if content_type.starts_with("application/json") {
                Ok(())
            } else {
                warn!("Invalid content type: {}", content_type);
                Err(rejection(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "Content-Type must be application/json".to_string(),
                ))
            }
        }
        None => {
            warn!("Missing content type header");
            Err(rejection(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Content-Type header is required for requests with body".to_string(),
            ))
        }
    }
}

fn validate_request_size(
    request: &Request<Body>,
    max_request_size: usize,
) -> Result<(), (StatusCode, Json<Value>)> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    match declared {
        Some(length) if length > max_request_size => {
            warn!("Request too large: {} bytes", length);
            Err(rejection(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "Request size {} bytes exceeds maximum of {} bytes",
                    length, max_request_size
                ),
            ))
        }
        _ => Ok(()),
    }
}

/// CORS headers for browser clients; answers preflight requests directly
pub async fn cors_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PATCH, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );

    response
}

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    response
}
