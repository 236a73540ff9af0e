use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::{AuthenticatedMember, TokenError, TokenVerifier};

const BEARER_PREFIX: &str = "Bearer ";

/// Resolve the calling member from the `Authorization` header and attach it to the request.
///
/// Requests without a valid token are answered with 401 and never reach the handler.
pub async fn auth_middleware(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&verifier, request.headers()) {
        Ok(member) => {
            tracing::Span::current().record("enduser.id", member.member_id);
            request.extensions_mut().insert(member);
            next.run(request).await
        }
        Err(e) => {
            crate::warn_with_trace!(reason = %e, "Rejected unauthenticated request");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": e.to_string(),
                    "timestamp": chrono::Utc::now().to_rfc3339()
                })),
            )
                .into_response()
        }
    }
}

fn authenticate(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> Result<AuthenticatedMember, TokenError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::Malformed)?;

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(TokenError::Malformed)?
        .trim();

    let claims = verifier.verify(token)?;
    Ok(AuthenticatedMember {
        member_id: claims.member_id,
    })
}
