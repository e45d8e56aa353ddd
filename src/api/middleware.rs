//! API Middleware
//!
//! Authentication and request logging middleware.
//!
//! JWT issuance and verification are out of scope for this crate (see
//! `Config::secret_key`/`access_token_ttl`, carried only so an upstream
//! auth service can be wired to the same secret). What this crate owns is
//! the trust boundary on the inside of that: `auth_middleware` reads the
//! identity an upstream gateway already verified and attaches it to the
//! request; route handlers check it against the resource being accessed.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::domain::OperationContext;

/// The identity an upstream auth service attached to this request, after
/// verifying its token. Inserted into request extensions by
/// `auth_middleware`; read back by handlers that need to know who's
/// calling (e.g. to reject a non-admin updating someone else's profile).
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role || self.role == "admin"
    }
}

// =========================================================================
// Authentication Middleware
// =========================================================================

/// Reads the caller's identity from the headers an upstream gateway
/// attaches after verifying its access token (`X-Authenticated-User-Id`,
/// `X-Authenticated-User-Role`). This crate never sees the token itself.
pub async fn auth_middleware(
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let user_id = match headers
        .get("X-Authenticated-User-Id")
        .and_then(|v| v.to_str().ok())
    {
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(_) => {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "invalid_authenticated_user_id",
                        "type": "invalid_authenticated_user_id",
                        "message": "X-Authenticated-User-Id header is not a valid UUID"
                    })),
                )
                    .into_response());
            }
        },
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "missing_authenticated_user",
                    "type": "missing_authenticated_user",
                    "message": "Missing X-Authenticated-User-Id header"
                })),
            )
                .into_response());
        }
    };

    let role = headers
        .get("X-Authenticated-User-Role")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("user")
        .to_string();

    request
        .extensions_mut()
        .insert(AuthenticatedUser { id: user_id, role });

    let correlation_id = headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let context = OperationContext::new()
        .with_request_user(user_id)
        .with_correlation_id(correlation_id);

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

// =========================================================================
// Host Header Validation
// =========================================================================

/// Rejects requests whose `Host` header isn't in `allowed_hosts`. An empty
/// list disables the check, since a local/dev deployment has no fixed host.
pub async fn host_filter_middleware(
    allowed_hosts: std::sync::Arc<Vec<String>>,
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    if allowed_hosts.is_empty() {
        return Ok(next.run(request).await);
    }

    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h));

    let allowed = host.is_some_and(|h| allowed_hosts.iter().any(|allowed| allowed == h));

    if allowed {
        Ok(next.run(request).await)
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_host",
                "type": "invalid_host",
                "message": "Host header does not match an allowed host"
            })),
        )
            .into_response())
    }
}

// =========================================================================
// Header Masking
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &[
    "x-api-key",
    "authorization",
    "cookie",
    "set-cookie",
];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

// =========================================================================
// Request Logging Middleware
// =========================================================================

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let headers = mask_headers_for_logging(request.headers());

    let correlation_id = request
        .extensions()
        .get::<OperationContext>()
        .and_then(|ctx| ctx.correlation_id);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("x-api-key", "secret-key-12345".parse().unwrap());
        headers.insert("x-authenticated-user-role", "admin".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let api_key = masked.iter().find(|(k, _)| k == "x-api-key");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");
        let role = masked.iter().find(|(k, _)| k == "x-authenticated-user-role");

        assert_eq!(api_key.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
        assert_eq!(role.unwrap().1, "admin");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"x-api-key"));
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }

    #[test]
    fn has_role_admin_overrides() {
        let user = AuthenticatedUser { id: Uuid::new_v4(), role: "admin".into() };
        assert!(user.has_role("member"));
        assert!(user.has_role("anything"));
    }

    #[test]
    fn has_role_exact_match_only() {
        let user = AuthenticatedUser { id: Uuid::new_v4(), role: "member".into() };
        assert!(user.has_role("member"));
        assert!(!user.has_role("admin"));
    }
}
