//! Request context extraction: caller identity and correlation.

use axum::{
    Json,
    extract::{FromRequestParts, Request},
    http::{HeaderValue, StatusCode, header::HeaderName, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use cashgrid_types::{Actor, ActorId, RequestContext, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id for the in-flight request, inserted by
/// [`correlation_middleware`] and stamped onto every audit entry.
#[derive(Clone)]
pub struct CorrelationId(pub String);

/// Honors an inbound `X-Correlation-Id` or generates one, and echoes it
/// back on the response.
pub async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    req.extensions_mut().insert(CorrelationId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(CORRELATION_HEADER), value);
    }
    response
}

/// The authenticated caller plus correlation id, extracted per request.
///
/// Wrapper over [`RequestContext`] so the extractor impl lives in this
/// crate (orphan rule).
pub struct RequestScope(pub RequestContext);

/// Missing or malformed identity headers.
pub struct IdentityRejection(String);

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.0,
            "code": StatusCode::UNAUTHORIZED.as_u16(),
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestScope {
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| {
                IdentityRejection("Missing or invalid X-Actor-Id header".to_string())
            })?;

        let role: Role = parts
            .headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| {
                IdentityRejection("Missing or invalid X-Actor-Role header".to_string())
            })?;

        let correlation_id = parts
            .extensions
            .get::<CorrelationId>()
            .map(|c| c.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let actor = Actor::new(ActorId::from_uuid(actor_id), role);
        Ok(RequestScope(RequestContext::new(actor, correlation_id)))
    }
}
