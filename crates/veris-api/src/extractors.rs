//! # Request Extractors
//!
//! Builds the [`ServiceContext`] every core operation requires from
//! request headers. The fronting layer (gateway / auth proxy) is trusted
//! to have authenticated the caller and to supply tenant and actor
//! identity — authorization is not enforced here.
//!
//! Headers:
//!
//! - `X-Tenant-Id` — required; requests without a tenant are rejected.
//! - `X-Actor-Id` — the authenticated user; defaults to `"anonymous"`.
//! - `X-Request-Id` — correlation id; generated when absent.
//! - `X-Session-Id`, `X-Forwarded-For`, `User-Agent` — optional audit
//!   provenance.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use veris_core::{ActorId, RequestId, ServiceContext, SessionId, TenantId};

use crate::error::AppError;

/// Extractor wrapping the per-request [`ServiceContext`].
///
/// Destructure in handlers: `CallerIdentity(ctx): CallerIdentity`.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub ServiceContext);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header(parts, "x-tenant-id")
            .ok_or_else(|| AppError::Validation("X-Tenant-Id header is required".to_string()))?;
        let tenant_id = TenantId::new(tenant_id)
            .map_err(|e| AppError::Validation(format!("X-Tenant-Id: {e}")))?;

        let actor_id = header(parts, "x-actor-id").unwrap_or("anonymous");
        let actor_id = ActorId::new(actor_id)
            .map_err(|e| AppError::Validation(format!("X-Actor-Id: {e}")))?;

        let request_id = header(parts, "x-request-id")
            .map(RequestId::new)
            .unwrap_or_else(RequestId::generate);

        let session_id = header(parts, "x-session-id").map(SessionId::new);
        let ip_address = header(parts, "x-forwarded-for")
            // First hop of the forwarding chain is the client.
            .and_then(|chain| chain.split(',').next())
            .map(|ip| ip.trim().to_string());
        let user_agent = header(parts, "user-agent").map(str::to_string);

        Ok(CallerIdentity(ServiceContext {
            tenant_id,
            actor_id,
            request_id,
            session_id,
            ip_address,
            user_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<ServiceContext, AppError> {
        let (mut parts, _) = request.into_parts();
        CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .map(|CallerIdentity(ctx)| ctx)
    }

    #[tokio::test]
    async fn requires_tenant_header() {
        let request = Request::builder().uri("/").body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn extracts_full_context() {
        let request = Request::builder()
            .uri("/")
            .header("X-Tenant-Id", "t1")
            .header("X-Actor-Id", "user-7")
            .header("X-Request-Id", "req-42")
            .header("X-Session-Id", "sess-9")
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("User-Agent", "veris-cli/0.3")
            .body(())
            .unwrap();
        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.tenant_id.as_str(), "t1");
        assert_eq!(ctx.actor_id.as_str(), "user-7");
        assert_eq!(ctx.request_id.as_str(), "req-42");
        assert_eq!(ctx.session_id.unwrap().as_str(), "sess-9");
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("veris-cli/0.3"));
    }

    #[tokio::test]
    async fn defaults_for_optional_headers() {
        let request = Request::builder()
            .uri("/")
            .header("X-Tenant-Id", "t1")
            .body(())
            .unwrap();
        let ctx = extract(request).await.unwrap();
        assert_eq!(ctx.actor_id.as_str(), "anonymous");
        assert!(!ctx.request_id.as_str().is_empty());
        assert!(ctx.session_id.is_none());
    }

    #[tokio::test]
    async fn rejects_blank_tenant() {
        let request = Request::builder()
            .uri("/")
            .header("X-Tenant-Id", "   ")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(AppError::Validation(_))
        ));
    }
}
