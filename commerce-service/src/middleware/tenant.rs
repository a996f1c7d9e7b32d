//! Tenant context extractor.
//!
//! Tenant and actor identifiers arrive as headers set by the platform's
//! gateway after authentication and tenant-membership checks; this service
//! trusts them and threads the actor explicitly through every mutating
//! call for audit attribution. No ambient actor state exists anywhere.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Tenant scope plus the acting user, extracted from request headers.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    actor_id: Option<Uuid>,
}

impl TenantContext {
    /// The acting user. Mutating operations require one; reads do not.
    pub fn actor(&self) -> Result<Uuid, AppError> {
        self.actor_id.ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!(
                "Missing {} header (required for mutations)",
                ACTOR_ID_HEADER
            ))
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!(
                    "Missing {} header (required from gateway)",
                    TENANT_ID_HEADER
                ))
            })?;

        let tenant_id = Uuid::parse_str(tenant_id).map_err(|_| {
            AppError::Unauthorized(anyhow::anyhow!("Malformed {} header", TENANT_ID_HEADER))
        })?;

        let actor_id = parts
            .headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| {
                AppError::Unauthorized(anyhow::anyhow!("Malformed {} header", ACTOR_ID_HEADER))
            })?;

        Ok(TenantContext {
            tenant_id,
            actor_id,
        })
    }
}
