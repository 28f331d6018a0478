//! Contexto de tenant
//!
//! Cada solicitud de la API identifica a su tenant con la cabecera
//! `x-tenant-id`. Sin ella la solicitud se rechaza con 400.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::utils::errors::{bad_request_error, AppError};

pub const TENANT_HEADER: &str = "x-tenant-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext(pub String);

impl TenantContext {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 64)
            .ok_or_else(|| bad_request_error("Missing or invalid x-tenant-id header"))?;

        Ok(TenantContext(tenant.to_string()))
    }
}
