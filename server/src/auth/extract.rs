use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::utils::error::AppError;

use super::{AuthorizationPort, Operator};

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Raw credential from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerCredential(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing Authorization header".to_string()))?;

        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::AuthError("Expected a Bearer credential".to_string()))?;

        Ok(Self(token.to_string()))
    }
}

/// Tenant the caller is acting for, from the `x-tenant-id` header.
#[derive(Debug, Clone, Copy)]
pub struct TenantHeader(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for TenantHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Self)
            .ok_or_else(|| AppError::MissingTenant("x-tenant-id header must be a UUID".to_string()))
    }
}

/// Resolves the bearer credential against the store. Unknown and revoked
/// credentials are both plain 401s.
#[async_trait]
impl<S> FromRequestParts<S> for Operator
where
    Arc<dyn AuthorizationPort>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerCredential(token) = BearerCredential::from_request_parts(parts, state).await?;
        let authz = Arc::<dyn AuthorizationPort>::from_ref(state);

        authz
            .authenticate(&token)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid or revoked credential".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn test_bearer_credential_extracted() {
        let mut parts = parts_with(&[("authorization", "Bearer abc123")]);
        let BearerCredential(token) = BearerCredential::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(token, "abc123");
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let mut parts = parts_with(&[("authorization", "Basic dXNlcjpwdw==")]);
        let result = BearerCredential::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_tenant_header_must_be_uuid() {
        let mut parts = parts_with(&[(TENANT_HEADER, "acme")]);
        let result = TenantHeader::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::MissingTenant(_))));

        let tenant = Uuid::new_v4();
        let tenant_str = tenant.to_string();
        let mut parts = parts_with(&[(TENANT_HEADER, tenant_str.as_str())]);
        let TenantHeader(parsed) = TenantHeader::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(parsed, tenant);
    }
}
