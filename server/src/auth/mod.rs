//! Operator identity and tenant role checks.
//!
//! Session management lives outside this service: callers present an opaque
//! bearer credential which the store resolves to a user id by its SHA-256
//! digest. Roles are granted per tenant.

pub mod extract;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::StoreResult;

pub use extract::{BearerCredential, TenantHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    CheckinOperator,
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::CheckinOperator => "checkin_operator",
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub user_id: Uuid,
}

#[async_trait]
pub trait AuthorizationPort: Send + Sync {
    /// Resolves a raw bearer credential. Unknown or revoked credentials yield `None`.
    async fn authenticate(&self, credential: &str) -> StoreResult<Option<Operator>>;

    async fn has_role(&self, operator: &Operator, tenant_id: Uuid, role: Role)
        -> StoreResult<bool>;

    async fn is_tenant_admin(&self, operator: &Operator, tenant_id: Uuid) -> StoreResult<bool> {
        self.has_role(operator, tenant_id, Role::Admin).await
    }
}

/// Hex SHA-256 of a credential; the only form in which credentials are stored.
pub fn credential_digest(credential: &str) -> String {
    hex::encode(Sha256::digest(credential.as_bytes()))
}
