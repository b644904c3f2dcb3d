use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{AuthorizationPort, Operator, Role};
use crate::cart::Cpf;
use crate::models::QrRotation;
use crate::store::{OrderStore, StoreError, StoreResult, TicketStore};
use crate::utils::error::{ErrorCode, Rejection, RejectionKind};
use crate::utils::response::ApiErrorBody;

use super::qr::{self, QrPayload};

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub tenant_id: Uuid,
    pub ticket_id: Uuid,
    pub holder_name: String,
    pub holder_cpf: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedQr {
    pub ticket_id: Uuid,
    pub qr: String,
    pub qr_version: i32,
    pub kid: String,
}

/// Names a ticket and rotates its QR secret. Any previously displayed QR
/// stops matching the moment the new nonce is stored.
pub struct QrIssuer {
    tickets: Arc<dyn TicketStore>,
    orders: Arc<dyn OrderStore>,
    authz: Arc<dyn AuthorizationPort>,
    key_id: String,
}

impl QrIssuer {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        orders: Arc<dyn OrderStore>,
        authz: Arc<dyn AuthorizationPort>,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            tickets,
            orders,
            authz,
            key_id: key_id.into(),
        }
    }

    #[instrument(
        skip(self, request, operator, now),
        fields(tenant_id = %request.tenant_id, ticket_id = %request.ticket_id)
    )]
    pub async fn issue(
        &self,
        request: &IssueRequest,
        operator: &Operator,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<IssuedQr, Rejection>> {
        let ticket = match self.tickets.find_ticket(request.ticket_id).await? {
            Some(ticket) if ticket.tenant_id == request.tenant_id => ticket,
            _ => {
                return Ok(Err(Rejection::single(
                    RejectionKind::NotFound,
                    ApiErrorBody::new(ErrorCode::TicketNotFound, "Ingresso não encontrado"),
                )))
            }
        };

        if !self.may_issue(operator, request.tenant_id, ticket.order_id).await? {
            warn!(operator_id = %operator.user_id, "Caller may not name this ticket");
            return Ok(Err(Rejection::single(
                RejectionKind::Forbidden,
                ApiErrorBody::new(ErrorCode::Forbidden, "Sem permissão para nomear este ingresso"),
            )));
        }

        let mut errors = Vec::new();
        let holder_name = request.holder_name.trim();
        if holder_name.is_empty() {
            errors.push(ApiErrorBody::new(
                ErrorCode::InvalidHolder,
                "Nome do titular é obrigatório",
            ));
        }
        let holder_cpf = Cpf::parse(&request.holder_cpf);
        if holder_cpf.is_none() {
            errors.push(ApiErrorBody::new(
                ErrorCode::InvalidCpf,
                "CPF do titular deve conter exatamente 11 dígitos",
            ));
        }
        let Some(holder_cpf) = holder_cpf.filter(|_| errors.is_empty()) else {
            return Ok(Err(Rejection::new(RejectionKind::Input, errors)));
        };

        if !ticket.status.is_eligible_for_checkin() {
            return Ok(Err(not_eligible()));
        }

        let nonce = qr::generate_nonce();
        let rotation = QrRotation {
            nome_titular: holder_name.to_string(),
            cpf_titular: holder_cpf.as_str().to_string(),
            qr_nonce: nonce.clone(),
            qr_kid: self.key_id.clone(),
        };
        let Some(qr_version) = self.tickets.rotate_qr(ticket.id, rotation).await? else {
            return Ok(Err(not_eligible()));
        };

        let payload = QrPayload::new(ticket.id, nonce, now.timestamp_millis());
        let encoded = qr::encode(&payload)
            .map_err(|e| StoreError::Unavailable(format!("QR payload encoding failed: {e}")))?;

        info!(qr_version, "QR issued");
        Ok(Ok(IssuedQr {
            ticket_id: ticket.id,
            qr: encoded,
            qr_version,
            kid: self.key_id.clone(),
        }))
    }

    /// The order's buyer, tenant admins and staff may name a ticket.
    async fn may_issue(&self, operator: &Operator, tenant_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
        if let Some(order) = self.orders.find_order(tenant_id, order_id).await? {
            if order.comprador_id == Some(operator.user_id) {
                return Ok(true);
            }
        }
        if self.authz.is_tenant_admin(operator, tenant_id).await? {
            return Ok(true);
        }
        self.authz.has_role(operator, tenant_id, Role::Staff).await
    }
}

fn not_eligible() -> Rejection {
    Rejection::single(
        RejectionKind::BusinessRule,
        ApiErrorBody::new(
            ErrorCode::TicketNotEligible,
            "Ingresso cancelado ou já utilizado não pode ser nomeado",
        ),
    )
}
