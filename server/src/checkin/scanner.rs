use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{AuthorizationPort, Operator, Role};
use crate::models::{CheckinResult, NewCheckin, TicketStatus};
use crate::store::{StoreResult, TicketStore};
use crate::utils::error::ErrorCode;

use super::qr;

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub tenant_id: Uuid,
    pub qr: String,
    pub gate: Option<String>,
    pub device_id: Option<String>,
}

/// Every way a scan can end.
///
/// The first four never reach a ticket of the caller's tenant and leave no
/// audit row; all others are recorded in `checkins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Forbidden,
    MalformedPayload,
    TicketNotFound,
    TenantMismatch,
    CheckedIn { ticket_id: Uuid },
    AlreadyCheckedIn { ticket_id: Uuid },
    Cancelled { ticket_id: Uuid },
    NonceMismatch { ticket_id: Uuid },
    /// A concurrent scan won the conditional update.
    LostRace { ticket_id: Uuid },
}

impl ScanOutcome {
    pub fn result(self) -> CheckinResult {
        match self {
            ScanOutcome::CheckedIn { .. } => CheckinResult::Ok,
            ScanOutcome::AlreadyCheckedIn { .. } => CheckinResult::Duplicado,
            ScanOutcome::Cancelled { .. } => CheckinResult::Cancelado,
            _ => CheckinResult::Invalido,
        }
    }

    pub fn ticket_id(self) -> Option<Uuid> {
        match self {
            ScanOutcome::CheckedIn { ticket_id }
            | ScanOutcome::AlreadyCheckedIn { ticket_id }
            | ScanOutcome::Cancelled { ticket_id }
            | ScanOutcome::NonceMismatch { ticket_id }
            | ScanOutcome::LostRace { ticket_id } => Some(ticket_id),
            _ => None,
        }
    }

    /// Duplicates are a normal answer for a scanner, not a failure.
    pub fn is_ok(self) -> bool {
        matches!(
            self,
            ScanOutcome::CheckedIn { .. } | ScanOutcome::AlreadyCheckedIn { .. }
        )
    }

    pub fn is_audited(self) -> bool {
        self.ticket_id().is_some()
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            ScanOutcome::Forbidden | ScanOutcome::TenantMismatch => StatusCode::FORBIDDEN,
            ScanOutcome::MalformedPayload => StatusCode::BAD_REQUEST,
            ScanOutcome::TicketNotFound => StatusCode::NOT_FOUND,
            ScanOutcome::CheckedIn { .. } | ScanOutcome::AlreadyCheckedIn { .. } => StatusCode::OK,
            ScanOutcome::Cancelled { .. }
            | ScanOutcome::NonceMismatch { .. }
            | ScanOutcome::LostRace { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Machine-readable reason for non-ok outcomes.
    pub fn error_code(self) -> Option<ErrorCode> {
        match self {
            ScanOutcome::Forbidden | ScanOutcome::TenantMismatch => Some(ErrorCode::Forbidden),
            ScanOutcome::MalformedPayload => Some(ErrorCode::QrMalformed),
            ScanOutcome::TicketNotFound => Some(ErrorCode::TicketNotFound),
            ScanOutcome::Cancelled { .. } => Some(ErrorCode::TicketCancelled),
            ScanOutcome::NonceMismatch { .. } => Some(ErrorCode::QrNonceMismatch),
            ScanOutcome::LostRace { .. } => Some(ErrorCode::ConcurrentCheckin),
            ScanOutcome::CheckedIn { .. } | ScanOutcome::AlreadyCheckedIn { .. } => None,
        }
    }
}

/// Drives a ticket from eligible to checked in, at most once.
pub struct CheckinService {
    tickets: Arc<dyn TicketStore>,
    authz: Arc<dyn AuthorizationPort>,
}

impl CheckinService {
    pub fn new(tickets: Arc<dyn TicketStore>, authz: Arc<dyn AuthorizationPort>) -> Self {
        Self { tickets, authz }
    }

    #[instrument(
        skip(self, request, operator),
        fields(tenant_id = %request.tenant_id, operator_id = %operator.user_id, gate = ?request.gate)
    )]
    pub async fn scan(&self, request: &ScanRequest, operator: &Operator) -> StoreResult<ScanOutcome> {
        let tenant_id = request.tenant_id;

        if !self.may_scan(operator, tenant_id).await? {
            warn!("Operator lacks check-in permission");
            return Ok(ScanOutcome::Forbidden);
        }

        let payload = match qr::decode(&request.qr) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Unreadable QR payload");
                return Ok(ScanOutcome::MalformedPayload);
            }
        };

        let Some(ticket) = self.tickets.find_ticket(payload.tid).await? else {
            warn!(ticket_id = %payload.tid, "Scanned ticket does not exist");
            return Ok(ScanOutcome::TicketNotFound);
        };

        if ticket.tenant_id != tenant_id {
            warn!(ticket_id = %ticket.id, "Scanned ticket belongs to another tenant");
            return Ok(ScanOutcome::TenantMismatch);
        }

        let ticket_id = ticket.id;
        let outcome = match ticket.status {
            TicketStatus::Checkin => ScanOutcome::AlreadyCheckedIn { ticket_id },
            TicketStatus::Cancelado => ScanOutcome::Cancelled { ticket_id },
            TicketStatus::Emitido | TicketStatus::Transferido => {
                if ticket.qr_nonce.as_deref() != Some(payload.n.as_str()) {
                    ScanOutcome::NonceMismatch { ticket_id }
                } else if self.tickets.try_check_in(ticket_id, &payload.n).await? {
                    ScanOutcome::CheckedIn { ticket_id }
                } else {
                    ScanOutcome::LostRace { ticket_id }
                }
            }
        };

        self.audit(request, operator, outcome).await;

        if outcome.is_ok() {
            info!(ticket_id = %ticket_id, result = ?outcome.result(), "Check-in scan");
        } else {
            warn!(ticket_id = %ticket_id, outcome = ?outcome, "Check-in refused");
        }

        Ok(outcome)
    }

    async fn may_scan(&self, operator: &Operator, tenant_id: Uuid) -> StoreResult<bool> {
        if self
            .authz
            .has_role(operator, tenant_id, Role::CheckinOperator)
            .await?
        {
            return Ok(true);
        }
        self.authz.is_tenant_admin(operator, tenant_id).await
    }

    /// Audit failures are logged but do not change the outcome: the ticket
    /// transition has already happened (or not) by the time we get here.
    async fn audit(&self, request: &ScanRequest, operator: &Operator, outcome: ScanOutcome) {
        let Some(ticket_id) = outcome.ticket_id() else {
            return;
        };

        let row = NewCheckin {
            tenant_id: request.tenant_id,
            ticket_id,
            operator_id: operator.user_id,
            gate: request.gate.clone(),
            device_id: request.device_id.clone(),
            resultado: outcome.result(),
        };
        if let Err(e) = self.tickets.record_checkin(row).await {
            error!(ticket_id = %ticket_id, error = ?e, "Failed to record check-in audit row");
        }
    }
}
