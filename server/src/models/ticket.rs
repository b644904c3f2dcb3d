use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Emitido,
    Transferido,
    Cancelado,
    Checkin,
}

impl TicketStatus {
    pub fn is_eligible_for_checkin(self) -> bool {
        matches!(self, TicketStatus::Emitido | TicketStatus::Transferido)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub ticket_type_id: Uuid,
    pub sector_id: Uuid,
    pub status: TicketStatus,
    pub nome_titular: Option<String>,
    pub cpf_titular: Option<String>,
    pub qr_nonce: Option<String>,
    pub qr_kid: Option<String>,
    pub qr_version: i32,
}

/// Outcome recorded for each scan attempt that reached a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "checkin_result", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CheckinResult {
    Ok,
    Duplicado,
    Invalido,
    Cancelado,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckin {
    pub tenant_id: Uuid,
    pub ticket_id: Uuid,
    pub operator_id: Uuid,
    pub gate: Option<String>,
    pub device_id: Option<String>,
    pub resultado: CheckinResult,
}

/// New holder data plus the freshly generated QR secret.
#[derive(Debug, Clone)]
pub struct QrRotation {
    pub nome_titular: String,
    pub cpf_titular: String,
    pub qr_nonce: String,
    pub qr_kid: String,
}
