use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Rascunho,
    AguardandoPagto,
    Pago,
    Cancelado,
}

impl OrderStatus {
    /// Orders only move forward; `cancelado` is terminal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Rascunho, AguardandoPagto)
                | (Rascunho, Cancelado)
                | (AguardandoPagto, Pago)
                | (AguardandoPagto, Cancelado)
                | (Pago, Cancelado)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Rascunho => "rascunho",
            OrderStatus::AguardandoPagto => "aguardando_pagto",
            OrderStatus::Pago => "pago",
            OrderStatus::Cancelado => "cancelado",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub event_id: Uuid,
    pub comprador_id: Option<Uuid>,
    pub comprador_cpf: String,
    pub status: OrderStatus,
    pub total: Decimal,
}
