use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// A ticket type joined with the capacity of its sector.
#[derive(Debug, Clone, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub sector_id: Uuid,
    pub nome: String,
    pub preco: Decimal,
    pub max_por_pedido: Option<i32>,
    pub ativo: bool,
    pub setor_capacidade: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct Lot {
    pub id: Uuid,
    pub ticket_type_id: Uuid,
    pub nome: String,
    pub preco: Option<Decimal>,
    pub qtd_total: i32,
    pub qtd_vendida: i32,
    pub inicio_vendas: Option<DateTime<Utc>>,
    pub fim_vendas: Option<DateTime<Utc>>,
}

impl Lot {
    pub fn available(&self) -> i64 {
        i64::from(self.qtd_total) - i64::from(self.qtd_vendida)
    }

    /// Sale window check with `skew` tolerance on both ends. Open bounds never reject.
    pub fn is_on_sale(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let started = self.inicio_vendas.map_or(true, |start| now >= start - skew);
        let not_ended = self.fim_vendas.map_or(true, |end| now <= end + skew);
        started && not_ended
    }

    /// Unit price: the lot's own price when set, the ticket type's otherwise.
    pub fn unit_price(&self, ticket_type: &TicketType) -> Decimal {
        self.preco.unwrap_or(ticket_type.preco)
    }
}
