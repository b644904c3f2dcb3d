//! Storage ports used by the pricing and check-in engines.
//!
//! Every counter mutation is a compare-and-swap: implementations must apply
//! the change and its precondition as one atomic step and report whether it
//! took effect. Engines never read-modify-write counters in memory.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Coupon, Event, Lot, NewCheckin, NewCouponUsage, Order, OrderStatus, QrRotation, Ticket,
    TicketType,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only catalog queries. Lookups are scoped to the tenant and event so
/// that foreign rows are indistinguishable from missing ones.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_event(&self, tenant_id: Uuid, event_id: Uuid) -> StoreResult<Option<Event>>;

    async fn lots_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        lot_ids: &[Uuid],
    ) -> StoreResult<Vec<Lot>>;

    async fn ticket_types_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        ticket_type_ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>>;

    /// Sum of `qtd_total` over every lot of each sector within the tenant.
    async fn sector_allocations(
        &self,
        tenant_id: Uuid,
        sector_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i64>>;

    /// Non-cancelled tickets from paid orders of this buyer, per ticket type.
    async fn paid_tickets_by_type(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>>;

    /// Active coupons of the event whose code is in `codes` (already upper-cased).
    async fn active_coupons(&self, event_id: Uuid, codes: &[String]) -> StoreResult<Vec<Coupon>>;

    /// Prior `coupon_usage` rows per coupon for this CPF.
    async fn coupon_usage_by_cpf(
        &self,
        coupon_ids: &[Uuid],
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>>;
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// `qtd_vendida += quantity` only while it stays within `qtd_total`.
    async fn try_increment_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<bool>;

    /// Undo a previous successful increment.
    async fn release_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<()>;

    /// `uso_total += 1` only while it stays within `limit_total` (when set).
    async fn try_consume_coupon(&self, coupon_id: Uuid, limit_total: Option<i64>)
        -> StoreResult<bool>;

    async fn release_coupon(&self, coupon_id: Uuid) -> StoreResult<()>;

    async fn record_coupon_usage(&self, usage: NewCouponUsage) -> StoreResult<()>;

    /// Removes the usage rows one order wrote for one coupon.
    async fn release_coupon_usage(&self, coupon_id: Uuid, order_id: Uuid) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, tenant_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>>;

    /// Moves the order from `from` to `to`, optionally setting its total.
    /// Returns `false` when the order was no longer in `from`.
    async fn transition_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        total: Option<Decimal>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>>;

    /// Sets status `checkin` only if the ticket is still eligible and its
    /// current nonce equals `nonce`.
    async fn try_check_in(&self, ticket_id: Uuid, nonce: &str) -> StoreResult<bool>;

    async fn record_checkin(&self, checkin: NewCheckin) -> StoreResult<()>;

    /// Replaces holder data and nonce of an eligible ticket and bumps its
    /// `qr_version`. Returns the new version, or `None` if the ticket was not
    /// eligible anymore.
    async fn rotate_qr(&self, ticket_id: Uuid, rotation: QrRotation) -> StoreResult<Option<i32>>;
}
