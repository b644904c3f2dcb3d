//! In-process store with the same compare-and-swap semantics as `PgStore`.
//!
//! Every trait method takes the single state lock for its whole duration, so
//! each conditional update is atomic with respect to all others.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::auth::{credential_digest, AuthorizationPort, Operator, Role};
use crate::models::{
    Coupon, Event, Lot, NewCheckin, NewCouponUsage, Order, OrderStatus, QrRotation, Ticket,
    TicketStatus, TicketType,
};

use super::{CatalogStore, InventoryStore, OrderStore, StoreResult, TicketStore};

#[derive(Debug, Default)]
struct State {
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    lots: HashMap<Uuid, Lot>,
    coupons: HashMap<Uuid, Coupon>,
    coupon_usage: Vec<NewCouponUsage>,
    orders: HashMap<Uuid, Order>,
    tickets: HashMap<Uuid, Ticket>,
    checkins: Vec<NewCheckin>,
    credentials: HashMap<String, (Uuid, bool)>,
    roles: HashSet<(Uuid, Uuid, Role)>,
}

impl State {
    fn event_of_type(&self, ticket_type_id: Uuid) -> Option<&Event> {
        self.ticket_types
            .get(&ticket_type_id)
            .and_then(|tt| self.events.get(&tt.event_id))
    }

    fn type_in_event(&self, ticket_type_id: Uuid, tenant_id: Uuid, event_id: Uuid) -> bool {
        self.event_of_type(ticket_type_id)
            .is_some_and(|event| event.id == event_id && event.tenant_id == tenant_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_event(&self, event: Event) {
        self.state().events.insert(event.id, event);
    }

    pub fn insert_ticket_type(&self, ticket_type: TicketType) {
        self.state().ticket_types.insert(ticket_type.id, ticket_type);
    }

    pub fn insert_lot(&self, lot: Lot) {
        self.state().lots.insert(lot.id, lot);
    }

    /// Codes are stored upper-cased, as the database constraint demands.
    pub fn insert_coupon(&self, mut coupon: Coupon) {
        coupon.codigo = coupon.codigo.to_uppercase();
        self.state().coupons.insert(coupon.id, coupon);
    }

    pub fn insert_order(&self, order: Order) {
        self.state().orders.insert(order.id, order);
    }

    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state().tickets.insert(ticket.id, ticket);
    }

    pub fn grant_role(&self, user_id: Uuid, tenant_id: Uuid, role: Role) {
        self.state().roles.insert((user_id, tenant_id, role));
    }

    pub fn add_credential(&self, credential: &str, user_id: Uuid) {
        self.state()
            .credentials
            .insert(credential_digest(credential), (user_id, false));
    }

    pub fn revoke_credential(&self, credential: &str) {
        if let Some(entry) = self.state().credentials.get_mut(&credential_digest(credential)) {
            entry.1 = true;
        }
    }

    pub fn lot(&self, lot_id: Uuid) -> Option<Lot> {
        self.state().lots.get(&lot_id).cloned()
    }

    pub fn coupon(&self, coupon_id: Uuid) -> Option<Coupon> {
        self.state().coupons.get(&coupon_id).cloned()
    }

    pub fn order(&self, order_id: Uuid) -> Option<Order> {
        self.state().orders.get(&order_id).cloned()
    }

    pub fn ticket(&self, ticket_id: Uuid) -> Option<Ticket> {
        self.state().tickets.get(&ticket_id).cloned()
    }

    pub fn checkins(&self) -> Vec<NewCheckin> {
        self.state().checkins.clone()
    }

    pub fn coupon_usages(&self) -> Vec<NewCouponUsage> {
        self.state().coupon_usage.clone()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn find_event(&self, tenant_id: Uuid, event_id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self
            .state()
            .events
            .get(&event_id)
            .filter(|event| event.tenant_id == tenant_id)
            .cloned())
    }

    async fn lots_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        lot_ids: &[Uuid],
    ) -> StoreResult<Vec<Lot>> {
        let state = self.state();
        Ok(lot_ids
            .iter()
            .filter_map(|id| state.lots.get(id))
            .filter(|lot| state.type_in_event(lot.ticket_type_id, tenant_id, event_id))
            .cloned()
            .collect())
    }

    async fn ticket_types_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        ticket_type_ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>> {
        let state = self.state();
        Ok(ticket_type_ids
            .iter()
            .filter(|id| state.type_in_event(**id, tenant_id, event_id))
            .filter_map(|id| state.ticket_types.get(id))
            .cloned()
            .collect())
    }

    async fn sector_allocations(
        &self,
        tenant_id: Uuid,
        sector_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let state = self.state();
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for lot in state.lots.values() {
            let Some(tt) = state.ticket_types.get(&lot.ticket_type_id) else {
                continue;
            };
            let in_tenant = state
                .event_of_type(tt.id)
                .is_some_and(|event| event.tenant_id == tenant_id);
            if in_tenant && sector_ids.contains(&tt.sector_id) {
                *totals.entry(tt.sector_id).or_default() += i64::from(lot.qtd_total);
            }
        }
        Ok(totals)
    }

    async fn paid_tickets_by_type(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let state = self.state();
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for ticket in state.tickets.values() {
            if ticket.status == TicketStatus::Cancelado {
                continue;
            }
            let paid = state.orders.get(&ticket.order_id).is_some_and(|order| {
                order.tenant_id == tenant_id
                    && order.event_id == event_id
                    && order.status == OrderStatus::Pago
                    && order.comprador_cpf == cpf
            });
            if paid {
                *counts.entry(ticket.ticket_type_id).or_default() += 1;
            }
        }
        Ok(counts)
    }

    async fn active_coupons(&self, event_id: Uuid, codes: &[String]) -> StoreResult<Vec<Coupon>> {
        Ok(self
            .state()
            .coupons
            .values()
            .filter(|c| c.event_id == event_id && c.ativo && codes.contains(&c.codigo))
            .cloned()
            .collect())
    }

    async fn coupon_usage_by_cpf(
        &self,
        coupon_ids: &[Uuid],
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for usage in &self.state().coupon_usage {
            if usage.cpf == cpf && coupon_ids.contains(&usage.coupon_id) {
                *counts.entry(usage.coupon_id).or_default() += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn try_increment_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<bool> {
        let mut state = self.state();
        let Some(lot) = state.lots.get_mut(&lot_id) else {
            return Ok(false);
        };
        let sold = i64::from(lot.qtd_vendida) + quantity;
        match i32::try_from(sold) {
            Ok(sold) if quantity > 0 && sold <= lot.qtd_total => {
                lot.qtd_vendida = sold;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<()> {
        let mut state = self.state();
        if let Some(lot) = state.lots.get_mut(&lot_id) {
            let remaining = i64::from(lot.qtd_vendida) - quantity;
            if let Ok(remaining) = i32::try_from(remaining) {
                if remaining >= 0 {
                    lot.qtd_vendida = remaining;
                }
            }
        }
        Ok(())
    }

    async fn try_consume_coupon(
        &self,
        coupon_id: Uuid,
        limit_total: Option<i64>,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        let Some(coupon) = state.coupons.get_mut(&coupon_id) else {
            return Ok(false);
        };
        if limit_total.is_some_and(|limit| i64::from(coupon.uso_total) + 1 > limit) {
            return Ok(false);
        }
        coupon.uso_total += 1;
        Ok(true)
    }

    async fn release_coupon(&self, coupon_id: Uuid) -> StoreResult<()> {
        if let Some(coupon) = self.state().coupons.get_mut(&coupon_id) {
            if coupon.uso_total > 0 {
                coupon.uso_total -= 1;
            }
        }
        Ok(())
    }

    async fn record_coupon_usage(&self, usage: NewCouponUsage) -> StoreResult<()> {
        self.state().coupon_usage.push(usage);
        Ok(())
    }

    async fn release_coupon_usage(&self, coupon_id: Uuid, order_id: Uuid) -> StoreResult<()> {
        self.state()
            .coupon_usage
            .retain(|u| !(u.coupon_id == coupon_id && u.order_id == order_id));
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order(&self, tenant_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self
            .state()
            .orders
            .get(&order_id)
            .filter(|order| order.tenant_id == tenant_id)
            .cloned())
    }

    async fn transition_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        total: Option<Decimal>,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        match state.orders.get_mut(&order_id) {
            Some(order) if order.tenant_id == tenant_id && order.status == from => {
                order.status = to;
                if let Some(total) = total {
                    order.total = total;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        Ok(self.state().tickets.get(&ticket_id).cloned())
    }

    async fn try_check_in(&self, ticket_id: Uuid, nonce: &str) -> StoreResult<bool> {
        let mut state = self.state();
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket)
                if ticket.status.is_eligible_for_checkin()
                    && ticket.qr_nonce.as_deref() == Some(nonce) =>
            {
                ticket.status = TicketStatus::Checkin;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_checkin(&self, checkin: NewCheckin) -> StoreResult<()> {
        self.state().checkins.push(checkin);
        Ok(())
    }

    async fn rotate_qr(&self, ticket_id: Uuid, rotation: QrRotation) -> StoreResult<Option<i32>> {
        let mut state = self.state();
        match state.tickets.get_mut(&ticket_id) {
            Some(ticket) if ticket.status.is_eligible_for_checkin() => {
                ticket.nome_titular = Some(rotation.nome_titular);
                ticket.cpf_titular = Some(rotation.cpf_titular);
                ticket.qr_nonce = Some(rotation.qr_nonce);
                ticket.qr_kid = Some(rotation.qr_kid);
                ticket.qr_version += 1;
                Ok(Some(ticket.qr_version))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl AuthorizationPort for MemoryStore {
    async fn authenticate(&self, credential: &str) -> StoreResult<Option<Operator>> {
        Ok(self
            .state()
            .credentials
            .get(&credential_digest(credential))
            .filter(|(_, revoked)| !revoked)
            .map(|(user_id, _)| Operator { user_id: *user_id }))
    }

    async fn has_role(
        &self,
        operator: &Operator,
        tenant_id: Uuid,
        role: Role,
    ) -> StoreResult<bool> {
        Ok(self
            .state()
            .roles
            .contains(&(operator.user_id, tenant_id, role)))
    }
}
