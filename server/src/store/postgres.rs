//! PostgreSQL implementation of the storage ports.
//!
//! Counter mutations are single conditional `UPDATE` statements; whether the
//! precondition held is read from `rows_affected`.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{credential_digest, AuthorizationPort, Operator, Role};
use crate::models::{
    Coupon, Event, Lot, NewCheckin, NewCouponUsage, Order, OrderStatus, QrRotation, Ticket,
    TicketType,
};

use super::{CatalogStore, InventoryStore, OrderStore, StoreResult, TicketStore};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_event(&self, tenant_id: Uuid, event_id: Uuid) -> StoreResult<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, tenant_id, titulo, status, regras_limite, created_at
             FROM events
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(event_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn lots_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        lot_ids: &[Uuid],
    ) -> StoreResult<Vec<Lot>> {
        let lots = sqlx::query_as::<_, Lot>(
            "SELECT l.id, l.ticket_type_id, l.nome, l.preco, l.qtd_total, l.qtd_vendida,
                    l.inicio_vendas, l.fim_vendas
             FROM lots l
             JOIN ticket_types tt ON tt.id = l.ticket_type_id
             WHERE l.id = ANY($1) AND l.tenant_id = $2 AND tt.event_id = $3",
        )
        .bind(lot_ids)
        .bind(tenant_id)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lots)
    }

    async fn ticket_types_by_ids(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        ticket_type_ids: &[Uuid],
    ) -> StoreResult<Vec<TicketType>> {
        let types = sqlx::query_as::<_, TicketType>(
            "SELECT tt.id, tt.event_id, tt.sector_id, tt.nome, tt.preco, tt.max_por_pedido,
                    tt.ativo, s.capacidade AS setor_capacidade
             FROM ticket_types tt
             JOIN sectors s ON s.id = tt.sector_id
             WHERE tt.id = ANY($1) AND tt.tenant_id = $2 AND tt.event_id = $3",
        )
        .bind(ticket_type_ids)
        .bind(tenant_id)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(types)
    }

    async fn sector_allocations(
        &self,
        tenant_id: Uuid,
        sector_ids: &[Uuid],
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT tt.sector_id, COALESCE(SUM(l.qtd_total), 0)::BIGINT
             FROM lots l
             JOIN ticket_types tt ON tt.id = l.ticket_type_id
             WHERE tt.sector_id = ANY($1) AND l.tenant_id = $2
             GROUP BY tt.sector_id",
        )
        .bind(sector_ids)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn paid_tickets_by_type(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT t.ticket_type_id, COUNT(*)
             FROM tickets t
             JOIN orders o ON o.id = t.order_id
             WHERE o.tenant_id = $1
               AND o.event_id = $2
               AND o.comprador_cpf = $3
               AND o.status = 'pago'
               AND t.status <> 'cancelado'
             GROUP BY t.ticket_type_id",
        )
        .bind(tenant_id)
        .bind(event_id)
        .bind(cpf)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn active_coupons(&self, event_id: Uuid, codes: &[String]) -> StoreResult<Vec<Coupon>> {
        let coupons = sqlx::query_as::<_, Coupon>(
            "SELECT id, event_id, codigo, tipo, valor, combinavel, limites, uso_total, ativo
             FROM coupons
             WHERE event_id = $1 AND codigo = ANY($2) AND ativo",
        )
        .bind(event_id)
        .bind(codes)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }

    async fn coupon_usage_by_cpf(
        &self,
        coupon_ids: &[Uuid],
        cpf: &str,
    ) -> StoreResult<HashMap<Uuid, i64>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT coupon_id, COUNT(*)
             FROM coupon_usage
             WHERE coupon_id = ANY($1) AND cpf = $2
             GROUP BY coupon_id",
        )
        .bind(coupon_ids)
        .bind(cpf)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn try_increment_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE lots
             SET qtd_vendida = qtd_vendida + $2
             WHERE id = $1 AND $2 > 0 AND qtd_vendida + $2 <= qtd_total",
        )
        .bind(lot_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_stock(&self, lot_id: Uuid, quantity: i64) -> StoreResult<()> {
        sqlx::query(
            "UPDATE lots
             SET qtd_vendida = qtd_vendida - $2
             WHERE id = $1 AND qtd_vendida >= $2",
        )
        .bind(lot_id)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn try_consume_coupon(
        &self,
        coupon_id: Uuid,
        limit_total: Option<i64>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE coupons
             SET uso_total = uso_total + 1
             WHERE id = $1 AND ativo AND ($2::BIGINT IS NULL OR uso_total + 1 <= $2)",
        )
        .bind(coupon_id)
        .bind(limit_total)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_coupon(&self, coupon_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE coupons SET uso_total = uso_total - 1 WHERE id = $1 AND uso_total > 0")
            .bind(coupon_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_coupon_usage(&self, usage: NewCouponUsage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO coupon_usage (id, coupon_id, order_id, cpf)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(usage.coupon_id)
        .bind(usage.order_id)
        .bind(&usage.cpf)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn release_coupon_usage(&self, coupon_id: Uuid, order_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM coupon_usage WHERE coupon_id = $1 AND order_id = $2")
            .bind(coupon_id)
            .bind(order_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn find_order(&self, tenant_id: Uuid, order_id: Uuid) -> StoreResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT id, tenant_id, event_id, comprador_id, comprador_cpf, status, total
             FROM orders
             WHERE id = $1 AND tenant_id = $2",
        )
        .bind(order_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn transition_order(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        total: Option<Decimal>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders
             SET status = $4, total = COALESCE($5, total), updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2 AND status = $3",
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .bind(total)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl TicketStore for PgStore {
    async fn find_ticket(&self, ticket_id: Uuid) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT id, tenant_id, order_id, ticket_type_id, sector_id, status,
                    nome_titular, cpf_titular, qr_nonce, qr_kid, qr_version
             FROM tickets
             WHERE id = $1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ticket)
    }

    async fn try_check_in(&self, ticket_id: Uuid, nonce: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE tickets
             SET status = 'checkin', checked_in_at = NOW()
             WHERE id = $1 AND status IN ('emitido', 'transferido') AND qr_nonce = $2",
        )
        .bind(ticket_id)
        .bind(nonce)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_checkin(&self, checkin: NewCheckin) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO checkins (id, tenant_id, ticket_id, operator_id, gate, device_id, resultado)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(checkin.tenant_id)
        .bind(checkin.ticket_id)
        .bind(checkin.operator_id)
        .bind(checkin.gate)
        .bind(checkin.device_id)
        .bind(checkin.resultado)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_qr(&self, ticket_id: Uuid, rotation: QrRotation) -> StoreResult<Option<i32>> {
        let version: Option<(i32,)> = sqlx::query_as(
            "UPDATE tickets
             SET nome_titular = $2, cpf_titular = $3, qr_nonce = $4, qr_kid = $5,
                 qr_version = qr_version + 1
             WHERE id = $1 AND status IN ('emitido', 'transferido')
             RETURNING qr_version",
        )
        .bind(ticket_id)
        .bind(rotation.nome_titular)
        .bind(rotation.cpf_titular)
        .bind(rotation.qr_nonce)
        .bind(rotation.qr_kid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(|(v,)| v))
    }
}

#[async_trait]
impl AuthorizationPort for PgStore {
    async fn authenticate(&self, credential: &str) -> StoreResult<Option<Operator>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM operator_credentials WHERE token_hash = $1 AND NOT revoked",
        )
        .bind(credential_digest(credential))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user_id,)| Operator { user_id }))
    }

    async fn has_role(
        &self,
        operator: &Operator,
        tenant_id: Uuid,
        role: Role,
    ) -> StoreResult<bool> {
        let (granted,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                 SELECT 1 FROM user_roles WHERE user_id = $1 AND tenant_id = $2 AND role = $3
             )",
        )
        .bind(operator.user_id)
        .bind(tenant_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(granted)
    }
}
