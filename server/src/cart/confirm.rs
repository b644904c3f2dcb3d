//! Turns a validated cart into a committed order.
//!
//! Stock and coupon counters are taken one conditional update at a time and
//! coupon usage rows are written before the order leaves `rascunho`. When any
//! step loses (stock sold out, coupon exhausted, order moved) or the store
//! fails, everything already taken is released before returning, so a failed
//! confirmation leaves no partial mutation behind.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{NewCouponUsage, OrderStatus};
use crate::store::{InventoryStore, OrderStore, StoreResult};
use crate::utils::error::{ErrorCode, Rejection, RejectionKind};
use crate::utils::response::ApiErrorBody;

use super::types::{CartQuote, CartRequest, CartSummary};
use super::validator::CartValidator;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedOrder {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub summary: CartSummary,
}

/// Counters and usage rows taken so far by one confirmation.
#[derive(Debug, Default)]
struct Taken {
    lots: Vec<(Uuid, i64)>,
    coupons: Vec<Uuid>,
    usages: Vec<(Uuid, Uuid)>,
}

pub struct OrderConfirmer {
    validator: Arc<CartValidator>,
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderStore>,
}

impl OrderConfirmer {
    pub fn new(
        validator: Arc<CartValidator>,
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            validator,
            inventory,
            orders,
        }
    }

    #[instrument(skip(self, request, now), fields(tenant_id = %request.tenant_id, order_id = %order_id))]
    pub async fn confirm(
        &self,
        order_id: Uuid,
        request: &CartRequest,
        now: DateTime<Utc>,
    ) -> StoreResult<Result<ConfirmedOrder, Rejection>> {
        let order = match self.orders.find_order(request.tenant_id, order_id).await? {
            Some(order) if order.event_id == request.event_id => order,
            _ => {
                return Ok(Err(Rejection::single(
                    RejectionKind::NotFound,
                    ApiErrorBody::new(ErrorCode::OrderNotFound, "Pedido não encontrado"),
                )))
            }
        };

        if order.status != OrderStatus::Rascunho {
            return Ok(Err(not_draft(order.status)));
        }

        let quote = match self.validator.validate(request, now).await? {
            Ok(quote) => quote,
            Err(rejection) => return Ok(Err(rejection)),
        };

        if quote.cpf.as_str() != order.comprador_cpf {
            warn!("Cart CPF differs from the order buyer");
            return Ok(Err(Rejection::single(
                RejectionKind::NotFound,
                ApiErrorBody::new(ErrorCode::OrderNotFound, "Pedido não encontrado"),
            )));
        }

        let mut taken = Taken::default();
        let outcome = self.commit(request.tenant_id, order_id, &quote, &mut taken).await;

        match outcome {
            Ok(None) => {
                info!(total = %quote.summary.pricing.total, "Order confirmed");
                Ok(Ok(ConfirmedOrder {
                    order_id,
                    status: OrderStatus::AguardandoPagto,
                    summary: quote.summary,
                }))
            }
            Ok(Some(rejection)) => {
                self.release(&taken).await;
                Ok(Err(rejection))
            }
            Err(e) => {
                self.release(&taken).await;
                Err(e)
            }
        }
    }

    /// Takes every counter in turn. `Some` means a precondition no longer held.
    async fn commit(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        quote: &CartQuote,
        taken: &mut Taken,
    ) -> StoreResult<Option<Rejection>> {
        for lot in &quote.summary.by_lot {
            if !self.inventory.try_increment_stock(lot.lot_id, lot.qty).await? {
                info!(lot_id = %lot.lot_id, qty = lot.qty, "Stock taken by a concurrent order");
                return Ok(Some(Rejection::single(
                    RejectionKind::BusinessRule,
                    ApiErrorBody::new(
                        ErrorCode::LoteSemEstoque,
                        format!("Estoque insuficiente para {} ingresso(s)", lot.qty),
                    )
                    .for_lot(lot.lot_id),
                )));
            }
            taken.lots.push((lot.lot_id, lot.qty));
        }

        // Coupons listed at zero discount were accepted but grant nothing,
        // so they neither count against their limits nor leave usage rows.
        let discounts = quote
            .summary
            .pricing
            .discounts
            .iter()
            .filter(|d| !d.applied_to.is_empty());
        for discount in discounts {
            if !self
                .inventory
                .try_consume_coupon(discount.coupon_id, discount.limit_total)
                .await?
            {
                return Ok(Some(Rejection::single(
                    RejectionKind::BusinessRule,
                    ApiErrorBody::new(
                        ErrorCode::LimiteTotalExcedido,
                        format!("Cupom {} atingiu o limite de usos", discount.code),
                    )
                    .for_coupon(discount.code.clone()),
                )));
            }
            taken.coupons.push(discount.coupon_id);

            // Usage rows back the per-CPF limit, so they land before the order moves.
            self.inventory
                .record_coupon_usage(NewCouponUsage {
                    coupon_id: discount.coupon_id,
                    order_id,
                    cpf: quote.cpf.as_str().to_string(),
                })
                .await?;
            taken.usages.push((discount.coupon_id, order_id));
        }

        let moved = self
            .orders
            .transition_order(
                tenant_id,
                order_id,
                OrderStatus::Rascunho,
                OrderStatus::AguardandoPagto,
                Some(quote.summary.pricing.total),
            )
            .await?;
        if !moved {
            return Ok(Some(not_draft(OrderStatus::AguardandoPagto)));
        }

        // The order is committed from here on; nothing may be released anymore.
        *taken = Taken::default();

        Ok(None)
    }

    async fn release(&self, taken: &Taken) {
        for (coupon_id, order_id) in &taken.usages {
            if let Err(e) = self.inventory.release_coupon_usage(*coupon_id, *order_id).await {
                error!(coupon_id = %coupon_id, error = ?e, "Failed to remove coupon usage");
            }
        }
        for (lot_id, qty) in &taken.lots {
            if let Err(e) = self.inventory.release_stock(*lot_id, *qty).await {
                error!(lot_id = %lot_id, qty, error = ?e, "Failed to release stock");
            }
        }
        for coupon_id in &taken.coupons {
            if let Err(e) = self.inventory.release_coupon(*coupon_id).await {
                error!(coupon_id = %coupon_id, error = ?e, "Failed to release coupon use");
            }
        }
    }
}

fn not_draft(status: OrderStatus) -> Rejection {
    Rejection::single(
        RejectionKind::BusinessRule,
        ApiErrorBody::new(
            ErrorCode::OrderNotDraft,
            format!("Pedido em {} não pode ser confirmado", status.as_str()),
        ),
    )
}
