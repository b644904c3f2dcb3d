//! Payment-driven order status changes.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{AuthorizationPort, Operator};
use crate::models::OrderStatus;
use crate::store::{OrderStore, StoreResult};
use crate::utils::error::{ErrorCode, Rejection, RejectionKind};
use crate::utils::response::ApiErrorBody;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransition {
    pub order_id: Uuid,
    pub from: OrderStatus,
    pub status: OrderStatus,
}

pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    authz: Arc<dyn AuthorizationPort>,
}

impl OrderLifecycle {
    pub fn new(orders: Arc<dyn OrderStore>, authz: Arc<dyn AuthorizationPort>) -> Self {
        Self { orders, authz }
    }

    #[instrument(skip(self, operator), fields(operator_id = %operator.user_id))]
    pub async fn advance(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        to: OrderStatus,
        operator: &Operator,
    ) -> StoreResult<Result<OrderTransition, Rejection>> {
        if !self.authz.is_tenant_admin(operator, tenant_id).await? {
            warn!("Order status change by a non-admin");
            return Ok(Err(Rejection::single(
                RejectionKind::Forbidden,
                ApiErrorBody::new(ErrorCode::Forbidden, "Apenas administradores alteram pedidos"),
            )));
        }

        let Some(order) = self.orders.find_order(tenant_id, order_id).await? else {
            return Ok(Err(Rejection::single(
                RejectionKind::NotFound,
                ApiErrorBody::new(ErrorCode::OrderNotFound, "Pedido não encontrado"),
            )));
        };

        let from = order.status;
        if !from.can_transition_to(to) {
            return Ok(Err(invalid_transition(from, to)));
        }

        if !self
            .orders
            .transition_order(tenant_id, order_id, from, to, None)
            .await?
        {
            // Someone moved the order first; report against what it is now.
            let current = self
                .orders
                .find_order(tenant_id, order_id)
                .await?
                .map(|o| o.status)
                .unwrap_or(from);
            warn!(from = from.as_str(), current = current.as_str(), "Lost order status race");
            return Ok(Err(invalid_transition(current, to)));
        }

        info!(from = from.as_str(), to = to.as_str(), "Order status changed");
        Ok(Ok(OrderTransition {
            order_id,
            from,
            status: to,
        }))
    }
}

fn invalid_transition(from: OrderStatus, to: OrderStatus) -> Rejection {
    Rejection::single(
        RejectionKind::BusinessRule,
        ApiErrorBody::new(
            ErrorCode::OrderTransitionInvalid,
            format!(
                "Pedido não pode passar de {} para {}",
                from.as_str(),
                to.as_str()
            ),
        ),
    )
}
