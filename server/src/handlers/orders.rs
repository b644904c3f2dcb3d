use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Operator, TenantHeader};
use crate::models::OrderStatus;
use crate::state::AppState;
use crate::utils::error::AppError;

use super::respond;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// `POST /api/orders/:id/status`, called by the payment webhook adapter.
pub async fn change_order_status(
    State(state): State<AppState>,
    operator: Operator,
    TenantHeader(tenant_id): TenantHeader,
    order_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<StatusChange>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(order_id) = order_id?;
    let Json(change) = body?;

    respond(
        state
            .lifecycle
            .advance(tenant_id, order_id, change.status, &operator)
            .await,
    )
}
