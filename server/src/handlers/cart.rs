use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::cart::{CartRequest, CartSummary};
use crate::state::AppState;
use crate::utils::error::AppError;

use super::respond;

#[derive(Serialize)]
struct QuoteBody {
    summary: CartSummary,
}

/// `POST /api/cart/validate`: quote only, nothing is reserved.
pub async fn validate_cart(
    State(state): State<AppState>,
    body: Result<Json<CartRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body?;
    let outcome = state
        .validator
        .validate(&request, Utc::now())
        .await
        .map(|quote| quote.map(|q| QuoteBody { summary: q.summary }));

    respond(outcome)
}

/// `POST /api/orders/:id/confirm`
pub async fn confirm_order(
    State(state): State<AppState>,
    order_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<CartRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(order_id) = order_id?;
    let Json(request) = body?;

    respond(state.confirmer.confirm(order_id, &request, Utc::now()).await)
}
