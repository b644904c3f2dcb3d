use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::ErrorCode;

#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

/// One machine-readable failure, optionally pointing at the offending entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_type_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

impl ApiErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            ticket_type_id: None,
            lot_id: None,
            coupon_code: None,
        }
    }

    pub fn for_type(mut self, ticket_type_id: Uuid) -> Self {
        self.ticket_type_id = Some(ticket_type_id);
        self
    }

    pub fn for_lot(mut self, lot_id: Uuid) -> Self {
        self.lot_id = Some(lot_id);
        self
    }

    pub fn for_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub ok: bool,
    pub errors: Vec<ApiErrorBody>,
}

pub fn success<T>(data: T) -> Response
where
    T: Serialize,
{
    let body = ApiResponse { ok: true, data };
    (StatusCode::OK, Json(body)).into_response()
}

pub fn error(errors: Vec<ApiErrorBody>, status: StatusCode) -> Response {
    let body = ApiErrorResponse { ok: false, errors };
    (status, Json(body)).into_response()
}
