use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{Operator, TenantHeader};
use crate::checkin::{IssueRequest, ScanOutcome, ScanRequest};
use crate::models::CheckinResult;
use crate::state::AppState;
use crate::utils::error::{AppError, ErrorCode};

use super::respond;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBody {
    pub qr: String,
    pub gate: Option<String>,
    pub device_id: Option<String>,
}

/// Scanner wire shape. Every answer, including auth failures, uses it so the
/// gate app has a single thing to parse.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub ok: bool,
    pub result: CheckinResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl From<ScanOutcome> for ScanResponse {
    fn from(outcome: ScanOutcome) -> Self {
        Self {
            ok: outcome.is_ok(),
            result: outcome.result(),
            ticket_id: outcome.ticket_id(),
            error: outcome.error_code(),
        }
    }
}

fn refused(err: AppError) -> Response {
    err.log();
    let body = ScanResponse {
        ok: false,
        result: CheckinResult::Invalido,
        ticket_id: None,
        error: Some(err.code()),
    };
    (err.status_code(), Json(body)).into_response()
}

/// `POST /api/checkin/scan`
pub async fn scan(
    State(state): State<AppState>,
    operator: Result<Operator, AppError>,
    tenant: Result<TenantHeader, AppError>,
    body: Result<Json<ScanBody>, JsonRejection>,
) -> Response {
    let operator = match operator {
        Ok(operator) => operator,
        Err(e) => return refused(e),
    };
    let TenantHeader(tenant_id) = match tenant {
        Ok(tenant) => tenant,
        Err(e) => return refused(e),
    };
    let Json(body) = match body {
        Ok(body) => body,
        Err(e) => return refused(e.into()),
    };

    let request = ScanRequest {
        tenant_id,
        qr: body.qr,
        gate: body.gate,
        device_id: body.device_id,
    };

    match state.checkin.scan(&request, &operator).await {
        Ok(outcome) => (outcome.status_code(), Json(ScanResponse::from(outcome))).into_response(),
        Err(e) => refused(e.into()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueBody {
    pub holder_name: String,
    pub holder_cpf: String,
}

/// `POST /api/tickets/:id/qr`: names the ticket and returns its fresh QR.
pub async fn issue_qr(
    State(state): State<AppState>,
    operator: Operator,
    TenantHeader(tenant_id): TenantHeader,
    ticket_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<IssueBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Path(ticket_id) = ticket_id?;
    let Json(body) = body?;

    let request = IssueRequest {
        tenant_id,
        ticket_id,
        holder_name: body.holder_name,
        holder_cpf: body.holder_cpf,
    };

    respond(state.issuer.issue(&request, &operator, Utc::now()).await)
}
