use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;
use crate::utils::response::{error as error_response, ApiErrorBody};

/// Wire codes shared by every endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidCpf,
    InvalidQuantity,
    EmptyCart,
    EventNotFound,
    LotsNotFound,
    TypesNotFound,
    LotNotFound,
    TypeNotFound,
    LotTypeMismatch,
    LoteForaDaJanela,
    LoteSemEstoque,
    LimitMaxPorTipoPorPedido,
    LimitMaxTotalPorPedido,
    LimitMaxPorCpfPorTipo,
    LimitMaxPorCpfNoEvento,
    CupomNaoEncontrado,
    CupomNaoCombinavel,
    LimiteTotalExcedido,
    LimitePorCpfExcedido,
    OrderNotFound,
    OrderNotDraft,
    OrderTransitionInvalid,
    TicketNotFound,
    TicketNotEligible,
    TicketCancelled,
    QrMalformed,
    QrNonceMismatch,
    ConcurrentCheckin,
    InvalidHolder,
    InvalidRequest,
    Unauthorized,
    Forbidden,
    MissingTenant,
    InternalError,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Missing tenant: {0}")]
    MissingTenant(String),

    #[error("Store error")]
    StoreError(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::MissingTenant(_) => StatusCode::BAD_REQUEST,
            AppError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ValidationError(_) => ErrorCode::InvalidRequest,
            AppError::AuthError(_) => ErrorCode::Unauthorized,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::MissingTenant(_) => ErrorCode::MissingTenant,
            AppError::StoreError(_) => ErrorCode::InternalError,
        }
    }

    /// Client-facing message; store failures never expose their cause.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::MissingTenant(msg) => msg.clone(),
            AppError::StoreError(_) => "Erro interno".to_string(),
        }
    }

    pub fn log(&self) {
        match self {
            AppError::StoreError(e) => {
                error!(error = ?e, "Store error");
            }
            other => {
                tracing::warn!(error = %other, "Request rejected");
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

/// How a rejected request is classified; decides the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Malformed input the client can fix before retrying.
    Input,
    /// A referenced entity does not exist for this tenant.
    NotFound,
    Forbidden,
    /// Stock, limits, coupon rules and state conflicts.
    BusinessRule,
}

/// An expected, non-exceptional refusal carrying every collected error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub errors: Vec<ApiErrorBody>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, errors: Vec<ApiErrorBody>) -> Self {
        Self { kind, errors }
    }

    pub fn single(kind: RejectionKind, error: ApiErrorBody) -> Self {
        Self::new(kind, vec![error])
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            RejectionKind::Input | RejectionKind::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            RejectionKind::NotFound => StatusCode::NOT_FOUND,
            RejectionKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status_code();
        error_response(self.errors, status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.log();
        error_response(
            vec![ApiErrorBody::new(self.code(), self.public_message())],
            status,
        )
    }
}
