pub mod cart;
pub mod checkin;
pub mod health;
pub mod orders;

pub use cart::{confirm_order, validate_cart};
pub use checkin::{issue_qr, scan};
pub use health::health_check;
pub use orders::change_order_status;

use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::store::StoreResult;
use crate::utils::error::{AppError, Rejection};
use crate::utils::response::success;

/// Rejections keep their own status; store failures surface as `AppError`.
fn respond<T: Serialize>(outcome: StoreResult<Result<T, Rejection>>) -> Result<Response, AppError> {
    match outcome? {
        Ok(data) => Ok(success(data)),
        Err(rejection) => Ok(rejection.into_response()),
    }
}
