use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
use crate::middleware::AuthenticatedUser;
use crate::models::currency::{CurrencyList, UpdateCurrencyRequest, UpdateCurrencyResponse};
use crate::services::currency_service::{CurrencyError, CurrencyService};

impl From<CurrencyError> for ApiError {
    fn from(error: CurrencyError) -> Self {
        let message = error.to_string();
        match error {
            CurrencyError::Required => ApiError::validation(message),
            CurrencyError::InvalidCurrency(_) => {
                ApiError::new(ErrorKind::Validation, "invalid_currency", message)
            }
            CurrencyError::UserNotFound => {
                ApiError::new(ErrorKind::NotFound, "user_not_found", message)
            }
            CurrencyError::DatabaseError(_) => ApiError::internal(message),
        }
    }
}

/// List the currencies a user can choose from
#[utoipa::path(
    get,
    path = "/api/v1/currencies",
    responses(
        (status = 200, description = "Supported currencies ordered by name", body = CurrencyList),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "currencies"
)]
pub async fn list_currencies_handler(
    State(currency_service): State<Arc<dyn CurrencyService>>,
) -> ApiResult<Json<CurrencyList>> {
    Ok(Json(currency_service.list().await?))
}

/// Change the authenticated user's currency
#[utoipa::path(
    put,
    path = "/api/v1/users/currency",
    request_body = UpdateCurrencyRequest,
    responses(
        (status = 200, description = "Currency updated", body = UpdateCurrencyResponse),
        (status = 400, description = "Missing or unsupported currency", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "currencies"
)]
pub async fn update_currency_handler(
    State(currency_service): State<Arc<dyn CurrencyService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateCurrencyRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateCurrencyResponse>> {
    let Json(request) = payload?;
    let response = currency_service
        .update_user_currency(user.user_id, request)
        .await?;
    Ok(Json(response))
}
