use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
use crate::handlers::parse_path_id;
use crate::middleware::AuthenticatedUser;
use crate::models::filters::TransactionListQuery;
use crate::models::summary::Summary;
use crate::models::transaction::{Transaction, TransactionInput, TransactionList};
use crate::services::transaction_service::{TransactionError, TransactionService};

/// Headers a client may use to announce its time zone, in order of preference
const TIMEZONE_HEADERS: [&str; 2] = ["x-timezone", "x-user-timezone"];

impl From<TransactionError> for ApiError {
    fn from(error: TransactionError) -> Self {
        let message = error.to_string();
        match error {
            TransactionError::Validation(_) => ApiError::validation(message),
            TransactionError::Category(inner) => ApiError::from(inner),
            TransactionError::NotFound => {
                ApiError::new(ErrorKind::NotFound, "transaction_not_found", message)
            }
            TransactionError::Forbidden => ApiError::new(ErrorKind::Forbidden, "forbidden", message),
            TransactionError::TimezoneRequired => {
                ApiError::new(ErrorKind::Validation, "timezone_required", message)
            }
            TransactionError::InvalidTimezone => {
                ApiError::new(ErrorKind::Validation, "invalid_timezone", message)
            }
            TransactionError::NotToday => ApiError::new(ErrorKind::Conflict, "not_today", message),
            TransactionError::UserNotFound => {
                ApiError::new(ErrorKind::NotFound, "user_not_found", message)
            }
            TransactionError::Overflow(_) | TransactionError::DatabaseError(_) => {
                ApiError::internal(message)
            }
        }
    }
}

fn transaction_not_found() -> ApiError {
    TransactionError::NotFound.into()
}

/// Query accepted by the delete endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimezoneQuery {
    /// IANA time zone, used when neither the profile nor a header sets one
    pub timezone: Option<String>,
}

/// First non-blank time zone from the headers, then the query string
fn requested_timezone(headers: &HeaderMap, query: TimezoneQuery) -> Option<String> {
    TIMEZONE_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .or(query.timezone)
}

/// Create a transaction; without a date it is stamped with the current time
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    request_body = TransactionInput,
    responses(
        (status = 201, description = "Transaction created", body = Transaction),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn create_transaction_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let Json(input) = payload?;
    let transaction = transaction_service.create(user.user_id, input, false).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Create a transaction for an explicit date
#[utoipa::path(
    post,
    path = "/api/v1/transactions/custom",
    request_body = TransactionInput,
    responses(
        (status = 201, description = "Transaction created", body = Transaction),
        (status = 400, description = "Validation error or missing date", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn create_custom_transaction_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let Json(input) = payload?;
    let transaction = transaction_service.create(user.user_id, input, true).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// List the user's transactions with optional filters, sorting and paging
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions", body = TransactionList),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn list_transactions_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<TransactionListQuery>, QueryRejection>,
) -> ApiResult<Json<TransactionList>> {
    let Query(query) = query?;
    let list = transaction_service.list(user.user_id, query).await?;
    Ok(Json(list))
}

/// Income, expense and balance with monthly, weekly and yearly buckets
#[utoipa::path(
    get,
    path = "/api/v1/transactions/summary",
    responses(
        (status = 200, description = "Summary of active transactions", body = Summary),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn summary_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Summary>> {
    Ok(Json(transaction_service.summary(user.user_id).await?))
}

/// Partially update a transaction
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{id}",
    params(("id" = uuid::Uuid, Path, description = "Transaction ID")),
    request_body = TransactionInput,
    responses(
        (status = 200, description = "Transaction updated", body = Transaction),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Transaction or category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn update_transaction_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<Json<Transaction>> {
    let transaction_id = parse_path_id(&id, transaction_not_found)?;
    let Json(input) = payload?;

    let transaction = transaction_service
        .update(user.user_id, transaction_id, input)
        .await?;
    Ok(Json(transaction))
}

/// Delete a transaction dated today in the user's time zone
///
/// The zone comes from the user's profile, else the `X-Timezone` or
/// `X-User-Timezone` header, else the `timezone` query parameter.
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/{id}",
    params(
        ("id" = uuid::Uuid, Path, description = "Transaction ID"),
        TimezoneQuery
    ),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 400, description = "Missing or invalid time zone", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Transaction belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 409, description = "Transaction is not dated today", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "transactions"
)]
pub async fn delete_transaction_handler(
    State(transaction_service): State<Arc<dyn TransactionService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<TimezoneQuery>, QueryRejection>,
) -> ApiResult<StatusCode> {
    let transaction_id = parse_path_id(&id, transaction_not_found)?;
    let Query(query) = query?;

    transaction_service
        .delete(
            user.user_id,
            transaction_id,
            requested_timezone(&headers, query),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
