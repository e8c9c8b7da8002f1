use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
use crate::handlers::parse_path_id;
use crate::middleware::AuthenticatedUser;
use crate::models::category::{
    ArchiveCategoryResponse, CategoryList, CreateCategoryRequest, CreateCategoryResponse,
    SetDefaultCategoryRequest, SetDefaultCategoryResponse,
};
use crate::services::category_service::{CategoryError, CategoryService};

impl From<CategoryError> for ApiError {
    fn from(error: CategoryError) -> Self {
        let message = error.to_string();
        match error {
            CategoryError::InvalidType => ApiError::new(ErrorKind::Validation, "invalid_type", message),
            CategoryError::Validation(_) => ApiError::validation(message),
            CategoryError::CategoryNotFound | CategoryError::Unresolved => {
                ApiError::new(ErrorKind::NotFound, "category_not_found", message)
            }
            CategoryError::Inactive => {
                ApiError::new(ErrorKind::Validation, "category_inactive", message)
            }
            CategoryError::AlreadyExists => {
                ApiError::new(ErrorKind::Conflict, "category_exists", message)
            }
            CategoryError::QuotaExceeded { .. } => {
                ApiError::new(ErrorKind::Validation, "category_limit_reached", message)
            }
            CategoryError::DefaultNotArchivable => {
                ApiError::new(ErrorKind::Validation, "default_category", message)
            }
            CategoryError::UserNotFound => {
                ApiError::new(ErrorKind::NotFound, "user_not_found", message)
            }
            CategoryError::DatabaseError(_) => ApiError::internal(message),
        }
    }
}

/// Optional type filter for category listings
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryTypeQuery {
    /// `income` or `expense`
    #[serde(rename = "type")]
    pub category_type: Option<String>,
}

/// List active categories visible to the user
#[utoipa::path(
    get,
    path = "/api/v1/categories/active",
    params(CategoryTypeQuery),
    responses(
        (status = 200, description = "Active categories and the user's limit", body = CategoryList),
        (status = 400, description = "Invalid type", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn list_active_categories_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<CategoryTypeQuery>, QueryRejection>,
) -> ApiResult<Json<CategoryList>> {
    let Query(query) = query?;
    let list = category_service
        .list_active(user.user_id, query.category_type)
        .await?;
    Ok(Json(list))
}

/// List all categories visible to the user, archived ones included
#[utoipa::path(
    get,
    path = "/api/v1/categories/all",
    params(CategoryTypeQuery),
    responses(
        (status = 200, description = "All categories and the user's limit", body = CategoryList),
        (status = 400, description = "Invalid type", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn list_all_categories_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<CategoryTypeQuery>, QueryRejection>,
) -> ApiResult<Json<CategoryList>> {
    let Query(query) = query?;
    let list = category_service
        .list_all(user.user_id, query.category_type)
        .await?;
    Ok(Json(list))
}

/// Create a category
///
/// Returns 201 for a new category and 200 when an archived category with the
/// same name and type was reactivated.
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CreateCategoryResponse),
        (status = 200, description = "Archived category reactivated", body = CreateCategoryResponse),
        (status = 400, description = "Validation error or limit reached", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Category already exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn create_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CreateCategoryResponse>)> {
    let Json(request) = payload?;
    let response = category_service.create(user.user_id, request).await?;

    let status = if response.reactivated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

/// Make a category the default for its type
#[utoipa::path(
    patch,
    path = "/api/v1/categories/{id}",
    params(("id" = uuid::Uuid, Path, description = "Category ID")),
    request_body = SetDefaultCategoryRequest,
    responses(
        (status = 200, description = "Default category updated", body = SetDefaultCategoryResponse),
        (status = 400, description = "Validation error or inactive category", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn set_default_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    payload: Result<Json<SetDefaultCategoryRequest>, JsonRejection>,
) -> ApiResult<Json<SetDefaultCategoryResponse>> {
    let category_id = parse_path_id(&id, || CategoryError::CategoryNotFound.into())?;
    let Json(request) = payload?;

    let response = category_service
        .set_default(user.user_id, category_id, request)
        .await?;
    Ok(Json(response))
}

/// Archive (soft delete) a category
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = uuid::Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category archived", body = ArchiveCategoryResponse),
        (status = 400, description = "Default categories cannot be removed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn archive_category_handler(
    State(category_service): State<Arc<dyn CategoryService>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<ArchiveCategoryResponse>> {
    let category_id = parse_path_id(&id, || CategoryError::CategoryNotFound.into())?;
    let response = category_service.archive(user.user_id, category_id).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let error = ApiError::from(CategoryError::QuotaExceeded { limit: 10 });
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.message, "Category limit of 10 reached");

        let error = ApiError::from(CategoryError::Unresolved);
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert_eq!(
            error.message,
            "Category not found. Create it before assigning to a transaction."
        );

        assert_eq!(ApiError::from(CategoryError::AlreadyExists).kind, ErrorKind::Conflict);
        assert_eq!(ApiError::from(CategoryError::Inactive).kind, ErrorKind::Validation);
        assert_eq!(
            ApiError::from(CategoryError::DatabaseError("boom".to_string())).kind,
            ErrorKind::Internal
        );
    }
}
