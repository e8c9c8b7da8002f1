use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;
use validator::Validate;

use crate::error::{ApiError, ApiResult, ErrorKind, ErrorResponse};
use crate::middleware::AuthenticatedUser;
use crate::models::auth::{AuthSession, LoginRequest, RefreshRequest};
use crate::models::user::{CreateUserRequest, UpdateProfileRequest, UserProfile};
use crate::services::auth_service::{AuthError, AuthService, normalize_email};

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let message = error.to_string();
        match error {
            AuthError::DuplicateEmail => ApiError::new(ErrorKind::Conflict, "email_taken", message),
            AuthError::InvalidCredentials => {
                ApiError::new(ErrorKind::Unauthorized, "invalid_credentials", message)
            }
            AuthError::InvalidToken => ApiError::new(ErrorKind::Unauthorized, "invalid_token", message),
            AuthError::TokenExpired => ApiError::new(ErrorKind::Unauthorized, "token_expired", message),
            AuthError::UserNotFound => {
                ApiError::new(ErrorKind::Unauthorized, "user_not_found", message)
            }
            AuthError::Internal(_) | AuthError::DatabaseError(_) => ApiError::internal(message),
        }
    }
}

/// Handler for user registration
///
/// Creates a new user account, provisions the default categories and signs
/// the user in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User successfully registered", body = AuthSession),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AuthSession>)> {
    let Json(mut request) = payload?;
    request.email = normalize_email(&request.email);
    request.validate()?;

    let session = auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Handler for user login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthSession),
        (status = 400, description = "Missing credentials", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<AuthSession>> {
    let Json(request) = payload?;

    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    Ok(Json(auth_service.login(request).await?))
}

/// Handler for exchanging a refresh token
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair issued", body = AuthSession),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> ApiResult<Json<AuthSession>> {
    let Json(request) = payload?;

    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::validation("Refresh token missing"));
    }

    Ok(Json(auth_service.refresh(request).await?))
}

/// Handler returning the authenticated user's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(auth_service.profile(user.user_id).await?))
}

/// Handler for editing the authenticated user's name and time zone
#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn update_me_handler(
    State(auth_service): State<Arc<dyn AuthService>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(request) = payload?;
    request.validate()?;

    Ok(Json(auth_service.update_profile(user.user_id, request).await?))
}
