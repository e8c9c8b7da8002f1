use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ErrorKind};
use crate::services::auth_service::{AuthError, AuthService};

/// Extension type to store authenticated user ID in request
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Auth middleware that validates bearer access tokens and adds the user to
/// request extensions
pub async fn auth_middleware(
    State(auth_service): State<Arc<dyn AuthService>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(ErrorKind::Unauthorized, "missing_token", "Access token missing")
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        ApiError::new(
            ErrorKind::Unauthorized,
            "invalid_token_format",
            "Invalid authorization header format. Expected: Bearer <token>",
        )
    })?;

    let user_id = auth_service
        .validate_token(token.trim())
        .await
        .map_err(|e| match e {
            AuthError::TokenExpired => {
                ApiError::new(ErrorKind::Unauthorized, "token_expired", "Access token expired")
            }
            AuthError::InvalidToken => {
                ApiError::new(ErrorKind::Unauthorized, "invalid_token", "Invalid access token")
            }
            other => ApiError::from(other),
        })?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}
