use async_trait::async_trait;
use bcrypt::{hash, verify};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::auth::{AuthSession, LoginRequest, RefreshRequest};
use crate::models::user::{CreateUserRequest, NewUser, UpdateProfileRequest, User, UserProfile};
use crate::repositories::{RepositoryError, UserRepository};
use crate::services::category_defaults::DefaultCategoryBootstrapper;
use crate::services::notifier::{self, NotificationKind, Notifier};
use crate::services::token_service::{TokenError, TokenKind, TokenService};

/// Authentication service errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("User not found for this token")]
    UserNotFound,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<TokenError> for AuthError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Signing(msg) => AuthError::Internal(msg),
        }
    }
}

/// Emails are stored and compared trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trait defining authentication service operations
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user and sign them in
    async fn register(&self, request: CreateUserRequest) -> Result<AuthSession, AuthError>;

    /// Authenticate with email and password
    async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh(&self, request: RefreshRequest) -> Result<AuthSession, AuthError>;

    /// Validate an access token and return the user_id
    async fn validate_token(&self, token: &str) -> Result<Uuid, AuthError>;

    /// Current user profile
    async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError>;

    /// Edit first name, last name and time zone
    async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, AuthError>;
}

/// Implementation of AuthService
pub struct AuthServiceImpl {
    user_repository: Arc<dyn UserRepository>,
    token_service: Arc<dyn TokenService>,
    bootstrapper: DefaultCategoryBootstrapper,
    notifier: Arc<dyn Notifier>,
    bcrypt_cost: u32,
}

impl AuthServiceImpl {
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        token_service: Arc<dyn TokenService>,
        bootstrapper: DefaultCategoryBootstrapper,
        notifier: Arc<dyn Notifier>,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            user_repository,
            token_service,
            bootstrapper,
            notifier,
            bcrypt_cost,
        }
    }

    /// Hash a password using bcrypt off the async runtime
    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a hash
    async fn verify_password(password: String, password_hash: String) -> Result<bool, AuthError> {
        tokio::task::spawn_blocking(move || verify(password, &password_hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {}", e)))?
            .map_err(|e| AuthError::Internal(format!("Password verification failed: {}", e)))
    }

    async fn bootstrap(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.bootstrapper
            .ensure_defaults(user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    fn session(&self, user: User) -> Result<AuthSession, AuthError> {
        let tokens = self.token_service.issue_pair(user.id)?;
        Ok(AuthSession {
            user: user.into(),
            tokens,
        })
    }

    async fn find_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(&self, request: CreateUserRequest) -> Result<AuthSession, AuthError> {
        let password_hash = self.hash_password(request.password).await?;

        let user = self
            .user_repository
            .create(NewUser {
                name: request
                    .name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty()),
                fname: request.fname.trim().to_string(),
                lname: request.lname.trim().to_string(),
                email: normalize_email(&request.email),
                password_hash,
                timezone: request.timezone.map(|tz| tz.trim().to_string()),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::ConstraintViolation(_) => AuthError::DuplicateEmail,
                RepositoryError::DatabaseError(msg) => AuthError::DatabaseError(msg),
                RepositoryError::NotFound => {
                    AuthError::DatabaseError("Unexpected error".to_string())
                }
            })?;

        self.bootstrap(user.id).await?;
        tracing::info!(user_id = %user.id, "User registered");

        let mut params = BTreeMap::new();
        params.insert("name".to_string(), user.display_name());
        notifier::dispatch(
            self.notifier.clone(),
            user.email.clone(),
            NotificationKind::Welcome,
            params,
        );

        self.session(user)
    }

    async fn login(&self, request: LoginRequest) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&request.email);
        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .user_repository
            .find_by_email(&email)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        let is_valid = Self::verify_password(request.password, user.password_hash.clone()).await?;
        if !is_valid {
            tracing::debug!(user_id = %user.id, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        self.bootstrap(user.id).await?;
        tracing::info!(user_id = %user.id, "User logged in");

        self.session(user)
    }

    async fn refresh(&self, request: RefreshRequest) -> Result<AuthSession, AuthError> {
        let user_id = self
            .token_service
            .verify(request.refresh_token.trim(), TokenKind::Refresh)?;
        let user = self.find_user(user_id).await?;
        self.session(user)
    }

    async fn validate_token(&self, token: &str) -> Result<Uuid, AuthError> {
        Ok(self.token_service.verify(token, TokenKind::Access)?)
    }

    async fn profile(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        Ok(self.find_user(user_id).await?.into())
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserProfile, AuthError> {
        let user = self.find_user(user_id).await?;
        if request.is_empty() {
            return Ok(user.into());
        }

        let changes = user.profile_changes(&request);
        let updated = self
            .user_repository
            .update_profile(user_id, changes)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::DatabaseError(other.to_string()),
            })?;

        tracing::info!(user_id = %user_id, "Profile updated");
        Ok(updated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::EntryType;
    use crate::repositories::InMemoryStore;
    use crate::services::notifier::LogNotifier;
    use crate::services::token_service::JwtTokenService;
    use chrono::Duration;

    fn service(store: Arc<InMemoryStore>) -> AuthServiceImpl {
        let tokens = JwtTokenService::new(
            "access".to_string(),
            "refresh".to_string(),
            Duration::minutes(15),
            Duration::days(7),
        );
        AuthServiceImpl::new(
            store.clone(),
            Arc::new(tokens),
            DefaultCategoryBootstrapper::new(store),
            Arc::new(LogNotifier),
            4,
        )
    }

    fn register_request(email: &str) -> CreateUserRequest {
        CreateUserRequest {
            name: None,
            fname: "Test".to_string(),
            lname: "User".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_register_bootstraps_defaults_and_issues_tokens() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store.clone());

        let session = service.register(register_request("Test@Example.com ")).await.unwrap();
        assert_eq!(session.user.email, "test@example.com");
        assert_eq!(session.user.name, "Test User");
        assert_eq!(session.user.category_limit, 10);
        assert!(!session.tokens.access_token.is_empty());

        let categories = store.categories_of(session.user.id);
        assert_eq!(categories.len(), 2);
        assert!(categories.iter().any(|c| c.category_type == EntryType::Income && c.name == "Sales"));

        let user_id = service.validate_token(&session.tokens.access_token).await.unwrap();
        assert_eq!(user_id, session.user.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let service = service(Arc::new(InMemoryStore::new()));

        service.register(register_request("dup@example.com")).await.unwrap();
        let result = service.register(register_request("DUP@example.com")).await;
        assert!(matches!(result, Err(AuthError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn test_login() {
        let store = Arc::new(InMemoryStore::new());
        let service = service(store.clone());
        let registered = service.register(register_request("login@example.com")).await.unwrap();

        let session = service
            .login(LoginRequest {
                email: "  LOGIN@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, registered.user.id);

        // Defaults are still exactly two after a second bootstrap
        assert_eq!(store.categories_of(registered.user.id).len(), 2);
    }

    #[tokio::test]
    async fn test_login_invalid_credentials() {
        let service = service(Arc::new(InMemoryStore::new()));
        service.register(register_request("who@example.com")).await.unwrap();

        let wrong_password = service
            .login(LoginRequest {
                email: "who@example.com".to_string(),
                password: "wrongpassword".to_string(),
            })
            .await;
        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));

        let unknown = service
            .login(LoginRequest {
                email: "nobody@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_refresh() {
        let service = service(Arc::new(InMemoryStore::new()));
        let session = service.register(register_request("fresh@example.com")).await.unwrap();

        let refreshed = service
            .refresh(RefreshRequest {
                refresh_token: session.tokens.refresh_token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(refreshed.user.id, session.user.id);

        let wrong_kind = service
            .refresh(RefreshRequest {
                refresh_token: session.tokens.access_token.clone(),
            })
            .await;
        assert!(matches!(wrong_kind, Err(AuthError::InvalidToken)));

        assert!(matches!(
            service.validate_token(&session.tokens.refresh_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = service(Arc::new(InMemoryStore::new()));
        let session = service.register(register_request("edit@example.com")).await.unwrap();

        let profile = service
            .update_profile(
                session.user.id,
                UpdateProfileRequest {
                    fname: Some(" Jane ".to_string()),
                    lname: None,
                    timezone: Some("Europe/Paris".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(profile.fname, "Jane");
        assert_eq!(profile.lname, "User");
        assert_eq!(profile.name, "Jane User");
        assert_eq!(profile.timezone.as_deref(), Some("Europe/Paris"));

        let cleared = service
            .update_profile(
                session.user.id,
                UpdateProfileRequest {
                    timezone: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(cleared.timezone.is_none());
        assert_eq!(cleared.fname, "Jane");

        let unchanged = service
            .update_profile(session.user.id, UpdateProfileRequest::default())
            .await
            .unwrap();
        assert_eq!(unchanged.updated_at, cleared.updated_at);

        let missing = service
            .update_profile(Uuid::new_v4(), UpdateProfileRequest::default())
            .await;
        assert!(matches!(missing, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_profile_for_unknown_user() {
        let service = service(Arc::new(InMemoryStore::new()));
        let result = service.profile(Uuid::new_v4()).await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }
}
