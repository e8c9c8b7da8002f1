use axum::{
    Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use std::sync::Arc;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::{ApiError, ErrorBody, ErrorKind, ErrorResponse};
use crate::handlers::{auth_handlers, category_handlers, currency_handlers, transaction_handlers};
use crate::middleware::auth_middleware;
use crate::models::auth::{AuthSession, AuthTokens, LoginRequest, RefreshRequest};
use crate::models::category::{
    ArchiveCategoryResponse, CategoryList, CategoryResponse, CreateCategoryRequest,
    CreateCategoryResponse, EntryType, SetDefaultCategoryRequest, SetDefaultCategoryResponse,
    UserDefaults,
};
use crate::models::currency::{
    CurrencyList, CurrencyResponse, UpdateCurrencyRequest, UpdateCurrencyResponse,
};
use crate::models::summary::{MonthlyBucket, Summary, WeeklyBucket, YearlyBucket};
use crate::models::transaction::{Transaction, TransactionInput, TransactionList, TransactionStatus};
use crate::models::user::{CreateUserRequest, UpdateProfileRequest, UserProfile};
use crate::repositories::{CategoryRepository, TransactionRepository, UserRepository};
use crate::services::{
    AuthService, AuthServiceImpl, CategoryResolver, CategoryService, CategoryServiceImpl,
    CurrencyService, CurrencyServiceImpl, DefaultCategoryBootstrapper, Notifier, TokenService,
    TransactionService, TransactionServiceImpl, UserLocks,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth_handlers::register_handler,
        auth_handlers::login_handler,
        auth_handlers::refresh_handler,
        auth_handlers::me_handler,
        auth_handlers::update_me_handler,
        currency_handlers::list_currencies_handler,
        currency_handlers::update_currency_handler,
        category_handlers::list_active_categories_handler,
        category_handlers::list_all_categories_handler,
        category_handlers::create_category_handler,
        category_handlers::set_default_category_handler,
        category_handlers::archive_category_handler,
        transaction_handlers::create_transaction_handler,
        transaction_handlers::create_custom_transaction_handler,
        transaction_handlers::list_transactions_handler,
        transaction_handlers::summary_handler,
        transaction_handlers::update_transaction_handler,
        transaction_handlers::delete_transaction_handler,
    ),
    components(
        schemas(
            CreateUserRequest, LoginRequest, RefreshRequest, AuthTokens, AuthSession, UserProfile,
            UpdateProfileRequest, CurrencyResponse, CurrencyList, UpdateCurrencyRequest,
            UpdateCurrencyResponse,
            EntryType, CategoryResponse, CategoryList, CreateCategoryRequest, CreateCategoryResponse,
            SetDefaultCategoryRequest, SetDefaultCategoryResponse, UserDefaults, ArchiveCategoryResponse,
            Transaction, TransactionInput, TransactionList, TransactionStatus,
            Summary, MonthlyBucket, WeeklyBucket, YearlyBucket,
            ErrorResponse, ErrorBody, ErrorKind
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and tokens"),
        (name = "currencies", description = "Display currency"),
        (name = "categories", description = "Income and expense categories"),
        (name = "transactions", description = "Transactions and summaries")
    ),
    info(
        title = "Finance Tracker API",
        version = "0.1.0",
        description = "REST API for tracking personal income and expenses",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Services shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub category_service: Arc<dyn CategoryService>,
    pub currency_service: Arc<dyn CurrencyService>,
    pub transaction_service: Arc<dyn TransactionService>,
}

impl AppState {
    /// Wires the services on top of the given repositories
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        category_repository: Arc<dyn CategoryRepository>,
        transaction_repository: Arc<dyn TransactionRepository>,
        token_service: Arc<dyn TokenService>,
        notifier: Arc<dyn Notifier>,
        bcrypt_cost: u32,
    ) -> Self {
        let locks = Arc::new(UserLocks::new());

        let auth_service: Arc<dyn AuthService> = Arc::new(AuthServiceImpl::new(
            user_repository.clone(),
            token_service,
            DefaultCategoryBootstrapper::new(category_repository.clone()),
            notifier,
            bcrypt_cost,
        ));

        let category_service: Arc<dyn CategoryService> = Arc::new(CategoryServiceImpl::new(
            category_repository.clone(),
            user_repository.clone(),
            locks,
        ));

        let currency_service: Arc<dyn CurrencyService> =
            Arc::new(CurrencyServiceImpl::new(user_repository.clone()));

        let transaction_service: Arc<dyn TransactionService> =
            Arc::new(TransactionServiceImpl::new(
                transaction_repository,
                user_repository,
                CategoryResolver::new(category_repository),
            ));

        Self {
            auth_service,
            category_service,
            currency_service,
            transaction_service,
        }
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Replaces the limiter's plain-text 429 with the standard error payload
async fn rate_limited_response(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let retry_after = response.headers().get(header::RETRY_AFTER).cloned();
    let mut rewritten = ApiError::new(
        ErrorKind::RateLimited,
        "rate_limited",
        "Too many requests, please try again later",
    )
    .into_response();

    if let Some(value) = retry_after {
        rewritten.headers_mut().insert(header::RETRY_AFTER, value);
    }
    rewritten
}

/// Builds the application router.
///
/// Rate limiting keys on the peer address, so a router built with
/// `rate_limit` must be served with connect info.
pub fn create_router(state: AppState, rate_limit: bool) -> Router {
    let mut auth_routes = Router::new()
        .route("/api/v1/auth/register", post(auth_handlers::register_handler))
        .route("/api/v1/auth/login", post(auth_handlers::login_handler))
        .route("/api/v1/auth/refresh", post(auth_handlers::refresh_handler))
        .with_state(state.auth_service.clone());

    if rate_limit {
        // 10 requests per minute per IP, refilled one every 6 seconds
        match GovernorConfigBuilder::default()
            .per_second(6)
            .burst_size(10)
            .finish()
        {
            Some(config) => {
                auth_routes = auth_routes
                    .layer(GovernorLayer::new(Arc::new(config)))
                    .layer(middleware::map_response(rate_limited_response));
            }
            None => tracing::warn!("Invalid rate limit configuration, auth routes are not limited"),
        }
    }

    let me_routes = Router::new()
        .route(
            "/api/v1/auth/me",
            get(auth_handlers::me_handler).put(auth_handlers::update_me_handler),
        )
        .with_state(state.auth_service.clone());

    let category_routes = Router::new()
        .route(
            "/api/v1/categories/active",
            get(category_handlers::list_active_categories_handler),
        )
        .route(
            "/api/v1/categories/all",
            get(category_handlers::list_all_categories_handler),
        )
        .route(
            "/api/v1/categories",
            post(category_handlers::create_category_handler),
        )
        .route(
            "/api/v1/categories/{id}",
            patch(category_handlers::set_default_category_handler)
                .delete(category_handlers::archive_category_handler),
        )
        .with_state(state.category_service.clone());

    let currency_routes = Router::new()
        .route(
            "/api/v1/currencies",
            get(currency_handlers::list_currencies_handler),
        )
        .route(
            "/api/v1/users/currency",
            put(currency_handlers::update_currency_handler),
        )
        .with_state(state.currency_service.clone());

    let transaction_routes = Router::new()
        .route(
            "/api/v1/transactions",
            post(transaction_handlers::create_transaction_handler)
                .get(transaction_handlers::list_transactions_handler),
        )
        .route(
            "/api/v1/transactions/custom",
            post(transaction_handlers::create_custom_transaction_handler),
        )
        .route(
            "/api/v1/transactions/summary",
            get(transaction_handlers::summary_handler),
        )
        .route(
            "/api/v1/transactions/{id}",
            put(transaction_handlers::update_transaction_handler)
                .delete(transaction_handlers::delete_transaction_handler),
        )
        .with_state(state.transaction_service.clone());

    let protected = Router::new()
        .merge(me_routes)
        .merge(category_routes)
        .merge(currency_routes)
        .merge(transaction_routes)
        .route_layer(middleware::from_fn_with_state(
            state.auth_service.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected)
        .merge(SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", ApiDoc::openapi()))
}
