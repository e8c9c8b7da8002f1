use axum::http::{HeaderName, HeaderValue, Method, header};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use finance_tracker::config::{Config, LogFormat};
use finance_tracker::repositories::{
    PostgresCategoryRepository, PostgresTransactionRepository, PostgresUserRepository,
};
use finance_tracker::routes::{AppState, create_router};
use finance_tracker::services::{JwtTokenService, LogNotifier};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("finance_tracker=debug,tower_http=debug"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, Box<dyn std::error::Error>> {
    match origin {
        None | Some("*") => Ok(CorsLayer::permissive()),
        Some(origin) => Ok(CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-timezone"),
                HeaderName::from_static("x-user-timezone"),
            ])),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations completed");

    let token_service = Arc::new(JwtTokenService::new(
        config.access_token_secret.clone(),
        config.refresh_token_secret.clone(),
        config.access_token_ttl,
        config.refresh_token_ttl,
    ));

    let state = AppState::new(
        Arc::new(PostgresUserRepository::new(pool.clone())),
        Arc::new(PostgresCategoryRepository::new(pool.clone())),
        Arc::new(PostgresTransactionRepository::new(pool)),
        token_service,
        Arc::new(LogNotifier),
        config.bcrypt_cost,
    );

    let app = create_router(state, config.rate_limit_enabled)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_origin.as_deref())?);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server running on http://{}", addr);
    tracing::info!("API docs at http://{}/api/docs", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
