pub mod auth_handlers;
pub mod category_handlers;
pub mod currency_handlers;
pub mod transaction_handlers;

use uuid::Uuid;

use crate::error::ApiError;

/// Parses a path id; malformed ids are reported like missing resources
pub(crate) fn parse_path_id(raw: &str, not_found: impl FnOnce() -> ApiError) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| not_found())
}
