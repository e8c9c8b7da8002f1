use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::currency::{
    CurrencyList, CurrencyResponse, UpdateCurrencyRequest, UpdateCurrencyResponse,
};
use crate::repositories::{RepositoryError, UserRepository};
use crate::validation::validate_currency_code;

/// Currency service errors
#[derive(Debug, thiserror::Error)]
pub enum CurrencyError {
    #[error("Currency is required")]
    Required,

    #[error("{0}")]
    InvalidCurrency(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for CurrencyError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => CurrencyError::UserNotFound,
            RepositoryError::DatabaseError(msg) => CurrencyError::DatabaseError(msg),
            other => CurrencyError::DatabaseError(other.to_string()),
        }
    }
}

#[async_trait]
pub trait CurrencyService: Send + Sync {
    /// Supported currencies ordered by name
    async fn list(&self) -> Result<CurrencyList, CurrencyError>;

    /// Change the currency amounts are displayed in
    async fn update_user_currency(
        &self,
        user_id: Uuid,
        request: UpdateCurrencyRequest,
    ) -> Result<UpdateCurrencyResponse, CurrencyError>;
}

pub struct CurrencyServiceImpl {
    user_repository: Arc<dyn UserRepository>,
}

impl CurrencyServiceImpl {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }
}

#[async_trait]
impl CurrencyService for CurrencyServiceImpl {
    async fn list(&self) -> Result<CurrencyList, CurrencyError> {
        Ok(CurrencyList {
            currencies: CurrencyResponse::supported(),
        })
    }

    async fn update_user_currency(
        &self,
        user_id: Uuid,
        request: UpdateCurrencyRequest,
    ) -> Result<UpdateCurrencyResponse, CurrencyError> {
        let code = request
            .currency
            .as_deref()
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty())
            .ok_or(CurrencyError::Required)?;

        validate_currency_code(&code).map_err(|e| {
            CurrencyError::InvalidCurrency(
                e.message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid currency code".to_string()),
            )
        })?;
        let currency = CurrencyResponse::from_code(&code)
            .ok_or_else(|| CurrencyError::InvalidCurrency("Invalid currency code".to_string()))?;

        let user = self.user_repository.set_currency(user_id, &currency.code).await?;
        tracing::info!(user_id = %user.id, currency = %user.currency, "Currency updated");

        Ok(UpdateCurrencyResponse {
            currency,
            message: "Currency updated successfully".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repositories::InMemoryStore;

    async fn store_with_user() -> (Arc<InMemoryStore>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let user = UserRepository::create(
            store.as_ref(),
            NewUser {
                name: None,
                fname: "Ada".to_string(),
                lname: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
                timezone: None,
            },
        )
        .await
        .unwrap();
        (store, user.id)
    }

    fn request(code: Option<&str>) -> UpdateCurrencyRequest {
        UpdateCurrencyRequest {
            currency: code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_list() {
        let (store, _) = store_with_user().await;
        let service = CurrencyServiceImpl::new(store);

        let list = service.list().await.unwrap();
        assert!(list.currencies.iter().any(|c| c.code == "USD"));
        assert!(list.currencies.windows(2).all(|pair| pair[0].name <= pair[1].name));
    }

    #[tokio::test]
    async fn test_update_user_currency() {
        let (store, user_id) = store_with_user().await;
        let service = CurrencyServiceImpl::new(store.clone());

        let response = service
            .update_user_currency(user_id, request(Some(" eur ")))
            .await
            .unwrap();
        assert_eq!(response.currency.code, "EUR");
        assert_eq!(response.message, "Currency updated successfully");

        let user = store.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.currency, "EUR");
    }

    #[tokio::test]
    async fn test_update_user_currency_errors() {
        let (store, user_id) = store_with_user().await;
        let service = CurrencyServiceImpl::new(store.clone());

        assert!(matches!(
            service.update_user_currency(user_id, request(None)).await,
            Err(CurrencyError::Required)
        ));
        assert!(matches!(
            service.update_user_currency(user_id, request(Some("  "))).await,
            Err(CurrencyError::Required)
        ));
        assert!(matches!(
            service.update_user_currency(user_id, request(Some("XXQ"))).await,
            Err(CurrencyError::InvalidCurrency(_))
        ));
        assert!(matches!(
            service.update_user_currency(Uuid::new_v4(), request(Some("GBP"))).await,
            Err(CurrencyError::UserNotFound)
        ));

        // Rejected updates leave the stored currency alone
        let user = store.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.currency, "USD");

        let failing = CurrencyServiceImpl::new(Arc::new(InMemoryStore::with_failure()));
        assert!(matches!(
            failing.update_user_currency(user_id, request(Some("GBP"))).await,
            Err(CurrencyError::DatabaseError(_))
        ));
    }
}
