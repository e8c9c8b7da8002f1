use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::filters::TransactionListQuery;
use crate::models::summary::Summary;
use crate::models::transaction::{Transaction, TransactionInput, TransactionList};
use crate::models::user::User;
use crate::repositories::{RepositoryError, TransactionRepository, UserRepository};
use crate::services::category_resolver::CategoryResolver;
use crate::services::category_service::CategoryError;
use crate::services::normalizer::{self, NormalizeOptions};
use crate::services::summary::{SummaryOverflow, summarize_days};
use crate::validation::parse_timezone;

/// Transaction service errors
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Category(#[from] CategoryError),

    #[error("Transaction not found")]
    NotFound,

    #[error("You are not allowed to delete this transaction")]
    Forbidden,

    #[error("timezone is required")]
    TimezoneRequired,

    #[error("timezone must be a valid IANA time zone, e.g. America/New_York")]
    InvalidTimezone,

    #[error("Transaction date must be today in your timezone to be deleted.")]
    NotToday,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Overflow(#[from] SummaryOverflow),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for TransactionError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => TransactionError::NotFound,
            RepositoryError::DatabaseError(msg) | RepositoryError::ConstraintViolation(msg) => {
                TransactionError::DatabaseError(msg)
            }
        }
    }
}

/// Trait defining transaction service operations
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Validate, categorize and store a new transaction
    async fn create(
        &self,
        user_id: Uuid,
        input: TransactionInput,
        require_date: bool,
    ) -> Result<Transaction, TransactionError>;

    /// List the user's transactions
    async fn list(
        &self,
        user_id: Uuid,
        query: TransactionListQuery,
    ) -> Result<TransactionList, TransactionError>;

    /// Totals and time buckets over the user's active transactions
    async fn summary(&self, user_id: Uuid) -> Result<Summary, TransactionError>;

    /// Partially update one of the user's transactions
    async fn update(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        input: TransactionInput,
    ) -> Result<Transaction, TransactionError>;

    /// Delete a transaction dated today in the user's time zone.
    ///
    /// `requested_timezone` is only consulted when the user has no zone on
    /// their profile.
    async fn delete(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        requested_timezone: Option<String>,
    ) -> Result<(), TransactionError>;
}

/// Picks the first non-blank zone and validates it
pub fn resolve_timezone(
    profile: Option<&str>,
    requested: Option<&str>,
) -> Result<Tz, TransactionError> {
    let name = [profile, requested]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .ok_or(TransactionError::TimezoneRequired)?;

    parse_timezone(name).ok_or(TransactionError::InvalidTimezone)
}

/// Implementation of TransactionService
pub struct TransactionServiceImpl {
    transaction_repository: Arc<dyn TransactionRepository>,
    user_repository: Arc<dyn UserRepository>,
    resolver: CategoryResolver,
}

impl TransactionServiceImpl {
    pub fn new(
        transaction_repository: Arc<dyn TransactionRepository>,
        user_repository: Arc<dyn UserRepository>,
        resolver: CategoryResolver,
    ) -> Self {
        Self {
            transaction_repository,
            user_repository,
            resolver,
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, TransactionError> {
        self.user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| TransactionError::DatabaseError(e.to_string()))?
            .ok_or(TransactionError::UserNotFound)
    }
}

#[async_trait]
impl TransactionService for TransactionServiceImpl {
    async fn create(
        &self,
        user_id: Uuid,
        input: TransactionInput,
        require_date: bool,
    ) -> Result<Transaction, TransactionError> {
        let normalized = normalizer::normalize(&input, NormalizeOptions { require_date })?;
        let user = self.load_user(user_id).await?;

        let category = self
            .resolver
            .resolve_for_creation(
                user_id,
                normalized.transaction_type,
                normalized.lookup.clone(),
                user.default_category_name(normalized.transaction_type),
            )
            .await?;

        let transaction = self
            .transaction_repository
            .create(normalized.into_transaction(user_id, &category, Utc::now()))
            .await?;

        tracing::info!(
            user_id = %user_id,
            transaction_id = %transaction.id,
            category_id = %transaction.category_id,
            transaction_type = %transaction.transaction_type,
            "Transaction created"
        );

        Ok(transaction)
    }

    async fn list(
        &self,
        user_id: Uuid,
        query: TransactionListQuery,
    ) -> Result<TransactionList, TransactionError> {
        let filters = normalizer::build_filters(&query)?;

        let transactions = self
            .transaction_repository
            .find_by_user(user_id, &filters)
            .await?;

        let Some((page, page_size)) = filters.pagination else {
            return Ok(TransactionList {
                transactions,
                total: None,
                page: None,
                page_size: None,
            });
        };

        let total = self
            .transaction_repository
            .count_by_user(user_id, &filters)
            .await?;

        Ok(TransactionList {
            transactions,
            total: Some(total),
            page: Some(page),
            page_size: Some(page_size),
        })
    }

    async fn summary(&self, user_id: Uuid) -> Result<Summary, TransactionError> {
        let days = self.transaction_repository.daily_totals(user_id).await?;
        tracing::debug!(user_id = %user_id, days = days.len(), "Summarizing transactions");
        Ok(summarize_days(&days)?)
    }

    async fn update(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        input: TransactionInput,
    ) -> Result<Transaction, TransactionError> {
        let existing = self
            .transaction_repository
            .find_owned(user_id, transaction_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        let update = normalizer::normalize_update(&input)?;

        let category = if update.recategorize {
            let category_type = update
                .transaction_type
                .unwrap_or(existing.transaction_type);
            let lookup = update
                .lookup
                .clone()
                .or_name(Some(existing.category_name.as_str()));
            Some(self.resolver.resolve(user_id, category_type, &lookup).await?)
        } else {
            None
        };

        let updated = update.apply(existing, category.as_ref(), Utc::now());
        let saved = self.transaction_repository.update(updated).await?;

        tracing::info!(user_id = %user_id, transaction_id = %saved.id, "Transaction updated");
        Ok(saved)
    }

    async fn delete(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        requested_timezone: Option<String>,
    ) -> Result<(), TransactionError> {
        let transaction = self
            .transaction_repository
            .find_by_id(transaction_id)
            .await?
            .ok_or(TransactionError::NotFound)?;

        if transaction.user_id != user_id {
            tracing::warn!(
                user_id = %user_id,
                transaction_id = %transaction_id,
                "Attempt to delete another user's transaction"
            );
            return Err(TransactionError::Forbidden);
        }

        let user = self.load_user(user_id).await?;
        let tz = resolve_timezone(user.timezone.as_deref(), requested_timezone.as_deref())?;

        normalizer::ensure_deletable_today(transaction.date, Utc::now(), tz)?;

        self.transaction_repository.delete(transaction_id).await?;
        tracing::info!(user_id = %user_id, transaction_id = %transaction_id, "Transaction deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::{Category, EntryType};
    use crate::models::transaction::TransactionStatus;
    use crate::models::user::NewUser;
    use crate::repositories::{CategoryRepository, InMemoryStore};
    use crate::services::category_defaults::DefaultCategoryBootstrapper;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    async fn setup_with_timezone(
        timezone: Option<&str>,
    ) -> (Arc<InMemoryStore>, TransactionServiceImpl, User) {
        let store = Arc::new(InMemoryStore::new());
        let user = UserRepository::create(
            store.as_ref(),
            NewUser {
                name: None,
                fname: "Alan".to_string(),
                lname: "Turing".to_string(),
                email: "alan@example.com".to_string(),
                password_hash: "hash".to_string(),
                timezone: timezone.map(str::to_string),
            },
        )
        .await
        .unwrap();

        DefaultCategoryBootstrapper::new(store.clone())
            .ensure_defaults(user.id)
            .await
            .unwrap();

        let service = TransactionServiceImpl::new(
            store.clone(),
            store.clone(),
            CategoryResolver::new(store.clone()),
        );
        (store, service, user)
    }

    async fn setup() -> (Arc<InMemoryStore>, TransactionServiceImpl, User) {
        setup_with_timezone(None).await
    }

    fn input(value: serde_json::Value) -> TransactionInput {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_uses_default_category() {
        let (_, service, user) = setup().await;

        let transaction = service
            .create(user.id, input(json!({"type": "income", "amount": "100"})), false)
            .await
            .unwrap();

        assert_eq!(transaction.category_name, "Sales");
        assert_eq!(transaction.title, "Sales");
        assert_eq!(transaction.amount, dec!(100));
        assert_eq!(transaction.status, TransactionStatus::Active);
        assert!(!transaction.is_custom_date);
    }

    #[tokio::test]
    async fn test_create_with_named_category() {
        let (store, service, user) = setup().await;
        CategoryRepository::create(
            store.as_ref(),
            Category::new_owned(user.id, EntryType::Expense, "Food", false),
        )
        .await
        .unwrap();

        let transaction = service
            .create(
                user.id,
                input(json!({
                    "type": "expense",
                    "amount": 12.5,
                    "category": "Food",
                    "title": "Lunch",
                    "note": "tacos"
                })),
                false,
            )
            .await
            .unwrap();

        assert_eq!(transaction.category_name, "Food");
        assert_eq!(transaction.title, "Lunch");
        assert_eq!(transaction.description.as_deref(), Some("tacos"));
    }

    #[tokio::test]
    async fn test_create_with_unknown_category() {
        let (_, service, user) = setup().await;

        let result = service
            .create(
                user.id,
                input(json!({"type": "expense", "amount": 1, "category": "Nope"})),
                false,
            )
            .await;
        assert!(matches!(
            result,
            Err(TransactionError::Category(CategoryError::Unresolved))
        ));
    }

    #[tokio::test]
    async fn test_custom_create_requires_date() {
        let (_, service, user) = setup().await;

        let result = service
            .create(user.id, input(json!({"type": "income", "amount": 1})), true)
            .await;
        assert!(matches!(result, Err(TransactionError::Validation(m)) if m == "date is required"));

        let transaction = service
            .create(
                user.id,
                input(json!({"type": "income", "amount": 1, "date": "2024-01-15T13:45:00Z"})),
                true,
            )
            .await
            .unwrap();
        assert_eq!(
            transaction.date,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert!(transaction.is_custom_date);
    }

    #[tokio::test]
    async fn test_summary_example() {
        let (_, service, user) = setup().await;

        service
            .create(
                user.id,
                input(json!({"type": "income", "amount": 100, "date": "2024-01-15"})),
                false,
            )
            .await
            .unwrap();
        service
            .create(
                user.id,
                input(json!({"type": "expense", "amount": 40, "date": "2024-01-20"})),
                false,
            )
            .await
            .unwrap();
        service
            .create(
                user.id,
                input(json!({"type": "expense", "amount": 999, "date": "2024-01-21", "status": "undone"})),
                false,
            )
            .await
            .unwrap();

        let summary = service.summary(user.id).await.unwrap();
        assert_eq!(summary.total_income, dec!(100));
        assert_eq!(summary.total_expense, dec!(40));
        assert_eq!(summary.balance, dec!(60));
        assert_eq!(summary.monthly_summary.len(), 1);
        assert_eq!(summary.monthly_summary[0].month, "2024-01");
    }

    #[tokio::test]
    async fn test_summary_overflow_is_an_error() {
        let (store, service, user) = setup().await;
        let huge = rust_decimal::Decimal::from_scientific("5e28").unwrap();

        for day in [15, 16] {
            let date = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
            store.insert_transaction(Transaction {
                id: Uuid::new_v4(),
                user_id: user.id,
                title: "Sales".to_string(),
                description: None,
                transaction_type: EntryType::Income,
                category_name: "Sales".to_string(),
                category_id: Uuid::new_v4(),
                amount: huge,
                date,
                is_custom_date: true,
                status: TransactionStatus::Active,
                created_at: date,
                updated_at: date,
            });
        }

        let result = service.summary(user.id).await;
        assert!(matches!(result, Err(TransactionError::Overflow(_))));
    }

    #[tokio::test]
    async fn test_list_with_pagination() {
        let (_, service, user) = setup().await;

        for (amount, date) in [(5, "2024-01-01"), (7, "2024-01-02"), (3, "2024-01-03")] {
            service
                .create(
                    user.id,
                    input(json!({"type": "expense", "amount": amount, "date": date})),
                    false,
                )
                .await
                .unwrap();
        }

        let unpaged = service
            .list(user.id, TransactionListQuery::default())
            .await
            .unwrap();
        assert_eq!(unpaged.transactions.len(), 3);
        assert!(unpaged.total.is_none());
        assert_eq!(unpaged.transactions[0].amount, dec!(3));

        let paged = service
            .list(
                user.id,
                TransactionListQuery {
                    sort_by: Some("amount".to_string()),
                    sort_dir: Some("asc".to_string()),
                    page: Some("2".to_string()),
                    page_size: Some("2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(paged.total, Some(3));
        assert_eq!(paged.page, Some(2));
        assert_eq!(paged.page_size, Some(2));
        assert_eq!(paged.transactions.len(), 1);
        assert_eq!(paged.transactions[0].amount, dec!(7));
    }

    #[tokio::test]
    async fn test_list_filters_by_date_range_and_category() {
        let (_, service, user) = setup().await;

        for date in ["2024-01-01", "2024-01-31", "2024-02-01"] {
            service
                .create(
                    user.id,
                    input(json!({"type": "expense", "amount": 1, "date": date})),
                    false,
                )
                .await
                .unwrap();
        }

        let january = service
            .list(
                user.id,
                TransactionListQuery {
                    start_date: Some("2024-01-01".to_string()),
                    end_date: Some("2024-01-31".to_string()),
                    category: Some("sto".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(january.transactions.len(), 2);
    }

    #[tokio::test]
    async fn test_update_recategorizes_and_keeps_snapshot_otherwise() {
        let (store, service, user) = setup().await;
        let food = Category::new_owned(user.id, EntryType::Expense, "Food", false);
        store.insert_category(food.clone());

        let created = service
            .create(user.id, input(json!({"type": "expense", "amount": 5})), false)
            .await
            .unwrap();
        assert_eq!(created.category_name, "Stock");

        let updated = service
            .update(user.id, created.id, input(json!({"category": "Food", "title": ""})))
            .await
            .unwrap();
        assert_eq!(updated.category_id, food.id);
        assert_eq!(updated.category_name, "Food");
        assert_eq!(updated.title, "Food");

        let untouched = service
            .update(user.id, created.id, input(json!({"status": "undone"})))
            .await
            .unwrap();
        assert_eq!(untouched.category_name, "Food");
        assert_eq!(untouched.status, TransactionStatus::Undone);
    }

    #[tokio::test]
    async fn test_update_requires_ownership() {
        let (_, service, user) = setup().await;
        let created = service
            .create(user.id, input(json!({"type": "expense", "amount": 5})), false)
            .await
            .unwrap();

        let result = service
            .update(Uuid::new_v4(), created.id, input(json!({"amount": 6})))
            .await;
        assert!(matches!(result, Err(TransactionError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_today() {
        let (_, service, user) = setup().await;
        let created = service
            .create(user.id, input(json!({"type": "expense", "amount": 5})), false)
            .await
            .unwrap();

        service
            .delete(user.id, created.id, Some("UTC".to_string()))
            .await
            .unwrap();

        let again = service.delete(user.id, created.id, Some("UTC".to_string())).await;
        assert!(matches!(again, Err(TransactionError::NotFound)));
    }

    #[tokio::test]
    async fn test_delete_guards() {
        let (_, service, user) = setup().await;
        let old = service
            .create(
                user.id,
                input(json!({"type": "expense", "amount": 5, "date": "2020-05-01"})),
                false,
            )
            .await
            .unwrap();

        let result = service.delete(Uuid::new_v4(), old.id, Some("UTC".to_string())).await;
        assert!(matches!(result, Err(TransactionError::Forbidden)));

        let result = service.delete(user.id, old.id, None).await;
        assert!(matches!(result, Err(TransactionError::TimezoneRequired)));

        let result = service.delete(user.id, old.id, Some("Mars/Base".to_string())).await;
        assert!(matches!(result, Err(TransactionError::InvalidTimezone)));

        let result = service.delete(user.id, old.id, Some("UTC".to_string())).await;
        assert!(matches!(result, Err(TransactionError::NotToday)));
    }

    #[tokio::test]
    async fn test_profile_timezone_takes_precedence() {
        let (_, service, user) = setup_with_timezone(Some("Not/AZone")).await;
        let created = service
            .create(user.id, input(json!({"type": "expense", "amount": 5})), false)
            .await
            .unwrap();

        let result = service.delete(user.id, created.id, Some("UTC".to_string())).await;
        assert!(matches!(result, Err(TransactionError::InvalidTimezone)));
    }

    #[test]
    fn test_resolve_timezone_order() {
        assert_eq!(
            resolve_timezone(Some("Europe/Paris"), Some("UTC")).unwrap(),
            Tz::Europe__Paris
        );
        assert_eq!(resolve_timezone(Some(" "), Some("UTC")).unwrap(), Tz::UTC);
        assert!(matches!(
            resolve_timezone(None, None),
            Err(TransactionError::TimezoneRequired)
        ));
    }
}
