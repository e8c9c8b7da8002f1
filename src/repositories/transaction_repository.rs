use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::category::EntryType;
use crate::models::filters::TransactionFilters;
use crate::models::summary::DailyTotal;
use crate::models::transaction::Transaction;
use crate::repositories::RepositoryError;

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, title, description, transaction_type, category_name, category_id,
    amount, date, is_custom_date, status, created_at, updated_at
"#;

/// Trait defining transaction repository operations
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Create a new transaction
    async fn create(&self, transaction: Transaction) -> Result<Transaction, RepositoryError>;

    /// Overwrite an existing transaction
    async fn update(&self, transaction: Transaction) -> Result<Transaction, RepositoryError>;

    /// Find a transaction by ID regardless of owner
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError>;

    /// Find a transaction by ID owned by the user
    async fn find_owned(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Transaction>, RepositoryError>;

    /// List the user's transactions matching the filters, sorted and paged
    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    /// Count the user's transactions matching the filters, ignoring paging
    async fn count_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<i64, RepositoryError>;

    /// Delete a transaction by ID
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Sum the user's active transactions per UTC day and type
    async fn daily_totals(&self, user_id: Uuid) -> Result<Vec<DailyTotal>, RepositoryError>;
}

/// PostgreSQL implementation of TransactionRepository
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the WHERE clause shared by listing and counting
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filters: &TransactionFilters) {
    builder.push(" WHERE user_id = ").push_bind(user_id);

    if let Some(status) = filters.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }

    if let Some(transaction_type) = filters.transaction_type {
        builder
            .push(" AND transaction_type = ")
            .push_bind(transaction_type.as_str());
    }

    if let Some(start) = filters.start {
        builder.push(" AND date >= ").push_bind(start);
    }

    if let Some(end) = filters.end {
        builder.push(" AND date <= ").push_bind(end);
    }

    if let Some(category) = &filters.category {
        builder
            .push(" AND strpos(lower(category_name), lower(")
            .push_bind(category.clone())
            .push(")) > 0");
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        let query = format!(
            r#"
            INSERT INTO transactions (
                id, user_id, title, description, transaction_type, category_name,
                category_id, amount, date, is_custom_date, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Transaction>(&query)
            .bind(transaction.id)
            .bind(transaction.user_id)
            .bind(&transaction.title)
            .bind(&transaction.description)
            .bind(transaction.transaction_type.as_str())
            .bind(&transaction.category_name)
            .bind(transaction.category_id)
            .bind(transaction.amount)
            .bind(transaction.date)
            .bind(transaction.is_custom_date)
            .bind(transaction.status.as_str())
            .bind(transaction.created_at)
            .bind(transaction.updated_at)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }

    async fn update(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        let query = format!(
            r#"
            UPDATE transactions
            SET title = $2,
                description = $3,
                transaction_type = $4,
                category_name = $5,
                category_id = $6,
                amount = $7,
                date = $8,
                is_custom_date = $9,
                status = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Transaction>(&query)
            .bind(transaction.id)
            .bind(&transaction.title)
            .bind(&transaction.description)
            .bind(transaction.transaction_type.as_str())
            .bind(&transaction.category_name)
            .bind(transaction.category_id)
            .bind(transaction.amount)
            .bind(transaction.date)
            .bind(transaction.is_custom_date)
            .bind(transaction.status.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");

        let transaction = sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transaction)
    }

    async fn find_owned(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Transaction>, RepositoryError> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 AND user_id = $2"
        );

        let transaction = sqlx::query_as::<_, Transaction>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(transaction)
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions"
        ));
        push_filters(&mut builder, user_id, filters);

        // Column and keyword come from closed enums, never from user input
        builder.push(format!(
            " ORDER BY {} {}, created_at DESC",
            filters.sort_by.column(),
            filters.sort_dir.keyword()
        ));

        if let (Some((_, page_size)), Some(offset)) = (filters.pagination, filters.offset()) {
            builder.push(" LIMIT ").push_bind(i64::from(page_size));
            builder.push(" OFFSET ").push_bind(offset);
        }

        let transactions = builder
            .build_query_as::<Transaction>()
            .fetch_all(&self.pool)
            .await?;

        Ok(transactions)
    }

    async fn count_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<i64, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filters(&mut builder, user_id, filters);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Err(RepositoryError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn daily_totals(&self, user_id: Uuid) -> Result<Vec<DailyTotal>, RepositoryError> {
        let rows = sqlx::query_as::<_, (NaiveDate, String, Decimal)>(
            r#"
            SELECT (date AT TIME ZONE 'UTC')::date AS day,
                   transaction_type,
                   SUM(amount) AS total
            FROM transactions
            WHERE user_id = $1 AND status = 'active'
            GROUP BY day, transaction_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(day, entry_type, total)| {
                let entry_type = entry_type
                    .parse::<EntryType>()
                    .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;
                Ok(DailyTotal {
                    day,
                    entry_type,
                    total,
                })
            })
            .collect()
    }
}
