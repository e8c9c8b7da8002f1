use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::category::EntryType;
use crate::models::user::{NewUser, ProfileChanges, User};
use crate::repositories::RepositoryError;

const USER_COLUMNS: &str = r#"
    id, name, fname, lname, email, password_hash, category_limit,
    default_income_categories, default_expense_categories, timezone,
    currency, created_at, updated_at
"#;

/// Trait defining user repository operations
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user; a taken email is a constraint violation
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    /// Find a user by (already normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Replace the user's default category list for one type
    async fn set_default_categories(
        &self,
        id: Uuid,
        entry_type: EntryType,
        names: Vec<String>,
    ) -> Result<User, RepositoryError>;

    /// Store edited name fields and time zone
    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<User, RepositoryError>;

    /// Set the user's ISO 4217 currency code
    async fn set_currency(&self, id: Uuid, code: &str) -> Result<User, RepositoryError>;
}

/// PostgreSQL implementation of UserRepository
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let user = user.into_user();

        let query = format!(
            r#"
            INSERT INTO users (
                id, name, fname, lname, email, password_hash, category_limit,
                default_income_categories, default_expense_categories, timezone,
                currency, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {USER_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, User>(&query)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.fname)
            .bind(&user.lname)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.category_limit)
            .bind(&user.default_income_categories)
            .bind(&user.default_expense_categories)
            .bind(&user.timezone)
            .bind(&user.currency)
            .bind(user.created_at)
            .bind(user.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::ConstraintViolation(_) => {
                    RepositoryError::ConstraintViolation("Email already exists".to_string())
                }
                other => other,
            })?;

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");

        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn set_default_categories(
        &self,
        id: Uuid,
        entry_type: EntryType,
        names: Vec<String>,
    ) -> Result<User, RepositoryError> {
        let column = match entry_type {
            EntryType::Income => "default_income_categories",
            EntryType::Expense => "default_expense_categories",
        };

        let query = format!(
            r#"
            UPDATE users
            SET {column} = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&names)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<User, RepositoryError> {
        let query = format!(
            r#"
            UPDATE users
            SET name = $2, fname = $3, lname = $4, timezone = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.fname)
            .bind(&changes.lname)
            .bind(&changes.timezone)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(user)
    }

    async fn set_currency(&self, id: Uuid, code: &str) -> Result<User, RepositoryError> {
        let query = format!(
            r#"
            UPDATE users
            SET currency = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(user)
    }
}
