use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::category::{Category, EntryType};
use crate::repositories::RepositoryError;

const CATEGORY_COLUMNS: &str =
    "id, user_id, name, category_type, is_default, is_active, created_at, updated_at";

/// Trait defining category repository operations.
///
/// "Visible" means owned by the given user or global (`user_id IS NULL`).
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Create a new category; an existing `(owner, type, name)` is a constraint violation
    async fn create(&self, category: Category) -> Result<Category, RepositoryError>;

    /// Find a category by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepositoryError>;

    /// Find a category by ID and type that is visible to the user
    async fn find_visible_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_type: EntryType,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Find a category by exact name and type that is visible to the user,
    /// preferring the user's own category over a global one
    async fn find_visible_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError>;

    /// Find a category owned by the user
    async fn find_owned(&self, user_id: Uuid, id: Uuid)
    -> Result<Option<Category>, RepositoryError>;

    /// Find the user's own category with this exact name and type, active or not
    async fn find_owned_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError>;

    /// List visible categories, sorted by type, default first, active first, name
    async fn list_visible(
        &self,
        user_id: Uuid,
        category_type: Option<EntryType>,
        active_only: bool,
    ) -> Result<Vec<Category>, RepositoryError>;

    /// Count active visible categories of one type
    async fn count_active_visible(
        &self,
        user_id: Uuid,
        category_type: EntryType,
    ) -> Result<i64, RepositoryError>;

    /// Flip the active flag
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Category, RepositoryError>;

    /// Flip the default flag
    async fn set_default(&self, id: Uuid, is_default: bool) -> Result<Category, RepositoryError>;

    /// Clear the default flag on the user's other categories of this type
    async fn clear_other_defaults(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        keep_id: Uuid,
    ) -> Result<u64, RepositoryError>;

    /// Insert `(user, type, name)` as an active default category, or reactivate
    /// the existing one without touching its default flag
    async fn upsert_default(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Category, RepositoryError>;
}

/// PostgreSQL implementation of CategoryRepository
pub struct PostgresCategoryRepository {
    pool: PgPool,
}

impl PostgresCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PostgresCategoryRepository {
    async fn create(&self, category: Category) -> Result<Category, RepositoryError> {
        let query = format!(
            r#"
            INSERT INTO categories
                (id, user_id, name, category_type, is_default, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CATEGORY_COLUMNS}
            "#
        );

        let result = sqlx::query_as::<_, Category>(&query)
            .bind(category.id)
            .bind(category.user_id)
            .bind(&category.name)
            .bind(category.category_type.as_str())
            .bind(category.is_default)
            .bind(category.is_active)
            .bind(category.created_at)
            .bind(category.updated_at)
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(category) => Ok(category),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                RepositoryError::ConstraintViolation(
                    "Category with this name already exists for user".to_string(),
                ),
            ),
            Err(e) => Err(RepositoryError::DatabaseError(e.to_string())),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepositoryError> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn find_visible_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_type: EntryType,
    ) -> Result<Option<Category>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE id = $1
                AND category_type = $2
                AND (user_id = $3 OR user_id IS NULL)
            "#
        );

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(category_type.as_str())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn find_visible_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE name = $1
                AND category_type = $2
                AND (user_id = $3 OR user_id IS NULL)
            ORDER BY user_id NULLS LAST
            LIMIT 1
            "#
        );

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(name)
            .bind(category_type.as_str())
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn find_owned(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Category>, RepositoryError> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 AND user_id = $2"
        );

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn find_owned_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE user_id = $1 AND category_type = $2 AND name = $3
            "#
        );

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(user_id)
            .bind(category_type.as_str())
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn list_visible(
        &self,
        user_id: Uuid,
        category_type: Option<EntryType>,
        active_only: bool,
    ) -> Result<Vec<Category>, RepositoryError> {
        let query = format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE (user_id = $1 OR user_id IS NULL)
                AND ($2::varchar IS NULL OR category_type = $2)
                AND (NOT $3 OR is_active)
            ORDER BY category_type ASC, is_default DESC, is_active DESC, name ASC
            "#
        );

        let categories = sqlx::query_as::<_, Category>(&query)
            .bind(user_id)
            .bind(category_type.map(|t| t.as_str()))
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    async fn count_active_visible(
        &self,
        user_id: Uuid,
        category_type: EntryType,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM categories
            WHERE category_type = $1
                AND is_active
                AND (user_id = $2 OR user_id IS NULL)
            "#,
        )
        .bind(category_type.as_str())
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Category, RepositoryError> {
        let query = format!(
            r#"
            UPDATE categories
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn set_default(&self, id: Uuid, is_default: bool) -> Result<Category, RepositoryError> {
        let query = format!(
            r#"
            UPDATE categories
            SET is_default = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Category>(&query)
            .bind(id)
            .bind(is_default)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn clear_other_defaults(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        keep_id: Uuid,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE categories
            SET is_default = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND category_type = $2 AND is_default AND id <> $3
            "#,
        )
        .bind(user_id)
        .bind(category_type.as_str())
        .bind(keep_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_default(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        // The conflict target must match the expression index from the migrations
        let query = format!(
            r#"
            INSERT INTO categories
                (id, user_id, name, category_type, is_default, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, TRUE, TRUE, NOW(), NOW())
            ON CONFLICT ((COALESCE(user_id, '00000000-0000-0000-0000-000000000000'::uuid)), category_type, name)
            DO UPDATE SET is_active = TRUE, updated_at = NOW()
            RETURNING {CATEGORY_COLUMNS}
            "#
        );

        let category = sqlx::query_as::<_, Category>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(name)
            .bind(category_type.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(category)
    }
}
