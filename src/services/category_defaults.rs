use std::sync::Arc;
use uuid::Uuid;

use crate::models::category::{Category, EntryType};
use crate::repositories::{CategoryRepository, RepositoryError};

/// Makes sure every user owns the built-in "Sales" and "Stock" categories
pub struct DefaultCategoryBootstrapper {
    category_repository: Arc<dyn CategoryRepository>,
}

impl DefaultCategoryBootstrapper {
    pub fn new(category_repository: Arc<dyn CategoryRepository>) -> Self {
        Self {
            category_repository,
        }
    }

    /// Idempotent. Missing categories are inserted as active defaults,
    /// existing ones are reactivated with their default flag left alone.
    pub async fn ensure_defaults(&self, user_id: Uuid) -> Result<Vec<Category>, RepositoryError> {
        let mut categories = Vec::with_capacity(2);

        for entry_type in [EntryType::Income, EntryType::Expense] {
            let category = self
                .category_repository
                .upsert_default(user_id, entry_type, entry_type.builtin_default_name())
                .await?;
            categories.push(category);
        }

        tracing::debug!(user_id = %user_id, "Default categories ensured");
        Ok(categories)
    }
}
