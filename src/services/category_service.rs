use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::category::{
    ArchiveCategoryResponse, Category, CategoryList, CategoryResponse, CreateCategoryRequest,
    CreateCategoryResponse, EntryType, SetDefaultCategoryRequest, SetDefaultCategoryResponse,
};
use crate::models::user::User;
use crate::repositories::{CategoryRepository, RepositoryError, UserRepository};
use crate::services::category_resolver::parse_category_type;
use crate::services::quota::{QuotaEnforcer, UserLocks};

/// Category service errors
#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("type must be either income or expense")]
    InvalidType,

    #[error("{0}")]
    Validation(String),

    #[error("Category not found")]
    CategoryNotFound,

    #[error("Category not found. Create it before assigning to a transaction.")]
    Unresolved,

    #[error("Category is inactive")]
    Inactive,

    #[error("Category already exists")]
    AlreadyExists,

    #[error("Category limit of {limit} reached")]
    QuotaExceeded { limit: i32 },

    #[error("Default categories cannot be removed")]
    DefaultNotArchivable,

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<RepositoryError> for CategoryError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => CategoryError::CategoryNotFound,
            RepositoryError::ConstraintViolation(_) => CategoryError::AlreadyExists,
            RepositoryError::DatabaseError(msg) => CategoryError::DatabaseError(msg),
        }
    }
}

/// Trait defining category service operations
#[async_trait]
pub trait CategoryService: Send + Sync {
    /// Active categories visible to the user, optionally of one type
    async fn list_active(
        &self,
        user_id: Uuid,
        category_type: Option<String>,
    ) -> Result<CategoryList, CategoryError>;

    /// All visible categories including archived ones
    async fn list_all(
        &self,
        user_id: Uuid,
        category_type: Option<String>,
    ) -> Result<CategoryList, CategoryError>;

    /// Create a category, or reactivate an archived one with the same name
    async fn create(
        &self,
        user_id: Uuid,
        request: CreateCategoryRequest,
    ) -> Result<CreateCategoryResponse, CategoryError>;

    /// Make an owned category the default of its type
    async fn set_default(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        request: SetDefaultCategoryRequest,
    ) -> Result<SetDefaultCategoryResponse, CategoryError>;

    /// Soft-delete an owned category
    async fn archive(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<ArchiveCategoryResponse, CategoryError>;
}

/// Implementation of CategoryService
pub struct CategoryServiceImpl {
    category_repository: Arc<dyn CategoryRepository>,
    user_repository: Arc<dyn UserRepository>,
    quota: QuotaEnforcer,
    locks: Arc<UserLocks>,
}

impl CategoryServiceImpl {
    pub fn new(
        category_repository: Arc<dyn CategoryRepository>,
        user_repository: Arc<dyn UserRepository>,
        locks: Arc<UserLocks>,
    ) -> Self {
        Self {
            quota: QuotaEnforcer::new(category_repository.clone()),
            category_repository,
            user_repository,
            locks,
        }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, CategoryError> {
        self.user_repository
            .find_by_id(user_id)
            .await
            .map_err(|e| CategoryError::DatabaseError(e.to_string()))?
            .ok_or(CategoryError::UserNotFound)
    }

    async fn list(
        &self,
        user_id: Uuid,
        category_type: Option<String>,
        active_only: bool,
    ) -> Result<CategoryList, CategoryError> {
        let category_type = match category_type.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Some(parse_category_type(Some(value))?),
            _ => None,
        };

        let user = self.load_user(user_id).await?;
        let categories = self
            .category_repository
            .list_visible(user_id, category_type, active_only)
            .await?;

        Ok(CategoryList {
            categories: categories.into_iter().map(CategoryResponse::from).collect(),
            limit: user.category_limit,
        })
    }

    async fn find_owned(&self, user_id: Uuid, category_id: Uuid) -> Result<Category, CategoryError> {
        self.category_repository
            .find_owned(user_id, category_id)
            .await?
            .ok_or(CategoryError::CategoryNotFound)
    }
}

#[async_trait]
impl CategoryService for CategoryServiceImpl {
    async fn list_active(
        &self,
        user_id: Uuid,
        category_type: Option<String>,
    ) -> Result<CategoryList, CategoryError> {
        self.list(user_id, category_type, true).await
    }

    async fn list_all(
        &self,
        user_id: Uuid,
        category_type: Option<String>,
    ) -> Result<CategoryList, CategoryError> {
        self.list(user_id, category_type, false).await
    }

    async fn create(
        &self,
        user_id: Uuid,
        request: CreateCategoryRequest,
    ) -> Result<CreateCategoryResponse, CategoryError> {
        let name = request
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CategoryError::Validation("name is required".to_string()))?
            .to_string();
        let category_type = parse_category_type(request.category_type.as_deref())?;

        let _guard = self.locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;

        if let Some(existing) = self
            .category_repository
            .find_owned_by_name(user_id, category_type, &name)
            .await?
        {
            if existing.is_active {
                return Err(CategoryError::AlreadyExists);
            }

            self.quota.ensure_capacity(&user, category_type).await?;
            let category = self.category_repository.set_active(existing.id, true).await?;

            tracing::info!(user_id = %user_id, category_id = %category.id, "Category reactivated");
            return Ok(CreateCategoryResponse {
                category: category.into(),
                reactivated: true,
            });
        }

        self.quota.ensure_capacity(&user, category_type).await?;
        let category = self
            .category_repository
            .create(Category::new_owned(user_id, category_type, &name, false))
            .await?;

        tracing::info!(
            user_id = %user_id,
            category_id = %category.id,
            category_type = %category_type,
            "Category created"
        );

        Ok(CreateCategoryResponse {
            category: category.into(),
            reactivated: false,
        })
    }

    async fn set_default(
        &self,
        user_id: Uuid,
        category_id: Uuid,
        request: SetDefaultCategoryRequest,
    ) -> Result<SetDefaultCategoryResponse, CategoryError> {
        if request.is_default != Some(true) {
            return Err(CategoryError::Validation(
                "is_default must be true to set the default category".to_string(),
            ));
        }

        let _guard = self.locks.acquire(user_id).await;
        let user = self.load_user(user_id).await?;
        let mut category = self.find_owned(user_id, category_id).await?;

        if !category.is_active {
            return Err(CategoryError::Inactive);
        }

        let category_type: EntryType = category.category_type;
        let unchanged = category.is_default
            && user.default_category_name(category_type) == Some(category.name.as_str());

        if !unchanged {
            let cleared = self
                .category_repository
                .clear_other_defaults(user_id, category_type, category.id)
                .await?;
            tracing::debug!(user_id = %user_id, cleared, "Cleared previous default categories");

            if !category.is_default {
                category = self.category_repository.set_default(category.id, true).await?;
            }
        }

        let user = self
            .user_repository
            .set_default_categories(user_id, category_type, vec![category.name.clone()])
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CategoryError::UserNotFound,
                other => CategoryError::DatabaseError(other.to_string()),
            })?;

        Ok(SetDefaultCategoryResponse {
            category: category.into(),
            defaults: user.defaults(),
            unchanged,
        })
    }

    async fn archive(
        &self,
        user_id: Uuid,
        category_id: Uuid,
    ) -> Result<ArchiveCategoryResponse, CategoryError> {
        let _guard = self.locks.acquire(user_id).await;
        let category = self.find_owned(user_id, category_id).await?;

        if category.is_default {
            return Err(CategoryError::DefaultNotArchivable);
        }

        let category = if category.is_active {
            let archived = self.category_repository.set_active(category.id, false).await?;
            tracing::info!(user_id = %user_id, category_id = %archived.id, "Category archived");
            archived
        } else {
            category
        };

        Ok(ArchiveCategoryResponse {
            category: category.into(),
            archived: true,
        })
    }
}
