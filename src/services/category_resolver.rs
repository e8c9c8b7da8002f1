use std::sync::Arc;
use uuid::Uuid;

use crate::models::category::{Category, EntryType};
use crate::repositories::CategoryRepository;
use crate::services::category_service::CategoryError;

/// How a transaction refers to its category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryLookup {
    pub category_id: Option<String>,
    pub category_name: Option<String>,
}

impl CategoryLookup {
    /// Builds a lookup from the raw `category` and `category_id` fields.
    ///
    /// A non-blank `category_id` wins. Otherwise a `category` that parses as a
    /// UUID is treated as an id, and anything else as a trimmed name.
    pub fn derive(category: Option<&str>, category_id: Option<&str>) -> Self {
        if let Some(id) = category_id.map(str::trim).filter(|id| !id.is_empty()) {
            return Self {
                category_id: Some(id.to_string()),
                category_name: None,
            };
        }

        match category.map(str::trim).filter(|name| !name.is_empty()) {
            Some(value) if Uuid::parse_str(value).is_ok() => Self {
                category_id: Some(value.to_string()),
                category_name: None,
            },
            Some(name) => Self {
                category_id: None,
                category_name: Some(name.to_string()),
            },
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category_id.is_none() && self.category_name.is_none()
    }

    /// Falls back to `name` when neither an id nor a name was given
    pub fn or_name(self, name: Option<&str>) -> Self {
        if !self.is_empty() {
            return self;
        }
        Self {
            category_id: None,
            category_name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
        }
    }
}

/// Parses a raw type value, failing before any lookup happens
pub fn parse_category_type(value: Option<&str>) -> Result<EntryType, CategoryError> {
    value
        .map(str::trim)
        .and_then(|v| v.parse::<EntryType>().ok())
        .ok_or(CategoryError::InvalidType)
}

/// Finds the category a transaction should be filed under
pub struct CategoryResolver {
    category_repository: Arc<dyn CategoryRepository>,
}

impl CategoryResolver {
    pub fn new(category_repository: Arc<dyn CategoryRepository>) -> Self {
        Self {
            category_repository,
        }
    }

    /// Resolves `lookup` among the categories visible to the user.
    ///
    /// An id is matched by id and type, a name by exact name and type with the
    /// user's own category taking precedence over a global one. The result
    /// must be active.
    pub async fn resolve(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        lookup: &CategoryLookup,
    ) -> Result<Category, CategoryError> {
        let found = if let Some(raw_id) = &lookup.category_id {
            let id = Uuid::parse_str(raw_id)
                .map_err(|_| CategoryError::Validation("categoryId is invalid".to_string()))?;
            self.category_repository
                .find_visible_by_id(user_id, id, category_type)
                .await?
        } else if let Some(name) = &lookup.category_name {
            self.category_repository
                .find_visible_by_name(user_id, category_type, name.trim())
                .await?
        } else {
            return Err(CategoryError::Validation("category is required".to_string()));
        };

        let category = found.ok_or(CategoryError::Unresolved)?;

        if !category.is_active {
            return Err(CategoryError::Inactive);
        }

        tracing::debug!(
            user_id = %user_id,
            category_id = %category.id,
            category = %category.name,
            "Resolved category"
        );

        Ok(category)
    }

    /// Resolves the category of a new transaction, falling back to the user's
    /// configured default name for the type
    pub async fn resolve_for_creation(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        lookup: CategoryLookup,
        default_name: Option<&str>,
    ) -> Result<Category, CategoryError> {
        let lookup = lookup.or_name(default_name);
        self.resolve(user_id, category_type, &lookup).await
    }
}
