use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Name of the income category every user starts with
pub const DEFAULT_INCOME_CATEGORY: &str = "Sales";

/// Name of the expense category every user starts with
pub const DEFAULT_EXPENSE_CATEGORY: &str = "Stock";

/// Active categories of one type a user may hold unless configured otherwise
pub const DEFAULT_CATEGORY_LIMIT: i32 = 10;

/// Direction of money flow, shared by categories and transactions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Income,
    Expense,
}

#[derive(Debug, thiserror::Error)]
#[error("type must be either income or expense, got '{0}'")]
pub struct ParseEntryTypeError(pub String);

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Income => "income",
            EntryType::Expense => "expense",
        }
    }

    /// Built-in category name used when a transaction omits one
    pub fn builtin_default_name(&self) -> &'static str {
        match self {
            EntryType::Income => DEFAULT_INCOME_CATEGORY,
            EntryType::Expense => DEFAULT_EXPENSE_CATEGORY,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = ParseEntryTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(EntryType::Income),
            "expense" => Ok(EntryType::Expense),
            other => Err(ParseEntryTypeError(other.to_string())),
        }
    }
}

impl TryFrom<String> for EntryType {
    type Error = ParseEntryTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Category entity. `user_id` is `None` for global categories shared by all users.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub category_type: EntryType,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Build a fresh, active, owned category
    pub fn new_owned(user_id: Uuid, category_type: EntryType, name: &str, is_default: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            name: name.trim().to_string(),
            category_type,
            is_default,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_global(&self) -> bool {
        self.user_id.is_none()
    }

    /// Whether `user_id` may reference this category
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.user_id.is_none() || self.user_id == Some(user_id)
    }
}

/// Category as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub category_type: EntryType,
    pub is_default: bool,
    pub is_active: bool,
    pub is_global: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        let is_global = category.is_global();
        Self {
            id: category.id,
            name: category.name,
            category_type: category.category_type,
            is_default: category.is_default,
            is_active: category.is_active,
            is_global,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

/// Categories visible to a user together with the user's quota
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryList {
    pub categories: Vec<CategoryResponse>,
    pub limit: i32,
}

/// Request payload for creating (or reactivating) a category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Rent",
    "type": "expense"
}))]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub category_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCategoryResponse {
    pub category: CategoryResponse,
    /// True when an archived category was brought back instead of inserted
    pub reactivated: bool,
}

/// Request payload for marking a category as the default of its type
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "is_default": true }))]
pub struct SetDefaultCategoryRequest {
    #[serde(default)]
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDefaults {
    pub default_income_categories: Vec<String>,
    pub default_expense_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetDefaultCategoryResponse {
    pub category: CategoryResponse,
    pub defaults: UserDefaults,
    /// True when the category already was the aligned default
    pub unchanged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArchiveCategoryResponse {
    pub category: CategoryResponse,
    pub archived: bool,
}
