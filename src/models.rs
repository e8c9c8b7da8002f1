pub mod auth;
pub mod category;
pub mod currency;
pub mod filters;
pub mod summary;
pub mod transaction;
pub mod user;

pub use auth::{AuthSession, AuthTokens, LoginRequest, RefreshRequest};
pub use category::{
    ArchiveCategoryResponse, Category, CategoryList, CategoryResponse, CreateCategoryRequest,
    CreateCategoryResponse, DEFAULT_CATEGORY_LIMIT, DEFAULT_EXPENSE_CATEGORY,
    DEFAULT_INCOME_CATEGORY, EntryType, SetDefaultCategoryRequest, SetDefaultCategoryResponse,
    UserDefaults,
};
pub use currency::{
    CurrencyList, CurrencyResponse, DEFAULT_CURRENCY, UpdateCurrencyRequest, UpdateCurrencyResponse,
};
pub use filters::{SortDirection, SortField, TransactionFilters, TransactionListQuery};
pub use summary::{DailyTotal, MonthlyBucket, Summary, WeeklyBucket, YearlyBucket};
pub use transaction::{Transaction, TransactionInput, TransactionList, TransactionStatus};
pub use user::{
    CreateUserRequest, NewUser, ProfileChanges, UpdateProfileRequest, User, UserProfile,
};
