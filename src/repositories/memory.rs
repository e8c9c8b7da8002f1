//! In-memory implementation of every repository trait.
//!
//! Mirrors the PostgreSQL semantics closely enough for service and router
//! tests: the `(owner, type, name)` uniqueness rule, owned-before-global name
//! lookups and the listing order.
//!
//! Only compiled for unit tests and with the `test-util` feature.

use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::models::category::{Category, EntryType};
use crate::models::filters::{SortDirection, SortField, TransactionFilters};
use crate::models::summary::DailyTotal;
use crate::models::transaction::{Transaction, TransactionStatus};
use crate::models::user::{NewUser, ProfileChanges, User};
use crate::repositories::{
    CategoryRepository, RepositoryError, TransactionRepository, UserRepository,
};

/// Thread-safe in-memory store
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<HashMap<Uuid, User>>,
    categories: Mutex<HashMap<Uuid, Category>>,
    transactions: Mutex<HashMap<Uuid, Transaction>>,
    should_fail: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails with a database error
    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.should_fail {
            return Err(RepositoryError::DatabaseError(
                "Database connection failed".to_string(),
            ));
        }
        Ok(())
    }

    /// Insert a global category, as a seed procedure would
    pub fn seed_global_category(&self, category_type: EntryType, name: &str) -> Category {
        let mut category = Category::new_owned(Uuid::nil(), category_type, name, false);
        category.user_id = None;
        lock(&self.categories).insert(category.id, category.clone());
        category
    }

    /// Insert a category as is, bypassing uniqueness checks
    pub fn insert_category(&self, category: Category) {
        lock(&self.categories).insert(category.id, category);
    }

    /// Insert a transaction as is
    pub fn insert_transaction(&self, transaction: Transaction) {
        lock(&self.transactions).insert(transaction.id, transaction);
    }

    /// Snapshot of all categories owned by the user
    pub fn categories_of(&self, user_id: Uuid) -> Vec<Category> {
        lock(&self.categories)
            .values()
            .filter(|c| c.user_id == Some(user_id))
            .cloned()
            .collect()
    }
}

fn category_order(a: &Category, b: &Category) -> Ordering {
    a.category_type
        .as_str()
        .cmp(b.category_type.as_str())
        .then(b.is_default.cmp(&a.is_default))
        .then(b.is_active.cmp(&a.is_active))
        .then(a.name.cmp(&b.name))
}

fn matches_filters(transaction: &Transaction, user_id: Uuid, filters: &TransactionFilters) -> bool {
    transaction.user_id == user_id
        && filters.status.is_none_or(|s| transaction.status == s)
        && filters
            .transaction_type
            .is_none_or(|t| transaction.transaction_type == t)
        && filters.start.is_none_or(|start| transaction.date >= start)
        && filters.end.is_none_or(|end| transaction.date <= end)
        && filters.category.as_ref().is_none_or(|needle| {
            transaction
                .category_name
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = lock(&self.users);

        if users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::ConstraintViolation(
                "Email already exists".to_string(),
            ));
        }

        let user = user.into_user();
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.users).values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.users).get(&id).cloned())
    }

    async fn set_default_categories(
        &self,
        id: Uuid,
        entry_type: EntryType,
        names: Vec<String>,
    ) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = lock(&self.users);
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        match entry_type {
            EntryType::Income => user.default_income_categories = names,
            EntryType::Expense => user.default_expense_categories = names,
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = lock(&self.users);
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        user.name = changes.name;
        user.fname = changes.fname;
        user.lname = changes.lname;
        user.timezone = changes.timezone;
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn set_currency(&self, id: Uuid, code: &str) -> Result<User, RepositoryError> {
        self.check()?;
        let mut users = lock(&self.users);
        let user = users.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        user.currency = code.to_string();
        user.updated_at = Utc::now();

        Ok(user.clone())
    }
}

#[async_trait]
impl CategoryRepository for InMemoryStore {
    async fn create(&self, category: Category) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = lock(&self.categories);

        let duplicate = categories.values().any(|c| {
            c.user_id == category.user_id
                && c.category_type == category.category_type
                && c.name == category.name
        });
        if duplicate {
            return Err(RepositoryError::ConstraintViolation(
                "Category with this name already exists for user".to_string(),
            ));
        }

        categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.categories).get(&id).cloned())
    }

    async fn find_visible_by_id(
        &self,
        user_id: Uuid,
        id: Uuid,
        category_type: EntryType,
    ) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.categories)
            .get(&id)
            .filter(|c| c.category_type == category_type && c.is_visible_to(user_id))
            .cloned())
    }

    async fn find_visible_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        let categories = lock(&self.categories);
        let mut matches: Vec<&Category> = categories
            .values()
            .filter(|c| {
                c.category_type == category_type && c.name == name && c.is_visible_to(user_id)
            })
            .collect();
        // Owned before global
        matches.sort_by_key(|c| c.user_id.is_none());
        Ok(matches.first().map(|c| (*c).clone()))
    }

    async fn find_owned(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.categories)
            .get(&id)
            .filter(|c| c.user_id == Some(user_id))
            .cloned())
    }

    async fn find_owned_by_name(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.categories)
            .values()
            .find(|c| {
                c.user_id == Some(user_id) && c.category_type == category_type && c.name == name
            })
            .cloned())
    }

    async fn list_visible(
        &self,
        user_id: Uuid,
        category_type: Option<EntryType>,
        active_only: bool,
    ) -> Result<Vec<Category>, RepositoryError> {
        self.check()?;
        let mut result: Vec<Category> = lock(&self.categories)
            .values()
            .filter(|c| c.is_visible_to(user_id))
            .filter(|c| category_type.is_none_or(|t| c.category_type == t))
            .filter(|c| !active_only || c.is_active)
            .cloned()
            .collect();
        result.sort_by(category_order);
        Ok(result)
    }

    async fn count_active_visible(
        &self,
        user_id: Uuid,
        category_type: EntryType,
    ) -> Result<i64, RepositoryError> {
        self.check()?;
        let count = lock(&self.categories)
            .values()
            .filter(|c| c.category_type == category_type && c.is_active && c.is_visible_to(user_id))
            .count();
        Ok(count as i64)
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = lock(&self.categories);
        let category = categories.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        category.is_active = is_active;
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn set_default(&self, id: Uuid, is_default: bool) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = lock(&self.categories);
        let category = categories.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        category.is_default = is_default;
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    async fn clear_other_defaults(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        keep_id: Uuid,
    ) -> Result<u64, RepositoryError> {
        self.check()?;
        let mut cleared = 0;
        for category in lock(&self.categories).values_mut() {
            if category.user_id == Some(user_id)
                && category.category_type == category_type
                && category.is_default
                && category.id != keep_id
            {
                category.is_default = false;
                category.updated_at = Utc::now();
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn upsert_default(
        &self,
        user_id: Uuid,
        category_type: EntryType,
        name: &str,
    ) -> Result<Category, RepositoryError> {
        self.check()?;
        let mut categories = lock(&self.categories);

        let existing = categories.values_mut().find(|c| {
            c.user_id == Some(user_id) && c.category_type == category_type && c.name == name
        });

        if let Some(category) = existing {
            category.is_active = true;
            category.updated_at = Utc::now();
            return Ok(category.clone());
        }

        let category = Category::new_owned(user_id, category_type, name, true);
        categories.insert(category.id, category.clone());
        Ok(category)
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn create(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        self.check()?;
        lock(&self.transactions).insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn update(&self, transaction: Transaction) -> Result<Transaction, RepositoryError> {
        self.check()?;
        let mut transactions = lock(&self.transactions);
        if !transactions.contains_key(&transaction.id) {
            return Err(RepositoryError::NotFound);
        }

        let mut updated = transaction;
        updated.updated_at = Utc::now();
        transactions.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Transaction>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.transactions).get(&id).cloned())
    }

    async fn find_owned(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Transaction>, RepositoryError> {
        self.check()?;
        Ok(lock(&self.transactions)
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn find_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        self.check()?;
        let mut result: Vec<Transaction> = lock(&self.transactions)
            .values()
            .filter(|t| matches_filters(t, user_id, filters))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            let primary = match filters.sort_by {
                SortField::Date => a.date.cmp(&b.date),
                SortField::Amount => a.amount.cmp(&b.amount),
                SortField::Category => a.category_name.cmp(&b.category_name),
            };
            let primary = match filters.sort_dir {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            primary.then(b.created_at.cmp(&a.created_at))
        });

        if let (Some((_, page_size)), Some(offset)) = (filters.pagination, filters.offset()) {
            result = result
                .into_iter()
                .skip(offset as usize)
                .take(page_size as usize)
                .collect();
        }

        Ok(result)
    }

    async fn count_by_user(
        &self,
        user_id: Uuid,
        filters: &TransactionFilters,
    ) -> Result<i64, RepositoryError> {
        self.check()?;
        let count = lock(&self.transactions)
            .values()
            .filter(|t| matches_filters(t, user_id, filters))
            .count();
        Ok(count as i64)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.check()?;
        match lock(&self.transactions).remove(&id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn daily_totals(&self, user_id: Uuid) -> Result<Vec<DailyTotal>, RepositoryError> {
        self.check()?;
        let mut totals: BTreeMap<(chrono::NaiveDate, EntryType), rust_decimal::Decimal> =
            BTreeMap::new();

        for transaction in lock(&self.transactions).values() {
            if transaction.user_id != user_id || transaction.status != TransactionStatus::Active {
                continue;
            }
            let total = totals
                .entry((transaction.date.date_naive(), transaction.transaction_type))
                .or_default();
            *total = total.checked_add(transaction.amount).ok_or_else(|| {
                RepositoryError::DatabaseError("numeric field overflow".to_string())
            })?;
        }

        Ok(totals
            .into_iter()
            .map(|((day, entry_type), total)| DailyTotal {
                day,
                entry_type,
                total,
            })
            .collect())
    }
}
