//! Validation and normalization of raw transaction payloads.
//!
//! Everything here is pure: callers pass in "now" so that defaults stay
//! testable. Category resolution happens in between [`normalize`] and
//! [`NormalizedTransaction::into_transaction`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::category::{Category, EntryType};
use crate::models::filters::{SortDirection, SortField, TransactionFilters, TransactionListQuery};
use crate::models::transaction::{Transaction, TransactionInput, TransactionStatus};
use crate::services::category_resolver::CategoryLookup;
use crate::services::transaction_service::TransactionError;

const INVALID_TYPE: &str = "type must be either income or expense";
const INVALID_AMOUNT: &str = "amount must be a positive number";
const INVALID_STATUS: &str = "status must be either active or undone";
const AMOUNT_TOO_LARGE: &str = "amount must not exceed 1000000000000";

/// Largest accepted amount; keeps per-user sums far inside `Decimal` range
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Reject payloads without a `date`
    pub require_date: bool,
}

/// A validated create payload, still waiting for its category
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    pub transaction_type: EntryType,
    pub amount: Decimal,
    pub status: TransactionStatus,
    /// Supplied date at UTC midnight; `None` means "now"
    pub date: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub lookup: CategoryLookup,
}

impl NormalizedTransaction {
    /// Trimmed title, else the category name, else the type
    pub fn title_for(&self, category_name: &str) -> String {
        default_title(self.title.as_deref(), category_name, self.transaction_type)
    }

    pub fn into_transaction(self, user_id: Uuid, category: &Category, now: DateTime<Utc>) -> Transaction {
        let title = self.title_for(&category.name);
        Transaction {
            id: Uuid::new_v4(),
            user_id,
            title,
            description: self.description,
            transaction_type: self.transaction_type,
            category_name: category.name.clone(),
            category_id: category.id,
            amount: self.amount,
            date: self.date.unwrap_or(now),
            is_custom_date: self.date.is_some(),
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_title(title: Option<&str>, category_name: &str, entry_type: EntryType) -> String {
    [title.unwrap_or_default().trim(), category_name.trim()]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| entry_type.to_string())
}

fn invalid(message: &str) -> TransactionError {
    TransactionError::Validation(message.to_string())
}

pub fn parse_entry_type(value: Option<&str>) -> Result<EntryType, TransactionError> {
    value
        .map(str::trim)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| invalid(INVALID_TYPE))
}

pub fn parse_status(value: &str) -> Result<TransactionStatus, TransactionError> {
    value.trim().parse().map_err(|_| invalid(INVALID_STATUS))
}

/// Parses a JSON number or numeric string into an exact, strictly positive
/// decimal
pub fn parse_amount(value: &Value) -> Result<Decimal, TransactionError> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return Err(invalid(INVALID_AMOUNT)),
    };

    let amount = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .filter(|amount| *amount > Decimal::ZERO)
        .ok_or_else(|| invalid(INVALID_AMOUNT))?;

    if amount > Decimal::from(MAX_AMOUNT) {
        return Err(invalid(AMOUNT_TOO_LARGE));
    }
    Ok(amount)
}

/// Midnight UTC of the UTC calendar day of `value`.
///
/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM:SS` (read as UTC)
/// and plain `YYYY-MM-DD`.
pub fn normalize_to_utc_midnight(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    let day = if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        timestamp.with_timezone(&Utc).date_naive()
    } else if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        naive.date()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?
    };

    Some(day.and_time(NaiveTime::MIN).and_utc())
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, TransactionError> {
    normalize_to_utc_midnight(value).ok_or_else(|| invalid("date is invalid"))
}

/// Validates a create payload
pub fn normalize(
    input: &TransactionInput,
    options: NormalizeOptions,
) -> Result<NormalizedTransaction, TransactionError> {
    let transaction_type = parse_entry_type(input.transaction_type.as_deref())?;

    let amount = match &input.amount {
        Some(value) => parse_amount(value)?,
        None => return Err(invalid(INVALID_AMOUNT)),
    };

    let status = match input.status.as_deref() {
        Some(status) => parse_status(status)?,
        None => TransactionStatus::default(),
    };

    let date = match input.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(date) => Some(parse_date(date)?),
        None if options.require_date => return Err(invalid("date is required")),
        None => None,
    };

    Ok(NormalizedTransaction {
        transaction_type,
        amount,
        status,
        date,
        title: input.title.clone(),
        description: input.description.clone().flatten(),
        lookup: CategoryLookup::derive(input.category.as_deref(), input.category_id.as_deref()),
    })
}

/// A validated partial update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionUpdate {
    pub transaction_type: Option<EntryType>,
    pub amount: Option<Decimal>,
    pub status: Option<TransactionStatus>,
    pub date: Option<DateTime<Utc>>,
    pub title: Option<String>,
    /// `Some` replaces the description
    pub description: Option<String>,
    /// `is_custom_date: false` without a date
    pub reset_date: bool,
    pub lookup: CategoryLookup,
    /// The category must be resolved again
    pub recategorize: bool,
}

/// Validates an update payload; absent fields are left untouched
pub fn normalize_update(input: &TransactionInput) -> Result<TransactionUpdate, TransactionError> {
    let transaction_type = match input.transaction_type.as_deref() {
        Some(value) => Some(parse_entry_type(Some(value))?),
        None => None,
    };

    let amount = input.amount.as_ref().map(parse_amount).transpose()?;
    let status = input.status.as_deref().map(parse_status).transpose()?;
    let date = input.date.as_deref().map(parse_date).transpose()?;

    Ok(TransactionUpdate {
        transaction_type,
        amount,
        status,
        date,
        title: input.title.clone(),
        description: input
            .description
            .clone()
            .map(|description| description.unwrap_or_default()),
        reset_date: date.is_none() && input.is_custom_date == Some(false),
        lookup: CategoryLookup::derive(input.category.as_deref(), input.category_id.as_deref()),
        recategorize: input.category.is_some()
            || input.category_id.is_some()
            || input.transaction_type.is_some(),
    })
}

impl TransactionUpdate {
    /// Applies the update on top of `existing`. `category` is the freshly
    /// resolved category when [`TransactionUpdate::recategorize`] was set.
    pub fn apply(
        self,
        mut existing: Transaction,
        category: Option<&Category>,
        now: DateTime<Utc>,
    ) -> Transaction {
        if let Some(transaction_type) = self.transaction_type {
            existing.transaction_type = transaction_type;
        }

        if let Some(category) = category {
            existing.category_id = category.id;
            existing.category_name = category.name.clone();
        }

        if let Some(title) = self.title {
            existing.title = default_title(
                Some(&title),
                &existing.category_name,
                existing.transaction_type,
            );
        }

        if let Some(description) = self.description {
            existing.description = Some(description);
        }

        if let Some(amount) = self.amount {
            existing.amount = amount;
        }

        if let Some(status) = self.status {
            existing.status = status;
        }

        if let Some(date) = self.date {
            existing.date = date;
            existing.is_custom_date = true;
        } else if self.reset_date {
            existing.date = now;
            existing.is_custom_date = false;
        }

        existing.updated_at = now;
        existing
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value?.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Converts raw listing parameters into validated filters
pub fn build_filters(query: &TransactionListQuery) -> Result<TransactionFilters, TransactionError> {
    let status = non_blank(query.status.as_deref())
        .map(parse_status)
        .transpose()?;

    let transaction_type = match non_blank(query.transaction_type.as_deref()) {
        Some(value) => Some(parse_entry_type(Some(value))?),
        None => None,
    };

    let start = non_blank(query.start_date.as_deref())
        .map(|value| normalize_to_utc_midnight(value).ok_or_else(|| invalid("start_date is invalid")))
        .transpose()?;

    // Inclusive through the last millisecond of the day
    let end = non_blank(query.end_date.as_deref())
        .map(|value| {
            normalize_to_utc_midnight(value)
                .map(|midnight| midnight + Duration::days(1) - Duration::milliseconds(1))
                .ok_or_else(|| invalid("end_date is invalid"))
        })
        .transpose()?;

    let pagination = match (
        parse_positive(query.page.as_deref()),
        parse_positive(query.page_size.as_deref()),
    ) {
        (Some(page), Some(page_size)) => Some((page, page_size)),
        _ => None,
    };

    Ok(TransactionFilters {
        status,
        transaction_type,
        start,
        end,
        category: non_blank(query.category.as_deref()).map(str::to_string),
        sort_by: SortField::parse_lenient(query.sort_by.as_deref()),
        sort_dir: SortDirection::parse_lenient(query.sort_dir.as_deref()),
        pagination,
    })
}

/// Whether both instants fall on the same calendar day in `tz`
pub fn is_same_local_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

/// Transactions can only be deleted on the day they are dated, in the user's zone
pub fn ensure_deletable_today(
    date: DateTime<Utc>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Result<(), TransactionError> {
    if is_same_local_day(date, now, tz) {
        Ok(())
    } else {
        Err(TransactionError::NotToday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn input(value: Value) -> TransactionInput {
        serde_json::from_value(value).unwrap()
    }

    fn validation_message(error: TransactionError) -> String {
        match error {
            TransactionError::Validation(message) => message,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_defaults() {
        let normalized = normalize(
            &input(json!({"type": "expense", "amount": 12.5})),
            NormalizeOptions::default(),
        )
        .unwrap();

        assert_eq!(normalized.transaction_type, EntryType::Expense);
        assert_eq!(normalized.amount, dec!(12.5));
        assert_eq!(normalized.status, TransactionStatus::Active);
        assert!(normalized.date.is_none());
        assert!(normalized.lookup.is_empty());
    }

    #[test]
    fn test_normalize_rejects_bad_type() {
        let error = normalize(
            &input(json!({"type": "transfer", "amount": 1})),
            NormalizeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(validation_message(error), "type must be either income or expense");
    }

    #[test]
    fn test_amount_must_be_positive() {
        for amount in [json!(0), json!(-5), json!("abc"), json!(true)] {
            let error = normalize(
                &input(json!({"type": "income", "amount": amount})),
                NormalizeOptions::default(),
            )
            .unwrap_err();
            assert_eq!(validation_message(error), "amount must be a positive number");
        }

        let error = normalize(&input(json!({"type": "income"})), NormalizeOptions::default())
            .unwrap_err();
        assert_eq!(validation_message(error), "amount must be a positive number");
    }

    #[test]
    fn test_amount_is_exact() {
        assert_eq!(parse_amount(&json!("0.10")).unwrap(), dec!(0.10));
        assert_eq!(parse_amount(&json!(19.99)).unwrap(), dec!(19.99));
        assert_eq!(parse_amount(&json!(" 7 ")).unwrap(), dec!(7));
    }

    #[test]
    fn test_amount_upper_bound() {
        assert_eq!(
            parse_amount(&json!(1_000_000_000_000i64)).unwrap(),
            Decimal::from(MAX_AMOUNT)
        );
        assert_eq!(
            validation_message(parse_amount(&json!("1000000000000.01")).unwrap_err()),
            "amount must not exceed 1000000000000"
        );
        assert_eq!(
            validation_message(parse_amount(&json!("5e28")).unwrap_err()),
            "amount must not exceed 1000000000000"
        );
    }

    #[test]
    fn test_custom_date_is_utc_midnight() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(normalize_to_utc_midnight("2024-01-15"), Some(expected));
        assert_eq!(normalize_to_utc_midnight("2024-01-15T18:30:00Z"), Some(expected));
        assert_eq!(normalize_to_utc_midnight("2024-01-15T18:30:00"), Some(expected));
        // 2024-01-14 23:00 in New York is already the 15th in UTC
        assert_eq!(
            normalize_to_utc_midnight("2024-01-14T23:00:00-05:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
        assert!(normalize_to_utc_midnight("yesterday").is_none());
    }

    #[test]
    fn test_require_date() {
        let error = normalize(
            &input(json!({"type": "income", "amount": 1})),
            NormalizeOptions { require_date: true },
        )
        .unwrap_err();
        assert_eq!(validation_message(error), "date is required");

        let normalized = normalize(
            &input(json!({"type": "income", "amount": 1, "date": "2024-02-29"})),
            NormalizeOptions { require_date: true },
        )
        .unwrap();
        assert_eq!(
            normalized.date,
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_title_fallbacks() {
        let mut normalized = normalize(
            &input(json!({"type": "income", "amount": 1, "title": "  "})),
            NormalizeOptions::default(),
        )
        .unwrap();
        assert_eq!(normalized.title_for("Sales"), "Sales");
        assert_eq!(normalized.title_for(""), "income");

        normalized.title = Some(" Invoice 42 ".to_string());
        assert_eq!(normalized.title_for("Sales"), "Invoice 42");
    }

    #[test]
    fn test_into_transaction_marks_custom_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let user_id = Uuid::new_v4();
        let category = Category::new_owned(user_id, EntryType::Expense, "Stock", true);

        let without_date = normalize(
            &input(json!({"type": "expense", "amount": "3"})),
            NormalizeOptions::default(),
        )
        .unwrap()
        .into_transaction(user_id, &category, now);
        assert_eq!(without_date.date, now);
        assert!(!without_date.is_custom_date);
        assert_eq!(without_date.category_name, "Stock");
        assert_eq!(without_date.title, "Stock");

        let with_date = normalize(
            &input(json!({"type": "expense", "amount": "3", "date": "2024-02-01"})),
            NormalizeOptions::default(),
        )
        .unwrap()
        .into_transaction(user_id, &category, now);
        assert!(with_date.is_custom_date);
    }

    fn existing_transaction(now: DateTime<Utc>) -> Transaction {
        let user_id = Uuid::new_v4();
        let category = Category::new_owned(user_id, EntryType::Expense, "Food", false);
        normalize(
            &input(json!({
                "type": "expense",
                "amount": "10",
                "title": "Lunch",
                "description": "with team",
                "date": "2024-01-10"
            })),
            NormalizeOptions::default(),
        )
        .unwrap()
        .into_transaction(user_id, &category, now)
    }

    #[test]
    fn test_update_only_touches_supplied_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let existing = existing_transaction(now);

        let update = normalize_update(&input(json!({"amount": "11.25"}))).unwrap();
        assert!(!update.recategorize);

        let updated = update.apply(existing.clone(), None, now);
        assert_eq!(updated.amount, dec!(11.25));
        assert_eq!(updated.title, "Lunch");
        assert_eq!(updated.description.as_deref(), Some("with team"));
        assert_eq!(updated.date, existing.date);
    }

    #[test]
    fn test_update_blank_title_and_null_note() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let existing = existing_transaction(now);

        let updated = normalize_update(&input(json!({"title": " ", "note": null})))
            .unwrap()
            .apply(existing, None, now);
        assert_eq!(updated.title, "Food");
        assert_eq!(updated.description.as_deref(), Some(""));
    }

    #[test]
    fn test_update_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let existing = existing_transaction(now);

        let moved = normalize_update(&input(json!({"date": "2024-02-20T15:00:00Z"})))
            .unwrap()
            .apply(existing.clone(), None, now);
        assert_eq!(moved.date, Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap());
        assert!(moved.is_custom_date);

        let reset = normalize_update(&input(json!({"is_custom_date": false})))
            .unwrap()
            .apply(existing, None, now);
        assert_eq!(reset.date, now);
        assert!(!reset.is_custom_date);
    }

    #[test]
    fn test_update_recategorizes_on_type_or_category() {
        assert!(normalize_update(&input(json!({"type": "income"}))).unwrap().recategorize);
        assert!(normalize_update(&input(json!({"category": "Rent"}))).unwrap().recategorize);
        assert!(normalize_update(&input(json!({"status": "undone"}))).is_ok_and(|u| !u.recategorize));
        assert!(normalize_update(&input(json!({"status": "gone"}))).is_err());
        assert!(normalize_update(&input(json!({"amount": 0}))).is_err());
    }

    #[test]
    fn test_build_filters() {
        let query = TransactionListQuery {
            status: Some("active".to_string()),
            transaction_type: Some("expense".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            category: Some(" foo ".to_string()),
            sort_by: Some("amount".to_string()),
            sort_dir: Some("asc".to_string()),
            page: Some("2".to_string()),
            page_size: Some("10".to_string()),
        };

        let filters = build_filters(&query).unwrap();
        assert_eq!(filters.status, Some(TransactionStatus::Active));
        assert_eq!(filters.transaction_type, Some(EntryType::Expense));
        assert_eq!(filters.start, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(
            filters.end,
            Some(
                Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()
                    + Duration::milliseconds(999)
            )
        );
        assert_eq!(filters.category.as_deref(), Some("foo"));
        assert_eq!(filters.sort_by, SortField::Amount);
        assert_eq!(filters.sort_dir, SortDirection::Asc);
        assert_eq!(filters.pagination, Some((2, 10)));
        assert_eq!(filters.offset(), Some(10));
    }

    #[test]
    fn test_build_filters_is_lenient_about_sort_and_paging() {
        let query = TransactionListQuery {
            sort_by: Some("title".to_string()),
            sort_dir: Some("sideways".to_string()),
            page: Some("0".to_string()),
            page_size: Some("10".to_string()),
            ..Default::default()
        };

        let filters = build_filters(&query).unwrap();
        assert_eq!(filters.sort_by, SortField::Date);
        assert_eq!(filters.sort_dir, SortDirection::Desc);
        assert!(filters.pagination.is_none());
    }

    #[test]
    fn test_build_filters_rejects_bad_values() {
        let bad_type = TransactionListQuery {
            transaction_type: Some("gift".to_string()),
            ..Default::default()
        };
        assert!(build_filters(&bad_type).is_err());

        let bad_date = TransactionListQuery {
            start_date: Some("soon".to_string()),
            ..Default::default()
        };
        assert_eq!(
            validation_message(build_filters(&bad_date).unwrap_err()),
            "start_date is invalid"
        );
    }

    #[test]
    fn test_same_local_day_depends_on_zone() {
        // 03:00 UTC on the 16th is still the 15th in New York
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 16, 3, 0, 0).unwrap();

        assert!(!is_same_local_day(date, now, Tz::UTC));
        assert!(!is_same_local_day(date, now, Tz::America__New_York));

        let date = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        assert!(is_same_local_day(date, now, Tz::America__New_York));
        assert!(ensure_deletable_today(date, now, Tz::America__New_York).is_ok());
        assert!(matches!(
            ensure_deletable_today(date, now, Tz::UTC),
            Err(TransactionError::NotToday)
        ));
    }
}
