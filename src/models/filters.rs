use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::category::EntryType;
use crate::models::transaction::TransactionStatus;

/// Raw query string for listing transactions.
///
/// Values stay strings here; they are validated when converted into
/// [`TransactionFilters`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionListQuery {
    /// `active` or `undone`
    pub status: Option<String>,
    /// `income` or `expense`
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// Inclusive lower bound, interpreted as a UTC calendar day
    pub start_date: Option<String>,
    /// Inclusive upper bound, interpreted as a UTC calendar day
    pub end_date: Option<String>,
    /// Case-insensitive substring of the category name
    pub category: Option<String>,
    /// `date`, `amount` or `category`
    pub sort_by: Option<String>,
    /// `asc` or `desc`
    pub sort_dir: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Date,
    Amount,
    Category,
}

impl SortField {
    /// Unknown values fall back to sorting by date
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("amount") => SortField::Amount,
            Some("category") => SortField::Category,
            _ => SortField::Date,
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            SortField::Date => "date",
            SortField::Amount => "amount",
            SortField::Category => "category_name",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything but `asc` sorts descending
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value {
            Some("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Validated filters for listing a user's transactions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilters {
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<EntryType>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub sort_by: SortField,
    pub sort_dir: SortDirection,
    /// `(page, page_size)`, both 1-based and positive
    pub pagination: Option<(u32, u32)>,
}

impl TransactionFilters {
    pub fn offset(&self) -> Option<i64> {
        self.pagination
            .map(|(page, page_size)| i64::from(page - 1) * i64::from(page_size))
    }
}
