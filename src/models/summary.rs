use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::category::EntryType;

/// Sum of active transactions of one type on one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub entry_type: EntryType,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct MonthlyBucket {
    /// `YYYY-MM`
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct WeeklyBucket {
    /// ISO week, `YYYY-Www`
    pub week: String,
    pub income: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct YearlyBucket {
    pub year: i32,
    pub income: Decimal,
    pub expense: Decimal,
}

/// Totals and time-bucketed breakdown of a user's active transactions
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Summary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
    pub monthly_summary: Vec<MonthlyBucket>,
    pub weekly_summary: Vec<WeeklyBucket>,
    pub yearly_summary: Vec<YearlyBucket>,
}
