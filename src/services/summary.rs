use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::category::EntryType;
use crate::models::summary::{DailyTotal, MonthlyBucket, Summary, WeeklyBucket, YearlyBucket};

const MONTHS_KEPT: usize = 12;
const WEEKS_KEPT: usize = 12;
const YEARS_KEPT: usize = 5;

/// A running total left the representable `Decimal` range
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Transaction totals exceed the supported numeric range")]
pub struct SummaryOverflow;

#[derive(Debug, Default, Clone, Copy)]
struct Flow {
    income: Decimal,
    expense: Decimal,
}

impl Flow {
    fn add(&mut self, entry_type: EntryType, amount: Decimal) -> Result<(), SummaryOverflow> {
        let total = match entry_type {
            EntryType::Income => &mut self.income,
            EntryType::Expense => &mut self.expense,
        };
        *total = total.checked_add(amount).ok_or(SummaryOverflow)?;
        Ok(())
    }
}

/// Newest `keep` buckets, newest first
fn newest<K: Ord, T>(buckets: BTreeMap<K, Flow>, keep: usize, build: impl Fn(K, Flow) -> T) -> Vec<T> {
    buckets
        .into_iter()
        .rev()
        .take(keep)
        .map(|(key, flow)| build(key, flow))
        .collect()
}

/// Folds per-day totals into overall totals and month/week/year buckets.
///
/// Only days with activity produce buckets. Week keys use the ISO week-year,
/// so 2021-01-01 belongs to `2020-W53`.
pub fn summarize_days(days: &[DailyTotal]) -> Result<Summary, SummaryOverflow> {
    let mut overall = Flow::default();
    let mut monthly: BTreeMap<String, Flow> = BTreeMap::new();
    let mut weekly: BTreeMap<String, Flow> = BTreeMap::new();
    let mut yearly: BTreeMap<i32, Flow> = BTreeMap::new();

    for day in days {
        let iso = day.day.iso_week();
        let month_key = format!("{:04}-{:02}", day.day.year(), day.day.month());
        let week_key = format!("{:04}-W{:02}", iso.year(), iso.week());

        overall.add(day.entry_type, day.total)?;
        monthly.entry(month_key).or_default().add(day.entry_type, day.total)?;
        weekly.entry(week_key).or_default().add(day.entry_type, day.total)?;
        yearly.entry(day.day.year()).or_default().add(day.entry_type, day.total)?;
    }

    let balance = overall
        .income
        .checked_sub(overall.expense)
        .ok_or(SummaryOverflow)?;

    Ok(Summary {
        total_income: overall.income,
        total_expense: overall.expense,
        balance,
        monthly_summary: newest(monthly, MONTHS_KEPT, |month, flow| MonthlyBucket {
            month,
            income: flow.income,
            expense: flow.expense,
        }),
        weekly_summary: newest(weekly, WEEKS_KEPT, |week, flow| WeeklyBucket {
            week,
            income: flow.income,
            expense: flow.expense,
        }),
        yearly_summary: newest(yearly, YEARS_KEPT, |year, flow| YearlyBucket {
            year,
            income: flow.income,
            expense: flow.expense,
        }),
    })
}
