use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::category::EntryType;

/// Lifecycle status of a transaction. Only `active` ones count toward summaries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Active,
    Undone,
}

#[derive(Debug, thiserror::Error)]
#[error("status must be either active or undone, got '{0}'")]
pub struct ParseStatusError(pub String);

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Undone => "undone",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TransactionStatus::Active),
            "undone" => Ok(TransactionStatus::Undone),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransactionStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Transaction entity.
///
/// `category_name` is a snapshot of the category's name at write time and is
/// not updated when the category changes later.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(try_from = "String")]
    pub transaction_type: EntryType,
    pub category_name: String,
    pub category_id: Uuid,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub is_custom_date: bool,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw transaction payload used by both create and update.
///
/// Every field is optional and kept loosely typed so that the normalizer can
/// report precise validation errors. `description` and `note` are aliases:
/// whichever appears later in the JSON object wins.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[schema(example = json!({
    "type": "expense",
    "amount": 42.50,
    "category": "Groceries",
    "date": "2024-01-15",
    "description": "Weekly shopping"
}))]
pub struct TransactionInput {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// JSON number or numeric string
    #[schema(value_type = Option<f64>)]
    pub amount: Option<serde_json::Value>,
    /// Category name, or a category id
    pub category: Option<String>,
    pub category_id: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub date: Option<String>,
    /// Outer `Some` means the field was present; inner `None` means it was null
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub status: Option<String>,
    pub is_custom_date: Option<bool>,
}

impl<'de> Deserialize<'de> for TransactionInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct InputVisitor;

        impl<'de> Visitor<'de> for InputVisitor {
            type Value = TransactionInput;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a transaction object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut input = TransactionInput::default();

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "title" => input.title = map.next_value()?,
                        "type" => input.transaction_type = map.next_value()?,
                        "amount" => {
                            let value: serde_json::Value = map.next_value()?;
                            input.amount = (!value.is_null()).then_some(value);
                        }
                        "category" => input.category = map.next_value()?,
                        "category_id" => input.category_id = map.next_value()?,
                        "date" => input.date = map.next_value()?,
                        // Aliases: last one in the payload wins
                        "description" | "note" => input.description = Some(map.next_value()?),
                        "status" => input.status = map.next_value()?,
                        "is_custom_date" => input.is_custom_date = map.next_value()?,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }

                Ok(input)
            }
        }

        deserializer.deserialize_map(InputVisitor)
    }
}

/// Transaction listing, with paging metadata when pagination was requested
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionList {
    pub transactions: Vec<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}
