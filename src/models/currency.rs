use iso_currency::Currency;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Currency assigned to every new user
pub const DEFAULT_CURRENCY: &str = "USD";

/// ISO 4217 codes users may pick from
pub const SUPPORTED_CURRENCIES: &[&str] = &[
    "AUD", "BRL", "CAD", "CHF", "CNY", "EUR", "GBP", "INR", "JPY", "MXN", "NGN", "USD", "ZAR",
];

/// Whether `code` (any case, surrounding blanks ignored) is a supported currency
pub fn is_supported(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    SUPPORTED_CURRENCIES.contains(&code.as_str())
}

/// Currency as exposed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "code": "EUR", "name": "Euro", "symbol": "€" }))]
pub struct CurrencyResponse {
    pub code: String,
    pub name: String,
    pub symbol: String,
}

impl CurrencyResponse {
    pub fn from_code(code: &str) -> Option<Self> {
        let currency = Currency::from_code(code.trim())?;
        Some(Self {
            code: currency.code().to_string(),
            name: currency.name().to_string(),
            symbol: currency.symbol().to_string(),
        })
    }

    /// Every supported currency, ordered by name
    pub fn supported() -> Vec<Self> {
        let mut currencies: Vec<Self> = SUPPORTED_CURRENCIES
            .iter()
            .filter_map(|code| Self::from_code(code))
            .collect();
        currencies.sort_by(|a, b| a.name.cmp(&b.name));
        currencies
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrencyList {
    pub currencies: Vec<CurrencyResponse>,
}

/// Request payload for changing the user's currency
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "currency": "EUR" }))]
pub struct UpdateCurrencyRequest {
    /// ISO 4217 code
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCurrencyResponse {
    pub currency: CurrencyResponse,
    pub message: String,
}
