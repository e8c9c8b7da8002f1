use chrono_tz::Tz;
use iso_currency::Currency;
use std::collections::BTreeMap;
use validator::{ValidationError, ValidationErrors};

use crate::models::currency;

/// Parses an IANA time zone name such as `America/New_York`
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Validates that a time zone is a known IANA zone
pub fn validate_timezone(name: &str) -> Result<(), ValidationError> {
    if parse_timezone(name).is_none() {
        let mut error = ValidationError::new("invalid_timezone");
        error.message = Some(
            format!(
                "'{}' is not a valid IANA time zone, e.g. America/New_York",
                name
            )
            .into(),
        );
        return Err(error);
    }
    Ok(())
}

/// Like [`validate_timezone`], but a blank value is accepted and means "clear"
pub fn validate_timezone_or_blank(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Ok(());
    }
    validate_timezone(name)
}

/// Validates an ISO 4217 code that is also on the supported list
pub fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    let normalized = code.trim().to_ascii_uppercase();
    Currency::from_code(&normalized).ok_or_else(|| {
        let mut error = ValidationError::new("invalid_currency");
        error.message = Some(format!("'{}' is not a valid ISO 4217 currency code", code).into());
        error
    })?;

    if !currency::is_supported(&normalized) {
        let mut error = ValidationError::new("unsupported_currency");
        error.message = Some(format!("'{}' is not a supported currency", normalized).into());
        return Err(error);
    }
    Ok(())
}

/// Validates that a string has non-whitespace content
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("required");
        error.message = Some("This field is required".into());
        return Err(error);
    }
    Ok(())
}

/// Flattens `validator` errors into a field -> message map for error payloads
pub fn validation_details(errors: &ValidationErrors) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages.join(", "))
        })
        .collect()
}
