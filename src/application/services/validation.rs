//! Input checks applied before a write reaches storage.

use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::domain::error::DomainError;

pub const MAX_NAME_LENGTH: usize = 255;

const ROUND_DURATION_STEPS: [i64; 6] = [0, 5, 10, 15, 30, 60];
const ROUND_METHODS: [&str; 3] = ["up", "down", "nearest"];
const INVOICE_TEXT_FIELDS: [&str; 3] = ["invoiceName", "invoiceTitle", "invoiceAddress"];

pub fn required<T>(field: &'static str, value: Option<T>) -> Result<T, DomainError> {
    value.ok_or_else(|| DomainError::invalid_field(field, "is required"))
}

/// Trimmed, non-empty, at most [`MAX_NAME_LENGTH`] characters.
pub fn required_text(field: &'static str, value: Option<String>) -> Result<String, DomainError> {
    let value = optional_text(value).ok_or_else(|| DomainError::invalid_field(field, "is required"))?;
    max_length(field, &value)?;
    Ok(value)
}

/// Blank strings collapse to `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

pub fn max_length(field: &'static str, value: &str) -> Result<(), DomainError> {
    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::invalid_field(
            field,
            format!("must not exceed {MAX_NAME_LENGTH} characters"),
        ));
    }
    Ok(())
}

/// `YYYY-MM-DD`.
pub fn date(field: &'static str, value: &str) -> Result<Date, DomainError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| DomainError::invalid_field(field, "must be a date (YYYY-MM-DD)"))
}

/// RFC 3339 timestamp; the offset is kept so callers can read the local date.
pub fn timestamp(field: &'static str, value: &str) -> Result<OffsetDateTime, DomainError> {
    OffsetDateTime::parse(value.trim(), &Rfc3339)
        .map_err(|_| DomainError::invalid_field(field, "must be an RFC 3339 timestamp"))
}

/// Three-letter currency code, upper-cased.
pub fn currency(field: &'static str, value: Option<String>) -> Result<String, DomainError> {
    let value = required(field, optional_text(value))?;
    if value.chars().count() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::invalid_field(field, "must be exactly 3 letters"));
    }
    Ok(value.to_ascii_uppercase())
}

/// Major currency units in, minor units out.
pub fn rate_in_cents(field: &'static str, value: f64) -> Result<i64, DomainError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::invalid_field(
            field,
            "must be a non-negative number",
        ));
    }
    Ok((value * 100.0).round() as i64)
}

/// `additional_properties` must be an object when present; absent means empty.
pub fn properties_object(
    field: &'static str,
    value: Option<Value>,
) -> Result<Map<String, Value>, DomainError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(DomainError::invalid_field(field, "must be an object")),
    }
}

/// Invoice settings stored on the global preference.
pub fn preference_properties(properties: &Map<String, Value>) -> Result<(), DomainError> {
    if let Some(step) = properties.get("roundDurationTo").filter(|v| !v.is_null()) {
        match step.as_i64() {
            Some(step) if ROUND_DURATION_STEPS.contains(&step) => {}
            _ => {
                return Err(DomainError::invalid_field(
                    "additional_properties.roundDurationTo",
                    "must be one of 0, 5, 10, 15, 30, 60",
                ));
            }
        }
    }

    if let Some(method) = properties.get("roundMethod").filter(|v| !v.is_null()) {
        match method.as_str() {
            Some(method) if ROUND_METHODS.contains(&method) => {}
            _ => {
                return Err(DomainError::invalid_field(
                    "additional_properties.roundMethod",
                    "must be one of up, down, nearest",
                ));
            }
        }
    }

    for field in INVOICE_TEXT_FIELDS {
        if let Some(value) = properties.get(field).filter(|v| !v.is_null()) {
            let Some(text) = value.as_str() else {
                return Err(DomainError::invalid_field(
                    "additional_properties",
                    format!("`{field}` must be a string"),
                ));
            };
            max_length("additional_properties", text)?;
        }
    }

    if let Some(color) = properties.get("invoicePrimaryColor").filter(|v| !v.is_null())
        && !color.as_str().is_some_and(is_hex_color)
    {
        return Err(DomainError::invalid_field(
            "additional_properties.invoicePrimaryColor",
            "must be a hex colour such as #1a2b3c",
        ));
    }

    Ok(())
}

/// `#abc` or `#aabbcc`.
pub fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|digits| {
        matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit())
    })
}
