//! Request-body rules applied at the service boundary, before any storage call.
//! A present field must satisfy its rule; an empty string is a failure, not "clear".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, AppResult};

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?\(?[0-9]{3}\)?[-\s.]?[0-9]{3}[-\s.]?[0-9]{4,6}$").expect("phone regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static HAS_LETTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").expect("letter regex"));
static HAS_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("digit regex"));

pub const NAME_MAX: usize = 100;
pub const STREET_MAX: usize = 255;
pub const PHONE_MAX: usize = 20;
pub const POSTAL_CODE_MAX: usize = 10;

fn invalid(field: &str, message: String) -> AppError {
    AppError::validation(field.to_string(), message)
}

/// 1..=max characters.
pub fn length(field: &str, value: &str, max: usize) -> AppResult<()> {
    let n = value.chars().count();
    if n == 0 || n > max {
        return Err(invalid(field, format!("{} must be between 1 and {} characters", field, max)));
    }
    Ok(())
}

pub fn required<'a>(field: &str, value: Option<&'a str>) -> AppResult<&'a str> {
    value.ok_or_else(|| invalid(field, format!("{} is required", field)))
}

/// Run `rule` only when the field is present.
pub fn optional(value: Option<&str>, rule: impl FnOnce(&str) -> AppResult<()>) -> AppResult<()> {
    match value {
        Some(v) => rule(v),
        None => Ok(()),
    }
}

pub fn name(field: &str, value: &str) -> AppResult<()> { length(field, value, NAME_MAX) }

pub fn password(field: &str, value: &str) -> AppResult<()> {
    length(field, value, NAME_MAX)?;
    if !HAS_LETTER_RE.is_match(value) || !HAS_DIGIT_RE.is_match(value) {
        return Err(invalid(field, format!("{} must contain both letters and digits", field)));
    }
    Ok(())
}

pub fn email(field: &str, value: &str) -> AppResult<()> {
    length(field, value, NAME_MAX)?;
    if !EMAIL_RE.is_match(value) {
        return Err(invalid(field, format!("{} is not a valid email address", field)));
    }
    Ok(())
}

pub fn phone(field: &str, value: &str) -> AppResult<()> {
    length(field, value, PHONE_MAX)?;
    if !PHONE_RE.is_match(value) {
        return Err(invalid(field, "phone number is invalid".to_string()));
    }
    Ok(())
}

pub fn positive_id(field: &str, value: i64) -> AppResult<()> {
    if value < 1 {
        return Err(invalid(field, format!("{} must be a positive number", field)));
    }
    Ok(())
}

/// Parse a path segment id; non-numeric input is a validation failure.
pub fn parse_id(field: &str, raw: &str) -> AppResult<i64> {
    let id = raw.trim().parse::<i64>().map_err(|_| invalid(field, format!("{} must be a number", field)))?;
    positive_id(field, id)?;
    Ok(id)
}

/// Patch requests must carry at least one field.
pub fn any_present(what: &str, present: &[bool]) -> AppResult<()> {
    if present.iter().any(|p| *p) {
        Ok(())
    } else {
        Err(AppError::validation("empty_update".to_string(), format!("{} update requires at least one field", what)))
    }
}
