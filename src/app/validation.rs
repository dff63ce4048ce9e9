//! Field rules shared by the command handlers.

use crate::error::ValidationErrors;
use chrono::{Datelike, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_NAME_LEN: usize = 100;
pub const MIN_YEAR: i64 = 1900;

static FIPE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}-\d$").expect("valid regex"));

/// Latest accepted reference or model year: next year's models ship early
pub fn max_year() -> i64 {
    i64::from(Utc::now().year()) + 1
}

/// Trimmed copy of `value`, recording an error when empty or too long
pub fn required_name(errors: &mut ValidationErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.add(field, "must not be empty");
    } else if trimmed.chars().count() > MAX_NAME_LEN {
        errors.add(field, format!("must be at most {MAX_NAME_LEN} characters"));
    }
    trimmed.to_string()
}

/// Trimmed optional text; blank becomes `None`
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn year_in_range(errors: &mut ValidationErrors, field: &str, year: i64) {
    let max = max_year();
    if !(MIN_YEAR..=max).contains(&year) {
        errors.add(field, format!("must be between {MIN_YEAR} and {max}"));
    }
}

pub fn positive(errors: &mut ValidationErrors, field: &str, value: i64) {
    if value <= 0 {
        errors.add(field, "must be greater than zero");
    }
}

pub fn price(errors: &mut ValidationErrors, field: &str, value: f64) {
    if !value.is_finite() || value < 0.0 {
        errors.add(field, "must be zero or greater");
    }
}

pub fn fipe_code(errors: &mut ValidationErrors, field: &str, value: &str) -> String {
    let trimmed = value.trim();
    if !FIPE_CODE.is_match(trimmed) {
        errors.add(field, "must look like 001004-9");
    }
    trimmed.to_string()
}

pub fn not_in_future(errors: &mut ValidationErrors, field: &str, date: NaiveDate) {
    if date > Utc::now().date_naive() {
        errors.add(field, "must not be in the future");
    }
}
